use smallvec::SmallVec;

use crate::device::{BindingPoint, Handle};

/// Handles that were active before each nested bind, one stack per binding point.
#[derive(Default, Debug)]
pub struct BindingHistory {
    stacks: [SmallVec<[Handle; 8]>; BindingPoint::COUNT],
}

impl BindingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: BindingPoint, previous: Handle) {
        self.stacks[point.index()].push(previous);
    }

    pub fn pop(&mut self, point: BindingPoint) -> Option<Handle> {
        self.stacks[point.index()].pop()
    }

    pub fn depth(&self, point: BindingPoint) -> usize {
        self.stacks[point.index()].len()
    }

    pub fn is_balanced(&self) -> bool {
        self.stacks.iter().all(|s| s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacks_are_independent_per_point() {
        let mut history = BindingHistory::new();
        history.push(BindingPoint::VertexArray, Handle::from_raw(3));
        history.push(BindingPoint::ArrayBuffer, Handle::from_raw(5));
        history.push(BindingPoint::ArrayBuffer, Handle::from_raw(7));

        assert_eq!(history.depth(BindingPoint::ArrayBuffer), 2);
        assert_eq!(history.pop(BindingPoint::ArrayBuffer), Some(Handle::from_raw(7)));
        assert_eq!(history.pop(BindingPoint::VertexArray), Some(Handle::from_raw(3)));
        assert!(!history.is_balanced());
        assert_eq!(history.pop(BindingPoint::ArrayBuffer), Some(Handle::from_raw(5)));
        assert!(history.is_balanced());
    }

    #[test]
    fn pop_on_empty_is_none() {
        let mut history = BindingHistory::new();
        assert_eq!(history.pop(BindingPoint::VertexArray), None);
    }

    #[test]
    fn deep_nesting_spills_past_inline_storage() {
        let mut history = BindingHistory::new();
        for i in 0..32 {
            history.push(BindingPoint::VertexArray, Handle::from_raw(i));
        }
        for i in (0..32).rev() {
            assert_eq!(history.pop(BindingPoint::VertexArray), Some(Handle::from_raw(i)));
        }
        assert!(history.is_balanced());
    }
}
