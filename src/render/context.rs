use std::sync::Arc;

use crate::{
    device::{BindingPoint, Device, Handle},
    error::{BufferError, Result},
    render::{
        deferred::{DeferredQueue, Deleter},
        history::BindingHistory,
        stats::{Statistic, Statistics},
    },
};

/// Everything that belongs to the thread owning the rendering context.
///
/// Holds the native device, so it is neither `Send` nor `Sync`: all binding,
/// transfer and draw calls happen on the thread that created it.
pub struct RenderContext {
    device: Box<dyn Device>,
    history: BindingHistory,
    stats: Arc<Statistics>,
    deferred: DeferredQueue,
}

impl RenderContext {
    pub fn new(device: Box<dyn Device>) -> Self {
        Self::with_queue(device, DeferredQueue::new(), Arc::new(Statistics::new()))
    }

    pub fn with_queue(
        device: Box<dyn Device>,
        deferred: DeferredQueue,
        stats: Arc<Statistics>,
    ) -> Self {
        Self {
            device,
            history: BindingHistory::new(),
            stats,
            deferred,
        }
    }

    pub fn device(&self) -> &dyn Device {
        self.device.as_ref()
    }

    pub fn device_mut(&mut self) -> &mut dyn Device {
        self.device.as_mut()
    }

    pub fn stats(&self) -> &Arc<Statistics> {
        &self.stats
    }

    pub fn deleter(&self) -> Deleter {
        self.deferred.deleter()
    }

    /// Runs pending deferred deletions on this thread.
    pub fn flush_deferred(&mut self) -> usize {
        let count = self.deferred.flush(self.device.as_mut());
        if count > 0 {
            log::trace!("flushed {count} deferred deletions");
        }
        count
    }

    pub fn binding_depth(&self, point: BindingPoint) -> usize {
        self.history.depth(point)
    }

    /// Binds `handle` on `point`, remembering what was active before.
    pub fn push_binding(&mut self, point: BindingPoint, handle: Handle) -> Result<()> {
        let previous = self.device.bound(point);
        self.device.bind(point, handle)?;
        self.history.push(point, previous);
        self.stats.increment(bind_stat(point));
        Ok(())
    }

    /// Restores the handle that was active before the matching push.
    pub fn pop_binding(&mut self, point: BindingPoint) -> Result<Handle> {
        let handle = self
            .history
            .pop(point)
            .ok_or(BufferError::UnbalancedScope(point))?;
        if !handle.is_none() {
            self.stats.increment(bind_stat(point));
        }
        if let Err(e) = self.device.bind(point, handle) {
            // The restored object was deleted while shadowed; fall back to nothing bound.
            log::warn!("failed to restore {point:?} binding {handle:?}: {e:#}");
            self.device.bind(point, Handle::NONE)?;
        }
        Ok(handle)
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        self.flush_deferred();
        if !self.history.is_balanced() {
            log::warn!("render context dropped with unbalanced binding scopes");
        }
    }
}

fn bind_stat(point: BindingPoint) -> Statistic {
    match point {
        BindingPoint::VertexArray => Statistic::VaoBinds,
        BindingPoint::ArrayBuffer => Statistic::VboBinds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HeadlessDevice;

    fn context_with_buffers(n: usize) -> (RenderContext, Vec<Handle>) {
        let mut device = HeadlessDevice::new();
        let buffers = (0..n).map(|_| device.create_buffer().unwrap()).collect();
        (RenderContext::new(Box::new(device)), buffers)
    }

    #[test]
    fn nested_pushes_restore_in_reverse_order() {
        let (mut ctx, buffers) = context_with_buffers(3);
        let point = BindingPoint::ArrayBuffer;

        for &b in &buffers {
            ctx.push_binding(point, b).unwrap();
            assert_eq!(ctx.device().bound(point), b);
        }
        assert_eq!(ctx.binding_depth(point), 3);

        assert_eq!(ctx.pop_binding(point).unwrap(), buffers[1]);
        assert_eq!(ctx.device().bound(point), buffers[1]);
        assert_eq!(ctx.pop_binding(point).unwrap(), buffers[0]);
        assert_eq!(ctx.pop_binding(point).unwrap(), Handle::NONE);
        assert_eq!(ctx.device().bound(point), Handle::NONE);
        assert_eq!(ctx.binding_depth(point), 0);
    }

    #[test]
    fn pop_without_push_is_unbalanced() {
        let (mut ctx, _) = context_with_buffers(0);
        assert!(matches!(
            ctx.pop_binding(BindingPoint::VertexArray),
            Err(BufferError::UnbalancedScope(BindingPoint::VertexArray))
        ));
    }

    #[test]
    fn restoring_nothing_is_not_counted_as_a_bind() {
        let (mut ctx, buffers) = context_with_buffers(2);
        let point = BindingPoint::ArrayBuffer;

        ctx.push_binding(point, buffers[0]).unwrap();
        ctx.push_binding(point, buffers[1]).unwrap();
        ctx.pop_binding(point).unwrap();
        ctx.pop_binding(point).unwrap();

        // two pushes plus the restore of buffers[0]; the final restore of NONE is free
        assert_eq!(ctx.stats().get(Statistic::VboBinds), 3);
    }

    #[test]
    fn binding_unknown_handle_leaves_history_untouched() {
        let (mut ctx, _) = context_with_buffers(0);
        let bogus = Handle::from_raw(0x1_0000_0007);
        assert!(ctx.push_binding(BindingPoint::ArrayBuffer, bogus).is_err());
        assert_eq!(ctx.binding_depth(BindingPoint::ArrayBuffer), 0);
    }

    #[test]
    fn restore_of_deleted_handle_falls_back_to_none() {
        let (mut ctx, buffers) = context_with_buffers(2);
        let point = BindingPoint::ArrayBuffer;

        ctx.push_binding(point, buffers[0]).unwrap();
        ctx.push_binding(point, buffers[1]).unwrap();
        ctx.device_mut().delete_buffer(buffers[0]);
        ctx.pop_binding(point).unwrap();
        assert_eq!(ctx.device().bound(point), Handle::NONE);
        ctx.pop_binding(point).unwrap();
    }
}
