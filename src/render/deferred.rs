use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::device::Device;

pub type DeleteThunk = Box<dyn FnOnce(&mut dyn Device) + Send>;

/// Destruction requests waiting for the context-owning thread.
pub struct DeferredQueue {
    tx: Sender<DeleteThunk>,
    rx: Receiver<DeleteThunk>,
}

/// Sending half of a [`DeferredQueue`]. Usable from any thread.
#[derive(Clone, Debug)]
pub struct Deleter {
    tx: Sender<DeleteThunk>,
}

impl Deleter {
    /// Queues `thunk` to run once on the owning thread at its next flush.
    ///
    /// If the owning context is already gone the thunk is dropped unrun; its
    /// native objects went away with the device.
    pub fn call_non_block(&self, thunk: impl FnOnce(&mut dyn Device) + Send + 'static) {
        if self.tx.send(Box::new(thunk)).is_err() {
            log::trace!("deferred deletion dropped: render context is gone");
        }
    }
}

impl Default for DeferredQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn deleter(&self) -> Deleter {
        Deleter {
            tx: self.tx.clone(),
        }
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Runs every queued thunk. Returns how many ran.
    pub fn flush(&self, device: &mut dyn Device) -> usize {
        let mut count = 0;
        while let Ok(thunk) = self.rx.try_recv() {
            thunk(device);
            count += 1;
        }
        count
    }
}
