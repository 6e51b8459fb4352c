use std::sync::atomic::{AtomicU8, Ordering};

use crate::render::RenderContext;

/// Work executed on the render thread with exclusive access to the context.
pub type RenderJob = Box<dyn FnOnce(&mut RenderContext) -> anyhow::Result<()> + Send>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    Draining,
    StopRender,
}

#[derive(Debug)]
pub struct EngineControl {
    phase: AtomicU8,
}

impl Default for EngineControl {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineControl {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(ShutdownPhase::Running as u8),
        }
    }

    pub fn set_phase(&self, phase: ShutdownPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    pub fn phase(&self) -> ShutdownPhase {
        match self.phase.load(Ordering::Acquire) {
            0 => ShutdownPhase::Running,
            1 => ShutdownPhase::Draining,
            _ => ShutdownPhase::StopRender,
        }
    }
}
