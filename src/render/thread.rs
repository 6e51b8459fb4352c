use std::{sync::Arc, time::Duration};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::{
    device::Device,
    messages::{EngineControl, RenderJob, ShutdownPhase},
    render::{DeferredQueue, RenderContext, Statistics},
};

pub type DeviceFactory = Box<dyn FnOnce() -> anyhow::Result<Box<dyn Device>> + Send>;

/// Owns the rendering context for the lifetime of the thread.
///
/// Deferred deletions are flushed before and after every job so objects
/// dropped elsewhere are reclaimed at the next opportunity.
pub fn render_thread(
    make_device: DeviceFactory,
    deferred: DeferredQueue,
    stats: Arc<Statistics>,
    jobs: Receiver<RenderJob>,
    control: Arc<EngineControl>,
    idle_wait: Duration,
) -> anyhow::Result<()> {
    let device = make_device()?;
    let mut ctx = RenderContext::with_queue(device, deferred, stats);
    log::debug!("Render thread started");

    while control.phase() != ShutdownPhase::StopRender {
        match jobs.recv_timeout(idle_wait) {
            Ok(job) => run_job(&mut ctx, job),
            Err(RecvTimeoutError::Timeout) => {
                ctx.flush_deferred();
                if control.phase() == ShutdownPhase::Draining {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }

        #[cfg(feature = "tracing")]
        ctx.stats().plot();
    }

    ctx.flush_deferred();
    log::debug!("Render thread shutting down: {}", ctx.stats().snapshot());
    Ok(())
}

fn run_job(ctx: &mut RenderContext, job: RenderJob) {
    #[cfg(feature = "tracing")]
    let _span = tracy_client::span!("render_job");

    ctx.flush_deferred();
    if let Err(e) = job(ctx) {
        log::error!("render job failed: {e:?}");
    }
    ctx.flush_deferred();
}
