use std::sync::{Arc, mpsc};
use std::thread;

use anyhow::Context;
use crossbeam_channel::{Sender, bounded, unbounded};

use crate::config::EngineConfig;
use crate::device::Device;
use crate::messages::{EngineControl, RenderJob, ShutdownPhase};
use crate::render::{DeferredQueue, Deleter, RenderContext, Statistics, render_thread};

/// Runs a render thread that owns the rendering context and accepts jobs.
pub struct Engine {
    control: Arc<EngineControl>,
    jobs: Sender<RenderJob>,
    deleter: Deleter,
    stats: Arc<Statistics>,
    render: Option<thread::JoinHandle<()>>,
    watchdog: Option<thread::JoinHandle<()>>,
}

impl Engine {
    /// Spawns the render thread. `make_device` runs on that thread, so the
    /// device never has to be `Send`.
    pub fn new<F>(config: &EngineConfig, make_device: F) -> anyhow::Result<Self>
    where
        F: FnOnce() -> anyhow::Result<Box<dyn Device>> + Send + 'static,
    {
        let (jobs_tx, jobs_rx) = unbounded();
        let control = Arc::new(EngineControl::new());
        let stats = Arc::new(Statistics::new());
        let deferred = DeferredQueue::new();
        let deleter = deferred.deleter();

        let (error_tx, error_rx) = mpsc::channel::<(String, anyhow::Error)>();

        let render_handle = {
            let control = control.clone();
            let stats = stats.clone();
            let error_tx = error_tx.clone();
            let name = config.thread_name.clone();
            let idle_wait = config.idle_wait;
            thread::Builder::new()
                .name(name.clone())
                .spawn(move || {
                    if let Err(e) = render_thread(
                        Box::new(make_device),
                        deferred,
                        stats,
                        jobs_rx,
                        control,
                        idle_wait,
                    ) {
                        let _ = error_tx.send((name, e));
                    }
                })
                .context("failed to spawn render thread")?
        };
        drop(error_tx);

        let watchdog_handle = thread::Builder::new()
            .name("thread_watchdog".to_string())
            .spawn(move || {
                for (name, e) in error_rx {
                    log::error!("Thread {} failed: {:?}", name, e);
                }
            })
            .context("failed to spawn watchdog thread")?;

        Ok(Self {
            control,
            jobs: jobs_tx,
            deleter,
            stats,
            render: Some(render_handle),
            watchdog: Some(watchdog_handle),
        })
    }

    /// Queues `job` for the render thread. Failures are logged there.
    pub fn submit<F>(&self, job: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut RenderContext) -> anyhow::Result<()> + Send + 'static,
    {
        anyhow::ensure!(
            self.control.phase() == ShutdownPhase::Running,
            "engine is shutting down"
        );
        self.jobs
            .send(Box::new(job))
            .map_err(|_| anyhow::anyhow!("render thread is gone"))
    }

    /// Runs `f` on the render thread and waits for its result.
    pub fn call<R, F>(&self, f: F) -> anyhow::Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut RenderContext) -> anyhow::Result<R> + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        self.submit(move |ctx| {
            let _ = tx.send(f(ctx));
            Ok(())
        })?;
        rx.recv()
            .map_err(|_| anyhow::anyhow!("render thread dropped the call"))?
    }

    /// Marshals deletions onto the render thread from anywhere.
    pub fn deleter(&self) -> Deleter {
        self.deleter.clone()
    }

    pub fn stats(&self) -> &Arc<Statistics> {
        &self.stats
    }

    /// Finishes queued jobs, flushes deferred deletions and joins the render thread.
    pub fn shutdown(&mut self) -> anyhow::Result<()> {
        self.control.set_phase(ShutdownPhase::Draining);
        if let Some(handle) = self.render.take() {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("render thread panicked"))?;
        }
        self.control.set_phase(ShutdownPhase::StopRender);
        if let Some(handle) = self.watchdog.take() {
            handle.join().ok();
        }
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("engine shutdown failed: {e:?}");
        }
    }
}
