use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use eyre::{Result, WrapErr};

use crate::request::IntervalRequest;

pub use builder::WorkerBuilder;
pub use engine::{Outcome, Stats, WorkerCore};
pub use policy::{AnalysisPolicy, Policy, Served, ViewerPolicy};
pub use queue::RequestQueue;

mod builder;
mod engine;
mod policy;
mod queue;

/// Handle of a worker running on its own thread. Dropping it stops the thread.
pub struct Worker {
    name: String,
    queue: Arc<RequestQueue>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<Stats>>,
}

impl Worker {
    pub fn builder() -> WorkerBuilder {
        WorkerBuilder::new()
    }

    pub(crate) fn spawn(mut core: WorkerCore, backoff: Duration) -> Result<Self> {
        let name = core.name().to_string();
        let queue = core.queue().clone();
        let running = Arc::new(AtomicBool::new(true));

        let flag = running.clone();
        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                log::info!("Worker {} started", core.name());
                while flag.load(Ordering::Acquire) {
                    if core.process_next().is_none() {
                        std::thread::sleep(backoff);
                    }
                }
                log::info!("Worker {} stopped: {:?}", core.name(), core.stats());
                *core.stats()
            })
            .wrap_err_with(|| format!("Failed to start worker {name}"))?;

        Ok(Self {
            name,
            queue,
            running,
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a request. Never blocks on evaluation.
    pub fn enqueue(&self, request: IntervalRequest) {
        self.queue.push(request);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Stop the loop after the request in flight and wait for the thread. Queued requests are
    /// dropped without a callback.
    pub fn shutdown(mut self) -> Stats {
        self.stop()
    }

    fn stop(&mut self) -> Stats {
        self.running.store(false, Ordering::Release);
        match self.thread.take().map(|thread| thread.join()) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                log::error!("Worker {} panicked", self.name);
                Stats::default()
            }
            None => Stats::default(),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}
