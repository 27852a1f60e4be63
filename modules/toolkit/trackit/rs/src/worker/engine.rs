use std::sync::Arc;

use derive_getters::Getters;
use rayon::ThreadPool;

use readscope_core_rs::reference::Reference;
use readscope_io_rs::alignment::Observer;

use crate::aggregate::Aggregation;
use crate::decoder::{Decoder, PairingConfig};
use crate::request::IntervalRequest;
use crate::result::{Delivery, TrackResult};
use crate::track::Track;

use super::policy::{Policy, Served};
use super::queue::RequestQueue;

/// What happened to a dequeued request.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Outcome {
    /// Superseded, the requester was told to keep its current data.
    Skipped,
    /// Answered from the last served result.
    Cached,
    /// Evaluated against the tracks.
    Requeried,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Getters)]
pub struct Stats {
    skipped: usize,
    cached: usize,
    requeried: usize,
}

impl Stats {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Skipped => self.skipped += 1,
            Outcome::Cached => self.cached += 1,
            Outcome::Requeried => self.requeried += 1,
        }
    }
}

/// Request evaluation state machine of a worker, independent of the thread that drives it.
pub struct WorkerCore {
    pub(super) name: String,
    pub(super) tracks: Vec<Track>,
    pub(super) aggregation: Aggregation,
    pub(super) reference: Arc<dyn Reference>,
    pub(super) observer: Arc<dyn Observer>,
    pub(super) pairing: PairingConfig,
    pub(super) policy: Box<dyn Policy>,
    pub(super) pool: Option<Arc<ThreadPool>>,
    pub(super) queue: Arc<RequestQueue>,
    pub(super) served: Option<Served>,
    pub(super) stats: Stats,
}

impl WorkerCore {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }

    pub fn enqueue(&self, request: IntervalRequest) {
        self.queue.push(request);
    }

    /// Evaluate a request against the tracks, bypassing the queue and the cache.
    pub fn evaluate(&self, request: &IntervalRequest) -> TrackResult {
        let decoder = Decoder::new(self.reference.as_ref(), self.observer.as_ref(), self.pairing);
        self.aggregation
            .evaluate(&self.tracks, &decoder, request, self.pool.as_deref())
    }

    /// Take the oldest queued request and skip, serve from cache or re-query it. Returns None if
    /// the queue is empty.
    pub fn process_next(&mut self) -> Option<Outcome> {
        let (request, latest) = self.queue.pop()?;

        if self.policy.is_stale(&request, &latest) {
            log::trace!(
                "{}: skipping {request:?}, superseded by {latest:?}",
                self.name
            );
            request.requester().notify_skipped();
            self.stats.record(Outcome::Skipped);
            return Some(Outcome::Skipped);
        }

        let cached = match &self.served {
            Some(served) if !self.policy.needs_requery(&request, Some(served)) => {
                Some(served.result().clone())
            }
            _ => None,
        };
        let (outcome, result) = match cached {
            Some(result) => (Outcome::Cached, result),
            None => {
                log::debug!("{}: evaluating {request:?}", self.name);
                let result = Arc::new(self.evaluate(&request));
                // The cache is replaced only once the new result is complete
                self.served = Some(Served::new(request.clone(), result.clone()));
                (Outcome::Requeried, result)
            }
        };

        request
            .requester()
            .receive_data(Delivery::new(request.clone(), result));
        self.stats.record(outcome);
        Some(outcome)
    }

    /// Process every queued request. Returns the number of processed requests.
    pub fn drain(&mut self) -> usize {
        let mut processed = 0;
        while self.process_next().is_some() {
            processed += 1;
        }
        processed
    }
}
