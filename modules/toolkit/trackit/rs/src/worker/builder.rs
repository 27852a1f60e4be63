use std::sync::Arc;
use std::thread::available_parallelism;
use std::time::Duration;

use eyre::{eyre, Result};
use rayon::ThreadPoolBuilder;

use readscope_core_rs::reference::Reference;
use readscope_io_rs::alignment::{Connector, LogObserver, Observer};

use crate::aggregate::Aggregation;
use crate::decoder::PairingConfig;
use crate::track::Track;

use super::engine::{Stats, WorkerCore};
use super::policy::{Policy, ViewerPolicy};
use super::queue::RequestQueue;
use super::Worker;

/// Configuration of a worker serving one group of tracks.
#[derive(Clone)]
pub struct WorkerBuilder {
    name: String,
    tracks: Vec<Track>,
    reference: Option<Arc<dyn Reference>>,
    observer: Arc<dyn Observer>,
    policy: Box<dyn Policy>,
    combine: bool,
    idle_backoff: Duration,
    pairing: PairingConfig,
    threads: Option<isize>,
}

impl Default for WorkerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerBuilder {
    pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(25);

    pub fn new() -> Self {
        Self {
            name: "trackit".to_string(),
            tracks: Vec::new(),
            reference: None,
            observer: Arc::new(LogObserver),
            policy: Box::new(ViewerPolicy),
            combine: false,
            idle_backoff: Self::DEFAULT_IDLE_BACKOFF,
            pairing: PairingConfig::default(),
            threads: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a track. Its id is the position in the worker.
    pub fn add_track(mut self, name: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        let id = self.tracks.len();
        self.tracks.push(Track::new(id, name, connector));
        self
    }

    pub fn add_tracks(mut self, tracks: impl IntoIterator<Item = Track>) -> Self {
        self.tracks.extend(tracks);
        self
    }

    pub fn set_reference(mut self, reference: Arc<dyn Reference>) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn set_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn set_policy(mut self, policy: Box<dyn Policy>) -> Self {
        self.policy = policy;
        self
    }

    /// Sum two tracks up instead of keeping them apart.
    pub fn with_combine(mut self, combine: bool) -> Self {
        self.combine = combine;
        self
    }

    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    pub fn with_pairing(mut self, pairing: PairingConfig) -> Self {
        self.pairing = pairing;
        self
    }

    /// Decode the tracks of a merge on a dedicated pool. Zero takes every core, negative values
    /// leave that many cores free. Without it the global rayon pool is used.
    pub fn with_threads(mut self, threads: isize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn build_core(self) -> Result<WorkerCore> {
        let aggregation = Aggregation::select(self.tracks.len(), self.combine)
            .map_err(|e| eyre!("Worker {} can't be built: {e}", self.name))?;
        let reference = self
            .reference
            .ok_or_else(|| eyre!("Worker {} has no reference", self.name))?;

        let pool = match self.threads {
            Some(threads) => {
                let name = self.name.clone();
                let size = decode_pool_size(threads, available_parallelism()?.get(), self.tracks.len());
                let pool = ThreadPoolBuilder::new()
                    .num_threads(size)
                    .thread_name(move |ind| format!("{name}-decode-{ind}"))
                    .build()?;
                Some(Arc::new(pool))
            }
            None => None,
        };

        log::debug!(
            "Worker {}: {} track(s), {aggregation:?} aggregation, {} policy",
            self.name,
            self.tracks.len(),
            self.policy.name()
        );

        Ok(WorkerCore {
            name: self.name,
            tracks: self.tracks,
            aggregation,
            reference,
            observer: self.observer,
            pairing: self.pairing,
            policy: self.policy,
            pool,
            queue: Arc::new(RequestQueue::new()),
            served: None,
            stats: Stats::default(),
        })
    }

    /// Build the worker and start its background loop.
    pub fn spawn(self) -> Result<Worker> {
        let backoff = self.idle_backoff;
        Worker::spawn(self.build_core()?, backoff)
    }
}

/// Threads of a decode pool. Each task decodes a whole track, so the pool never outgrows the
/// track count.
fn decode_pool_size(requested: isize, cores: usize, tracks: usize) -> usize {
    let cores = cores.max(1);
    let wanted = if requested > 0 {
        requested.unsigned_abs()
    } else {
        cores.saturating_sub(requested.unsigned_abs())
    };
    wanted.clamp(1, cores).min(tracks.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_pool_size() {
        for (requested, cores, tracks, expected) in [
            (0, 8, 16, 8),
            (0, 8, 3, 3),
            (4, 8, 16, 4),
            (32, 8, 16, 8),
            (-2, 8, 16, 6),
            (-8, 8, 16, 1),
            (-20, 8, 16, 1),
            (2, 8, 0, 1),
        ] {
            assert_eq!(decode_pool_size(requested, cores, tracks), expected);
        }
    }
}
