use eyre::{ensure, Result};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::coverage::CoverageAccumulator;
use crate::decoder::{Decoder, DiffTally, ReadPairGroup, Slot};
use crate::mapping::Mapping;
use crate::request::{DataKind, IntervalRequest, TrackSelector};
use crate::result::{CoverageResult, TrackResult};
use crate::track::Track;

/// How the tracks of a worker are combined into one result.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Aggregation {
    /// One track, returned as decoded.
    Single,
    /// Two tracks kept apart in Track1/Track2 arrays of one accumulator.
    Double,
    /// Any number of tracks summed up into the tier arrays.
    Multi,
}

impl Aggregation {
    /// Strategy for the number of tracks. Two tracks are merged only if `combine` is set.
    pub fn select(tracks: usize, combine: bool) -> Result<Self> {
        ensure!(tracks > 0, "At least one track is required");
        Ok(match (tracks, combine) {
            (1, _) => Aggregation::Single,
            (2, false) => Aggregation::Double,
            _ => Aggregation::Multi,
        })
    }

    /// Evaluate the request over the tracks. Tracks that fail as a whole contribute nothing.
    pub fn evaluate(
        &self,
        tracks: &[Track],
        decoder: &Decoder,
        request: &IntervalRequest,
        pool: Option<&ThreadPool>,
    ) -> TrackResult {
        if !request.is_valid() {
            log::debug!("Invalid interval {request:?}, returning an empty result");
            return empty(request);
        }

        match request.kind() {
            DataKind::Coverage | DataKind::ReadStarts => {
                TrackResult::Coverage(self.coverage(tracks, decoder, request, pool))
            }
            DataKind::Mappings | DataKind::ReducedMappings => {
                let selected = self.selected(tracks, request);
                let mut mappings: Vec<Mapping> = run(pool, || {
                    selected
                        .par_iter()
                        .map(|track| {
                            recover(track, decoder.mappings(track, request)).unwrap_or_default()
                        })
                        .collect::<Vec<_>>()
                })
                .into_iter()
                .flatten()
                .collect();
                if selected.len() > 1 {
                    mappings.sort_by_key(|m| *m.start());
                }
                TrackResult::Mappings(mappings)
            }
            DataKind::ReadPairs => {
                let selected = self.selected(tracks, request);
                let groups: Vec<ReadPairGroup> = run(pool, || {
                    selected
                        .par_iter()
                        .map(|track| {
                            recover(track, decoder.read_pairs(track, request)).unwrap_or_default()
                        })
                        .collect::<Vec<_>>()
                })
                .into_iter()
                .flatten()
                .collect();
                TrackResult::ReadPairs(groups)
            }
        }
    }

    /// Tracks honouring the track selector of a two-track worker.
    fn selected<'t>(&self, tracks: &'t [Track], request: &IntervalRequest) -> Vec<&'t Track> {
        match (self, request.track_selector()) {
            (Aggregation::Double, TrackSelector::Track1Only) => tracks.iter().take(1).collect(),
            (Aggregation::Double, TrackSelector::Track2Only) => tracks.iter().skip(1).take(1).collect(),
            _ => tracks.iter().collect(),
        }
    }

    fn coverage(
        &self,
        tracks: &[Track],
        decoder: &Decoder,
        request: &IntervalRequest,
        pool: Option<&ThreadPool>,
    ) -> CoverageResult {
        let bounds = request.total_span();
        let with_diffs = *request.needs_diffs_and_gaps();

        let (accumulator, tally) = match self {
            Aggregation::Single => decode_into(&tracks[0], Slot::Tiers, decoder, request, with_diffs),
            Aggregation::Double => {
                let slots = [Slot::Track1, Slot::Track2];
                let mut accumulator = CoverageAccumulator::new(bounds);
                let mut tally = DiffTally::default();
                for (track, slot) in tracks.iter().zip(slots) {
                    let skip = matches!(
                        (request.track_selector(), slot),
                        (TrackSelector::Track1Only, Slot::Track2) | (TrackSelector::Track2Only, Slot::Track1)
                    );
                    if skip {
                        continue;
                    }
                    let outcome = decoder.coverage(
                        track,
                        slot,
                        request,
                        &mut accumulator,
                        with_diffs.then_some(&mut tally),
                    );
                    recover(track, outcome);
                }
                (accumulator, tally)
            }
            Aggregation::Multi => {
                let parts = run(pool, || {
                    tracks
                        .par_iter()
                        .map(|track| decode_into(track, Slot::Tiers, decoder, request, with_diffs))
                        .collect::<Vec<_>>()
                });

                let mut accumulator = CoverageAccumulator::new(bounds);
                let mut tally = DiffTally::default();
                for (part, diffs) in parts {
                    accumulator.merge_into(&part);
                    tally.merge(diffs);
                }
                (accumulator, tally)
            }
        };

        let (diffs, gaps) = tally.finish();
        CoverageResult::new(accumulator, diffs, gaps)
    }
}

fn decode_into(
    track: &Track,
    slot: Slot,
    decoder: &Decoder,
    request: &IntervalRequest,
    with_diffs: bool,
) -> (CoverageAccumulator, DiffTally) {
    let mut accumulator = CoverageAccumulator::new(request.total_span());
    let mut tally = DiffTally::default();
    let outcome = decoder.coverage(
        track,
        slot,
        request,
        &mut accumulator,
        with_diffs.then_some(&mut tally),
    );
    if recover(track, outcome).is_none() {
        // Partial counts of a failed track are dropped
        return (CoverageAccumulator::new(request.total_span()), DiffTally::default());
    }
    (accumulator, tally)
}

fn recover<T>(track: &Track, outcome: Result<T>) -> Option<T> {
    match outcome {
        Ok(x) => Some(x),
        Err(err) => {
            log::warn!("Track {} yields no data: {err:?}", track.name());
            None
        }
    }
}

fn run<T: Send>(pool: Option<&ThreadPool>, job: impl FnOnce() -> T + Send) -> T {
    match pool {
        Some(pool) => pool.install(job),
        None => job(),
    }
}

/// Result of an invalid request: zeroed coverage or empty collections.
pub fn empty(request: &IntervalRequest) -> TrackResult {
    match request.kind() {
        DataKind::Coverage | DataKind::ReadStarts => TrackResult::Coverage(CoverageResult::new(
            CoverageAccumulator::new(request.total_span()),
            Vec::new(),
            Vec::new(),
        )),
        DataKind::Mappings | DataKind::ReducedMappings => TrackResult::Mappings(Vec::new()),
        DataKind::ReadPairs => TrackResult::ReadPairs(Vec::new()),
    }
}
