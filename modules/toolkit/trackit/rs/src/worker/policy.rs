use std::sync::Arc;

use derive_getters::Getters;
use derive_more::Constructor;
use dyn_clone::DynClone;

use crate::request::IntervalRequest;
use crate::result::TrackResult;

/// Last evaluated request of a worker together with its result.
#[derive(Clone, Debug, Getters, Constructor)]
pub struct Served {
    request: IntervalRequest,
    result: Arc<TrackResult>,
}

impl Served {
    /// True if the cached data spans every position of [from, to].
    pub fn covers(&self, from: i64, to: i64) -> bool {
        match self.result.as_ref() {
            TrackResult::Coverage(x) => x.coverage().covers_bounds(from, to),
            _ => *self.request.total_from() <= from && to <= *self.request.total_to(),
        }
    }
}

/// Decides which queued requests a worker evaluates and when it may answer from its cache.
pub trait Policy: DynClone + Send + Sync {
    /// The request was superseded by `latest` and must be skipped.
    fn is_stale(&self, request: &IntervalRequest, latest: &IntervalRequest) -> bool;

    /// The request can't be answered from the last served result.
    fn needs_requery(&self, request: &IntervalRequest, served: Option<&Served>) -> bool;

    fn name(&self) -> &'static str;
}

dyn_clone::clone_trait_object!(Policy);

/// Interactive browsing: superseded requests are dropped and scrolling inside the buffered
/// interval is served from the cache.
#[derive(Clone, Copy, Debug, Default)]
pub struct ViewerPolicy;

impl Policy for ViewerPolicy {
    fn is_stale(&self, request: &IntervalRequest, latest: &IntervalRequest) -> bool {
        // Centers within one base are the same view
        (request.center() - latest.center()).abs() > 1
            || request.kind() != latest.kind()
            || request.requester() != latest.requester()
            || request.chromosome_id() != latest.chromosome_id()
    }

    fn needs_requery(&self, request: &IntervalRequest, served: Option<&Served>) -> bool {
        let Some(served) = served else {
            return true;
        };
        let last = served.request();
        let (filter, lfilter) = (request.filter(), last.filter());

        !served.covers(*request.window_from(), *request.window_to())
            || request.chromosome_id() != last.chromosome_id()
            || (*request.needs_diffs_and_gaps() && !*last.needs_diffs_and_gaps())
            || !filter.is_equivalent(lfilter)
            || request.kind() != last.kind()
            || request.track_selector() != last.track_selector()
            || filter.strand_mode() != lfilter.strand_mode()
            || filter.min_mapping_quality() != lfilter.min_mapping_quality()
    }

    fn name(&self) -> &'static str {
        "viewer"
    }
}

/// Batch analyses: every request is evaluated from scratch, in order.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnalysisPolicy;

impl Policy for AnalysisPolicy {
    fn is_stale(&self, _: &IntervalRequest, _: &IntervalRequest) -> bool {
        false
    }

    fn needs_requery(&self, _: &IntervalRequest, _: Option<&Served>) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "analysis"
    }
}
