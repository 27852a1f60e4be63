use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use by_address::ByAddress;
use derive_getters::Getters;
use eyre::{ensure, Result};
use impl_tools::autoimpl;

use readscope_core_rs::loc::{Pos, Span, Strand};
use readscope_io_rs::alignment::Classification;

use crate::result::Delivery;

/// What a consumer wants to get back for an interval.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum DataKind {
    /// Per-base read depth.
    #[default]
    Coverage,
    /// Per-base count of read 5' ends.
    ReadStarts,
    /// Individual alignments.
    Mappings,
    /// Alignments without differences, identical ones collapsed into replicates.
    ReducedMappings,
    /// Alignments grouped by read pair.
    ReadPairs,
}

impl DataKind {
    pub fn is_coverage(&self) -> bool {
        matches!(self, DataKind::Coverage | DataKind::ReadStarts)
    }
}

/// Which track of a two-track worker a request is about.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum TrackSelector {
    #[default]
    None,
    Track1Only,
    Track2Only,
}

/// How read strands are reported in coverage.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum StrandMode {
    /// Counts stay on the strand the read aligned to.
    #[default]
    FeatureStrand,
    /// Counts are moved to the opposite strand.
    OppositeStrand,
    /// Both strands are summed up and reported on a single one.
    BothCombined { as_forward: bool },
}

impl StrandMode {
    /// Strand a read aligned to `strand` is counted on.
    pub fn apply(&self, strand: Strand) -> Strand {
        match self {
            StrandMode::FeatureStrand => strand,
            StrandMode::OppositeStrand => strand.flipped(),
            StrandMode::BothCombined { as_forward: true } => Strand::Forward,
            StrandMode::BothCombined { as_forward: false } => Strand::Reverse,
        }
    }
}

/// Which alignment records take part in a request.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Getters)]
pub struct ReadClassFilter {
    use_perfect: bool,
    use_best_match: bool,
    use_common_match: bool,
    only_unique_reads: bool,
    min_mapping_quality: u8,
    strand_mode: StrandMode,
}

impl Default for ReadClassFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl ReadClassFilter {
    /// Every classification, multi-mapped reads included, no quality threshold.
    pub fn all() -> Self {
        Self {
            use_perfect: true,
            use_best_match: true,
            use_common_match: true,
            only_unique_reads: false,
            min_mapping_quality: 0,
            strand_mode: StrandMode::FeatureStrand,
        }
    }

    pub fn new(use_perfect: bool, use_best_match: bool, use_common_match: bool) -> Self {
        Self {
            use_perfect,
            use_best_match,
            use_common_match,
            ..Self::all()
        }
    }

    pub fn with_only_unique_reads(mut self, only_unique_reads: bool) -> Self {
        self.only_unique_reads = only_unique_reads;
        self
    }

    pub fn with_min_mapping_quality(mut self, quality: u8) -> Self {
        self.min_mapping_quality = quality;
        self
    }

    pub fn with_strand_mode(mut self, mode: StrandMode) -> Self {
        self.strand_mode = mode;
        self
    }

    /// Filters are equivalent when they select the same classifications. Mapping quality and
    /// strand mode are compared separately by callers that care about them.
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.use_perfect == other.use_perfect
            && self.use_best_match == other.use_best_match
            && self.use_common_match == other.use_common_match
            && self.only_unique_reads == other.only_unique_reads
    }

    /// Whether a record with the given classification and number of alternative loci passes.
    /// Perfect records are also eligible as best matches. A missing loci count means the read
    /// mapped once.
    pub fn includes(&self, classification: Option<Classification>, loci: Option<u32>) -> bool {
        if self.only_unique_reads && loci.unwrap_or(1) != 1 {
            return false;
        }
        match classification {
            Some(Classification::Perfect) => self.use_perfect || self.use_best_match,
            Some(Classification::BestMatch) => self.use_best_match,
            Some(Classification::Common) | None => self.use_common_match,
        }
    }

    /// Records without a known mapping quality always pass.
    pub fn passes_quality(&self, quality: Option<u8>) -> bool {
        match quality {
            None | Some(255) => true,
            Some(quality) => quality >= self.min_mapping_quality,
        }
    }
}

/// Consumer of asynchronous results.
#[autoimpl(for<T: trait + ?Sized> &T, Box<T>, Arc<T>)]
pub trait Requester: Send + Sync {
    /// Data for an evaluated request.
    fn receive_data(&self, data: Delivery);

    /// The request was superseded before it could be evaluated, keep showing the current data.
    fn notify_skipped(&self);
}

/// Requester handle compared by identity rather than by value.
pub type RequesterRef = ByAddress<Arc<dyn Requester>>;

/// Immutable description of a query over a chromosome interval. All coordinates are 1-based
/// and inclusive.
#[derive(Clone, PartialEq, Eq, Getters)]
pub struct IntervalRequest {
    window_from: Pos,
    window_to: Pos,
    total_from: Pos,
    total_to: Pos,
    chromosome_id: usize,
    requester: RequesterRef,
    needs_diffs_and_gaps: bool,
    kind: DataKind,
    track_selector: TrackSelector,
    filter: ReadClassFilter,
}

impl IntervalRequest {
    pub fn builder(chromosome_id: usize, requester: Arc<dyn Requester>) -> RequestBuilder {
        RequestBuilder::new(chromosome_id, requester)
    }

    /// Middle of the visible window, rounded down.
    pub fn center(&self) -> Pos {
        (self.window_from + self.window_to) / 2
    }

    /// Requests with an empty/inverted window or non-positive bounds yield empty results.
    pub fn is_valid(&self) -> bool {
        self.window_from > 0 && self.window_to > 0 && self.window_from < self.window_to
    }

    /// Full buffered range to fetch, clamped to the first chromosome base.
    pub fn total_span(&self) -> Span {
        let from = self.total_from.max(1);
        let to = self.total_to.max(from);
        // from <= to is guaranteed by the two lines above
        Span::new(from, to).unwrap_or_else(|_| unreachable!())
    }
}

impl Debug for IntervalRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntervalRequest")
            .field("window", &(self.window_from, self.window_to))
            .field("total", &(self.total_from, self.total_to))
            .field("chromosome_id", &self.chromosome_id)
            .field("requester", &Arc::as_ptr(&self.requester.0))
            .field("needs_diffs_and_gaps", &self.needs_diffs_and_gaps)
            .field("kind", &self.kind)
            .field("track_selector", &self.track_selector)
            .field("filter", &self.filter)
            .finish()
    }
}

pub struct RequestBuilder {
    chromosome_id: usize,
    requester: Arc<dyn Requester>,
    window: (Pos, Pos),
    total: Option<(Pos, Pos)>,
    needs_diffs_and_gaps: bool,
    kind: DataKind,
    track_selector: TrackSelector,
    filter: ReadClassFilter,
}

impl RequestBuilder {
    fn new(chromosome_id: usize, requester: Arc<dyn Requester>) -> Self {
        Self {
            chromosome_id,
            requester,
            window: (1, 1),
            total: None,
            needs_diffs_and_gaps: false,
            kind: DataKind::default(),
            track_selector: TrackSelector::default(),
            filter: ReadClassFilter::default(),
        }
    }

    /// Visible part of the interval.
    pub fn window(mut self, from: Pos, to: Pos) -> Self {
        self.window = (from, to);
        self
    }

    /// Buffered part of the interval to fetch. Defaults to the window.
    pub fn total(mut self, from: Pos, to: Pos) -> Self {
        self.total = Some((from, to));
        self
    }

    pub fn kind(mut self, kind: DataKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn diffs_and_gaps(mut self, needed: bool) -> Self {
        self.needs_diffs_and_gaps = needed;
        self
    }

    pub fn track_selector(mut self, selector: TrackSelector) -> Self {
        self.track_selector = selector;
        self
    }

    pub fn filter(mut self, filter: ReadClassFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn build(self) -> Result<IntervalRequest> {
        let (window_from, window_to) = self.window;
        let (total_from, total_to) = self.total.unwrap_or(self.window);
        ensure!(
            total_from <= window_from && window_to <= total_to,
            "Total interval {total_from}-{total_to} must enclose the window {window_from}-{window_to}"
        );

        Ok(IntervalRequest {
            window_from,
            window_to,
            total_from,
            total_to,
            chromosome_id: self.chromosome_id,
            requester: ByAddress(self.requester),
            needs_diffs_and_gaps: self.needs_diffs_and_gaps,
            kind: self.kind,
            track_selector: self.track_selector,
            filter: self.filter,
        })
    }
}
