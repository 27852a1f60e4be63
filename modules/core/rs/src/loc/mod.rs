pub use per_strand::PerStrand;
pub use span::Span;
pub use strand::Strand;

mod per_strand;
mod span;
mod strand;

/// 1-based genomic coordinate. Signed so that out-of-range requests (e.g. scrolled past the
/// chromosome start) can be represented and rejected instead of wrapping around.
pub type Pos = i64;
