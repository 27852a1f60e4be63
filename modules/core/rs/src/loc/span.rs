use std::fmt::{Display, Formatter};

use derive_getters::Dissolve;
use eyre::{ensure, Result};

use super::Pos;

/// Closed, 1-based genomic span [start, stop].
///
/// Genome browsing code reports positions the way they are shown to users: the first base of a
/// chromosome is 1 and both ends are inclusive. Empty spans are not representable.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Dissolve)]
pub struct Span {
    start: Pos,
    stop: Pos,
}

impl Span {
    pub fn new(start: Pos, stop: Pos) -> Result<Self> {
        ensure!(
            start <= stop,
            "Invalid span: start ({start}) must not exceed stop ({stop})"
        );
        Ok(Self { start, stop })
    }

    pub(crate) const fn new_unchecked(start: Pos, stop: Pos) -> Self {
        Self { start, stop }
    }

    #[inline(always)]
    pub fn start(&self) -> Pos {
        self.start
    }

    #[inline(always)]
    pub fn stop(&self) -> Pos {
        self.stop
    }

    /// Number of bases in the span.
    pub fn len(&self) -> usize {
        (self.stop - self.start + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Middle of the span, rounded down.
    pub fn center(&self) -> Pos {
        (self.start + self.stop) / 2
    }

    pub fn contains(&self, pos: Pos) -> bool {
        self.start <= pos && pos <= self.stop
    }

    /// True if every position of `other` lies inside this span.
    pub fn covers(&self, other: &Span) -> bool {
        self.start <= other.start && other.stop <= self.stop
    }

    pub fn intersects(&self, other: &Span) -> bool {
        self.start <= other.stop && other.start <= self.stop
    }

    /// Part of this span that lies inside `bounds`, if any.
    pub fn clipped(&self, bounds: &Span) -> Option<Span> {
        let start = self.start.max(bounds.start);
        let stop = self.stop.min(bounds.stop);
        (start <= stop).then_some(Span { start, stop })
    }

    /// Offset of `pos` from the span start. The position must lie inside the span.
    #[inline(always)]
    pub fn offset(&self, pos: Pos) -> usize {
        debug_assert!(self.contains(pos));
        (pos - self.start) as usize
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.stop)
    }
}

impl TryFrom<(Pos, Pos)> for Span {
    type Error = eyre::Report;

    fn try_from(value: (Pos, Pos)) -> Result<Self> {
        Span::new(value.0, value.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_new() {
        assert!(Span::new(10, 20).is_ok());
        assert!(Span::new(10, 10).is_ok());
        assert!(Span::new(11, 10).is_err());
    }

    #[test]
    fn test_span_geometry() -> Result<()> {
        let span = Span::new(10, 20)?;
        assert_eq!(span.len(), 11);
        assert_eq!(span.center(), 15);
        assert!(span.contains(10) && span.contains(20));
        assert!(!span.contains(21));
        assert!(span.covers(&Span::new(12, 20)?));
        assert!(!span.covers(&Span::new(9, 12)?));
        assert!(span.intersects(&Span::new(20, 30)?));
        assert!(!span.intersects(&Span::new(21, 30)?));
        assert_eq!(span.offset(13), 3);
        Ok(())
    }

    #[test]
    fn test_span_clipped() -> Result<()> {
        let bounds = Span::new(10, 20)?;
        assert_eq!(Span::new(5, 15)?.clipped(&bounds), Some(Span::new(10, 15)?));
        assert_eq!(Span::new(1, 9)?.clipped(&bounds), None);
        assert_eq!(Span::new(1, 100)?.clipped(&bounds), Some(bounds));
        Ok(())
    }
}
