use ahash::AHashMap;
use derive_more::Display;

use readscope_core_rs::loc::{PerStrand, Pos, Span, Strand};
use readscope_io_rs::alignment::Classification;

/// Classification tier a record is counted under. Unclassified records are common ones.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display)]
pub enum Tier {
    Perfect,
    BestMatch,
    Common,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Perfect, Tier::BestMatch, Tier::Common];

    pub fn of(classification: Option<Classification>) -> Self {
        match classification {
            Some(Classification::Perfect) => Tier::Perfect,
            Some(Classification::BestMatch) => Tier::BestMatch,
            Some(Classification::Common) | None => Tier::Common,
        }
    }
}

/// Named array set of an accumulator.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display)]
pub enum Layer {
    Perfect,
    BestMatch,
    Common,
    /// Raw counts of the first track of a two-track worker.
    Track1,
    /// Raw counts of the second track of a two-track worker.
    Track2,
}

impl From<Tier> for Layer {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Perfect => Layer::Perfect,
            Tier::BestMatch => Layer::BestMatch,
            Tier::Common => Layer::Common,
        }
    }
}

/// Which array of an accumulator a single count goes to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ArraySelection {
    pub layer: Layer,
    pub strand: Strand,
}

impl ArraySelection {
    pub fn new(layer: Layer, strand: Strand) -> Self {
        Self { layer, strand }
    }
}

/// Per-base counters over a closed interval, one array per layer and strand. Arrays are allocated
/// on first use.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CoverageAccumulator {
    bounds: Span,
    layers: AHashMap<Layer, PerStrand<Vec<u32>>>,
}

impl CoverageAccumulator {
    pub fn new(bounds: Span) -> Self {
        Self {
            bounds,
            layers: AHashMap::new(),
        }
    }

    pub fn bounds(&self) -> Span {
        self.bounds
    }

    fn arrays(&mut self, layer: Layer) -> &mut PerStrand<Vec<u32>> {
        let size = self.bounds.len();
        self.layers
            .entry(layer)
            .or_insert_with(|| PerStrand::new(vec![0; size], vec![0; size]))
    }

    /// Add one to every position of [start, stop] inside the bounds. Positions outside the
    /// bounds are ignored.
    pub fn increment_range(&mut self, selection: ArraySelection, start: Pos, stop: Pos) {
        if start > stop {
            return;
        }
        let bounds = self.bounds;
        let Some(clipped) = Span::new(start, stop)
            .ok()
            .and_then(|span| span.clipped(&bounds))
        else {
            return;
        };

        let array = self.arrays(selection.layer).get_mut(selection.strand);
        let (from, to) = (bounds.offset(clipped.start()), bounds.offset(clipped.stop()));
        for count in &mut array[from..=to] {
            *count += 1;
        }
    }

    pub fn increment(&mut self, selection: ArraySelection, pos: Pos) {
        self.increment_range(selection, pos, pos);
    }

    /// Add counts of `other` position by position.
    ///
    /// Both accumulators must share the same bounds. Aggregation builds every per-track
    /// accumulator from the same request, so a mismatch is a bug and panics.
    pub fn merge_into(&mut self, other: &CoverageAccumulator) {
        assert_eq!(
            self.bounds, other.bounds,
            "Merged accumulators must have identical bounds"
        );

        for (layer, theirs) in &other.layers {
            let ours = self.arrays(*layer);
            for ((_, target), (_, source)) in ours.iter_mut().zip(theirs.iter()) {
                for (t, s) in target.iter_mut().zip(source) {
                    *t += *s;
                }
            }
        }
    }

    /// True if the accumulator holds counts for every position of [from, to].
    pub fn covers_bounds(&self, from: Pos, to: Pos) -> bool {
        self.bounds.start() <= from && to <= self.bounds.stop()
    }

    pub fn layer(&self, layer: Layer) -> Option<&PerStrand<Vec<u32>>> {
        self.layers.get(&layer)
    }

    /// Raw count of one array at a position. Unpopulated arrays and positions outside the bounds
    /// read as zero.
    pub fn get(&self, selection: ArraySelection, pos: Pos) -> u32 {
        if !self.bounds.contains(pos) {
            return 0;
        }
        self.layers
            .get(&selection.layer)
            .map_or(0, |arrays| arrays.get(selection.strand)[self.bounds.offset(pos)])
    }

    /// Layers that received at least one allocation, sorted.
    pub fn populated(&self) -> Vec<Layer> {
        let mut layers: Vec<_> = self.layers.keys().copied().collect();
        layers.sort();
        layers
    }

    /// Cumulative tier count: Perfect alone, Perfect + BestMatch, or all three tiers.
    pub fn cumulative(&self, tier: Tier, strand: Strand, pos: Pos) -> u32 {
        Tier::ALL
            .iter()
            .take_while(|t| **t <= tier)
            .map(|t| self.get(ArraySelection::new((*t).into(), strand), pos))
            .sum()
    }

    /// Cumulative tier counts for every position of the bounds.
    pub fn cumulative_array(&self, tier: Tier, strand: Strand) -> Vec<u32> {
        let mut result = vec![0; self.bounds.len()];
        for t in Tier::ALL.iter().take_while(|t| **t <= tier) {
            if let Some(arrays) = self.layers.get(&Layer::from(*t)) {
                for (r, c) in result.iter_mut().zip(arrays.get(strand)) {
                    *r += *c;
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(layer: Layer) -> ArraySelection {
        ArraySelection::new(layer, Strand::Forward)
    }

    #[test]
    fn test_increment_range_clips_to_bounds() -> eyre::Result<()> {
        let mut acc = CoverageAccumulator::new(Span::new(10, 20)?);
        acc.increment_range(selection(Layer::Common), 5, 15);

        for pos in 10..=15 {
            assert_eq!(acc.get(selection(Layer::Common), pos), 1);
        }
        for pos in 16..=20 {
            assert_eq!(acc.get(selection(Layer::Common), pos), 0);
        }
        assert_eq!(acc.get(selection(Layer::Common), 7), 0);

        // Entirely outside
        acc.increment_range(selection(Layer::Common), 21, 40);
        acc.increment_range(selection(Layer::Common), 1, 9);
        assert_eq!(acc.layer(Layer::Common).map(|x| x.forward.iter().sum::<u32>()), Some(6));
        Ok(())
    }

    #[test]
    fn test_merge_is_commutative_and_associative() -> eyre::Result<()> {
        let bounds = Span::new(1, 10)?;
        let mut a = CoverageAccumulator::new(bounds);
        let mut b = CoverageAccumulator::new(bounds);
        let mut c = CoverageAccumulator::new(bounds);
        a.increment_range(selection(Layer::Perfect), 1, 5);
        b.increment_range(selection(Layer::Perfect), 3, 8);
        b.increment_range(selection(Layer::Common), 2, 2);
        c.increment_range(
            ArraySelection::new(Layer::BestMatch, Strand::Reverse),
            4,
            10,
        );

        let mut ab_c = a.clone();
        ab_c.merge_into(&b);
        ab_c.merge_into(&c);

        let mut bc = b.clone();
        bc.merge_into(&c);
        let mut a_bc = a.clone();
        a_bc.merge_into(&bc);

        let mut c_b_a = c.clone();
        c_b_a.merge_into(&b);
        c_b_a.merge_into(&a);

        assert_eq!(ab_c, a_bc);
        assert_eq!(ab_c, c_b_a);
        assert_eq!(ab_c.get(selection(Layer::Perfect), 4), 2);
        assert_eq!(ab_c.get(selection(Layer::Perfect), 8), 1);
        assert_eq!(ab_c.get(selection(Layer::Common), 2), 1);
        assert_eq!(
            ab_c.get(ArraySelection::new(Layer::BestMatch, Strand::Reverse), 10),
            1
        );
        Ok(())
    }

    #[test]
    #[should_panic]
    fn test_merge_requires_equal_bounds() {
        let mut a = CoverageAccumulator::new(Span::new(1, 10).unwrap());
        let b = CoverageAccumulator::new(Span::new(1, 11).unwrap());
        a.merge_into(&b);
    }

    #[test]
    fn test_cumulative_tiers() -> eyre::Result<()> {
        let mut acc = CoverageAccumulator::new(Span::new(1, 3)?);
        acc.increment(selection(Layer::Perfect), 1);
        acc.increment(selection(Layer::BestMatch), 1);
        acc.increment(selection(Layer::Common), 1);
        acc.increment(selection(Layer::Common), 2);

        assert_eq!(acc.cumulative(Tier::Perfect, Strand::Forward, 1), 1);
        assert_eq!(acc.cumulative(Tier::BestMatch, Strand::Forward, 1), 2);
        assert_eq!(acc.cumulative(Tier::Common, Strand::Forward, 1), 3);
        assert_eq!(acc.cumulative_array(Tier::Common, Strand::Forward), vec![3, 1, 0]);
        assert_eq!(acc.cumulative_array(Tier::Common, Strand::Reverse), vec![0, 0, 0]);
        assert_eq!(
            acc.populated(),
            vec![Layer::Perfect, Layer::BestMatch, Layer::Common]
        );
        Ok(())
    }

    #[test]
    fn test_covers_bounds() -> eyre::Result<()> {
        let acc = CoverageAccumulator::new(Span::new(100, 200)?);
        assert!(acc.covers_bounds(100, 200));
        assert!(acc.covers_bounds(150, 160));
        assert!(!acc.covers_bounds(99, 160));
        assert!(!acc.covers_bounds(150, 201));
        Ok(())
    }
}
