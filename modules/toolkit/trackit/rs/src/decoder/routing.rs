use readscope_core_rs::loc::Strand;
use readscope_io_rs::alignment::Classification;

use crate::coverage::{ArraySelection, Layer, Tier};
use crate::request::StrandMode;

/// Array set a decoded track writes its counts to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Slot {
    /// Classification tier arrays.
    #[default]
    Tiers,
    /// Raw arrays of the first track in a two-track accumulator.
    Track1,
    /// Raw arrays of the second track in a two-track accumulator.
    Track2,
}

/// Pick the single array a record is counted in.
pub fn route(
    classification: Option<Classification>,
    strand: Strand,
    slot: Slot,
    mode: StrandMode,
) -> ArraySelection {
    let layer = match slot {
        Slot::Tiers => Tier::of(classification).into(),
        Slot::Track1 => Layer::Track1,
        Slot::Track2 => Layer::Track2,
    };
    ArraySelection::new(layer, mode.apply(strand))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route() {
        let sel = route(
            Some(Classification::BestMatch),
            Strand::Forward,
            Slot::Tiers,
            StrandMode::FeatureStrand,
        );
        assert_eq!(sel, ArraySelection::new(Layer::BestMatch, Strand::Forward));

        let sel = route(None, Strand::Forward, Slot::Tiers, StrandMode::OppositeStrand);
        assert_eq!(sel, ArraySelection::new(Layer::Common, Strand::Reverse));

        let sel = route(
            Some(Classification::Perfect),
            Strand::Reverse,
            Slot::Track2,
            StrandMode::BothCombined { as_forward: true },
        );
        assert_eq!(sel, ArraySelection::new(Layer::Track2, Strand::Forward));
    }
}
