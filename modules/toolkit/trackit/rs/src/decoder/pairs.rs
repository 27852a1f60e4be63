use derive_getters::{Dissolve, Getters};
use itertools::Itertools;

use readscope_core_rs::loc::Pos;
use readscope_io_rs::alignment::MateInfo;

use crate::mapping::Mapping;

/// Placement of two mates relative to each other.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PairType {
    Perfect,
    DistanceLarge,
    DistanceSmall,
    OrientationWrong,
    OrientationWrongDistanceLarge,
    OrientationWrongDistanceSmall,
    Unpaired,
}

impl PairType {
    /// Integer code used by the `Ys` attribute.
    pub fn code(&self) -> u8 {
        match self {
            PairType::Perfect => 0,
            PairType::DistanceLarge => 1,
            PairType::DistanceSmall => 2,
            PairType::OrientationWrong => 3,
            PairType::OrientationWrongDistanceLarge => 4,
            PairType::OrientationWrongDistanceSmall => 5,
            PairType::Unpaired => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(PairType::Perfect),
            1 => Some(PairType::DistanceLarge),
            2 => Some(PairType::DistanceSmall),
            3 => Some(PairType::OrientationWrong),
            4 => Some(PairType::OrientationWrongDistanceLarge),
            5 => Some(PairType::OrientationWrongDistanceSmall),
            6 => Some(PairType::Unpaired),
            _ => None,
        }
    }
}

/// Expected library layout used to classify pairs without a stored pair type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Getters)]
pub struct PairingConfig {
    expected_distance: Pos,
    deviation_percent: u32,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            expected_distance: Self::DEFAULT_EXPECTED_DISTANCE,
            deviation_percent: Self::DEFAULT_DEVIATION_PERCENT,
        }
    }
}

impl PairingConfig {
    pub const DEFAULT_EXPECTED_DISTANCE: Pos = 300;
    pub const DEFAULT_DEVIATION_PERCENT: u32 = 10;

    pub fn new(expected_distance: Pos, deviation_percent: u32) -> eyre::Result<Self> {
        eyre::ensure!(
            expected_distance > 0,
            "Expected distance between mates must be positive"
        );
        eyre::ensure!(
            deviation_percent <= 100,
            "Deviation must be a percentage, got {deviation_percent}"
        );
        Ok(Self {
            expected_distance,
            deviation_percent,
        })
    }

    /// Classify two mates by orientation (forward mate on the left, reverse on the right) and by
    /// the distance they span.
    pub fn classify(&self, a: &Mapping, b: &Mapping) -> PairType {
        let (left, right) = if a.start() <= b.start() { (a, b) } else { (b, a) };
        let oriented = *left.is_forward() && !*right.is_forward();

        let distance = (*left.stop()).max(*right.stop()) - left.start() + 1;
        let deviation = self.expected_distance * self.deviation_percent as Pos / 100;
        let too_small = distance < self.expected_distance - deviation;
        let too_large = distance > self.expected_distance + deviation;

        match (oriented, too_small, too_large) {
            (true, false, false) => PairType::Perfect,
            (true, true, _) => PairType::DistanceSmall,
            (true, _, true) => PairType::DistanceLarge,
            (false, false, false) => PairType::OrientationWrong,
            (false, true, _) => PairType::OrientationWrongDistanceSmall,
            (false, _, true) => PairType::OrientationWrongDistanceLarge,
        }
    }
}

/// Two mates of one read pair.
#[derive(Clone, PartialEq, Eq, Debug, Getters, Dissolve)]
pub struct MappingPair {
    first: Mapping,
    second: Mapping,
    pair_type: PairType,
    /// False if the second mate was synthesized from the mate position of the first one.
    mate_visible: bool,
}

/// Every mapping of one pair id in a track.
#[derive(Clone, PartialEq, Eq, Debug, Getters, Dissolve)]
pub struct ReadPairGroup {
    track: usize,
    id: u64,
    pairs: Vec<MappingPair>,
    singles: Vec<Mapping>,
}

impl ReadPairGroup {
    /// Leftmost start of all mappings in the group.
    pub fn start(&self) -> Pos {
        self.pairs
            .iter()
            .flat_map(|p| [*p.first.start(), *p.second.start()])
            .chain(self.singles.iter().map(|m| *m.start()))
            .min()
            .unwrap_or(Pos::MAX)
    }
}

/// Decoded mapping waiting to be grouped.
#[derive(Clone, Debug)]
pub struct PairCandidate {
    pub id: u64,
    pub mapping: Mapping,
    pub mate: Option<MateInfo>,
    pub pair_type: Option<u8>,
}

impl PairCandidate {
    fn is_last(&self) -> bool {
        self.mate.is_some_and(|m| m.is_last && !m.is_first)
    }

    fn mate_start(&self) -> Option<Pos> {
        self.mate.and_then(|m| m.start)
    }

    fn is_mate_of(&self, other: &PairCandidate) -> bool {
        self.mate_start() == Some(*other.mapping.start())
            && other.mate_start() == Some(*self.mapping.start())
    }
}

/// Group candidates of a track by pair id. Mates are matched through their mate positions,
/// mates that weren't fetched are synthesized, everything else ends up as single mappings.
pub fn bundle(
    track: usize,
    candidates: Vec<PairCandidate>,
    config: &PairingConfig,
) -> Vec<ReadPairGroup> {
    let chunks = candidates
        .into_iter()
        .sorted_by_key(|c| (c.id, *c.mapping.start()))
        .chunk_by(|c| c.id);

    let mut groups = Vec::new();
    for (id, chunk) in &chunks {
        let (mut seconds, firsts): (Vec<_>, Vec<_>) = chunk.partition(|c| c.is_last());

        let mut pairs = Vec::new();
        let mut orphans = Vec::new();
        for first in firsts {
            match seconds.iter().position(|s| first.is_mate_of(s)) {
                Some(ind) => {
                    let second = seconds.remove(ind);
                    let pair_type = stored_type(&first, &second)
                        .unwrap_or_else(|| config.classify(&first.mapping, &second.mapping));
                    pairs.push(MappingPair {
                        first: first.mapping,
                        second: second.mapping,
                        pair_type,
                        mate_visible: true,
                    });
                }
                None => orphans.push(first),
            }
        }
        orphans.extend(seconds);

        let mut singles = Vec::new();
        for orphan in orphans.into_iter().sorted_by_key(|c| *c.mapping.start()) {
            match orphan.mate {
                Some(MateInfo {
                    start: Some(start),
                    is_reverse,
                    ..
                }) => {
                    let mate = orphan.mapping.synthesized_mate(start, !is_reverse);
                    let pair_type = orphan
                        .pair_type
                        .and_then(PairType::from_code)
                        .unwrap_or_else(|| config.classify(&orphan.mapping, &mate));
                    pairs.push(MappingPair {
                        first: orphan.mapping,
                        second: mate,
                        pair_type,
                        mate_visible: false,
                    });
                }
                _ => singles.push(orphan.mapping),
            }
        }

        groups.push(ReadPairGroup {
            track,
            id,
            pairs,
            singles,
        });
    }

    groups.sort_by_key(|g| (g.start(), g.id));
    groups
}

fn stored_type(first: &PairCandidate, second: &PairCandidate) -> Option<PairType> {
    first
        .pair_type
        .or(second.pair_type)
        .and_then(PairType::from_code)
}
