use derive_getters::Dissolve;
use derive_more::Constructor;

use super::strand::Strand;

/// Data kept separately for the forward and the reverse strand.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Dissolve, Constructor)]
pub struct PerStrand<T> {
    pub forward: T,
    pub reverse: T,
}

impl<T> PerStrand<T> {
    pub fn get(&self, strand: Strand) -> &T {
        match strand {
            Strand::Forward => &self.forward,
            Strand::Reverse => &self.reverse,
        }
    }

    pub fn get_mut(&mut self, strand: Strand) -> &mut T {
        match strand {
            Strand::Forward => &mut self.forward,
            Strand::Reverse => &mut self.reverse,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(Strand, T) -> U) -> PerStrand<U> {
        PerStrand {
            forward: f(Strand::Forward, self.forward),
            reverse: f(Strand::Reverse, self.reverse),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Strand, &T)> {
        [(Strand::Forward, &self.forward), (Strand::Reverse, &self.reverse)].into_iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Strand, &mut T)> {
        [
            (Strand::Forward, &mut self.forward),
            (Strand::Reverse, &mut self.reverse),
        ]
        .into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_strand_access() {
        let mut data = PerStrand::new(1, 2);
        assert_eq!(*data.get(Strand::Reverse), 2);
        *data.get_mut(Strand::Forward) += 10;
        assert_eq!(data.forward, 11);

        let doubled = data.map(|_, x| x * 2);
        assert_eq!(doubled, PerStrand::new(22, 4));
        assert_eq!(
            doubled.iter().map(|(s, x)| (s, *x)).collect::<Vec<_>>(),
            vec![(Strand::Forward, 22), (Strand::Reverse, 4)]
        );
    }
}
