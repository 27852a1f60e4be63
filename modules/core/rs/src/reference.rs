use std::sync::Arc;

use ahash::AHashMap;
use derive_getters::{Dissolve, Getters};
use derive_more::Constructor;
use eyre::{eyre, Result};
use impl_tools::autoimpl;

use crate::loc::{Pos, Span};

/// Name and length of a reference chromosome.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Constructor, Dissolve, Getters)]
pub struct Chromosome {
    name: String,
    length: Pos,
}

impl Chromosome {
    /// The whole chromosome as a span.
    pub fn span(&self) -> Span {
        Span::new_unchecked(1, self.length.max(1))
    }
}

/// Read-only access to the reference genome. Implementations must be safe to share between
/// workers.
#[autoimpl(for<T: trait + ?Sized> &T, Box<T>, Arc<T>)]
pub trait Reference: Send + Sync {
    /// Name and length of the chromosome with the given id.
    fn chromosome(&self, id: usize) -> Option<Chromosome>;

    /// Uppercase reference bases of the chromosome in the closed 1-based range [from, to]. The
    /// range must lie inside the chromosome.
    fn sequence(&self, id: usize, from: Pos, to: Pos) -> Result<Vec<u8>>;
}

/// Reference genome held entirely in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryReference {
    chromosomes: Vec<(Chromosome, Vec<u8>)>,
    ids: AHashMap<String, usize>,
}

impl InMemoryReference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chromosome and return its id.
    pub fn add(&mut self, name: impl Into<String>, sequence: impl AsRef<[u8]>) -> Result<usize> {
        let name = name.into();
        let sequence = sequence.as_ref().to_ascii_uppercase();
        if sequence.is_empty() {
            return Err(eyre!("Reference sequence {name} is empty"));
        }
        if self.ids.contains_key(&name) {
            return Err(eyre!("Duplicated reference sequence: {name}"));
        }

        let id = self.chromosomes.len();
        self.ids.insert(name.clone(), id);
        self.chromosomes
            .push((Chromosome::new(name, sequence.len() as Pos), sequence));
        Ok(id)
    }

    pub fn with(mut self, name: impl Into<String>, sequence: impl AsRef<[u8]>) -> Result<Self> {
        self.add(name, sequence)?;
        Ok(self)
    }

    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.ids.get(name).copied()
    }
}

impl Reference for InMemoryReference {
    fn chromosome(&self, id: usize) -> Option<Chromosome> {
        self.chromosomes.get(id).map(|(chr, _)| chr.clone())
    }

    fn sequence(&self, id: usize, from: Pos, to: Pos) -> Result<Vec<u8>> {
        let (chr, seq) = self
            .chromosomes
            .get(id)
            .ok_or_else(|| eyre!("Unknown chromosome id: {id}"))?;
        let requested = Span::new(from, to)?;
        if !chr.span().covers(&requested) {
            return Err(eyre!(
                "Range {requested} is outside of chromosome {} (1-{})",
                chr.name(),
                chr.length()
            ));
        }
        Ok(seq[(from - 1) as usize..to as usize].to_vec())
    }
}
