use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Mutex;

use eyre::{ensure, eyre, Context, Result};

use readscope_core_rs::loc::Pos;
use readscope_core_rs::reference::{Chromosome, Reference};

use super::indexed_reader::IndexedReader;

/// Reference genome backed by an uncompressed FASTA file and its `.fai` index. Lookups from
/// several workers are serialized on the file handle.
pub struct FastaReference {
    chromosomes: Vec<Chromosome>,
    reader: Mutex<IndexedReader<BufReader<File>>>,
}

impl FastaReference {
    pub fn from_path(fasta: impl AsRef<Path>) -> Result<Self> {
        let fasta = fasta.as_ref();
        let mut fai = fasta.as_os_str().to_owned();
        fai.push(".fai");
        let fai = Path::new(&fai);
        ensure!(fai.exists(), "fai index does not exist: {}", fai.display());

        let reader = IndexedReader::new(
            BufReader::new(File::open(fasta).wrap_err_with(|| {
                format!("Failed to open FASTA file: {}", fasta.display())
            })?),
            BufReader::new(File::open(fai)?),
        )?;
        Ok(Self::new(reader))
    }

    pub fn new(reader: IndexedReader<BufReader<File>>) -> Self {
        let chromosomes = reader
            .entries()
            .iter()
            .map(|x| Chromosome::new(x.id().clone(), *x.length() as Pos))
            .collect();
        Self {
            chromosomes,
            reader: Mutex::new(reader),
        }
    }
}

impl Reference for FastaReference {
    fn chromosome(&self, id: usize) -> Option<Chromosome> {
        self.chromosomes.get(id).cloned()
    }

    fn sequence(&self, id: usize, from: Pos, to: Pos) -> Result<Vec<u8>> {
        ensure!(
            from >= 1 && from <= to,
            "Invalid reference range {from}-{to}"
        );
        let mut buffer = Vec::new();
        self.reader
            .lock()
            .map_err(|_| eyre!("FASTA reader lock is poisoned"))?
            .fetch(id, (from - 1) as u64, to as u64, &mut buffer)?;
        buffer.make_ascii_uppercase();
        Ok(buffer)
    }
}
