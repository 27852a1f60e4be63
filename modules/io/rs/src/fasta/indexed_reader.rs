use std::io::{BufRead, Read, Seek, SeekFrom};

use derive_getters::{Dissolve, Getters};
use eyre::{ensure, eyre, Context, Result};

/// Layout of one reference sequence inside a FASTA file, as described by its `.fai` line.
#[derive(Debug, Clone, PartialEq, Eq, Dissolve, Getters)]
pub struct FaiEntry {
    id: String,
    // Total length of the sequence, in bases
    length: u64,
    // Offset in the FASTA file of the first base of the sequence
    offset: u64,
    bases_per_line: u64,
    // Number of bytes per line including line ending character[s]
    bytes_per_line: u64,
}

impl FaiEntry {
    fn parse(line: &str) -> Result<Self> {
        let err = || eyre!("Invalid FASTA index line: {}", line.trim_end());
        let mut parts = line.trim_end_matches(['\r', '\n']).split('\t');

        let id = parts.next().ok_or_else(err)?.to_string();
        let mut number = |what: &str| -> Result<u64> {
            parts
                .next()
                .ok_or_else(err)?
                .parse::<u64>()
                .wrap_err_with(|| format!("Invalid {what} in the FASTA index line: {}", line.trim_end()))
        };
        let length = number("length")?;
        let offset = number("offset")?;
        let bases_per_line = number("bases per line")?;
        let bytes_per_line = number("bytes per line")?;

        ensure!(length > 0, "Reference sequence {id} is empty");
        ensure!(bases_per_line > 0, "Bases per line must be positive for {id}");
        ensure!(
            bytes_per_line > bases_per_line,
            "Bytes per line must exceed bases per line for {id}"
        );
        ensure!(parts.next().is_none(), "Extra fields in the FASTA index: {}", line.trim_end());

        Ok(Self {
            id,
            length,
            offset,
            bases_per_line,
            bytes_per_line,
        })
    }
}

/// Random access to the sequences of a FASTA file with a `.fai` index.
#[derive(Debug, Clone, Dissolve, Getters)]
pub struct IndexedReader<R> {
    reader: R,
    entries: Vec<FaiEntry>,
}

impl<R: Read + Seek> IndexedReader<R> {
    pub fn new<I: BufRead>(reader: R, index: I) -> Result<Self> {
        let mut entries = Vec::new();
        for line in index.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(FaiEntry::parse(&line)?);
        }
        Ok(Self { reader, entries })
    }

    /// Fetch bases [start, end) (0-based, half-open) of the sequence with the given index into
    /// the buffer. Line endings are skipped.
    pub fn fetch(&mut self, seq: usize, start: u64, end: u64, buffer: &mut Vec<u8>) -> Result<()> {
        let entry = self
            .entries
            .get(seq)
            .ok_or_else(|| eyre!("Reference sequence #{seq} is not in the FASTA index"))?;
        ensure!(
            start < end && end <= entry.length,
            "Range [{start}, {end}) is out of bounds for {} (length {})",
            entry.id,
            entry.length
        );

        let (offset, bases_per_line, bytes_per_line) =
            (entry.offset, entry.bases_per_line, entry.bytes_per_line);

        buffer.clear();
        buffer.try_reserve((end - start) as usize)?;

        let mut position = start;
        let mut line = start / bases_per_line;
        self.reader.seek(SeekFrom::Start(
            offset + line * bytes_per_line + start % bases_per_line,
        ))?;
        while position < end {
            let line_end = ((line + 1) * bases_per_line).min(end);
            self.reader
                .by_ref()
                .take(line_end - position)
                .read_to_end(buffer)?;
            position = line_end;
            line += 1;
            if position < end {
                self.reader
                    .seek(SeekFrom::Start(offset + line * bytes_per_line))?;
            }
        }

        ensure!(
            buffer.len() as u64 == end - start,
            "FASTA file is shorter than its index claims for {}",
            entry.id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const FASTA: &str = ">chr1 test\nACGTA\nCGTAC\nGG\n>chr2\nttttt\nccc\n";
    const FAI: &str = "chr1\t12\t11\t5\t6\nchr2\t8\t32\t5\t6\n";

    #[test]
    fn test_fetch_across_lines() -> Result<()> {
        let mut reader = IndexedReader::new(Cursor::new(FASTA), Cursor::new(FAI))?;
        let mut buffer = Vec::new();

        reader.fetch(0, 0, 12, &mut buffer)?;
        assert_eq!(buffer, b"ACGTACGTACGG");

        reader.fetch(0, 3, 7, &mut buffer)?;
        assert_eq!(buffer, b"TACG");

        reader.fetch(1, 4, 8, &mut buffer)?;
        assert_eq!(buffer, b"tccc");
        Ok(())
    }

    #[test]
    fn test_fetch_out_of_bounds() -> Result<()> {
        let mut reader = IndexedReader::new(Cursor::new(FASTA), Cursor::new(FAI))?;
        let mut buffer = Vec::new();
        assert!(reader.fetch(0, 10, 13, &mut buffer).is_err());
        assert!(reader.fetch(0, 5, 5, &mut buffer).is_err());
        assert!(reader.fetch(2, 0, 1, &mut buffer).is_err());
        Ok(())
    }

    #[test]
    fn test_invalid_index() {
        for fai in ["chr1\t12\t11\t5\n", "chr1\t0\t11\t5\t6\n", "chr1\t12\t11\t5\t5\n", "chr1\tx\t11\t5\t6\n"] {
            assert!(IndexedReader::new(Cursor::new(FASTA), Cursor::new(fai)).is_err());
        }
    }
}
