pub use indexed_reader::{FaiEntry, IndexedReader};
pub use reference::FastaReference;

mod indexed_reader;
mod reference;
