pub use error::DecodeError;
pub use memory::{VecConnector, VecSource};
pub use record::{Classification, MateInfo, RawAlignment};
pub use source::{AlignmentSource, Connector, LogObserver, Observer, Records};

pub mod cigar;
mod error;
mod memory;
mod record;
mod source;
