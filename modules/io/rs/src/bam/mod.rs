pub use builder::ConnectorBuilder;
pub use index_cache::{IndexCache, IndexedHeader};
pub use reader::{BamConnector, Reader};

mod builder;
pub mod convert;
mod index_cache;
mod query;
mod reader;
