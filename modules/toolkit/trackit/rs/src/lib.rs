pub use aggregate::Aggregation;
pub use coverage::{ArraySelection, CoverageAccumulator, Layer, Tier};
pub use mapping::{Diff, Mapping, ReferenceGap};
pub use request::{
    DataKind, IntervalRequest, ReadClassFilter, RequestBuilder, Requester, RequesterRef,
    StrandMode, TrackSelector,
};
pub use result::{CoverageResult, Delivery, Layered, TrackResult};
pub use track::Track;
pub use worker::{Worker, WorkerBuilder, WorkerCore};

pub mod aggregate;
pub mod coverage;
pub mod decoder;
pub mod mapping;
pub mod request;
pub mod result;
pub mod track;
pub mod worker;
