pub mod message;
pub mod offset;
pub mod service;
pub mod sink;
pub mod source;
mod utils;
pub mod worker;

pub use message::{Message, Offset, PartitionInfo, TopicPartition};
pub use offset::{FileOffsetStore, OffsetStore};
pub use service::{
    setup_local_tracing, setup_tracing, AppError, AppResult, FailurePolicy, IndexerConfig,
    LogGuard, Supervisor,
};
pub use sink::{DocumentSink, ElasticSink, WriteError};
pub use source::{FetchError, HttpLogSource, LogSource};
pub use utils::{Backoff, BackoffPolicy};
