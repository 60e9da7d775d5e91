//! Reading side: the kafka-http proxy.

use std::future::Future;

use crate::message::{Batch, Offset, PartitionInfo, TopicPartition};
use crate::AppResult;

mod http;

pub use http::HttpLogSource;

/// Non-batch outcomes of a fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The requested offset lies outside `[offset_from, offset_to)`, the
    /// window the partition can currently serve.
    #[error("offset out of range ({offset_from}, {offset_to})")]
    RangeInvalid {
        offset_from: Offset,
        offset_to: Offset,
    },

    /// Anything else: network failures, malformed bodies, unexpected status.
    #[error("transient fetch error: {0}")]
    Transient(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(value: reqwest::Error) -> Self {
        FetchError::Transient(value.to_string())
    }
}

pub trait LogSource: Send + Sync + 'static {
    /// Partitions of `topic` with their currently valid offset windows.
    fn list_partitions(
        &self,
        topic: &str,
    ) -> impl Future<Output = AppResult<Vec<PartitionInfo>>> + Send;

    /// Up to `limit` messages starting at `offset`. An empty batch means
    /// nothing has been written at `offset` yet.
    fn fetch_batch(
        &self,
        topic_partition: &TopicPartition,
        offset: Offset,
        limit: i64,
    ) -> impl Future<Output = Result<Batch, FetchError>> + Send;
}
