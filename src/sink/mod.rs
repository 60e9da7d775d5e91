//! Writing side: one message becomes one document in the index.

use std::future::Future;

mod document;
mod elastic;

pub use document::{IndexDocument, IndexTarget};
pub use elastic::ElasticSink;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    /// The index asked us to slow down; the same write may be retried.
    #[error("rate limited")]
    RateLimited,

    /// Not retried by the sink. `status` is absent when no response arrived.
    #[error("permanent write failure (status {status:?}): {reason}")]
    Permanent { status: Option<u16>, reason: String },
}

pub trait DocumentSink: Send + Sync + 'static {
    /// Upserts `document` under `id`; writing the same id twice leaves a
    /// single document.
    fn write(
        &self,
        target: &IndexTarget,
        id: &str,
        document: &IndexDocument<'_>,
    ) -> impl Future<Output = Result<(), WriteError>> + Send;
}
