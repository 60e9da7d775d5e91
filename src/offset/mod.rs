//! Durable per-partition read progress.
//!
//! A store holds the *next* offset to read for exactly one partition. The
//! persisted value is always one past the last message that was written to
//! the sink, so a restarted worker may replay but never skip.

use std::future::Future;

use crate::message::Offset;
use crate::AppResult;

mod file_store;

pub use file_store::FileOffsetStore;

pub trait OffsetStore: Send {
    /// Next offset to read, 0 if nothing was ever committed.
    fn get(&self) -> Offset;

    /// Persist `offset + 1` as the next offset to read. The cached value
    /// changes only after the durable write succeeded.
    fn commit(&mut self, offset: Offset) -> impl Future<Output = AppResult<()>> + Send;
}
