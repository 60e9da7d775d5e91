// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Partition Worker
//!
//! Owns one topic partition for the lifetime of the process and moves its
//! messages into the index:
//!
//! ```text
//!            +------------------ Transient / any other RangeInvalid: backoff, same offset
//!            |
//! fetch(offset) ---- RangeInvalid, offset < offset_from <= offset_to: commit(offset_to - 1), offset = offset_to
//!            |
//!            +-- batch --> for i, msg: write(msg) --> commit(offset + i) ; offset += len
//! ```
//!
//! A message is committed only after the index accepted it, so after a crash
//! the worker replays from the last commit and at worst writes a document a
//! second time; writes are keyed by message id, which makes that harmless.
//!
//! The worker never gives up on fetch failures. Anything it cannot get past
//! on the write side, and any failure to persist progress, ends `run` with an
//! error for the supervisor to act on.

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{error, info, trace, warn};

use crate::message::{Batch, Message, Offset, TopicPartition};
use crate::offset::OffsetStore;
use crate::sink::{DocumentSink, IndexDocument, IndexTarget, WriteError};
use crate::source::{FetchError, LogSource};
use crate::utils::BackoffPolicy;
use crate::{AppError, AppResult, IndexerConfig};

/// What a single iteration of the loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Wrote and committed this many messages; zero for an empty batch.
    Processed(usize),
    /// The source no longer had `[from, ...)`; jumped ahead to `to`.
    Skipped { from: Offset, to: Offset },
    /// The fetch failed and the worker slept before the next attempt.
    BackedOff,
}

pub struct PartitionWorker<S, K, O> {
    topic_partition: TopicPartition,
    source: Arc<S>,
    sink: Arc<K>,
    store: O,
    config: Arc<IndexerConfig>,
    /// Next offset to fetch.
    offset: Offset,
    fetch_policy: BackoffPolicy,
    /// Consecutive failed fetches, reset by any usable answer.
    fetch_failures: u32,
    sink_policy: BackoffPolicy,
}

impl<S, K, O> PartitionWorker<S, K, O>
where
    S: LogSource,
    K: DocumentSink,
    O: OffsetStore,
{
    pub fn new(
        topic_partition: TopicPartition,
        source: Arc<S>,
        sink: Arc<K>,
        store: O,
        config: Arc<IndexerConfig>,
    ) -> Self {
        let offset = store.get();
        let sink_policy = BackoffPolicy::rate_limited(config.sink.retries);
        Self {
            topic_partition,
            source,
            sink,
            store,
            config,
            offset,
            fetch_policy: BackoffPolicy::fetch(),
            fetch_failures: 0,
            sink_policy,
        }
    }

    pub fn topic_partition(&self) -> &TopicPartition {
        &self.topic_partition
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn store(&self) -> &O {
        &self.store
    }

    /// Runs until a fatal error; there is no successful return.
    pub async fn run(mut self) -> AppResult<()> {
        info!(
            "partition worker {} starting at offset {}",
            self.topic_partition, self.offset
        );
        loop {
            self.step().await?;
        }
    }

    /// One fetch and everything that follows from its outcome.
    pub async fn step(&mut self) -> AppResult<StepOutcome> {
        let fetched = self
            .source
            .fetch_batch(&self.topic_partition, self.offset, self.config.source.step)
            .await;

        match fetched {
            Ok(batch) => {
                self.fetch_failures = 0;
                let count = self.process_batch(batch).await?;
                Ok(StepOutcome::Processed(count))
            }
            Err(FetchError::RangeInvalid {
                offset_from,
                offset_to,
            }) if offset_from > self.offset && offset_to >= offset_from => {
                warn!(
                    offset = self.offset,
                    offset_from,
                    offset_to,
                    "{}: messages [{}, {}) expired before they were read, skipping to {}",
                    self.topic_partition,
                    self.offset,
                    offset_from,
                    offset_to
                );
                self.store.commit(offset_to - 1).await?;
                let from = self.offset;
                self.offset = offset_to;
                self.fetch_failures = 0;
                Ok(StepOutcome::Skipped {
                    from,
                    to: offset_to,
                })
            }
            Err(err @ FetchError::RangeInvalid { .. }) => {
                // the window does not lie ahead of us: stale or malformed
                warn!(
                    offset = self.offset,
                    "topic={} partition={} err={}",
                    self.topic_partition.topic,
                    self.topic_partition.partition,
                    err
                );
                self.back_off().await;
                Ok(StepOutcome::BackedOff)
            }
            Err(err @ FetchError::Transient(_)) => {
                error!(
                    offset = self.offset,
                    "topic={} partition={} err={}",
                    self.topic_partition.topic,
                    self.topic_partition.partition,
                    err
                );
                self.back_off().await;
                Ok(StepOutcome::BackedOff)
            }
        }
    }

    async fn back_off(&mut self) {
        self.fetch_failures = self.fetch_failures.saturating_add(1);
        let delay = self.fetch_policy.delay();
        trace!(
            "{}: fetch retry {} in {:?}",
            self.topic_partition,
            self.fetch_failures,
            delay
        );
        sleep(delay).await;
    }

    async fn process_batch(&mut self, batch: Batch) -> AppResult<usize> {
        for (idx, message) in batch.iter().enumerate() {
            let offset = self.offset + idx as Offset;
            self.process_message(offset, message).await?;
            self.store.commit(offset).await?;
        }
        self.offset += batch.len() as Offset;
        Ok(batch.len())
    }

    async fn process_message(&self, offset: Offset, message: &Message) -> AppResult<()> {
        let target = IndexTarget::for_message(
            &self.config.sink.index,
            &self.topic_partition.topic,
            message.accepted,
        );
        let document = IndexDocument::new(&self.topic_partition, offset, message);

        let mut retries = self.sink_policy.delays();
        loop {
            match self.sink.write(&target, &message.id, &document).await {
                Ok(()) => break,
                Err(WriteError::RateLimited) => match retries.next() {
                    Some(delay) => {
                        warn!(
                            offset,
                            "{}: index {} rate limited write of {}, retry {} in {:?}",
                            self.topic_partition,
                            target.index,
                            message.id,
                            retries.attempt(),
                            delay
                        );
                        sleep(delay).await;
                    }
                    None => {
                        return Err(AppError::SinkRetriesExhausted {
                            topic_partition: self.topic_partition.clone(),
                            offset,
                            attempts: retries.attempt() + 1,
                        })
                    }
                },
                Err(err @ WriteError::Permanent { .. }) => {
                    return Err(AppError::SinkWrite {
                        topic_partition: self.topic_partition.clone(),
                        offset,
                        reason: err.to_string(),
                    })
                }
            }
        }

        info!(
            "{}:{}: {}",
            self.topic_partition.partition, offset, message.id
        );
        Ok(())
    }
}
