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

use crate::message::{Offset, TopicPartition};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// general errors
    #[error("illegal state: {0}")]
    IllegalStateError(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("config file error: {0}")]
    ConfigFileError(#[from] config::ConfigError),

    #[error("telemetry setup error: {0}")]
    Telemetry(String),

    /// offset store errors
    #[error("corrupt offset record {path}: {reason}")]
    CorruptOffset { path: String, reason: String },

    #[error("commit offset {offset} for {topic_partition} failed: {source}")]
    OffsetCommit {
        topic_partition: TopicPartition,
        offset: Offset,
        #[source]
        source: std::io::Error,
    },

    /// source errors
    #[error("list partitions of topic {topic} failed: {reason}")]
    PartitionDiscovery { topic: String, reason: String },

    /// sink errors
    #[error("write {topic_partition}@{offset} failed: {reason}")]
    SinkWrite {
        topic_partition: TopicPartition,
        offset: Offset,
        reason: String,
    },

    #[error("write {topic_partition}@{offset} still rate limited after {attempts} attempts")]
    SinkRetriesExhausted {
        topic_partition: TopicPartition,
        offset: Offset,
        attempts: u32,
    },

    #[error("partition worker {0} stopped unexpectedly: {1}")]
    WorkerAborted(TopicPartition, String),
}
