use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::json;

use crate::message::{Batch, Message, Offset, PartitionInfo, TopicPartition};
use crate::offset::OffsetStore;
use crate::service::{FailurePolicy, IngestConfig, LogConfig, SinkConfig, SourceConfig};
use crate::sink::{DocumentSink, IndexDocument, IndexTarget, WriteError};
use crate::source::{FetchError, LogSource};
use crate::{AppError, AppResult, IndexerConfig};

pub fn message(id: &str, accepted: i64) -> Message {
    let raw = json!({
        "ID": id,
        "Accepted": accepted,
        "Sender": {"host": "web-1"},
        "Data": {"seq": id},
    });
    serde_json::from_str(&raw.to_string()).unwrap()
}

pub fn test_config(retries: i64) -> IndexerConfig {
    IndexerConfig {
        source: SourceConfig {
            url: "http://proxy.invalid".to_string(),
            step: 100,
        },
        sink: SinkConfig {
            url: "http://index.invalid".to_string(),
            index: "logs".to_string(),
            retries,
        },
        ingest: IngestConfig {
            topics: vec!["events".to_string()],
            offset_dir: PathBuf::from("./.offsetdb"),
            on_worker_failure: FailurePolicy::Exit,
        },
        log: LogConfig::default(),
    }
}

/// Replays a fixed list of fetch outcomes, then reports an idle partition.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Batch, FetchError>>>,
    requests: Mutex<Vec<(Offset, i64)>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Batch, FetchError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::default(),
        }
    }

    /// `(offset, limit)` of every fetch so far.
    pub fn requests(&self) -> Vec<(Offset, i64)> {
        self.requests.lock().unwrap().clone()
    }
}

impl LogSource for ScriptedSource {
    async fn list_partitions(&self, topic: &str) -> AppResult<Vec<PartitionInfo>> {
        Ok(vec![PartitionInfo {
            topic: topic.to_string(),
            partition: 0,
            offset_from: 0,
            offset_to: 0,
        }])
    }

    async fn fetch_batch(
        &self,
        _topic_partition: &TopicPartition,
        offset: Offset,
        limit: i64,
    ) -> Result<Batch, FetchError> {
        self.requests.lock().unwrap().push((offset, limit));
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(outcome) => outcome,
            None => {
                // stands in for the round trip to an idle proxy
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(vec![])
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    written: Mutex<Vec<(String, Offset)>>,
    attempts: Mutex<HashMap<String, u32>>,
    rate_limited: HashMap<String, u32>,
    rejected: HashSet<String>,
}

impl RecordingSink {
    /// Answers the first `times` writes of `id` with a rate limit.
    pub fn rate_limit(mut self, id: &str, times: u32) -> Self {
        self.rate_limited.insert(id.to_string(), times);
        self
    }

    pub fn reject(mut self, id: &str) -> Self {
        self.rejected.insert(id.to_string());
        self
    }

    pub fn written_ids(&self) -> Vec<String> {
        self.written
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn written_offsets(&self) -> Vec<Offset> {
        self.written
            .lock()
            .unwrap()
            .iter()
            .map(|(_, offset)| *offset)
            .collect()
    }

    pub fn attempts(&self, id: &str) -> u32 {
        self.attempts.lock().unwrap().get(id).copied().unwrap_or(0)
    }
}

impl DocumentSink for RecordingSink {
    async fn write(
        &self,
        _target: &IndexTarget,
        id: &str,
        document: &IndexDocument<'_>,
    ) -> Result<(), WriteError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let attempt = attempts.entry(id.to_string()).or_insert(0);
            *attempt += 1;
            *attempt
        };
        if self.rejected.contains(id) {
            return Err(WriteError::Permanent {
                status: Some(400),
                reason: format!("{} rejected", id),
            });
        }
        if attempt <= self.rate_limited.get(id).copied().unwrap_or(0) {
            return Err(WriteError::RateLimited);
        }
        self.written
            .lock()
            .unwrap()
            .push((id.to_string(), document.offset));
        Ok(())
    }
}

/// In-memory store that records every commit and can be told to fail one.
#[derive(Debug)]
pub struct MemoryOffsetStore {
    topic_partition: TopicPartition,
    next: Offset,
    commits: Vec<Offset>,
    fail_at: Option<Offset>,
}

impl MemoryOffsetStore {
    pub fn new(next: Offset) -> Self {
        Self {
            topic_partition: TopicPartition::new("events", 0),
            next,
            commits: vec![],
            fail_at: None,
        }
    }

    pub fn fail_commit_at(mut self, offset: Offset) -> Self {
        self.fail_at = Some(offset);
        self
    }

    pub fn commits(&self) -> Vec<Offset> {
        self.commits.clone()
    }
}

impl OffsetStore for MemoryOffsetStore {
    fn get(&self) -> Offset {
        self.next
    }

    async fn commit(&mut self, offset: Offset) -> AppResult<()> {
        if self.fail_at == Some(offset) {
            return Err(AppError::OffsetCommit {
                topic_partition: self.topic_partition.clone(),
                offset,
                source: io::Error::new(io::ErrorKind::Other, "disk full"),
            });
        }
        self.commits.push(offset);
        self.next = offset + 1;
        Ok(())
    }
}
