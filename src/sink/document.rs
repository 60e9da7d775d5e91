use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::value::RawValue;

use crate::message::{Message, Offset, TopicPartition};

const NANOS_PER_MILLI: i64 = 1_000_000;

/// Where a document goes: a dated index plus the topic as document type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexTarget {
    pub index: String,
    pub doc_type: String,
}

impl IndexTarget {
    /// `{base}-{YYYY-MM-DD}` by the UTC date of the acceptance time,
    /// truncated to milliseconds.
    pub fn for_message(index_base: &str, topic: &str, accepted_nanos: i64) -> Self {
        let millis = accepted_nanos.div_euclid(NANOS_PER_MILLI);
        // i64 milliseconds overflow chrono's range only far outside any real
        // acceptance time; clamp rather than fail the write
        let date = DateTime::<Utc>::from_timestamp_millis(millis)
            .unwrap_or(if millis < 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            })
            .format("%Y-%m-%d");

        Self {
            index: format!("{}-{}", index_base, date),
            doc_type: topic.to_string(),
        }
    }
}

/// The indexed form of a message: routing metadata under `@` keys next to
/// the untouched payloads.
#[derive(Debug, Serialize)]
pub struct IndexDocument<'a> {
    #[serde(rename = "@timestamp")]
    pub timestamp: i64,
    #[serde(rename = "@topic")]
    pub topic: &'a str,
    #[serde(rename = "@partition")]
    pub partition: i32,
    #[serde(rename = "@offset")]
    pub offset: Offset,
    pub id: &'a str,
    pub accepted: i64,
    pub sender: &'a RawValue,
    pub data: &'a RawValue,
}

impl<'a> IndexDocument<'a> {
    pub fn new(topic_partition: &'a TopicPartition, offset: Offset, message: &'a Message) -> Self {
        Self {
            timestamp: message.accepted.div_euclid(NANOS_PER_MILLI),
            topic: &topic_partition.topic,
            partition: topic_partition.partition,
            offset,
            id: &message.id,
            accepted: message.accepted,
            sender: &message.sender,
            data: &message.data,
        }
    }
}
