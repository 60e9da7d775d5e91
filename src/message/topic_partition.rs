use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Position of the next unread message in a partition's log.
pub type Offset = i64;

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl Display for TopicPartition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }

    /// Key used to address this partition's offset record.
    pub fn id(&self) -> String {
        format!("{}-{}", self.topic, self.partition)
    }
}

/// Partition descriptor as reported by the proxy's topic listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PartitionInfo {
    pub topic: String,
    pub partition: i32,
    pub offset_from: Offset,
    pub offset_to: Offset,
}

impl PartitionInfo {
    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }
}
