pub use record::{Batch, Message};
pub use topic_partition::{Offset, PartitionInfo, TopicPartition};

mod record;
mod topic_partition;
