pub use partition_worker::{PartitionWorker, StepOutcome};

mod partition_worker;
#[cfg(test)]
pub(crate) mod test_utils;
