pub use backoff::{Backoff, BackoffPolicy};

mod backoff;
pub(crate) mod rest;
