pub use app_error::{AppError, AppResult};
pub use config::{FailurePolicy, IndexerConfig, IngestConfig, LogConfig, SinkConfig, SourceConfig};
pub use supervisor::Supervisor;
pub use tracing_config::{setup_local_tracing, setup_tracing, LogGuard};

mod app_error;
mod config;
mod supervisor;
mod tracing_config;
