use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{AppError, AppResult};

const ENV_PREFIX: &str = "STONE_INDEXER";
const ENV_SEPARATOR: &str = "__";

/// kafka-http proxy the partitions are read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub url: String,
    /// Upper bound on messages per fetch.
    #[serde(default = "default_step")]
    pub step: i64,
}

/// Index API the messages are written to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub url: String,
    /// Base name of the daily indices.
    pub index: String,
    /// Rate-limited attempts per write before giving up, -1 for no limit.
    #[serde(default = "default_retries")]
    pub retries: i64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the whole process when any partition worker fails.
    #[default]
    Exit,
    /// Resume the failed partition from its last committed offset.
    Restart,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub topics: Vec<String>,
    #[serde(default = "default_offset_dir")]
    pub offset_dir: PathBuf,
    #[serde(default)]
    pub on_worker_failure: FailurePolicy,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Directory of the daily rolling log file; stdout only when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Export spans over OTLP.
    #[serde(default)]
    pub otlp: bool,
}

/// Startup parameters, read once and shared read-only by every worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub source: SourceConfig,
    pub sink: SinkConfig,
    pub ingest: IngestConfig,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_step() -> i64 {
    100
}

fn default_retries() -> i64 {
    -1
}

fn default_offset_dir() -> PathBuf {
    PathBuf::from("./.offsetdb")
}

impl IndexerConfig {
    /// Loads `path` and applies `STONE_INDEXER__SECTION__KEY` overrides.
    pub fn set_up_config<P: AsRef<Path>>(path: P) -> AppResult<IndexerConfig> {
        Self::load(path, Self::environment())
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("ingest.topics")
    }

    fn load<P: AsRef<Path>>(path: P, environment: config::Environment) -> AppResult<IndexerConfig> {
        let path_str = path.as_ref().to_str().ok_or(AppError::InvalidValue(format!(
            "config file path: {}",
            path.as_ref().to_string_lossy()
        )))?;
        let config = config::Config::builder()
            .add_source(config::File::with_name(path_str))
            .add_source(environment)
            .build()?;

        let indexer_config: IndexerConfig = config.try_deserialize()?;
        indexer_config.validate()
    }

    /// Rejects values no worker could run with and normalizes urls.
    pub fn validate(mut self) -> AppResult<Self> {
        if self.ingest.topics.is_empty() {
            return Err(AppError::InvalidValue("ingest.topics is empty".to_string()));
        }
        if let Some(topic) = self.ingest.topics.iter().find(|t| t.trim().is_empty()) {
            return Err(AppError::InvalidValue(format!("ingest.topics: {:?}", topic)));
        }
        if self.source.step <= 0 {
            return Err(AppError::InvalidValue(format!(
                "source.step must be positive: {}",
                self.source.step
            )));
        }
        if self.sink.retries < -1 {
            return Err(AppError::InvalidValue(format!(
                "sink.retries must be -1 or more: {}",
                self.sink.retries
            )));
        }
        if self.sink.index.is_empty() {
            return Err(AppError::InvalidValue("sink.index is empty".to_string()));
        }
        for (name, url) in [("source.url", &mut self.source.url), ("sink.url", &mut self.sink.url)] {
            let trimmed = url.trim_end_matches('/');
            if trimmed.is_empty() {
                return Err(AppError::InvalidValue(format!("{} is empty", name)));
            }
            *url = trimmed.to_string();
        }
        Ok(self)
    }
}
