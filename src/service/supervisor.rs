use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::task::{AbortHandle, JoinSet};
use tokio::time::sleep;
use tracing::{error, info, info_span, warn, Instrument};

use super::{AppError, AppResult, FailurePolicy, IndexerConfig};
use crate::message::TopicPartition;
use crate::offset::{FileOffsetStore, OffsetStore};
use crate::sink::{DocumentSink, ElasticSink};
use crate::source::{HttpLogSource, LogSource};
use crate::utils::BackoffPolicy;
use crate::worker::PartitionWorker;

type WorkerTasks = JoinSet<(TopicPartition, AppResult<()>)>;

/// Runs one partition worker per discovered partition and decides what a
/// worker failure means for the process.
pub struct Supervisor {
    config: Arc<IndexerConfig>,
}

impl Supervisor {
    pub fn new(config: Arc<IndexerConfig>) -> Self {
        Supervisor { config }
    }

    /// Runs against the configured proxy and index until ctrl-c or a fatal
    /// worker error.
    pub async fn run(&self) -> AppResult<()> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::IllegalStateError(format!("build http client: {}", e)))?;
        let source = Arc::new(HttpLogSource::new(
            client.clone(),
            &self.config.source.url,
        ));
        let sink = Arc::new(ElasticSink::new(client, &self.config.sink.url)?);

        self.run_with(source, sink, async {
            if let Err(err) = signal::ctrl_c().await {
                error!("listen for shutdown signal failed: {}", err);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Same as [`Supervisor::run`] with the clients and the shutdown trigger
    /// supplied by the caller.
    pub async fn run_with<S, K>(
        &self,
        source: Arc<S>,
        sink: Arc<K>,
        shutdown: impl Future<Output = ()>,
    ) -> AppResult<()>
    where
        S: LogSource,
        K: DocumentSink,
    {
        let mut tasks = WorkerTasks::new();
        for topic in &self.config.ingest.topics {
            let partitions = source.list_partitions(topic).await?;
            if partitions.is_empty() {
                warn!("topic {} has no partitions", topic);
            }
            for info in partitions {
                let topic_partition = info.topic_partition();
                let store =
                    FileOffsetStore::open(&self.config.ingest.offset_dir, topic_partition.clone())
                        .await?;
                info!(
                    "discovered {} window [{}, {}), resuming at {}",
                    topic_partition,
                    info.offset_from,
                    info.offset_to,
                    store.get()
                );
                let worker = PartitionWorker::new(
                    topic_partition,
                    source.clone(),
                    sink.clone(),
                    store,
                    self.config.clone(),
                );
                Self::spawn(&mut tasks, worker);
            }
        }
        info!("started {} partition workers", tasks.len());

        tokio::pin!(shutdown);
        let restart_backoff = BackoffPolicy::fetch();
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("get shutdown signal");
                    tasks.shutdown().await;
                    return Ok(());
                }
                joined = tasks.join_next() => {
                    let Some(joined) = joined else {
                        warn!("no partition workers left");
                        return Ok(());
                    };
                    let (topic_partition, result) = joined.map_err(|e| {
                        AppError::IllegalStateError(format!("worker task lost: {}", e))
                    })?;
                    let err = match result {
                        Ok(()) => AppError::IllegalStateError(format!(
                            "partition worker {} returned",
                            topic_partition
                        )),
                        Err(err) => err,
                    };
                    match self.config.ingest.on_worker_failure {
                        FailurePolicy::Exit => {
                            error!(
                                topic = %topic_partition.topic,
                                partition = topic_partition.partition,
                                "partition worker failed, shutting down: {}",
                                err
                            );
                            tasks.shutdown().await;
                            return Err(err);
                        }
                        FailurePolicy::Restart => {
                            let delay = restart_backoff.delay();
                            error!(
                                topic = %topic_partition.topic,
                                partition = topic_partition.partition,
                                "partition worker failed, restarting in {:?}: {}",
                                delay,
                                err
                            );
                            self.respawn(
                                &mut tasks,
                                topic_partition,
                                source.clone(),
                                sink.clone(),
                                delay,
                            );
                        }
                    }
                }
            }
        }
    }

    fn spawn<S, K>(tasks: &mut WorkerTasks, worker: PartitionWorker<S, K, FileOffsetStore>)
    where
        S: LogSource,
        K: DocumentSink,
    {
        let topic_partition = worker.topic_partition().clone();
        spawn_guarded(tasks, topic_partition, worker.run());
    }

    /// Reopens the offset record after `delay`, so the new worker resumes
    /// from the last commit.
    fn respawn<S, K>(
        &self,
        tasks: &mut WorkerTasks,
        topic_partition: TopicPartition,
        source: Arc<S>,
        sink: Arc<K>,
        delay: Duration,
    ) where
        S: LogSource,
        K: DocumentSink,
    {
        let config = self.config.clone();
        let tp = topic_partition.clone();
        spawn_guarded(tasks, topic_partition, async move {
            sleep(delay).await;
            let store = FileOffsetStore::open(&config.ingest.offset_dir, tp.clone()).await?;
            PartitionWorker::new(tp, source, sink, store, config)
                .run()
                .await
        });
    }
}

/// Aborts the inner task when the outer one is dropped by the join set.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs `work` on its own task so a panic surfaces as
/// [`AppError::WorkerAborted`] tagged with its partition.
fn spawn_guarded<F>(tasks: &mut WorkerTasks, topic_partition: TopicPartition, work: F)
where
    F: Future<Output = AppResult<()>> + Send + 'static,
{
    let span = info_span!(
        "partition_worker",
        topic = %topic_partition.topic,
        partition = topic_partition.partition
    );
    let handle = tokio::spawn(work.instrument(span));
    let guard = AbortOnDrop(handle.abort_handle());
    tasks.spawn(async move {
        let result = match handle.await {
            Ok(result) => result,
            Err(err) => Err(AppError::WorkerAborted(
                topic_partition.clone(),
                err.to_string(),
            )),
        };
        drop(guard);
        (topic_partition, result)
    });
}
