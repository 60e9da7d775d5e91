use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, trace};

use super::OffsetStore;
use crate::message::{Offset, TopicPartition};
use crate::{AppError, AppResult};

const TMP_SUFFIX: &str = ".tmp";

/// One file per partition at `{dir}/{topic}-{partition}` holding the next
/// offset as decimal text.
#[derive(Debug)]
pub struct FileOffsetStore {
    topic_partition: TopicPartition,
    path: PathBuf,
    offset: Offset,
}

impl FileOffsetStore {
    /// Opens the record for `topic_partition`, creating it with offset 0 if it
    /// does not exist yet. A record that cannot be read or parsed is an error;
    /// the caller must not start from a guessed position.
    pub async fn open(dir: impl AsRef<Path>, topic_partition: TopicPartition) -> AppResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).await?;
        let path = dir.join(topic_partition.id());

        let offset = match fs::read_to_string(&path).await {
            Ok(contents) => Self::parse(&path, &contents)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(
                    "no offset record for {} at {}, starting from 0",
                    topic_partition,
                    path.display()
                );
                write_atomically(&path, 0).await?;
                0
            }
            Err(e) => return Err(e.into()),
        };
        debug!("open offset store {} at offset {}", topic_partition, offset);

        Ok(Self {
            topic_partition,
            path,
            offset,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(path: &Path, contents: &str) -> AppResult<Offset> {
        let value = contents.trim();
        // empty records are left behind by older deployments that created the
        // file before the first commit
        if value.is_empty() {
            return Ok(0);
        }
        let offset: Offset = value.parse().map_err(|e| AppError::CorruptOffset {
            path: path.display().to_string(),
            reason: format!("{:?}: {}", value, e),
        })?;
        if offset < 0 {
            return Err(AppError::CorruptOffset {
                path: path.display().to_string(),
                reason: format!("negative offset {}", offset),
            });
        }
        Ok(offset)
    }
}

impl OffsetStore for FileOffsetStore {
    fn get(&self) -> Offset {
        self.offset
    }

    async fn commit(&mut self, offset: Offset) -> AppResult<()> {
        let next = offset + 1;
        write_atomically(&self.path, next)
            .await
            .map_err(|source| AppError::OffsetCommit {
                topic_partition: self.topic_partition.clone(),
                offset,
                source,
            })?;
        trace!("commit {} next offset {}", self.topic_partition, next);
        self.offset = next;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}

/// Writes `offset` to a sibling temp file, syncs it and renames it over
/// `path`, so readers observe either the old or the new record.
async fn write_atomically(path: &Path, offset: Offset) -> std::io::Result<()> {
    let tmp_path = tmp_path(path);
    let tmp_file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp_path)
        .await?;
    let mut buf_writer = BufWriter::new(tmp_file);
    buf_writer
        .write_all(format!("{}\n", offset).as_bytes())
        .await?;
    buf_writer.flush().await?;
    buf_writer.get_ref().sync_all().await?;
    drop(buf_writer);

    fs::rename(&tmp_path, path).await?;
    if let Some(parent) = path.parent() {
        // persist the rename itself; not supported on every platform
        if let Err(e) = sync_dir(parent).await {
            debug!("sync offset dir {} failed: {}", parent.display(), e);
        }
    }
    Ok(())
}

async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir).await?.sync_all().await
}
