use crate::errors::ChunkError;
use crate::files::replace_file;
use crate::kind::{ChunkPosition, DataKind};
use crate::metrics_defs::CHUNK_BYTES;
use shared::counter;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Reassembles a document uploaded across several requests into `<kind>.json`.
#[derive(Debug, Clone)]
pub struct ChunkAssembler {
    dir: PathBuf,
    max_chunk_bytes: usize,
}

impl ChunkAssembler {
    pub fn new(dir: impl Into<PathBuf>, max_chunk_bytes: usize) -> Self {
        ChunkAssembler {
            dir: dir.into(),
            max_chunk_bytes,
        }
    }

    pub fn path(&self, kind: DataKind) -> PathBuf {
        self.dir.join(kind.chunk_filename())
    }

    /// `first` replaces the file, `middle` and `last` append to it, and
    /// `reprocess` leaves it untouched.
    pub async fn write(
        &self,
        kind: DataKind,
        position: ChunkPosition,
        bytes: &[u8],
    ) -> Result<(), ChunkError> {
        if bytes.len() > self.max_chunk_bytes {
            return Err(ChunkError::TooLarge {
                size: bytes.len(),
                limit: self.max_chunk_bytes,
            });
        }

        let path = self.path(kind);
        match position {
            ChunkPosition::First => {
                replace(&path, bytes).await?;
                tracing::info!(kind = kind.as_str(), path = %path.display(), "started collecting data");
            }
            ChunkPosition::Middle | ChunkPosition::Last => {
                append(&path, bytes).await?;
                if position == ChunkPosition::Last {
                    tracing::info!(kind = kind.as_str(), path = %path.display(), "done collecting data");
                }
            }
            ChunkPosition::Reprocess => {
                tracing::info!(kind = kind.as_str(), path = %path.display(), "reprocessing data on disk");
                return Ok(());
            }
        }

        counter!(CHUNK_BYTES, "kind" => kind.as_str(), "position" => position.as_str())
            .increment(bytes.len() as u64);
        Ok(())
    }
}

// A loader that already opened the previous file keeps reading a consistent copy.
async fn replace(path: &Path, bytes: &[u8]) -> Result<(), ChunkError> {
    replace_file(path, bytes)
        .await
        .map_err(|source| ChunkError::Write {
            path: path.to_path_buf(),
            source,
        })
}

async fn append(path: &Path, bytes: &[u8]) -> Result<(), ChunkError> {
    let append_err = |source| ChunkError::Append {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .await
        .map_err(append_err)?;
    file.write_all(bytes).await.map_err(append_err)?;
    file.flush().await.map_err(append_err)
}
