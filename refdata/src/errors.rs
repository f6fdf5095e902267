use crate::kind::DataKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors writing chunk bytes to disk.
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not append to {path}: {source}")]
    Append {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("chunk of {size} bytes exceeds the limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },
}

/// Errors reading the `{"items": [...]}` envelope of a chunk file.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed document: expected {expected}, found {found}")]
    Malformed {
        expected: &'static str,
        found: String,
    },

    #[error("could not decode record {ordinal}: {source}")]
    Record {
        ordinal: usize,
        source: serde_json::Error,
    },

    #[error("record stream ended before the closing bracket")]
    Interrupted,
}

/// Errors raised by a [`crate::store::ReferenceStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("unexpected result: {0}")]
    UnexpectedResult(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        StoreError::Database(error.to_string())
    }
}

/// Errors that abort a load run. The transaction is rolled back in every case
/// except [`LoadError::Snapshot`], which happens after commit.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("no schema mapped for instance environment {0:?}")]
    UnmappedSchema(String),

    #[error("could not open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("store error on record {ordinal}: {source}")]
    Record { ordinal: usize, source: StoreError },

    #[error("could not write identity snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("record reader task failed: {0}")]
    Reader(String),
}

impl LoadError {
    /// Short label used for the outcome tag on load metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            LoadError::UnmappedSchema(_) => "unmapped_schema",
            LoadError::Open { .. } => "open_failed",
            LoadError::Stream(StreamError::Record { .. }) => "decode_failed",
            LoadError::Stream(_) | LoadError::Reader(_) => "stream_failed",
            LoadError::Store(_) | LoadError::Record { .. } => "store_failed",
            LoadError::Snapshot { .. } => "snapshot_failed",
        }
    }
}

/// Errors returned to the HTTP boundary when accepting a chunk.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error("load worker for {0} is not running")]
    WorkerGone(DataKind),
}
