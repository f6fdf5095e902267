//! Streaming bulk loaders. A run resolves the target schema, opens the chunk
//! file, and inside one transaction replaces the kind's staging table with the
//! records streamed from the file. Any decode or database error rolls the
//! whole run back.

mod account;
mod identity;
mod opportunity;

use crate::config::{Config, SchemaMap};
use crate::errors::{LoadError, StoreError};
use crate::kind::DataKind;
use crate::metrics_defs::NUMERIC_DEFAULTED;
use crate::store::{LoadTransaction, ReferenceStore};
use crate::stream::RecordStream;
use crate::transform::{FeedNumber, Numeric};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use shared::counter;
use std::path::PathBuf;
use std::sync::Arc;

pub use account::AccountSink;
pub use identity::IdentitySink;
pub use opportunity::OpportunitySink;

/// Decoded records buffered between the reader thread and the database writer.
const RECORD_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub kind: DataKind,
    pub schema: String,
    /// Records read from the file.
    pub processed: usize,
    /// Records written to the staging table.
    pub staged: usize,
    /// Entries written to the identity snapshot, for identity runs.
    pub snapshot_entries: Option<usize>,
}

/// Per-kind record handling plugged into the shared load driver.
#[async_trait]
pub trait RecordSink: Send {
    type Record: DeserializeOwned + Send + 'static;

    const KIND: DataKind;

    /// Writes one record. Returns whether it landed in the staging table.
    async fn apply(
        &mut self,
        tx: &mut dyn LoadTransaction,
        ordinal: usize,
        record: Self::Record,
    ) -> Result<bool, StoreError>;

    /// Runs after a successful commit.
    async fn finish(&mut self) -> Result<Option<usize>, LoadError> {
        Ok(None)
    }
}

#[derive(Clone)]
pub struct Loader {
    config: Arc<Config>,
    schemas: Arc<SchemaMap>,
    store: Arc<dyn ReferenceStore>,
}

impl Loader {
    pub fn new(config: Arc<Config>, schemas: Arc<SchemaMap>, store: Arc<dyn ReferenceStore>) -> Self {
        Loader {
            config,
            schemas,
            store,
        }
    }

    pub fn chunk_path(&self, kind: DataKind) -> PathBuf {
        self.config.chunk_dir.join(kind.chunk_filename())
    }

    /// Instance environment whose schema receives `kind`.
    pub fn target(&self, kind: DataKind) -> &str {
        match kind {
            DataKind::Identity => &self.config.identity_target,
            DataKind::Opportunity | DataKind::Account => &self.config.sync_target,
        }
    }

    pub async fn load(&self, kind: DataKind) -> Result<LoadReport, LoadError> {
        match kind {
            DataKind::Identity => self.run(IdentitySink::new(self.config.identity.clone())).await,
            DataKind::Opportunity => self.run(OpportunitySink::default()).await,
            DataKind::Account => self.run(AccountSink::default()).await,
        }
    }

    async fn run<S: RecordSink>(&self, mut sink: S) -> Result<LoadReport, LoadError> {
        let kind = S::KIND;
        let target = self.target(kind);
        let schema = self
            .schemas
            .resolve(target)
            .ok_or_else(|| LoadError::UnmappedSchema(target.to_string()))?
            .to_string();

        let path = self.chunk_path(kind);
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|source| LoadError::Open {
                path: path.clone(),
                source,
            })?
            .into_std()
            .await;

        tracing::info!(kind = kind.as_str(), schema = %schema, path = %path.display(), "load started");

        let mut tx = self.store.begin(&schema).await?;
        let cleared = tx.clear_staging(kind.staging_table()).await?;
        tracing::debug!(kind = kind.as_str(), cleared, "staging table cleared");

        let mut records = RecordStream::<S::Record>::spawn(file, RECORD_BUFFER);
        let mut processed = 0;
        let mut staged = 0;
        while let Some((ordinal, record)) = records.next().await? {
            processed += 1;
            let landed = sink
                .apply(tx.as_mut(), ordinal, record)
                .await
                .map_err(|source| LoadError::Record { ordinal, source })?;
            if landed {
                staged += 1;
            }
        }

        tx.commit().await?;
        let snapshot_entries = sink.finish().await?;

        Ok(LoadReport {
            kind,
            schema,
            processed,
            staged,
            snapshot_entries,
        })
    }
}

/// Parses a numeric feed field, substituting zero when it is absent or unparseable.
pub(crate) fn numeric_or_zero<T>(kind: DataKind, field: &'static str, ordinal: usize, raw: &str) -> T
where
    T: FeedNumber,
{
    match Numeric::<T>::parse(raw) {
        Numeric::Parsed(value) => value,
        Numeric::Absent => {
            tracing::debug!(kind = kind.as_str(), field, ordinal, "numeric field absent, using 0");
            T::default()
        }
        Numeric::Unparseable => {
            tracing::warn!(
                kind = kind.as_str(),
                field,
                ordinal,
                value = raw,
                "numeric field present but unparseable, using 0"
            );
            counter!(NUMERIC_DEFAULTED, "kind" => kind.as_str(), "field" => field).increment(1);
            T::default()
        }
    }
}
