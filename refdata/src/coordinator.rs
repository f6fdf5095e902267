//! Accepts chunks and schedules loads. Each data kind has one worker task fed
//! by a single-slot queue: runs for a kind never overlap, and triggers that
//! arrive while a run is already waiting are folded into it.

use crate::chunks::ChunkAssembler;
use crate::errors::IngestError;
use crate::kind::{ChunkPosition, DataKind};
use crate::loader::{LoadReport, Loader};
use crate::metrics_defs::{LOAD_DURATION, LOAD_RECORDS, LOAD_RUNS, LOAD_TRIGGERS};
use shared::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc};

/// How a chunk was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepted {
    /// Written to disk; no load requested.
    Collected,
    /// A load run was queued.
    LoadQueued,
    /// A load for this kind was already waiting to start and will pick up this data.
    LoadAlreadyPending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Completed(LoadReport),
    Failed { reason: &'static str, message: String },
}

/// Published after every load run.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadEvent {
    pub kind: DataKind,
    pub outcome: LoadOutcome,
}

struct Inner {
    assembler: ChunkAssembler,
    queues: HashMap<DataKind, mpsc::Sender<()>>,
    events: broadcast::Sender<LoadEvent>,
}

#[derive(Clone)]
pub struct IngestCoordinator {
    inner: Arc<Inner>,
}

impl IngestCoordinator {
    /// Spawns one load worker per data kind. Must be called within a tokio runtime.
    pub fn start(assembler: ChunkAssembler, loader: Loader) -> Self {
        let (events, _) = broadcast::channel(32);
        let loader = Arc::new(loader);

        let mut queues = HashMap::new();
        for kind in DataKind::ALL {
            let (tx, rx) = mpsc::channel::<()>(1);
            tokio::spawn(run_worker(kind, rx, loader.clone(), events.clone()));
            queues.insert(kind, tx);
        }

        IngestCoordinator {
            inner: Arc::new(Inner {
                assembler,
                queues,
                events,
            }),
        }
    }

    /// Writes the chunk and, for `last` and `reprocess`, schedules a load.
    /// Never waits for the load itself.
    pub async fn accept(
        &self,
        kind: DataKind,
        position: ChunkPosition,
        body: &[u8],
    ) -> Result<Accepted, IngestError> {
        self.inner.assembler.write(kind, position, body).await?;
        if !position.triggers_load() {
            return Ok(Accepted::Collected);
        }
        self.trigger(kind)
    }

    pub fn trigger(&self, kind: DataKind) -> Result<Accepted, IngestError> {
        let queue = self
            .inner
            .queues
            .get(&kind)
            .ok_or(IngestError::WorkerGone(kind))?;

        match queue.try_send(()) {
            Ok(()) => {
                tracing::info!(kind = kind.as_str(), "load queued");
                counter!(LOAD_TRIGGERS, "kind" => kind.as_str(), "result" => "queued").increment(1);
                Ok(Accepted::LoadQueued)
            }
            Err(mpsc::error::TrySendError::Full(())) => {
                tracing::info!(kind = kind.as_str(), "load already pending, trigger coalesced");
                counter!(LOAD_TRIGGERS, "kind" => kind.as_str(), "result" => "coalesced").increment(1);
                Ok(Accepted::LoadAlreadyPending)
            }
            Err(mpsc::error::TrySendError::Closed(())) => Err(IngestError::WorkerGone(kind)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoadEvent> {
        self.inner.events.subscribe()
    }
}

async fn run_worker(
    kind: DataKind,
    mut rx: mpsc::Receiver<()>,
    loader: Arc<Loader>,
    events: broadcast::Sender<LoadEvent>,
) {
    while rx.recv().await.is_some() {
        let started = Instant::now();
        let result = loader.load(kind).await;
        histogram!(LOAD_DURATION, "kind" => kind.as_str()).record(started.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(report) => {
                tracing::info!(
                    kind = kind.as_str(),
                    schema = %report.schema,
                    processed = report.processed,
                    staged = report.staged,
                    snapshot_entries = report.snapshot_entries,
                    "load finished"
                );
                counter!(LOAD_RUNS, "kind" => kind.as_str(), "outcome" => "success").increment(1);
                counter!(LOAD_RECORDS, "kind" => kind.as_str()).increment(report.processed as u64);
                LoadOutcome::Completed(report)
            }
            Err(error) => {
                tracing::error!(kind = kind.as_str(), error = %error, "load failed");
                counter!(LOAD_RUNS, "kind" => kind.as_str(), "outcome" => error.outcome()).increment(1);
                LoadOutcome::Failed {
                    reason: error.outcome(),
                    message: error.to_string(),
                }
            }
        };

        // Nobody listening is the normal case.
        let _ = events.send(LoadEvent { kind, outcome });
    }
    tracing::debug!(kind = kind.as_str(), "load worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, IdentityConfig, SchemaMap};
    use crate::kind::StagingTable;
    use crate::store::ReferenceStore;
    use crate::testutils::{MasterOpportunity, MemoryStore};
    use std::path::Path;
    use std::time::Duration;

    fn coordinator(dir: &Path, store: &MemoryStore) -> IngestCoordinator {
        let config = Config {
            chunk_dir: dir.to_path_buf(),
            max_chunk_bytes: 1 << 20,
            identity_target: "cto-common".into(),
            sync_target: "ecal-prod".into(),
            identity: IdentityConfig {
                snapshot_path: dir.join("identities.json"),
                directory_suffix: String::new(),
                manager_leads: Vec::new(),
            },
        };
        let schemas = SchemaMap::from([("cto-common", "CTO_COMMON"), ("ecal-prod", "ECAL")]);
        let assembler = ChunkAssembler::new(dir, config.max_chunk_bytes);
        let loader = Loader::new(Arc::new(config), Arc::new(schemas), Arc::new(store.clone()));
        IngestCoordinator::start(assembler, loader)
    }

    async fn next_event(events: &mut broadcast::Receiver<LoadEvent>) -> LoadEvent {
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("load event in time")
            .expect("event channel open")
    }

    #[tokio::test]
    async fn split_upload_loads_opportunity() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        store.seed_opportunity("ECAL", "O1", MasterOpportunity::default());
        let coordinator = coordinator(dir.path(), &store);
        let mut events = coordinator.subscribe();

        let accepted = coordinator
            .accept(
                DataKind::Opportunity,
                ChunkPosition::First,
                br#"{"items":[{"opportunity_id":"O1","opportunity_status":"Open","#,
            )
            .await
            .unwrap();
        assert_eq!(accepted, Accepted::Collected);

        let accepted = coordinator
            .accept(
                DataKind::Opportunity,
                ChunkPosition::Last,
                br#""rev_tcv_k":"150"}]}"#,
            )
            .await
            .unwrap();
        assert_eq!(accepted, Accepted::LoadQueued);

        let event = next_event(&mut events).await;
        assert_eq!(event.kind, DataKind::Opportunity);
        assert!(matches!(event.outcome, LoadOutcome::Completed(ref r) if r.staged == 1));

        assert_eq!(
            store
                .staging_count("ECAL", StagingTable::LookupOpportunity)
                .await
                .unwrap(),
            1
        );
        let master = store.opportunity("ECAL", "O1").unwrap();
        assert_eq!(master.status, "Open");
        assert_eq!(master.projected_tcv, 150000.0);
    }

    #[tokio::test]
    async fn failed_append_does_not_trigger() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let coordinator = coordinator(dir.path(), &store);

        let err = coordinator
            .accept(DataKind::Account, ChunkPosition::Last, b"]}")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Chunk(_)));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.commits(), 0);
    }

    #[tokio::test]
    async fn runs_for_one_kind_never_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        store.set_commit_delay(Duration::from_millis(100));
        let coordinator = coordinator(dir.path(), &store);
        let mut events = coordinator.subscribe();

        coordinator
            .accept(DataKind::Account, ChunkPosition::First, br#"{"items":[{"cim_id":"C1"}]}"#)
            .await
            .unwrap();

        let mut outcomes = Vec::new();
        for _ in 0..4 {
            outcomes.push(
                coordinator
                    .accept(DataKind::Account, ChunkPosition::Reprocess, b"")
                    .await
                    .unwrap(),
            );
        }
        assert_eq!(outcomes[0], Accepted::LoadQueued);
        assert!(outcomes.contains(&Accepted::LoadAlreadyPending));

        let expected_runs = outcomes
            .iter()
            .filter(|o| **o == Accepted::LoadQueued)
            .count();
        for _ in 0..expected_runs {
            let event = next_event(&mut events).await;
            assert!(matches!(event.outcome, LoadOutcome::Completed(_)));
        }

        assert_eq!(store.commits(), expected_runs);
        assert_eq!(store.max_concurrent_transactions(), 1);
        assert_eq!(store.staged_accounts("ECAL").len(), 1);
    }

    #[tokio::test]
    async fn load_failures_are_published() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let coordinator = coordinator(dir.path(), &store);
        let mut events = coordinator.subscribe();

        coordinator
            .accept(DataKind::Identity, ChunkPosition::Reprocess, b"")
            .await
            .unwrap();
        let event = next_event(&mut events).await;
        assert!(matches!(
            event.outcome,
            LoadOutcome::Failed { reason: "open_failed", .. }
        ));
    }
}
