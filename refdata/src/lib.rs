//! Reference data ingestion: chunked uploads are assembled into one file per
//! data kind, then streamed record by record into staging tables inside a
//! single transaction.

pub mod chunks;
pub mod config;
pub mod coordinator;
pub mod errors;
mod files;
pub mod kind;
pub mod loader;
pub mod metrics_defs;
pub mod postgres;
pub mod records;
pub mod snapshot;
pub mod store;
pub mod stream;
pub mod transform;

#[cfg(any(test, feature = "testutils"))]
pub mod testutils;

pub use chunks::ChunkAssembler;
pub use config::{Config, SchemaMap};
pub use coordinator::{Accepted, IngestCoordinator, LoadEvent, LoadOutcome};
pub use errors::{ChunkError, IngestError, LoadError, StoreError, StreamError};
pub use kind::{ChunkPosition, DataKind, StagingTable};
pub use loader::{LoadReport, Loader};
pub use store::{LoadTransaction, ReferenceStore};
