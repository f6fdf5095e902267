use crate::config::{BasicAuth, HierarchyQueries};
use refdata::{Config as ReferenceDataConfig, IngestCoordinator, ReferenceStore, SchemaMap};
use std::sync::Arc;

/// Everything a request handler can reach. Cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: IngestCoordinator,
    pub store: Arc<dyn ReferenceStore>,
    pub schemas: Arc<SchemaMap>,
    pub reference_data: Arc<ReferenceDataConfig>,
    pub queries: Arc<HierarchyQueries>,
    pub auth: Arc<BasicAuth>,
}
