use crate::config::{BasicAuth, HierarchyQueries};
use crate::state::AppState;
use axum::body::Body;
use axum::http::Request;
use axum::http::header::AUTHORIZATION;
use axum::response::Response;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use refdata::config::IdentityConfig;
use refdata::testutils::MemoryStore;
use refdata::{ChunkAssembler, Config, DataKind, IngestCoordinator, Loader, SchemaMap};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub struct TestApp {
    pub state: AppState,
    pub store: MemoryStore,
    dir: TempDir,
}

impl TestApp {
    /// Must be called within a tokio runtime.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let config = Arc::new(Config {
            chunk_dir: dir.path().to_path_buf(),
            max_chunk_bytes: 1 << 20,
            identity_target: "cto-common".into(),
            sync_target: "ecal-prod".into(),
            identity: IdentityConfig {
                snapshot_path: dir.path().join("identities.json"),
                directory_suffix: ",l=amer,dc=oracle,dc=com".into(),
                manager_leads: Vec::new(),
            },
        });
        let schemas = Arc::new(SchemaMap::from([
            ("cto-common", "CTO_COMMON"),
            ("ecal-prod", "ECAL"),
            ("sts-prod", "STS"),
        ]));

        let loader = Loader::new(config.clone(), schemas.clone(), Arc::new(store.clone()));
        let assembler = ChunkAssembler::new(&config.chunk_dir, config.max_chunk_bytes);
        let state = AppState {
            coordinator: IngestCoordinator::start(assembler, loader),
            store: Arc::new(store.clone()),
            schemas,
            reference_data: config,
            queries: Arc::new(HierarchyQueries::default()),
            auth: Arc::new(BasicAuth {
                username: "svc".into(),
                password: "secret".into(),
            }),
        };
        TestApp { state, store, dir }
    }

    pub fn chunk_path(&self, kind: DataKind) -> PathBuf {
        self.dir.path().join(kind.chunk_filename())
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.state.reference_data.identity.snapshot_path.clone()
    }

    async fn send(&self, request: Request<Body>) -> Response {
        crate::router(self.state.clone())
            .oneshot(request)
            .await
            .unwrap()
    }

    fn authorized(builder: axum::http::request::Builder) -> axum::http::request::Builder {
        builder.header(AUTHORIZATION, format!("Basic {}", STANDARD.encode("svc:secret")))
    }

    pub async fn get(&self, uri: &str) -> Response {
        let request = Self::authorized(Request::get(uri)).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn get_unauthenticated(&self, uri: &str) -> Response {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post(&self, uri: &str, body: &str) -> Response {
        let request = Self::authorized(Request::post(uri))
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_unauthenticated(&self, uri: &str, body: &str) -> Response {
        let request = Request::post(uri).body(Body::from(body.to_string())).unwrap();
        self.send(request).await
    }
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
