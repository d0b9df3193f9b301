use std::sync::Arc;

use axum::{
    body::Body,
    http::{self, Method, Request},
    response::Response,
    Router,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use stockroom_api::entities::consumable_item;
use stockroom_api::{
    config::AppConfig,
    db,
    events::{self, EventSender},
    handlers::health::health_routes,
    services::{CreateItemCommand, ItemDraft},
    AppState,
};

/// Helper harness that spins up the full application state backed by a
/// throwaway SQLite database. Each instance gets its own temp directory,
/// so test binaries can run in parallel without sharing a file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: tempfile::TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("temp dir for test database");
        let db_path = db_dir.path().join("stockroom_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("test database connection");
        db::run_migrations(&pool).await.expect("test migrations");

        let pool = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(pool, cfg, event_sender);

        let router = Router::new()
            .nest("/api/v1", stockroom_api::api_v1_routes())
            .nest("/health", health_routes())
            .with_state(state.clone());

        TestApp {
            router,
            state,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    /// Sends a request through the router without binding a socket.
    #[allow(dead_code)]
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => {
                builder = builder.header(http::header::CONTENT_TYPE, "application/json");
                builder
                    .body(Body::from(json.to_string()))
                    .expect("request with body")
            }
            None => builder.body(Body::empty()).expect("request"),
        };
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    /// Creates a catalog item directly through the service layer, skipping
    /// the HTTP surface.
    #[allow(dead_code)]
    pub async fn seed_item(&self, name: &str, initial_stock: i32) -> consumable_item::Model {
        self.state
            .services
            .item_catalog
            .create_item(CreateItemCommand {
                item: ItemDraft {
                    name: name.to_string(),
                    category: "lab-consumables".to_string(),
                    unit: "piece".to_string(),
                    initial_stock,
                    min_stock: 5,
                    max_stock: 10_000,
                },
                operator: "seed".to_string(),
                reason: None,
                notes: None,
            })
            .await
            .expect("seed item")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}
