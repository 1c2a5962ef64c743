//! Test helpers: build the application over the in-memory store and queue.
//!
//! No database or Docker is needed; files live in a temp directory that is
//! removed when the [`TestApp`] is dropped.

pub mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use imgflow_api::setup::{routes, BackgroundWorkers};
use imgflow_api::AppState;
use imgflow_core::{
    ArtifactResponse, ArtifactStatus, Config, ImageProcessingConfig, QueueConfig, ServiceConfig,
    StageStatus,
};
use imgflow_db::{InMemoryArtifactStore, InMemoryQueue};
use imgflow_worker::InFlightRegistry;
use serde_json::Value;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub store: InMemoryArtifactStore,
    pub queue: InMemoryQueue,
    pub workers: Option<BackgroundWorkers>,
    pub temp_dir: TempDir,
}

pub struct TestOptions {
    /// Start the queue consumer, so uploads are processed end to end.
    pub consumer: bool,
    /// Put a watermark overlay asset in place.
    pub watermark: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            consumer: true,
            watermark: true,
        }
    }
}

fn test_config(dir: &TempDir) -> Config {
    Config::new(ServiceConfig {
        server_port: 0,
        database_url: "postgres://unused/imgflow".to_string(),
        db_max_connections: 1,
        db_timeout_seconds: 1,
        environment: "test".to_string(),
        cors_origins: vec!["*".to_string()],
        log_format: "compact".to_string(),
        shutdown_grace_secs: 5,
        processing: ImageProcessingConfig {
            storage_path: dir.path().join("storage"),
            watermark_path: dir.path().join("watermark.png"),
            ..ImageProcessingConfig::default()
        },
        queue: QueueConfig::default(),
    })
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(TestOptions::default()).await
}

pub async fn setup_test_app_with(options: TestOptions) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = test_config(&temp_dir);
    if options.watermark {
        fixtures::write_watermark(&config.processing().watermark_path);
    }

    let store = InMemoryArtifactStore::new();
    let queue = InMemoryQueue::new();
    let state = AppState::new(
        config,
        Arc::new(store.clone()),
        Arc::new(queue.clone()),
        InFlightRegistry::new(),
    );
    state.files.ensure_dirs().await.expect("Failed to create storage dirs");

    let workers = options
        .consumer
        .then(|| BackgroundWorkers::start(&state, CancellationToken::new(), Vec::new()));

    let state = Arc::new(state);
    let server = TestServer::new(routes::setup_routes(state.clone())).expect("Failed to start test server");

    TestApp {
        server,
        state,
        store,
        queue,
        workers,
        temp_dir,
    }
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub async fn upload(&self, bytes: Vec<u8>, file_name: &str) -> TestResponse {
        let form = MultipartForm::new().add_part("image", Part::bytes(bytes).file_name(file_name));
        self.server.post("/upload").multipart(form).await
    }

    /// Upload and return the new id, failing the test on a non-200 answer.
    pub async fn upload_ok(&self, bytes: Vec<u8>) -> Uuid {
        let response = self.upload(bytes, "photo.jpg").await;
        response.assert_status_ok();
        let body: Value = response.json();
        body["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn info(&self, id: Uuid) -> ArtifactResponse {
        let response = self.server.get(&format!("/image/{}/info", id)).await;
        response.assert_status_ok();
        response.json()
    }

    /// Poll `/info` until `done` returns true or ten seconds pass.
    pub async fn wait_for(&self, id: Uuid, done: impl Fn(&ArtifactResponse) -> bool) -> ArtifactResponse {
        for _ in 0..200 {
            let info = self.info(id).await;
            if done(&info) {
                return info;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("image {id} did not reach the expected state");
    }

    pub async fn wait_for_aggregate(&self, id: Uuid) -> ArtifactResponse {
        self.wait_for(id, |info| {
            matches!(
                info.status,
                ArtifactStatus::Done | ArtifactStatus::Partial | ArtifactStatus::Error
            )
        })
        .await
    }

    pub async fn wait_for_stages(&self, id: Uuid) -> ArtifactResponse {
        self.wait_for(id, |info| {
            [info.resize_status, info.thumbnail_status, info.watermark_status]
                .iter()
                .all(StageStatus::is_terminal)
        })
        .await
    }

    pub async fn shutdown(mut self) {
        if let Some(workers) = self.workers.take() {
            workers.shutdown().await;
        }
    }
}
