//! Test server wrapper for integration tests
//!
//! Builds the real router around a temporary root folder and a stub
//! recognition service, and offers request/JSON helpers.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use meter_common::config::RootFolderLayout;
use meter_reading::services::{ImageCodec, RecognitionError, RecognitionService, StagedImage};
use meter_reading::{build_router, AppState};

pub const BASE_URL: &str = "http://meters.test";

/// 1x1 transparent PNG
pub const PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Stub recognizer: fixed answer, optional delay, counts calls
pub struct StubRecognizer {
    answer: Result<f64, RecognitionError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubRecognizer {
    pub fn returning(value: f64) -> Self {
        Self {
            answer: Ok(value),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: RecognitionError) -> Self {
        Self {
            answer: Err(error),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecognitionService for StubRecognizer {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn recognize(&self, image: &StagedImage) -> Result<f64, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // The staged file must exist while recognition runs
        assert!(image.path().exists(), "staged image missing during recognition");
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answer.clone()
    }
}

/// Router plus the pieces tests inspect
pub struct TestServer {
    pub router: Router,
    pub state: AppState,
    pub recognizer: Arc<StubRecognizer>,
    pub layout: RootFolderLayout,
    _root: TempDir,
}

impl TestServer {
    pub fn start(recognizer: StubRecognizer) -> Self {
        let root = TempDir::new().expect("temp root");
        let layout = RootFolderLayout::new(root.path().to_path_buf());
        layout.ensure_directories().expect("root folder layout");

        let recognizer = Arc::new(recognizer);
        let state = AppState::new(
            Arc::clone(&recognizer) as Arc<dyn RecognitionService>,
            ImageCodec::new(&layout),
            BASE_URL.to_string(),
        );
        let router = build_router(state.clone());

        Self {
            router,
            state,
            recognizer,
            layout,
            _root: root,
        }
    }

    /// Send a request; returns status and parsed JSON body (Null if empty/not JSON)
    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn upload(&self, customer: &str, datetime: &str, kind: &str) -> (StatusCode, Value) {
        self.request("POST", "/upload", Some(upload_body(customer, datetime, kind)))
            .await
    }

    pub async fn confirm(&self, measure_uuid: &Value, value: Value) -> (StatusCode, Value) {
        self.request(
            "PATCH",
            "/confirm",
            Some(serde_json::json!({
                "measure_uuid": measure_uuid,
                "confirmed_value": value,
            })),
        )
        .await
    }

    pub fn staging_files(&self) -> Vec<PathBuf> {
        list_dir(self.layout.staging_dir())
    }

    pub fn artifact_files(&self) -> Vec<PathBuf> {
        list_dir(self.layout.artifacts_dir())
    }
}

pub fn upload_body(customer: &str, datetime: &str, kind: &str) -> Value {
    serde_json::json!({
        "image": format!("data:image/png;base64,{}", PNG_B64),
        "customer_code": customer,
        "measure_datetime": datetime,
        "measure_type": kind,
    })
}

/// Assert the standard error body shape and code
pub fn assert_error(body: &Value, code: &str) {
    assert_eq!(body["error_code"], code, "unexpected body: {}", body);
    assert!(
        body["error_description"].as_str().is_some_and(|d| !d.is_empty()),
        "missing error_description: {}",
        body
    );
}

fn list_dir(dir: PathBuf) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("dir entry").path())
        .collect()
}
