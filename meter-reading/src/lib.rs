//! meter-reading library - Meter Reading service
//!
//! Accepts meter images, resolves each to a numeric reading through a
//! recognition service, rejects duplicate reports, and lets a human confirm
//! the recognized value once.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod validators;

pub use crate::error::{ApiError, ApiResult};

use crate::models::ArtifactRef;
use crate::services::{
    ConfirmationWorkflow, ImageCodec, QueryService, RecognitionService, SubmissionService,
};
use crate::store::MeasurementStore;

/// Default request body limit (base64 images are large)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Authoritative measurement store
    pub store: Arc<MeasurementStore>,
    pub submissions: Arc<SubmissionService>,
    pub confirmations: Arc<ConfirmationWorkflow>,
    pub queries: Arc<QueryService>,
    /// Artifact access for GET /images
    pub codec: ImageCodec,
    /// Prefix for `image_url` values, without trailing slash
    pub public_base_url: String,
    pub max_upload_bytes: usize,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the lifecycle services around one fresh store
    pub fn new(
        recognizer: Arc<dyn RecognitionService>,
        codec: ImageCodec,
        public_base_url: String,
    ) -> Self {
        let store = Arc::new(MeasurementStore::new());

        Self {
            submissions: Arc::new(SubmissionService::new(
                Arc::clone(&store),
                recognizer,
                codec.clone(),
            )),
            confirmations: Arc::new(ConfirmationWorkflow::new(Arc::clone(&store))),
            queries: Arc::new(QueryService::new(Arc::clone(&store))),
            store,
            codec,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            startup_time: meter_common::time::now(),
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Public URL of a stored artifact
    pub fn image_url(&self, artifact: &ArtifactRef) -> String {
        format!("{}/images/{}", self.public_base_url, artifact.file_name)
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, patch, post};

    let max_upload_bytes = state.max_upload_bytes;

    Router::new()
        .route("/upload", post(api::upload))
        .route("/confirm", patch(api::confirm))
        .route("/:customer_code/list", get(api::list_measures))
        .route("/images/:artifact", get(api::get_image))
        .merge(api::health_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
