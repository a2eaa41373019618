//! Submission pipeline
//!
//! validate → duplicate pre-check → stage image → recognize → persist
//! artifact → insert (authoritative duplicate check).
//!
//! Nothing is written to the store unless recognition succeeded and the
//! insert won its key. The staged file is dropped on every path; an
//! artifact persisted for a losing insert is discarded.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{ArtifactRef, Measurement, ReportKey};
use crate::services::duplicate_guard::{DuplicateGuard, DuplicateReport};
use crate::services::image_codec::{CodecError, ImageCodec};
use crate::services::recognition::{RecognitionError, RecognitionService};
use crate::store::{MeasurementStore, StoreError};
use crate::validators::{validate_submission, ValidationError};

/// Upload body; fields stay raw JSON so shape errors surface in rule order
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionRequest {
    #[serde(default)]
    pub image: Value,
    #[serde(default)]
    pub customer_code: Value,
    #[serde(default)]
    pub measure_datetime: Value,
    #[serde(default)]
    pub measure_type: Value,
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    DoubleReport(#[from] DuplicateReport),

    #[error("Recognition failed: {0}")]
    Recognition(#[from] RecognitionError),

    #[error(transparent)]
    Artifact(#[from] CodecError),

    #[error("Store rejected measurement: {0}")]
    Store(StoreError),
}

/// Result of a successful submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionOutcome {
    pub id: Uuid,
    pub recognized_value: f64,
    pub artifact: ArtifactRef,
}

pub struct SubmissionService {
    store: Arc<MeasurementStore>,
    guard: DuplicateGuard,
    recognizer: Arc<dyn RecognitionService>,
    codec: ImageCodec,
}

impl SubmissionService {
    pub fn new(
        store: Arc<MeasurementStore>,
        recognizer: Arc<dyn RecognitionService>,
        codec: ImageCodec,
    ) -> Self {
        Self {
            guard: DuplicateGuard::new(Arc::clone(&store)),
            store,
            recognizer,
            codec,
        }
    }

    pub async fn submit(
        &self,
        request: &SubmissionRequest,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let submission = validate_submission(
            &request.image,
            &request.customer_code,
            &request.measure_datetime,
            &request.measure_type,
        )?;

        let key = ReportKey::new(submission.measured_at, submission.measure_type);
        if let Err(duplicate) = self.guard.check(&key).await {
            warn!(
                customer_code = %submission.customer_code,
                measure_type = %key.measure_type,
                existing = %duplicate.existing,
                "Duplicate report rejected"
            );
            return Err(duplicate.into());
        }

        // Removed on drop, including every early return below
        let staged = self.codec.stage(submission.image).await?;

        let recognized_value = self.recognizer.recognize(&staged).await?;

        let id = meter_common::uuid_utils::generate();
        let artifact = self.codec.persist(staged, id).await?;

        let measurement = Measurement::new(
            id,
            submission.customer_code.clone(),
            key,
            recognized_value,
            artifact.clone(),
        );

        match self.store.insert(measurement).await {
            Ok(id) => {
                info!(
                    customer_code = %submission.customer_code,
                    measure_type = %key.measure_type,
                    measure_uuid = %id,
                    recognized_value,
                    recognizer = self.recognizer.name(),
                    "Measurement created"
                );
                Ok(SubmissionOutcome {
                    id,
                    recognized_value,
                    artifact,
                })
            }
            Err(e) => {
                self.codec.discard(&artifact).await;
                match e {
                    StoreError::DuplicateReport { existing } => {
                        warn!(
                            customer_code = %submission.customer_code,
                            measure_type = %key.measure_type,
                            existing = %existing,
                            "Duplicate report lost insert race"
                        );
                        Err(DuplicateReport { existing }.into())
                    }
                    other => Err(SubmissionError::Store(other)),
                }
            }
        }
    }
}
