//! Confirmation workflow
//!
//! Pending → Confirmed, exactly once per measurement. Shape validation runs
//! before any lookup; the state check and the write happen in one store
//! critical section so two concurrent confirmations cannot both succeed.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::AlreadyConfirmed;
use crate::store::MeasurementStore;
use crate::validators::{validate_confirmation, ValidationError};

/// Confirmation body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfirmationRequest {
    #[serde(default)]
    pub measure_uuid: Value,
    #[serde(default)]
    pub confirmed_value: Value,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfirmationError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("measurement {0} not found")]
    NotFound(String),

    #[error(transparent)]
    AlreadyConfirmed(#[from] AlreadyConfirmed),
}

pub struct ConfirmationWorkflow {
    store: Arc<MeasurementStore>,
}

impl ConfirmationWorkflow {
    pub fn new(store: Arc<MeasurementStore>) -> Self {
        Self { store }
    }

    /// Validate the raw request, then confirm
    pub async fn confirm_request(
        &self,
        request: &ConfirmationRequest,
    ) -> Result<Uuid, ConfirmationError> {
        let (raw_id, value) =
            validate_confirmation(&request.measure_uuid, &request.confirmed_value)?;

        // Ids are opaque to callers: text that is not a UUID names no record
        let id = meter_common::uuid_utils::parse(&raw_id)
            .map_err(|_| ConfirmationError::NotFound(raw_id.clone()))?;

        self.confirm(id, value).await?;
        Ok(id)
    }

    /// Pending → Confirmed with `value`
    pub async fn confirm(&self, id: Uuid, value: f64) -> Result<(), ConfirmationError> {
        let outcome = self
            .store
            .update(&id, |measurement| measurement.confirm(value))
            .await;

        match outcome {
            None => {
                warn!(measure_uuid = %id, "Confirmation for unknown measurement");
                Err(ConfirmationError::NotFound(id.to_string()))
            }
            Some(Err(already)) => {
                warn!(measure_uuid = %id, "Measurement already confirmed");
                Err(already.into())
            }
            Some(Ok(())) => {
                info!(measure_uuid = %id, confirmed_value = value, "Measurement confirmed");
                Ok(())
            }
        }
    }
}
