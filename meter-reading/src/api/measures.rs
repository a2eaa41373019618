//! Measurement endpoints
//!
//! - POST /upload - submit a meter image
//! - PATCH /confirm - confirm or correct a recognized value once
//! - GET /:customer_code/list - list a customer's measurements

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::MeasureType;
use crate::services::{ConfirmationRequest, SubmissionRequest};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub image_url: String,
    pub measure_value: f64,
    pub measure_uuid: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub measure_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub customer_code: String,
    pub measures: Vec<MeasureEntry>,
}

#[derive(Debug, Serialize)]
pub struct MeasureEntry {
    pub measure_uuid: Uuid,
    pub measure_datetime: String,
    pub measure_type: MeasureType,
    pub has_confirmed: bool,
    pub image_url: String,
}

/// Body that is not JSON (or not an object) is INVALID_DATA
fn invalid_body(rejection: JsonRejection) -> ApiError {
    warn!("Rejected request body: {}", rejection.body_text());
    ApiError::InvalidData(format!("Request body must be a JSON object: {}", rejection.body_text()))
}

/// POST /upload
pub async fn upload(
    State(state): State<AppState>,
    payload: Result<Json<SubmissionRequest>, JsonRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let Json(request) = payload.map_err(invalid_body)?;

    let outcome = state.submissions.submit(&request).await?;

    Ok(Json(UploadResponse {
        image_url: state.image_url(&outcome.artifact),
        measure_value: outcome.recognized_value,
        measure_uuid: outcome.id,
    }))
}

/// PATCH /confirm
pub async fn confirm(
    State(state): State<AppState>,
    payload: Result<Json<ConfirmationRequest>, JsonRejection>,
) -> ApiResult<Json<ConfirmResponse>> {
    let Json(request) = payload.map_err(invalid_body)?;

    state.confirmations.confirm_request(&request).await?;

    Ok(Json(ConfirmResponse { success: true }))
}

/// GET /:customer_code/list?measure_type=
pub async fn list_measures(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<ListResponse>> {
    let Path(customer_code) = path.map_err(|rejection| {
        warn!("Rejected customer code: {}", rejection.body_text());
        ApiError::InvalidData(format!("customer_code is not valid: {}", rejection.body_text()))
    })?;
    // Repeated or undecodable measure_type
    let Query(query) = query.map_err(|rejection| {
        warn!("Rejected list query: {}", rejection.body_text());
        ApiError::InvalidType
    })?;

    let summaries = state
        .queries
        .list_by_customer(&customer_code, query.measure_type.as_deref())
        .await?;

    let measures = summaries
        .iter()
        .map(|s| MeasureEntry {
            measure_uuid: s.id,
            measure_datetime: meter_common::time::format_instant(&s.measured_at),
            measure_type: s.measure_type,
            has_confirmed: s.confirmed,
            image_url: state.image_url(&s.artifact),
        })
        .collect();

    Ok(Json(ListResponse {
        customer_code,
        measures,
    }))
}
