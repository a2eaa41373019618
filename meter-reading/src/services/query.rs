//! Per-customer listing

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::models::{MeasureType, MeasurementSummary};
use crate::store::MeasurementStore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("measure_type must be WATER or GAS, got {0:?}")]
    InvalidType(String),

    #[error("no measurements found for customer {0}")]
    NoneFound(String),
}

pub struct QueryService {
    store: Arc<MeasurementStore>,
}

impl QueryService {
    pub fn new(store: Arc<MeasurementStore>) -> Self {
        Self { store }
    }

    /// Records of `customer_code` (exact match), optionally of one type, in
    /// insertion order. An empty or blank type filter counts as absent.
    pub async fn list_by_customer(
        &self,
        customer_code: &str,
        measure_type: Option<&str>,
    ) -> Result<Vec<MeasurementSummary>, QueryError> {
        let filter = match measure_type.map(str::trim).filter(|t| !t.is_empty()) {
            Some(text) => Some(
                text.parse::<MeasureType>()
                    .map_err(|_| QueryError::InvalidType(text.to_string()))?,
            ),
            None => None,
        };

        let records = self
            .store
            .find_all(|m| {
                m.customer_code() == customer_code
                    && filter.map_or(true, |kind| m.measure_type() == kind)
            })
            .await;

        debug!(customer_code, filter = ?filter, count = records.len(), "Listed measurements");

        if records.is_empty() {
            return Err(QueryError::NoneFound(customer_code.to_string()));
        }

        Ok(records.iter().map(|m| m.summary()).collect())
    }
}
