//! Duplicate report policy
//!
//! A submission conflicts with an existing record when both the reading
//! instant (exact equality) and the meter type match. Customer code and
//! calendar month play no part. An equal instant with a different type is
//! not a conflict.
//!
//! `check` is the cheap pre-check run before recognition. The authoritative
//! check is repeated by `MeasurementStore::insert` under its write lock.

use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::ReportKey;
use crate::store::MeasurementStore;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("reading already reported by measurement {existing}")]
pub struct DuplicateReport {
    pub existing: Uuid,
}

pub struct DuplicateGuard {
    store: Arc<MeasurementStore>,
}

impl DuplicateGuard {
    pub fn new(store: Arc<MeasurementStore>) -> Self {
        Self { store }
    }

    pub async fn check(&self, key: &ReportKey) -> Result<(), DuplicateReport> {
        match self.store.find_by_key(key).await {
            Some(existing) => Err(DuplicateReport {
                existing: existing.id(),
            }),
            None => Ok(()),
        }
    }
}
