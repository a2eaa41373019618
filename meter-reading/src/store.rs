//! In-memory measurement store
//!
//! Records live in a vector (insertion order) with two indexes: by id and by
//! duplicate-detection key. Every write happens under one write lock, so the
//! key check and the insert are a single atomic step, as is the
//! check-then-set on a single record.
//!
//! No lock is ever held across an `.await` outside this module.

use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Measurement, ReportKey};

/// Store write failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A record with the same (instant, type) key already exists
    #[error("duplicate report: measurement {existing} has the same date-time and type")]
    DuplicateReport { existing: Uuid },

    /// Identifier already taken
    #[error("measurement id {0} already exists")]
    IdConflict(Uuid),
}

#[derive(Default)]
struct StoreInner {
    records: Vec<Measurement>,
    by_id: HashMap<Uuid, usize>,
    by_key: HashMap<ReportKey, Uuid>,
}

/// Authoritative collection of measurements
#[derive(Default)]
pub struct MeasurementStore {
    inner: RwLock<StoreInner>,
}

impl MeasurementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless a record with the same key (or id) exists
    pub async fn insert(&self, measurement: Measurement) -> Result<Uuid, StoreError> {
        let mut inner = self.inner.write().await;

        let key = measurement.key();
        if let Some(existing) = inner.by_key.get(&key) {
            return Err(StoreError::DuplicateReport {
                existing: *existing,
            });
        }

        let id = measurement.id();
        if inner.by_id.contains_key(&id) {
            return Err(StoreError::IdConflict(id));
        }

        let index = inner.records.len();
        inner.records.push(measurement);
        inner.by_id.insert(id, index);
        inner.by_key.insert(key, id);

        Ok(id)
    }

    pub async fn find_by_id(&self, id: &Uuid) -> Option<Measurement> {
        let inner = self.inner.read().await;
        inner
            .by_id
            .get(id)
            .map(|&index| inner.records[index].clone())
    }

    pub async fn find_by_key(&self, key: &ReportKey) -> Option<Measurement> {
        let inner = self.inner.read().await;
        inner
            .by_key
            .get(key)
            .and_then(|id| inner.by_id.get(id))
            .map(|&index| inner.records[index].clone())
    }

    /// All records matching `predicate`, in insertion order
    pub async fn find_all<F>(&self, predicate: F) -> Vec<Measurement>
    where
        F: Fn(&Measurement) -> bool,
    {
        let inner = self.inner.read().await;
        inner
            .records
            .iter()
            .filter(|m| predicate(m))
            .cloned()
            .collect()
    }

    /// Run `update` on one record under the write lock
    ///
    /// Returns `None` when the id is unknown. The closure sees the current
    /// state and decides atomically whether to change it.
    pub(crate) async fn update<R, F>(&self, id: &Uuid, update: F) -> Option<R>
    where
        F: FnOnce(&mut Measurement) -> R,
    {
        let mut inner = self.inner.write().await;
        let index = *inner.by_id.get(id)?;
        Some(update(&mut inner.records[index]))
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
