//! Measurement data model
//!
//! A measurement is created once recognition succeeds and is afterwards only
//! touched by the confirmation workflow. `confirmed_value` doubles as the
//! confirmation flag, so "value present iff confirmed" holds by construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Meter category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MeasureType {
    Water,
    Gas,
}

impl MeasureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureType::Water => "WATER",
            MeasureType::Gas => "GAS",
        }
    }
}

impl fmt::Display for MeasureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown measure type: {0}")]
pub struct UnknownMeasureType(pub String);

impl FromStr for MeasureType {
    type Err = UnknownMeasureType;

    /// Case-insensitive; surrounding whitespace is ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WATER" => Ok(MeasureType::Water),
            "GAS" => Ok(MeasureType::Gas),
            _ => Err(UnknownMeasureType(s.to_string())),
        }
    }
}

/// Duplicate-detection key: exact reading instant plus meter type
///
/// Deliberately not scoped to the customer or to a billing month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReportKey {
    pub measured_at: DateTime<Utc>,
    pub measure_type: MeasureType,
}

impl ReportKey {
    pub fn new(measured_at: DateTime<Utc>, measure_type: MeasureType) -> Self {
        Self {
            measured_at,
            measure_type,
        }
    }
}

/// Handle to a persisted image artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRef {
    /// File name inside the artifacts directory (`<uuid>.<ext>`)
    pub file_name: String,
    pub mime_type: String,
}

/// Confirmation state of a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementState {
    Pending,
    Confirmed,
}

/// One submitted meter reading
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    id: Uuid,
    customer_code: String,
    measured_at: DateTime<Utc>,
    measure_type: MeasureType,
    recognized_value: f64,
    confirmed_value: Option<f64>,
    artifact: ArtifactRef,
    created_at: DateTime<Utc>,
}

impl Measurement {
    /// New pending measurement
    pub fn new(
        id: Uuid,
        customer_code: String,
        key: ReportKey,
        recognized_value: f64,
        artifact: ArtifactRef,
    ) -> Self {
        Self {
            id,
            customer_code,
            measured_at: key.measured_at,
            measure_type: key.measure_type,
            recognized_value,
            confirmed_value: None,
            artifact,
            created_at: meter_common::time::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn customer_code(&self) -> &str {
        &self.customer_code
    }

    pub fn measured_at(&self) -> DateTime<Utc> {
        self.measured_at
    }

    pub fn measure_type(&self) -> MeasureType {
        self.measure_type
    }

    pub fn key(&self) -> ReportKey {
        ReportKey::new(self.measured_at, self.measure_type)
    }

    pub fn recognized_value(&self) -> f64 {
        self.recognized_value
    }

    pub fn confirmed_value(&self) -> Option<f64> {
        self.confirmed_value
    }

    pub fn artifact(&self) -> &ArtifactRef {
        &self.artifact
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> MeasurementState {
        if self.confirmed_value.is_some() {
            MeasurementState::Confirmed
        } else {
            MeasurementState::Pending
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.state() == MeasurementState::Confirmed
    }

    /// Pending → Confirmed. The only mutation a measurement supports.
    pub(crate) fn confirm(&mut self, value: f64) -> Result<(), AlreadyConfirmed> {
        match self.state() {
            MeasurementState::Pending => {
                self.confirmed_value = Some(value);
                Ok(())
            }
            MeasurementState::Confirmed => Err(AlreadyConfirmed(self.id)),
        }
    }

    pub fn summary(&self) -> MeasurementSummary {
        MeasurementSummary {
            id: self.id,
            measured_at: self.measured_at,
            measure_type: self.measure_type,
            confirmed: self.is_confirmed(),
            artifact: self.artifact.clone(),
        }
    }
}

/// Confirmed is terminal
#[derive(Debug, Error, PartialEq, Eq)]
#[error("measurement {0} is already confirmed")]
pub struct AlreadyConfirmed(pub Uuid);

/// Listing view: identity and metadata only, no values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementSummary {
    pub id: Uuid,
    pub measured_at: DateTime<Utc>,
    pub measure_type: MeasureType,
    pub confirmed: bool,
    pub artifact: ArtifactRef,
}
