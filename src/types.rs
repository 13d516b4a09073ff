use crate::constants::{
    COLTRACK_EXTENSIONS, COLTRACK_PROVIDER, COLTRACK_SESSION_KEY, FAGOR_EXTENSIONS,
    FAGOR_PROVIDER, FAGOR_SESSION_KEY,
};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The telemetry exporters whose files we ingest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Provider A: tabular workbook export (.xlsx / .xls)
    Fagor,
    /// Provider B: pipe-delimited text export (.csv)
    Coltrack,
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Fagor => FAGOR_PROVIDER,
            Provider::Coltrack => COLTRACK_PROVIDER,
        }
    }

    pub fn accepted_extensions(&self) -> &'static [&'static str] {
        match self {
            Provider::Fagor => FAGOR_EXTENSIONS,
            Provider::Coltrack => COLTRACK_EXTENSIONS,
        }
    }

    pub fn session_key(&self) -> &'static str {
        match self {
            Provider::Fagor => FAGOR_SESSION_KEY,
            Provider::Coltrack => COLTRACK_SESSION_KEY,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A row extracted by a source parser, before contract resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertShell {
    pub plate: String,
    pub speed_kph: u32,
    pub timestamp: String,
    pub operator: String,
    pub location: String,
}

/// Canonical speed alert after normalization and contract resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub plate: String,
    pub speed_kph: u32,
    /// Display-ready date-time, or `"N/A"` / `"Invalid Date"`
    pub timestamp: String,
    pub operator: String,
    /// Either `"lat, lng"` or a free-text place description
    pub location: String,
    pub contract: String,
}

impl Alert {
    pub fn new(shell: AlertShell, contract: impl Into<String>) -> Self {
        Self {
            plate: shell.plate,
            speed_kph: shell.speed_kph,
            timestamp: shell.timestamp,
            operator: shell.operator,
            location: shell.location,
            contract: contract.into(),
        }
    }

    /// Numeric `(lat, lng)` when the location is a decimal-degree pair.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let (lat, lng) = self.location.split_once(',')?;
        let lat: f64 = lat.trim().parse().ok()?;
        let lng: f64 = lng.trim().parse().ok()?;
        if lat.is_finite() && lng.is_finite() {
            Some((lat, lng))
        } else {
            None
        }
    }
}

/// One group of a top-N aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatItem {
    pub name: String,
    pub count: usize,
}

/// Alert fields that can be grouped on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertField {
    Plate,
    Speed,
    Timestamp,
    Operator,
    Location,
    Contract,
}

impl AlertField {
    pub fn value(&self, alert: &Alert) -> String {
        match self {
            AlertField::Plate => alert.plate.clone(),
            AlertField::Speed => alert.speed_kph.to_string(),
            AlertField::Timestamp => alert.timestamp.clone(),
            AlertField::Operator => alert.operator.clone(),
            AlertField::Location => alert.location.clone(),
            AlertField::Contract => alert.contract.clone(),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "plate" | "placa" => Some(AlertField::Plate),
            "speed" | "velocidad" => Some(AlertField::Speed),
            "timestamp" | "fecha" => Some(AlertField::Timestamp),
            "operator" | "operador" => Some(AlertField::Operator),
            "location" | "localidad" => Some(AlertField::Location),
            "contract" | "contrato" => Some(AlertField::Contract),
            _ => None,
        }
    }
}

/// Core trait that every provider's source parser implements
pub trait AlertSource: Send + Sync {
    /// Which provider this parser understands
    fn provider(&self) -> Provider;

    /// Decode a whole source document into per-row outcomes.
    ///
    /// The outer error is structural (the batch is unusable). Each inner
    /// `Err` is a row that was dropped; the rest of the batch survives.
    fn parse(&self, bytes: &[u8]) -> Result<Vec<Result<AlertShell>>>;
}
