use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlertError {
    /// File extension not allowed, or the document has no usable structure.
    #[error("Source format error: {0}")]
    SourceFormat(String),

    /// A single row could not produce an alert. Never fatal to a batch.
    #[error("Row {row} dropped: {reason}")]
    FieldExtraction { row: usize, reason: FieldExtractionReason },

    #[error("Contract directory unavailable: {0}")]
    DirectoryFetch(String),

    #[error("Nothing to export: {0}")]
    ExportPrecondition(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Delimited text error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldExtractionReason {
    MissingPlate,
    /// No speed pattern matched the description text.
    NoSpeedSignal,
    BelowThreshold { speed_kph: u32 },
}

impl fmt::Display for FieldExtractionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPlate => write!(f, "empty plate"),
            Self::NoSpeedSignal => write!(f, "no speed found in description"),
            Self::BelowThreshold { speed_kph } => write!(f, "speed {speed_kph} km/h below alert threshold"),
        }
    }
}

impl AlertError {
    pub fn row_dropped(row: usize, reason: FieldExtractionReason) -> Self {
        Self::FieldExtraction { row, reason }
    }
}

pub type Result<T> = std::result::Result<T, AlertError>;
