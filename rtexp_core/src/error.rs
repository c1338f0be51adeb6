//! Error types for the rtexp_core library.

use std::io;
use uuid::Uuid;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for rtexp_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Isotope tag outside the supported set
    #[error("Unsupported isotope: {0}")]
    InvalidIsotope(String),

    /// Negative or non-finite source activity
    #[error("Invalid activity: {0} MBq")]
    InvalidActivity(f64),

    #[error("Source not found: {0}")]
    SourceNotFound(Uuid),

    #[error("Casting not found: {0}")]
    CastingNotFound(Uuid),

    #[error("Chart row not found: {0}")]
    ChartEntryNotFound(Uuid),

    /// Request or record rejected at the data-entry boundary
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Exposure chart validation error
    #[error("Chart validation error: {0}")]
    ChartValidation(String),
}
