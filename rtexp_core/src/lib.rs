#![forbid(unsafe_code)]

//! Exposure-time engine for industrial radiography.
//!
//! This crate provides:
//! - Domain types (isotopes, sources, chart rows, castings, exposure records)
//! - Source decay and the empirical exposure time model
//! - Exposure chart lookup with deterministic band selection
//! - Exposure planning over a pluggable repository
//! - File persistence (registry, exposure log) and report filtering

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod decay;
pub mod exposure;
pub mod chart;
pub mod registry;
pub mod exposure_log;
mod lockfile;
pub mod repository;
pub mod planner;
pub mod report;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use decay::{decayed_activity, decayed_activity_for_tag, half_life_days};
pub use exposure::{exposure_seconds, round_seconds};
pub use chart::{get_default_chart, ChartLookup, ExposureChart};
pub use exposure_log::{ExposureLog, LogContents};
pub use repository::{DataLayout, FileRepository, MemoryRepository, Repository};
pub use planner::{plan_exposure, record_exposure, RecordOutcome};
pub use report::{format_seconds, summarize, ReportFilter, ReportSummary};
