//! Core domain types for the radiography exposure system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Isotopes and sealed sources
//! - Exposure chart entries
//! - Exposure requests, plans and persisted records
//! - Castings (the inspected jobs that own exposure lines)

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Isotopes and Sources
// ============================================================================

/// Radioactive isotope used as a radiography source
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Isotope {
    #[serde(rename = "Ir-192")]
    Ir192,
    #[serde(rename = "Co-60")]
    Co60,
}

impl Isotope {
    /// Every supported isotope, in display order
    pub const ALL: [Isotope; 2] = [Isotope::Ir192, Isotope::Co60];

    /// Canonical tag used in charts, records and on the command line
    pub fn tag(&self) -> &'static str {
        match self {
            Isotope::Ir192 => "Ir-192",
            Isotope::Co60 => "Co-60",
        }
    }
}

impl fmt::Display for Isotope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Isotope {
    type Err = crate::Error;

    /// Parses one of the canonical tags, `Ir-192` or `Co-60`.
    /// Surrounding whitespace is ignored; any other spelling is an
    /// `InvalidIsotope`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        Isotope::ALL
            .into_iter()
            .find(|isotope| isotope.tag() == tag)
            .ok_or_else(|| crate::Error::InvalidIsotope(s.to_string()))
    }
}

/// A registered sealed source
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Source {
    pub id: Uuid,
    pub isotope: Isotope,
    pub serial_no: Option<String>,
    /// Activity at `ref_date`, in MBq
    pub a0_mbq: f64,
    /// Calibration date, taken as 00:00 UTC
    pub ref_date: NaiveDate,
    pub notes: Option<String>,
}

impl Source {
    /// Reference instant of the calibration (midnight UTC of `ref_date`)
    pub fn reference_instant(&self) -> DateTime<Utc> {
        self.ref_date.and_time(NaiveTime::MIN).and_utc()
    }

    /// Decayed activity of this source at `at`
    pub fn activity_at(&self, at: DateTime<Utc>) -> crate::Result<f64> {
        crate::decay::decayed_activity(self.a0_mbq, self.reference_instant(), at, self.isotope)
    }
}

// ============================================================================
// Exposure Chart
// ============================================================================

/// One calibrated row of the empirical exposure chart
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChartEntry {
    pub id: Uuid,
    pub isotope: Isotope,
    pub technique: String,
    pub film_speed: String,
    pub material: String,
    pub thickness_min_mm: f64,
    pub thickness_max_mm: f64,
    /// Base constant K
    pub base_constant: f64,
    /// Thickness exponent; a missing value behaves like 0
    #[serde(default)]
    pub alpha: f64,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl ChartEntry {
    /// Width of the thickness band in mm
    pub fn band_width(&self) -> f64 {
        self.thickness_max_mm - self.thickness_min_mm
    }

    /// True when `thickness_mm` lies inside the band, bounds included
    pub fn covers(&self, thickness_mm: f64) -> bool {
        thickness_mm >= self.thickness_min_mm && thickness_mm <= self.thickness_max_mm
    }

    /// True when this row applies to the given key
    pub fn matches(&self, key: &ChartKey) -> bool {
        self.isotope == key.isotope
            && self.material == key.material
            && self.technique == key.technique
            && self.film_speed == key.film_speed
            && self.covers(key.thickness_mm)
    }
}

/// Lookup key for the exposure chart
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChartKey {
    pub isotope: Isotope,
    pub technique: String,
    pub film_speed: String,
    pub material: String,
    pub thickness_mm: f64,
}

impl fmt::Display for ChartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} / {} / {} @ {} mm",
            self.isotope, self.technique, self.film_speed, self.material, self.thickness_mm
        )
    }
}

// ============================================================================
// Exposure Requests and Results
// ============================================================================

/// Default fixed setting (placement) time per film, in seconds
pub const DEFAULT_SETTING_TIME_S: f64 = 60.0;

/// Default fixed movement time per film, in seconds
pub const DEFAULT_MOVEMENT_TIME_S: f64 = 30.0;

/// Default material when the operator does not name one
pub const DEFAULT_MATERIAL: &str = "steel";

/// Parameters of one radiographic shot
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExposureRequest {
    pub source_id: Uuid,
    pub at: DateTime<Utc>,
    pub technique: String,
    pub film_speed: String,
    pub material: String,
    pub thickness_mm: f64,
    /// Source-to-film distance, in mm
    pub sfd_mm: f64,
    pub total_film: u32,
    pub setting_time_s: f64,
    pub movement_time_s: f64,
}

/// Computed timing for an exposure, unrounded
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExposureTiming {
    pub effective_activity_mbq: f64,
    pub total_seconds: f64,
    pub each_seconds: f64,
    pub each_with_overhead_seconds: f64,
}

/// A fully computed exposure, ready to be recorded
#[derive(Clone, Debug, PartialEq)]
pub struct ExposurePlan {
    pub request: ExposureRequest,
    pub isotope: Isotope,
    pub chart_entry: ChartEntry,
    pub timing: ExposureTiming,
}

/// Result of planning an exposure
///
/// A missing chart row is an expected outcome that asks the operator to
/// configure the chart, so it is not an `Error`.
#[derive(Clone, Debug, PartialEq)]
pub enum ExposureOutcome {
    Computed(ExposurePlan),
    NoChartMatch { key: ChartKey },
}

impl ExposureOutcome {
    pub fn as_plan(&self) -> Option<&ExposurePlan> {
        match self {
            ExposureOutcome::Computed(plan) => Some(plan),
            ExposureOutcome::NoChartMatch { .. } => None,
        }
    }
}

// ============================================================================
// Castings and Records
// ============================================================================

/// Lifecycle of a casting job
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CastingStatus {
    #[default]
    Open,
    Completed,
}

impl FromStr for CastingStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(CastingStatus::Open),
            "completed" | "complete" | "closed" => Ok(CastingStatus::Completed),
            other => Err(crate::Error::Validation(format!(
                "Unknown casting status: {}",
                other
            ))),
        }
    }
}

/// An inspected casting job
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Casting {
    pub id: Uuid,
    pub date: NaiveDate,
    pub name: String,
    pub heat_no: Option<String>,
    pub rt_no: Option<String>,
    pub area_coverage: Option<String>,
    pub customer: String,
    #[serde(default)]
    pub status: CastingStatus,
}

/// A persisted exposure line
///
/// Seconds are rounded to whole seconds here and nowhere earlier.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExposureRecord {
    pub id: Uuid,
    pub casting_id: Uuid,
    pub source_id: Uuid,
    pub isotope: Isotope,
    pub recorded_at: DateTime<Utc>,
    pub technique: String,
    pub film_speed: String,
    pub material: String,
    pub thickness_mm: f64,
    pub sfd_mm: f64,
    pub total_film: u32,
    pub setting_time_s: f64,
    pub movement_time_s: f64,
    pub effective_activity_mbq: f64,
    pub total_exposure_s: i64,
    pub per_casting_s: i64,
    pub chart_entry_id: Option<Uuid>,
}

/// Sources and castings known to the installation
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Registry {
    #[serde(default)]
    pub sources: HashMap<Uuid, Source>,
    #[serde(default)]
    pub castings: HashMap<Uuid, Casting>,
}
