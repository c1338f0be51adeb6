//! Empirical exposure chart and its lookup contract.
//!
//! A chart row calibrates K and alpha for one (isotope, technique, film,
//! material) combination over an inclusive thickness band. Bands should not
//! overlap, but when they do the lookup still returns exactly one row:
//! the narrowest band wins, then the lower band start, then the row that was
//! added first.

use crate::{ChartEntry, ChartKey, Error, Isotope, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::io;
use std::path::Path;
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Anything that can resolve a chart key to calibration constants
///
/// `Ok(None)` means no row applies. Callers must not compute an exposure
/// time in that case.
pub trait ChartLookup {
    fn lookup(&self, key: &ChartKey) -> Result<Option<ChartEntry>>;
}

/// In-memory exposure chart
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExposureChart {
    entries: Vec<ChartEntry>,
}

/// Built-in chart used until an operator imports a calibrated one
static DEFAULT_CHART: Lazy<ExposureChart> = Lazy::new(build_default_chart);

/// Get a reference to the cached default chart
pub fn get_default_chart() -> &'static ExposureChart {
    &DEFAULT_CHART
}

fn build_default_chart() -> ExposureChart {
    ExposureChart::from_entries(vec![ChartEntry {
        id: Uuid::from_u128(0x5a1c_0001),
        isotope: Isotope::Ir192,
        technique: "SW/SI".into(),
        film_speed: "D7".into(),
        material: "steel".into(),
        thickness_min_mm: 1.0,
        thickness_max_mm: 50.0,
        base_constant: 120.0,
        alpha: 0.8,
        remarks: Some("Factory default; replace with a calibrated chart".into()),
    }])
}

impl ExposureChart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<ChartEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ChartEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, entry: ChartEntry) {
        self.entries.push(entry);
    }

    /// Remove a row by id, returning it if present
    pub fn remove(&mut self, id: Uuid) -> Option<ChartEntry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Pick the single most specific row for `key`
    pub fn find(&self, key: &ChartKey) -> Option<&ChartEntry> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.matches(key))
            .min_by(|(ia, a), (ib, b)| specificity(a, b).then(ia.cmp(ib)))
            .map(|(_, entry)| entry)
    }

    /// Validate the chart for consistency
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for entry in &self.entries {
            let id = entry.id;
            if entry.technique.trim().is_empty() {
                errors.push(format!("Chart row {} has empty technique", id));
            }
            if entry.film_speed.trim().is_empty() {
                errors.push(format!("Chart row {} has empty film speed", id));
            }
            if entry.material.trim().is_empty() {
                errors.push(format!("Chart row {} has empty material", id));
            }
            if !entry.base_constant.is_finite() || entry.base_constant <= 0.0 {
                errors.push(format!(
                    "Chart row {}: base constant {} must be positive",
                    id, entry.base_constant
                ));
            }
            if !entry.alpha.is_finite() {
                errors.push(format!("Chart row {}: alpha is not finite", id));
            }
            if !entry.thickness_min_mm.is_finite() || !entry.thickness_max_mm.is_finite() {
                errors.push(format!("Chart row {}: thickness band is not finite", id));
            } else if entry.thickness_min_mm > entry.thickness_max_mm {
                errors.push(format!(
                    "Chart row {}: thickness min {} > max {}",
                    id, entry.thickness_min_mm, entry.thickness_max_mm
                ));
            }
        }

        for (i, entry) in self.entries.iter().enumerate() {
            if self.entries[..i].iter().any(|e| e.id == entry.id) {
                errors.push(format!("Duplicate chart row id {}", entry.id));
            }
        }

        errors
    }

    /// Pairs of rows whose thickness bands overlap for the same combination
    pub fn overlaps(&self) -> Vec<(Uuid, Uuid)> {
        let mut pairs = Vec::new();
        for (i, a) in self.entries.iter().enumerate() {
            for b in &self.entries[i + 1..] {
                let same_group = a.isotope == b.isotope
                    && a.technique == b.technique
                    && a.film_speed == b.film_speed
                    && a.material == b.material;
                if same_group
                    && a.thickness_min_mm <= b.thickness_max_mm
                    && b.thickness_min_mm <= a.thickness_max_mm
                {
                    pairs.push((a.id, b.id));
                }
            }
        }
        pairs
    }

    /// Load a chart from a CSV file with a header row
    pub fn load_csv(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let chart = Self::from_csv_reader(file)?;
        tracing::info!("Loaded {} chart rows from {:?}", chart.len(), path);
        Ok(chart)
    }

    /// Parse chart rows from any CSV source
    ///
    /// Columns: `id` (optional), `isotope`, `technique`, `film_speed`,
    /// `material`, `thickness_min_mm`, `thickness_max_mm`, `base_constant`,
    /// `alpha` (optional), `remarks` (optional).
    pub fn from_csv_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = Vec::new();
        for (line, row) in csv_reader.deserialize::<CsvRow>().enumerate() {
            let row = row?;
            let entry = ChartEntry::try_from(row).map_err(|e| match e {
                Error::InvalidIsotope(tag) => Error::ChartValidation(format!(
                    "row {}: unsupported isotope '{}'",
                    line + 1,
                    tag
                )),
                other => other,
            })?;
            entries.push(entry);
        }

        Ok(Self { entries })
    }

    /// Write the chart as CSV, atomically replacing `path`
    pub fn save_csv(&self, path: &Path) -> Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        {
            let mut writer = csv::Writer::from_writer(temp.as_file());
            for entry in &self.entries {
                writer.serialize(CsvRow::from(entry))?;
            }
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::info!("Saved {} chart rows to {:?}", self.len(), path);
        Ok(())
    }
}

impl ChartLookup for ExposureChart {
    fn lookup(&self, key: &ChartKey) -> Result<Option<ChartEntry>> {
        Ok(self.find(key).cloned())
    }
}

/// Narrower band first, then lower band start
fn specificity(a: &ChartEntry, b: &ChartEntry) -> Ordering {
    a.band_width()
        .total_cmp(&b.band_width())
        .then(a.thickness_min_mm.total_cmp(&b.thickness_min_mm))
}

/// A row in the chart CSV file
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    #[serde(default)]
    id: Option<Uuid>,
    isotope: String,
    technique: String,
    film_speed: String,
    material: String,
    thickness_min_mm: f64,
    thickness_max_mm: f64,
    base_constant: f64,
    #[serde(default)]
    alpha: Option<f64>,
    #[serde(default)]
    remarks: Option<String>,
}

impl TryFrom<CsvRow> for ChartEntry {
    type Error = Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        Ok(ChartEntry {
            id: row.id.unwrap_or_else(Uuid::new_v4),
            isotope: row.isotope.parse()?,
            technique: row.technique,
            film_speed: row.film_speed,
            material: row.material,
            thickness_min_mm: row.thickness_min_mm,
            thickness_max_mm: row.thickness_max_mm,
            base_constant: row.base_constant,
            alpha: row.alpha.unwrap_or(0.0),
            remarks: row.remarks.filter(|r| !r.is_empty()),
        })
    }
}

impl From<&ChartEntry> for CsvRow {
    fn from(entry: &ChartEntry) -> Self {
        CsvRow {
            id: Some(entry.id),
            isotope: entry.isotope.tag().to_string(),
            technique: entry.technique.clone(),
            film_speed: entry.film_speed.clone(),
            material: entry.material.clone(),
            thickness_min_mm: entry.thickness_min_mm,
            thickness_max_mm: entry.thickness_max_mm,
            base_constant: entry.base_constant,
            alpha: Some(entry.alpha),
            remarks: entry.remarks.clone(),
        }
    }
}
