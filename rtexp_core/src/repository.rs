//! Persistence collaborator for the exposure engine.
//!
//! The planner only needs three things from storage: a source by id, the
//! chart row for a key, and somewhere to put the finished record. Both
//! implementations here are constructed once and passed in explicitly.

use crate::chart::{get_default_chart, ChartLookup, ExposureChart};
use crate::exposure_log::{ExposureLog, LogContents};
use crate::lockfile::with_exclusive_lock;
use crate::{ChartEntry, ChartKey, Error, ExposureRecord, Registry, Result, Source};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Storage operations the exposure engine depends on
pub trait Repository {
    fn source(&self, id: Uuid) -> Result<Option<Source>>;

    fn chart_entry(&self, key: &ChartKey) -> Result<Option<ChartEntry>>;

    fn persist(&mut self, record: &ExposureRecord) -> Result<()>;
}

/// Repository held entirely in memory
#[derive(Clone, Debug, Default)]
pub struct MemoryRepository {
    pub sources: HashMap<Uuid, Source>,
    pub chart: ExposureChart,
    pub records: Vec<ExposureRecord>,
}

impl MemoryRepository {
    pub fn new(chart: ExposureChart) -> Self {
        Self {
            chart,
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.sources.insert(source.id, source);
        self
    }
}

impl Repository for MemoryRepository {
    fn source(&self, id: Uuid) -> Result<Option<Source>> {
        Ok(self.sources.get(&id).cloned())
    }

    fn chart_entry(&self, key: &ChartKey) -> Result<Option<ChartEntry>> {
        self.chart.lookup(key)
    }

    fn persist(&mut self, record: &ExposureRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// File locations inside a data directory
#[derive(Clone, Debug)]
pub struct DataLayout {
    data_dir: PathBuf,
}

impl DataLayout {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join("registry.json")
    }

    pub fn chart_path(&self) -> PathBuf {
        self.data_dir.join("chart.csv")
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("wal").join("exposures.wal")
    }

    /// The operator's chart, or the built-in one if none was imported
    pub fn load_chart(&self) -> Result<ExposureChart> {
        let path = self.chart_path();
        if path.exists() {
            ExposureChart::load_csv(&path)
        } else {
            tracing::info!("No chart at {:?}, using built-in chart", path);
            Ok(get_default_chart().clone())
        }
    }

    /// Load, modify and save the chart under its write lock
    ///
    /// The modified chart must pass `ExposureChart::validate`; otherwise
    /// nothing is written and the problems come back as `ChartValidation`.
    pub fn update_chart<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut ExposureChart) -> Result<T>,
    {
        let path = self.chart_path();
        with_exclusive_lock(&path, || {
            let mut chart = self.load_chart()?;
            let value = f(&mut chart)?;

            let errors = chart.validate();
            if !errors.is_empty() {
                return Err(Error::ChartValidation(errors.join("; ")));
            }
            chart.save_csv(&path)?;
            Ok(value)
        })
    }

    pub fn load_registry(&self) -> Result<Registry> {
        Registry::load(&self.registry_path())
    }

    pub fn exposure_log(&self) -> ExposureLog {
        ExposureLog::new(self.wal_path())
    }

    pub fn read_log(&self) -> Result<LogContents> {
        self.exposure_log().read()
    }
}

/// Repository backed by a data directory
///
/// Sources come from `registry.json`, chart rows from `chart.csv` and
/// records are appended to `wal/exposures.wal`.
pub struct FileRepository {
    layout: DataLayout,
    registry: Registry,
    chart: ExposureChart,
    log: ExposureLog,
}

impl FileRepository {
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let layout = DataLayout::new(data_dir);
        let registry = layout.load_registry()?;
        let chart = layout.load_chart()?;
        let log = layout.exposure_log();

        tracing::debug!(
            "Opened data directory {:?} ({} sources, {} chart rows)",
            layout.data_dir(),
            registry.sources.len(),
            chart.len()
        );

        Ok(Self {
            layout,
            registry,
            chart,
            log,
        })
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn chart(&self) -> &ExposureChart {
        &self.chart
    }
}

impl Repository for FileRepository {
    fn source(&self, id: Uuid) -> Result<Option<Source>> {
        Ok(self.registry.sources.get(&id).cloned())
    }

    fn chart_entry(&self, key: &ChartKey) -> Result<Option<ChartEntry>> {
        self.chart.lookup(key)
    }

    fn persist(&mut self, record: &ExposureRecord) -> Result<()> {
        self.log.append(record)
    }
}
