//! Source and casting registry persistence.
//!
//! The registry is a single JSON document. Saves go through a temp file in
//! the same directory and an atomic rename, so readers never see a partial
//! write. `update` holds the `registry.json.lock` sidecar for the whole
//! load-modify-save so concurrent writers queue instead of overwriting each
//! other.

use crate::lockfile::with_exclusive_lock;
use crate::{Casting, CastingStatus, Error, Registry, Result, Source};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use uuid::Uuid;

impl Registry {
    /// Load the registry from a file
    ///
    /// Returns an empty registry if the file doesn't exist. Unlike the
    /// exposure log, a registry that fails to parse is an error: sources
    /// cannot be rebuilt from anything else.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No registry file at {:?}, starting empty", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let registry: Registry = serde_json::from_str(&contents)?;
        tracing::debug!(
            "Loaded registry from {:?}: {} sources, {} castings",
            path,
            registry.sources.len(),
            registry.castings.len()
        );
        Ok(registry)
    }

    /// Replace the registry file atomically
    ///
    /// Callers that read the registry first must go through `update`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "registry path missing parent")
        })?;
        std::fs::create_dir_all(parent)?;

        let mut temp = NamedTempFile::new_in(parent)?;
        let contents = serde_json::to_string_pretty(self)?;
        temp.write_all(contents.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved registry to {:?}", path);
        Ok(())
    }

    /// Load, modify and save back under the registry write lock
    ///
    /// Nothing is written when `f` fails.
    pub fn update<F, T>(path: &Path, f: F) -> Result<T>
    where
        F: FnOnce(&mut Registry) -> Result<T>,
    {
        with_exclusive_lock(path, || {
            let mut registry = Self::load(path)?;
            let value = f(&mut registry)?;
            registry.save(path)?;
            Ok(value)
        })
    }

    /// Register a source after data-entry validation
    pub fn add_source(&mut self, source: Source) -> Result<()> {
        if !source.a0_mbq.is_finite() || source.a0_mbq <= 0.0 {
            return Err(Error::Validation(format!(
                "Reference activity must be positive, got {} MBq",
                source.a0_mbq
            )));
        }
        tracing::info!("Registered {} source {}", source.isotope, source.id);
        self.sources.insert(source.id, source);
        Ok(())
    }

    pub fn source(&self, id: Uuid) -> Result<&Source> {
        self.sources.get(&id).ok_or(Error::SourceNotFound(id))
    }

    /// Retire a source. Recorded exposures keep their own isotope and
    /// activity, so reports are unaffected.
    pub fn remove_source(&mut self, id: Uuid) -> Result<Source> {
        let source = self.sources.remove(&id).ok_or(Error::SourceNotFound(id))?;
        tracing::info!("Removed {} source {}", source.isotope, id);
        Ok(source)
    }

    /// Sources ordered by isotope, newest calibration first
    pub fn sources_sorted(&self) -> Vec<&Source> {
        let mut sources: Vec<&Source> = self.sources.values().collect();
        sources.sort_by(|a, b| {
            a.isotope
                .cmp(&b.isotope)
                .then(b.ref_date.cmp(&a.ref_date))
                .then(a.id.cmp(&b.id))
        });
        sources
    }

    pub fn add_casting(&mut self, casting: Casting) -> Result<()> {
        if casting.name.trim().is_empty() {
            return Err(Error::Validation("Casting name is required".into()));
        }
        if casting.customer.trim().is_empty() {
            return Err(Error::Validation("Customer is required".into()));
        }
        tracing::info!("Opened casting {} ({})", casting.id, casting.name);
        self.castings.insert(casting.id, casting);
        Ok(())
    }

    pub fn casting(&self, id: Uuid) -> Result<&Casting> {
        self.castings.get(&id).ok_or(Error::CastingNotFound(id))
    }

    pub fn set_casting_status(&mut self, id: Uuid, status: CastingStatus) -> Result<()> {
        let casting = self.castings.get_mut(&id).ok_or(Error::CastingNotFound(id))?;
        casting.status = status;
        tracing::info!("Casting {} is now {:?}", id, status);
        Ok(())
    }

    /// Castings ordered by date, then name
    pub fn castings_sorted(&self) -> Vec<&Casting> {
        let mut castings: Vec<&Casting> = self.castings.values().collect();
        castings.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.name.cmp(&b.name))
                .then(a.id.cmp(&b.id))
        });
        castings
    }
}
