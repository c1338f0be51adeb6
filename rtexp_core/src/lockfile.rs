//! Sidecar lock files for read-modify-write cycles.
//!
//! Saves replace data files by renaming a temp file over them, so a lock held
//! on the data file only covers an inode that is about to be unlinked.
//! Writers lock a stable `<name>.lock` file next to the data file instead and
//! hold it across load, modify and save.

use crate::Result;
use fs2::FileExt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// `registry.json` -> `registry.json.lock`
pub(crate) fn lock_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

/// Run `f` while holding the exclusive sidecar lock for `path`
pub(crate) fn with_exclusive_lock<T, F>(path: &Path, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let lock = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path(path))?;
    lock.lock_exclusive()?;

    let result = f();
    let unlocked = lock.unlock();
    let value = result?;
    unlocked?;
    Ok(value)
}
