//! Append-only exposure log.
//!
//! One JSON object per line in `wal/exposures.wal`. An append is a single
//! whole-line write under an exclusive lock on the log, synced before the
//! lock is released, so an exposure reported as recorded is on disk. If an
//! earlier append was cut short, the torn tail is fenced off with a newline
//! first; readers then skip that one line instead of losing the next record
//! glued onto it.

use crate::{ExposureRecord, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

/// Handle on an exposure log file
#[derive(Clone, Debug)]
pub struct ExposureLog {
    path: PathBuf,
}

/// What a read of the log recovered
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LogContents {
    pub records: Vec<ExposureRecord>,
    /// 1-based numbers of lines that did not parse
    pub skipped_lines: Vec<usize>,
}

impl ExposureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, record: &ExposureRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let written = write_line(&mut file, record);
        let unlocked = file.unlock();
        written?;
        unlocked?;

        tracing::debug!(
            "Logged exposure {} for casting {}",
            record.id,
            record.casting_id
        );
        Ok(())
    }

    /// Every whole record in file order
    ///
    /// A missing log reads as empty. Unparseable lines are reported in
    /// `skipped_lines` rather than failing the read.
    pub fn read(&self) -> Result<LogContents> {
        if !self.path.exists() {
            return Ok(LogContents::default());
        }

        let mut file = File::open(&self.path)?;
        file.lock_shared()?;
        let mut text = String::new();
        let read = file.read_to_string(&mut text);
        let unlocked = file.unlock();
        read?;
        unlocked?;

        let mut contents = LogContents::default();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ExposureRecord>(line) {
                Ok(record) => contents.records.push(record),
                Err(e) => {
                    tracing::warn!("Skipping exposure log line {}: {}", index + 1, e);
                    contents.skipped_lines.push(index + 1);
                }
            }
        }
        Ok(contents)
    }
}

fn write_line(file: &mut File, record: &ExposureRecord) -> Result<()> {
    let mut line = Vec::new();
    if ends_mid_line(file)? {
        tracing::warn!("Exposure log ends in a torn line; starting a new one");
        line.push(b'\n');
    }
    serde_json::to_writer(&mut line, record)?;
    line.push(b'\n');

    file.write_all(&line)?;
    file.sync_data()?;
    Ok(())
}

fn ends_mid_line(file: &mut File) -> Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}
