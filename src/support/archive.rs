//! Single-owner zip writer fed through a bounded channel

use super::BundleEntry;
use crate::error::{OpsError, Result};
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Owns the archive file; entries arrive through [`ArchiveWriter::sender`]
pub struct ArchiveWriter {
    tx: mpsc::Sender<BundleEntry>,
    handle: JoinHandle<Result<Vec<String>>>,
}

impl ArchiveWriter {
    /// Create the archive at `path` and start the writer task
    pub fn create(path: &Path, capacity: usize) -> Result<Self> {
        let file = File::create(path)?;
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::task::spawn_blocking(move || write_entries(file, rx));
        Ok(Self { tx, handle })
    }

    pub fn sender(&self) -> mpsc::Sender<BundleEntry> {
        self.tx.clone()
    }

    /// Close the channel, let the writer drain it and finalise the archive
    ///
    /// Returns the paths written, in write order.
    pub async fn finish(self) -> Result<Vec<String>> {
        drop(self.tx);
        self.handle
            .await
            .map_err(|e| OpsError::Io(std::io::Error::other(format!("archive writer failed: {e}"))))?
    }
}

fn zip_time(time: DateTime<Utc>) -> Option<zip::DateTime> {
    zip::DateTime::from_date_and_time(
        u16::try_from(time.year()).ok()?,
        time.month() as u8,
        time.day() as u8,
        time.hour() as u8,
        time.minute() as u8,
        time.second() as u8,
    )
    .ok()
}

fn write_entries(file: File, mut rx: mpsc::Receiver<BundleEntry>) -> Result<Vec<String>> {
    let mut zip = ZipWriter::new(file);
    let base = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut seen = HashSet::new();
    let mut written = Vec::new();

    while let Some(entry) = rx.blocking_recv() {
        if !seen.insert(entry.path.clone()) {
            warn!("Duplicate bundle path {} dropped", entry.path);
            continue;
        }
        let options = match entry.mtime.and_then(zip_time) {
            Some(mtime) => base.last_modified_time(mtime),
            None => base,
        };
        zip.start_file(entry.path.as_str(), options)?;
        zip.write_all(&entry.content)?;
        debug!("Wrote {} ({} bytes)", entry.path, entry.content.len());
        written.push(entry.path);
    }

    zip.finish()?;
    Ok(written)
}
