//! Export file storage
//!
//! Layout under the exports root:
//!
//! ```text
//! exports/export_20240501_120000.pdf            primary document
//! exports/export_20240501_120000_reexport.csv   regenerated document
//! exports/backup/backup_export_20240501_120000.csv
//! ```
//!
//! The backup name is derived from the primary name alone, so finding the
//! snapshot of an export record needs nothing but its filename.

use crate::config::{BACKUP_DIR, BACKUP_PREFIX, REEXPORT_SUFFIX};
use crate::database::ExportFormat;
use crate::error::{AppError, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Calculate SHA-256 hash of data
pub fn calculate_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Directory of export artifacts
#[derive(Clone)]
pub struct ExportStore {
    root: PathBuf,
}

impl ExportStore {
    /// Create a new export store at the given root directory
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Initialize the export store (create directories if needed)
    pub async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(self.backup_dir()).await?;
        tracing::info!("Export store initialized at: {:?}", self.root);
        Ok(())
    }

    /// Write `data` to `path` through a temporary sibling file
    ///
    /// Readers see either the previous file or the complete new one.
    pub async fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = temp_path_for(path);
        if let Err(e) = write_synced(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::debug!("Wrote {:?} ({} bytes)", path, data.len());
        Ok(())
    }

    /// Write a primary document, returns its path
    pub async fn write_primary(&self, filename: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.primary_path(filename);
        self.write_atomic(&path, data).await?;
        Ok(path)
    }

    /// Write the backup snapshot belonging to `primary_filename`,
    /// returns its path and checksum
    pub async fn write_backup(&self, primary_filename: &str, snapshot: &[u8]) -> Result<(PathBuf, String)> {
        let path = self.backup_path(primary_filename);
        self.write_atomic(&path, snapshot).await?;
        Ok((path, calculate_checksum(snapshot)))
    }

    /// Read the backup snapshot of `primary_filename`
    ///
    /// A missing file and a checksum mismatch are reported as distinct errors.
    pub async fn read_backup(&self, primary_filename: &str, expected_checksum: &str) -> Result<Vec<u8>> {
        let path = self.backup_path(primary_filename);
        if !path.exists() {
            return Err(AppError::BackupMissing(path));
        }

        let data = read_file(&path).await?;
        let actual = calculate_checksum(&data);
        if actual != expected_checksum {
            tracing::warn!("Checksum mismatch for backup {:?}", path);
            return Err(AppError::BackupCorrupted {
                path,
                expected: expected_checksum.to_string(),
                actual,
            });
        }

        tracing::debug!("Read backup {:?} ({} bytes)", path, data.len());
        Ok(data)
    }

    /// Read any file of the store
    pub async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        read_file(path).await
    }

    /// Delete a file; an already missing file is not an error
    pub async fn delete(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!("Deleted {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every re-export generated from `primary_filename`
    pub async fn remove_reexports(&self, primary_filename: &str) -> Result<usize> {
        if !self.root.exists() {
            return Ok(0);
        }

        let prefix = format!("{}{}.", file_stem(primary_filename), REEXPORT_SUFFIX);
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let matches = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(&prefix))
                .unwrap_or(false);
            if matches && path.is_file() {
                self.delete(&path).await?;
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// First free `<stem>.<ext>`, `<stem>_1.<ext>`, `<stem>_2.<ext>`, ...
    pub fn unique_filename(&self, stem: &str, extension: &str) -> String {
        let mut candidate = format!("{}.{}", stem, extension);
        let mut counter = 1;
        // The backup is keyed by stem, so a stem taken in another format is taken
        while self.primary_path(&candidate).exists() || self.backup_path(&candidate).exists() {
            candidate = format!("{}_{}.{}", stem, counter, extension);
            counter += 1;
        }
        candidate
    }

    pub fn primary_path(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// `backup/backup_<stem>.csv`, whatever the primary's format
    pub fn backup_path(&self, primary_filename: &str) -> PathBuf {
        self.backup_dir()
            .join(format!("{}{}.csv", BACKUP_PREFIX, file_stem(primary_filename)))
    }

    /// Path of the document regenerated from `primary_filename` in `format`
    pub fn reexport_path(&self, primary_filename: &str, format: ExportFormat) -> PathBuf {
        self.root.join(format!(
            "{}{}.{}",
            file_stem(primary_filename),
            REEXPORT_SUFFIX,
            format.extension()
        ))
    }

    fn backup_dir(&self) -> PathBuf {
        self.root.join(BACKUP_DIR)
    }

    /// Get export store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn file_stem(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(filename)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

async fn write_synced(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}

async fn read_file(path: &Path) -> Result<Vec<u8>> {
    let mut file = fs::File::open(path).await?;
    let mut data = Vec::new();
    file.read_to_end(&mut data).await?;
    Ok(data)
}
