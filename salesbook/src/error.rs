//! Error types for the salesbook crate
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized for display by a front-end.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Category not found: {0}")]
    CategoryNotFound(i64),

    #[error("Item not found: {0}")]
    ItemNotFound(i64),

    #[error("Sale not found: {0}")]
    SaleNotFound(i64),

    #[error("Export not found: {0}")]
    ExportNotFound(String),

    #[error("Category {category_id} cannot be moved under {parent_id}: that would create a cycle")]
    CategoryCycle { category_id: i64, parent_id: i64 },

    #[error("Backup snapshot not found: {}", .0.display())]
    BackupMissing(PathBuf),

    #[error("Backup snapshot {} is corrupted: expected checksum {expected}, got {actual}", .path.display())]
    BackupCorrupted {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Invalid snapshot row {row}: {reason}")]
    SnapshotFormat { row: usize, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Generic(String),
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
