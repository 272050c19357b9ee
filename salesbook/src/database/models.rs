//! Database models
//!
//! Rust structs representing store entities.
//! All models use serde so they can be handed to any front-end.

use crate::report::money::round_to_cents;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A node of the catalog hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    /// Price inherited by items and subcategories that do not set their own
    pub default_price: Option<f64>,
    pub parent_id: Option<i64>,
    /// Soft-delete flag; hidden categories keep their rows and sales
    pub visible: bool,
}

/// Create category request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub default_price: Option<f64>,
    pub parent_id: Option<i64>,
}

/// Update category request (full replacement of the editable fields)
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCategoryRequest {
    pub id: i64,
    pub name: String,
    pub default_price: Option<f64>,
    pub parent_id: Option<i64>,
}

/// A sellable catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub base_price: f64,
    /// `-1` means stock is not tracked
    pub current_stock: i64,
    pub total_sold: i64,
    pub uses_category_price: bool,
    pub visible: bool,
    pub category_id: Option<i64>,
}

/// Create item request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    /// Ignored when `uses_category_price` is set and a category is given
    pub base_price: Option<f64>,
    /// `None` stores an untracked stock
    pub current_stock: Option<i64>,
    pub category_id: Option<i64>,
    pub uses_category_price: bool,
}

/// Update item request (full replacement of the editable fields)
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateItemRequest {
    pub id: i64,
    pub name: String,
    pub base_price: Option<f64>,
    pub current_stock: Option<i64>,
    pub category_id: Option<i64>,
    pub uses_category_price: bool,
}

/// A recorded sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Sale {
    pub id: i64,
    pub item_id: i64,
    pub sold_price: f64,
    pub sold_at: DateTime<Utc>,
    pub batch_id: i64,
}

/// Sale joined with its item name, as shown in the sale history
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SaleHistoryEntry {
    pub id: i64,
    pub item_id: i64,
    pub item_name: String,
    pub sold_price: f64,
    pub sold_at: DateTime<Utc>,
    pub batch_id: i64,
}

/// A group of sales closed out together
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SaleBatch {
    pub id: i64,
    pub name: String,
    pub export_time: Option<DateTime<Utc>>,
}

/// Sales of one item at one price within a scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleGroup {
    pub item_id: i64,
    pub item_name: String,
    pub category_id: Option<i64>,
    pub sold_price: f64,
    /// The item's current base price, used to label discounts
    pub base_price: f64,
    pub quantity: i64,
    pub total: f64,
}

impl SaleGroup {
    pub fn new(
        item_id: i64,
        item_name: String,
        category_id: Option<i64>,
        sold_price: f64,
        base_price: f64,
        quantity: i64,
    ) -> Self {
        Self {
            item_id,
            item_name,
            category_id,
            sold_price,
            base_price,
            quantity,
            total: round_to_cents(sold_price * quantity as f64),
        }
    }
}

/// Which sales an export covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportScope {
    CurrentBatch,
    AllBatches,
}

impl ExportScope {
    pub fn is_full_export(self) -> bool {
        matches!(self, ExportScope::AllBatches)
    }
}

/// Output document format of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExportFormat {
    Csv,
    Pdf,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Csv => "CSV",
            ExportFormat::Pdf => "PDF",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown export format: {0}")]
pub struct ParseFormatError(String);

impl FromStr for ExportFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CSV" => Ok(ExportFormat::Csv),
            "PDF" => Ok(ExportFormat::Pdf),
            _ => Err(ParseFormatError(s.to_string())),
        }
    }
}

impl TryFrom<String> for ExportFormat {
    type Error = ParseFormatError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// A completed export
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExportRecord {
    pub id: String,
    pub filename: String,
    pub filepath: String,
    pub exported_at: DateTime<Utc>,
    /// Absent for all-batches exports
    pub batch_id: Option<i64>,
    #[sqlx(try_from = "String")]
    pub format: ExportFormat,
    pub is_full_export: bool,
    pub display_name: String,
    pub date_range: String,
    /// SHA-256 of the backup snapshot written with this export
    pub snapshot_checksum: String,
}

/// Fields of an export record known before it is stored
#[derive(Debug, Clone)]
pub struct NewExportRecord {
    pub filename: String,
    pub filepath: String,
    pub batch_id: Option<i64>,
    pub format: ExportFormat,
    pub is_full_export: bool,
    pub display_name: String,
    pub date_range: String,
    pub snapshot_checksum: String,
}
