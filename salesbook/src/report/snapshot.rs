//! Backup snapshot parsing and replay
//!
//! A snapshot is the delimited table written alongside every export.
//! Parsing it and replaying the rows produces the same sink events as the
//! live walk did, so any format can be regenerated without the store.

use super::money::sum_amounts;
use super::traversal::{CategorySummary, ReportLine, ReportSink};
use crate::config::{CSV_HEADER, NONE_MARKER};
use crate::error::{AppError, Result};

/// One data row of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub parent: String,
    pub name: String,
    /// `None` marks a category row
    pub unit_price: Option<f64>,
    pub quantity: i64,
    pub total: f64,
}

impl SnapshotRow {
    pub fn is_category(&self) -> bool {
        self.unit_price.is_none()
    }
}

/// Parse snapshot bytes. Row numbers in errors count data rows from 1.
pub fn parse_snapshot(bytes: &[u8]) -> Result<Vec<SnapshotRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers()?;
    if !headers.iter().eq(CSV_HEADER.iter().copied()) {
        return Err(AppError::SnapshotFormat {
            row: 0,
            reason: format!("unexpected header {:?}", headers),
        });
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let row = index + 1;
        let record = record?;
        if record.len() != CSV_HEADER.len() {
            return Err(AppError::SnapshotFormat {
                row,
                reason: format!("expected {} fields, found {}", CSV_HEADER.len(), record.len()),
            });
        }

        let unit_price = match &record[2] {
            NONE_MARKER => None,
            price => Some(parse_number(price, row, "price")?),
        };
        let quantity = record[3].parse::<i64>().map_err(|e| AppError::SnapshotFormat {
            row,
            reason: format!("invalid quantity '{}': {}", &record[3], e),
        })?;

        rows.push(SnapshotRow {
            parent: record[0].to_string(),
            name: record[1].to_string(),
            unit_price,
            quantity,
            total: parse_number(&record[4], row, "total")?,
        });
    }

    Ok(rows)
}

fn parse_number(field: &str, row: usize, what: &str) -> Result<f64> {
    field.parse::<f64>().map_err(|e| AppError::SnapshotFormat {
        row,
        reason: format!("invalid {} '{}': {}", what, field, e),
    })
}

struct OpenCategory {
    summary: CategorySummary,
    lines: Vec<ReportLine>,
}

/// Feed parsed snapshot rows to `sink` in live-walk order.
///
/// Rows are in pre-order, so the row's parent column tells which open
/// categories are finished: everything above the named parent is closed
/// (its lines and total emitted) before the row is handled.
pub fn replay(rows: &[SnapshotRow], sink: &mut dyn ReportSink) -> Result<()> {
    let mut open: Vec<OpenCategory> = Vec::new();
    let mut uncategorized = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        let parent = parent_key(row, &open);
        close_until(&mut open, parent, sink)?;
        if parent.is_some() && open.is_empty() {
            return Err(AppError::SnapshotFormat {
                row: index + 1,
                reason: format!("parent '{}' is not an open category", row.parent),
            });
        }

        if row.is_category() {
            let summary = CategorySummary {
                name: row.name.clone(),
                parent_name: parent.map(str::to_string),
                depth: open.len(),
                total: row.total,
                count: row.quantity,
            };
            sink.category_enter(&summary)?;
            open.push(OpenCategory {
                summary,
                lines: Vec::new(),
            });
        } else {
            let line = ReportLine {
                label: row.name.clone(),
                unit_price: row.unit_price.unwrap_or_default(),
                quantity: row.quantity,
                total: row.total,
            };
            match open.last_mut() {
                Some(category) => category.lines.push(line),
                None => uncategorized.push(line),
            }
        }
    }

    close_until(&mut open, None, sink)?;
    if !uncategorized.is_empty() {
        sink.items(None, &uncategorized)?;
    }

    let item_totals = rows.iter().filter(|row| !row.is_category()).map(|row| row.total);
    sink.finish(sum_amounts(item_totals))
}

/// `None` means the row sits at the top level.
///
/// A parent literally named "None" is taken as the category of that name
/// while one is open.
fn parent_key<'a>(row: &'a SnapshotRow, open: &[OpenCategory]) -> Option<&'a str> {
    if row.parent == NONE_MARKER && !open.iter().any(|c| c.summary.name == NONE_MARKER) {
        None
    } else {
        Some(row.parent.as_str())
    }
}

fn close_until(open: &mut Vec<OpenCategory>, parent: Option<&str>, sink: &mut dyn ReportSink) -> Result<()> {
    while let Some(top) = open.last() {
        if Some(top.summary.name.as_str()) == parent {
            break;
        }
        if let Some(done) = open.pop() {
            sink.items(Some(&done.summary), &done.lines)?;
            sink.category_total(&done.summary)?;
        }
    }
    Ok(())
}
