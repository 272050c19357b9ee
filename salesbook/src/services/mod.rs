//! Services module
//!
//! Business logic services that coordinate between front-ends, the
//! repository and the export store.

pub mod catalog;
pub mod export;
pub mod sales;
pub mod settings;

pub use catalog::CatalogService;
pub use export::{ExportOutcome, ExportRequest, ExportService, ExportSummary};
pub use sales::SalesService;
pub use settings::{ReportSettings, SettingsService};
