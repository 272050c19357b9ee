//! Storage module
//!
//! Provides the export directory: primary documents, backup snapshots and
//! re-exported documents, all written atomically.

pub mod export_store;

pub use export_store::{calculate_checksum, ExportStore};
