//! Application configuration constants
//!
//! Central location for layout constants, file naming conventions,
//! and validation boundaries used throughout the application.

// ===== Page Layout =====

/// Page width in layout units (A4 at 72 dpi)
pub const PAGE_WIDTH: f32 = 595.0;
/// Page height in layout units (A4 at 72 dpi)
pub const PAGE_HEIGHT: f32 = 842.0;
/// Margin applied on every side of a page
pub const PAGE_MARGIN: f32 = 40.0;
/// Height of one text line
pub const LINE_HEIGHT: f32 = 20.0;
/// Horizontal indentation added per category nesting level
pub const INDENT_STEP: f32 = 20.0;

// ===== Page-Break Headroom (in lines) =====

/// A category header needs room for its own line.
pub const CATEGORY_HEADER_LINES: f32 = 1.0;
/// An item line needs room for its own line.
pub const ITEM_LINES: f32 = 1.0;
/// A category total is followed by half a line of spacing.
pub const CATEGORY_TOTAL_LINES: f32 = 1.5;
/// The grand total keeps three lines free so it is never orphaned.
pub const GRAND_TOTAL_LINES: f32 = 3.0;

// ===== Column Offsets (measured from the right page edge) =====

pub const PRICE_COLUMN_OFFSET: f32 = 250.0;
pub const QUANTITY_COLUMN_OFFSET: f32 = 150.0;
pub const TOTAL_COLUMN_OFFSET: f32 = 80.0;
pub const GRAND_TOTAL_COLUMN_OFFSET: f32 = 100.0;

// ===== Font Sizes =====

pub const TITLE_FONT_SIZE: f32 = 18.0;
pub const SUBTITLE_FONT_SIZE: f32 = 12.0;
pub const CATEGORY_FONT_SIZE: f32 = 14.0;
pub const ITEM_FONT_SIZE: f32 = 11.0;
pub const CATEGORY_TOTAL_FONT_SIZE: f32 = 12.0;
pub const GRAND_TOTAL_FONT_SIZE: f32 = 16.0;

/// Average Helvetica glyph advance as a fraction of the font size.
/// Used to center titles without font metrics.
pub const AVERAGE_GLYPH_WIDTH: f32 = 0.5;

// ===== Delimited Report =====

/// Header row of every delimited report and backup snapshot
pub const CSV_HEADER: [&str; 5] = ["Parent", "Name", "Individual Price", "Number of Sales", "Total"];

/// Placeholder used for "no parent" and for the price column of category rows
pub const NONE_MARKER: &str = "None";

// ===== Files and Directories =====

pub const DATABASE_FILE: &str = "db.sqlite";
pub const SETTINGS_FILE: &str = "settings.json";
pub const EXPORTS_DIR: &str = "exports";
pub const BACKUP_DIR: &str = "backup";
pub const BACKUP_PREFIX: &str = "backup_";
pub const REEXPORT_SUFFIX: &str = "_reexport";
pub const EXPORT_PREFIX: &str = "export_";

// ===== Store Conventions =====

/// Stock value meaning "not tracked"
pub const UNTRACKED_STOCK: i64 = -1;

/// Display name used for exports spanning every batch
pub const ALL_BATCHES_NAME: &str = "All Batches";

// ===== Settings Limits =====

/// Smallest page edge accepted in settings
pub const MIN_PAGE_EDGE: f32 = 200.0;
/// Largest page edge accepted in settings (A0 at 72 dpi)
pub const MAX_PAGE_EDGE: f32 = 3370.0;
/// Smallest line height accepted in settings
pub const MIN_LINE_HEIGHT: f32 = 8.0;
/// Largest line height accepted in settings
pub const MAX_LINE_HEIGHT: f32 = 72.0;
/// Maximum length of the currency symbol
pub const MAX_CURRENCY_SYMBOL_LENGTH: usize = 4;
