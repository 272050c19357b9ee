//! Sales reporting and export engine
//!
//! - `tree`, `pricing`: category arena and inherited price resolution
//! - `aggregate`: sale groups filed by category, subtree totals
//! - `indicator`: discount labels
//! - `money`: cent rounding and order-independent sums
//! - `traversal`: the one walk every format is driven by
//! - `table`, `pages` + `pdf`: the delimited and paginated renderers
//! - `snapshot`: parsing a delimited table back into walk events

pub mod aggregate;
pub mod indicator;
pub mod money;
pub mod pages;
pub mod pdf;
pub mod pricing;
pub mod snapshot;
pub mod table;
pub mod traversal;
pub mod tree;

pub use aggregate::{subtree_count, subtree_total, GroupsByCategory};
pub use indicator::classify;
pub use pages::{PageLayout, PagedDocument, PaginatedRenderer, ReportHeader};
pub use pricing::resolve_category_price;
pub use snapshot::{parse_snapshot, replay, SnapshotRow};
pub use table::CsvRenderer;
pub use traversal::{traverse, CategorySummary, ReportLine, ReportSink};
pub use tree::CategoryTree;

use crate::database::ExportFormat;
use crate::error::Result;

/// Everything needed to lay out the paginated format.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub header: ReportHeader,
    pub layout: PageLayout,
    pub currency: String,
}

/// Output of one live render.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    /// Document in the requested format
    pub document: Vec<u8>,
    /// Delimited table of the same data, always produced
    pub snapshot: Vec<u8>,
}

/// Render live store data in `format`, together with its snapshot.
pub fn render_report(
    tree: &CategoryTree,
    groups: &GroupsByCategory,
    format: ExportFormat,
    options: &RenderOptions,
) -> Result<RenderedReport> {
    let mut table = CsvRenderer::new()?;
    traverse(tree, groups, &mut table)?;
    let snapshot = table.into_bytes()?;

    let document = match format {
        ExportFormat::Csv => snapshot.clone(),
        ExportFormat::Pdf => {
            let mut renderer = PaginatedRenderer::new(options.layout, &options.header, &options.currency);
            traverse(tree, groups, &mut renderer)?;
            pdf::encode_pdf(&renderer.into_document())?
        }
    };

    Ok(RenderedReport { document, snapshot })
}

/// Regenerate a document from snapshot bytes alone.
pub fn render_snapshot(snapshot: &[u8], format: ExportFormat, options: &RenderOptions) -> Result<Vec<u8>> {
    let rows = parse_snapshot(snapshot)?;

    match format {
        ExportFormat::Csv => {
            let mut table = CsvRenderer::new()?;
            replay(&rows, &mut table)?;
            table.into_bytes()
        }
        ExportFormat::Pdf => {
            let mut renderer = PaginatedRenderer::new(options.layout, &options.header, &options.currency);
            replay(&rows, &mut renderer)?;
            pdf::encode_pdf(&renderer.into_document())
        }
    }
}
