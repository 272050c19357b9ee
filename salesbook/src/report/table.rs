//! Delimited table renderer
//!
//! Writes `Parent,Name,Individual Price,Number of Sales,Total` rows.
//! Category rows carry their subtree figures and `None` as the price.
//! Fields holding a comma, quote or newline are quoted with inner quotes
//! doubled. Numbers use two decimals and a `.` separator regardless of
//! locale.
//!
//! The same bytes serve as the backup snapshot, so the output must stay
//! parseable by [`super::snapshot`].

use super::traversal::{CategorySummary, ReportLine, ReportSink};
use crate::config::{CSV_HEADER, NONE_MARKER};
use crate::error::{AppError, Result};

/// Fixed two-decimal money formatting
pub fn format_amount(value: f64) -> String {
    format!("{:.2}", value)
}

/// Report sink producing a delimited text table.
pub struct CsvRenderer {
    writer: csv::Writer<Vec<u8>>,
}

impl CsvRenderer {
    pub fn new() -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .quote_style(csv::QuoteStyle::Necessary)
            .from_writer(Vec::new());
        writer.write_record(CSV_HEADER)?;
        Ok(Self { writer })
    }

    /// Finish the table and return its bytes.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        self.writer
            .into_inner()
            .map_err(|e| AppError::Generic(format!("Failed to finish table: {}", e.error())))
    }
}

impl ReportSink for CsvRenderer {
    fn category_enter(&mut self, category: &CategorySummary) -> Result<()> {
        self.writer.write_record([
            category.parent_name.as_deref().unwrap_or(NONE_MARKER),
            category.name.as_str(),
            NONE_MARKER,
            category.count.to_string().as_str(),
            format_amount(category.total).as_str(),
        ])?;
        Ok(())
    }

    fn items(&mut self, category: Option<&CategorySummary>, lines: &[ReportLine]) -> Result<()> {
        let parent = category.map(|c| c.name.as_str()).unwrap_or(NONE_MARKER);
        for line in lines {
            self.writer.write_record([
                parent,
                line.label.as_str(),
                format_amount(line.unit_price).as_str(),
                line.quantity.to_string().as_str(),
                format_amount(line.total).as_str(),
            ])?;
        }
        Ok(())
    }

    fn category_total(&mut self, _category: &CategorySummary) -> Result<()> {
        // Subtree figures already went out on the category row.
        Ok(())
    }

    fn finish(&mut self, _grand_total: f64) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SaleGroup;
    use crate::report::aggregate::GroupsByCategory;
    use crate::report::traversal::traverse;
    use crate::report::tree::{category, CategoryTree};

    fn render(tree: &CategoryTree, groups: Vec<SaleGroup>) -> String {
        let groups = GroupsByCategory::organize(groups, tree);
        let mut renderer = CsvRenderer::new().unwrap();
        traverse(tree, &groups, &mut renderer).unwrap();
        String::from_utf8(renderer.into_bytes().unwrap()).unwrap()
    }

    #[test]
    fn test_badges_table() {
        let tree = CategoryTree::new(vec![
            category(1, "Merch", Some(5.0), None),
            category(2, "Badges", None, Some(1)),
        ]);
        let csv = render(
            &tree,
            vec![
                SaleGroup::new(10, "Pin".to_string(), Some(2), 2.5, 5.0, 2),
                SaleGroup::new(10, "Pin".to_string(), Some(2), 5.0, 5.0, 3),
            ],
        );

        assert_eq!(
            csv,
            "Parent,Name,Individual Price,Number of Sales,Total\n\
             None,Merch,None,5,20.00\n\
             Merch,Badges,None,5,20.00\n\
             Badges,Pin 50% off,2.50,2,5.00\n\
             Badges,Pin,5.00,3,15.00\n"
        );
    }

    #[test]
    fn test_escaping() {
        let tree = CategoryTree::new(vec![category(1, "Shirts, Tees", None, None)]);
        let csv = render(
            &tree,
            vec![
                SaleGroup::new(1, "The \"Lunar\" Tee".to_string(), Some(1), 20.0, 20.0, 1),
                SaleGroup::new(2, "Two\nLines".to_string(), None, 1.0, 1.0, 1),
            ],
        );

        let lines: Vec<&str> = csv.splitn(2, '\n').collect();
        assert_eq!(lines[0], "Parent,Name,Individual Price,Number of Sales,Total");
        assert!(csv.contains("None,\"Shirts, Tees\",None,1,20.00\n"));
        assert!(csv.contains("\"Shirts, Tees\",\"The \"\"Lunar\"\" Tee\",20.00,1,20.00\n"));
        assert!(csv.contains("None,\"Two\nLines\",1.00,1,1.00\n"));
    }

    #[test]
    fn test_empty_report_is_header_only() {
        let csv = render(&CategoryTree::default(), Vec::new());
        assert_eq!(csv, "Parent,Name,Individual Price,Number of Sales,Total\n");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(2.5), "2.50");
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(1234.567), "1234.57");
    }
}
