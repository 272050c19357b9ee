//! Paginated report layout
//!
//! Lays the report walk out onto fixed-size pages as positioned text runs.
//! The renderer keeps a single cursor; before every block it checks the
//! remaining room and starts a new page when the block would cross the
//! bottom margin. Earlier pages are never revisited.
//!
//! Coordinates are in layout units (1/72 inch) with `y` measured from the
//! top of the page to the text baseline.

use super::table::format_amount;
use super::traversal::{CategorySummary, ReportLine, ReportSink};
use crate::config::{
    AVERAGE_GLYPH_WIDTH, CATEGORY_FONT_SIZE, CATEGORY_HEADER_LINES, CATEGORY_TOTAL_FONT_SIZE,
    CATEGORY_TOTAL_LINES, GRAND_TOTAL_COLUMN_OFFSET, GRAND_TOTAL_FONT_SIZE, GRAND_TOTAL_LINES,
    INDENT_STEP, ITEM_FONT_SIZE, ITEM_LINES, LINE_HEIGHT, PAGE_HEIGHT, PAGE_MARGIN, PAGE_WIDTH,
    PRICE_COLUMN_OFFSET, QUANTITY_COLUMN_OFFSET, SUBTITLE_FONT_SIZE, TITLE_FONT_SIZE,
    TOTAL_COLUMN_OFFSET,
};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Page geometry used by the paginated renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLayout {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
    pub line_height: f32,
    pub indent_step: f32,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            width: PAGE_WIDTH,
            height: PAGE_HEIGHT,
            margin: PAGE_MARGIN,
            line_height: LINE_HEIGHT,
            indent_step: INDENT_STEP,
        }
    }
}

impl PageLayout {
    /// Lowest baseline a line may sit on.
    pub fn bottom(&self) -> f32 {
        self.height - self.margin
    }

    fn column(&self, offset_from_right: f32) -> f32 {
        self.width - self.margin - offset_from_right
    }

    fn indent(&self, depth: usize) -> f32 {
        self.margin + depth as f32 * self.indent_step
    }
}

/// Title block printed at the top of the first page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportHeader {
    pub title: String,
    /// Usually the date range the report covers
    pub subtitle: String,
}

/// A piece of text placed on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub bold: bool,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based page number
    pub number: usize,
    pub runs: Vec<TextRun>,
}

/// Finished layout, ready to be encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedDocument {
    pub width: f32,
    pub height: f32,
    pub pages: Vec<Page>,
}

impl PagedDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn runs(&self) -> impl Iterator<Item = &TextRun> {
        self.pages.iter().flat_map(|p| p.runs.iter())
    }
}

/// Report sink laying lines out onto pages.
pub struct PaginatedRenderer {
    layout: PageLayout,
    currency: String,
    finished: Vec<Page>,
    page: Page,
    cursor_y: f32,
}

impl PaginatedRenderer {
    pub fn new(layout: PageLayout, header: &ReportHeader, currency: &str) -> Self {
        let mut renderer = Self {
            layout,
            currency: currency.to_string(),
            finished: Vec::new(),
            page: Page {
                number: 1,
                runs: Vec::new(),
            },
            cursor_y: layout.margin,
        };
        renderer.draw_header(header);
        renderer
    }

    /// Hand over the laid-out pages. Call after the walk has finished.
    pub fn into_document(mut self) -> PagedDocument {
        if !self.page.runs.is_empty() || self.finished.is_empty() {
            self.finished.push(self.page);
        }
        PagedDocument {
            width: self.layout.width,
            height: self.layout.height,
            pages: self.finished,
        }
    }

    fn draw_header(&mut self, header: &ReportHeader) {
        let x = self.centered(&header.title, TITLE_FONT_SIZE);
        self.draw(x, TITLE_FONT_SIZE, true, header.title.clone());
        self.cursor_y += self.layout.line_height;

        let x = self.centered(&header.subtitle, SUBTITLE_FONT_SIZE);
        self.draw(x, SUBTITLE_FONT_SIZE, false, header.subtitle.clone());
        self.cursor_y += self.layout.line_height * 2.0;
    }

    fn centered(&self, text: &str, size: f32) -> f32 {
        let width = text.chars().count() as f32 * size * AVERAGE_GLYPH_WIDTH;
        ((self.layout.width - width) / 2.0).max(0.0)
    }

    /// Start a new page unless `lines` more lines fit above the bottom margin.
    fn ensure_room(&mut self, lines: f32) {
        if self.cursor_y + lines * self.layout.line_height <= self.layout.bottom() {
            return;
        }

        let next = Page {
            number: self.page.number + 1,
            runs: Vec::new(),
        };
        let done = std::mem::replace(&mut self.page, next);
        tracing::debug!("Page {} full, starting page {}", done.number, self.page.number);
        self.finished.push(done);
        self.cursor_y = self.layout.margin;
    }

    fn draw(&mut self, x: f32, size: f32, bold: bool, text: String) {
        self.page.runs.push(TextRun {
            x,
            y: self.cursor_y,
            size,
            bold,
            text,
        });
    }

    fn money(&self, amount: f64) -> String {
        format!("{}{}", self.currency, format_amount(amount))
    }
}

impl ReportSink for PaginatedRenderer {
    fn category_enter(&mut self, category: &CategorySummary) -> Result<()> {
        self.ensure_room(CATEGORY_HEADER_LINES);
        let x = self.layout.indent(category.depth);
        self.draw(x, CATEGORY_FONT_SIZE, true, category.name.clone());
        self.cursor_y += self.layout.line_height;
        Ok(())
    }

    fn items(&mut self, category: Option<&CategorySummary>, lines: &[ReportLine]) -> Result<()> {
        let depth = category.map(|c| c.depth + 1).unwrap_or(0);
        let x = self.layout.indent(depth);
        let price_x = self.layout.column(PRICE_COLUMN_OFFSET);
        let quantity_x = self.layout.column(QUANTITY_COLUMN_OFFSET);
        let total_x = self.layout.column(TOTAL_COLUMN_OFFSET);

        for line in lines {
            self.ensure_room(ITEM_LINES);
            self.draw(x, ITEM_FONT_SIZE, false, line.label.clone());
            self.draw(price_x, ITEM_FONT_SIZE, false, self.money(line.unit_price));
            self.draw(quantity_x, ITEM_FONT_SIZE, false, line.quantity.to_string());
            self.draw(total_x, ITEM_FONT_SIZE, false, self.money(line.total));
            self.cursor_y += self.layout.line_height;
        }
        Ok(())
    }

    fn category_total(&mut self, category: &CategorySummary) -> Result<()> {
        self.ensure_room(CATEGORY_TOTAL_LINES);
        let x = self.layout.indent(category.depth);
        self.draw(x, CATEGORY_TOTAL_FONT_SIZE, true, format!("Total {}", category.name));
        self.draw(
            self.layout.column(QUANTITY_COLUMN_OFFSET),
            CATEGORY_TOTAL_FONT_SIZE,
            true,
            category.count.to_string(),
        );
        self.draw(
            self.layout.column(TOTAL_COLUMN_OFFSET),
            CATEGORY_TOTAL_FONT_SIZE,
            true,
            self.money(category.total),
        );
        self.cursor_y += self.layout.line_height * CATEGORY_TOTAL_LINES;
        Ok(())
    }

    fn finish(&mut self, grand_total: f64) -> Result<()> {
        self.ensure_room(GRAND_TOTAL_LINES);
        self.cursor_y += self.layout.line_height;
        self.draw(self.layout.margin, GRAND_TOTAL_FONT_SIZE, true, "Sales Total".to_string());
        self.draw(
            self.layout.column(GRAND_TOTAL_COLUMN_OFFSET),
            GRAND_TOTAL_FONT_SIZE,
            true,
            self.money(grand_total),
        );
        Ok(())
    }
}
