//! Shared report walk
//!
//! One pre-order walk of the category tree drives every output format.
//! The walk decides *what* the report says (ordering, labels, totals) and
//! hands it to a [`ReportSink`], which decides how it is laid out.
//!
//! For each child category, alphabetically:
//! 1. `category_enter`
//! 2. recurse into subcategories
//! 3. `items` with the category's own sale lines
//! 4. `category_total`
//!
//! Uncategorized lines follow the tree with no enclosing category and no
//! total row, and `finish` receives the grand total.

use super::aggregate::{subtree_count, subtree_total, GroupsByCategory};
use super::indicator::labelled_name;
use super::tree::CategoryTree;
use crate::database::SaleGroup;
use crate::error::Result;

/// A category as seen by a sink, with its subtree figures.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySummary {
    pub name: String,
    /// `None` for top-level categories
    pub parent_name: Option<String>,
    /// Nesting level, 0 for top-level categories
    pub depth: usize,
    pub total: f64,
    pub count: i64,
}

/// One priced line of the report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLine {
    /// Item name with its price label appended
    pub label: String,
    pub unit_price: f64,
    pub quantity: i64,
    pub total: f64,
}

impl ReportLine {
    pub fn from_group(group: &SaleGroup) -> Self {
        Self {
            label: labelled_name(&group.item_name, group.sold_price, group.base_price),
            unit_price: group.sold_price,
            quantity: group.quantity,
            total: group.total,
        }
    }
}

/// Receives the walk's events in order.
pub trait ReportSink {
    fn category_enter(&mut self, category: &CategorySummary) -> Result<()>;

    /// Lines filed directly under `category`; `None` for uncategorized sales.
    /// Called for every category, possibly with no lines.
    fn items(&mut self, category: Option<&CategorySummary>, lines: &[ReportLine]) -> Result<()>;

    fn category_total(&mut self, category: &CategorySummary) -> Result<()>;

    /// Called once after the last event.
    fn finish(&mut self, _grand_total: f64) -> Result<()> {
        Ok(())
    }
}

/// Walk the whole catalog, reporting `groups` into `sink`.
pub fn traverse(tree: &CategoryTree, groups: &GroupsByCategory, sink: &mut dyn ReportSink) -> Result<()> {
    walk_children(tree, groups, None, 0, sink)?;

    let uncategorized = lines_of(groups.direct(None));
    if !uncategorized.is_empty() {
        sink.items(None, &uncategorized)?;
    }

    sink.finish(groups.grand_total())
}

fn walk_children(
    tree: &CategoryTree,
    groups: &GroupsByCategory,
    parent: Option<i64>,
    depth: usize,
    sink: &mut dyn ReportSink,
) -> Result<()> {
    for category in tree.children(parent) {
        let summary = CategorySummary {
            name: category.name.clone(),
            parent_name: parent.and_then(|id| tree.get(id)).map(|p| p.name.clone()),
            depth,
            total: subtree_total(category.id, tree, groups),
            count: subtree_count(category.id, tree, groups),
        };

        sink.category_enter(&summary)?;
        walk_children(tree, groups, Some(category.id), depth + 1, sink)?;
        sink.items(Some(&summary), &lines_of(groups.direct(Some(category.id))))?;
        sink.category_total(&summary)?;
    }

    Ok(())
}

fn lines_of(groups: &[SaleGroup]) -> Vec<ReportLine> {
    groups.iter().map(ReportLine::from_group).collect()
}

/// Sink that records every event, for inspecting walk order.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    pub events: Vec<String>,
}

#[cfg(test)]
impl ReportSink for RecordingSink {
    fn category_enter(&mut self, category: &CategorySummary) -> Result<()> {
        self.events.push(format!("enter {}", category.name));
        Ok(())
    }

    fn items(&mut self, category: Option<&CategorySummary>, lines: &[ReportLine]) -> Result<()> {
        let owner = category.map(|c| c.name.as_str()).unwrap_or("-");
        let labels: Vec<&str> = lines.iter().map(|l| l.label.as_str()).collect();
        self.events.push(format!("items {} [{}]", owner, labels.join(", ")));
        Ok(())
    }

    fn category_total(&mut self, category: &CategorySummary) -> Result<()> {
        self.events.push(format!(
            "total {} {} {:.2}",
            category.name, category.count, category.total
        ));
        Ok(())
    }

    fn finish(&mut self, grand_total: f64) -> Result<()> {
        self.events.push(format!("finish {:.2}", grand_total));
        Ok(())
    }
}
