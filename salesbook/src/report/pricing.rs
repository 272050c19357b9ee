//! Effective category price resolution

use super::tree::CategoryTree;

/// Price used when no category in the chain defines one
pub const NO_PRICE: f64 = 0.0;

/// Resolve the price a category hands down to its items.
///
/// Walks from `category_id` up the parent chain and returns the first
/// `default_price` found, the starting category included.
pub fn resolve_category_price(tree: &CategoryTree, category_id: i64) -> f64 {
    tree.ancestors(category_id)
        .into_iter()
        .find_map(|category| category.default_price)
        .unwrap_or(NO_PRICE)
}
