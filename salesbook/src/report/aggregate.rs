//! Sale aggregation over the category tree
//!
//! Sale groups arrive from the store already bucketed by `(item, price)`
//! and ordered by item name then price. This module files them under
//! their category and computes subtree totals and counts.

use super::money::{from_cents, sum_amounts, to_cents};
use super::tree::CategoryTree;
use crate::database::SaleGroup;
use std::collections::{HashMap, HashSet};

/// Sale groups filed by category id; `None` holds uncategorized sales.
#[derive(Debug, Clone, Default)]
pub struct GroupsByCategory {
    groups: HashMap<Option<i64>, Vec<SaleGroup>>,
    grand_total: f64,
}

impl GroupsByCategory {
    /// File `groups` under their categories, keeping their order.
    ///
    /// Groups whose category is missing or unreachable from a root are
    /// filed as uncategorized so they still count towards the report.
    pub fn organize(groups: Vec<SaleGroup>, tree: &CategoryTree) -> Self {
        let mut map: HashMap<Option<i64>, Vec<SaleGroup>> = HashMap::new();
        let grand_total = sum_amounts(groups.iter().map(|g| g.total));

        for group in groups {
            let key = match group.category_id {
                Some(id) if tree.is_reachable(id) => Some(id),
                Some(id) => {
                    tracing::warn!(
                        "Sales of item {} reference category {} which is not in the tree; reporting them as uncategorized",
                        group.item_id,
                        id
                    );
                    None
                }
                None => None,
            };
            map.entry(key).or_default().push(group);
        }

        Self {
            groups: map,
            grand_total,
        }
    }

    /// Groups filed directly under `category` (not its descendants).
    pub fn direct(&self, category: Option<i64>) -> &[SaleGroup] {
        self.groups
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Sum of every group's total in store order, independent of the tree.
    pub fn grand_total(&self) -> f64 {
        self.grand_total
    }

    /// Sum of the root subtrees plus uncategorized sales.
    pub fn tree_total(&self, tree: &CategoryTree) -> f64 {
        let roots = tree.children(None).map(|c| subtree_total(c.id, tree, self));
        let loose = self.direct(None).iter().map(|g| g.total);
        sum_amounts(roots.chain(loose))
    }

    /// Sum of every group's quantity.
    pub fn total_quantity(&self) -> i64 {
        self.groups.values().flatten().map(|g| g.quantity).sum()
    }
}

/// Total value sold in a category and all of its descendants.
pub fn subtree_total(category_id: i64, tree: &CategoryTree, groups: &GroupsByCategory) -> f64 {
    from_cents(fold_subtree(category_id, tree, groups, &mut HashSet::new(), 0, &|g| to_cents(g.total)))
}

/// Number of units sold in a category and all of its descendants.
pub fn subtree_count(category_id: i64, tree: &CategoryTree, groups: &GroupsByCategory) -> i64 {
    fold_subtree(category_id, tree, groups, &mut HashSet::new(), 0, &|g| g.quantity)
}

/// Own groups first, then each child subtree in name order.
fn fold_subtree<T>(
    category_id: i64,
    tree: &CategoryTree,
    groups: &GroupsByCategory,
    visited: &mut HashSet<i64>,
    zero: T,
    value: &dyn Fn(&SaleGroup) -> T,
) -> T
where
    T: Copy + std::ops::Add<Output = T>,
{
    if !visited.insert(category_id) {
        return zero;
    }

    let mut acc = zero;
    for group in groups.direct(Some(category_id)) {
        acc = acc + value(group);
    }
    for child in tree.children(Some(category_id)) {
        acc = acc + fold_subtree(child.id, tree, groups, visited, zero, value);
    }
    acc
}
