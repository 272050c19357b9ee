//! Category arena
//!
//! Categories are held by id with a `parent_id` link instead of object
//! pointers. The children index is built once per load, ordered by name,
//! so the report walk never goes back to the store per node.

use crate::database::Category;
use std::collections::{HashMap, HashSet};

/// Every category of the catalog, hidden ones included.
#[derive(Debug, Clone, Default)]
pub struct CategoryTree {
    categories: HashMap<i64, Category>,
    /// `None` key holds the roots
    children: HashMap<Option<i64>, Vec<i64>>,
    /// Categories with a parent chain ending at a root
    reachable: HashSet<i64>,
}

impl CategoryTree {
    pub fn new(categories: Vec<Category>) -> Self {
        let categories: HashMap<i64, Category> =
            categories.into_iter().map(|c| (c.id, c)).collect();

        let mut children: HashMap<Option<i64>, Vec<i64>> = HashMap::new();
        for category in categories.values() {
            let parent = match category.parent_id {
                Some(parent_id) if categories.contains_key(&parent_id) => Some(parent_id),
                Some(parent_id) => {
                    tracing::warn!(
                        "Category {} references missing parent {}, treating it as a root",
                        category.id,
                        parent_id
                    );
                    None
                }
                None => None,
            };
            children.entry(parent).or_default().push(category.id);
        }

        for ids in children.values_mut() {
            ids.sort_by(|a, b| {
                let (a, b) = (&categories[a], &categories[b]);
                a.name.cmp(&b.name).then(a.id.cmp(&b.id))
            });
        }

        let mut reachable = HashSet::new();
        let mut stack: Vec<i64> = children.get(&None).cloned().unwrap_or_default();
        while let Some(id) = stack.pop() {
            if reachable.insert(id) {
                if let Some(kids) = children.get(&Some(id)) {
                    stack.extend(kids.iter().copied());
                }
            }
        }

        if reachable.len() < categories.len() {
            tracing::warn!(
                "{} categories are part of a parent cycle and cannot be reached from a root",
                categories.len() - reachable.len()
            );
        }

        Self {
            categories,
            children,
            reachable,
        }
    }

    pub fn get(&self, id: i64) -> Option<&Category> {
        self.categories.get(&id)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Children of `parent` (roots for `None`), sorted by name.
    pub fn children(&self, parent: Option<i64>) -> impl Iterator<Item = &Category> + '_ {
        self.children
            .get(&parent)
            .into_iter()
            .flatten()
            .filter_map(|id| self.categories.get(id))
    }

    /// Whether the category hangs off a root (false for ids caught in a cycle).
    pub fn is_reachable(&self, id: i64) -> bool {
        self.reachable.contains(&id)
    }

    /// The category itself followed by its ancestors, nearest first.
    ///
    /// Stops after visiting every category once, so a malformed chain
    /// cannot loop forever.
    pub fn ancestors(&self, id: i64) -> Vec<&Category> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(id);

        while let Some(current) = next {
            if !seen.insert(current) {
                tracing::warn!("Parent cycle detected while walking up from category {}", id);
                break;
            }
            match self.categories.get(&current) {
                Some(category) => {
                    chain.push(category);
                    next = category.parent_id;
                }
                None => break,
            }
        }

        chain
    }

    /// Ids of the category and all of its descendants, parents before children.
    pub fn subtree_ids(&self, id: i64) -> Vec<i64> {
        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            if !self.categories.contains_key(&current) || !seen.insert(current) {
                continue;
            }
            ids.push(current);
            if let Some(kids) = self.children.get(&Some(current)) {
                stack.extend(kids.iter().rev().copied());
            }
        }

        ids
    }

    /// Whether moving `category_id` under `new_parent` would close a loop.
    pub fn would_create_cycle(&self, category_id: i64, new_parent: i64) -> bool {
        category_id == new_parent
            || self
                .ancestors(new_parent)
                .iter()
                .any(|ancestor| ancestor.id == category_id)
    }

    /// A category already called `name` on the branch a category would
    /// occupy: the chain above `parent`, or the subtree below `category_id`.
    ///
    /// Snapshot rows refer to their parent by name, so a name repeated
    /// along one branch cannot be told apart when a report is replayed.
    pub fn branch_name_clash(&self, name: &str, parent: Option<i64>, category_id: Option<i64>) -> Option<&Category> {
        let above = parent.map(|id| self.ancestors(id)).unwrap_or_default();
        let below = category_id
            .map(|id| self.subtree_ids(id))
            .unwrap_or_default()
            .into_iter()
            .skip(1)
            .filter_map(|id| self.categories.get(&id));

        above.into_iter().chain(below).find(|c| c.name == name)
    }

    /// Name of the category's parent, if it has one in the arena.
    pub fn parent_name(&self, id: i64) -> Option<&str> {
        self.categories
            .get(&id)
            .and_then(|c| c.parent_id)
            .and_then(|parent_id| self.categories.get(&parent_id))
            .map(|parent| parent.name.as_str())
    }
}

#[cfg(test)]
pub(crate) fn category(id: i64, name: &str, price: Option<f64>, parent: Option<i64>) -> Category {
    Category {
        id,
        name: name.to_string(),
        default_price: price,
        parent_id: parent,
        visible: true,
    }
}
