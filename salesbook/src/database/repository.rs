//! Repository layer for database operations
//!
//! This module provides the store operations for every entity.
//! Multi-row updates (sale counters, cascades, resets) run in transactions.

use super::models::*;
use crate::config::UNTRACKED_STOCK;
use crate::error::{AppError, Result};
use crate::report::{resolve_category_price, CategoryTree};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

/// Grouped sale row as returned by SQLite
#[derive(FromRow)]
struct GroupedSaleRow {
    item_id: i64,
    item_name: String,
    category_id: Option<i64>,
    sold_price: f64,
    base_price: f64,
    quantity: i64,
}

/// Rows removed by a sales reset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetSummary {
    pub sales_removed: u64,
    pub items_purged: u64,
    pub categories_purged: u64,
}

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ===== Categories =====

    /// Create a new category
    ///
    /// The name may not repeat one of the new category's ancestors.
    pub async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category> {
        let tree = self.load_category_tree().await?;
        if let Some(parent_id) = req.parent_id {
            if tree.get(parent_id).is_none() {
                return Err(AppError::CategoryNotFound(parent_id));
            }
        }
        ensure_unique_on_branch(&tree, &req.name, req.parent_id, None)?;

        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, default_price, parent_id)
            VALUES (?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&req.name)
        .bind(req.default_price)
        .bind(req.parent_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created category: {}", category.id);
        Ok(category)
    }

    /// Get a category by ID, hidden or not
    pub async fn get_category(&self, id: i64) -> Result<Category> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::CategoryNotFound(id))
    }

    /// List the children of `parent_id` (roots for `None`), sorted by name
    pub async fn list_categories(&self, parent_id: Option<i64>, include_hidden: bool) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT * FROM categories
            WHERE parent_id IS ? AND (? OR visible = 1)
            ORDER BY name, id
            "#,
        )
        .bind(parent_id)
        .bind(include_hidden)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Load every category, hidden ones included, into an arena
    pub async fn load_category_tree(&self) -> Result<CategoryTree> {
        let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(CategoryTree::new(categories))
    }

    /// Effective price a category hands down to its items
    pub async fn get_category_price(&self, id: i64) -> Result<f64> {
        let tree = self.load_category_tree().await?;
        if tree.get(id).is_none() {
            return Err(AppError::CategoryNotFound(id));
        }
        Ok(resolve_category_price(&tree, id))
    }

    /// Update a category's name, price and parent
    ///
    /// Re-parenting under itself or one of its descendants is rejected, as
    /// is a name already used by an ancestor or a descendant.
    /// Items inheriting their price are repriced across the subtree.
    pub async fn update_category(&self, req: UpdateCategoryRequest) -> Result<Category> {
        let existing = self.get_category(req.id).await?;
        let tree = self.load_category_tree().await?;

        if let Some(parent_id) = req.parent_id {
            if tree.get(parent_id).is_none() {
                return Err(AppError::CategoryNotFound(parent_id));
            }
            if tree.would_create_cycle(req.id, parent_id) {
                return Err(AppError::CategoryCycle {
                    category_id: req.id,
                    parent_id,
                });
            }
        }
        ensure_unique_on_branch(&tree, &req.name, req.parent_id, Some(req.id))?;

        let category = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
            SET name = ?, default_price = ?, parent_id = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&req.name)
        .bind(req.default_price)
        .bind(req.parent_id)
        .bind(req.id)
        .fetch_one(&self.pool)
        .await?;

        if existing.default_price != category.default_price || existing.parent_id != category.parent_id {
            self.cascade_category_price(category.id).await?;
        }

        tracing::debug!("Updated category: {}", category.id);
        Ok(category)
    }

    /// Reprice every inheriting item in the category's subtree
    ///
    /// Descendants with their own price resolve to it, so their items are
    /// rewritten with an unchanged value.
    pub async fn cascade_category_price(&self, id: i64) -> Result<u64> {
        let tree = self.load_category_tree().await?;
        let mut tx = self.pool.begin().await?;
        let mut updated = 0;

        for category_id in tree.subtree_ids(id) {
            let price = resolve_category_price(&tree, category_id);
            updated += sqlx::query(
                "UPDATE items SET base_price = ? WHERE category_id = ? AND uses_category_price = 1",
            )
            .bind(price)
            .bind(category_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;

        tracing::debug!("Repriced {} items under category {}", updated, id);
        Ok(updated)
    }

    /// Soft-delete a category, its descendants and all of their items
    pub async fn delete_category(&self, id: i64) -> Result<()> {
        self.get_category(id).await?;
        let subtree = self.load_category_tree().await?.subtree_ids(id);

        let mut tx = self.pool.begin().await?;
        for category_id in &subtree {
            sqlx::query("UPDATE categories SET visible = 0 WHERE id = ?")
                .bind(category_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE items SET visible = 0 WHERE category_id = ?")
                .bind(category_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        tracing::debug!("Hid category {} and {} descendants", id, subtree.len().saturating_sub(1));
        Ok(())
    }

    /// Visible items anywhere in the category's subtree
    pub async fn count_visible_items(&self, id: i64) -> Result<i64> {
        let subtree = self.load_category_tree().await?.subtree_ids(id);
        let mut count = 0;

        for category_id in subtree {
            count += sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM items WHERE category_id = ? AND visible = 1",
            )
            .bind(category_id)
            .fetch_one(&self.pool)
            .await?;
        }

        Ok(count)
    }

    // ===== Items =====

    /// Create a new item
    pub async fn create_item(&self, req: CreateItemRequest) -> Result<Item> {
        let base_price = self
            .effective_base_price(req.category_id, req.uses_category_price, req.base_price.unwrap_or(0.0))
            .await?;

        let item = sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (name, base_price, current_stock, uses_category_price, category_id)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&req.name)
        .bind(base_price)
        .bind(req.current_stock.unwrap_or(UNTRACKED_STOCK))
        .bind(req.uses_category_price)
        .bind(req.category_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created item: {}", item.id);
        Ok(item)
    }

    /// Get an item by ID, hidden or not
    pub async fn get_item(&self, id: i64) -> Result<Item> {
        sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::ItemNotFound(id))
    }

    /// List the items filed directly under a category (uncategorized for `None`)
    pub async fn list_items(&self, category_id: Option<i64>, include_hidden: bool) -> Result<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT * FROM items
            WHERE category_id IS ? AND (? OR visible = 1)
            ORDER BY name, id
            "#,
        )
        .bind(category_id)
        .bind(include_hidden)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Update an item
    pub async fn update_item(&self, req: UpdateItemRequest) -> Result<Item> {
        let existing = self.get_item(req.id).await?;
        let base_price = self
            .effective_base_price(
                req.category_id,
                req.uses_category_price,
                req.base_price.unwrap_or(existing.base_price),
            )
            .await?;

        let item = sqlx::query_as::<_, Item>(
            r#"
            UPDATE items
            SET name = ?, base_price = ?, current_stock = ?, uses_category_price = ?, category_id = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&req.name)
        .bind(base_price)
        .bind(req.current_stock.unwrap_or(UNTRACKED_STOCK))
        .bind(req.uses_category_price)
        .bind(req.category_id)
        .bind(req.id)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Updated item: {}", item.id);
        Ok(item)
    }

    /// Soft-delete an item; its sales keep counting in reports
    pub async fn delete_item(&self, id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE items SET visible = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ItemNotFound(id));
        }

        tracing::debug!("Hid item: {}", id);
        Ok(())
    }

    async fn effective_base_price(
        &self,
        category_id: Option<i64>,
        uses_category_price: bool,
        explicit: f64,
    ) -> Result<f64> {
        match category_id {
            Some(category_id) if uses_category_price => self.get_category_price(category_id).await,
            Some(category_id) => {
                self.get_category(category_id).await?;
                Ok(explicit)
            }
            None => Ok(explicit),
        }
    }

    // ===== Sales =====

    /// Record one sale of an item in the current batch
    pub async fn record_sale(&self, item_id: i64, sold_price: f64) -> Result<Sale> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE items
            SET total_sold = total_sold + 1,
                current_stock = CASE WHEN current_stock > 0 THEN current_stock - 1 ELSE current_stock END
            WHERE id = ?
            "#,
        )
        .bind(item_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::ItemNotFound(item_id));
        }

        let batch_id = current_batch_id_in(&mut tx).await?;
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            INSERT INTO sales (item_id, sold_price, sold_at, batch_id)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(item_id)
        .bind(sold_price)
        .bind(Utc::now())
        .bind(batch_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!("Recorded sale {} of item {} in batch {}", sale.id, item_id, batch_id);
        Ok(sale)
    }

    /// Get a sale by ID
    pub async fn get_sale(&self, id: i64) -> Result<Sale> {
        sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::SaleNotFound(id))
    }

    /// Correct the price a sale was recorded at
    pub async fn update_sale_price(&self, id: i64, sold_price: f64) -> Result<Sale> {
        let sale = sqlx::query_as::<_, Sale>("UPDATE sales SET sold_price = ? WHERE id = ? RETURNING *")
            .bind(sold_price)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::SaleNotFound(id))?;

        tracing::debug!("Corrected price of sale {}", id);
        Ok(sale)
    }

    /// Delete a sale and undo its effect on the item's counters
    pub async fn delete_sale(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let item_id = sqlx::query_scalar::<_, i64>("DELETE FROM sales WHERE id = ? RETURNING item_id")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::SaleNotFound(id))?;

        sqlx::query(
            r#"
            UPDATE items
            SET total_sold = MAX(total_sold - 1, 0),
                current_stock = CASE WHEN current_stock >= 0 THEN current_stock + 1 ELSE current_stock END
            WHERE id = ?
            "#,
        )
        .bind(item_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!("Deleted sale {} of item {}", id, item_id);
        Ok(())
    }

    /// Every sale with its item name, newest first
    pub async fn list_sale_history(&self) -> Result<Vec<SaleHistoryEntry>> {
        let entries = sqlx::query_as::<_, SaleHistoryEntry>(
            r#"
            SELECT s.id, s.item_id, i.name AS item_name, s.sold_price, s.sold_at, s.batch_id
            FROM sales s
            JOIN items i ON i.id = s.item_id
            ORDER BY s.sold_at DESC, s.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Sales of `batch_id` (every batch for `None`) grouped by item and price
    ///
    /// Ordered by item name, then price, so reports are reproducible.
    pub async fn get_sales_grouped(&self, batch_id: Option<i64>) -> Result<Vec<SaleGroup>> {
        let rows = sqlx::query_as::<_, GroupedSaleRow>(
            r#"
            SELECT s.item_id, i.name AS item_name, i.category_id, s.sold_price, i.base_price,
                   COUNT(*) AS quantity
            FROM sales s
            JOIN items i ON i.id = s.item_id
            WHERE ? IS NULL OR s.batch_id = ?
            GROUP BY s.item_id, s.sold_price
            ORDER BY i.name, s.sold_price, s.item_id
            "#,
        )
        .bind(batch_id)
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                SaleGroup::new(
                    row.item_id,
                    row.item_name,
                    row.category_id,
                    row.sold_price,
                    row.base_price,
                    row.quantity,
                )
            })
            .collect())
    }

    /// Number of sales in `batch_id` (every batch for `None`)
    pub async fn count_sales(&self, batch_id: Option<i64>) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sales WHERE ? IS NULL OR batch_id = ?")
            .bind(batch_id)
            .bind(batch_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Delete every sale, restore tracked stock, then purge hidden rows
    /// that nothing refers to any more
    pub async fn reset_all_sales(&self) -> Result<ResetSummary> {
        let mut tx = self.pool.begin().await?;

        let sales_removed = sqlx::query("DELETE FROM sales")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query(
            r#"
            UPDATE items
            SET current_stock = CASE WHEN current_stock >= 0 THEN current_stock + total_sold ELSE current_stock END,
                total_sold = 0
            "#,
        )
        .execute(&mut *tx)
        .await?;

        let items_purged = sqlx::query(
            "DELETE FROM items WHERE visible = 0 AND id NOT IN (SELECT item_id FROM sales)",
        )
        .execute(&mut *tx)
        .await?
        .rows_affected();

        // Leaves first: a hidden parent becomes deletable once its children are gone.
        let mut categories_purged = 0;
        loop {
            let removed = sqlx::query(
                r#"
                DELETE FROM categories
                WHERE visible = 0
                  AND id NOT IN (SELECT category_id FROM items WHERE category_id IS NOT NULL)
                  AND id NOT IN (SELECT parent_id FROM categories WHERE parent_id IS NOT NULL)
                "#,
            )
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if removed == 0 {
                break;
            }
            categories_purged += removed;
        }

        tx.commit().await?;

        let summary = ResetSummary {
            sales_removed,
            items_purged,
            categories_purged,
        };
        tracing::info!("Reset sales: {:?}", summary);
        Ok(summary)
    }

    // ===== Batches =====

    /// The current batch, which is always the one with the highest id
    pub async fn current_batch(&self) -> Result<SaleBatch> {
        let mut tx = self.pool.begin().await?;
        let id = current_batch_id_in(&mut tx).await?;
        let batch = sqlx::query_as::<_, SaleBatch>("SELECT * FROM sale_batches WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(batch)
    }

    pub async fn current_batch_id(&self) -> Result<i64> {
        Ok(self.current_batch().await?.id)
    }

    pub async fn current_batch_name(&self) -> Result<String> {
        Ok(self.current_batch().await?.name)
    }

    /// Start a new batch named after its position in the sequence
    pub async fn create_new_batch(&self) -> Result<SaleBatch> {
        let mut tx = self.pool.begin().await?;

        let last: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) FROM sale_batches")
            .fetch_one(&mut *tx)
            .await?;
        let batch = sqlx::query_as::<_, SaleBatch>("INSERT INTO sale_batches (name) VALUES (?) RETURNING *")
            .bind(format!("Batch {}", last + 1))
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!("Started new sale batch {} ({})", batch.id, batch.name);
        Ok(batch)
    }

    /// Stamp the time a batch was exported
    pub async fn update_batch_export_time(&self, batch_id: i64) -> Result<()> {
        sqlx::query("UPDATE sale_batches SET export_time = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(batch_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn list_batches(&self) -> Result<Vec<SaleBatch>> {
        let batches = sqlx::query_as::<_, SaleBatch>("SELECT * FROM sale_batches ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(batches)
    }

    /// Days covered by the sales of `batch_id` (every batch for `None`)
    ///
    /// `YYYY-MM-DD` for a single day, `YYYY-MM-DD to YYYY-MM-DD` otherwise,
    /// empty when there are no sales.
    pub async fn get_export_date_range(&self, batch_id: Option<i64>) -> Result<String> {
        let first = self.sale_time_bound(batch_id, "ASC").await?;
        let last = self.sale_time_bound(batch_id, "DESC").await?;

        Ok(match (first, last) {
            (Some(first), Some(last)) => format_date_range(first, last),
            _ => String::new(),
        })
    }

    async fn sale_time_bound(&self, batch_id: Option<i64>, order: &str) -> Result<Option<DateTime<Utc>>> {
        let sql = format!(
            "SELECT sold_at FROM sales WHERE ? IS NULL OR batch_id = ? ORDER BY sold_at {} LIMIT 1",
            order
        );
        let bound = sqlx::query_scalar::<_, DateTime<Utc>>(&sql)
            .bind(batch_id)
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(bound)
    }

    // ===== Export records =====

    /// Store the record of a completed export
    pub async fn save_export_record(&self, record: NewExportRecord) -> Result<ExportRecord> {
        let id = Uuid::new_v4().to_string();

        let saved = sqlx::query_as::<_, ExportRecord>(
            r#"
            INSERT INTO export_records
                (id, filename, filepath, exported_at, batch_id, format, is_full_export,
                 display_name, date_range, snapshot_checksum)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&record.filename)
        .bind(&record.filepath)
        .bind(Utc::now())
        .bind(record.batch_id)
        .bind(record.format.as_str())
        .bind(record.is_full_export)
        .bind(&record.display_name)
        .bind(&record.date_range)
        .bind(&record.snapshot_checksum)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Saved export record: {}", id);
        Ok(saved)
    }

    /// Export records, newest first
    pub async fn list_export_records(&self) -> Result<Vec<ExportRecord>> {
        let records = sqlx::query_as::<_, ExportRecord>(
            "SELECT * FROM export_records ORDER BY exported_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    pub async fn get_export_record(&self, id: &str) -> Result<ExportRecord> {
        sqlx::query_as::<_, ExportRecord>("SELECT * FROM export_records WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::ExportNotFound(id.to_string()))
    }

    pub async fn delete_export_record(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM export_records WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ExportNotFound(id.to_string()));
        }

        tracing::debug!("Deleted export record: {}", id);
        Ok(())
    }
}

/// Highest batch id, creating the first batch if none exists.
async fn current_batch_id_in(tx: &mut Transaction<'_, Sqlite>) -> Result<i64> {
    let current = sqlx::query_scalar::<_, i64>("SELECT id FROM sale_batches ORDER BY id DESC LIMIT 1")
        .fetch_optional(&mut **tx)
        .await?;

    match current {
        Some(id) => Ok(id),
        None => {
            tracing::warn!("No sale batch found, creating Batch 1");
            let id = sqlx::query_scalar::<_, i64>("INSERT INTO sale_batches (name) VALUES ('Batch 1') RETURNING id")
                .fetch_one(&mut **tx)
                .await?;
            Ok(id)
        }
    }
}

fn ensure_unique_on_branch(tree: &CategoryTree, name: &str, parent: Option<i64>, id: Option<i64>) -> Result<()> {
    match tree.branch_name_clash(name, parent, id) {
        Some(clash) => Err(AppError::Validation(format!(
            "Category name '{}' is already used by category {} on the same branch",
            name, clash.id
        ))),
        None => Ok(()),
    }
}

fn format_date_range(first: DateTime<Utc>, last: DateTime<Utc>) -> String {
    let first = first.format("%Y-%m-%d").to_string();
    let last = last.format("%Y-%m-%d").to_string();
    if first == last {
        first
    } else {
        format!("{} to {}", first, last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::initialize_database;
    use chrono::TimeZone;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_repo() -> Repository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        Repository::new(pool)
    }

    async fn add_category(repo: &Repository, name: &str, price: Option<f64>, parent: Option<i64>) -> Category {
        repo.create_category(CreateCategoryRequest {
            name: name.to_string(),
            default_price: price,
            parent_id: parent,
        })
        .await
        .unwrap()
    }

    async fn add_item(repo: &Repository, name: &str, category: Option<i64>, inherit: bool, stock: Option<i64>) -> Item {
        repo.create_item(CreateItemRequest {
            name: name.to_string(),
            base_price: Some(1.0),
            current_stock: stock,
            category_id: category,
            uses_category_price: inherit,
        })
        .await
        .unwrap()
    }

    fn update_of(category: &Category) -> UpdateCategoryRequest {
        UpdateCategoryRequest {
            id: category.id,
            name: category.name.clone(),
            default_price: category.default_price,
            parent_id: category.parent_id,
        }
    }

    #[tokio::test]
    async fn test_categories_sorted_and_filtered() {
        let repo = create_test_repo().await;
        let merch = add_category(&repo, "Merch", None, None).await;
        add_category(&repo, "Books", None, None).await;
        let zines = add_category(&repo, "Zines", None, Some(merch.id)).await;
        add_category(&repo, "Badges", None, Some(merch.id)).await;
        repo.delete_category(zines.id).await.unwrap();

        let roots: Vec<String> = repo
            .list_categories(None, false)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(roots, vec!["Books", "Merch"]);

        assert_eq!(repo.list_categories(Some(merch.id), false).await.unwrap().len(), 1);
        assert_eq!(repo.list_categories(Some(merch.id), true).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_category_with_missing_parent() {
        let repo = create_test_repo().await;
        let err = repo
            .create_category(CreateCategoryRequest {
                name: "Orphan".to_string(),
                default_price: None,
                parent_id: Some(42),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CategoryNotFound(42)));
    }

    #[tokio::test]
    async fn test_category_name_unique_on_branch() {
        let repo = create_test_repo().await;
        let misc = add_category(&repo, "Misc", None, None).await;
        let extras = add_category(&repo, "Extras", None, Some(misc.id)).await;

        let nested = repo
            .create_category(CreateCategoryRequest {
                name: "Misc".to_string(),
                default_price: None,
                parent_id: Some(extras.id),
            })
            .await;
        assert!(matches!(nested, Err(AppError::Validation(_))));

        // Renaming to a descendant's name is just as ambiguous
        let renamed = repo
            .update_category(UpdateCategoryRequest {
                name: "Extras".to_string(),
                ..update_of(&misc)
            })
            .await;
        assert!(matches!(renamed, Err(AppError::Validation(_))));

        // Moving a "Misc" under the other one
        let other = add_category(&repo, "Misc", None, None).await;
        let moved = repo
            .update_category(UpdateCategoryRequest {
                parent_id: Some(extras.id),
                ..update_of(&other)
            })
            .await;
        assert!(matches!(moved, Err(AppError::Validation(_))));

        // Siblings and cousins may share a name; keeping its own name is fine
        add_category(&repo, "Extras", None, None).await;
        repo.update_category(update_of(&extras)).await.unwrap();
    }

    #[tokio::test]
    async fn test_item_inherits_category_price() {
        let repo = create_test_repo().await;
        let a = add_category(&repo, "A", Some(10.0), None).await;
        let b = add_category(&repo, "B", None, Some(a.id)).await;
        let c = add_category(&repo, "C", None, Some(b.id)).await;

        assert_eq!(repo.get_category_price(c.id).await.unwrap(), 10.0);

        let item = add_item(&repo, "Poster", Some(c.id), true, None).await;
        assert_eq!(item.base_price, 10.0);
        assert_eq!(item.current_stock, UNTRACKED_STOCK);
    }

    #[tokio::test]
    async fn test_price_change_cascades_to_inheriting_items() {
        let repo = create_test_repo().await;
        let a = add_category(&repo, "A", Some(10.0), None).await;
        let b = add_category(&repo, "B", None, Some(a.id)).await;
        let own = add_category(&repo, "Own", Some(3.0), Some(a.id)).await;

        let inherits = add_item(&repo, "Inherits", Some(b.id), true, None).await;
        let fixed = add_item(&repo, "Fixed", Some(b.id), false, None).await;
        let own_priced = add_item(&repo, "Own priced", Some(own.id), true, None).await;

        let mut req = update_of(&a);
        req.default_price = Some(12.0);
        repo.update_category(req).await.unwrap();

        assert_eq!(repo.get_item(inherits.id).await.unwrap().base_price, 12.0);
        assert_eq!(repo.get_item(fixed.id).await.unwrap().base_price, 1.0);
        assert_eq!(repo.get_item(own_priced.id).await.unwrap().base_price, 3.0);
    }

    #[tokio::test]
    async fn test_reparent_rejects_cycles() {
        let repo = create_test_repo().await;
        let a = add_category(&repo, "A", None, None).await;
        let b = add_category(&repo, "B", None, Some(a.id)).await;
        let c = add_category(&repo, "C", None, Some(b.id)).await;

        let mut req = update_of(&a);
        req.parent_id = Some(c.id);
        assert!(matches!(
            repo.update_category(req).await,
            Err(AppError::CategoryCycle { .. })
        ));

        let mut req = update_of(&b);
        req.parent_id = Some(b.id);
        assert!(matches!(
            repo.update_category(req).await,
            Err(AppError::CategoryCycle { .. })
        ));

        // Moving a leaf to another branch is fine.
        let mut req = update_of(&c);
        req.parent_id = Some(a.id);
        assert_eq!(repo.update_category(req).await.unwrap().parent_id, Some(a.id));
    }

    #[tokio::test]
    async fn test_soft_delete_cascades() {
        let repo = create_test_repo().await;
        let merch = add_category(&repo, "Merch", None, None).await;
        let badges = add_category(&repo, "Badges", None, Some(merch.id)).await;
        let pin = add_item(&repo, "Pin", Some(badges.id), false, None).await;
        add_item(&repo, "Mug", Some(merch.id), false, None).await;

        assert_eq!(repo.count_visible_items(merch.id).await.unwrap(), 2);
        repo.record_sale(pin.id, 1.0).await.unwrap();

        repo.delete_category(merch.id).await.unwrap();

        assert!(!repo.get_category(badges.id).await.unwrap().visible);
        assert!(!repo.get_item(pin.id).await.unwrap().visible);
        assert_eq!(repo.count_visible_items(merch.id).await.unwrap(), 0);
        // Rows and sales are kept.
        assert_eq!(repo.get_sales_grouped(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sale_counters_round_trip() {
        let repo = create_test_repo().await;
        let tracked = add_item(&repo, "Tracked", None, false, Some(2)).await;
        let untracked = add_item(&repo, "Untracked", None, false, None).await;

        let sale = repo.record_sale(tracked.id, 1.0).await.unwrap();
        repo.record_sale(untracked.id, 1.0).await.unwrap();

        let item = repo.get_item(tracked.id).await.unwrap();
        assert_eq!((item.total_sold, item.current_stock), (1, 1));
        let item = repo.get_item(untracked.id).await.unwrap();
        assert_eq!((item.total_sold, item.current_stock), (1, UNTRACKED_STOCK));

        repo.delete_sale(sale.id).await.unwrap();
        let item = repo.get_item(tracked.id).await.unwrap();
        assert_eq!((item.total_sold, item.current_stock), (0, 2));

        assert!(matches!(repo.delete_sale(sale.id).await, Err(AppError::SaleNotFound(_))));
        assert!(matches!(repo.record_sale(999, 1.0).await, Err(AppError::ItemNotFound(999))));
    }

    #[tokio::test]
    async fn test_stock_never_goes_negative() {
        let repo = create_test_repo().await;
        let item = add_item(&repo, "Last one", None, false, Some(1)).await;

        repo.record_sale(item.id, 1.0).await.unwrap();
        repo.record_sale(item.id, 1.0).await.unwrap();

        let item = repo.get_item(item.id).await.unwrap();
        assert_eq!((item.total_sold, item.current_stock), (2, 0));
    }

    #[tokio::test]
    async fn test_grouping_by_item_and_price() {
        let repo = create_test_repo().await;
        let merch = add_category(&repo, "Merch", Some(5.0), None).await;
        let badges = add_category(&repo, "Badges", None, Some(merch.id)).await;
        let pin = add_item(&repo, "Pin", Some(badges.id), true, None).await;
        let apple = add_item(&repo, "Apple", None, false, None).await;

        for _ in 0..3 {
            repo.record_sale(pin.id, 5.0).await.unwrap();
        }
        let discounted = repo.record_sale(pin.id, 5.0).await.unwrap();
        repo.update_sale_price(discounted.id, 2.5).await.unwrap();
        repo.record_sale(pin.id, 2.5).await.unwrap();
        repo.record_sale(apple.id, 1.0).await.unwrap();

        let groups = repo.get_sales_grouped(None).await.unwrap();
        let summary: Vec<(&str, f64, i64, f64)> = groups
            .iter()
            .map(|g| (g.item_name.as_str(), g.sold_price, g.quantity, g.total))
            .collect();
        assert_eq!(
            summary,
            vec![("Apple", 1.0, 1, 1.0), ("Pin", 2.5, 2, 5.0), ("Pin", 5.0, 3, 15.0)]
        );
        assert_eq!(groups[1].base_price, 5.0);
        assert_eq!(groups[1].category_id, Some(badges.id));
    }

    #[tokio::test]
    async fn test_batches_scope_grouping() {
        let repo = create_test_repo().await;
        let item = add_item(&repo, "Pin", None, false, None).await;

        let first = repo.current_batch().await.unwrap();
        assert_eq!(first.name, "Batch 1");
        repo.record_sale(item.id, 1.0).await.unwrap();

        let second = repo.create_new_batch().await.unwrap();
        assert_eq!(second.name, "Batch 2");
        assert_eq!(repo.current_batch_id().await.unwrap(), second.id);
        repo.record_sale(item.id, 1.0).await.unwrap();
        repo.record_sale(item.id, 1.0).await.unwrap();

        assert_eq!(repo.count_sales(Some(first.id)).await.unwrap(), 1);
        assert_eq!(repo.count_sales(Some(second.id)).await.unwrap(), 2);
        assert_eq!(repo.count_sales(None).await.unwrap(), 3);
        assert_eq!(repo.get_sales_grouped(Some(second.id)).await.unwrap()[0].quantity, 2);

        repo.update_batch_export_time(first.id).await.unwrap();
        let batches = repo.list_batches().await.unwrap();
        assert!(batches[0].export_time.is_some());
        assert!(batches[1].export_time.is_none());
    }

    #[tokio::test]
    async fn test_date_range() {
        let repo = create_test_repo().await;
        assert_eq!(repo.get_export_date_range(None).await.unwrap(), "");

        let item = add_item(&repo, "Pin", None, false, None).await;
        let sale = repo.record_sale(item.id, 1.0).await.unwrap();
        let today = sale.sold_at.format("%Y-%m-%d").to_string();
        assert_eq!(repo.get_export_date_range(None).await.unwrap(), today);

        let earlier = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        sqlx::query("UPDATE sales SET sold_at = ? WHERE id = ?")
            .bind(earlier)
            .bind(sale.id)
            .execute(&repo.pool)
            .await
            .unwrap();
        repo.record_sale(item.id, 1.0).await.unwrap();

        assert_eq!(
            repo.get_export_date_range(None).await.unwrap(),
            format!("2024-05-01 to {}", today)
        );
    }

    #[tokio::test]
    async fn test_reset_restores_stock_and_purges_hidden() {
        let repo = create_test_repo().await;
        let merch = add_category(&repo, "Merch", None, None).await;
        let retired = add_category(&repo, "Retired", None, Some(merch.id)).await;
        let old = add_category(&repo, "Old", None, Some(retired.id)).await;
        let tracked = add_item(&repo, "Tracked", Some(merch.id), false, Some(5)).await;
        let gone = add_item(&repo, "Gone", Some(old.id), false, None).await;

        repo.record_sale(tracked.id, 1.0).await.unwrap();
        repo.record_sale(tracked.id, 1.0).await.unwrap();
        repo.record_sale(gone.id, 1.0).await.unwrap();
        repo.delete_category(retired.id).await.unwrap();

        let summary = repo.reset_all_sales().await.unwrap();
        assert_eq!(
            summary,
            ResetSummary {
                sales_removed: 3,
                items_purged: 1,
                categories_purged: 2,
            }
        );

        let item = repo.get_item(tracked.id).await.unwrap();
        assert_eq!((item.total_sold, item.current_stock), (0, 5));
        assert!(matches!(repo.get_item(gone.id).await, Err(AppError::ItemNotFound(_))));
        assert!(repo.get_category(merch.id).await.is_ok());
        assert!(repo.list_sale_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sale_history_newest_first() {
        let repo = create_test_repo().await;
        let item = add_item(&repo, "Pin", None, false, None).await;
        let first = repo.record_sale(item.id, 1.0).await.unwrap();
        let second = repo.record_sale(item.id, 2.0).await.unwrap();

        let history = repo.list_sale_history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);
        assert_eq!(history[0].item_name, "Pin");
    }

    #[tokio::test]
    async fn test_export_records() {
        let repo = create_test_repo().await;
        let record = NewExportRecord {
            filename: "export_20240501_120000.pdf".to_string(),
            filepath: "/tmp/exports/export_20240501_120000.pdf".to_string(),
            batch_id: Some(1),
            format: ExportFormat::Pdf,
            is_full_export: false,
            display_name: "Batch 1".to_string(),
            date_range: "2024-05-01".to_string(),
            snapshot_checksum: "abc".to_string(),
        };

        let saved = repo.save_export_record(record).await.unwrap();
        assert_eq!(saved.format, ExportFormat::Pdf);

        let fetched = repo.get_export_record(&saved.id).await.unwrap();
        assert_eq!(fetched.display_name, "Batch 1");
        assert_eq!(repo.list_export_records().await.unwrap().len(), 1);

        repo.delete_export_record(&saved.id).await.unwrap();
        assert!(matches!(
            repo.get_export_record(&saved.id).await,
            Err(AppError::ExportNotFound(_))
        ));
    }
}
