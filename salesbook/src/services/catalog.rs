//! Catalog service
//!
//! Category and item editing on top of the repository, with input
//! validation and lifecycle logging.

use crate::database::{
    Category, CreateCategoryRequest, CreateItemRequest, Item, Repository, UpdateCategoryRequest,
    UpdateItemRequest,
};
use crate::config::NONE_MARKER;
use crate::error::{AppError, Result};
use crate::report::money::round_to_cents;

/// Service for managing categories and items
#[derive(Clone)]
pub struct CatalogService {
    repo: Repository,
}

impl CatalogService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create a new category
    pub async fn create_category(
        &self,
        name: &str,
        default_price: Option<f64>,
        parent_id: Option<i64>,
    ) -> Result<Category> {
        let name = validate_category_name(name)?;
        let default_price = default_price.map(checked_price).transpose()?;

        tracing::info!("Creating category: {}", name);
        let category = self
            .repo
            .create_category(CreateCategoryRequest {
                name,
                default_price,
                parent_id,
            })
            .await?;
        tracing::info!("Category created successfully: {}", category.id);

        Ok(category)
    }

    /// Rename, reprice or move a category
    pub async fn update_category(
        &self,
        id: i64,
        name: &str,
        default_price: Option<f64>,
        parent_id: Option<i64>,
    ) -> Result<Category> {
        let name = validate_category_name(name)?;
        let default_price = default_price.map(checked_price).transpose()?;

        tracing::debug!("Updating category: {}", id);
        self.repo
            .update_category(UpdateCategoryRequest {
                id,
                name,
                default_price,
                parent_id,
            })
            .await
    }

    /// Hide a category together with everything below it
    pub async fn delete_category(&self, id: i64) -> Result<()> {
        tracing::info!("Deleting category: {}", id);
        self.repo.delete_category(id).await?;
        tracing::info!("Category deleted successfully: {}", id);
        Ok(())
    }

    pub async fn get_category(&self, id: i64) -> Result<Category> {
        self.repo.get_category(id).await
    }

    pub async fn list_categories(&self, parent_id: Option<i64>, include_hidden: bool) -> Result<Vec<Category>> {
        self.repo.list_categories(parent_id, include_hidden).await
    }

    /// Effective price of a category, inherited from its ancestors if unset
    pub async fn category_price(&self, id: i64) -> Result<f64> {
        self.repo.get_category_price(id).await
    }

    pub async fn count_visible_items(&self, category_id: i64) -> Result<i64> {
        self.repo.count_visible_items(category_id).await
    }

    /// Create a new item
    pub async fn create_item(&self, req: CreateItemRequest) -> Result<Item> {
        let req = CreateItemRequest {
            name: validate_name(&req.name)?,
            base_price: req.base_price.map(checked_price).transpose()?,
            ..req
        };
        validate_stock(req.current_stock)?;

        tracing::info!("Creating item: {}", req.name);
        let item = self.repo.create_item(req).await?;
        tracing::info!("Item created successfully: {}", item.id);

        Ok(item)
    }

    pub async fn update_item(&self, req: UpdateItemRequest) -> Result<Item> {
        let req = UpdateItemRequest {
            name: validate_name(&req.name)?,
            base_price: req.base_price.map(checked_price).transpose()?,
            ..req
        };
        validate_stock(req.current_stock)?;

        tracing::debug!("Updating item: {}", req.id);
        self.repo.update_item(req).await
    }

    pub async fn delete_item(&self, id: i64) -> Result<()> {
        tracing::info!("Deleting item: {}", id);
        self.repo.delete_item(id).await
    }

    pub async fn get_item(&self, id: i64) -> Result<Item> {
        self.repo.get_item(id).await
    }

    pub async fn list_items(&self, category_id: Option<i64>, include_hidden: bool) -> Result<Vec<Item>> {
        self.repo.list_items(category_id, include_hidden).await
    }
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("Name cannot be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

/// "None" is the top-level marker in report snapshots
fn validate_category_name(name: &str) -> Result<String> {
    let name = validate_name(name)?;
    if name == NONE_MARKER {
        return Err(AppError::Validation(format!(
            "'{}' is reserved and cannot name a category",
            NONE_MARKER
        )));
    }
    Ok(name)
}

/// Prices must be finite and not negative; they are kept to the cent
pub(crate) fn checked_price(price: f64) -> Result<f64> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::Validation(format!("Invalid price: {}", price)));
    }
    Ok(round_to_cents(price))
}

fn validate_stock(stock: Option<i64>) -> Result<()> {
    match stock {
        Some(stock) if stock < -1 => Err(AppError::Validation(format!(
            "Invalid stock: {} (use -1 for untracked)",
            stock
        ))),
        _ => Ok(()),
    }
}
