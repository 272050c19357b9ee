//! Sales service
//!
//! Recording and correcting sales, and managing sale batches.

use super::catalog::checked_price;
use crate::database::{Repository, ResetSummary, Sale, SaleBatch, SaleHistoryEntry};
use crate::error::Result;

/// Service for recording sales
#[derive(Clone)]
pub struct SalesService {
    repo: Repository,
}

impl SalesService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Record one sale, at the item's base price unless `price` is given
    ///
    /// The price is kept to the cent.
    pub async fn record_sale(&self, item_id: i64, price: Option<f64>) -> Result<Sale> {
        let price = match price {
            Some(price) => price,
            None => self.repo.get_item(item_id).await?.base_price,
        };
        let price = checked_price(price)?;

        self.repo.record_sale(item_id, price).await
    }

    /// Correct the price a sale was recorded at
    pub async fn correct_sale_price(&self, sale_id: i64, price: f64) -> Result<Sale> {
        let price = checked_price(price)?;
        tracing::info!("Correcting price of sale {} to {:.2}", sale_id, price);
        self.repo.update_sale_price(sale_id, price).await
    }

    /// Delete a sale, giving the unit back to stock
    pub async fn delete_sale(&self, sale_id: i64) -> Result<()> {
        tracing::info!("Deleting sale: {}", sale_id);
        self.repo.delete_sale(sale_id).await
    }

    pub async fn get_sale(&self, sale_id: i64) -> Result<Sale> {
        self.repo.get_sale(sale_id).await
    }

    pub async fn history(&self) -> Result<Vec<SaleHistoryEntry>> {
        self.repo.list_sale_history().await
    }

    /// Remove every sale and restore stock levels
    pub async fn reset_all_sales(&self) -> Result<ResetSummary> {
        tracing::info!("Resetting all sales");
        self.repo.reset_all_sales().await
    }

    pub async fn current_batch(&self) -> Result<SaleBatch> {
        self.repo.current_batch().await
    }

    /// Close the current batch; later sales go into a new one
    pub async fn start_new_batch(&self) -> Result<SaleBatch> {
        self.repo.create_new_batch().await
    }

    pub async fn list_batches(&self) -> Result<Vec<SaleBatch>> {
        self.repo.list_batches().await
    }
}
