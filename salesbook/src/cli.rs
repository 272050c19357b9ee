use crate::app::AppState;
use crate::database::{Category, CreateItemRequest, ExportFormat, ExportScope, Item, UpdateItemRequest};
use crate::error::Result;
use crate::report::table::format_amount;
use crate::services::ExportRequest;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "salesbook")]
#[command(about = "Record merch sales and export reproducible batch reports")]
#[command(version)]
pub struct CliArgs {
    /// Directory holding the database, settings and exports
    #[arg(long, global = true, value_name = "DIR", default_value = "salesbook-data")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List categories under a parent (top level by default)
    Categories {
        #[arg(long, value_name = "ID")]
        parent: Option<i64>,

        /// Include deleted categories
        #[arg(long)]
        all: bool,
    },

    /// Create a category
    AddCategory {
        name: String,

        /// Default price handed down to items
        #[arg(long)]
        price: Option<f64>,

        #[arg(long, value_name = "ID")]
        parent: Option<i64>,
    },

    /// Rename, reprice or move a category
    EditCategory {
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long, conflicts_with = "clear_price")]
        price: Option<f64>,

        /// Inherit the price from the parent again
        #[arg(long)]
        clear_price: bool,

        #[arg(long, value_name = "ID", conflicts_with = "top_level")]
        parent: Option<i64>,

        /// Move to the top level
        #[arg(long)]
        top_level: bool,
    },

    /// Hide a category with its subcategories and items
    DeleteCategory { id: i64 },

    /// List items of a category (uncategorized by default)
    Items {
        #[arg(long, value_name = "ID")]
        category: Option<i64>,

        /// Include deleted items
        #[arg(long)]
        all: bool,
    },

    /// Create an item
    AddItem {
        name: String,

        #[arg(long)]
        price: Option<f64>,

        /// Units in stock (untracked if omitted)
        #[arg(long)]
        stock: Option<i64>,

        #[arg(long, value_name = "ID")]
        category: Option<i64>,

        /// Take the price from the category
        #[arg(long, requires = "category")]
        category_price: bool,
    },

    /// Change an item; unset options keep their value
    EditItem {
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        price: Option<f64>,

        /// Units in stock, -1 for untracked
        #[arg(long, allow_negative_numbers = true)]
        stock: Option<i64>,

        #[arg(long, value_name = "ID")]
        category: Option<i64>,

        /// Whether the price comes from the category
        #[arg(long)]
        category_price: Option<bool>,
    },

    /// Hide an item
    DeleteItem { id: i64 },

    /// Record sales of an item
    Sell {
        item_id: i64,

        /// Price per unit (default: the item's price)
        #[arg(long)]
        price: Option<f64>,

        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,
    },

    /// List recorded sales, newest first
    History,

    /// Change the price a sale was recorded at
    CorrectSale { id: i64, price: f64 },

    /// Delete a sale and give the unit back to stock
    DeleteSale { id: i64 },

    /// Export a sales report
    Export {
        #[arg(long, value_enum, default_value = "current")]
        scope: ScopeArg,

        /// Output format (default: from settings)
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Report title (default: batch name or "All Batches")
        #[arg(long)]
        name: Option<String>,

        /// Start a new batch after exporting the current one
        #[arg(long)]
        end_batch: bool,
    },

    /// Regenerate an earlier export from its backup snapshot
    Reexport {
        /// Export record id
        id: String,

        #[arg(long, value_enum)]
        format: FormatArg,
    },

    /// List exports, newest first
    Exports,

    /// Delete an export with its snapshot and re-exports
    DeleteExport { id: String },

    /// Show sale counts and the current batch
    Summary,

    /// Close the current batch and start a new one
    NewBatch,

    /// Delete every sale and restore stock
    ResetSales {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeArg {
    /// Sales of the current batch
    Current,
    /// Sales of every batch
    All,
}

impl From<ScopeArg> for ExportScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::Current => ExportScope::CurrentBatch,
            ScopeArg::All => ExportScope::AllBatches,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Csv,
    Pdf,
}

impl From<FormatArg> for ExportFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Pdf => ExportFormat::Pdf,
        }
    }
}

/// Run one command against an opened data directory, returns what to print
pub async fn execute(state: &AppState, command: Command) -> Result<String> {
    let lines: Vec<String> = match command {
        Command::Categories { parent, all } => {
            let categories = state.catalog.list_categories(parent, all).await?;
            if categories.is_empty() {
                vec!["No categories".to_string()]
            } else {
                categories.iter().map(category_line).collect()
            }
        }
        Command::AddCategory { name, price, parent } => {
            let category = state.catalog.create_category(&name, price, parent).await?;
            vec![format!("Created {}", category_line(&category))]
        }
        Command::EditCategory {
            id,
            name,
            price,
            clear_price,
            parent,
            top_level,
        } => {
            let existing = state.catalog.get_category(id).await?;
            let price = match (price, clear_price) {
                (_, true) => None,
                (Some(price), false) => Some(price),
                (None, false) => existing.default_price,
            };
            let parent = match (parent, top_level) {
                (_, true) => None,
                (Some(parent), false) => Some(parent),
                (None, false) => existing.parent_id,
            };
            let name = name.unwrap_or(existing.name);

            let category = state.catalog.update_category(id, &name, price, parent).await?;
            vec![format!("Updated {}", category_line(&category))]
        }
        Command::DeleteCategory { id } => {
            state.catalog.delete_category(id).await?;
            vec![format!("Deleted category {}", id)]
        }
        Command::Items { category, all } => {
            let items = state.catalog.list_items(category, all).await?;
            if items.is_empty() {
                vec!["No items".to_string()]
            } else {
                items.iter().map(item_line).collect()
            }
        }
        Command::AddItem {
            name,
            price,
            stock,
            category,
            category_price,
        } => {
            let item = state
                .catalog
                .create_item(CreateItemRequest {
                    name,
                    base_price: price,
                    current_stock: stock,
                    category_id: category,
                    uses_category_price: category_price,
                })
                .await?;
            vec![format!("Created {}", item_line(&item))]
        }
        Command::EditItem {
            id,
            name,
            price,
            stock,
            category,
            category_price,
        } => {
            let existing = state.catalog.get_item(id).await?;
            let item = state
                .catalog
                .update_item(UpdateItemRequest {
                    id,
                    name: name.unwrap_or(existing.name),
                    base_price: Some(price.unwrap_or(existing.base_price)),
                    current_stock: Some(stock.unwrap_or(existing.current_stock)),
                    category_id: category.or(existing.category_id),
                    uses_category_price: category_price.unwrap_or(existing.uses_category_price),
                })
                .await?;
            vec![format!("Updated {}", item_line(&item))]
        }
        Command::DeleteItem { id } => {
            state.catalog.delete_item(id).await?;
            vec![format!("Deleted item {}", id)]
        }
        Command::Sell { item_id, price, count } => {
            let mut sold = Vec::new();
            for _ in 0..count {
                let sale = state.sales.record_sale(item_id, price).await?;
                sold.push(format!(
                    "Sale {}: item {} at {} (batch {})",
                    sale.id,
                    sale.item_id,
                    format_amount(sale.sold_price),
                    sale.batch_id
                ));
            }
            sold
        }
        Command::History => {
            let history = state.sales.history().await?;
            if history.is_empty() {
                vec!["No sales yet".to_string()]
            } else {
                history
                    .iter()
                    .map(|sale| {
                        format!(
                            "{:>5}  {}  {:<24}  {:>8}  batch {}",
                            sale.id,
                            sale.sold_at.format("%Y-%m-%d %H:%M"),
                            sale.item_name,
                            format_amount(sale.sold_price),
                            sale.batch_id
                        )
                    })
                    .collect()
            }
        }
        Command::CorrectSale { id, price } => {
            let sale = state.sales.correct_sale_price(id, price).await?;
            vec![format!("Sale {} now at {}", sale.id, format_amount(sale.sold_price))]
        }
        Command::DeleteSale { id } => {
            state.sales.delete_sale(id).await?;
            vec![format!("Deleted sale {}", id)]
        }
        Command::Export {
            scope,
            format,
            name,
            end_batch,
        } => {
            let settings = state.settings.load().await?;
            let outcome = state
                .exports
                .export(ExportRequest {
                    scope: scope.into(),
                    format: format.map(Into::into).unwrap_or(settings.default_format),
                    display_name: name,
                    end_batch: end_batch || settings.end_batch_after_export,
                })
                .await?;

            let mut lines = vec![
                format!("Exported {} to {}", outcome.record.display_name, outcome.record.filepath),
                format!("Backup: {}", outcome.backup_path.display()),
                format!("Record: {}", outcome.record.id),
            ];
            if let Some(batch) = outcome.new_batch {
                lines.push(format!("Started {}", batch.name));
            }
            lines
        }
        Command::Reexport { id, format } => {
            let path = state.exports.reexport(&id, format.into()).await?;
            vec![format!("Re-exported to {}", path.display())]
        }
        Command::Exports => {
            let records = state.exports.list_exports().await?;
            if records.is_empty() {
                vec!["No exports yet".to_string()]
            } else {
                records
                    .iter()
                    .map(|record| {
                        format!(
                            "{}  {}  {:<3}  {:<20}  {}",
                            record.id,
                            record.exported_at.format("%Y-%m-%d %H:%M"),
                            record.format,
                            record.display_name,
                            record.filename
                        )
                    })
                    .collect()
            }
        }
        Command::DeleteExport { id } => {
            state.exports.delete_export(&id).await?;
            vec![format!("Deleted export {}", id)]
        }
        Command::Summary => {
            let summary = state.exports.summary().await?;
            vec![
                format!(
                    "Current batch: {} (#{})",
                    summary.current_batch_name, summary.current_batch_id
                ),
                format!("Sales in current batch: {}", summary.current_batch_sales),
                format!("Total sales (all batches): {}", summary.total_sales),
                format!("Exports: {}", summary.export_count),
            ]
        }
        Command::NewBatch => {
            let batch = state.sales.start_new_batch().await?;
            vec![format!("Started {}", batch.name)]
        }
        Command::ResetSales { yes } => {
            if !yes {
                vec!["Refusing to reset without --yes".to_string()]
            } else {
                let summary = state.sales.reset_all_sales().await?;
                vec![format!(
                    "Removed {} sales, purged {} items and {} categories",
                    summary.sales_removed, summary.items_purged, summary.categories_purged
                )]
            }
        }
    };

    Ok(lines.into_iter().map(|line| line + "\n").collect())
}

fn category_line(category: &Category) -> String {
    let price = category
        .default_price
        .map(format_amount)
        .unwrap_or_else(|| "inherited".to_string());
    let hidden = if category.visible { "" } else { "  (deleted)" };
    format!("category {}: {}  price {}{}", category.id, category.name, price, hidden)
}

fn item_line(item: &Item) -> String {
    let stock = if item.current_stock < 0 {
        "untracked".to_string()
    } else {
        item.current_stock.to_string()
    };
    let hidden = if item.visible { "" } else { "  (deleted)" };
    format!(
        "item {}: {}  price {}  stock {}  sold {}{}",
        item.id,
        item.name,
        format_amount(item.base_price),
        stock,
        item.total_sold,
        hidden
    )
}
