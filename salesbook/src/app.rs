//! Application state and initialization
//!
//! This module opens the store, prepares the data directory and wires
//! every service together. Front-ends hold one `AppState`.

use crate::config::{DATABASE_FILE, EXPORTS_DIR};
use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::services::{CatalogService, ExportService, SalesService, SettingsService};
use crate::storage::ExportStore;
use std::path::{Path, PathBuf};

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub catalog: CatalogService,
    pub sales: SalesService,
    pub exports: ExportService,
    pub settings: SettingsService,
}

impl AppState {
    /// Open (or create) a data directory
    pub async fn open(data_dir: &Path) -> Result<Self> {
        tracing::info!("Initializing application");
        tracing::info!("Data directory: {:?}", data_dir);

        std::fs::create_dir_all(data_dir)?;

        let pool = create_pool(&data_dir.join(DATABASE_FILE)).await?;
        let repo = Repository::new(pool);

        let store = ExportStore::new(data_dir.join(EXPORTS_DIR));
        store.initialize().await?;

        let settings = SettingsService::new(data_dir.to_path_buf());
        // Creates the settings file on first run and rejects a broken one early.
        settings.load().await?;

        tracing::info!("Application initialized successfully");

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            catalog: CatalogService::new(repo.clone()),
            sales: SalesService::new(repo.clone()),
            exports: ExportService::new(repo, store, settings.clone()),
            settings,
        })
    }
}
