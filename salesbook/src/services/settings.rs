//! Settings service
//!
//! Manages report settings persistence using JSON file storage.

use crate::config::{
    MAX_CURRENCY_SYMBOL_LENGTH, MAX_LINE_HEIGHT, MAX_PAGE_EDGE, MIN_LINE_HEIGHT, MIN_PAGE_EDGE,
    PRICE_COLUMN_OFFSET, SETTINGS_FILE,
};
use crate::database::ExportFormat;
use crate::error::{AppError, Result};
use crate::report::PageLayout;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Report and export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Printed before every amount in paginated reports
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    #[serde(default)]
    pub page: PageLayout,
    #[serde(default = "default_export_format")]
    pub default_format: ExportFormat,
    /// Start a new batch after exporting the current one
    #[serde(default)]
    pub end_batch_after_export: bool,
}

fn default_currency_symbol() -> String {
    "€".to_string()
}

fn default_export_format() -> ExportFormat {
    ExportFormat::Pdf
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            currency_symbol: default_currency_symbol(),
            page: PageLayout::default(),
            default_format: default_export_format(),
            end_batch_after_export: false,
        }
    }
}

impl ReportSettings {
    /// Check the settings can produce a usable page
    pub fn validate(&self) -> Result<()> {
        if self.currency_symbol.chars().count() > MAX_CURRENCY_SYMBOL_LENGTH {
            return Err(AppError::Validation(format!(
                "Currency symbol must be at most {} characters",
                MAX_CURRENCY_SYMBOL_LENGTH
            )));
        }

        let page = &self.page;
        for (name, edge) in [("width", page.width), ("height", page.height)] {
            if !(MIN_PAGE_EDGE..=MAX_PAGE_EDGE).contains(&edge) {
                return Err(AppError::Validation(format!(
                    "Page {} must be between {} and {}",
                    name, MIN_PAGE_EDGE, MAX_PAGE_EDGE
                )));
            }
        }
        if !(MIN_LINE_HEIGHT..=MAX_LINE_HEIGHT).contains(&page.line_height) {
            return Err(AppError::Validation(format!(
                "Line height must be between {} and {}",
                MIN_LINE_HEIGHT, MAX_LINE_HEIGHT
            )));
        }
        if page.margin < 0.0 || page.indent_step < 0.0 {
            return Err(AppError::Validation(
                "Margin and indent step cannot be negative".to_string(),
            ));
        }
        // A fresh page has to hold at least the grand total block.
        if page.margin * 2.0 + page.line_height * 4.0 > page.height {
            return Err(AppError::Validation(
                "Margins leave no room for content on the page".to_string(),
            ));
        }
        if page.margin * 2.0 + PRICE_COLUMN_OFFSET > page.width {
            return Err(AppError::Validation(
                "Page is too narrow for the price columns".to_string(),
            ));
        }

        Ok(())
    }
}

/// Service for managing report settings
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            settings_path: data_dir.join(SETTINGS_FILE),
        }
    }

    /// Load settings from disk or create default if not exists
    pub async fn load(&self) -> Result<ReportSettings> {
        if !self.settings_path.exists() {
            tracing::info!("Settings file not found, creating default settings");
            let default = ReportSettings::default();
            self.save(&default).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let settings: ReportSettings = serde_json::from_str(&content)
            .map_err(|e| AppError::Generic(format!("Failed to parse settings: {}", e)))?;
        settings.validate()?;

        Ok(settings)
    }

    /// Save settings to disk
    pub async fn save(&self, settings: &ReportSettings) -> Result<()> {
        settings.validate()?;

        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&self.settings_path, content).await?;
        tracing::info!("Settings saved to {:?}", self.settings_path);

        Ok(())
    }

    /// Update the page geometry used for paginated reports
    pub async fn update_page_layout(&self, page: PageLayout) -> Result<()> {
        let mut settings = self.load().await?;
        settings.page = page;
        self.save(&settings).await
    }

    pub async fn update_currency_symbol(&self, symbol: &str) -> Result<()> {
        let mut settings = self.load().await?;
        settings.currency_symbol = symbol.to_string();
        self.save(&settings).await
    }

    /// Update what an export does when the caller does not say
    pub async fn update_export_defaults(&self, format: ExportFormat, end_batch_after_export: bool) -> Result<()> {
        let mut settings = self.load().await?;
        settings.default_format = format;
        settings.end_batch_after_export = end_batch_after_export;
        self.save(&settings).await
    }
}
