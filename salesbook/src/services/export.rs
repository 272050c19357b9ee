//! Export service
//!
//! Renders sales reports, stores them with their backup snapshot and keeps
//! the export history. Re-exports are produced from the snapshot alone, so
//! they stay identical to the original report whatever happened to the
//! live sales since.

use super::settings::{ReportSettings, SettingsService};
use crate::config::{ALL_BATCHES_NAME, EXPORT_PREFIX};
use crate::database::{
    ExportFormat, ExportRecord, ExportScope, NewExportRecord, Repository, SaleBatch,
};
use crate::error::Result;
use crate::report::{
    parse_snapshot, render_report, render_snapshot, GroupsByCategory, RenderOptions, ReportHeader,
};
use crate::storage::ExportStore;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What to export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    pub scope: ExportScope,
    pub format: ExportFormat,
    /// Report title; defaults to the batch name or "All Batches"
    #[serde(default)]
    pub display_name: Option<String>,
    /// Start a new batch afterwards (current-batch exports only)
    #[serde(default)]
    pub end_batch: bool,
}

/// Result of a completed export
#[derive(Debug, Clone, Serialize)]
pub struct ExportOutcome {
    pub record: ExportRecord,
    pub backup_path: PathBuf,
    /// Set when the export closed the batch
    pub new_batch: Option<SaleBatch>,
}

/// Figures shown before exporting
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub current_batch_id: i64,
    pub current_batch_name: String,
    pub current_batch_sales: i64,
    pub total_sales: i64,
    pub export_count: usize,
}

/// Export service
#[derive(Clone)]
pub struct ExportService {
    repo: Repository,
    store: ExportStore,
    settings: SettingsService,
}

impl ExportService {
    pub fn new(repo: Repository, store: ExportStore, settings: SettingsService) -> Self {
        Self {
            repo,
            store,
            settings,
        }
    }

    /// Render and store a report, its backup snapshot and its record
    ///
    /// If any step fails, files already written are removed again.
    pub async fn export(&self, request: ExportRequest) -> Result<ExportOutcome> {
        let settings = self.settings.load().await?;
        let batch = self.repo.current_batch().await?;
        let batch_id = match request.scope {
            ExportScope::CurrentBatch => Some(batch.id),
            ExportScope::AllBatches => None,
        };

        let display_name = request
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| match request.scope {
                ExportScope::CurrentBatch => batch.name.clone(),
                ExportScope::AllBatches => ALL_BATCHES_NAME.to_string(),
            });
        let date_range = self.repo.get_export_date_range(batch_id).await?;

        tracing::info!(
            "Exporting {:?} as {} ({})",
            request.scope,
            request.format,
            display_name
        );

        let tree = self.repo.load_category_tree().await?;
        let groups = GroupsByCategory::organize(self.repo.get_sales_grouped(batch_id).await?, &tree);
        let options = render_options(&settings, &display_name, &date_range);
        let rendered = render_report(&tree, &groups, request.format, &options)?;

        let stem = format!("{}{}", EXPORT_PREFIX, Local::now().format("%Y%m%d_%H%M%S"));
        let filename = self.store.unique_filename(&stem, request.format.extension());

        let primary_path = self.store.write_primary(&filename, &rendered.document).await?;
        let (backup_path, checksum) = match self.store.write_backup(&filename, &rendered.snapshot).await {
            Ok(written) => written,
            Err(e) => {
                self.discard(&[&primary_path]).await;
                return Err(e);
            }
        };

        let record = NewExportRecord {
            filename: filename.clone(),
            filepath: primary_path.to_string_lossy().to_string(),
            batch_id,
            format: request.format,
            is_full_export: request.scope.is_full_export(),
            display_name,
            date_range,
            snapshot_checksum: checksum,
        };
        let record = match self.repo.save_export_record(record).await {
            Ok(record) => record,
            Err(e) => {
                self.discard(&[&primary_path, &backup_path]).await;
                return Err(e);
            }
        };

        let mut new_batch = None;
        if request.scope == ExportScope::CurrentBatch {
            self.repo.update_batch_export_time(batch.id).await?;
            if request.end_batch {
                new_batch = Some(self.repo.create_new_batch().await?);
            }
        } else if request.end_batch {
            tracing::debug!("Ignoring end_batch for an all-batches export");
        }

        tracing::info!(
            "Export {} written to {:?} ({} bytes)",
            record.id,
            primary_path,
            rendered.document.len()
        );

        Ok(ExportOutcome {
            record,
            backup_path,
            new_batch,
        })
    }

    /// Regenerate an earlier export in `format` from its backup snapshot
    ///
    /// The live store is not consulted. Returns the path of the new file.
    pub async fn reexport(&self, record_id: &str, format: ExportFormat) -> Result<PathBuf> {
        let record = self.repo.get_export_record(record_id).await?;
        tracing::info!("Re-exporting {} ({}) as {}", record.id, record.filename, format);

        let snapshot = self
            .store
            .read_backup(&record.filename, &record.snapshot_checksum)
            .await?;

        let document = match format {
            ExportFormat::Csv => {
                parse_snapshot(&snapshot)?;
                snapshot
            }
            ExportFormat::Pdf => {
                let settings = self.settings.load().await?;
                let options = render_options(&settings, &record.display_name, &record.date_range);
                render_snapshot(&snapshot, format, &options)?
            }
        };

        let path = self.store.reexport_path(&record.filename, format);
        self.store.write_atomic(&path, &document).await?;

        tracing::info!("Re-export written to {:?}", path);
        Ok(path)
    }

    /// Export history, newest first
    pub async fn list_exports(&self) -> Result<Vec<ExportRecord>> {
        self.repo.list_export_records().await
    }

    /// Delete an export: its document, snapshot, re-exports and record
    pub async fn delete_export(&self, record_id: &str) -> Result<()> {
        let record = self.repo.get_export_record(record_id).await?;
        tracing::info!("Deleting export {} ({})", record.id, record.filename);

        self.store.delete(Path::new(&record.filepath)).await?;
        self.store.delete(&self.store.backup_path(&record.filename)).await?;
        let removed = self.store.remove_reexports(&record.filename).await?;
        if removed > 0 {
            tracing::debug!("Removed {} re-exports of {}", removed, record.filename);
        }

        self.repo.delete_export_record(&record.id).await
    }

    pub async fn summary(&self) -> Result<ExportSummary> {
        let batch = self.repo.current_batch().await?;
        Ok(ExportSummary {
            current_batch_sales: self.repo.count_sales(Some(batch.id)).await?,
            total_sales: self.repo.count_sales(None).await?,
            export_count: self.repo.list_export_records().await?.len(),
            current_batch_id: batch.id,
            current_batch_name: batch.name,
        })
    }

    async fn discard(&self, paths: &[&Path]) {
        for path in paths {
            if let Err(e) = self.store.delete(path).await {
                tracing::warn!("Failed to remove {:?} after a failed export: {}", path, e);
            }
        }
    }
}

fn render_options(settings: &ReportSettings, title: &str, date_range: &str) -> RenderOptions {
    RenderOptions {
        header: ReportHeader {
            title: title.to_string(),
            subtitle: date_range.to_string(),
        },
        layout: settings.page,
        currency: settings.currency_symbol.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::initialize_database;
    use crate::database::{CreateCategoryRequest, CreateItemRequest};
    use crate::error::AppError;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;
    use tempfile::TempDir;

    struct Fixture {
        service: ExportService,
        repo: Repository,
        store: ExportStore,
        pool: SqlitePool,
        _temp: TempDir,
    }

    async fn create_fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        initialize_database(&pool).await.unwrap();

        let repo = Repository::new(pool.clone());
        let store = ExportStore::new(temp.path().join("exports"));
        store.initialize().await.unwrap();
        let settings = SettingsService::new(temp.path().to_path_buf());

        Fixture {
            service: ExportService::new(repo.clone(), store.clone(), settings),
            repo,
            store,
            pool,
            _temp: temp,
        }
    }

    async fn sell_badges(repo: &Repository) {
        let merch = repo
            .create_category(CreateCategoryRequest {
                name: "Merch".to_string(),
                default_price: Some(5.0),
                parent_id: None,
            })
            .await
            .unwrap();
        let badges = repo
            .create_category(CreateCategoryRequest {
                name: "Badges".to_string(),
                default_price: None,
                parent_id: Some(merch.id),
            })
            .await
            .unwrap();
        let pin = repo
            .create_item(CreateItemRequest {
                name: "Pin".to_string(),
                base_price: None,
                current_stock: None,
                category_id: Some(badges.id),
                uses_category_price: true,
            })
            .await
            .unwrap();

        for _ in 0..3 {
            repo.record_sale(pin.id, 5.0).await.unwrap();
        }
        for _ in 0..2 {
            repo.record_sale(pin.id, 2.5).await.unwrap();
        }
    }

    fn request(scope: ExportScope, format: ExportFormat) -> ExportRequest {
        ExportRequest {
            scope,
            format,
            display_name: None,
            end_batch: false,
        }
    }

    #[tokio::test]
    async fn test_csv_export_writes_document_backup_and_record() {
        let f = create_fixture().await;
        sell_badges(&f.repo).await;

        let outcome = f
            .service
            .export(request(ExportScope::CurrentBatch, ExportFormat::Csv))
            .await
            .unwrap();
        let record = &outcome.record;

        assert!(record.filename.starts_with("export_"));
        assert!(record.filename.ends_with(".csv"));
        assert_eq!(record.display_name, "Batch 1");
        assert_eq!(record.batch_id, Some(1));
        assert!(!record.is_full_export);

        let document = std::fs::read_to_string(&record.filepath).unwrap();
        assert_eq!(
            document,
            "Parent,Name,Individual Price,Number of Sales,Total\n\
             None,Merch,None,5,20.00\n\
             Merch,Badges,None,5,20.00\n\
             Badges,Pin 50% off,2.50,2,5.00\n\
             Badges,Pin,5.00,3,15.00\n"
        );
        assert_eq!(std::fs::read_to_string(&outcome.backup_path).unwrap(), document);

        let batches = f.repo.list_batches().await.unwrap();
        assert!(batches[0].export_time.is_some());
        assert!(outcome.new_batch.is_none());
    }

    #[tokio::test]
    async fn test_end_batch_starts_new_batch() {
        let f = create_fixture().await;
        sell_badges(&f.repo).await;

        let outcome = f
            .service
            .export(ExportRequest {
                end_batch: true,
                ..request(ExportScope::CurrentBatch, ExportFormat::Pdf)
            })
            .await
            .unwrap();

        assert_eq!(outcome.new_batch.unwrap().name, "Batch 2");
        let summary = f.service.summary().await.unwrap();
        assert_eq!(summary.current_batch_name, "Batch 2");
        assert_eq!(summary.current_batch_sales, 0);
        assert_eq!(summary.total_sales, 5);
        assert_eq!(summary.export_count, 1);
    }

    #[tokio::test]
    async fn test_all_batches_export_never_ends_batch() {
        let f = create_fixture().await;
        sell_badges(&f.repo).await;

        let outcome = f
            .service
            .export(ExportRequest {
                display_name: Some("  Season  ".to_string()),
                end_batch: true,
                ..request(ExportScope::AllBatches, ExportFormat::Csv)
            })
            .await
            .unwrap();

        assert!(outcome.new_batch.is_none());
        assert!(outcome.record.is_full_export);
        assert_eq!(outcome.record.batch_id, None);
        assert_eq!(outcome.record.display_name, "Season");
        assert_eq!(f.repo.current_batch_id().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reexport_survives_reset() {
        let f = create_fixture().await;
        sell_badges(&f.repo).await;

        let outcome = f
            .service
            .export(request(ExportScope::CurrentBatch, ExportFormat::Pdf))
            .await
            .unwrap();
        let original = std::fs::read(&outcome.record.filepath).unwrap();

        f.repo.reset_all_sales().await.unwrap();

        let pdf = f.service.reexport(&outcome.record.id, ExportFormat::Pdf).await.unwrap();
        assert!(pdf.to_string_lossy().ends_with("_reexport.pdf"));
        assert_eq!(std::fs::read(&pdf).unwrap(), original);

        let csv = f.service.reexport(&outcome.record.id, ExportFormat::Csv).await.unwrap();
        assert_eq!(
            std::fs::read(&csv).unwrap(),
            std::fs::read(&outcome.backup_path).unwrap()
        );
    }

    #[tokio::test]
    async fn test_reexport_reports_missing_and_corrupted_backups() {
        let f = create_fixture().await;
        sell_badges(&f.repo).await;

        let outcome = f
            .service
            .export(request(ExportScope::CurrentBatch, ExportFormat::Csv))
            .await
            .unwrap();

        std::fs::write(&outcome.backup_path, b"tampered").unwrap();
        assert!(matches!(
            f.service.reexport(&outcome.record.id, ExportFormat::Pdf).await,
            Err(AppError::BackupCorrupted { .. })
        ));

        std::fs::remove_file(&outcome.backup_path).unwrap();
        assert!(matches!(
            f.service.reexport(&outcome.record.id, ExportFormat::Pdf).await,
            Err(AppError::BackupMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_export_removes_all_files() {
        let f = create_fixture().await;
        sell_badges(&f.repo).await;

        let outcome = f
            .service
            .export(request(ExportScope::AllBatches, ExportFormat::Csv))
            .await
            .unwrap();
        let reexport = f.service.reexport(&outcome.record.id, ExportFormat::Pdf).await.unwrap();

        f.service.delete_export(&outcome.record.id).await.unwrap();

        assert!(!Path::new(&outcome.record.filepath).exists());
        assert!(!outcome.backup_path.exists());
        assert!(!reexport.exists());
        assert!(f.service.list_exports().await.unwrap().is_empty());
        assert!(matches!(
            f.service.delete_export(&outcome.record.id).await,
            Err(AppError::ExportNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_exports_in_same_second_get_distinct_files() {
        let f = create_fixture().await;
        sell_badges(&f.repo).await;

        let first = f
            .service
            .export(request(ExportScope::AllBatches, ExportFormat::Csv))
            .await
            .unwrap();
        let second = f
            .service
            .export(request(ExportScope::AllBatches, ExportFormat::Csv))
            .await
            .unwrap();

        assert_ne!(first.record.filename, second.record.filename);
        assert_ne!(first.backup_path, second.backup_path);
        assert!(f.store.backup_path(&first.record.filename).exists());
        assert_eq!(f.service.list_exports().await.unwrap().len(), 2);
    }

    /// Names of the files directly in the exports directory
    fn export_files(store: &ExportStore) -> Vec<String> {
        std::fs::read_dir(store.root())
            .unwrap()
            .map(|entry| entry.unwrap())
            .filter(|entry| entry.file_type().unwrap().is_file())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_failed_backup_removes_document() {
        let f = create_fixture().await;
        sell_badges(&f.repo).await;

        // A plain file where the backup directory should be
        let backup_dir = f.store.root().join("backup");
        std::fs::remove_dir_all(&backup_dir).unwrap();
        std::fs::write(&backup_dir, b"not a directory").unwrap();

        let result = f
            .service
            .export(request(ExportScope::CurrentBatch, ExportFormat::Pdf))
            .await;

        assert!(result.is_err());
        assert!(export_files(&f.store).iter().all(|name| name == "backup"));
        assert!(f.service.list_exports().await.unwrap().is_empty());
        assert!(f.repo.current_batch().await.unwrap().export_time.is_none());
    }

    #[tokio::test]
    async fn test_failed_record_removes_document_and_backup() {
        let f = create_fixture().await;
        sell_badges(&f.repo).await;

        sqlx::query("DROP TABLE export_records")
            .execute(&f.pool)
            .await
            .unwrap();

        let result = f
            .service
            .export(request(ExportScope::CurrentBatch, ExportFormat::Csv))
            .await;

        assert!(matches!(result, Err(AppError::Database(_))));
        assert!(export_files(&f.store).is_empty());
        assert_eq!(std::fs::read_dir(f.store.root().join("backup")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_pdf_export_is_a_valid_document() {
        let f = create_fixture().await;
        sell_badges(&f.repo).await;

        let outcome = f
            .service
            .export(request(ExportScope::CurrentBatch, ExportFormat::Pdf))
            .await
            .unwrap();
        assert!(outcome.record.filename.ends_with(".pdf"));
        assert!(outcome.backup_path.to_string_lossy().ends_with(".csv"));

        let bytes = std::fs::read(&outcome.record.filepath).unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }
}
