//! CSV inventory import.
//!
//! An upload goes through three stages:
//! 1. **Decode**: bytes to header-keyed raw rows ([`upload`])
//! 2. **Normalize**: raw rows to typed partial updates ([`normalizer`])
//! 3. **Reconcile**: diff against the catalog and apply ([`reconciler`])
//!
//! [`ImportService`] ties the stages together as a two-phase
//! preview/confirm workflow, with previews parked in a [`PreviewCache`]
//! until confirmed or expired.

mod normalizer;
mod preview_cache;
mod reconciler;
mod upload;

pub use normalizer::*;
pub use preview_cache::*;
pub use reconciler::*;
pub use upload::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ImportConfig;
use crate::db::{Database, DbError};
use crate::models::{ImportSummary, MedicinePayload};

/// Import workflow errors.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Import session expired or unknown; please preview the file again")]
    SessionExpired,

    #[error("Upload rejected: {0}")]
    Upload(#[from] UploadError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

pub type ImportResult<T> = Result<T, ImportError>;

/// What a caller sees after previewing an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportPreview {
    /// Pass back to [`ImportService::confirm`]
    pub token: String,
    pub file_name: String,
    pub file_sha256: String,
    /// Leading normalized rows, for display
    pub rows: Vec<MedicinePayload>,
    /// All normalized rows in the batch
    pub total: u64,
    pub replace_all: bool,
    /// Dry-run result against the catalog at preview time
    pub planned: ImportSummary,
}

/// Preview/confirm import workflow.
pub struct ImportService {
    config: ImportConfig,
    normalizer: RowNormalizer,
    cache: PreviewCache,
}

impl Default for ImportService {
    fn default() -> Self {
        Self::new(ImportConfig::default())
    }
}

impl ImportService {
    pub fn new(config: ImportConfig) -> Self {
        Self::with_normalizer(config, RowNormalizer::new())
    }

    /// Use a normalizer with extra header synonyms.
    pub fn with_normalizer(config: ImportConfig, normalizer: RowNormalizer) -> Self {
        let cache = PreviewCache::new(config.preview_ttl());
        Self {
            config,
            normalizer,
            cache,
        }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn cache(&self) -> &PreviewCache {
        &self.cache
    }

    /// Decode and normalize an upload into a batch.
    pub fn parse(&self, file_name: &str, data: &[u8]) -> ImportResult<(Vec<MedicinePayload>, String)> {
        ensure_csv_filename(file_name)?;
        let upload = decode_upload(data, self.config.max_upload_bytes)?;
        tracing::debug!(
            file_name,
            rows = upload.rows.len(),
            blank_rows = upload.blank_rows,
            "Upload decoded"
        );
        Ok((self.normalizer.normalize_all(&upload.rows), upload.sha256))
    }

    /// Stage an upload for confirmation.
    pub fn preview(
        &self,
        db: &Database,
        file_name: &str,
        data: &[u8],
        replace_all: bool,
    ) -> ImportResult<ImportPreview> {
        self.preview_at(db, file_name, data, replace_all, Utc::now())
    }

    /// [`preview`](Self::preview) with an explicit clock.
    pub fn preview_at(
        &self,
        db: &Database,
        file_name: &str,
        data: &[u8],
        replace_all: bool,
        now: DateTime<Utc>,
    ) -> ImportResult<ImportPreview> {
        let (rows, file_sha256) = self.parse(file_name, data)?;
        let planned = db.dry_run(&rows, replace_all)?;

        let shown = rows
            .iter()
            .take(self.config.preview_row_limit)
            .cloned()
            .collect();
        let total = rows.len() as u64;

        let token = self.cache.insert_at(
            PreviewEntry {
                file_name: file_name.to_string(),
                file_sha256: file_sha256.clone(),
                rows,
                replace_all,
                created_at: now,
            },
            now,
        );
        tracing::info!(file_name, total, replace_all, "Import preview stored");

        Ok(ImportPreview {
            token,
            file_name: file_name.to_string(),
            file_sha256,
            rows: shown,
            total,
            replace_all,
            planned,
        })
    }

    /// Apply a previewed batch. The token is consumed whatever the outcome.
    pub fn confirm(
        &self,
        db: &mut Database,
        token: &str,
        replace_all: bool,
    ) -> ImportResult<ImportSummary> {
        self.confirm_at(db, token, replace_all, Utc::now())
    }

    /// [`confirm`](Self::confirm) with an explicit clock.
    pub fn confirm_at(
        &self,
        db: &mut Database,
        token: &str,
        replace_all: bool,
        now: DateTime<Utc>,
    ) -> ImportResult<ImportSummary> {
        let Some(entry) = self.cache.take_at(token, now) else {
            tracing::warn!("Import confirm with expired or unknown token");
            return Err(ImportError::SessionExpired);
        };

        let summary = db.apply_import(&entry.file_name, &entry.file_sha256, &entry.rows, replace_all)?;
        Ok(summary)
    }

    /// Decode and apply in one step.
    pub fn quick(
        &self,
        db: &mut Database,
        file_name: &str,
        data: &[u8],
        replace_all: bool,
    ) -> ImportResult<ImportSummary> {
        let (rows, file_sha256) = self.parse(file_name, data)?;
        Ok(db.apply_import(file_name, &file_sha256, &rows, replace_all)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STOCK_CSV: &[u8] = b"Name,Qty,MRP\nParacetamol,100,2.50\nIbuprofen,50,3\n,10,1\n";

    #[test]
    fn test_preview_then_confirm() {
        let mut db = Database::open_in_memory().unwrap();
        let service = ImportService::default();

        let preview = service.preview(&db, "stock.csv", STOCK_CSV, false).unwrap();
        assert_eq!(preview.total, 3);
        assert_eq!(preview.planned.created, 2);
        assert_eq!(preview.planned.skipped, 1);
        assert!(db.list_medicines().unwrap().is_empty());

        let summary = service.confirm(&mut db, &preview.token, false).unwrap();
        assert_eq!(summary, preview.planned);
        assert_eq!(db.list_medicines().unwrap().len(), 2);
    }

    #[test]
    fn test_second_confirm_expires() {
        let mut db = Database::open_in_memory().unwrap();
        let service = ImportService::default();

        let preview = service.preview(&db, "stock.csv", STOCK_CSV, false).unwrap();
        service.confirm(&mut db, &preview.token, false).unwrap();

        assert!(matches!(
            service.confirm(&mut db, &preview.token, false),
            Err(ImportError::SessionExpired)
        ));
        assert_eq!(db.recent_imports(10).unwrap().len(), 1);
    }

    #[test]
    fn test_expired_token_leaves_catalog_untouched() {
        let mut db = Database::open_in_memory().unwrap();
        let service = ImportService::default();
        let t0 = Utc::now();

        let preview = service
            .preview_at(&db, "stock.csv", STOCK_CSV, false, t0)
            .unwrap();
        let result = service.confirm_at(
            &mut db,
            &preview.token,
            false,
            t0 + chrono::Duration::minutes(46),
        );

        assert!(matches!(result, Err(ImportError::SessionExpired)));
        assert!(db.list_medicines().unwrap().is_empty());
        assert!(db.recent_imports(10).unwrap().is_empty());
    }

    #[test]
    fn test_failed_apply_rolls_back_and_spends_token() {
        let mut db = Database::open_in_memory().unwrap();
        let service = ImportService::default();

        let preview = service.preview(&db, "stock.csv", STOCK_CSV, false).unwrap();
        // Logging the import is the last write; make it fail
        db.conn().execute_batch("DROP TABLE import_log").unwrap();

        let result = service.confirm(&mut db, &preview.token, false);
        assert!(matches!(result, Err(ImportError::Database(_))));
        assert!(db.list_medicines().unwrap().is_empty());

        let retry = service.confirm(&mut db, &preview.token, false);
        assert!(matches!(retry, Err(ImportError::SessionExpired)));
        assert!(service.cache().is_empty());
    }

    #[test]
    fn test_confirm_uses_its_own_replace_flag() {
        let mut db = Database::open_in_memory().unwrap();
        db.reconcile(&[MedicinePayload::named("Old Stock")], false)
            .unwrap();
        let service = ImportService::default();

        let preview = service.preview(&db, "stock.csv", STOCK_CSV, false).unwrap();
        assert!(!preview.replace_all);

        let summary = service.confirm(&mut db, &preview.token, true).unwrap();
        assert!(summary.replaced_all);
        assert_eq!(summary.deleted, 1);
    }

    #[test]
    fn test_preview_row_limit() {
        let db = Database::open_in_memory().unwrap();
        let service = ImportService::new(ImportConfig {
            preview_row_limit: 1,
            ..Default::default()
        });

        let preview = service.preview(&db, "stock.csv", STOCK_CSV, false).unwrap();
        assert_eq!(preview.rows.len(), 1);
        assert_eq!(preview.total, 3);
    }

    #[test]
    fn test_rejects_non_csv_name() {
        let db = Database::open_in_memory().unwrap();
        let service = ImportService::default();

        let err = service.preview(&db, "stock.xlsx", STOCK_CSV, false).unwrap_err();
        assert!(matches!(err, ImportError::Upload(UploadError::NotCsv(_))));
        assert!(service.cache().is_empty());
    }

    #[test]
    fn test_quick_import() {
        let mut db = Database::open_in_memory().unwrap();
        let service = ImportService::default();

        let summary = service.quick(&mut db, "stock.csv", STOCK_CSV, false).unwrap();
        assert_eq!(summary.created, 2);
        assert!(service.cache().is_empty());
        assert_eq!(db.recent_imports(10).unwrap()[0].file_name, "stock.csv");
    }
}
