//! PharmaDesk Core Library
//!
//! Local pharmacy inventory with CSV-driven catalog reconciliation.
//!
//! # Architecture
//!
//! ```text
//! CSV upload → Decode → Normalize → [PREVIEW CACHE: token, 45 min TTL]
//!                                              │
//!                                     Operator confirms
//!                                              │
//!                              ┌───────────────▼───────────────┐
//!                              │   Reconcile (one transaction) │
//!                              │  delete absent (replace only) │
//!                              │  upsert by case-folded name   │
//!                              └───────────────┬───────────────┘
//!                                              │
//!                              ┌───────────────┼───────────────┐
//!                              ▼               ▼               ▼
//!                          Catalog        Import log      Dispense history
//!                          queries                        (protects rows)
//! ```
//!
//! # Core Principle
//!
//! **A medicine referenced by a recorded sale is never deleted by an import.**
//! Replace-mode imports keep such entries and report them as kept.
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer with FTS5 search
//! - [`models`]: Domain types (Medicine, MedicinePayload, DispenseLine, etc.)
//! - [`import`]: Upload decoding, row normalization, reconciliation, preview workflow
//! - [`config`]: Constants and import settings

pub mod config;
pub mod db;
pub mod import;
pub mod models;

// Re-export commonly used types
pub use config::ImportConfig;
pub use db::{CatalogStore, Database};
pub use import::{ImportError, ImportPreview, ImportService, Reconciler, RowNormalizer};
pub use models::{
    DispenseLine, DispenseLineInput, DispenseReceipt, DispenseRequest, ImportRecord,
    ImportSummary, Medicine, MedicinePayload,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum PharmaDeskError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Import session expired; please preview the file again")]
    SessionExpired,

    #[error("Upload error: {0}")]
    UploadError(String),
}

impl From<db::DbError> for PharmaDeskError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => PharmaDeskError::NotFound(what),
            invalid @ db::DbError::InvalidDispense(_) => {
                PharmaDeskError::InvalidInput(invalid.to_string())
            }
            other => PharmaDeskError::DatabaseError(other.to_string()),
        }
    }
}

impl From<import::UploadError> for PharmaDeskError {
    fn from(e: import::UploadError) -> Self {
        PharmaDeskError::UploadError(e.to_string())
    }
}

impl From<ImportError> for PharmaDeskError {
    fn from(e: ImportError) -> Self {
        match e {
            ImportError::SessionExpired => PharmaDeskError::SessionExpired,
            ImportError::Upload(e) => e.into(),
            ImportError::Database(e) => e.into(),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for PharmaDeskError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        PharmaDeskError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<PharmaDeskCore>, PharmaDeskError> {
    let db = Database::open(&path)?;
    Ok(Arc::new(PharmaDeskCore::new(db)))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<PharmaDeskCore>, PharmaDeskError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(PharmaDeskCore::new(db)))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct PharmaDeskCore {
    db: Arc<Mutex<Database>>,
    imports: ImportService,
}

impl PharmaDeskCore {
    fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            imports: ImportService::default(),
        }
    }
}

#[uniffi::export]
impl PharmaDeskCore {
    // =========================================================================
    // Import Operations
    // =========================================================================

    /// Stage a CSV upload. Returns a token to confirm with.
    pub fn preview_import(
        &self,
        file_name: String,
        data: Vec<u8>,
        replace_all: bool,
    ) -> Result<FfiImportPreview, PharmaDeskError> {
        let db = self.db.lock()?;
        let preview = self.imports.preview(&db, &file_name, &data, replace_all)?;
        Ok(preview.into())
    }

    /// Apply a previewed upload.
    pub fn confirm_import(
        &self,
        token: String,
        replace_all: bool,
    ) -> Result<FfiImportSummary, PharmaDeskError> {
        let mut db = self.db.lock()?;
        let summary = self.imports.confirm(&mut db, &token, replace_all)?;
        Ok(summary.into())
    }

    /// Decode and apply an upload without a preview step.
    pub fn quick_import(
        &self,
        file_name: String,
        data: Vec<u8>,
        replace_all: bool,
    ) -> Result<FfiImportSummary, PharmaDeskError> {
        let mut db = self.db.lock()?;
        let summary = self.imports.quick(&mut db, &file_name, &data, replace_all)?;
        Ok(summary.into())
    }

    /// Most recent imports first.
    pub fn recent_imports(&self, limit: u32) -> Result<Vec<FfiImportRecord>, PharmaDeskError> {
        let db = self.db.lock()?;
        let records = db.recent_imports(limit as usize)?;
        Ok(records.into_iter().map(|r| r.into()).collect())
    }

    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Medicines whose name contains `query`, highest stock first.
    pub fn search_medicines(
        &self,
        query: String,
        limit: u32,
    ) -> Result<Vec<FfiMedicine>, PharmaDeskError> {
        let db = self.db.lock()?;
        let items = db.search_medicines(&query, limit as usize)?;
        Ok(items.into_iter().map(|m| m.into()).collect())
    }

    /// One page of the catalog in name order, optionally filtered by name.
    pub fn list_inventory(
        &self,
        query: String,
        page: u32,
        per_page: u32,
    ) -> Result<FfiMedicinePage, PharmaDeskError> {
        let db = self.db.lock()?;
        Ok(db.list_medicines_page(&query, page as usize, per_page as usize)?.into())
    }

    /// Get a medicine by id.
    pub fn get_medicine(&self, id: i64) -> Result<Option<FfiMedicine>, PharmaDeskError> {
        let db = self.db.lock()?;
        Ok(db.get_medicine(id)?.map(|m| m.into()))
    }

    /// Medicines with stock at or below `threshold`.
    pub fn low_stock(&self, threshold: i64, limit: u32) -> Result<Vec<FfiMedicine>, PharmaDeskError> {
        let db = self.db.lock()?;
        let items = db.low_stock_medicines(threshold, limit as usize)?;
        Ok(items.into_iter().map(|m| m.into()).collect())
    }

    /// Total `mrp * stock_qty` across the catalog.
    pub fn inventory_value(&self) -> Result<f64, PharmaDeskError> {
        let db = self.db.lock()?;
        Ok(db.inventory_value()?)
    }

    /// Counts plus top stock and top dispensed lists.
    pub fn overview(&self) -> Result<FfiCatalogOverview, PharmaDeskError> {
        let db = self.db.lock()?;
        Ok(db.overview()?.into())
    }

    /// Best sellers since the first day of the current month (UTC).
    pub fn top_medicines_this_month(
        &self,
        limit: u32,
    ) -> Result<Vec<FfiStockEntry>, PharmaDeskError> {
        let db = self.db.lock()?;
        let since = models::month_start(chrono::Utc::now());
        let entries = db.top_dispensed(Some(since), limit as usize)?;
        Ok(entries.into_iter().map(|e| e.into()).collect())
    }

    // =========================================================================
    // Dispense Operations
    // =========================================================================

    /// Record a sale and decrement stock.
    pub fn record_dispense(
        &self,
        lines: Vec<FfiDispenseLineInput>,
        pharmacist: Option<String>,
        payment_mode: Option<String>,
    ) -> Result<FfiDispenseReceipt, PharmaDeskError> {
        let mut request = DispenseRequest::new(lines.into_iter().map(|l| l.into()).collect());
        if let Some(pharmacist) = pharmacist {
            request.pharmacist = pharmacist;
        }
        if let Some(mode) = payment_mode {
            request.payment_mode = mode;
        }

        let mut db = self.db.lock()?;
        let receipt = db.record_dispense(&request)?;
        Ok(receipt.into())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe medicine.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicine {
    pub id: i64,
    pub name: String,
    pub label: String,
    pub strength: Option<String>,
    pub form: Option<String>,
    pub mrp: f64,
    pub tax_pct: f64,
    pub stock_qty: i64,
    pub reorder_level: i64,
    pub batch_no: Option<String>,
    pub expiry_date: Option<String>,
    pub manufacturer: Option<String>,
    pub low_stock: bool,
}

impl From<Medicine> for FfiMedicine {
    fn from(m: Medicine) -> Self {
        Self {
            label: m.label(),
            low_stock: m.is_low_stock(),
            id: m.id,
            name: m.name,
            strength: m.strength,
            form: m.form,
            mrp: m.mrp,
            tax_pct: m.tax_pct,
            stock_qty: m.stock_qty,
            reorder_level: m.reorder_level,
            batch_no: m.batch_no,
            expiry_date: m.expiry_date,
            manufacturer: m.manufacturer,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicinePage {
    pub items: Vec<FfiMedicine>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl From<models::MedicinePage> for FfiMedicinePage {
    fn from(p: models::MedicinePage) -> Self {
        Self {
            items: p.items.into_iter().map(|m| m.into()).collect(),
            total: p.total,
            page: p.page,
            per_page: p.per_page,
            total_pages: p.total_pages,
        }
    }
}

/// FFI-safe stock/sales ranking entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStockEntry {
    pub name: String,
    pub qty: i64,
}

impl From<models::StockEntry> for FfiStockEntry {
    fn from(e: models::StockEntry) -> Self {
        Self {
            name: e.name,
            qty: e.qty,
        }
    }
}

/// FFI-safe catalog overview.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCatalogOverview {
    pub medicine_count: u64,
    pub dispense_line_count: u64,
    pub top_stock: Vec<FfiStockEntry>,
    pub top_dispensed: Vec<FfiStockEntry>,
}

impl From<models::CatalogOverview> for FfiCatalogOverview {
    fn from(o: models::CatalogOverview) -> Self {
        Self {
            medicine_count: o.medicine_count,
            dispense_line_count: o.dispense_line_count,
            top_stock: o.top_stock.into_iter().map(|e| e.into()).collect(),
            top_dispensed: o.top_dispensed.into_iter().map(|e| e.into()).collect(),
        }
    }
}

/// FFI-safe normalized import row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPayloadRow {
    pub name: String,
    pub strength: Option<String>,
    pub form: Option<String>,
    pub mrp: Option<f64>,
    pub tax_pct: Option<f64>,
    pub stock_qty: Option<i64>,
    pub reorder_level: Option<i64>,
    pub batch_no: Option<String>,
    pub expiry_date: Option<String>,
    pub manufacturer: Option<String>,
}

impl From<MedicinePayload> for FfiPayloadRow {
    fn from(p: MedicinePayload) -> Self {
        Self {
            name: p.name,
            strength: p.strength,
            form: p.form,
            mrp: p.mrp,
            tax_pct: p.tax_pct,
            stock_qty: p.stock_qty,
            reorder_level: p.reorder_level,
            batch_no: p.batch_no,
            expiry_date: p.expiry_date,
            manufacturer: p.manufacturer,
        }
    }
}

/// FFI-safe import summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiImportSummary {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub deleted: u64,
    pub kept_due_to_history: u64,
    pub duplicates: u64,
    pub total: u64,
    pub replaced_all: bool,
    pub message: String,
}

impl From<ImportSummary> for FfiImportSummary {
    fn from(s: ImportSummary) -> Self {
        Self {
            message: s.message(),
            created: s.created,
            updated: s.updated,
            skipped: s.skipped,
            deleted: s.deleted,
            kept_due_to_history: s.kept_due_to_history,
            duplicates: s.duplicates,
            total: s.total,
            replaced_all: s.replaced_all,
        }
    }
}

/// FFI-safe import preview.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiImportPreview {
    pub token: String,
    pub file_name: String,
    pub file_sha256: String,
    pub rows: Vec<FfiPayloadRow>,
    pub total: u64,
    pub replace_all: bool,
    pub planned: FfiImportSummary,
}

impl From<ImportPreview> for FfiImportPreview {
    fn from(p: ImportPreview) -> Self {
        Self {
            token: p.token,
            file_name: p.file_name,
            file_sha256: p.file_sha256,
            rows: p.rows.into_iter().map(|r| r.into()).collect(),
            total: p.total,
            replace_all: p.replace_all,
            planned: p.planned.into(),
        }
    }
}

/// FFI-safe import log record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiImportRecord {
    pub id: i64,
    pub file_name: String,
    pub file_sha256: String,
    pub summary: FfiImportSummary,
    pub applied_at: String,
}

impl From<ImportRecord> for FfiImportRecord {
    fn from(r: ImportRecord) -> Self {
        Self {
            id: r.id,
            file_name: r.file_name,
            file_sha256: r.file_sha256,
            summary: r.summary.into(),
            applied_at: r.applied_at,
        }
    }
}

/// FFI-safe dispense line request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDispenseLineInput {
    pub medicine_id: i64,
    pub qty: i64,
    pub unit_price: f64,
    pub discount_pct: f64,
    pub tax_pct: f64,
}

impl From<FfiDispenseLineInput> for DispenseLineInput {
    fn from(l: FfiDispenseLineInput) -> Self {
        DispenseLineInput {
            medicine_id: l.medicine_id,
            qty: l.qty,
            unit_price: l.unit_price,
            discount_pct: l.discount_pct,
            tax_pct: l.tax_pct,
        }
    }
}

/// FFI-safe dispense receipt.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDispenseReceipt {
    pub line_ids: Vec<i64>,
    pub total_amount: f64,
}

impl From<DispenseReceipt> for FfiDispenseReceipt {
    fn from(r: DispenseReceipt) -> Self {
        Self {
            line_ids: r.line_ids,
            total_amount: r.total_amount,
        }
    }
}
