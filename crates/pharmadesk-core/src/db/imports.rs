//! Import log database operations.

use rusqlite::{params, Connection};

use super::{Database, DbError, DbResult};
use crate::import::Reconciler;
use crate::models::{ImportRecord, ImportSummary, MedicinePayload};

/// Append an applied import to the log. Runs on whatever connection or
/// transaction the import itself used.
pub(crate) fn log_import(
    conn: &Connection,
    file_name: &str,
    file_sha256: &str,
    summary: &ImportSummary,
) -> DbResult<i64> {
    let summary_json = serde_json::to_string(summary)?;
    conn.execute(
        r#"
        INSERT INTO import_log (file_name, file_sha256, replaced_all, summary, applied_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            file_name,
            file_sha256,
            summary.replaced_all,
            summary_json,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    /// Reconcile the catalog with `rows` in a single transaction.
    ///
    /// Any store error rolls the whole batch back.
    pub fn reconcile(
        &mut self,
        rows: &[MedicinePayload],
        replace_all: bool,
    ) -> DbResult<ImportSummary> {
        let tx = self.conn.transaction()?;
        let summary = Reconciler::new(&*tx).reconcile(rows, replace_all)?;
        tx.commit()?;
        Ok(summary)
    }

    /// Reconcile and append the result to the import log, atomically.
    pub fn apply_import(
        &mut self,
        file_name: &str,
        file_sha256: &str,
        rows: &[MedicinePayload],
        replace_all: bool,
    ) -> DbResult<ImportSummary> {
        let tx = self.conn.transaction()?;
        let summary = Reconciler::new(&*tx).reconcile(rows, replace_all)?;
        let log_id = log_import(&tx, file_name, file_sha256, &summary)?;
        tx.commit()?;

        tracing::info!(
            log_id,
            file_name,
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            kept = summary.kept_due_to_history,
            skipped = summary.skipped,
            "Import applied"
        );
        Ok(summary)
    }

    /// Summary an import would produce. Read-only.
    pub fn dry_run(&self, rows: &[MedicinePayload], replace_all: bool) -> DbResult<ImportSummary> {
        Reconciler::new(&self.conn).dry_run(rows, replace_all)
    }

    /// Record an applied import.
    pub fn record_import(
        &self,
        file_name: &str,
        file_sha256: &str,
        summary: &ImportSummary,
    ) -> DbResult<i64> {
        log_import(&self.conn, file_name, file_sha256, summary)
    }

    /// Most recent imports first.
    pub fn recent_imports(&self, limit: usize) -> DbResult<Vec<ImportRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, file_name, file_sha256, summary, applied_at
            FROM import_log
            ORDER BY id DESC
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            Ok(ImportLogRow {
                id: row.get(0)?,
                file_name: row.get(1)?,
                file_sha256: row.get(2)?,
                summary: row.get(3)?,
                applied_at: row.get(4)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.try_into()?);
        }
        Ok(records)
    }
}

/// Intermediate row struct for database mapping.
struct ImportLogRow {
    id: i64,
    file_name: String,
    file_sha256: String,
    summary: String,
    applied_at: String,
}

impl TryFrom<ImportLogRow> for ImportRecord {
    type Error = DbError;

    fn try_from(row: ImportLogRow) -> Result<Self, Self::Error> {
        Ok(ImportRecord {
            id: row.id,
            file_name: row.file_name,
            file_sha256: row.file_sha256,
            summary: serde_json::from_str(&row.summary)?,
            applied_at: row.applied_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_list_imports() {
        let db = Database::open_in_memory().unwrap();

        let first = ImportSummary {
            created: 3,
            total: 3,
            ..Default::default()
        };
        let second = ImportSummary {
            updated: 3,
            total: 3,
            replaced_all: true,
            ..Default::default()
        };
        db.record_import("stock-jan.csv", "aa", &first).unwrap();
        db.record_import("stock-feb.csv", "bb", &second).unwrap();

        let records = db.recent_imports(10).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].file_name, "stock-feb.csv");
        assert_eq!(records[0].summary, second);
        assert_eq!(records[1].summary, first);

        assert_eq!(db.recent_imports(1).unwrap().len(), 1);
    }

    #[test]
    fn test_apply_import_logs_in_same_transaction() {
        let mut db = Database::open_in_memory().unwrap();
        let rows = vec![
            MedicinePayload::named("Paracetamol").with_stock(100),
            MedicinePayload::named("Ibuprofen").with_stock(50),
        ];

        let summary = db.apply_import("stock.csv", "cafe", &rows, false).unwrap();
        assert_eq!(summary.created, 2);

        let records = db.recent_imports(5).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_sha256, "cafe");
        assert_eq!(records[0].summary, summary);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let mut db = Database::open_in_memory().unwrap();
        db.reconcile(&[MedicinePayload::named("A"), MedicinePayload::named("B")], false)
            .unwrap();

        let planned = db.dry_run(&[MedicinePayload::named("a")], true).unwrap();
        assert_eq!(planned.updated, 1);
        assert_eq!(planned.deleted, 1);
        assert_eq!(db.list_medicines().unwrap().len(), 2);
        assert!(db.recent_imports(5).unwrap().is_empty());
    }
}
