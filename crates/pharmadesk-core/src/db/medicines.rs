//! Medicine catalog database operations.

use std::collections::HashSet;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use chrono::{DateTime, Utc};

use super::{Database, DbResult};
use crate::models::{match_key, CatalogOverview, Medicine, MedicinePage, StockEntry};

/// SQLite caps bound parameters per statement; stay well under it.
const ID_CHUNK: usize = 500;

/// Largest inventory page size.
const MAX_PAGE_SIZE: usize = 100;

pub(crate) const MEDICINE_COLUMNS: &str = "id, name, strength, form, mrp, tax_pct, stock_qty, reorder_level, \
     batch_no, expiry_date, manufacturer, created_at, updated_at";

/// Store operations the import reconciler needs.
///
/// Implemented for [`Connection`], so a `rusqlite::Transaction` (which
/// derefs to one) can be passed to keep a whole import atomic.
pub trait CatalogStore {
    /// Full catalog scan, ordered by id.
    fn load_catalog(&self) -> DbResult<Vec<Medicine>>;

    /// Which of `ids` are referenced by at least one dispense line.
    fn referenced_medicine_ids(&self, ids: &[i64]) -> DbResult<HashSet<i64>>;

    /// Insert a new entry, returning its id. `medicine.id` is ignored.
    fn insert_medicine(&self, medicine: &Medicine) -> DbResult<i64>;

    /// Write every updatable column of an existing entry.
    fn update_medicine(&self, medicine: &Medicine) -> DbResult<bool>;

    /// Delete by id. Deleting an absent row is a no-op returning false.
    fn delete_medicine(&self, id: i64) -> DbResult<bool>;
}

impl CatalogStore for Connection {
    fn load_catalog(&self) -> DbResult<Vec<Medicine>> {
        let mut stmt = self.prepare(&format!(
            "SELECT {MEDICINE_COLUMNS} FROM medicines ORDER BY id"
        ))?;
        let rows = stmt.query_map([], medicine_from_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    fn referenced_medicine_ids(&self, ids: &[i64]) -> DbResult<HashSet<i64>> {
        let mut referenced = HashSet::new();
        for chunk in ids.chunks(ID_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT DISTINCT medicine_id FROM dispense_lines WHERE medicine_id IN ({placeholders})"
            );
            let mut stmt = self.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| row.get::<_, i64>(0))?;
            for row in rows {
                referenced.insert(row?);
            }
        }
        Ok(referenced)
    }

    fn insert_medicine(&self, medicine: &Medicine) -> DbResult<i64> {
        self.execute(
            r#"
            INSERT INTO medicines (
                name, strength, form, mrp, tax_pct, stock_qty, reorder_level,
                batch_no, expiry_date, manufacturer, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                medicine.name,
                medicine.strength,
                medicine.form,
                medicine.mrp,
                medicine.tax_pct,
                medicine.stock_qty.max(0),
                medicine.reorder_level.max(0),
                medicine.batch_no,
                medicine.expiry_date,
                medicine.manufacturer,
                medicine.created_at,
                medicine.updated_at,
            ],
        )?;
        Ok(self.last_insert_rowid())
    }

    fn update_medicine(&self, medicine: &Medicine) -> DbResult<bool> {
        let rows_affected = self.execute(
            r#"
            UPDATE medicines SET
                name = ?2,
                strength = ?3,
                form = ?4,
                mrp = ?5,
                tax_pct = ?6,
                stock_qty = ?7,
                reorder_level = ?8,
                batch_no = ?9,
                expiry_date = ?10,
                manufacturer = ?11,
                updated_at = ?12
            WHERE id = ?1
            "#,
            params![
                medicine.id,
                medicine.name,
                medicine.strength,
                medicine.form,
                medicine.mrp,
                medicine.tax_pct,
                medicine.stock_qty.max(0),
                medicine.reorder_level.max(0),
                medicine.batch_no,
                medicine.expiry_date,
                medicine.manufacturer,
                medicine.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    fn delete_medicine(&self, id: i64) -> DbResult<bool> {
        let rows_affected = self.execute("DELETE FROM medicines WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

impl Database {
    /// Insert a medicine, returning its new id.
    pub fn insert_medicine(&self, medicine: &Medicine) -> DbResult<i64> {
        self.conn.insert_medicine(medicine)
    }

    /// Update an existing medicine.
    pub fn update_medicine(&self, medicine: &Medicine) -> DbResult<bool> {
        self.conn.update_medicine(medicine)
    }

    /// Delete a medicine.
    pub fn delete_medicine(&self, id: i64) -> DbResult<bool> {
        self.conn.delete_medicine(id)
    }

    /// All medicines, ordered by id.
    pub fn list_medicines(&self) -> DbResult<Vec<Medicine>> {
        self.conn.load_catalog()
    }

    /// Which of `ids` appear in dispense history.
    pub fn referenced_medicine_ids(&self, ids: &[i64]) -> DbResult<HashSet<i64>> {
        self.conn.referenced_medicine_ids(ids)
    }

    /// Get a medicine by id.
    pub fn get_medicine(&self, id: i64) -> DbResult<Option<Medicine>> {
        let medicine = self
            .conn
            .query_row(
                &format!("SELECT {MEDICINE_COLUMNS} FROM medicines WHERE id = ?"),
                [id],
                medicine_from_row,
            )
            .optional()?;
        Ok(medicine)
    }

    /// Find a medicine by its reconciliation key (trimmed, Unicode
    /// lower-cased name).
    ///
    /// When the catalog holds several entries with the same key, the most
    /// recently inserted one is returned (the one an import would match).
    pub fn find_medicine_by_name(&self, name: &str) -> DbResult<Option<Medicine>> {
        let key = match_key(name);
        let medicine = self
            .conn
            .load_catalog()?
            .into_iter()
            .filter(|m| m.match_key() == key)
            .max_by_key(|m| m.id);
        Ok(medicine)
    }

    /// Search medicines whose name contains `query` anywhere (case
    /// insensitive), highest stock first.
    ///
    /// An empty query lists the whole catalog in the same order.
    pub fn search_medicines(&self, query: &str, limit: usize) -> DbResult<Vec<Medicine>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEDICINE_COLUMNS} FROM medicines \
             WHERE lower(name) LIKE lower(?1) ESCAPE '\\' \
             ORDER BY stock_qty DESC, lower(name) ASC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(
            params![contains_pattern(query), limit as i64],
            medicine_from_row,
        )?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    /// Word-prefix search over name and manufacturer (FTS5), highest
    /// stock first. Every query word must prefix some indexed word.
    pub fn search_medicines_by_word(&self, query: &str, limit: usize) -> DbResult<Vec<Medicine>> {
        let fts_query = escape_fts_query(query);
        if fts_query.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT m.id, m.name, m.strength, m.form, m.mrp, m.tax_pct, m.stock_qty,
                   m.reorder_level, m.batch_no, m.expiry_date, m.manufacturer,
                   m.created_at, m.updated_at
            FROM medicines m
            JOIN medicines_fts fts ON m.id = fts.rowid
            WHERE medicines_fts MATCH ?
            ORDER BY m.stock_qty DESC, lower(m.name) ASC
            LIMIT ?
            "#,
        )?;
        let rows = stmt.query_map(params![fts_query, limit as i64], medicine_from_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    /// One page of the inventory, ordered by name, optionally filtered by a
    /// name substring.
    ///
    /// `page` is 1-based and clamped into range; `per_page` is clamped to
    /// 1..=100.
    pub fn list_medicines_page(
        &self,
        query: &str,
        page: usize,
        per_page: usize,
    ) -> DbResult<MedicinePage> {
        let pattern = contains_pattern(query);
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE);

        let total: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM medicines WHERE lower(name) LIKE lower(?1) ESCAPE '\\'",
            [&pattern],
            |row| row.get(0),
        )?;
        let total = total as usize;
        let total_pages = total.div_ceil(per_page).max(1);
        let page = page.clamp(1, total_pages);
        let offset = (page - 1) * per_page;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEDICINE_COLUMNS} FROM medicines \
             WHERE lower(name) LIKE lower(?1) ESCAPE '\\' \
             ORDER BY lower(name) ASC, id ASC LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt.query_map(
            params![pattern, per_page as i64, offset as i64],
            medicine_from_row,
        )?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }

        Ok(MedicinePage {
            items,
            total: total as u64,
            page: page as u64,
            per_page: per_page as u64,
            total_pages: total_pages as u64,
        })
    }

    /// Medicines with stock at or below `threshold`, lowest first.
    pub fn low_stock_medicines(&self, threshold: i64, limit: usize) -> DbResult<Vec<Medicine>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEDICINE_COLUMNS} FROM medicines WHERE stock_qty <= ? \
             ORDER BY stock_qty ASC, lower(name) ASC LIMIT ?"
        ))?;
        let rows = stmt.query_map(params![threshold, limit as i64], medicine_from_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    /// Estimated value of all stock on hand (`sum(mrp * stock_qty)`).
    pub fn inventory_value(&self) -> DbResult<f64> {
        let value: f64 = self.conn.query_row(
            "SELECT COALESCE(SUM(stock_qty * mrp), 0.0) FROM medicines",
            [],
            |row| row.get(0),
        )?;
        Ok(value)
    }

    /// Dashboard overview: counts plus top stock and top dispensed lists.
    pub fn overview(&self) -> DbResult<CatalogOverview> {
        let medicine_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM medicines", [], |row| row.get(0))?;
        let dispense_line_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM dispense_lines", [], |row| row.get(0))?;

        let mut stmt = self.conn.prepare(
            "SELECT name, stock_qty FROM medicines ORDER BY stock_qty DESC, lower(name) ASC LIMIT 5",
        )?;
        let top_stock = stmt
            .query_map([], stock_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let top_dispensed = self.top_dispensed(None, 5)?;

        Ok(CatalogOverview {
            medicine_count: medicine_count as u64,
            dispense_line_count: dispense_line_count as u64,
            top_stock,
            top_dispensed,
        })
    }

    /// Most units dispensed per medicine, optionally only counting lines
    /// recorded at or after `since`.
    pub fn top_dispensed(
        &self,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> DbResult<Vec<StockEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT m.name, SUM(d.qty) AS qty
            FROM dispense_lines d
            JOIN medicines m ON m.id = d.medicine_id
            WHERE ?1 IS NULL OR julianday(d.created_at) >= julianday(?1)
            GROUP BY m.id
            ORDER BY qty DESC, lower(m.name) ASC
            LIMIT ?2
            "#,
        )?;
        let since = since.map(|t| t.to_rfc3339());
        let entries = stmt
            .query_map(params![since, limit as i64], stock_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

pub(crate) fn medicine_from_row(row: &Row<'_>) -> rusqlite::Result<Medicine> {
    Ok(Medicine {
        id: row.get(0)?,
        name: row.get(1)?,
        strength: row.get(2)?,
        form: row.get(3)?,
        mrp: row.get(4)?,
        tax_pct: row.get(5)?,
        stock_qty: row.get(6)?,
        reorder_level: row.get(7)?,
        batch_no: row.get(8)?,
        expiry_date: row.get(9)?,
        manufacturer: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn stock_entry_from_row(row: &Row<'_>) -> rusqlite::Result<StockEntry> {
    Ok(StockEntry {
        name: row.get(0)?,
        qty: row.get(1)?,
    })
}

/// Build an FTS5 prefix query: punctuation dropped, each remaining word
/// quoted as a string so `AND`/`OR`/`NOT`/`NEAR` are matched literally.
fn escape_fts_query(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .map(|word| format!("\"{}\"*", word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `LIKE` pattern matching `query` anywhere, with `%`, `_` and `\` escaped.
/// An empty query matches everything.
fn contains_pattern(query: &str) -> String {
    let mut pattern = String::from("%");
    for c in query.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    if pattern.len() > 1 {
        pattern.push('%');
    }
    pattern
}
