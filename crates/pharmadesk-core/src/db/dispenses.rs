//! Dispense history database operations.

use rusqlite::{params, OptionalExtension};

use super::medicines::{medicine_from_row, MEDICINE_COLUMNS};
use super::{Database, DbError, DbResult};
use crate::models::{round_money, DispenseLine, DispenseReceipt, DispenseRequest};

impl Database {
    /// Record a sale: validate every line, decrement stock, append history.
    ///
    /// All lines are validated before anything is written; any problem
    /// rejects the whole request with [`DbError::InvalidDispense`].
    pub fn record_dispense(&mut self, request: &DispenseRequest) -> DbResult<DispenseReceipt> {
        if request.lines.is_empty() {
            return Err(DbError::InvalidDispense(vec!["No items to dispense".into()]));
        }

        let pharmacist = request.pharmacist();
        let payment_mode = request.payment_mode();
        let tx = self.conn.transaction()?;

        let mut problems = Vec::new();
        for line in &request.lines {
            let medicine = tx
                .query_row(
                    &format!("SELECT {MEDICINE_COLUMNS} FROM medicines WHERE id = ?"),
                    [line.medicine_id],
                    medicine_from_row,
                )
                .optional()?;

            let Some(medicine) = medicine else {
                problems.push(format!("Unknown medicine id {}", line.medicine_id));
                continue;
            };
            if line.qty <= 0 {
                problems.push(format!("{}: qty must be > 0", medicine.name));
                continue;
            }
            if line.qty > medicine.stock_qty {
                problems.push(format!(
                    "{}: qty {} exceeds stock {}",
                    medicine.name, line.qty, medicine.stock_qty
                ));
            }
        }

        if !problems.is_empty() {
            tracing::warn!(problems = problems.len(), "Dispense rejected");
            return Err(DbError::InvalidDispense(problems));
        }

        let now = chrono::Utc::now().to_rfc3339();
        let mut line_ids = Vec::with_capacity(request.lines.len());
        let mut total_amount = 0.0;

        for line in &request.lines {
            // Re-read so repeated lines for one medicine see earlier decrements
            let current: i64 = tx.query_row(
                "SELECT stock_qty FROM medicines WHERE id = ?",
                [line.medicine_id],
                |row| row.get(0),
            )?;
            tx.execute(
                "UPDATE medicines SET stock_qty = ?2, updated_at = ?3 WHERE id = ?1",
                params![line.medicine_id, (current - line.qty).max(0), now],
            )?;

            let line_total = round_money(line.total());
            tx.execute(
                r#"
                INSERT INTO dispense_lines (
                    medicine_id, qty, unit_price, discount_pct, tax_pct,
                    total_amount, pharmacist, payment_mode, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    line.medicine_id,
                    line.qty,
                    line.unit_price,
                    line.discount_pct,
                    line.tax_pct,
                    line_total,
                    pharmacist,
                    payment_mode,
                    now,
                ],
            )?;
            line_ids.push(tx.last_insert_rowid());
            total_amount += line.total();
        }

        tx.commit()?;

        let receipt = DispenseReceipt {
            line_ids,
            total_amount: round_money(total_amount),
        };
        tracing::info!(
            lines = receipt.line_ids.len(),
            total = receipt.total_amount,
            "Dispense recorded"
        );
        Ok(receipt)
    }

    /// All dispense lines for a medicine, oldest first.
    pub fn dispense_lines_for(&self, medicine_id: i64) -> DbResult<Vec<DispenseLine>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, medicine_id, qty, unit_price, discount_pct, tax_pct,
                   total_amount, pharmacist, payment_mode, created_at
            FROM dispense_lines
            WHERE medicine_id = ?
            ORDER BY id
            "#,
        )?;

        let rows = stmt.query_map([medicine_id], |row| {
            Ok(DispenseLine {
                id: row.get(0)?,
                medicine_id: row.get(1)?,
                qty: row.get(2)?,
                unit_price: row.get(3)?,
                discount_pct: row.get(4)?,
                tax_pct: row.get(5)?,
                total_amount: row.get(6)?,
                pharmacist: row.get(7)?,
                payment_mode: row.get(8)?,
                created_at: row.get(9)?,
            })
        })?;

        let mut lines = Vec::new();
        for row in rows {
            lines.push(row?);
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DispenseLineInput, Medicine};

    fn setup_db() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let mut med = Medicine::new("Paracetamol".into());
        med.stock_qty = 10;
        med.mrp = 2.0;
        let id = db.insert_medicine(&med).unwrap();
        (db, id)
    }

    fn line(medicine_id: i64, qty: i64) -> DispenseLineInput {
        DispenseLineInput {
            medicine_id,
            qty,
            unit_price: 2.0,
            discount_pct: 0.0,
            tax_pct: 5.0,
        }
    }

    #[test]
    fn test_record_dispense_decrements_stock() {
        let (mut db, id) = setup_db();

        let receipt = db
            .record_dispense(&DispenseRequest::new(vec![line(id, 4)]))
            .unwrap();

        assert_eq!(receipt.line_ids.len(), 1);
        assert_eq!(receipt.total_amount, 8.4);
        assert_eq!(db.get_medicine(id).unwrap().unwrap().stock_qty, 6);

        let history = db.dispense_lines_for(id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].medicine_id, Some(id));
        assert_eq!(history[0].payment_mode, "cash");
    }

    #[test]
    fn test_record_dispense_rejects_over_stock() {
        let (mut db, id) = setup_db();

        let err = db
            .record_dispense(&DispenseRequest::new(vec![line(id, 11)]))
            .unwrap_err();
        match err {
            DbError::InvalidDispense(problems) => {
                assert_eq!(problems, vec!["Paracetamol: qty 11 exceeds stock 10"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Nothing written
        assert_eq!(db.get_medicine(id).unwrap().unwrap().stock_qty, 10);
        assert!(db.dispense_lines_for(id).unwrap().is_empty());
    }

    #[test]
    fn test_record_dispense_rejects_unknown_and_zero() {
        let (mut db, id) = setup_db();

        let err = db
            .record_dispense(&DispenseRequest::new(vec![line(999, 1), line(id, 0)]))
            .unwrap_err();
        match err {
            DbError::InvalidDispense(problems) => assert_eq!(problems.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_record_dispense_empty_request() {
        let (mut db, _) = setup_db();
        assert!(db.record_dispense(&DispenseRequest::new(vec![])).is_err());
    }

    #[test]
    fn test_repeated_lines_clamp_at_zero() {
        let (mut db, id) = setup_db();

        // Each line alone fits the stock; together they overrun it
        db.record_dispense(&DispenseRequest::new(vec![line(id, 8), line(id, 8)]))
            .unwrap();

        assert_eq!(db.get_medicine(id).unwrap().unwrap().stock_qty, 0);
        assert_eq!(db.dispense_lines_for(id).unwrap().len(), 2);
    }
}
