//! Database layer for PharmaDesk.

mod schema;
mod medicines;
mod dispenses;
mod imports;

pub use schema::*;
pub use medicines::*;
#[allow(unused_imports)]
pub use dispenses::*;
#[allow(unused_imports)]
pub use imports::*;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Invalid dispense: {}", .0.join("; "))]
    InvalidDispense(Vec<String>),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction.
    pub fn transaction(&mut self) -> DbResult<rusqlite::Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"medicines".to_string()));
        assert!(tables.contains(&"dispense_lines".to_string()));
        assert!(tables.contains(&"import_log".to_string()));
    }

    #[test]
    fn test_open_file_reopens_existing_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pharmadesk.db");

        {
            let db = Database::open(&path).unwrap();
            db.insert_medicine(&crate::models::Medicine::new("Paracetamol".into()))
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_medicines().unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_dispense_message() {
        let err = DbError::InvalidDispense(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Invalid dispense: a; b");
    }
}
