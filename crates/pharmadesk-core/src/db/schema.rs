//! SQLite schema definition.

/// Complete database schema for PharmaDesk.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Medicine Catalog
-- ============================================================================

CREATE TABLE IF NOT EXISTS medicines (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    strength TEXT,
    form TEXT,
    mrp REAL NOT NULL DEFAULT 0.0 CHECK (mrp >= 0),
    tax_pct REAL NOT NULL DEFAULT 0.0 CHECK (tax_pct >= 0),
    stock_qty INTEGER NOT NULL DEFAULT 0 CHECK (stock_qty >= 0),
    reorder_level INTEGER NOT NULL DEFAULT 0 CHECK (reorder_level >= 0),
    batch_no TEXT,
    expiry_date TEXT,
    manufacturer TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Case-insensitive name lookups (import matching, sorting)
CREATE INDEX IF NOT EXISTS idx_medicines_name_lower ON medicines(lower(name));

-- FTS5 virtual table for name search
CREATE VIRTUAL TABLE IF NOT EXISTS medicines_fts USING fts5(
    name,
    manufacturer,
    content='medicines',
    content_rowid='id'
);

-- Triggers to keep FTS5 in sync with main table
CREATE TRIGGER IF NOT EXISTS medicines_ai AFTER INSERT ON medicines BEGIN
    INSERT INTO medicines_fts(rowid, name, manufacturer)
    VALUES (new.id, new.name, new.manufacturer);
END;

CREATE TRIGGER IF NOT EXISTS medicines_ad AFTER DELETE ON medicines BEGIN
    INSERT INTO medicines_fts(medicines_fts, rowid, name, manufacturer)
    VALUES ('delete', old.id, old.name, old.manufacturer);
END;

CREATE TRIGGER IF NOT EXISTS medicines_au AFTER UPDATE ON medicines BEGIN
    INSERT INTO medicines_fts(medicines_fts, rowid, name, manufacturer)
    VALUES ('delete', old.id, old.name, old.manufacturer);
    INSERT INTO medicines_fts(rowid, name, manufacturer)
    VALUES (new.id, new.name, new.manufacturer);
END;

-- ============================================================================
-- Dispense History (Append-Only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS dispense_lines (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    medicine_id INTEGER REFERENCES medicines(id),
    qty INTEGER NOT NULL DEFAULT 0,
    unit_price REAL NOT NULL DEFAULT 0.0,
    discount_pct REAL NOT NULL DEFAULT 0.0,
    tax_pct REAL NOT NULL DEFAULT 0.0,
    total_amount REAL NOT NULL DEFAULT 0.0,
    pharmacist TEXT NOT NULL DEFAULT 'pharmadesk',
    payment_mode TEXT NOT NULL DEFAULT 'cash',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_dispense_medicine ON dispense_lines(medicine_id);

CREATE TRIGGER IF NOT EXISTS dispense_lines_no_update BEFORE UPDATE ON dispense_lines
BEGIN
    SELECT RAISE(ABORT, 'Dispense lines are immutable');
END;

-- ============================================================================
-- Import Log
-- ============================================================================

CREATE TABLE IF NOT EXISTS import_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_name TEXT NOT NULL,
    file_sha256 TEXT NOT NULL,
    replaced_all INTEGER NOT NULL DEFAULT 0,
    summary TEXT NOT NULL,                       -- JSON ImportSummary
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_import_log_applied ON import_log(applied_at);
"#;
