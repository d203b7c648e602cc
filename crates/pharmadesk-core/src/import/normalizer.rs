//! Upload row normalizer.
//!
//! Handles:
//! - Header canonicalization ("Stock Qty" → stock_qty)
//! - Synonym lookup (qty/quantity/stock → stock_qty)
//! - Lenient numeric parsing (unparsable cells become zero)

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::MedicinePayload;

/// Raw header names accepted as the medicine name when no synonym resolved one.
const NAME_FALLBACK_KEYS: [&str; 3] = ["name", "medicine", "drugname"];

/// Canonical medicine fields an upload column can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportField {
    Name,
    Strength,
    Form,
    Mrp,
    TaxPct,
    StockQty,
    ReorderLevel,
    BatchNo,
    ExpiryDate,
    Manufacturer,
}

/// One decoded upload row: header/value pairs in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cell.
    pub fn push(&mut self, header: impl Into<String>, value: impl Into<String>) {
        self.cells.push((header.into(), value.into()));
    }

    /// Value under an exact header, if present.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }

    /// Cells in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(h, v)| (h.as_str(), v.as_str()))
    }

    /// True when every cell is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.trim().is_empty())
    }
}

impl<H: Into<String>, V: Into<String>> FromIterator<(H, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (H, V)>>(iter: I) -> Self {
        Self {
            cells: iter
                .into_iter()
                .map(|(h, v)| (h.into(), v.into()))
                .collect(),
        }
    }
}

impl From<HashMap<String, String>> for RawRow {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

/// Normalizer for upload rows.
pub struct RowNormalizer {
    /// Synonym map: canonical header → field
    synonyms: HashMap<String, ImportField>,
}

impl Default for RowNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl RowNormalizer {
    /// Create a new normalizer with the default synonym table.
    pub fn new() -> Self {
        Self {
            synonyms: Self::default_synonyms(),
        }
    }

    /// Normalize one raw row into a typed partial payload.
    ///
    /// Only fields found in the row are set. The name is always set and is
    /// empty when nothing resolved, which the reconciler treats as skipped.
    pub fn normalize(&self, row: &RawRow) -> MedicinePayload {
        let mut payload = MedicinePayload::default();

        for (header, value) in row.iter() {
            let Some(field) = self.field_for(header) else {
                continue;
            };
            let value = value.trim();
            match field {
                ImportField::Name => payload.name = value.to_string(),
                ImportField::Strength => payload.strength = Some(value.to_string()),
                ImportField::Form => payload.form = Some(value.to_string()),
                ImportField::Mrp => payload.mrp = Some(parse_price(value)),
                ImportField::TaxPct => payload.tax_pct = Some(parse_price(value)),
                ImportField::StockQty => payload.stock_qty = Some(parse_count(value)),
                ImportField::ReorderLevel => payload.reorder_level = Some(parse_count(value)),
                ImportField::BatchNo => payload.batch_no = Some(value.to_string()),
                ImportField::ExpiryDate => payload.expiry_date = Some(value.to_string()),
                ImportField::Manufacturer => payload.manufacturer = Some(value.to_string()),
            }
        }

        if payload.name.is_empty() {
            payload.name = NAME_FALLBACK_KEYS
                .iter()
                .filter_map(|key| row.get(key))
                .map(str::trim)
                .find(|v| !v.is_empty())
                .unwrap_or_default()
                .to_string();
        }

        payload
    }

    /// Normalize every non-blank row.
    pub fn normalize_all(&self, rows: &[RawRow]) -> Vec<MedicinePayload> {
        rows.iter()
            .filter(|row| !row.is_blank())
            .map(|row| self.normalize(row))
            .collect()
    }

    /// Resolve a raw header to a field.
    pub fn field_for(&self, header: &str) -> Option<ImportField> {
        self.synonyms.get(&canonical_header(header)).copied()
    }

    /// Add a custom header synonym.
    pub fn add_synonym(&mut self, header: &str, field: ImportField) {
        self.synonyms.insert(canonical_header(header), field);
    }

    /// Default header synonyms.
    fn default_synonyms() -> HashMap<String, ImportField> {
        let mut map = HashMap::new();

        // Identity
        map.insert("name".into(), ImportField::Name);
        map.insert("medicine".into(), ImportField::Name);
        map.insert("drugname".into(), ImportField::Name);
        map.insert("strength".into(), ImportField::Strength);
        map.insert("form".into(), ImportField::Form);

        // Commercials
        map.insert("mrp".into(), ImportField::Mrp);
        map.insert("price".into(), ImportField::Mrp);
        map.insert("cost".into(), ImportField::Mrp);
        map.insert("tax".into(), ImportField::TaxPct);
        map.insert("tax_pct".into(), ImportField::TaxPct);

        // Stock
        map.insert("qty".into(), ImportField::StockQty);
        map.insert("quantity".into(), ImportField::StockQty);
        map.insert("stock".into(), ImportField::StockQty);
        map.insert("stock_qty".into(), ImportField::StockQty);

        // Reorder
        map.insert("reorder".into(), ImportField::ReorderLevel);
        map.insert("reorder_level".into(), ImportField::ReorderLevel);
        map.insert("reorder_lev".into(), ImportField::ReorderLevel);

        // Batch/expiry
        map.insert("batch".into(), ImportField::BatchNo);
        map.insert("batch_no".into(), ImportField::BatchNo);
        map.insert("expiry".into(), ImportField::ExpiryDate);
        map.insert("expiry_date".into(), ImportField::ExpiryDate);

        map.insert("manufacturer".into(), ImportField::Manufacturer);

        map
    }
}

/// Canonical form of a header: trimmed, lower-case, with runs of
/// whitespace or `-` collapsed to `_`.
pub fn canonical_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Parse a price or percentage cell. Empty, unparsable and non-finite
/// input all become `0.0`.
pub fn parse_price(value: &str) -> f64 {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Parse a count cell, truncating any fraction ("12.7" → 12). Empty,
/// unparsable and non-finite input all become `0`.
pub fn parse_count(value: &str) -> i64 {
    let trimmed = value.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return v;
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.trunc() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, &str)]) -> RawRow {
        cells.iter().copied().collect()
    }

    #[test]
    fn test_synonyms_map_to_fields() {
        let normalizer = RowNormalizer::new();
        let payload = normalizer.normalize(&row(&[
            ("Medicine", " Paracetamol "),
            ("Qty", "100"),
            ("Price", "2.50"),
            ("Tax", "12"),
            ("Reorder_Lev", "10"),
            ("Batch", "B-1"),
            ("Expiry", "2027-01"),
        ]));

        assert_eq!(payload.name, "Paracetamol");
        assert_eq!(payload.stock_qty, Some(100));
        assert_eq!(payload.mrp, Some(2.5));
        assert_eq!(payload.tax_pct, Some(12.0));
        assert_eq!(payload.reorder_level, Some(10));
        assert_eq!(payload.batch_no.as_deref(), Some("B-1"));
        assert_eq!(payload.expiry_date.as_deref(), Some("2027-01"));
        // Absent columns stay unset
        assert_eq!(payload.strength, None);
        assert_eq!(payload.form, None);
    }

    #[test]
    fn test_header_spacing_insensitive() {
        let normalizer = RowNormalizer::new();
        assert_eq!(normalizer.field_for("  STOCK  QTY "), Some(ImportField::StockQty));
        assert_eq!(normalizer.field_for("Reorder-Level"), Some(ImportField::ReorderLevel));
        assert_eq!(normalizer.field_for("Expiry Date"), Some(ImportField::ExpiryDate));
    }

    #[test]
    fn test_unknown_headers_ignored() {
        let normalizer = RowNormalizer::new();
        let payload = normalizer.normalize(&row(&[("name", "ORS"), ("shelf", "A3")]));
        assert_eq!(payload, MedicinePayload::named("ORS"));
    }

    #[test]
    fn test_unparsable_numbers_default_to_zero() {
        let normalizer = RowNormalizer::new();
        let payload = normalizer.normalize(&row(&[
            ("name", "Zinc"),
            ("mrp", "abc"),
            ("tax_pct", ""),
            ("stock", "12.9"),
            ("reorder", "n/a"),
        ]));

        assert_eq!(payload.mrp, Some(0.0));
        assert_eq!(payload.tax_pct, Some(0.0));
        assert_eq!(payload.stock_qty, Some(12));
        assert_eq!(payload.reorder_level, Some(0));
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("3.75"), 3.75);
        assert_eq!(parse_price(" 10 "), 10.0);
        assert_eq!(parse_price(""), 0.0);
        assert_eq!(parse_price("₹10"), 0.0);
        assert_eq!(parse_price("inf"), 0.0);
        assert_eq!(parse_price("NaN"), 0.0);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("42"), 42);
        assert_eq!(parse_count("7.99"), 7);
        assert_eq!(parse_count("-3.5"), -3);
        assert_eq!(parse_count("1e3"), 1000);
        assert_eq!(parse_count(""), 0);
        assert_eq!(parse_count("ten"), 0);
    }

    #[test]
    fn test_name_fallback_to_raw_keys() {
        let normalizer = RowNormalizer::new();

        // Synonym resolves an empty name, raw key supplies one
        let payload = normalizer.normalize(&row(&[("Name", ""), ("drugname", "Cetirizine")]));
        assert_eq!(payload.name, "Cetirizine");

        let payload = normalizer.normalize(&row(&[("qty", "10")]));
        assert_eq!(payload.name, "");
        assert_eq!(payload.stock_qty, Some(10));
    }

    #[test]
    fn test_later_column_wins() {
        let normalizer = RowNormalizer::new();
        let payload = normalizer.normalize(&row(&[("name", "ORS"), ("qty", "5"), ("stock", "9")]));
        assert_eq!(payload.stock_qty, Some(9));
    }

    #[test]
    fn test_normalize_all_drops_blank_rows() {
        let normalizer = RowNormalizer::new();
        let rows = vec![
            row(&[("name", "ORS"), ("qty", "1")]),
            row(&[("name", "  "), ("qty", "")]),
            row(&[("name", ""), ("qty", "10")]),
        ];
        let payloads = normalizer.normalize_all(&rows);
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[1].name, "");
    }

    #[test]
    fn test_custom_synonym() {
        let mut normalizer = RowNormalizer::new();
        normalizer.add_synonym("Company", ImportField::Manufacturer);
        let payload = normalizer.normalize(&row(&[("name", "ORS"), ("company", "Cipla")]));
        assert_eq!(payload.manufacturer.as_deref(), Some("Cipla"));
    }
}
