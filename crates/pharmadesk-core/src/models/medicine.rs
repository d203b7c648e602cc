//! Medicine catalog models.

use serde::{Deserialize, Serialize};

/// A single entry in the pharmacy medicine catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medicine {
    /// Store-assigned identifier (0 until inserted)
    pub id: i64,
    /// Display name, matched case-insensitively on import
    pub name: String,
    /// Strength (e.g., "500mg")
    pub strength: Option<String>,
    /// Dosage form (e.g., "tablet", "syrup")
    pub form: Option<String>,
    /// Unit price (maximum retail price)
    pub mrp: f64,
    /// Tax percentage applied at sale
    pub tax_pct: f64,
    /// Units on hand
    pub stock_qty: i64,
    /// Stock level at or below which the item needs reordering
    pub reorder_level: i64,
    pub batch_no: Option<String>,
    pub expiry_date: Option<String>,
    pub manufacturer: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

/// Typed partial update for a medicine.
///
/// Only fields that were present in the source row are `Some`. Applying a
/// payload overwrites exactly those fields and nothing else.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MedicinePayload {
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

impl MedicinePayload {
    /// Create a payload carrying only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder-style stock quantity setter.
    pub fn with_stock(mut self, qty: i64) -> Self {
        self.stock_qty = Some(qty);
        self
    }

    /// Builder-style price setter.
    pub fn with_mrp(mut self, mrp: f64) -> Self {
        self.mrp = Some(mrp);
        self
    }

    /// Lower-cased, trimmed name used as the reconciliation key.
    pub fn match_key(&self) -> String {
        match_key(&self.name)
    }
}

/// Reconciliation key for a display name.
pub fn match_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl Medicine {
    /// Create a new medicine with required fields.
    pub fn new(name: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: 0,
            name,
            strength: None,
            form: None,
            mrp: 0.0,
            tax_pct: 0.0,
            stock_qty: 0,
            reorder_level: 0,
            batch_no: None,
            expiry_date: None,
            manufacturer: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Build a new catalog entry from an import payload.
    pub fn from_payload(payload: &MedicinePayload) -> Self {
        let mut medicine = Self::new(payload.name.trim().to_string());
        medicine.apply_payload(payload);
        medicine
    }

    /// Overwrite the fields present in `payload`.
    ///
    /// Counts are clamped at zero, prices at zero for negative or
    /// non-finite input. An empty text value clears the column.
    pub fn apply_payload(&mut self, payload: &MedicinePayload) {
        if let Some(v) = &payload.strength {
            self.strength = non_empty(v);
        }
        if let Some(v) = &payload.form {
            self.form = non_empty(v);
        }
        if let Some(v) = payload.mrp {
            self.mrp = clamp_amount(v);
        }
        if let Some(v) = payload.tax_pct {
            self.tax_pct = clamp_amount(v);
        }
        if let Some(v) = payload.stock_qty {
            self.stock_qty = v.max(0);
        }
        if let Some(v) = payload.reorder_level {
            self.reorder_level = v.max(0);
        }
        if let Some(v) = &payload.batch_no {
            self.batch_no = non_empty(v);
        }
        if let Some(v) = &payload.expiry_date {
            self.expiry_date = non_empty(v);
        }
        if let Some(v) = &payload.manufacturer {
            self.manufacturer = non_empty(v);
        }
    }

    /// Readable label for pickers and printouts ("Paracetamol 500mg tablet").
    pub fn label(&self) -> String {
        [
            Some(self.name.as_str()),
            self.strength.as_deref(),
            self.form.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// True when stock is at or below the reorder level.
    pub fn is_low_stock(&self) -> bool {
        self.stock_qty <= self.reorder_level
    }

    /// Approximate value of stock on hand.
    pub fn inventory_value(&self) -> f64 {
        self.mrp * self.stock_qty as f64
    }

    /// Reconciliation key.
    pub fn match_key(&self) -> String {
        match_key(&self.name)
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn clamp_amount(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_payload_only_touches_present_fields() {
        let mut med = Medicine::new("Paracetamol".into());
        med.strength = Some("500mg".into());
        med.mrp = 12.5;
        med.stock_qty = 40;

        let payload = MedicinePayload::named("paracetamol").with_stock(100);
        med.apply_payload(&payload);

        assert_eq!(med.stock_qty, 100);
        assert_eq!(med.strength.as_deref(), Some("500mg"));
        assert_eq!(med.mrp, 12.5);
        // Name is the match key, not an updatable field
        assert_eq!(med.name, "Paracetamol");
    }

    #[test]
    fn test_negative_counts_clamp_to_zero() {
        let mut med = Medicine::new("Ibuprofen".into());
        let payload = MedicinePayload {
            stock_qty: Some(-5),
            reorder_level: Some(-1),
            mrp: Some(-3.0),
            tax_pct: Some(f64::NAN),
            ..MedicinePayload::named("Ibuprofen")
        };
        med.apply_payload(&payload);

        assert_eq!(med.stock_qty, 0);
        assert_eq!(med.reorder_level, 0);
        assert_eq!(med.mrp, 0.0);
        assert_eq!(med.tax_pct, 0.0);
    }

    #[test]
    fn test_empty_text_clears_field() {
        let mut med = Medicine::new("Cetirizine".into());
        med.batch_no = Some("B-77".into());

        let payload = MedicinePayload {
            batch_no: Some("  ".into()),
            ..MedicinePayload::named("Cetirizine")
        };
        med.apply_payload(&payload);
        assert_eq!(med.batch_no, None);
    }

    #[test]
    fn test_label() {
        let mut med = Medicine::new("Amoxicillin".into());
        assert_eq!(med.label(), "Amoxicillin");

        med.strength = Some("250mg".into());
        med.form = Some("capsule".into());
        assert_eq!(med.label(), "Amoxicillin 250mg capsule");
    }

    #[test]
    fn test_low_stock_and_value() {
        let mut med = Medicine::new("ORS".into());
        med.stock_qty = 5;
        med.reorder_level = 5;
        med.mrp = 20.0;

        assert!(med.is_low_stock());
        assert_eq!(med.inventory_value(), 100.0);

        med.stock_qty = 6;
        assert!(!med.is_low_stock());
    }

    #[test]
    fn test_match_key_trims_and_lowercases() {
        assert_eq!(match_key("  PARACETAMOL "), "paracetamol");
        assert_eq!(MedicinePayload::named("Aspirin").match_key(), "aspirin");
    }
}
