//! Dispense (sale) history models.

use serde::{Deserialize, Serialize};

/// A recorded sale line. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispenseLine {
    pub id: i64,
    /// Medicine sold (None for lines not tied to a catalog entry)
    pub medicine_id: Option<i64>,
    pub qty: i64,
    pub unit_price: f64,
    pub discount_pct: f64,
    pub tax_pct: f64,
    /// Line total after discount and tax, rounded to 2 decimals
    pub total_amount: f64,
    pub pharmacist: String,
    pub payment_mode: String,
    pub created_at: String,
}

/// One requested line of a dispense.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispenseLineInput {
    pub medicine_id: i64,
    pub qty: i64,
    pub unit_price: f64,
    #[serde(default)]
    pub discount_pct: f64,
    #[serde(default)]
    pub tax_pct: f64,
}

impl DispenseLineInput {
    /// Line total: `unit * qty`, less discount, plus tax.
    pub fn total(&self) -> f64 {
        let subtotal = self.unit_price * self.qty as f64;
        let after_discount = subtotal * (1.0 - self.discount_pct / 100.0);
        after_discount * (1.0 + self.tax_pct / 100.0)
    }
}

/// A bill to record: one or more lines sold together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispenseRequest {
    pub lines: Vec<DispenseLineInput>,
    pub pharmacist: String,
    pub payment_mode: String,
}

impl DispenseRequest {
    /// Create a request with default pharmacist and cash payment.
    pub fn new(lines: Vec<DispenseLineInput>) -> Self {
        Self {
            lines,
            pharmacist: "pharmadesk".into(),
            payment_mode: "cash".into(),
        }
    }

    /// Pharmacist name, falling back to "pharmadesk" when blank.
    pub fn pharmacist(&self) -> String {
        let trimmed = self.pharmacist.trim();
        if trimmed.is_empty() {
            "pharmadesk".into()
        } else {
            trimmed.to_string()
        }
    }

    /// Lower-cased payment mode, falling back to "cash" when blank.
    pub fn payment_mode(&self) -> String {
        let trimmed = self.payment_mode.trim();
        if trimmed.is_empty() {
            "cash".into()
        } else {
            trimmed.to_lowercase()
        }
    }
}

/// Result of a recorded dispense.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispenseReceipt {
    /// IDs of the written lines, in request order
    pub line_ids: Vec<i64>,
    /// Bill total, rounded to 2 decimals
    pub total_amount: f64,
}

/// Round a currency amount to 2 decimal places.
pub fn round_money(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_total() {
        let line = DispenseLineInput {
            medicine_id: 1,
            qty: 2,
            unit_price: 50.0,
            discount_pct: 10.0,
            tax_pct: 5.0,
        };
        // 100 - 10% = 90, + 5% = 94.5
        assert!((line.total() - 94.5).abs() < 1e-9);
    }

    #[test]
    fn test_round_money() {
        assert_eq!(round_money(10.005_1), 10.01);
        assert_eq!(round_money(3.333), 3.33);
    }

    #[test]
    fn test_request_defaults() {
        let mut req = DispenseRequest::new(vec![]);
        req.pharmacist = "  ".into();
        req.payment_mode = " UPI ".into();
        assert_eq!(req.pharmacist(), "pharmadesk");
        assert_eq!(req.payment_mode(), "upi");
    }
}
