//! Catalog reporting models.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use super::Medicine;

/// A name/quantity pair for dashboard lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockEntry {
    pub name: String,
    pub qty: i64,
}

/// Dashboard overview of the catalog and its sales history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogOverview {
    pub medicine_count: u64,
    pub dispense_line_count: u64,
    /// Highest stock on hand (top 5)
    pub top_stock: Vec<StockEntry>,
    /// Most units dispensed (top 5)
    pub top_dispensed: Vec<StockEntry>,
}

/// One page of the name-ordered inventory listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicinePage {
    pub items: Vec<Medicine>,
    /// Matching medicines across all pages
    pub total: u64,
    /// 1-based page actually returned
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

/// Midnight UTC on the first day of `now`'s month.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .with_day(1)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_month_start() {
        let now = Utc.with_ymd_and_hms(2026, 3, 17, 14, 5, 9).unwrap();
        assert_eq!(
            month_start(now),
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
        );
    }
}
