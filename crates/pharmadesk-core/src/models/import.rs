//! Import outcome models.

use serde::{Deserialize, Serialize};

/// Outcome counters for one reconciliation.
///
/// Every incoming row lands in exactly one of `created`, `updated`,
/// `skipped` or `duplicates`, so their sum equals `total`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportSummary {
    /// New catalog entries
    pub created: u64,
    /// Existing entries overwritten by a row
    pub updated: u64,
    /// Rows without a usable name
    pub skipped: u64,
    /// Entries removed under replace semantics
    pub deleted: u64,
    /// Entries absent from the batch but kept because sales reference them
    pub kept_due_to_history: u64,
    /// Rows superseded by a later row with the same name
    pub duplicates: u64,
    /// Incoming rows before any filtering
    pub total: u64,
    pub replaced_all: bool,
}

impl ImportSummary {
    /// Human-readable one-line summary for operators.
    pub fn message(&self) -> String {
        format!(
            "{}Created: {}, Updated: {}, Deleted: {}, Kept(historical): {}, Skipped: {}",
            if self.replaced_all {
                "Synchronized inventory to CSV. "
            } else {
                ""
            },
            self.created,
            self.updated,
            self.deleted,
            self.kept_due_to_history,
            self.skipped,
        )
    }

    /// Rows accounted for across all outcome counters.
    pub fn accounted(&self) -> u64 {
        self.created + self.updated + self.skipped + self.duplicates
    }
}

/// One applied import, as kept in the import log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportRecord {
    pub id: i64,
    pub file_name: String,
    /// Hex SHA-256 of the uploaded bytes
    pub file_sha256: String,
    pub summary: ImportSummary,
    pub applied_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_merge() {
        let summary = ImportSummary {
            created: 2,
            updated: 1,
            skipped: 1,
            total: 4,
            ..Default::default()
        };
        assert_eq!(
            summary.message(),
            "Created: 2, Updated: 1, Deleted: 0, Kept(historical): 0, Skipped: 1"
        );
    }

    #[test]
    fn test_message_replace() {
        let summary = ImportSummary {
            updated: 1,
            kept_due_to_history: 1,
            replaced_all: true,
            ..Default::default()
        };
        assert!(summary
            .message()
            .starts_with("Synchronized inventory to CSV. Created: 0"));
    }

    #[test]
    fn test_accounted() {
        let summary = ImportSummary {
            created: 1,
            updated: 2,
            skipped: 3,
            duplicates: 4,
            total: 10,
            ..Default::default()
        };
        assert_eq!(summary.accounted(), summary.total);
    }
}
