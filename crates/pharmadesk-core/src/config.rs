//! Runtime configuration and constants.

use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "PharmaDesk";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long a previewed import stays confirmable.
pub const DEFAULT_PREVIEW_TTL_MINUTES: i64 = 45;

/// Normalized rows returned with a preview for display.
pub const DEFAULT_PREVIEW_ROW_LIMIT: usize = 50;

/// Largest accepted upload (10MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Default `tracing` filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,pharmadesk_core=debug"
}

/// Import workflow settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Minutes a preview token stays valid
    pub preview_ttl_minutes: i64,
    /// Rows echoed back by a preview
    pub preview_row_limit: usize,
    /// Upload size cap in bytes
    pub max_upload_bytes: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            preview_ttl_minutes: DEFAULT_PREVIEW_TTL_MINUTES,
            preview_row_limit: DEFAULT_PREVIEW_ROW_LIMIT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ImportConfig {
    /// Preview lifetime as a duration.
    pub fn preview_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.preview_ttl_minutes.max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ImportConfig::default();
        assert_eq!(config.preview_ttl(), chrono::Duration::minutes(45));
        assert_eq!(config.preview_row_limit, 50);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ImportConfig = serde_json::from_str(r#"{"preview_ttl_minutes": 5}"#).unwrap();
        assert_eq!(config.preview_ttl_minutes, 5);
        assert_eq!(config.preview_row_limit, DEFAULT_PREVIEW_ROW_LIMIT);
    }

    #[test]
    fn test_app_name() {
        assert_eq!(APP_NAME, "PharmaDesk");
    }
}
