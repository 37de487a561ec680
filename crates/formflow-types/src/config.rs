//! Global configuration types for Formflow.
//!
//! `GlobalConfig` represents the top-level `config.toml` in the data
//! directory.

use serde::{Deserialize, Serialize};

/// Top-level configuration. All fields have defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// SQLite database file name, relative to the data directory.
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// `tracing` filter directive used when no `-v` flag is given
    /// (e.g. "warn" or "info,formflow_core=debug").
    #[serde(default)]
    pub log_filter: Option<String>,
}

fn default_database_file() -> String {
    "formflow.db".to_string()
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
            log_filter: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_config_default_values() {
        let config = GlobalConfig::default();
        assert_eq!(config.database_file, "formflow.db");
        assert!(config.log_filter.is_none());
    }

    #[test]
    fn test_global_config_partial_toml() {
        let config: GlobalConfig = toml::from_str(r#"log_filter = "debug""#).unwrap();
        assert_eq!(config.database_file, "formflow.db");
        assert_eq!(config.log_filter.as_deref(), Some("debug"));
    }

    #[test]
    fn test_global_config_full_toml() {
        let config: GlobalConfig = toml::from_str(
            r#"
database_file = "forms.sqlite"
log_filter = "info,formflow_core=trace"
"#,
        )
        .unwrap();
        assert_eq!(config.database_file, "forms.sqlite");
    }
}
