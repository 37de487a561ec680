//! Global configuration loader.
//!
//! Reads `config.toml` from the data directory. A missing or malformed file
//! yields the defaults.

use std::path::Path;

use formflow_types::config::GlobalConfig;

/// Load `{data_dir}/config.toml`, falling back to [`GlobalConfig::default()`].
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", config_path.display());
            GlobalConfig::default()
        }
    }
}
