use anyhow::Context;
use potcloud_core::TableConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub db_file: String,
    pub config_file: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("potcloud"),
            db_file: "potcloud.db".to_string(),
            config_file: "config.json".to_string(),
        }
    }
}

impl CliConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }

    /// Explicit file first, then `<data-dir>/config.json`, then defaults.
    pub fn table_config(&self, explicit: Option<&Path>) -> anyhow::Result<TableConfig> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default_path = self.data_dir.join(&self.config_file);
                if !default_path.exists() {
                    return Ok(TableConfig::default());
                }
                default_path
            }
        };

        TableConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))
    }
}
