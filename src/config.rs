use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{StageError, StageResult};

const DEFAULT_DATABASE: &str = "etl-stage.db";
const DEFAULT_SERVER_URL: &str = "http://localhost:8080/api";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Runtime settings, read from the environment and optionally overlaid by a TOML file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageConfig {
    /// Path of the sqlite staging store, or `:memory:`
    pub database_path: String,
    pub server_url: String,
    pub request_timeout: Duration,
    pub log_level: String,
}

/// Optional keys of a config file; anything missing keeps the current value.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    database: Option<String>,
    server_url: Option<String>,
    timeout_secs: Option<u64>,
    log_level: Option<String>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self::from_map(&HashMap::new())
    }
}

impl StageConfig {
    pub fn from_env() -> Self {
        let mut values = HashMap::new();
        for key in Self::tracked_keys() {
            if let Ok(value) = std::env::var(key) {
                values.insert(key.to_string(), value);
            }
        }
        Self::from_map(&values)
    }

    pub fn from_map(values: &HashMap<String, String>) -> Self {
        fn read(values: &HashMap<String, String>, key: &str, default: &str) -> String {
            values
                .get(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        }

        let timeout_secs = values
            .get("ETL_STAGE_TIMEOUT_SECS")
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            database_path: read(values, "ETL_STAGE_DATABASE", DEFAULT_DATABASE),
            server_url: read(values, "ETL_STAGE_SERVER_URL", DEFAULT_SERVER_URL),
            request_timeout: Duration::from_secs(timeout_secs),
            log_level: read(values, "ETL_STAGE_LOG_LEVEL", DEFAULT_LOG_LEVEL),
        }
    }

    /// Overlay the values set in a TOML file
    pub fn with_file(mut self, path: &Path) -> StageResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&contents).map_err(|e| {
            StageError::Parse(format!("Invalid config file {}: {}", path.display(), e))
        })?;

        if let Some(database) = file.database {
            self.database_path = database;
        }
        if let Some(server_url) = file.server_url {
            self.server_url = server_url;
        }
        if let Some(timeout_secs) = file.timeout_secs {
            self.request_timeout = Duration::from_secs(timeout_secs);
        }
        if let Some(log_level) = file.log_level {
            self.log_level = log_level;
        }
        Ok(self)
    }

    fn tracked_keys() -> [&'static str; 4] {
        [
            "ETL_STAGE_DATABASE",
            "ETL_STAGE_SERVER_URL",
            "ETL_STAGE_TIMEOUT_SECS",
            "ETL_STAGE_LOG_LEVEL",
        ]
    }
}
