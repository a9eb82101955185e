use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default MoySklad JSON API base URL.
pub const MOYSKLAD_API_URL: &str = "https://api.moysklad.ru/api/remap/1.2";

/// Default upload limit: 10 MiB.
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Warehouse and project assigned to documents of one product group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRouting {
    pub warehouse: String,
    pub project: String,
}

/// Injected configuration. The core never reads the environment on its own;
/// [`Config::from_env`] is a convenience for binary callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// MoySklad API bearer token.
    pub api_token: String,
    /// Fixed organization id; when absent the first organization of the
    /// account is used.
    pub organization_id: Option<String>,
    /// MoySklad base URL, overridable for testing.
    pub base_url: String,
    /// Directory for temp files and extraction subdirectories.
    pub temp_dir: PathBuf,
    /// Maximum accepted upload size in bytes.
    pub max_file_size: usize,
    /// Routing for documents dominated by профиль items.
    pub profile_routing: GroupRouting,
    /// Routing for documents dominated by трубы items.
    pub tube_routing: GroupRouting,
}

impl Config {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            organization_id: None,
            base_url: MOYSKLAD_API_URL.to_string(),
            temp_dir: PathBuf::from("./temp"),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            profile_routing: GroupRouting {
                warehouse: "Гатчина".into(),
                project: "Профили".into(),
            },
            tube_routing: GroupRouting {
                warehouse: "Сестрорецк ПП".into(),
                project: "Трубы".into(),
            },
        }
    }

    /// Read the standard variables: `MOYSKLAD_API_TOKEN` (required),
    /// `MOYSKLAD_ORGANIZATION_ID`, `TEMP_DIR`, `MAX_FILE_SIZE`.
    pub fn from_env() -> Result<Self, super::error::ProvodkaError> {
        let token = std::env::var("MOYSKLAD_API_TOKEN").map_err(|_| {
            super::error::ProvodkaError::Validation("MOYSKLAD_API_TOKEN is not set".into())
        })?;
        let mut config = Self::new(token);
        if let Ok(org) = std::env::var("MOYSKLAD_ORGANIZATION_ID") {
            if !org.is_empty() {
                config.organization_id = Some(org);
            }
        }
        if let Ok(dir) = std::env::var("TEMP_DIR") {
            if !dir.is_empty() {
                config.temp_dir = PathBuf::from(dir);
            }
        }
        if let Ok(size) = std::env::var("MAX_FILE_SIZE") {
            if let Ok(size) = size.parse() {
                config.max_file_size = size;
            }
        }
        Ok(config)
    }
}
