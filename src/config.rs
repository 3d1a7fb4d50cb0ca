//! Configuration loaded from `reportkit.toml`.
//!
//! Lookup order: `./reportkit.toml`, then `<config dir>/reportkit/config.toml`.
//! Environment variables and CLI flags override the file.
//!
//! ```toml
//! [database]
//! url = "postgres://localhost/reportdb"
//!
//! [api]
//! url = "http://localhost:8080/api"
//!
//! [query]
//! page_size = 50
//!
//! [templates]
//! path = "/home/me/.local/share/reportkit/templates.json"
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::client::DEFAULT_API_URL;
use crate::error::{ReportError, ReportResult};
use crate::request::PageSize;

pub const CONFIG_FILE: &str = "reportkit.toml";
pub const DATABASE_URL_ENV: &str = "REPORTKIT_DATABASE_URL";
pub const API_URL_ENV: &str = "REPORTKIT_API_URL";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApiConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryConfig {
    pub page_size: Option<PageSize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TemplatesConfig {
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load from the first config file found, or defaults if there is none.
    pub fn load() -> ReportResult<Self> {
        let candidates = [
            Some(PathBuf::from(CONFIG_FILE)),
            dirs::config_dir().map(|d| d.join("reportkit").join("config.toml")),
        ];
        for path in candidates.into_iter().flatten() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        tracing::debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    /// Load from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> ReportResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| ReportError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml(&content)
            .map_err(|e| ReportError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> ReportResult<Self> {
        toml::from_str(content).map_err(|e| ReportError::Config(e.to_string()))
    }

    /// Apply `REPORTKIT_DATABASE_URL` and `REPORTKIT_API_URL`.
    pub fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            self.database.url = Some(url);
        }
        if let Ok(url) = std::env::var(API_URL_ENV) {
            self.api.url = Some(url);
        }
        self
    }

    pub fn database_url(&self) -> Option<&str> {
        self.database.url.as_deref().filter(|u| !u.is_empty())
    }

    pub fn api_url(&self) -> &str {
        self.api.url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    pub fn page_size(&self) -> PageSize {
        self.query.page_size.unwrap_or_default()
    }

    /// Where the local template file lives.
    pub fn templates_path(&self) -> PathBuf {
        self.templates.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("reportkit")
                .join("templates.json")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.database_url(), None);
        assert_eq!(config.api_url(), DEFAULT_API_URL);
        assert_eq!(config.page_size(), PageSize::Fifty);
        assert!(config.templates_path().ends_with("reportkit/templates.json"));
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
            [database]
            url = "sqlite://reports.db"

            [api]
            url = "http://reports.internal/api"

            [query]
            page_size = 25

            [templates]
            path = "/tmp/templates.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.database_url(), Some("sqlite://reports.db"));
        assert_eq!(config.api_url(), "http://reports.internal/api");
        assert_eq!(config.page_size(), PageSize::TwentyFive);
        assert_eq!(config.templates_path(), PathBuf::from("/tmp/templates.json"));
    }

    #[test]
    fn test_invalid_page_size_is_config_error() {
        let err = Config::from_toml("[query]\npage_size = 30").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[database]\nurl = \"sqlite::memory:\"\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.database_url(), Some("sqlite::memory:"));

        fs::write(&path, "[database\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ReportError::Config(_))));
    }
}
