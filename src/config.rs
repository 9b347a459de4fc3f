//! Configuration for the corpus builder using the prefer crate.
//!
//! A config file named `oalc.{toml,json,yaml}` is discovered by prefer in
//! the usual locations, or given explicitly with `--config`. Everything has
//! a default, so running without a file works as long as scrapers are
//! configured somewhere.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::engine::{RefreshInterval, RetryConfig};
use crate::ocr::OcrConfig;
use crate::scrapers::{BrowserEngineConfig, ScraperConfig, DEFAULT_MAX_CONCURRENT_REQUESTS};

/// Default time before indices are fetched again (one day).
pub const DEFAULT_REFRESH_SECS: u64 = 86_400;

/// Default request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 60;

const CONFIG_NAME: &str = "oalc";
const APP_DIR: &str = "oalc-creator";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for index state (relative paths resolve against the
    /// config file's directory).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Corpus output directory (defaults to `<data_dir>/corpus`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,

    /// User agent string, or "impersonate" for a random browser one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Seconds before a source's index requests are rediscovered.
    #[serde(default = "default_refresh_secs")]
    pub indices_refresh_secs: u64,

    /// Seconds before an individual index page is fetched again.
    #[serde(default = "default_refresh_secs")]
    pub index_refresh_secs: u64,

    #[serde(default)]
    pub ocr: OcrConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub browser: BrowserEngineConfig,

    /// Declarative scrapers keyed by source id.
    #[serde(default)]
    pub scrapers: BTreeMap<String, ScraperConfig>,

    /// File this config was read from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_max_concurrent_requests() -> usize {
    DEFAULT_MAX_CONCURRENT_REQUESTS
}

fn default_refresh_secs() -> u64 {
    DEFAULT_REFRESH_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            output_dir: None,
            user_agent: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            indices_refresh_secs: DEFAULT_REFRESH_SECS,
            index_refresh_secs: DEFAULT_REFRESH_SECS,
            ocr: OcrConfig::default(),
            retry: RetryConfig::default(),
            browser: BrowserEngineConfig::default(),
            scrapers: BTreeMap::new(),
            source_path: None,
        }
    }
}

impl Config {
    /// Discover and load the config file, falling back to defaults when
    /// there is none. Environment overrides are applied either way.
    pub async fn load() -> Result<Self, ConfigError> {
        let discovered = match prefer::load(CONFIG_NAME).await {
            Ok(found) => found.source_path().map(|p| p.to_path_buf()),
            Err(e) => {
                debug!("No config file found: {}", e);
                None
            }
        };

        match discovered {
            Some(path) => Self::load_from_path(&path).await,
            None => {
                let mut config = Self::default();
                config.apply_env_overrides()?;
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load configuration from a specific file. The format follows the
    /// extension: TOML, YAML or JSON (the default).
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let mut config = Self::parse(path, &contents)?;
        config.source_path = Some(path.to_path_buf());
        config.apply_env_overrides()?;
        config.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject settings that would make a run misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate().map_err(ConfigError::Invalid)
    }

    fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_err = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        match ext {
            "toml" => toml::from_str(contents).map_err(|e| parse_err(e.to_string())),
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| parse_err(e.to_string())),
            _ => serde_json::from_str(contents).map_err(|e| parse_err(e.to_string())),
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
    }

    /// Apply `OALC_*` overrides read through `lookup`.
    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        if let Some(dir) = lookup("OALC_DATA_DIR") {
            self.data_dir = Some(dir);
        }
        if let Some(value) = lookup("OALC_MAX_REQUESTS") {
            self.max_concurrent_requests = parse_count("OALC_MAX_REQUESTS", value)?;
        }
        if let Some(value) = lookup("OALC_OCR_WORKERS") {
            self.ocr.workers = parse_count("OALC_OCR_WORKERS", value)?;
        }
        Ok(())
    }

    /// Directory relative paths in this config resolve against: the config
    /// file's directory, or the working directory.
    pub fn base_dir(&self) -> PathBuf {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Expand `~` and resolve a relative path against [`Self::base_dir`].
    pub fn resolve_path(&self, path_str: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        match self.data_dir {
            Some(ref dir) => self.resolve_path(dir),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        match self.output_dir {
            Some(ref dir) => self.resolve_path(dir),
            None => self.data_dir().join("corpus"),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn indices_refresh(&self) -> RefreshInterval {
        RefreshInterval::from_secs(self.indices_refresh_secs)
    }

    pub fn index_refresh(&self) -> RefreshInterval {
        RefreshInterval::from_secs(self.index_refresh_secs)
    }
}

fn parse_count(name: &'static str, value: String) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidEnv { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentType;
    use std::collections::HashMap;

    const TOML: &str = r#"
        data_dir = "state"
        max_concurrent_requests = 8
        index_refresh_secs = 0

        [ocr]
        workers = 2
        dpi = 200

        [retry]
        max_elapsed_secs = 600

        [scrapers.federal_court]
        doc_type = "decision"
        jurisdiction = "commonwealth"

        [scrapers.federal_court.index]
        urls = ["https://example.com/judgments"]
        entry_selector = "a.judgment"
    "#;

    #[tokio::test]
    async fn test_load_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oalc.toml");
        std::fs::write(&path, TOML).unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.max_concurrent_requests, 8);
        assert_eq!(config.ocr.workers, 2);
        assert_eq!(config.ocr.dpi, 200);
        assert_eq!(config.ocr.language, "eng");
        assert!(config.retry.enabled());
        assert_eq!(config.index_refresh(), RefreshInterval::Always);
        assert_eq!(
            config.indices_refresh(),
            RefreshInterval::Every(Duration::from_secs(86_400))
        );
        assert_eq!(config.data_dir(), dir.path().join("state"));
        assert_eq!(config.output_dir(), dir.path().join("state").join("corpus"));
        assert_eq!(
            config.scrapers["federal_court"].doc_type,
            DocumentType::Decision
        );
    }

    #[test]
    fn test_json_and_defaults() {
        let config = Config::parse(Path::new("oalc.json"), r#"{"request_timeout": 5}"#).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_concurrent_requests, 30);
        assert!(!config.retry.enabled());
        assert!(config.scrapers.is_empty());
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = Config::parse(Path::new("broken.toml"), "max_concurrent_requests = [").unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [("OALC_MAX_REQUESTS", "4"), ("OALC_OCR_WORKERS", "3")]
            .into_iter()
            .collect();
        let mut config = Config::default();
        config
            .apply_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.max_concurrent_requests, 4);
        assert_eq!(config.ocr.workers, 3);
        assert!(config.data_dir.is_none());

        let err = config
            .apply_overrides(|name| (name == "OALC_MAX_REQUESTS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name: "OALC_MAX_REQUESTS", .. }));
    }

    #[tokio::test]
    async fn test_rejects_retry_without_growth() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oalc.toml");
        std::fs::write(&path, "[retry]\nmax_elapsed_secs = 60\nbase = 1.0\n").unwrap();

        let err = Config::load_from_path(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("retry.base"));

        std::fs::write(&path, "[retry]\nmax_elapsed_secs = 60\nmax_wait_secs = 0.0\n").unwrap();
        let err = Config::load_from_path(&path).await.unwrap_err();
        assert!(err.to_string().contains("max_wait_secs"));
    }

    #[test]
    fn test_absolute_paths_kept() {
        let config = Config {
            data_dir: Some("/var/lib/oalc".to_string()),
            output_dir: Some("/srv/corpus".to_string()),
            ..Config::default()
        };
        assert_eq!(config.data_dir(), PathBuf::from("/var/lib/oalc"));
        assert_eq!(config.output_dir(), PathBuf::from("/srv/corpus"));
    }
}
