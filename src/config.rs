//! Configuration management using the prefer crate for discovery.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::scrapers::http_client::DEFAULT_ACCEPT_LANGUAGE;
use crate::scrapers::{builtin_targets, TargetConfig};

/// Name used for config discovery and the default output directory.
const APP_NAME: &str = "bizsup";

/// Configuration errors. These are the only failures that stop a crawl
/// before it starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
    #[error("invalid seed URL {url}: {reason}")]
    InvalidSeed { url: String, reason: String },
    #[error("invalid target configuration: {0}")]
    Invalid(String),
    #[error("unknown target '{0}'")]
    UnknownTarget(String),
    #[error("builtin target table is corrupt: {0}")]
    Builtin(#[from] serde_json::Error),
}

/// Browser launch settings for interactive targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserSettings {
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Chrome binary; autodetected when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<PathBuf>,
    /// Extra command line arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            args: Vec::new(),
        }
    }
}

fn default_headless() -> bool {
    true
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory receiving `<index>.md` records and `<index>/` attachments.
    pub output_dir: PathBuf,
    /// User agent: "impersonate", "default" or a literal string.
    pub user_agent: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Delay between requests to one domain in milliseconds.
    pub request_delay_ms: u64,
    /// Threads archived at once.
    pub concurrency: usize,
    pub accept_language: String,
    pub browser: BrowserSettings,
}

impl Default for Settings {
    fn default() -> Self {
        // Documents dir -> Home dir -> Current dir
        let output_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME);

        Self {
            output_dir,
            user_agent: "impersonate".to_string(),
            request_timeout: 30,
            request_delay_ms: 500,
            concurrency: 1,
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            browser: BrowserSettings::default(),
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Output directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// User agent string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// Delay between requests in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_delay_ms: Option<u64>,
    /// Threads archived at once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserSettings>,
    /// Additional or overriding targets keyed by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub targets: BTreeMap<String, TargetConfig>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers bizsup config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load(APP_NAME).await {
            Ok(pref_config) => {
                // Get the discovered file path and load with serde
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            warn!("Ignoring config file: {}", e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            Err(e) => {
                debug!("No config file found: {}", e);
                Self::default()
            }
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_error = |reason: String| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        };

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents).map_err(|e| parse_error(e.to_string()))?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| parse_error(e.to_string()))?
            }
            _ => serde_json::from_str(&contents).map_err(|e| parse_error(e.to_string()))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref output_dir) = self.output_dir {
            settings.output_dir = self.resolve_path(output_dir, base_dir);
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(delay) = self.request_delay_ms {
            settings.request_delay_ms = delay;
        }
        if let Some(concurrency) = self.concurrency {
            settings.concurrency = concurrency.max(1);
        }
        if let Some(ref accept_language) = self.accept_language {
            settings.accept_language = accept_language.clone();
        }
        if let Some(ref browser) = self.browser {
            settings.browser = browser.clone();
        }
    }

    /// Builtin targets overlaid with the configured ones.
    pub fn targets(&self) -> Result<BTreeMap<String, TargetConfig>, ConfigError> {
        let mut targets = builtin_targets()?;
        for (name, target) in &self.targets {
            targets.insert(name.clone(), target.clone());
        }
        Ok(targets)
    }

    /// Look up a target by name and validate it.
    pub fn target(&self, name: &str) -> Result<TargetConfig, ConfigError> {
        let target = self
            .targets()?
            .remove(name)
            .ok_or_else(|| ConfigError::UnknownTarget(name.to_string()))?;
        target.validate()?;
        Ok(target)
    }
}

/// Load settings and config: an explicit path wins over discovery.
pub async fn load_settings(config_path: Option<&Path>) -> Result<(Settings, Config), ConfigError> {
    let config = match config_path {
        Some(path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };

    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);
    Ok((settings, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bizsup.toml");
        std::fs::write(
            &path,
            r#"
output_dir = "archive"
request_delay_ms = 1500
concurrency = 2

[targets.custom]
name = "Custom board"
start_url = "https://example.com/board/list.do?page=1"
page_bound = 3
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.base_dir().as_deref(), Some(dir.path()));

        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, dir.path());
        assert_eq!(settings.output_dir, dir.path().join("archive"));
        assert_eq!(settings.request_delay_ms, 1500);
        assert_eq!(settings.concurrency, 2);
        assert_eq!(settings.request_timeout, 30);
        assert_eq!(settings.user_agent, "impersonate");

        let target = config.target("custom").unwrap();
        assert_eq!(target.page_bound, 3);
        assert!(config.target("jbtp").is_ok());
    }

    #[tokio::test]
    async fn test_load_from_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();

        let yaml = dir.path().join("bizsup.yaml");
        std::fs::write(&yaml, "user_agent: default\nrequest_timeout: 10\n").unwrap();
        let config = Config::load_from_path(&yaml).await.unwrap();
        assert_eq!(config.user_agent.as_deref(), Some("default"));
        assert_eq!(config.request_timeout, Some(10));

        let json = dir.path().join("bizsup.json");
        std::fs::write(&json, r#"{"accept_language": "ko-KR"}"#).unwrap();
        let config = Config::load_from_path(&json).await.unwrap();
        assert_eq!(config.accept_language.as_deref(), Some("ko-KR"));
    }

    #[tokio::test]
    async fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Config::load_from_path(&dir.path().join("nope.toml")).await;
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(
            Config::load_from_path(&bad).await,
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_target_override_and_validation() {
        let mut config = Config::default();
        let mut jbtp = TargetConfig::new("https://mirror.example.com/list.jbtp?pageNo=1");
        jbtp.page_param = "pageNo".to_string();
        config.targets.insert("jbtp".to_string(), jbtp);
        config
            .targets
            .insert("broken".to_string(), TargetConfig::new("not a url"));

        assert_eq!(
            config.target("jbtp").unwrap().start_url,
            "https://mirror.example.com/list.jbtp?pageNo=1"
        );
        assert!(matches!(
            config.target("broken"),
            Err(ConfigError::InvalidSeed { .. })
        ));
        assert!(matches!(
            config.target("missing"),
            Err(ConfigError::UnknownTarget(_))
        ));
    }

    #[test]
    fn test_resolve_path() {
        let config = Config::default();
        let base = Path::new("/etc/bizsup");
        assert_eq!(config.resolve_path("/abs/out", base), PathBuf::from("/abs/out"));
        assert_eq!(config.resolve_path("out", base), PathBuf::from("/etc/bizsup/out"));
    }
}
