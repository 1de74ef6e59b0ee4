//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/courier/config.toml`
//! - Windows: `%APPDATA%/courier/config.toml`

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use courier_client::{DEFAULT_BASE_URL, SessionConfig};
use serde::{Deserialize, Serialize};

/// Persistent CLI settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// API key sent with every request.
    #[serde(default)]
    pub api_key: String,

    /// Service base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Files uploaded at the same time.
    #[serde(default = "default_concurrency")]
    pub max_concurrent_files: usize,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    courier_client::DEFAULT_REQUEST_TIMEOUT.as_secs()
}

fn default_concurrency() -> usize {
    4
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            request_timeout_secs: default_timeout_secs(),
            max_concurrent_files: default_concurrency(),
        }
    }
}

impl CliConfig {
    /// Loads configuration from `path`, falling back to defaults if absent.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: CliConfig =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // Restrict permissions on Unix (contains the API key).
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Applies values given on the command line or through the environment.
    pub fn apply_overrides(&mut self, api_key: Option<String>, base_url: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.api_key = key;
        }
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.base_url = url;
        }
    }

    /// Session settings for this configuration.
    pub fn session_config(&self) -> anyhow::Result<SessionConfig> {
        if self.api_key.trim().is_empty() {
            bail!(
                "no API key configured; pass --api-key, set COURIER_API_KEY or run `courier config set-key`"
            );
        }
        Ok(SessionConfig::new(self.api_key.clone())
            .with_base_url(self.base_url.clone())
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs.max(1))))
    }
}

impl fmt::Debug for CliConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.api_key.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("CliConfig")
            .field("api_key", &key)
            .field("base_url", &self.base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_concurrent_files", &self.max_concurrent_files)
            .finish()
    }
}

/// Returns the platform-specific configuration file path.
pub fn default_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("courier").join("config.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("courier")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = CliConfig::default();
        assert!(config.api_key.is_empty());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout_secs, 120);
        assert_eq!(config.max_concurrent_files, 4);
    }

    #[test]
    fn config_partial_toml() {
        let config: CliConfig = toml::from_str(r#"api_key = "k1""#).unwrap();
        assert_eq!(config.api_key, "k1");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = CliConfig::load_from(&tmp.path().join("absent.toml")).unwrap();
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        let config = CliConfig {
            api_key: "secret".into(),
            base_url: "http://127.0.0.1:9000/v2".into(),
            ..CliConfig::default()
        };
        config.save_to(&path).unwrap();

        let loaded = CliConfig::load_from(&path).unwrap();
        assert_eq!(loaded.api_key, "secret");
        assert_eq!(loaded.base_url, "http://127.0.0.1:9000/v2");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "api_key = [").unwrap();
        let err = CliConfig::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parsing"));
    }

    #[test]
    fn overrides_win_over_file() {
        let mut config = CliConfig {
            api_key: "from-file".into(),
            ..CliConfig::default()
        };
        config.apply_overrides(Some("from-env".into()), None);
        assert_eq!(config.api_key, "from-env");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);

        config.apply_overrides(Some(" ".into()), Some("http://localhost/v2".into()));
        assert_eq!(config.api_key, "from-env", "blank override ignored");
        assert_eq!(config.base_url, "http://localhost/v2");
    }

    #[test]
    fn session_config_requires_key() {
        assert!(CliConfig::default().session_config().is_err());

        let config = CliConfig {
            api_key: "k".into(),
            request_timeout_secs: 5,
            ..CliConfig::default()
        };
        let session = config.session_config().unwrap();
        assert_eq!(session.api_key, "k");
        assert_eq!(session.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn debug_redacts_key() {
        let config = CliConfig {
            api_key: "super-secret".into(),
            ..CliConfig::default()
        };
        assert!(!format!("{config:?}").contains("super-secret"));
    }

    #[test]
    fn config_path_not_empty() {
        assert!(default_path().to_string_lossy().contains("courier"));
    }
}
