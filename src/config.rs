//! Application configuration.
//!
//! Stored as JSON in `~/Library/Application Support/HDDcoinStatus/config.json`
//! (macOS), `~/.config/HDDcoinStatus/config.json` (other Unix) or the roaming
//! AppData folder on Windows.  Every field has a default, so a hand-edited
//! file only needs the keys it changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::paths;
use crate::version::VersionOrdering;

const APP_NAME: &str = "HDDcoinStatus";
const CONFIG_FILENAME: &str = "config.json";

pub const DEFAULT_RELEASE_API_URL: &str =
    "https://api.github.com/repos/HDDcoin-Network/hddcoin-blockchain/releases/latest";
pub const DEFAULT_RELEASE_PAGE_URL: &str =
    "https://github.com/HDDcoin-Network/hddcoin-blockchain/releases/latest";
pub const DEFAULT_PRICE_API_URL: &str = "https://api.coingecko.com/api/v3/coins/hddcoin?localization=false&tickers=false&market_data=true&developer_data=false&sparkline=false";
pub const DEFAULT_PRICE_PAGE_URL: &str = "https://www.coingecko.com/en/coins/hddcoin";

const DEFAULT_STATUS_INTERVAL_SECS: u64 = 15 * 60;
const DEFAULT_LOG_INTERVAL_MS: u64 = 3_000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// All persisted settings for the status monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON endpoint returning the latest release (`tag_name`).
    pub release_api_url: String,
    /// Opened when the "Update available!" banner is clicked.
    pub release_page_url: String,
    /// JSON endpoint returning `market_data.current_price.usd`.
    pub price_api_url: String,
    /// Opened when the exchange-rate label is clicked.
    pub price_page_url: String,
    pub status_interval_secs: u64,
    pub log_interval_ms: u64,
    pub request_timeout_secs: u64,
    /// Version compared against release tags.  Defaults to this build's version.
    pub client_version: Option<String>,
    pub version_ordering: VersionOrdering,
    /// Log file to tail.  Defaults to `<HDDCOIN_ROOT>/log/debug.log`.
    pub log_path: Option<PathBuf>,
    pub dark_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            release_api_url:      DEFAULT_RELEASE_API_URL.into(),
            release_page_url:     DEFAULT_RELEASE_PAGE_URL.into(),
            price_api_url:        DEFAULT_PRICE_API_URL.into(),
            price_page_url:       DEFAULT_PRICE_PAGE_URL.into(),
            status_interval_secs: DEFAULT_STATUS_INTERVAL_SECS,
            log_interval_ms:      DEFAULT_LOG_INTERVAL_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            client_version:       None,
            version_ordering:     VersionOrdering::default(),
            log_path:             None,
            dark_mode:            true,
        }
    }
}

impl Config {
    /// Load from disk, falling back to defaults when the file is missing or
    /// unreadable.
    pub fn load() -> Self {
        let path = Self::config_file_path();

        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }

        match Self::load_from_file(&path) {
            Ok(cfg) => cfg.sanitized(),
            Err(e) => {
                warn!("config load error ({e:#}), using defaults");
                Self::default()
            }
        }
    }

    /// Persist the current config to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path())
    }

    /// Path to the JSON config file on this platform.
    pub fn config_file_path() -> PathBuf {
        if let Some(proj) = ProjectDirs::from("", "", APP_NAME) {
            proj.config_dir().join(CONFIG_FILENAME)
        } else {
            dirs_fallback().join(CONFIG_FILENAME)
        }
    }

    // ── Derived values ───────────────────────────────────────────────────────

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_millis(self.log_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The version release tags are compared against.
    pub fn current_version(&self) -> String {
        self.client_version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(env!("CARGO_PKG_VERSION"))
            .to_owned()
    }

    /// The log file to tail.
    pub fn effective_log_path(&self) -> PathBuf {
        self.log_path.clone().unwrap_or_else(paths::default_log_path)
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create config dir {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("serialise config")?;
        std::fs::write(path, json).with_context(|| format!("write config {:?}", path))?;
        Ok(())
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {:?}", path))?;
        serde_json::from_str(&text).context("parse config JSON")
    }

    /// Replace zero intervals, which `start()` would reject, with defaults.
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.status_interval_secs == 0 {
            warn!("status_interval_secs is 0, using {}", defaults.status_interval_secs);
            self.status_interval_secs = defaults.status_interval_secs;
        }
        if self.log_interval_ms == 0 {
            warn!("log_interval_ms is 0, using {}", defaults.log_interval_ms);
            self.log_interval_ms = defaults.log_interval_ms;
        }
        if self.request_timeout_secs == 0 {
            warn!("request_timeout_secs is 0, using {}", defaults.request_timeout_secs);
            self.request_timeout_secs = defaults.request_timeout_secs;
        }
        self
    }
}

fn dirs_fallback() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home).join(".config").join(APP_NAME)
}
