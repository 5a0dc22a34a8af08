//! Harvest configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; a `config.toml` in the project root overrides any subset of
//! them. Everything the pipeline needs (endpoint, selectors, quotas, caps)
//! lives here and is passed in explicitly; nothing reads ambient constants.
//!
//! ## Config File Location
//!
//! ```text
//! project/
//! ├── config.toml          # Optional; overrides stock defaults
//! ├── proxy_list.txt       # Optional; one proxy per line
//! ├── user_agent.txt       # Optional; one user agent per line
//! └── dataset/             # Created on demand
//!     ├── polar bear/
//!     │   ├── 0000.jpg
//!     │   └── ...
//!     └── brown bear/
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! categories = ["red panda"]
//! quota = 50
//!
//! [download]
//! workers = 4
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::naming;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Harvest configuration loaded from `config.toml`.
///
/// All fields have defaults matching the stock run: two bear categories,
/// 1000 images each, saved under `dataset/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig {
    /// Directory that receives one subdirectory per category.
    pub dataset_root: String,
    /// Category names; each is used verbatim as the search query and as the
    /// output directory name.
    pub categories: Vec<String>,
    /// Maximum number of images collected and downloaded per category.
    pub quota: usize,
    /// Search endpoint and page structure.
    pub search: SearchConfig,
    /// Termination caps for URL collection.
    pub limits: LimitsConfig,
    /// Proxy and user-agent rotation.
    pub identity: IdentityConfig,
    /// Headless browser launch settings.
    pub browser: BrowserConfig,
    /// Image download settings.
    pub download: DownloadConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            dataset_root: "dataset".to_string(),
            categories: vec!["polar bear".to_string(), "brown bear".to_string()],
            quota: 1000,
            search: SearchConfig::default(),
            limits: LimitsConfig::default(),
            identity: IdentityConfig::default(),
            browser: BrowserConfig::default(),
            download: DownloadConfig::default(),
        }
    }
}

impl HarvestConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.categories.is_empty() {
            return Err(ConfigError::Validation(
                "categories must not be empty".into(),
            ));
        }
        for (i, name) in self.categories.iter().enumerate() {
            if !naming::is_valid_category_name(name) {
                return Err(ConfigError::Validation(format!(
                    "category {name:?} is not usable as a directory name"
                )));
            }
            if self.categories[..i].contains(name) {
                return Err(ConfigError::Validation(format!(
                    "category {name:?} is listed more than once"
                )));
            }
        }
        if self.quota == 0 {
            return Err(ConfigError::Validation("quota must be at least 1".into()));
        }
        self.search.validate()?;
        self.limits.validate()?;
        if self.identity.default_user_agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "identity.default_user_agent must not be empty".into(),
            ));
        }
        if self.browser.window_size[0] == 0 || self.browser.window_size[1] == 0 {
            return Err(ConfigError::Validation(
                "browser.window_size values must be non-zero".into(),
            ));
        }
        if self.download.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "download.timeout_secs must be at least 1".into(),
            ));
        }
        if self.download.workers == 0 {
            return Err(ConfigError::Validation(
                "download.workers must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Search endpoint and the structural markers used to read result pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Base URL of the results listing; `?p=<page>&text=<query>` is appended.
    pub endpoint: String,
    /// CSS selector matching clickable result thumbnails.
    pub thumbnail_selector: String,
    /// CSS selector matching the full-resolution image on a detail view.
    pub full_image_selector: String,
    /// Attribute of the full-resolution element holding the image URL.
    pub image_attribute: String,
    /// Upper bound on waiting for an expected element to appear.
    pub wait_timeout_ms: u64,
    /// Delay between element probes while waiting.
    pub poll_interval_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://yandex.ru/images/search".to_string(),
            thumbnail_selector: ".ImagesContentImage-Image_clickable".to_string(),
            full_image_selector: ".MMImage-Origin".to_string(),
            image_attribute: "src".to_string(),
            wait_timeout_ms: 2000,
            poll_interval_ms: 100,
        }
    }
}

impl SearchConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !naming::has_http_scheme(&self.endpoint) {
            return Err(ConfigError::Validation(
                "search.endpoint must be an http(s) URL".into(),
            ));
        }
        for (key, value) in [
            ("thumbnail_selector", &self.thumbnail_selector),
            ("full_image_selector", &self.full_image_selector),
            ("image_attribute", &self.image_attribute),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "search.{key} must not be empty"
                )));
            }
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "search.poll_interval_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Caps that bound URL collection for queries that never reach quota.
///
/// Each cap is optional, but at least one must be set. A cycle cap of `0`
/// is disabled, the same as leaving it unset; TOML has no null, so this is
/// how a file turns off a default cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum pagination cycles per category. `0` disables.
    pub max_cycles: Option<u32>,
    /// Stop after this many consecutive cycles that added no new URL.
    /// `0` disables.
    pub max_stalled_cycles: Option<u32>,
    /// Wall-clock budget per category, in seconds.
    pub max_elapsed_secs: Option<u64>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_cycles: Some(200),
            max_stalled_cycles: Some(10),
            max_elapsed_secs: None,
        }
    }
}

impl LimitsConfig {
    /// `max_cycles`, with `0` meaning no cap.
    pub fn cycle_cap(&self) -> Option<u32> {
        self.max_cycles.filter(|&n| n > 0)
    }

    /// `max_stalled_cycles`, with `0` meaning no cap.
    pub fn stall_cap(&self) -> Option<u32> {
        self.max_stalled_cycles.filter(|&n| n > 0)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle_cap().is_none()
            && self.stall_cap().is_none()
            && self.max_elapsed_secs.is_none()
        {
            return Err(ConfigError::Validation(
                "limits: at least one of max_cycles, max_stalled_cycles, max_elapsed_secs must be set"
                    .into(),
            ));
        }
        Ok(())
    }
}

/// How an identity is picked from the pool for each session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotationStrategy {
    #[default]
    Random,
    RoundRobin,
}

/// Proxy and user-agent sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityConfig {
    /// Line-delimited proxy list, relative to the project root.
    pub proxy_file: String,
    /// Line-delimited user-agent list, relative to the project root.
    pub user_agent_file: String,
    /// Used when the user-agent list is missing or empty.
    pub default_user_agent: String,
    pub strategy: RotationStrategy,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            proxy_file: "proxy_list.txt".to_string(),
            user_agent_file: "user_agent.txt".to_string(),
            default_user_agent: "Mozilla/5.0".to_string(),
            strategy: RotationStrategy::Random,
        }
    }
}

/// Headless browser launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserConfig {
    pub headless: bool,
    /// Chrome's sandbox; usually has to be off inside containers.
    pub sandbox: bool,
    /// Viewport as `[width, height]`.
    pub window_size: [u32; 2],
    /// Kill the browser if the DevTools connection is idle this long.
    pub idle_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: false,
            window_size: [1280, 800],
            idle_timeout_secs: 60,
        }
    }
}

/// Image download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloadConfig {
    /// Per-request timeout covering connect and body transfer.
    pub timeout_secs: u64,
    /// Parallel downloads within a category. Values larger than the core
    /// count are clamped down.
    pub workers: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            workers: 1,
        }
    }
}

/// Resolve the effective download worker count.
///
/// `min(workers, cores)`: the user can constrain down, not up.
pub fn effective_workers(config: &DownloadConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.workers.clamp(1, cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(HarvestConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key-by-key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<HarvestConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: HarvestConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory, falling back to
/// stock defaults when it is absent.
pub fn load_config(root: &Path) -> Result<HarvestConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Simple Harvest Configuration
# ============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Directory receiving one subdirectory per category.
dataset_root = "dataset"

# Each name is both the search query and the output directory name.
categories = ["polar bear", "brown bear"]

# Maximum images collected and downloaded per category.
quota = 1000

# ---------------------------------------------------------------------------
# Search endpoint and page structure
# ---------------------------------------------------------------------------
[search]
# Results listing; "?p=<page>&text=<query>" is appended.
endpoint = "https://yandex.ru/images/search"

# Clickable result thumbnails on the listing.
thumbnail_selector = ".ImagesContentImage-Image_clickable"

# Full-resolution image on the detail view, and the attribute holding its URL.
full_image_selector = ".MMImage-Origin"
image_attribute = "src"

# How long to wait for an expected element, and how often to look for it.
wait_timeout_ms = 2000
poll_interval_ms = 100

# ---------------------------------------------------------------------------
# Termination caps (at least one must be set; 0 disables a cycle cap)
# ---------------------------------------------------------------------------
[limits]
# Maximum pagination cycles per category.
max_cycles = 200

# Stop after this many consecutive cycles that added no new URL.
max_stalled_cycles = 10

# Wall-clock budget per category, in seconds.
# max_elapsed_secs = 3600

# ---------------------------------------------------------------------------
# Identity rotation
# ---------------------------------------------------------------------------
[identity]
# Line-delimited lists, relative to the project root. Both are optional.
proxy_file = "proxy_list.txt"
user_agent_file = "user_agent.txt"

# Used when the user-agent list is missing or empty.
default_user_agent = "Mozilla/5.0"

# "random" or "round-robin".
strategy = "random"

# ---------------------------------------------------------------------------
# Headless browser
# ---------------------------------------------------------------------------
[browser]
headless = true
sandbox = false
window_size = [1280, 800]
idle_timeout_secs = 60

# ---------------------------------------------------------------------------
# Downloads
# ---------------------------------------------------------------------------
[download]
# Per-request timeout in seconds.
timeout_secs = 10

# Parallel downloads within a category (clamped to CPU cores).
workers = 1
"##
}
