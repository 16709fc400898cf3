//! Host data blob (`BookData`) and the tuning file at
//! `~/.config/retroreader/config.toml`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pagination::COLUMN_GAP;
use crate::security::SecurityLimits;
use crate::settings::{FontFamily, ReaderSettings, Theme, DEFAULT_FONT_SIZE};

/// Initial state handed over by the host page. This is the only
/// configuration surface of a reader session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookData {
    pub epub_url: String,
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default)]
    pub saved_progress: Option<SavedProgress>,
    pub api_urls: ApiUrls,
    /// Theme already applied by the page, used until remote settings arrive.
    #[serde(default)]
    pub theme: Option<Theme>,
}

impl BookData {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedProgress {
    #[serde(default)]
    pub cfi: Option<String>,
    #[serde(default)]
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUrls {
    pub save_progress: String,
    pub bookmarks: String,
    pub create_bookmark: String,
    /// Prefix; the bookmark id and `/delete/` are appended.
    pub delete_bookmark_base: String,
    pub settings: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReaderConfig {
    #[serde(default)]
    pub reader: TimingConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_column_gap")]
    pub column_gap: f64,
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,
    #[serde(default = "default_resize_debounce_ms")]
    pub resize_debounce_ms: u64,
    #[serde(default = "default_autosave_interval_secs")]
    pub autosave_interval_secs: u64,
}

fn default_column_gap() -> f64 {
    COLUMN_GAP
}
fn default_save_debounce_ms() -> u64 {
    2000
}
fn default_resize_debounce_ms() -> u64 {
    200
}
fn default_autosave_interval_secs() -> u64 {
    30
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            column_gap: COLUMN_GAP,
            save_debounce_ms: 2000,
            resize_debounce_ms: 200,
            autosave_interval_secs: 30,
        }
    }
}

impl TimingConfig {
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs.max(1))
    }
}

/// Viewport and typography used when no host measures a real frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
    pub theme: Theme,
    pub font_family: FontFamily,
    pub font_size: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 720.0,
            height: 960.0,
            padding: 0.0,
            theme: Theme::Dark,
            font_family: FontFamily::Serif,
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}

impl DisplayConfig {
    pub fn settings(&self) -> ReaderSettings {
        ReaderSettings {
            theme: self.theme,
            font_family: self.font_family,
            font_size: crate::settings::clamp_font_size(self.font_size as i64),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub max_file_size_mb: Option<u64>,
    pub max_compression_ratio: Option<u64>,
    pub max_file_count: Option<u64>,
}

/// Load config from the default path. Any error yields the defaults.
pub fn load_config() -> ReaderConfig {
    let Some(path) = config_path() else {
        return ReaderConfig::default();
    };

    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(_) => return ReaderConfig::default(),
    };

    match toml::from_str::<ReaderConfig>(&content) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("Ignoring invalid config {}: {}", path.display(), e);
            ReaderConfig::default()
        }
    }
}

/// Default config file path (for init and show).
pub fn config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|mut p| {
        p.push("retroreader");
        p.push("config.toml");
        p
    })
}

/// Build security limits from config. Unset values keep their defaults.
pub fn security_limits_from_config(c: &SecurityConfig) -> SecurityLimits {
    let mut limits = SecurityLimits::default();
    if let Some(mb) = c.max_file_size_mb {
        limits.max_total_size_bytes = mb.saturating_mul(1024).saturating_mul(1024);
    }
    if let Some(r) = c.max_compression_ratio {
        limits.max_compression_ratio = r;
    }
    if let Some(n) = c.max_file_count {
        limits.max_file_count = n;
    }
    limits
}
