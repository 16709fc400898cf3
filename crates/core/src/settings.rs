//! Reader settings: theme, font family and font size.

use serde::{Deserialize, Serialize};

pub const MIN_FONT_SIZE: u32 = 12;
pub const MAX_FONT_SIZE: u32 = 32;
pub const DEFAULT_FONT_SIZE: u32 = 18;
/// Increment applied by the font size buttons.
pub const FONT_SIZE_STEP: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
    Sepia,
    Amber,
    Green,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Sepia => "sepia",
            Theme::Amber => "amber",
            Theme::Green => "green",
        }
    }
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "sepia" => Ok(Theme::Sepia),
            "amber" => Ok(Theme::Amber),
            "green" => Ok(Theme::Green),
            other => Err(format!("Unknown theme: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontFamily {
    #[default]
    Serif,
    Sans,
    Mono,
}

impl FontFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            FontFamily::Serif => "serif",
            FontFamily::Sans => "sans",
            FontFamily::Mono => "mono",
        }
    }

    /// CSS `font-family` stack applied to the content surface.
    pub fn css_stack(&self) -> &'static str {
        match self {
            FontFamily::Serif => "'Georgia', 'Times New Roman', serif",
            FontFamily::Sans => "'Inter', -apple-system, sans-serif",
            FontFamily::Mono => "'Courier New', 'Consolas', monospace",
        }
    }
}

impl std::str::FromStr for FontFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "serif" => Ok(FontFamily::Serif),
            "sans" | "sans-serif" => Ok(FontFamily::Sans),
            "mono" | "monospace" => Ok(FontFamily::Mono),
            other => Err(format!("Unknown font family: {other}")),
        }
    }
}

/// Wire shape is `{theme, font_family, font_size}`; the server may send more fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderSettings {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub font_family: FontFamily,
    #[serde(default = "default_font_size", deserialize_with = "deserialize_font_size")]
    pub font_size: u32,
}

fn default_font_size() -> u32 {
    DEFAULT_FONT_SIZE
}

fn deserialize_font_size<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = u32::deserialize(deserializer)?;
    Ok(clamp_font_size(raw as i64))
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            font_family: FontFamily::Serif,
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}

impl ReaderSettings {
    /// Apply a size delta, clamped to the supported range. Returns the new size.
    pub fn change_font_size(&mut self, delta: i32) -> u32 {
        self.font_size = clamp_font_size(self.font_size as i64 + delta as i64);
        self.font_size
    }
}

pub fn clamp_font_size(size: i64) -> u32 {
    size.clamp(MIN_FONT_SIZE as i64, MAX_FONT_SIZE as i64) as u32
}
