//! Annotator settings

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::viewport::highlight::HighlightStyle;
use crate::viewport::scene_graph::rgb_from_hex;
use crate::viewport::visuals::{VisualPalette, MAX_PERSISTENT_MARKERS};

/// Colors as `0xRRGGBB`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteSettings {
    /// Click marker and outline of the current selection
    pub temporary_color: u32,
    /// Markers and outlines of saved annotations
    pub persistent_color: u32,
    pub highlight_color: u32,
    pub highlight_opacity: f32,
    pub temporary_marker_radius: f32,
    pub persistent_marker_radius: f32,
}

impl Default for PaletteSettings {
    fn default() -> Self {
        Self {
            temporary_color: 0xff0000,
            persistent_color: 0x00cc00,
            highlight_color: 0xffff00,
            highlight_opacity: 0.6,
            temporary_marker_radius: 0.03,
            persistent_marker_radius: 0.04,
        }
    }
}

impl PaletteSettings {
    pub fn visual_palette(&self) -> VisualPalette {
        VisualPalette {
            temporary_marker: rgb_from_hex(self.temporary_color),
            temporary_outline: rgb_from_hex(self.temporary_color),
            persistent_marker: rgb_from_hex(self.persistent_color),
            persistent_outline: rgb_from_hex(self.persistent_color),
            temporary_marker_radius: self.temporary_marker_radius,
            persistent_marker_radius: self.persistent_marker_radius,
        }
    }

    pub fn highlight_style(&self) -> HighlightStyle {
        HighlightStyle {
            color: rgb_from_hex(self.highlight_color),
            opacity: self.highlight_opacity.clamp(0.0, 1.0),
        }
    }
}

/// All annotator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorSettings {
    /// Base URL of the annotation backend
    pub backend_url: String,
    /// Live persistent visual entries kept in the scene
    pub max_persistent_markers: usize,
    pub request_timeout_secs: u64,
    /// Distance factor used when framing a freshly loaded scene
    pub camera_fit_offset: f32,
    pub palette: PaletteSettings,
}

impl Default for AnnotatorSettings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:5004".to_string(),
            max_persistent_markers: MAX_PERSISTENT_MARKERS,
            request_timeout_secs: 30,
            camera_fit_offset: 1.8,
            palette: PaletteSettings::default(),
        }
    }
}

impl AnnotatorSettings {
    /// Settings file in the platform config dir
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "annotator", "annotator")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Load settings from the platform config dir, or defaults if absent or
    /// unreadable
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|e| {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }),
            _ => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Save settings to the platform config dir
    pub fn save(&self) {
        if let Some(path) = Self::default_path() {
            if let Some(dir) = path.parent() {
                if std::fs::create_dir_all(dir).is_ok() {
                    if let Ok(json) = serde_json::to_string_pretty(self) {
                        let _ = std::fs::write(path, json);
                    }
                }
            }
        }
    }

    /// Parsed backend URL with a trailing slash so relative joins keep the path
    pub fn backend_base(&self) -> Result<reqwest::Url, ConfigError> {
        let mut raw = self.backend_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = reqwest::Url::parse(&raw).map_err(|_| ConfigError::BackendUrl(self.backend_url.clone()))?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::BackendUrl(self.backend_url.clone()));
        }
        Ok(url)
    }
}
