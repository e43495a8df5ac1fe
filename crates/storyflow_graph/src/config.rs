// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor settings persisted as RON.

use crate::geometry::{MAX_SCALE, MIN_SCALE};
use egui::Pos2;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings file name inside a project directory
pub const SETTINGS_FILE_NAME: &str = "storyflow_editor.ron";

/// Tunables for the graph editor. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Smallest allowed zoom
    pub min_scale: f32,
    /// Largest allowed zoom
    pub max_scale: f32,
    /// Zoom multiplier per wheel notch
    pub zoom_step: f32,
    /// Max time between clicks on one node that counts as a double click
    pub double_click_ms: u64,
    /// Round dragged node positions to the grid on release
    pub snap_to_grid: bool,
    /// Grid cell size used for snapping
    pub snap_size: f32,
    /// Draw the background grid
    pub show_grid: bool,
    /// Background grid spacing in world units
    pub grid_spacing: f32,
    /// Max screen distance for a pointer to hover a connector
    pub connector_hit_distance: f32,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            min_scale: MIN_SCALE,
            max_scale: MAX_SCALE,
            zoom_step: 1.1,
            double_click_ms: 300,
            snap_to_grid: false,
            snap_size: 20.0,
            show_grid: true,
            grid_spacing: 20.0,
            connector_hit_distance: 6.0,
        }
    }
}

impl EditorSettings {
    /// Parse settings from RON text
    pub fn from_ron(content: &str) -> Result<Self, ConfigError> {
        let settings: Self = ron::from_str(content)?;
        if settings.min_scale <= 0.0 || settings.min_scale > settings.max_scale {
            return Err(ConfigError::Invalid(format!(
                "zoom limits {}..{} are not a valid range",
                settings.min_scale, settings.max_scale
            )));
        }
        Ok(settings)
    }

    /// Render settings as pretty RON
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Load settings, falling back to defaults when the file is absent
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("no settings at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    /// Snap a world position to the grid when snapping is enabled
    pub fn snap(&self, pos: Pos2) -> Pos2 {
        if self.snap_to_grid && self.snap_size > 0.0 {
            Pos2::new(
                (pos.x / self.snap_size).round() * self.snap_size,
                (pos.y / self.snap_size).round() * self.snap_size,
            )
        } else {
            pos
        }
    }
}

/// Error when reading or writing settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// RON text did not parse
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Settings could not be serialized
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] ron::Error),

    /// Parsed values are inconsistent
    #[error("Invalid settings: {0}")]
    Invalid(String),
}
