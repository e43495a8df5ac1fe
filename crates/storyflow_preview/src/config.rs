// SPDX-License-Identifier: MIT OR Apache-2.0
//! Preview settings, read from a RON file next to the graphs.

use serde::{Deserialize, Serialize};
use std::path::Path;
use storyflow_graph::ConfigError;

/// Default settings file name inside the graph directory
pub const PREVIEW_FILE_NAME: &str = "storyflow_preview.ron";

/// How a preview session is set up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Action lines run against empty storage before the walk starts
    pub setup_script: Vec<String>,
    /// Refuse to run graphs that fail validation
    pub stop_on_validation_errors: bool,
    /// Enter this node instead of the graph's start node
    pub start_node: Option<String>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            log_filter: "storyflow=info".to_string(),
            setup_script: Vec::new(),
            stop_on_validation_errors: true,
            start_node: None,
        }
    }
}

impl PreviewConfig {
    /// Parse from RON text
    pub fn from_ron(content: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(content)?)
    }

    /// Read `path`, or use defaults when it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("no preview config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Setup lines joined into one action script
    pub fn setup_source(&self) -> String {
        self.setup_script.join("\n")
    }
}
