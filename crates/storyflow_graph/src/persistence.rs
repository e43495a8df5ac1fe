// SPDX-License-Identifier: MIT OR Apache-2.0
//! Load/save of graph documents.
//!
//! A [`GraphStore`] persists [`GraphDocument`]s by graph name. Saves are
//! all-or-nothing: [`DirectoryStore`] writes to a temporary sibling file and
//! renames it over the target, so a failed save never leaves a truncated
//! document behind.

use crate::graph::GraphDocument;
use crate::variable::{Variable, VariableSource};
use indexmap::IndexMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File extension of stored graph documents
pub const GRAPH_EXTENSION: &str = "json";

/// Load/save contract for graph documents
pub trait GraphStore {
    /// Load the document named `name`
    fn load(&self, name: &str) -> Result<GraphDocument, StoreError>;

    /// Save a document under its own name, replacing any previous version
    fn save(&mut self, doc: &GraphDocument) -> Result<(), StoreError>;

    /// Names of all stored documents, sorted
    fn list(&self) -> Result<Vec<String>, StoreError>;
}

/// Error from a [`GraphStore`]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No document with that name
    #[error("Graph not found: {0}")]
    NotFound(String),

    /// Name cannot be used as a document key
    #[error("Invalid graph name: {0:?}")]
    InvalidName(String),

    /// Filesystem failure
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Document text did not parse
    #[error("Failed to parse {name}: {source}")]
    Parse {
        /// Graph name
        name: String,
        /// Underlying error
        source: serde_json::Error,
    },

    /// Document could not be serialized
    #[error("Failed to serialize {name}: {source}")]
    Serialize {
        /// Graph name
        name: String,
        /// Underlying error
        source: serde_json::Error,
    },
}

/// Reject names that are empty or would escape the store directory
fn check_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ' '));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

/// Store that keeps documents in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    docs: IndexMap<String, GraphDocument>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphStore for MemoryStore {
    fn load(&self, name: &str) -> Result<GraphDocument, StoreError> {
        self.docs
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn save(&mut self, doc: &GraphDocument) -> Result<(), StoreError> {
        check_name(&doc.name)?;
        self.docs.insert(doc.name.clone(), doc.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.docs.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Store that keeps one pretty-printed JSON file per graph in a directory
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Store rooted at `root`; the directory is created on first save
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the documents
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path of the document named `name`
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{GRAPH_EXTENSION}"))
    }
}

impl GraphStore for DirectoryStore {
    fn load(&self, name: &str) -> Result<GraphDocument, StoreError> {
        check_name(name)?;
        let path = self.path_for(name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()));
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        let mut doc: GraphDocument = serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            name: name.to_string(),
            source,
        })?;
        if doc.name.is_empty() {
            doc.name = name.to_string();
        }
        tracing::debug!("loaded graph '{name}' ({} nodes) from {}", doc.nodes.len(), path.display());
        Ok(doc)
    }

    fn save(&mut self, doc: &GraphDocument) -> Result<(), StoreError> {
        check_name(&doc.name)?;
        let text = serde_json::to_string_pretty(doc).map_err(|source| StoreError::Serialize {
            name: doc.name.clone(),
            source,
        })?;
        let path = self.path_for(&doc.name);
        write_text_atomic(&path, &text).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::info!("saved graph '{}' to {}", doc.name, path.display());
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.root.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(GRAPH_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if check_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, text)?;
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("graph");
    let tmp_name = format!(".{file_name}.tmp");
    match path.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}

/// Adapter that lets variable resolution read declared variables of other
/// graphs straight from a store. Graphs that fail to load are treated as
/// missing.
pub struct StoreVariables<'a, S: GraphStore + ?Sized>(pub &'a S);

impl<S: GraphStore + ?Sized> VariableSource for StoreVariables<'_, S> {
    fn variables(&self, graph: &str) -> Option<Vec<Variable>> {
        match self.0.load(graph) {
            Ok(doc) => Some(doc.variables),
            Err(StoreError::NotFound(_)) => None,
            Err(err) => {
                tracing::warn!("could not read variables of '{graph}': {err}");
                None
            }
        }
    }
}
