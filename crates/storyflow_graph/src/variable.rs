// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph variables and cross-graph import resolution.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A variable declared on a graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Variable {
    /// Lookup key (`@key` in text)
    pub key: String,
    /// Value, always stored as text
    pub value: String,
    /// Graph this variable is pulled from; empty for local variables
    pub import_from: String,
}

impl Variable {
    /// Locally defined variable
    pub fn local(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            import_from: String::new(),
        }
    }

    /// Variable imported from another graph. `fallback` is used when the
    /// source graph cannot provide the key.
    pub fn imported(key: impl Into<String>, from: impl Into<String>, fallback: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: fallback.into(),
            import_from: from.into(),
        }
    }

    /// Whether the value comes from another graph
    pub fn is_imported(&self) -> bool {
        !self.import_from.is_empty()
    }
}

/// Provides the declared variables of graphs by name
pub trait VariableSource {
    /// Declared variables of `graph`, or `None` if the graph is unknown
    fn variables(&self, graph: &str) -> Option<Vec<Variable>>;
}

impl VariableSource for HashMap<String, Vec<Variable>> {
    fn variables(&self, graph: &str) -> Option<Vec<Variable>> {
        self.get(graph).cloned()
    }
}

/// Resolved key/value pairs visible to a graph, in declaration order
pub type VariableSet = IndexMap<String, String>;

struct Resolver<'a> {
    source: &'a dyn VariableSource,
    done: HashMap<String, VariableSet>,
    in_progress: HashSet<String>,
}

impl<'a> Resolver<'a> {
    fn expand_declared(&mut self, graph: &str, declared: &[Variable]) -> VariableSet {
        self.in_progress.insert(graph.to_string());

        let mut visible = VariableSet::new();
        for var in declared.iter().filter(|v| v.is_imported()) {
            let value = self
                .expand(&var.import_from)
                .and_then(|set| set.get(&var.key).cloned())
                .unwrap_or_else(|| var.value.clone());
            visible.insert(var.key.clone(), value);
        }
        // Locals shadow imports
        for var in declared.iter().filter(|v| !v.is_imported()) {
            visible.insert(var.key.clone(), var.value.clone());
        }

        self.in_progress.remove(graph);
        self.done.insert(graph.to_string(), visible.clone());
        visible
    }

    fn expand(&mut self, graph: &str) -> Option<&VariableSet> {
        if self.in_progress.contains(graph) {
            tracing::debug!("variable import cycle through '{graph}'");
            return None;
        }
        if !self.done.contains_key(graph) {
            let declared = self.source.variables(graph)?;
            self.expand_declared(graph, &declared);
        }
        self.done.get(graph)
    }
}

/// Resolve the visible variables of a named graph. Each graph is expanded at
/// most once; import cycles fall back to the importing entry's own value.
pub fn resolve_variables(graph: &str, source: &dyn VariableSource) -> VariableSet {
    match source.variables(graph) {
        Some(declared) => resolve_declared(graph, &declared, source),
        None => VariableSet::new(),
    }
}

/// Resolve variables for a graph whose declarations are given directly
/// (e.g. an unsaved graph open in the editor).
pub fn resolve_declared(graph: &str, declared: &[Variable], source: &dyn VariableSource) -> VariableSet {
    let mut resolver = Resolver {
        source,
        done: HashMap::new(),
        in_progress: HashSet::new(),
    };
    resolver.expand_declared(graph, declared)
}
