// SPDX-License-Identifier: MIT OR Apache-2.0
//! Event graph interpreter.
//!
//! The runner walks a [`Graph`] from its start node, runs Exec action
//! scripts against a [`Storage`], filters Choice entries and resolves Switch
//! branches. Errors are recorded as data; once any error is recorded the
//! runner refuses to move until [`EventRunner::reset`].

pub mod expr;
pub mod storage;

pub use expr::ExprError;
pub use storage::Storage;

use crate::graph::Graph;
use crate::node::{Node, NodeBody, NodeId};
use crate::variable::VariableSet;
use expr::{display_value, eval_condition, run_script, substitute};
use std::fmt;
use thiserror::Error;

/// Upper bound on node transitions caused by one `advance` call. Cycles of
/// transparent Exec nodes or Switch nodes would otherwise never settle.
pub const MAX_TRANSITIONS_PER_ADVANCE: usize = 1000;

/// An interpreter error, attributed to the node being executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunError {
    /// Node that raised the error
    pub node_id: Option<NodeId>,
    /// Human-readable description
    pub message: String,
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node_id {
            Some(id) => write!(f, "[{id}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// A choice currently offered to the player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayChoice {
    /// Index into the Choice node's declared entries
    pub index: usize,
    /// Substituted label
    pub text: String,
    /// Target when picked
    pub next: Option<NodeId>,
}

/// Rejected call to [`EventRunner::choose`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChooseError {
    /// No displayed choice at that position
    #[error("No choice {0} is on display")]
    OutOfRange(usize),
    /// The runner has recorded errors
    #[error("Runner is stopped on an error")]
    Stuck,
}

/// Interpreter state for one walk through a graph
pub struct EventRunner<'g> {
    graph: &'g Graph,
    variables: VariableSet,
    storage: Storage,
    current: Option<NodeId>,
    errors: Vec<RunError>,
    display_text: String,
    display_choices: Vec<DisplayChoice>,
    pending_prefix: String,
    finished: bool,
}

impl<'g> EventRunner<'g> {
    /// Create a runner over `graph` with caller-supplied storage. Call
    /// [`EventRunner::start`] to enter the start node.
    pub fn new(graph: &'g Graph, storage: Storage) -> Self {
        Self {
            graph,
            variables: VariableSet::new(),
            storage,
            current: None,
            errors: Vec::new(),
            display_text: String::new(),
            display_choices: Vec::new(),
            pending_prefix: String::new(),
            finished: false,
        }
    }

    /// Provide resolved graph variables for `@key` substitution
    pub fn with_variables(mut self, variables: VariableSet) -> Self {
        self.variables = variables;
        self
    }

    /// Enter the start node: `"root"` if present, else the first node
    pub fn start(&mut self) {
        let start = self.graph.start_node_id().cloned();
        self.advance(start.as_ref());
    }

    /// Drop all progress and errors and start over with new storage
    pub fn reset(&mut self, storage: Storage) {
        self.storage = storage;
        self.current = None;
        self.errors.clear();
        self.display_text.clear();
        self.display_choices.clear();
        self.pending_prefix.clear();
        self.finished = false;
    }

    /// Move to `next`. Does nothing once an error has been recorded; an
    /// empty or unknown target finishes the run.
    pub fn advance(&mut self, next: Option<&NodeId>) {
        if self.is_stuck() {
            tracing::warn!("advance ignored: runner has {} error(s)", self.errors.len());
            return;
        }
        self.walk(next.cloned());
    }

    /// Continue past the text shown by the current Exec node. Does nothing
    /// while choices are on offer or after the run finished.
    pub fn proceed(&mut self) {
        if self.finished || !self.display_choices.is_empty() {
            return;
        }
        let next = match self.current_node().map(|n| &n.body) {
            Some(NodeBody::Exec(exec)) => exec.next.clone(),
            _ => return,
        };
        self.advance(next.as_ref());
    }

    /// Pick a displayed choice: run its script, queue its prefix text, and
    /// advance to its target
    pub fn choose(&mut self, position: usize) -> Result<(), ChooseError> {
        if self.is_stuck() {
            return Err(ChooseError::Stuck);
        }
        let picked = self
            .display_choices
            .get(position)
            .cloned()
            .ok_or(ChooseError::OutOfRange(position))?;

        let node = self.current_node();
        if let Some(NodeBody::Choice(choice)) = node.map(|n| &n.body) {
            if let Some(entry) = choice.choices.get(picked.index) {
                let node_id = node.map(|n| n.id.clone());
                let script = self.substitute(&entry.eval_str);
                self.run_actions(node_id.as_ref(), &script);
                self.pending_prefix = self.substitute(&entry.prefix_text);
            }
        }
        self.advance(picked.next.as_ref());
        Ok(())
    }

    fn walk(&mut self, mut next: Option<NodeId>) {
        let graph = self.graph;
        let mut transitions = 0;

        loop {
            if self.is_stuck() {
                return;
            }
            self.display_text.clear();
            self.display_choices.clear();

            let Some(id) = next.take() else {
                tracing::debug!("reached an unlinked exit, run finished");
                self.finish();
                return;
            };

            transitions += 1;
            if transitions > MAX_TRANSITIONS_PER_ADVANCE {
                self.record(
                    Some(&id),
                    format!("Stopped after {MAX_TRANSITIONS_PER_ADVANCE} transitions without reaching displayable content"),
                );
                return;
            }

            let Some(node) = graph.node(id.as_str()) else {
                tracing::warn!("link to missing node '{id}', run finished");
                self.current = Some(id);
                self.finish();
                return;
            };
            self.current = Some(id);
            tracing::debug!(node = %node.id, kind = ?node.kind(), "entering node");

            match &node.body {
                NodeBody::Exec(exec) => {
                    let script = self.substitute(&exec.action_script);
                    self.run_actions(Some(&node.id), &script);

                    let text = self.substitute(&exec.text);
                    if text.is_empty() {
                        next = exec.next.clone();
                        continue;
                    }
                    self.display_text = self.with_prefix(text);
                    return;
                }
                NodeBody::Choice(choice) => {
                    let prompt = self.substitute(&choice.prompt_text);
                    self.display_text = self.with_prefix(prompt);
                    let mut shown = Vec::new();
                    for (index, entry) in choice.choices.iter().enumerate() {
                        if self.condition(node, &entry.condition_str) {
                            shown.push(DisplayChoice {
                                index,
                                text: self.substitute(&entry.text),
                                next: entry.next.clone(),
                            });
                        }
                    }
                    self.display_choices = shown;
                    return;
                }
                NodeBody::Switch(switch) => {
                    let mut target = switch.default_next.clone();
                    for case in &switch.cases {
                        if self.condition(node, &case.condition_str) {
                            target = case.next.clone();
                            break;
                        }
                        if self.is_stuck() {
                            return;
                        }
                    }
                    next = target;
                }
                NodeBody::End => {
                    self.display_text = std::mem::take(&mut self.pending_prefix);
                    self.finish();
                    return;
                }
                NodeBody::Comment(_) => {
                    self.record(Some(&node.id), "Comment nodes cannot be executed".to_string());
                    self.finish();
                    return;
                }
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }

    fn with_prefix(&mut self, text: String) -> String {
        let prefix = std::mem::take(&mut self.pending_prefix);
        match (prefix.is_empty(), text.is_empty()) {
            (true, _) => text,
            (false, true) => prefix,
            (false, false) => format!("{prefix}\n{text}"),
        }
    }

    fn condition(&mut self, node: &Node, source: &str) -> bool {
        let expr = self.substitute(source);
        match eval_condition(&expr, &self.storage) {
            Ok(value) => value,
            Err(err) => {
                self.record(Some(&node.id), format!("Condition '{expr}': {err}"));
                false
            }
        }
    }

    fn run_actions(&mut self, node_id: Option<&NodeId>, script: &str) {
        for (line, err) in run_script(script, &mut self.storage) {
            self.record(node_id, format!("Line {line}: {err}"));
        }
    }

    fn record(&mut self, node_id: Option<&NodeId>, message: String) {
        let error = RunError {
            node_id: node_id.cloned(),
            message,
        };
        tracing::warn!("event runner error: {error}");
        self.errors.push(error);
    }

    /// Replace `@key` tokens with storage values, falling back to graph
    /// variables
    pub fn substitute(&self, text: &str) -> String {
        substitute(text, |key| {
            self.storage
                .get(key)
                .map(display_value)
                .or_else(|| self.variables.get(key).cloned())
        })
    }

    /// Current storage
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Take the storage out of the runner
    pub fn into_storage(self) -> Storage {
        self.storage
    }

    /// Id of the node the runner is on
    pub fn current_node_id(&self) -> Option<&NodeId> {
        self.current.as_ref()
    }

    /// Node the runner is on, if it exists
    pub fn current_node(&self) -> Option<&'g Node> {
        let graph = self.graph;
        self.current.as_ref().and_then(|id| graph.node(id.as_str()))
    }

    /// Recorded errors, oldest first
    pub fn errors(&self) -> &[RunError] {
        &self.errors
    }

    /// Recorded errors as display strings
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// Whether an error has halted the runner
    pub fn is_stuck(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether the run reached an End node or an unlinked exit
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Text to show for the current node
    pub fn display_text(&self) -> &str {
        &self.display_text
    }

    /// Choices on offer at the current node
    pub fn display_choices(&self) -> &[DisplayChoice] {
        &self.display_choices
    }
}
