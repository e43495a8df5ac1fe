// SPDX-License-Identifier: MIT OR Apache-2.0
//! Event graph framework for the Storyflow editor.
//!
//! Designers compose game events (dialogue and branching logic) as graphs of
//! typed nodes joined by directed links, and dry-run them with an embedded
//! interpreter before shipping.
//!
//! ## Architecture
//!
//! - [`node`], [`graph`], [`connection`]: the graph model. Links live on the
//!   emitting node; connectors are a derived view.
//! - [`geometry`], [`layout`]: viewport transform, hit-testing math and node
//!   metrics.
//! - [`interaction`]: the editor state machine fed by host input events.
//! - [`render`]: a pure display-list builder and an egui painter backend.
//! - [`validation`]: structural checks.
//! - [`runner`]: the `EventRunner` interpreter and its expression language.
//! - [`variable`], [`persistence`], [`config`]: cross-graph variables,
//!   document stores and editor settings.

pub mod config;
pub mod connection;
pub mod geometry;
pub mod graph;
pub mod interaction;
pub mod layout;
pub mod node;
pub mod persistence;
pub mod render;
pub mod runner;
pub mod validation;
pub mod variable;

pub use config::{ConfigError, EditorSettings};
pub use connection::Connector;
pub use geometry::Viewport;
pub use graph::{Graph, GraphDocument, GraphError};
pub use interaction::{EditorAction, EditorState, InputEvent, Mode};
pub use node::{Node, NodeBody, NodeId, NodeKind};
pub use persistence::{DirectoryStore, GraphStore, MemoryStore, StoreError};
pub use runner::{EventRunner, RunError, Storage};
pub use validation::{validate, validate_all, ValidationError};
pub use variable::{resolve_variables, Variable, VariableSet, VariableSource};
