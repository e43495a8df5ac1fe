// SPDX-License-Identifier: MIT OR Apache-2.0
//! Storyflow preview - play an event graph in the terminal.
//!
//! Loads a graph document from a directory store, validates it, resolves its
//! variables (including imports from sibling graphs) and walks it with the
//! event runner, reading choices from stdin.

mod config;
mod session;

use clap::Parser;
use config::{PreviewConfig, PREVIEW_FILE_NAME};
use std::path::PathBuf;
use storyflow_graph::persistence::StoreVariables;
use storyflow_graph::runner::expr::run_script;
use storyflow_graph::{
    validate_all, ConfigError, DirectoryStore, EventRunner, Graph, GraphError, GraphStore, NodeId, Storage,
    StoreError,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "storyflow_preview", version, about = "Dry-run Storyflow event graphs")]
struct Args {
    /// Directory holding the graph documents
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Graph to play
    graph: Option<String>,

    /// Preview settings file (defaults to storyflow_preview.ron in --dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter, overriding the config file
    #[arg(long)]
    log: Option<String>,

    /// List the graphs in --dir and exit
    #[arg(long)]
    list: bool,

    /// Report validation errors and exit without playing
    #[arg(long)]
    validate_only: bool,

    /// Play even if validation fails
    #[arg(long)]
    force: bool,
}

#[derive(Debug, thiserror::Error)]
enum PreviewError {
    #[error("{0} validation error(s), rerun with --force to play anyway")]
    Validation(usize),
    #[error("No graph given, use --list to see the available ones")]
    NoGraph,
    #[error("Start node '{0}' does not exist")]
    UnknownStart(String),
    #[error("Setup script failed on line {line}: {message}")]
    Setup { line: usize, message: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn init_tracing(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| args.dir.join(PREVIEW_FILE_NAME));
    let config = match PreviewConfig::load_or_default(&config_path) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(args.log.as_deref().unwrap_or("storyflow=info"));
            tracing::error!("Failed to read {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };
    init_tracing(args.log.as_deref().unwrap_or(&config.log_filter));

    tracing::info!("Starting Storyflow preview v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args, &config) {
        tracing::error!("Preview failed: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Args, config: &PreviewConfig) -> Result<(), PreviewError> {
    let store = DirectoryStore::new(&args.dir);

    if args.list {
        for name in store.list()? {
            println!("{name}");
        }
        return Ok(());
    }

    let name = args.graph.as_deref().ok_or(PreviewError::NoGraph)?;
    let graph = Graph::from_document(store.load(name)?)?;

    let problems = validate_all(&graph);
    for problem in &problems {
        tracing::warn!("{problem}");
    }
    if args.validate_only {
        println!("{name}: {} validation error(s)", problems.len());
        return Ok(());
    }
    if !problems.is_empty() && config.stop_on_validation_errors && !args.force {
        return Err(PreviewError::Validation(problems.len()));
    }

    let mut storage = Storage::new();
    if let Some((line, err)) = run_script(&config.setup_source(), &mut storage).into_iter().next() {
        return Err(PreviewError::Setup {
            line,
            message: err.to_string(),
        });
    }

    let variables = graph.visible_variables(&StoreVariables(&store));
    tracing::debug!("{} variable(s) visible to '{name}'", variables.len());

    let mut runner = EventRunner::new(&graph, storage).with_variables(variables);
    match &config.start_node {
        Some(start) => {
            if !graph.contains(start) {
                return Err(PreviewError::UnknownStart(start.clone()));
            }
            runner.advance(Some(&NodeId::new(start.as_str())));
        }
        None => runner.start(),
    }

    let stdin = std::io::stdin();
    let outcome = session::run_session(&mut runner, stdin.lock(), std::io::stdout())?;
    tracing::info!("session ended: {outcome:?}");
    Ok(())
}
