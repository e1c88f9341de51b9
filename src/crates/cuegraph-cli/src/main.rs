//! `cuegraphd` — loads a graph file, wires the console transport, and runs
//! the tick loop. The ambient "how a user actually runs this" surface,
//! grounded in the teacher's `orchestrator-server` binary (tracing init,
//! config load with a graceful fallback, `Ctrl-C`/`SIGTERM` shutdown).

mod config;
mod error;
mod host;

use clap::{Parser, Subcommand};
use cuegraph_core::runtime::Callbacks;
use cuegraph_core::{GraphState, NodeRegistry, Runtime, RuntimeOptions};
use cuegraph_net::{ConnectionRegistry, ConnectionRegistryOptions, Dispatcher, DispatcherOptions};
use error::{CliError, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "cuegraphd")]
#[command(about = "Tick-driven node graph runtime for live-performance cue orchestration")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a graph file and run the tick loop until interrupted.
    Run {
        /// Path to a JSON graph file ({ "nodes": [...], "connections": [...] }).
        graph: PathBuf,
    },
    /// Load a graph file, validate it against the node catalog, and exit.
    Validate {
        graph: PathBuf,
    },
    /// List every registered node type.
    Nodes,
}

fn load_graph_file(path: &Path) -> Result<GraphState> {
    let content = std::fs::read_to_string(path).map_err(|source| CliError::Read { path: path.display().to_string(), source })?;
    serde_json::from_str(&content).map_err(|source| CliError::GraphJson { path: path.display().to_string(), source })
}

fn build_registry() -> Arc<NodeRegistry> {
    let registry = Arc::new(NodeRegistry::new());
    cuegraph_nodes::register_builtin_nodes(&registry).expect("built-in node catalog must register cleanly");
    registry
}

fn print_nodes(registry: &NodeRegistry) {
    let mut defs = registry.list();
    defs.sort_by(|a, b| (a.category.as_str(), a.node_type.as_str()).cmp(&(b.category.as_str(), b.node_type.as_str())));
    for def in defs {
        println!("{:<12} {:<28} {}", def.category, def.node_type, def.label);
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let cfg = config::RuntimeConfig::load();

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| cfg.log_filter.clone());
    tracing_subscriber::fmt().with_env_filter(filter).init();
    tracing::info!(tick_interval_ms = cfg.tick_interval_ms, "cuegraphd starting");

    match cli.command {
        Commands::Nodes => {
            print_nodes(&build_registry());
            Ok(())
        }
        Commands::Validate { graph } => {
            let registry = build_registry();
            let state = load_graph_file(&graph)?;
            state.validate(&registry)?;
            println!("graph OK: {} nodes, {} connections", state.nodes.len(), state.connections.len());
            Ok(())
        }
        Commands::Run { graph } => run(cfg, &graph).await.map_err(Into::into),
    }
}

async fn run(cfg: config::RuntimeConfig, graph_path: &Path) -> Result<()> {
    let connection_registry = Arc::new(ConnectionRegistry::new(ConnectionRegistryOptions {
        grace_period_ms: cfg.connection_registry.grace_period_ms,
        ..ConnectionRegistryOptions::default()
    }));

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&connection_registry),
        DispatcherOptions { max_clock_skew_ms: cfg.dispatcher.max_clock_skew_ms, callbacks: host::console_dispatcher_callbacks() },
    ));

    let registry = Arc::new(NodeRegistry::new());
    let node_host = host::console_node_host(Arc::clone(&connection_registry));
    cuegraph_nodes::register_builtin_nodes_with_host(&registry, node_host)?;

    // `Callbacks::on_command` carries no timestamp (spec §6); the tick loop
    // below stamps this before every `tick_once` so the dispatcher clamps
    // `executeAt` against the same clock the runtime just ticked on.
    let shared_now = Arc::new(AtomicI64::new(0));
    let dispatch_cb = Arc::clone(&dispatcher);
    let now_cb = Arc::clone(&shared_now);
    let on_command: Arc<dyn Fn(&cuegraph_core::Target, &cuegraph_core::value::Cmd) + Send + Sync> = Arc::new(move |target, cmd| {
        dispatch_cb.dispatch(target, cmd, now_cb.load(Ordering::Relaxed));
    });

    let mut runtime = Runtime::new(
        Arc::clone(&registry),
        RuntimeOptions {
            tick_interval_ms: cfg.tick_interval_ms,
            watchdog: cfg.watchdog.clone().into(),
            callbacks: Callbacks { on_command: Some(on_command), ..Callbacks::default() },
            ..RuntimeOptions::default()
        },
    );

    let state = load_graph_file(graph_path)?;
    runtime.load_graph(state)?;
    tracing::info!(nodes = runtime.node_count(), connections = runtime.connection_count(), "graph loaded");

    let interval_ms = runtime.tick_interval_ms();
    let mut interval = tokio::time::interval(std::time::Duration::from_millis(interval_ms));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = runtime.now_ms();
                shared_now.store(now, Ordering::Relaxed);
                let events = runtime.tick_once(now);
                for event in &events {
                    tracing::warn!(reason = ?event.reason, message = %event.message, "watchdog event");
                }
                connection_registry.purge_expired(now);
                if runtime.is_halted() {
                    tracing::error!("runtime halted, exiting tick loop");
                    break;
                }
            }
            _ = shutdown_signal() => {
                tracing::info!("shutdown requested");
                break;
            }
        }
    }

    runtime.stop_now();
    tracing::info!("cuegraphd shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl-C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
