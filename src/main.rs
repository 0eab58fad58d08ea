//! davia: local dev server for LangGraph agents

use anyhow::Context;
use clap::{Parser, Subcommand};
use davia_gateway::{bootstrap, start_dev_server, DevConfig};
use davia_graph::{validate_messages_path, DynamicLoader};
use davia_store::{SqliteStateMap, StateMapStore};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "davia", version, about = "Davia: serve and introspect LangGraph agents")]
struct Cli {
    /// Config file (default: ./davia.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a graph and start the dev server
    Dev {
        /// Graph locator, `module.path:graph` or `file.toml:graph`
        locator: String,
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
        /// SQLite file for per-graph state maps
        #[arg(long)]
        state_db: Option<PathBuf>,
        /// LangGraph API base URL
        #[arg(long)]
        engine_url: Option<String>,
        /// Skip fetching state schemas from the engine's assistants
        #[arg(long)]
        no_assistants: bool,
    },
    /// Print the schema entry of a graph or task
    Schema {
        locator: String,
    },
    /// Inspect or change where a graph keeps its messages
    StateMap {
        #[command(subcommand)]
        action: StateMapAction,
    },
}

#[derive(Subcommand)]
enum StateMapAction {
    /// Show the messages path recorded for a graph
    Get {
        /// Graph name (default: the active graph)
        #[arg(short, long)]
        graph: Option<String>,
        #[arg(long)]
        state_db: Option<PathBuf>,
    },
    /// Record the messages path for a graph
    Set {
        messages_path: String,
        #[arg(short, long)]
        graph: Option<String>,
        #[arg(long)]
        state_db: Option<PathBuf>,
    },
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "davia=info,tower_http=info".into());
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());

    match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .context("log file path has no file name")?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            registry
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            registry.init();
            Ok(None)
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<DevConfig> {
    let cwd = std::env::current_dir()?;
    Ok(DevConfig::load(path, &cwd)?.with_env()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file.as_deref())?;
    let mut config = load_config(cli.config.as_deref())?;
    tracing::debug!(?config, "Effective configuration");

    match cli.command {
        Commands::Dev {
            locator,
            host,
            port,
            state_db,
            engine_url,
            no_assistants,
        } => {
            config.graph = Some(locator);
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(db) = state_db {
                config.state_db = Some(db);
            }
            if let Some(url) = engine_url {
                config.engine_url = url;
            }
            if no_assistants {
                config.assistants.enabled = false;
            }

            let state = bootstrap(config, DynamicLoader::new()?)
                .context("failed to load the dev server")?;
            start_dev_server(state).await?;
        }
        Commands::Schema { locator } => {
            let handle = DynamicLoader::new()?.load(&locator)?;
            println!("{}", serde_json::to_string_pretty(&handle.schema_entry())?);
        }
        Commands::StateMap { action } => match action {
            StateMapAction::Get { graph, state_db } => {
                let (store, graph) = open_state_map(&mut config, graph, state_db)?;
                println!("{}", store.get(&graph).await?);
            }
            StateMapAction::Set {
                messages_path,
                graph,
                state_db,
            } => {
                validate_messages_path(&messages_path)?;
                let (store, graph) = open_state_map(&mut config, graph, state_db)?;
                store.upsert(&graph, &messages_path).await?;
                println!("{} -> {}", graph, messages_path);
            }
        },
    }

    Ok(())
}

fn open_state_map(
    config: &mut DevConfig,
    graph: Option<String>,
    state_db: Option<PathBuf>,
) -> anyhow::Result<(SqliteStateMap, String)> {
    if let Some(db) = state_db {
        config.state_db = Some(db);
    }
    let graph = match graph {
        Some(g) => g,
        None => config.active_graph()?.name,
    };
    let store = SqliteStateMap::open(config.require_state_db()?)?;
    Ok((store, graph))
}
