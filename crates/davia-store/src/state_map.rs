//! Thread state map: where each graph keeps its message history.
//!
//! One SQLite connection lives on a dedicated worker thread. Callers send
//! commands over a channel and await the reply, so disk I/O never runs on
//! the async scheduler and writes are applied one at a time.

use davia_core::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

pub const STATE_MAP_TABLE: &str = "graph_state_maps";

const COMMAND_QUEUE: usize = 64;

/// Storage for graph name → messages path.
#[async_trait::async_trait]
pub trait StateMapStore: Send + Sync {
    /// The recorded messages path; `NotFound` when the graph has none.
    async fn get(&self, graph_name: &str) -> Result<String>;

    /// Insert or replace the mapping for `graph_name`.
    async fn upsert(&self, graph_name: &str, messages_path: &str) -> Result<()>;
}

enum Command {
    Get {
        graph_name: String,
        reply: oneshot::Sender<Result<Option<String>>>,
    },
    Upsert {
        graph_name: String,
        messages_path: String,
        reply: oneshot::Sender<Result<()>>,
    },
}

pub struct SqliteStateMap {
    database_path: PathBuf,
    commands: mpsc::Sender<Command>,
}

impl SqliteStateMap {
    /// Open (creating if needed) the database and start its worker thread.
    pub fn open(database_path: impl Into<PathBuf>) -> Result<Self> {
        let database_path = database_path.into();
        let connection = open_connection(&database_path)?;
        ensure_schema(&connection).map_err(|e| storage_error("create table", e))?;

        let (commands, queue) = mpsc::channel(COMMAND_QUEUE);
        std::thread::Builder::new()
            .name("davia-state-map".into())
            .spawn(move || run_worker(connection, queue))?;

        info!("State map database: {}", database_path.display());
        Ok(Self {
            database_path,
            commands,
        })
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (reply, answer) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| Error::StorageError("state map worker has stopped".into()))?;
        answer
            .await
            .map_err(|_| Error::StorageError("state map worker dropped the request".into()))?
    }
}

#[async_trait::async_trait]
impl StateMapStore for SqliteStateMap {
    async fn get(&self, graph_name: &str) -> Result<String> {
        let graph = graph_name.to_string();
        let found = self
            .request(|reply| Command::Get {
                graph_name: graph,
                reply,
            })
            .await?;
        found.ok_or_else(|| {
            Error::NotFound(format!("no state map recorded for graph '{}'", graph_name))
        })
    }

    async fn upsert(&self, graph_name: &str, messages_path: &str) -> Result<()> {
        let (graph, path) = (graph_name.to_string(), messages_path.to_string());
        self.request(|reply| Command::Upsert {
            graph_name: graph,
            messages_path: path,
            reply,
        })
        .await
    }
}

fn run_worker(mut connection: Connection, mut queue: mpsc::Receiver<Command>) {
    while let Some(command) = queue.blocking_recv() {
        match command {
            Command::Get { graph_name, reply } => {
                let result = select_path(&connection, &graph_name)
                    .map_err(|e| storage_error("get", e));
                let _ = reply.send(result);
            }
            Command::Upsert {
                graph_name,
                messages_path,
                reply,
            } => {
                let result = upsert_path(&mut connection, &graph_name, &messages_path)
                    .map_err(|e| storage_error("upsert", e));
                if let Err(e) = &result {
                    warn!("State map write failed for {}: {}", graph_name, e);
                }
                let _ = reply.send(result);
            }
        }
    }
    debug!("State map worker exiting");
}

fn open_connection(database_path: &Path) -> Result<Connection> {
    if let Some(parent) = database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            Error::StorageError(format!(
                "cannot create state map directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }
    Connection::open(database_path).map_err(|e| storage_error("open", e))
}

fn ensure_schema(connection: &Connection) -> rusqlite::Result<()> {
    connection.execute_batch(
        "
CREATE TABLE IF NOT EXISTS graph_state_maps (
    graph_name TEXT PRIMARY KEY,
    messages_path TEXT NOT NULL
);
",
    )
}

fn select_path(connection: &Connection, graph_name: &str) -> rusqlite::Result<Option<String>> {
    connection
        .query_row(
            "SELECT messages_path FROM graph_state_maps WHERE graph_name = ?1",
            params![graph_name],
            |row| row.get(0),
        )
        .optional()
}

fn upsert_path(
    connection: &mut Connection,
    graph_name: &str,
    messages_path: &str,
) -> rusqlite::Result<()> {
    let transaction = connection.transaction()?;
    transaction.execute(
        "
INSERT INTO graph_state_maps (graph_name, messages_path)
VALUES (?1, ?2)
ON CONFLICT(graph_name) DO UPDATE SET
    messages_path = excluded.messages_path
",
        params![graph_name, messages_path],
    )?;
    transaction.commit()
}

fn storage_error(operation: &str, error: rusqlite::Error) -> Error {
    Error::StorageError(format!("sqlite state map '{}' failed: {}", operation, error))
}
