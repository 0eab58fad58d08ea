//! Dev server: application state, router, and startup

use crate::config::{ActiveGraph, DevConfig};
use crate::{chat, schemas};
use axum::{
    routing::{get, post},
    Json, Router,
};
use davia_core::{Error, Result};
use davia_graph::{
    AssistantsClient, DynamicLoader, ExecutionEngine, Registry, RemoteEngine, DEFAULT_MESSAGES_PATH,
};
use davia_store::{SqliteStateMap, StateMapStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

pub struct AppState {
    pub config: DevConfig,
    pub registry: Arc<Registry>,
    pub loader: Arc<DynamicLoader>,
    pub engine: Arc<dyn ExecutionEngine>,
    pub store: Option<Arc<dyn StateMapStore>>,
    pub assistants: Option<Arc<AssistantsClient>>,
}

impl AppState {
    pub fn store(&self) -> Result<&Arc<dyn StateMapStore>> {
        self.store
            .as_ref()
            .ok_or_else(|| Error::config_missing(crate::config::ENV_STATE_DB))
    }

    pub fn active_graph(&self) -> Result<ActiveGraph> {
        self.config.active_graph()
    }

    /// Where `graph` keeps its messages. Without persistence, or without a
    /// recorded mapping, that is the default top-level `messages`.
    pub async fn messages_path(&self, graph: &str) -> Result<String> {
        let Some(store) = &self.store else {
            return Ok(DEFAULT_MESSAGES_PATH.to_string());
        };
        match store.get(graph).await {
            Ok(path) => Ok(path),
            Err(Error::NotFound(_)) => {
                debug!("No state map for {}, using default", graph);
                Ok(DEFAULT_MESSAGES_PATH.to_string())
            }
            Err(e) => Err(e),
        }
    }
}

/// Build the application state: load the active graph (failing fast on
/// loader errors), register configured modules, and wire the engine and
/// persistence.
pub fn bootstrap(config: DevConfig, loader: DynamicLoader) -> Result<AppState> {
    let registry = Registry::new();

    for module in &config.modules {
        let module = loader.import_module(module)?;
        let count = registry.register_module(&module);
        info!("Registered {} entries from {}", count, module.source_file);
    }

    if let Some(locator) = &config.graph {
        let locator_module = davia_core::Locator::parse(locator)?;
        let module = loader.import_module(locator_module.module())?;
        registry.register_module(&module);
        let active = config.active_graph()?;
        registry.ensure_graph(&active.name, &active.locator, &loader)?;
        info!("Active graph: {} ({})", active.name, active.locator);
    }

    let store: Option<Arc<dyn StateMapStore>> = match &config.state_db {
        Some(path) => Some(Arc::new(SqliteStateMap::open(path)?)),
        None => None,
    };

    let assistants = config.assistants.enabled.then(|| {
        Arc::new(AssistantsClient::with_policy(
            config.engine_url.clone(),
            config.assistants.retry_policy(),
        ))
    });

    Ok(AppState {
        engine: Arc::new(RemoteEngine::new(config.engine_url.clone())),
        config,
        registry: Arc::new(registry),
        loader: Arc::new(loader),
        store,
        assistants,
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/ok", get(ok_handler))
        .route("/task-schemas", get(schemas::task_schemas))
        .route("/graph-schemas", get(schemas::graph_schemas))
        .route("/chat", post(chat::chat))
        .route("/get_state", post(chat::get_state))
        .route("/get_state_map", get(chat::get_state_map))
        .route("/create_state_map", post(chat::create_state_map))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start_dev_server(state: AppState) -> anyhow::Result<()> {
    let bind_addr: SocketAddr = state
        .config
        .bind_addr()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address {}: {}", state.config.bind_addr(), e))?;

    info!("Davia dev server v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  Listening on: http://{}", bind_addr);
    info!("  Engine:       {}", state.config.engine_url);
    match &state.config.state_db {
        Some(db) => info!("  State maps:   {}", db.display()),
        None => info!("  State maps:   disabled (set DAVIA_STATE_DB)"),
    }
    info!(
        "  Registered:   {} tasks, {} graphs",
        state.registry.list_tasks().len(),
        state.registry.list_graphs().len()
    );

    let app = router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Welcome to Davia Server!" }))
}

async fn ok_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "OK" }))
}
