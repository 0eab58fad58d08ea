//! `/task-schemas` and `/graph-schemas`

use crate::error::ApiError;
use crate::server::AppState;
use axum::{extract::State, Json};
use davia_core::SchemaEntry;
use std::sync::Arc;
use tracing::warn;

/// Every registered task, snapshots recomputed per request.
pub async fn task_schemas(State(state): State<Arc<AppState>>) -> Json<Vec<SchemaEntry>> {
    Json(
        state
            .registry
            .list_tasks()
            .iter()
            .map(|handle| handle.schema_entry())
            .collect(),
    )
}

/// Every configured graph, re-read from its manifest on each request. The
/// state snapshot is the engine's own
/// `state_schema` when an assistant exists for the graph, otherwise the
/// locally serialized state type.
pub async fn graph_schemas(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SchemaEntry>>, ApiError> {
    let graphs = state.config.configured_graphs()?;

    let mut entries = Vec::with_capacity(graphs.len());
    for graph in &graphs {
        let handle = state
            .registry
            .refresh_graph(&graph.name, &graph.locator, &state.loader)?;
        entries.push(handle.schema_entry());
    }

    if let Some(assistants) = &state.assistants {
        match assistants
            .state_schemas(graphs.iter().map(|g| g.name.as_str()))
            .await
        {
            Ok(remote) => {
                for entry in &mut entries {
                    if let Some(schema) = remote.get(&entry.name) {
                        entry.user_state_snapshot = Some(schema.clone());
                    }
                }
            }
            Err(e) => warn!("Assistant schemas unavailable, serving local state types: {}", e),
        }
    }

    Ok(Json(entries))
}
