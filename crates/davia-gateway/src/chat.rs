//! Chat streaming and the per-graph state map endpoints

use crate::error::ApiError;
use crate::server::AppState;
use axum::{
    body::Body,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use davia_core::{ChatRequest, GetStateRequest, StateMap, STREAM_PROTOCOL_HEADER, STREAM_PROTOCOL_VERSION};
use davia_graph::{
    build_graph_input, validate_messages_path, CancellationToken, RunRequest,
    StreamingProtocolAdapter,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Run the active graph on the newest client message and stream its text.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let active = state.active_graph()?;
    let messages_path = state.messages_path(&active.name).await?;
    let input = build_graph_input(&request.messages, &messages_path)?;

    info!(
        "Chat run: graph={} thread={:?} history={}",
        active.name,
        request.thread_id,
        request.messages.len()
    );

    let cancel = CancellationToken::new();
    let run = RunRequest::new(active.name, input).on_thread(request.thread_id);
    let upstream = state.engine.stream_run(run, cancel.clone()).await?;
    let body = Body::from_stream(StreamingProtocolAdapter::new(upstream, cancel).into_lines());

    Ok((
        [
            (STREAM_PROTOCOL_HEADER, STREAM_PROTOCOL_VERSION),
            ("content-type", "text/plain; charset=utf-8"),
        ],
        body,
    )
        .into_response())
}

/// Debug view of a thread's state as the engine reports it.
pub async fn get_state(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GetStateRequest>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.engine.thread_state(&request.thread_id).await?))
}

pub async fn get_state_map(State(state): State<Arc<AppState>>) -> Result<Json<StateMap>, ApiError> {
    let store = state.store()?;
    let active = state.active_graph()?;
    let messages_path = store.get(&active.name).await?;
    Ok(Json(StateMap { messages_path }))
}

pub async fn create_state_map(
    State(state): State<Arc<AppState>>,
    Json(map): Json<StateMap>,
) -> Result<(StatusCode, Json<StateMap>), ApiError> {
    let store = state.store()?;
    let active = state.active_graph()?;
    validate_messages_path(&map.messages_path)?;
    store.upsert(&active.name, &map.messages_path).await?;
    info!("State map for {}: {}", active.name, map.messages_path);
    Ok((StatusCode::CREATED, Json(map)))
}
