//! Tests for davia-graph: loader against real manifests, registry, and the
//! LangGraph client against a local mock server.

use davia_core::{EntryKind, Error};
use davia_graph::*;
use futures::StreamExt;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const AGENT_MANIFEST: &str = r#"
doc = "Weather agent"

[types.AgentState]
bases = ["MessagesState"]
fields = [{ name = "city", type = "Optional[str]" }]

[graphs.workflow]
doc = "Calls the model until done."
state = "AgentState"

[tasks.get_weather]
doc = "Call to get the current weather."
parameters = [{ name = "location", type = "str" }]
returns = "str"

[aliases.agent]
wraps = "workflow"

[aliases.agent_of_agent]
wraps = "agent"

[aliases.dangling]
wraps = "nowhere"
"#;

fn write(dir: &Path, rel: &str, text: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn project() -> (tempfile::TempDir, DynamicLoader) {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "agent.toml", AGENT_MANIFEST);
    let loader = DynamicLoader::with_working_dir(dir.path());
    (dir, loader)
}

// ===========================================================================
// DynamicLoader
// ===========================================================================

#[test]
fn loads_graph_by_file_locator() {
    let (_dir, loader) = project();
    let handle = loader.load("agent.toml:workflow").unwrap();
    assert_eq!(handle.kind(), EntryKind::Graph);
    assert_eq!(handle.name, "workflow");
    assert_eq!(handle.source_file.as_deref(), Some("agent.toml"));
    assert_eq!(handle.doc(), Some("Calls the model until done."));
}

#[test]
fn loads_by_dotted_module_path() {
    let (dir, loader) = project();
    write(
        dir.path(),
        "app/graphs/chat.yaml",
        "graphs:\n  chat:\n    doc: Plain chat\n",
    );
    let handle = loader.load_graph("app.graphs.chat:chat").unwrap();
    assert_eq!(handle.doc(), Some("Plain chat"));
    assert_eq!(
        handle.source_file.as_deref(),
        Some(Path::new("app/graphs/chat.yaml").to_str().unwrap())
    );
}

#[test]
fn working_dir_joins_search_path_once() {
    let (dir, loader) = project();
    loader.load("agent:workflow").unwrap();
    loader.load("agent:get_weather").unwrap();
    assert_eq!(loader.search_paths(), vec![dir.path().to_path_buf()]);
}

#[test]
fn missing_separator_is_path_format_invalid() {
    let (_dir, loader) = project();
    assert!(matches!(
        loader.load("agent.toml"),
        Err(Error::PathFormatInvalid(_))
    ));
}

#[test]
fn missing_module_is_module_not_found() {
    let (_dir, loader) = project();
    let err = loader.load("missing.module:graph").unwrap_err();
    assert!(matches!(err, Error::ModuleNotFound { .. }));
    assert!(err.to_string().contains("No module named 'missing.module'"));
    assert!(err.is_loader_error());
}

#[test]
fn malformed_manifest_is_module_not_found() {
    let (dir, loader) = project();
    write(dir.path(), "broken.toml", "[graphs.g\nstate = ");
    assert!(matches!(
        loader.load("broken.toml:g"),
        Err(Error::ModuleNotFound { .. })
    ));
}

#[test]
fn missing_identifier_is_attribute_missing() {
    let (_dir, loader) = project();
    let err = loader.load("agent.toml:nope").unwrap_err();
    assert!(matches!(err, Error::AttributeMissing { .. }));
    assert!(err.to_string().contains("does not have a variable named nope"));
}

#[test]
fn type_declaration_is_type_mismatch() {
    let (_dir, loader) = project();
    assert!(matches!(
        loader.load("agent.toml:AgentState"),
        Err(Error::TypeMismatch { .. })
    ));
}

#[test]
fn wrong_kind_is_type_mismatch() {
    let (_dir, loader) = project();
    assert!(matches!(
        loader.load_graph("agent.toml:get_weather"),
        Err(Error::TypeMismatch { .. })
    ));
    assert!(loader.load_task("agent.toml:get_weather").is_ok());
}

#[test]
fn alias_unwraps_exactly_one_layer() {
    let (_dir, loader) = project();
    let handle = loader.load("agent.toml:agent").unwrap();
    assert_eq!(handle.name, "agent");
    assert_eq!(handle.kind(), EntryKind::Graph);
    assert_eq!(handle.doc(), Some("Calls the model until done."));

    assert!(matches!(
        loader.load("agent.toml:agent_of_agent"),
        Err(Error::TypeMismatch { .. })
    ));
    assert!(matches!(
        loader.load("agent.toml:dangling"),
        Err(Error::AttributeMissing { .. })
    ));
}

#[test]
fn modules_are_cached_until_reload() {
    let (dir, loader) = project();
    loader.load("agent.toml:workflow").unwrap();
    write(
        dir.path(),
        "agent.toml",
        "[graphs.workflow]\ndoc = \"rewritten\"\n",
    );
    let cached = loader.load("agent.toml:workflow").unwrap();
    assert_eq!(cached.doc(), Some("Calls the model until done."));
    let fresh = loader.reload("agent.toml:workflow").unwrap();
    assert_eq!(fresh.doc(), Some("rewritten"));
}

#[test]
fn loaded_graph_snapshot_uses_module_types() {
    let (_dir, loader) = project();
    let snap = loader.load("agent.toml:workflow").unwrap().snapshot();
    assert_eq!(snap["type"], "TypedDict");
    assert_eq!(snap["name"], "AgentState");
    let names: Vec<_> = snap["fields"].as_object().unwrap().keys().cloned().collect();
    assert_eq!(names, vec!["messages", "city"]);
    assert_eq!(snap["fields"]["city"]["origin"], "Union");
}

// ===========================================================================
// Registry
// ===========================================================================

#[test]
fn registers_every_export_of_a_module() {
    let (_dir, loader) = project();
    let module = loader.import_module("agent.toml").unwrap();
    let registry = Registry::new();
    assert_eq!(registry.register_module(&module), 2);

    let task = registry.get("get_weather").unwrap();
    assert_eq!(task.source_file.as_deref(), Some("agent.toml"));
    let entry = task.schema_entry();
    assert_eq!(entry.kind, EntryKind::Task);
    let snap = entry.user_state_snapshot.unwrap();
    assert_eq!(snap["parameters"]["location"]["type"]["name"], "str");
}

#[test]
fn ensure_graph_loads_once_then_reuses() {
    let (_dir, loader) = project();
    let registry = Registry::new();
    let first = registry
        .ensure_graph("agent", "agent.toml:workflow", &loader)
        .unwrap();
    assert_eq!(first.name, "agent");
    let second = registry
        .ensure_graph("agent", "agent.toml:does_not_matter", &loader)
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.list_graphs().len(), 1);
}

#[test]
fn refresh_graph_picks_up_manifest_edits() {
    let (dir, loader) = project();
    let registry = Registry::new();
    registry.register_task("first", TaskDef::new(), None);
    let before = registry
        .refresh_graph("agent", "agent.toml:workflow", &loader)
        .unwrap();
    assert_eq!(before.doc(), Some("Calls the model until done."));

    write(
        dir.path(),
        "agent.toml",
        "[types.Slim]\nshape = \"typed_dict\"\nfields = [{ name = \"topic\", type = \"str\" }]\n\n[graphs.workflow]\ndoc = \"Edited.\"\nstate = \"Slim\"\n",
    );
    let after = registry
        .refresh_graph("agent", "agent.toml:workflow", &loader)
        .unwrap();
    assert_eq!(after.doc(), Some("Edited."));
    assert_eq!(after.snapshot()["name"], "Slim");
    assert_eq!(registry.len(), 2);
    assert!(Arc::ptr_eq(&registry.get("agent").unwrap(), &after));

    write(dir.path(), "agent.toml", "[graphs.other]\nstate = \"MessagesState\"\n");
    assert!(matches!(
        registry.refresh_graph("agent", "agent.toml:workflow", &loader),
        Err(Error::AttributeMissing { .. })
    ));
}

#[test]
fn racing_registrations_keep_one_entry() {
    let registry = Arc::new(Registry::new());
    let workers: Vec<_> = (0..8)
        .map(|i| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    registry.register_task("shared", TaskDef::new().with_doc(format!("w{}", i)), None);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    registry.register_task("after", TaskDef::new(), None);

    let names: Vec<_> = registry.list_tasks().iter().map(|h| h.name.clone()).collect();
    assert_eq!(names, vec!["shared", "after"]);
}

#[test]
fn ensure_graph_propagates_loader_errors() {
    let (_dir, loader) = project();
    let registry = Registry::new();
    assert!(registry.ensure_graph("g", "agent.toml", &loader).is_err());
    assert!(registry.is_empty());
}

// ===========================================================================
// Remote engine and assistants (mock LangGraph API)
// ===========================================================================

async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn sse_body(events: &[(&str, serde_json::Value)]) -> String {
    events
        .iter()
        .map(|(event, data)| format!("event: {}\ndata: {}\n\n", event, data))
        .collect()
}

fn mock_langgraph() -> axum::Router {
    use axum::extract::Path as UrlPath;
    use axum::http::header;
    use axum::routing::{get, post};
    use axum::Json;

    let run = || async {
        (
            [(header::CONTENT_TYPE, "text/event-stream")],
            sse_body(&[
                ("metadata", json!({"run_id": "r1"})),
                ("messages", json!([{"type": "AIMessageChunk", "content": "Hello"}, {}])),
                ("messages", json!([{"type": "AIMessageChunk", "content": ""}, {}])),
                ("messages", json!([{"type": "AIMessageChunk", "content": " world"}, {}])),
                ("end", json!(null)),
            ]),
        )
    };

    axum::Router::new()
        .route("/runs/stream", post(run))
        .route("/threads/:id/runs/stream", post(run))
        .route(
            "/threads/:id/state",
            get(|UrlPath(id): UrlPath<String>| async move {
                Json(json!({"values": {"messages": []}, "thread_id": id}))
            }),
        )
        .route(
            "/assistants/search",
            post(|| async {
                Json(json!([
                    {"assistant_id": "a-old", "graph_id": "agent", "updated_at": "2024-01-01T00:00:00+00:00"},
                    {"assistant_id": "a-new", "graph_id": "agent", "updated_at": "2024-05-01T00:00:00+00:00"},
                ]))
            }),
        )
        .route(
            "/assistants/:id/schemas",
            get(|UrlPath(id): UrlPath<String>| async move {
                Json(json!({"state_schema": {"title": id}}))
            }),
        )
}

#[tokio::test]
async fn remote_run_streams_ai_chunks() {
    let url = serve(mock_langgraph()).await;
    let engine = RemoteEngine::new(format!("{}/", url));
    assert_eq!(engine.base_url(), url);

    let request = RunRequest::new("agent", json!({"messages": []})).on_thread(Some("t1".into()));
    let upstream = engine
        .stream_run(request, CancellationToken::new())
        .await
        .unwrap();
    let lines: Vec<String> = StreamingProtocolAdapter::new(upstream, CancellationToken::new())
        .into_lines()
        .map(|b| String::from_utf8(b.unwrap().to_vec()).unwrap())
        .collect()
        .await;
    assert_eq!(lines, vec!["0:\"Hello\"\n", "0:\" world\"\n"]);
}

#[tokio::test]
async fn remote_thread_state_is_passed_through() {
    let url = serve(mock_langgraph()).await;
    let state = RemoteEngine::new(url).thread_state("t42").await.unwrap();
    assert_eq!(state["thread_id"], "t42");
}

#[tokio::test]
async fn remote_run_cancelled_before_send() {
    let url = serve(mock_langgraph()).await;
    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = RemoteEngine::new(url)
        .stream_run(RunRequest::new("agent", json!({})), cancel)
        .await;
    assert!(matches!(result, Err(EngineError::Cancelled)));
}

#[tokio::test]
async fn assistants_pick_latest_state_schema() {
    let url = serve(mock_langgraph()).await;
    let client = AssistantsClient::new(url);
    let schemas = client.state_schemas(["agent", "absent"]).await.unwrap();
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas["agent"]["title"], "a-new");
}

#[tokio::test]
async fn assistants_retry_transient_failures() {
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Json;

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let router = axum::Router::new().route(
        "/assistants/search",
        post(move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(StatusCode::SERVICE_UNAVAILABLE)
                } else {
                    Ok(Json(json!([])))
                }
            }
        }),
    );
    let url = serve(router).await;
    let client = AssistantsClient::with_policy(
        url,
        RetryPolicy {
            timeout: Duration::from_secs(2),
            attempts: 3,
            base_delay: Duration::from_millis(5),
        },
    );
    assert!(client.search().await.unwrap().is_empty());
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn engine_status_errors_surface() {
    let router = axum::Router::new();
    let url = serve(router).await;
    let result = RemoteEngine::new(url).thread_state("missing").await;
    assert!(matches!(
        result,
        Err(EngineError::Status { status: 404, .. })
    ));
}
