//! Davia Graph - loading, registration, and streaming of user graphs and tasks

pub mod engine;
pub mod handle;
pub mod input;
pub mod loader;
pub mod module;
pub mod registry;
pub mod remote;
pub mod stream;

pub use engine::{
    ChunkStream, EngineError, EngineResult, ExecutionEngine, MessageChunk, MessageContent, RunRequest,
};
pub use handle::{GraphDef, Handle, ParamDecl, TaskDef, Target};
pub use input::{build_graph_input, validate_messages_path, DEFAULT_MESSAGES_PATH};
pub use loader::DynamicLoader;
pub use module::{LoadedModule, ModuleFormat, ModuleManifest};
pub use registry::Registry;
pub use remote::{latest_per_graph, Assistant, AssistantsClient, RemoteEngine, RetryPolicy, DEFAULT_ENGINE_URL};
pub use stream::StreamingProtocolAdapter;
pub use tokio_util::sync::CancellationToken;
