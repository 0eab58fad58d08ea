//! Davia Gateway - the local dev server: schemas, chat streaming, state maps

pub mod chat;
pub mod config;
pub mod error;
pub mod schemas;
pub mod server;

pub use config::{ActiveGraph, AssistantsConfig, DevConfig, CONFIG_FILE};
pub use error::ApiError;
pub use server::{bootstrap, router, start_dev_server, AppState};
