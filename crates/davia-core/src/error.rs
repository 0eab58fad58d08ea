//! Error types for Davia

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid path format: {0}. Expected format: module.path:variable")]
    PathFormatInvalid(String),

    #[error("could not import module for {locator}: {cause}")]
    ModuleNotFound { locator: String, cause: String },

    #[error("attribute missing for {locator}: {cause}")]
    AttributeMissing { locator: String, cause: String },

    #[error("type mismatch for {locator}: {cause}")]
    TypeMismatch { locator: String, cause: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("missing configuration: {0} is not set")]
    ConfigMissing(String),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn module_not_found(locator: impl ToString, cause: impl ToString) -> Self {
        Self::ModuleNotFound {
            locator: locator.to_string(),
            cause: cause.to_string(),
        }
    }

    pub fn attribute_missing(locator: impl ToString, cause: impl ToString) -> Self {
        Self::AttributeMissing {
            locator: locator.to_string(),
            cause: cause.to_string(),
        }
    }

    pub fn type_mismatch(locator: impl ToString, cause: impl ToString) -> Self {
        Self::TypeMismatch {
            locator: locator.to_string(),
            cause: cause.to_string(),
        }
    }

    pub fn config_missing(name: impl Into<String>) -> Self {
        Self::ConfigMissing(name.into())
    }

    /// True for the four failures a locator can produce while loading.
    pub fn is_loader_error(&self) -> bool {
        matches!(
            self,
            Self::PathFormatInvalid(_)
                | Self::ModuleNotFound { .. }
                | Self::AttributeMissing { .. }
                | Self::TypeMismatch { .. }
        )
    }
}
