//! Davia Core - Types, locators, type schemas, wire protocol, and error handling

pub mod error;
pub mod locator;
pub mod protocol;
pub mod typeschema;
pub mod types;

pub use error::{Error, Result};
pub use locator::Locator;
pub use protocol::*;
pub use types::*;
