//! Locator parsing: `module.path:identifier` or `file.toml:identifier`

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A parsed `<module-or-file-reference>:<identifier>` string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Locator {
    module: String,
    identifier: String,
}

impl Locator {
    /// Split on the first `:`. Both halves must be non-empty.
    pub fn parse(path: &str) -> Result<Self> {
        let (module, identifier) = path
            .split_once(':')
            .ok_or_else(|| Error::PathFormatInvalid(path.to_string()))?;
        let module = module.trim();
        let identifier = identifier.trim();
        if module.is_empty() || identifier.is_empty() {
            return Err(Error::PathFormatInvalid(path.to_string()));
        }
        Ok(Self {
            module: module.to_string(),
            identifier: identifier.to_string(),
        })
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.identifier)
    }
}

impl FromStr for Locator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
