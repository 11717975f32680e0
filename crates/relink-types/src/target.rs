//! Backend server targets

use serde::{Deserialize, Serialize};
use std::fmt;

/// A backend server the proxy relays a session to
///
/// The name is the identity used by the ignore-list and by fallback
/// comparison; the address is where the connector dials.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendTarget {
    /// Configured server name (e.g. "lobby")
    pub name: String,
    /// Network address, `host:port`
    pub address: String,
}

impl BackendTarget {
    /// Create a new target
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Server name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Network address
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}
