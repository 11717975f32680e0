//! Messages the proxy shows or disconnects with

use serde::{Deserialize, Serialize};
use std::fmt;

/// A message the core asks the proxy to deliver to a client
///
/// The proxy owns localisation; [`fmt::Display`] renders the stock English
/// wording for hosts without their own translations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProxyMessage {
    /// The backend died and the client was moved to the fallback server
    ServerWentDown,
    /// The backend is gone and there is nowhere else to go
    LostConnection,
    /// The backend link failed with a transport error
    Exception(String),
    /// The backend kicked the client; carries the raw chat component
    Kick(String),
}

impl fmt::Display for ProxyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerWentDown => write!(
                f,
                "§cThe server you were previously on went down, you have been connected to a fallback server"
            ),
            Self::LostConnection => write!(f, "[Proxy] Lost connection to server."),
            Self::Exception(detail) => write!(f, "§cException Connecting: {}", detail),
            Self::Kick(reason) => write!(f, "{}", crate::chat::chat_to_plain(reason)),
        }
    }
}
