//! Re-exports for convenience
//!
//! Import everything you need with:
//! ```
//! use relink::prelude::*;
//! ```

// Builder
pub use crate::builder::{ConfigError, RelinkBuilder};

// Types from relink-types
pub use relink_types::{
    chat_to_plain, strip_color, translate_color_codes, BackendTarget, ProxyMessage, RelinkError,
    RelinkResult, SessionId,
};

// Core
pub use relink_core::{
    BackendLink, BackendTransport, Connector, Coordinator, FeedbackTexts, KickEventOutcome,
    KickOutcome, KickPacket, LinkHandler, NotificationSink, ProxyRuntime, ReconnectEvent,
    ReconnectInterceptor, ReconnectPolicy, ReconnectSettings, ReconnectTask, Resolution,
    SettingsError, ShutdownMatcher, TaskState, TcpConnector, Title,
};
