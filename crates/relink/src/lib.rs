//! Keep game proxy sessions alive across backend restarts
//!
//! This crate wires the relink reconnection core into a host proxy. The
//! host implements [`ProxyRuntime`] and [`NotificationSink`], builds a
//! [`Coordinator`] once at startup, and installs the returned
//! [`ReconnectInterceptor`] on every backend link it establishes.
//!
//! # Quick Start
//!
//! ```no_run
//! use relink::prelude::*;
//! use std::sync::Arc;
//!
//! fn start(
//!     proxy: Arc<dyn ProxyRuntime>,
//!     screen: Arc<dyn NotificationSink>,
//! ) -> Result<Arc<Coordinator>, ConfigError> {
//!     RelinkBuilder::new()
//!         .with_settings_json(r#"{"max-reconnect-tries": 10, "ignored-servers": ["limbo"]}"#)?
//!         .with_runtime(proxy)
//!         .with_notifier(screen)
//!         .build()
//! }
//!
//! fn on_server_switch(coordinator: &Arc<Coordinator>, session: SessionId, target: BackendTarget) {
//!     let handler = coordinator.on_link_established(session, target);
//!     // hand `handler` to the backend connection's packet pipeline
//!     # let _ = handler;
//! }
//! ```
//!
//! # Features
//!
//! - **Bounded retries**: fixed attempt limit and delay, then fallback
//! - **Shutdown kicks**: recognised by text or pattern and turned into reconnects
//! - **Veto hook**: listeners and an ignore-list can block reconnects
//! - **Feedback**: titles and action bars while the client waits
//! - **Event-Driven**: lifecycle events on an async channel

pub mod builder;
pub mod prelude;

// Re-export main types
pub use builder::{ConfigError, RelinkBuilder};

// Re-export commonly used types from dependencies
pub use relink_core::{
    Coordinator, LinkHandler, NotificationSink, ProxyRuntime, ReconnectEvent,
    ReconnectInterceptor, ReconnectPolicy, ReconnectSettings,
};
pub use relink_types::{BackendTarget, ProxyMessage, RelinkError, SessionId};
