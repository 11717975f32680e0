//! Backend reconnection core for game proxies
//!
//! When a backend server restarts or drops a session's link, the proxy
//! normally kicks the client. This crate keeps the client on the proxy and
//! reconnects it to the same backend instead, with bounded retries and a
//! fallback when the backend stays down.
//!
//! # Features
//!
//! - One retry state machine per session, never two
//! - Shutdown-kick detection by exact text or pattern
//! - Veto hook and backend ignore-list
//! - Title/action bar feedback while reconnecting
//! - Lifecycle events for logging and tests
//!
//! # Example
//!
//! ```no_run
//! use relink_core::{Coordinator, LinkHandler, NotificationSink, ProxyRuntime};
//! use relink_core::{ReconnectSettings, TcpConnector};
//! use relink_types::{BackendTarget, SessionId};
//! use std::sync::Arc;
//!
//! fn install(
//!     runtime: Arc<dyn ProxyRuntime>,
//!     notifier: Arc<dyn NotificationSink>,
//! ) -> Result<(), Box<dyn std::error::Error>> {
//!     let policy = ReconnectSettings::from_json(r#"{"max-reconnect-tries": 5}"#)?.into_policy();
//!     let coordinator = Coordinator::new(policy, runtime, notifier, Arc::new(TcpConnector::new()))?;
//!
//!     // After the host connected a session to a backend
//!     let session = SessionId::random();
//!     let handler = coordinator.on_link_established(
//!         session,
//!         BackendTarget::new("lobby", "10.0.0.2:25565"),
//!     );
//!
//!     // The backend went away
//!     handler.on_close();
//!     Ok(())
//! }
//! ```

pub mod connector;
pub mod coordinator;
pub mod events;
pub mod feedback;
pub mod interceptor;
pub mod link;
pub mod policy;
pub mod runtime;
pub mod settings;
pub mod shutdown;
pub mod task;

#[cfg(any(test, feature = "test-utils"))]
pub mod testkit;

// Re-export main types
pub use connector::{BackendTransport, Connector, TcpConnector, TcpTransport};
pub use coordinator::Coordinator;
pub use events::{ReconnectEvent, Resolution};
pub use feedback::Feedback;
pub use interceptor::{KickOutcome, KickPacket, LinkHandler, ReconnectInterceptor};
pub use link::BackendLink;
pub use policy::{FeedbackTexts, ReconnectPolicy};
pub use runtime::{KickEventOutcome, NotificationSink, ProxyRuntime, Title};
pub use settings::{ReconnectSettings, SettingsError};
pub use shutdown::ShutdownMatcher;
pub use task::{ReconnectTask, TaskState};

#[cfg(any(test, feature = "test-utils"))]
pub use connector::{MockAttempt, MockConnector, MockOutcome, MockTransport};
