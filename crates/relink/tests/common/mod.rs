//! Common test utilities and fixtures for integration tests
//!
//! A [`Harness`] wires a coordinator to an in-memory proxy and a scripted
//! connector, with one backend (`lobby`) and a fallback (`hub`).

#![allow(dead_code)]

use relink::prelude::*;
use relink_core::testkit::{collect_until, SimProxy};
use relink_core::MockConnector;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Longest a test waits for an expected event
pub const EVENT_WAIT: Duration = Duration::from_secs(5);

/// The backend sessions start on
pub fn lobby() -> BackendTarget {
    BackendTarget::new("lobby", "10.0.0.2:25565")
}

/// The proxy's fallback backend
pub fn hub() -> BackendTarget {
    BackendTarget::new("hub", "10.0.0.3:25565")
}

/// Sample kick reasons as sent by backends
pub const SHUTDOWN_KICK: &str = r#"{"text":"","extra":[{"text":"Server closed","color":"red"}]}"#;
pub const NEAR_SHUTDOWN_KICK: &str = r#"{"text":"Server closed."}"#;
pub const BAN_KICK: &str = r#"{"text":"You are banned from this server"}"#;

/// Install a log subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Coordinator under test plus its collaborators
pub struct Harness {
    pub proxy: Arc<SimProxy>,
    pub connector: Arc<MockConnector>,
    pub coordinator: Arc<Coordinator>,
    pub events: mpsc::UnboundedReceiver<ReconnectEvent>,
}

impl Harness {
    /// Build a harness with `hub` as fallback
    pub fn new(policy: ReconnectPolicy, connector: MockConnector) -> Self {
        init_tracing();

        let proxy = Arc::new(SimProxy::new());
        proxy.set_fallback(Some(hub()));
        let connector = Arc::new(connector);

        let coordinator = RelinkBuilder::new()
            .with_policy(policy)
            .with_runtime(proxy.clone())
            .with_notifier(proxy.clone())
            .with_connector(connector.clone())
            .build()
            .expect("valid configuration");
        let events = coordinator
            .take_event_receiver()
            .expect("event receiver available");

        Self {
            proxy,
            connector,
            coordinator,
            events,
        }
    }

    /// Connect a fresh session to `lobby` and return its link handler
    pub fn join(&self) -> (SessionId, ReconnectInterceptor) {
        let session = SessionId::random();
        self.proxy.join(session, lobby());
        let handler = self.coordinator.on_link_established(session, lobby());
        (session, handler)
    }

    /// Receive events up to and including the first one matching `stop`
    pub async fn until<F>(&mut self, stop: F) -> Vec<ReconnectEvent>
    where
        F: FnMut(&ReconnectEvent) -> bool,
    {
        collect_until(&mut self.events, EVENT_WAIT, stop).await
    }

    /// Receive events until the session's task finishes
    pub async fn until_terminal(&mut self) -> Vec<ReconnectEvent> {
        self.until(|e| e.is_terminal()).await
    }

    /// Receive whatever arrives within `wait`
    pub async fn drain(&mut self, wait: Duration) -> Vec<ReconnectEvent> {
        collect_until(&mut self.events, wait, |_| false).await
    }
}

/// Transport error as the proxy would report it
pub fn reset() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::ConnectionReset, "Connection reset by peer")
}

/// Number of attempt events in a sequence
pub fn attempts(events: &[ReconnectEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ReconnectEvent::Attempt { .. }))
        .count()
}
