//! Backend link fault handling
//!
//! The host installs a [`LinkHandler`] for every backend link it
//! establishes. [`ReconnectInterceptor`] routes transport exceptions,
//! abrupt closes and shutdown kicks into the [`Coordinator`] instead of
//! dropping the client.

use crate::coordinator::{Coordinator, FallbackCause};
use crate::link::BackendLink;
use relink_types::{chat_to_plain, BackendTarget, ProxyMessage};
use std::sync::Arc;
use tracing::{debug, info};

/// Kick packet sent by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KickPacket {
    /// Kick reason as a JSON chat component
    pub message: String,
}

impl KickPacket {
    /// Create a kick packet from its raw reason
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Reason flattened to plain text without colour codes
    pub fn plain_text(&self) -> String {
        chat_to_plain(&self.message)
    }
}

/// What happened to the session after a kick
///
/// The raw kick packet is never forwarded to the client in any case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KickOutcome {
    /// Treated as a shutdown; a reconnect was started
    Reconnecting,
    /// A kick listener sent the session elsewhere
    Rerouted(BackendTarget),
    /// The session was disconnected with the kick reason
    Disconnected,
    /// The link was already superseded
    Ignored,
}

/// Receives the faults of one backend link
pub trait LinkHandler: Send + Sync {
    /// The transport raised an exception
    fn on_fault(&self, error: &(dyn std::error::Error + Send + Sync));

    /// The transport closed without an exception
    fn on_close(&self);

    /// The backend sent a kick packet
    fn on_kick(&self, kick: &KickPacket) -> KickOutcome;
}

/// [`LinkHandler`] that reconnects instead of dropping the client
#[derive(Debug, Clone)]
pub struct ReconnectInterceptor {
    coordinator: Arc<Coordinator>,
    link: Arc<BackendLink>,
}

impl ReconnectInterceptor {
    /// Create an interceptor for `link`
    pub fn new(coordinator: Arc<Coordinator>, link: Arc<BackendLink>) -> Self {
        Self { coordinator, link }
    }

    /// Link being watched
    pub fn link(&self) -> &Arc<BackendLink> {
        &self.link
    }
}

impl LinkHandler for ReconnectInterceptor {
    fn on_fault(&self, error: &(dyn std::error::Error + Send + Sync)) {
        if !self.link.mark_obsolete() {
            return;
        }
        let session = self.link.session();
        debug!(%session, backend = %self.link.target(), "Backend exception: {}", error);

        if self.coordinator.allow_reconnect(&self.link) {
            self.coordinator.trigger_if_live(&self.link);
        } else {
            self.coordinator
                .fall_back(&self.link, FallbackCause::Exception(error.to_string()));
        }
    }

    fn on_close(&self) {
        if self.link.is_obsolete() {
            return;
        }
        let session = self.link.session();
        let target = self.link.target();
        debug!(%session, backend = %target, "Backend closed");

        if self.coordinator.allow_reconnect(&self.link) {
            self.link.mark_obsolete();
            self.coordinator.trigger_if_live(&self.link);
            return;
        }

        let runtime = self.coordinator.runtime();
        runtime.remember_backend(session, target);
        if self.link.mark_obsolete() {
            self.coordinator.fall_back(&self.link, FallbackCause::Closed);
        }
        runtime.fire_server_disconnect(session, target);
    }

    fn on_kick(&self, kick: &KickPacket) -> KickOutcome {
        if self.link.is_obsolete() {
            return KickOutcome::Ignored;
        }
        let session = self.link.session();
        let target = self.link.target();
        let runtime = self.coordinator.runtime();

        let plain = kick.plain_text();
        let shutdown = self.coordinator.policy().shutdown.matches(&plain);
        debug!(%session, backend = %target, shutdown, "Kicked: {}", plain);

        let outcome = if shutdown && self.coordinator.allow_reconnect(&self.link) {
            self.link.mark_obsolete();
            self.coordinator.trigger_if_live(&self.link);
            KickOutcome::Reconnecting
        } else {
            let fallback = runtime
                .default_fallback(session)
                .filter(|fallback| fallback != target);
            let event = runtime.fire_kick_event(session, target, &kick.message, fallback.as_ref());

            match event.cancel_to {
                Some(to) if event.cancelled => {
                    info!(%session, from = %target, %to, "Kick rerouted");
                    runtime.switch_backend_now(session, &to);
                    KickOutcome::Rerouted(to)
                }
                _ => {
                    runtime.disconnect(session, ProxyMessage::Kick(kick.message.clone()));
                    KickOutcome::Disconnected
                }
            }
        };

        self.link.mark_obsolete();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::MockConnector;
    use crate::events::ReconnectEvent;
    use crate::policy::ReconnectPolicy;
    use crate::runtime::KickEventOutcome;
    use crate::shutdown::ShutdownMatcher;
    use crate::testkit::{collect_until, SimCall, SimProxy};
    use relink_types::SessionId;
    use std::time::Duration;

    fn lobby() -> BackendTarget {
        BackendTarget::new("lobby", "lobby:25565")
    }

    fn hub() -> BackendTarget {
        BackendTarget::new("hub", "hub:25565")
    }

    struct Fixture {
        proxy: Arc<SimProxy>,
        connector: Arc<MockConnector>,
        coordinator: Arc<Coordinator>,
        session: SessionId,
        interceptor: ReconnectInterceptor,
    }

    fn fixture(policy: ReconnectPolicy) -> Fixture {
        let proxy = Arc::new(SimProxy::new());
        let connector = Arc::new(MockConnector::failing());
        let coordinator =
            Coordinator::new(policy, proxy.clone(), proxy.clone(), connector.clone()).unwrap();
        let session = SessionId::random();
        proxy.join(session, lobby());
        proxy.set_fallback(Some(hub()));
        let interceptor = coordinator.on_link_established(session, lobby());
        Fixture {
            proxy,
            connector,
            coordinator,
            session,
            interceptor,
        }
    }

    fn slow_policy() -> ReconnectPolicy {
        ReconnectPolicy::default().with_retry_delay(Duration::from_secs(60))
    }

    fn io_error() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset")
    }

    #[tokio::test]
    async fn test_fault_triggers_reconnect() {
        let f = fixture(slow_policy());
        let mut events = f.coordinator.take_event_receiver().unwrap();

        f.interceptor.on_fault(&io_error());
        assert!(f.interceptor.link().is_obsolete());
        assert!(f.coordinator.is_active(f.session));

        let seen = collect_until(&mut events, Duration::from_secs(1), |e| {
            matches!(e, ReconnectEvent::RetryScheduled { .. })
        })
        .await;
        assert!(matches!(seen[0], ReconnectEvent::Started { .. }));
        assert_eq!(f.connector.attempt_count(), 1);
    }

    #[tokio::test]
    async fn test_second_fault_on_same_link_ignored() {
        let f = fixture(slow_policy());
        f.interceptor.on_fault(&io_error());
        f.interceptor.on_fault(&io_error());
        f.interceptor.on_close();
        assert_eq!(f.interceptor.on_kick(&KickPacket::new("\"Server closed\"")), KickOutcome::Ignored);

        assert_eq!(f.proxy.reconnect_checks(), 1);
    }

    #[tokio::test]
    async fn test_vetoed_fault_falls_back() {
        let f = fixture(slow_policy());
        f.proxy.set_allow_reconnect(false);

        f.interceptor.on_fault(&io_error());

        assert!(!f.coordinator.is_active(f.session));
        assert_eq!(f.proxy.backend_of(f.session), Some(hub()));
        assert!(f.proxy.has_call(&SimCall::Message {
            session: f.session,
            message: ProxyMessage::ServerWentDown
        }));
    }

    #[tokio::test]
    async fn test_vetoed_fault_on_fallback_disconnects_with_reason() {
        let f = fixture(slow_policy());
        f.proxy.set_allow_reconnect(false);
        f.proxy.set_fallback(Some(lobby()));

        f.interceptor.on_fault(&io_error());

        assert_eq!(
            f.proxy.disconnects(f.session),
            vec![ProxyMessage::Exception("connection reset".into())]
        );
    }

    #[tokio::test]
    async fn test_close_triggers_reconnect() {
        let f = fixture(slow_policy());
        f.interceptor.on_close();

        assert!(f.interceptor.link().is_obsolete());
        assert!(f.coordinator.is_active(f.session));
        assert!(!f.proxy.calls().iter().any(|c| matches!(c, SimCall::ServerDisconnect { .. })));
    }

    #[tokio::test]
    async fn test_vetoed_close_runs_default_bookkeeping() {
        let f = fixture(slow_policy());
        f.proxy.set_fallback(None);
        f.proxy.set_allow_reconnect(false);

        f.interceptor.on_close();

        let session = f.session;
        assert!(f.proxy.has_call(&SimCall::Remembered {
            session,
            target: lobby()
        }));
        assert!(f.proxy.has_call(&SimCall::ServerDisconnect {
            session,
            target: lobby()
        }));
        assert_eq!(f.proxy.disconnects(session), vec![ProxyMessage::LostConnection]);
    }

    #[tokio::test]
    async fn test_shutdown_kick_reconnects() {
        let f = fixture(slow_policy());
        let outcome = f.interceptor.on_kick(&KickPacket::new(r#"{"text":"§cServer closed"}"#));

        assert_eq!(outcome, KickOutcome::Reconnecting);
        assert!(f.coordinator.is_active(f.session));
        assert!(f.proxy.disconnects(f.session).is_empty());
        assert!(!f.proxy.calls().iter().any(|c| matches!(c, SimCall::KickEvent { .. })));
    }

    #[tokio::test]
    async fn test_other_kick_disconnects() {
        let f = fixture(slow_policy());
        let raw = r#"{"text":"Server closed!"}"#;
        let outcome = f.interceptor.on_kick(&KickPacket::new(raw));

        assert_eq!(outcome, KickOutcome::Disconnected);
        assert!(!f.coordinator.is_active(f.session));
        assert_eq!(f.proxy.disconnects(f.session), vec![ProxyMessage::Kick(raw.into())]);
        assert!(f.proxy.has_call(&SimCall::KickEvent {
            session: f.session,
            target: lobby(),
            fallback: Some(hub())
        }));
        assert!(f.interceptor.link().is_obsolete());
    }

    #[tokio::test]
    async fn test_kick_event_fallback_hidden_when_same_backend() {
        let f = fixture(slow_policy());
        f.proxy.set_fallback(Some(lobby()));
        f.interceptor.on_kick(&KickPacket::new("\"Banned\""));

        assert!(f.proxy.has_call(&SimCall::KickEvent {
            session: f.session,
            target: lobby(),
            fallback: None
        }));
    }

    #[tokio::test]
    async fn test_cancelled_kick_reroutes() {
        let f = fixture(slow_policy());
        f.proxy.set_kick_outcome(KickEventOutcome {
            cancelled: true,
            cancel_to: Some(hub()),
        });

        let outcome = f.interceptor.on_kick(&KickPacket::new("\"Banned\""));

        assert_eq!(outcome, KickOutcome::Rerouted(hub()));
        assert_eq!(f.proxy.backend_of(f.session), Some(hub()));
        assert!(f.proxy.disconnects(f.session).is_empty());
    }

    #[tokio::test]
    async fn test_pattern_shutdown_kick() {
        let policy = slow_policy().with_shutdown(ShutdownMatcher::pattern("Restarting in \\d+s").unwrap());
        let f = fixture(policy);

        let outcome = f.interceptor.on_kick(&KickPacket::new("\"Restarting in 5s\""));
        assert_eq!(outcome, KickOutcome::Reconnecting);
    }

    // All three entry points consult the same veto: an ignore-listed backend
    // never reconnects, whether it threw, closed, or kicked with the
    // shutdown message.
    #[tokio::test]
    async fn test_ignore_list_vetoes_every_entry_point() {
        let policy = slow_policy().with_ignored_backend("lobby");

        let f = fixture(policy.clone());
        f.interceptor.on_fault(&io_error());
        assert!(!f.coordinator.is_active(f.session));
        assert_eq!(f.proxy.backend_of(f.session), Some(hub()));

        let f = fixture(policy.clone());
        f.interceptor.on_close();
        assert!(!f.coordinator.is_active(f.session));
        assert_eq!(f.proxy.backend_of(f.session), Some(hub()));

        let f = fixture(policy);
        let outcome = f.interceptor.on_kick(&KickPacket::new("\"Server closed\""));
        assert_eq!(outcome, KickOutcome::Disconnected);
        assert!(!f.coordinator.is_active(f.session));

        assert_eq!(f.proxy.reconnect_checks(), 0);
    }
}
