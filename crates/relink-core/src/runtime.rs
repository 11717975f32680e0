//! Interfaces the host proxy provides
//!
//! The reconnection core never touches sockets of live sessions, packet
//! pipelines or the plugin system directly. Everything it needs from the
//! proxy goes through [`ProxyRuntime`] and [`NotificationSink`].
//!
//! Implementations are called from reconnect tasks while they hold their
//! own state lock, so they must not call back into the
//! [`Coordinator`](crate::coordinator::Coordinator).

use crate::connector::BackendTransport;
use relink_types::{BackendTarget, ProxyMessage, SessionId};

/// A title shown to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title {
    /// Large centred text
    pub main: String,
    /// Smaller text below the main title
    pub sub: String,
    /// How long the title stays, in ticks
    pub stay_ticks: u32,
    /// Fade-in duration, in ticks
    pub fade_in_ticks: u32,
    /// Fade-out duration, in ticks
    pub fade_out_ticks: u32,
}

/// Result of firing the proxy's kick event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KickEventOutcome {
    /// A listener cancelled the kick
    pub cancelled: bool,
    /// Where a cancelling listener wants the session sent instead
    pub cancel_to: Option<BackendTarget>,
}

/// The proxy's session registry, backend switching and event dispatch
pub trait ProxyRuntime: Send + Sync {
    /// Whether the session is still connected to the proxy
    fn is_live(&self, session: SessionId) -> bool;

    /// Backend the session is currently assigned to
    fn current_backend(&self, session: SessionId) -> Option<BackendTarget>;

    /// Move the session to another backend right away
    fn switch_backend_now(&self, session: SessionId, target: &BackendTarget);

    /// Take over a freshly connected backend transport for the session
    ///
    /// Called after a successful reconnect. The proxy finishes the login
    /// on it and makes it the session's backend link.
    fn adopt_backend(&self, session: SessionId, transport: Box<dyn BackendTransport>);

    /// Disconnect the session from the proxy
    fn disconnect(&self, session: SessionId, message: ProxyMessage);

    /// Send a chat message to the session
    fn send_message(&self, session: SessionId, message: ProxyMessage);

    /// Send a keep-alive so the client does not time out while waiting
    fn send_keep_alive(&self, session: SessionId, id: i64);

    /// Record a pending connect; returns `false` if one was already recorded
    ///
    /// Must be atomic with respect to concurrent calls for the same session.
    fn add_pending_connect(&self, session: SessionId, target: &BackendTarget) -> bool;

    /// Remove a pending connect record
    fn remove_pending_connect(&self, session: SessionId, target: &BackendTarget);

    /// Whether a pending connect is recorded
    fn contains_pending_connect(&self, session: SessionId, target: &BackendTarget) -> bool;

    /// Fallback backend for the session, if the proxy has one
    fn default_fallback(&self, session: SessionId) -> Option<BackendTarget>;

    /// Ask listeners whether an automatic reconnect may proceed
    fn fire_reconnect_check(&self, session: SessionId, target: &BackendTarget) -> bool;

    /// Fire the proxy's kick event
    fn fire_kick_event(
        &self,
        session: SessionId,
        target: &BackendTarget,
        message: &str,
        fallback: Option<&BackendTarget>,
    ) -> KickEventOutcome;

    /// Remember the backend so the session returns there on next login
    fn remember_backend(&self, session: SessionId, target: &BackendTarget);

    /// Tell observers the session lost its backend
    fn fire_server_disconnect(&self, session: SessionId, target: &BackendTarget);
}

/// Transient on-screen feedback
pub trait NotificationSink: Send + Sync {
    /// Show a title
    fn show_title(&self, session: SessionId, title: &Title);

    /// Show action bar text
    fn show_action_bar(&self, session: SessionId, text: &str);

    /// Remove any title
    fn clear_title(&self, session: SessionId);

    /// Remove any action bar text
    fn clear_action_bar(&self, session: SessionId);
}
