//! In-memory proxy for tests
//!
//! [`SimProxy`] implements both [`ProxyRuntime`] and [`NotificationSink`]
//! over plain maps and records every call, so tests can drive the
//! coordinator and assert on what the client would have seen.

use crate::connector::BackendTransport;
use crate::events::ReconnectEvent;
use crate::runtime::{KickEventOutcome, NotificationSink, ProxyRuntime, Title};
use parking_lot::Mutex;
use relink_types::{BackendTarget, ProxyMessage, SessionId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// One recorded call into the simulated proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCall {
    Switched { session: SessionId, target: BackendTarget },
    Adopted { session: SessionId, target: BackendTarget },
    Disconnected { session: SessionId, message: ProxyMessage },
    Message { session: SessionId, message: ProxyMessage },
    KeepAlive { session: SessionId },
    Title { session: SessionId, title: Title },
    ActionBar { session: SessionId, text: String },
    ClearTitle { session: SessionId },
    ClearActionBar { session: SessionId },
    ReconnectCheck { session: SessionId, target: BackendTarget },
    KickEvent { session: SessionId, target: BackendTarget, fallback: Option<BackendTarget> },
    Remembered { session: SessionId, target: BackendTarget },
    ServerDisconnect { session: SessionId, target: BackendTarget },
}

#[derive(Debug, Default)]
struct SimSession {
    live: bool,
    backend: Option<BackendTarget>,
    pending: HashSet<BackendTarget>,
}

/// Simulated proxy runtime and notification sink
#[derive(Debug)]
pub struct SimProxy {
    sessions: Mutex<HashMap<SessionId, SimSession>>,
    fallback: Mutex<Option<BackendTarget>>,
    allow_reconnect: AtomicBool,
    reconnect_checks: AtomicUsize,
    kick_outcome: Mutex<KickEventOutcome>,
    calls: Mutex<Vec<SimCall>>,
}

impl Default for SimProxy {
    fn default() -> Self {
        Self::new()
    }
}

impl SimProxy {
    /// Empty proxy: no sessions, no fallback, reconnects allowed
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            fallback: Mutex::new(None),
            allow_reconnect: AtomicBool::new(true),
            reconnect_checks: AtomicUsize::new(0),
            kick_outcome: Mutex::new(KickEventOutcome::default()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Connect a session to a backend
    pub fn join(&self, session: SessionId, backend: BackendTarget) {
        self.sessions.lock().insert(
            session,
            SimSession {
                live: true,
                backend: Some(backend),
                pending: HashSet::new(),
            },
        );
    }

    /// The session leaves the proxy
    pub fn leave(&self, session: SessionId) {
        if let Some(s) = self.sessions.lock().get_mut(&session) {
            s.live = false;
        }
    }

    /// Move the session without telling the coordinator
    pub fn set_backend(&self, session: SessionId, backend: BackendTarget) {
        if let Some(s) = self.sessions.lock().get_mut(&session) {
            s.backend = Some(backend);
        }
    }

    /// Configure the fallback backend
    pub fn set_fallback(&self, fallback: Option<BackendTarget>) {
        *self.fallback.lock() = fallback;
    }

    /// Configure the reconnect-check listener's answer
    pub fn set_allow_reconnect(&self, allow: bool) {
        self.allow_reconnect.store(allow, Ordering::SeqCst);
    }

    /// Configure the kick event listener's answer
    pub fn set_kick_outcome(&self, outcome: KickEventOutcome) {
        *self.kick_outcome.lock() = outcome;
    }

    /// Record a pending connect as if the proxy itself were connecting
    pub fn hold_pending(&self, session: SessionId, target: BackendTarget) {
        if let Some(s) = self.sessions.lock().get_mut(&session) {
            s.pending.insert(target);
        }
    }

    /// How often the reconnect-check listener was asked
    pub fn reconnect_checks(&self) -> usize {
        self.reconnect_checks.load(Ordering::SeqCst)
    }

    /// Backend the session is on
    pub fn backend_of(&self, session: SessionId) -> Option<BackendTarget> {
        self.sessions.lock().get(&session).and_then(|s| s.backend.clone())
    }

    /// Pending connects of the session
    pub fn pending_of(&self, session: SessionId) -> HashSet<BackendTarget> {
        self.sessions
            .lock()
            .get(&session)
            .map(|s| s.pending.clone())
            .unwrap_or_default()
    }

    /// All calls so far
    pub fn calls(&self) -> Vec<SimCall> {
        self.calls.lock().clone()
    }

    /// Whether a specific call was made
    pub fn has_call(&self, call: &SimCall) -> bool {
        self.calls.lock().iter().any(|c| c == call)
    }

    /// Titles shown to the session
    pub fn titles(&self, session: SessionId) -> Vec<Title> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                SimCall::Title { session: s, title } if *s == session => Some(title.clone()),
                _ => None,
            })
            .collect()
    }

    /// Action bar texts shown to the session
    pub fn action_bars(&self, session: SessionId) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                SimCall::ActionBar { session: s, text } if *s == session => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Disconnect messages sent to the session
    pub fn disconnects(&self, session: SessionId) -> Vec<ProxyMessage> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                SimCall::Disconnected { session: s, message } if *s == session => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of keep-alives sent to the session
    pub fn keep_alives(&self, session: SessionId) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, SimCall::KeepAlive { session: s } if *s == session))
            .count()
    }

    fn record(&self, call: SimCall) {
        self.calls.lock().push(call);
    }
}

impl ProxyRuntime for SimProxy {
    fn is_live(&self, session: SessionId) -> bool {
        self.sessions.lock().get(&session).map(|s| s.live).unwrap_or(false)
    }

    fn current_backend(&self, session: SessionId) -> Option<BackendTarget> {
        self.backend_of(session)
    }

    fn switch_backend_now(&self, session: SessionId, target: &BackendTarget) {
        self.set_backend(session, target.clone());
        self.record(SimCall::Switched {
            session,
            target: target.clone(),
        });
    }

    fn adopt_backend(&self, session: SessionId, transport: Box<dyn BackendTransport>) {
        let target = transport.target().clone();
        self.set_backend(session, target.clone());
        self.record(SimCall::Adopted { session, target });
    }

    fn disconnect(&self, session: SessionId, message: ProxyMessage) {
        self.leave(session);
        self.record(SimCall::Disconnected { session, message });
    }

    fn send_message(&self, session: SessionId, message: ProxyMessage) {
        self.record(SimCall::Message { session, message });
    }

    fn send_keep_alive(&self, session: SessionId, _id: i64) {
        self.record(SimCall::KeepAlive { session });
    }

    fn add_pending_connect(&self, session: SessionId, target: &BackendTarget) -> bool {
        self.sessions
            .lock()
            .entry(session)
            .or_default()
            .pending
            .insert(target.clone())
    }

    fn remove_pending_connect(&self, session: SessionId, target: &BackendTarget) {
        if let Some(s) = self.sessions.lock().get_mut(&session) {
            s.pending.remove(target);
        }
    }

    fn contains_pending_connect(&self, session: SessionId, target: &BackendTarget) -> bool {
        self.sessions
            .lock()
            .get(&session)
            .map(|s| s.pending.contains(target))
            .unwrap_or(false)
    }

    fn default_fallback(&self, _session: SessionId) -> Option<BackendTarget> {
        self.fallback.lock().clone()
    }

    fn fire_reconnect_check(&self, session: SessionId, target: &BackendTarget) -> bool {
        self.reconnect_checks.fetch_add(1, Ordering::SeqCst);
        self.record(SimCall::ReconnectCheck {
            session,
            target: target.clone(),
        });
        self.allow_reconnect.load(Ordering::SeqCst)
    }

    fn fire_kick_event(
        &self,
        session: SessionId,
        target: &BackendTarget,
        _message: &str,
        fallback: Option<&BackendTarget>,
    ) -> KickEventOutcome {
        self.record(SimCall::KickEvent {
            session,
            target: target.clone(),
            fallback: fallback.cloned(),
        });
        self.kick_outcome.lock().clone()
    }

    fn remember_backend(&self, session: SessionId, target: &BackendTarget) {
        self.record(SimCall::Remembered {
            session,
            target: target.clone(),
        });
    }

    fn fire_server_disconnect(&self, session: SessionId, target: &BackendTarget) {
        self.record(SimCall::ServerDisconnect {
            session,
            target: target.clone(),
        });
    }
}

impl NotificationSink for SimProxy {
    fn show_title(&self, session: SessionId, title: &Title) {
        self.record(SimCall::Title {
            session,
            title: title.clone(),
        });
    }

    fn show_action_bar(&self, session: SessionId, text: &str) {
        self.record(SimCall::ActionBar {
            session,
            text: text.to_string(),
        });
    }

    fn clear_title(&self, session: SessionId) {
        self.record(SimCall::ClearTitle { session });
    }

    fn clear_action_bar(&self, session: SessionId) {
        self.record(SimCall::ClearActionBar { session });
    }
}

/// Receive events until one matches `stop` (inclusive) or `wait` elapses
///
/// Returns everything received, so tests can assert on the full sequence.
pub async fn collect_until<F>(
    events: &mut mpsc::UnboundedReceiver<ReconnectEvent>,
    wait: Duration,
    mut stop: F,
) -> Vec<ReconnectEvent>
where
    F: FnMut(&ReconnectEvent) -> bool,
{
    let mut seen = Vec::new();
    let _ = tokio::time::timeout(wait, async {
        while let Some(event) = events.recv().await {
            let done = stop(&event);
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    seen
}
