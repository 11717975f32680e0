//! Session → reconnect task registry
//!
//! The [`Coordinator`] is the single entry point fault handlers call into.
//! It owns at most one [`ReconnectTask`] per session and decides how a link
//! that cannot be restored is resolved.

use crate::connector::Connector;
use crate::events::{ReconnectEvent, Resolution};
use crate::feedback::Feedback;
use crate::interceptor::ReconnectInterceptor;
use crate::link::BackendLink;
use crate::policy::ReconnectPolicy;
use crate::runtime::{NotificationSink, ProxyRuntime};
use crate::task::ReconnectTask;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use relink_types::{BackendTarget, ProxyMessage, RelinkError, SessionId};
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Why a link is being resolved without reconnecting
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FallbackCause {
    /// The task ran out of attempts
    Exhausted,
    /// A vetoed transport exception
    Exception(String),
    /// A vetoed abrupt close
    Closed,
}

/// Owns the reconnect task of every session
pub struct Coordinator {
    /// Read-only reconnect policy
    policy: Arc<ReconnectPolicy>,
    /// Host proxy
    runtime: Arc<dyn ProxyRuntime>,
    /// Outbound connector
    connector: Arc<dyn Connector>,
    /// Title/action bar rendering
    feedback: Feedback,
    /// Active tasks by session
    tasks: DashMap<SessionId, Arc<ReconnectTask>>,
    /// Executor for connect attempts and retry timers
    handle: Handle,
    /// Event sender
    event_tx: mpsc::UnboundedSender<ReconnectEvent>,
    /// Event receiver (for public consumption)
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<ReconnectEvent>>>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("policy", &self.policy)
            .field("active", &self.tasks.len())
            .finish()
    }
}

impl Coordinator {
    /// Create a coordinator on the current tokio runtime
    pub fn new(
        policy: ReconnectPolicy,
        runtime: Arc<dyn ProxyRuntime>,
        notifier: Arc<dyn NotificationSink>,
        connector: Arc<dyn Connector>,
    ) -> Result<Arc<Self>, RelinkError> {
        let handle = Handle::try_current().map_err(|_| RelinkError::NoRuntime)?;
        Ok(Self::with_handle(policy, runtime, notifier, connector, handle))
    }

    /// Create a coordinator that spawns onto `handle`
    pub fn with_handle(
        policy: ReconnectPolicy,
        runtime: Arc<dyn ProxyRuntime>,
        notifier: Arc<dyn NotificationSink>,
        connector: Arc<dyn Connector>,
        handle: Handle,
    ) -> Arc<Self> {
        let policy = Arc::new(policy);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Arc::new(Self {
            feedback: Feedback::new(notifier, Arc::clone(&policy), handle.clone()),
            policy,
            runtime,
            connector,
            tasks: DashMap::new(),
            handle,
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
        })
    }

    /// Reconnect policy
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Host proxy
    pub fn runtime(&self) -> &dyn ProxyRuntime {
        self.runtime.as_ref()
    }

    pub(crate) fn connector(&self) -> &dyn Connector {
        self.connector.as_ref()
    }

    pub(crate) fn feedback(&self) -> &Feedback {
        &self.feedback
    }

    /// Take the event receiver (can only be called once)
    pub fn take_event_receiver(&self) -> Option<mpsc::UnboundedReceiver<ReconnectEvent>> {
        self.event_rx.lock().take()
    }

    /// Return the session's task, creating one bound to `link` if none exists
    ///
    /// Concurrent callers for the same session all get the same task.
    pub fn get_or_create(&self, link: &Arc<BackendLink>) -> Arc<ReconnectTask> {
        let session = link.session();
        let created = match self.tasks.entry(session) {
            Entry::Occupied(entry) => return Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                let task = Arc::new(ReconnectTask::new(Arc::clone(link)));
                entry.insert(Arc::clone(&task));
                task
            }
        };

        debug!(%session, backend = %link.target(), "Created reconnect task");
        self.emit(ReconnectEvent::Started {
            session,
            target: link.target().clone(),
        });
        created
    }

    /// Active task of a session
    pub fn task(&self, session: SessionId) -> Option<Arc<ReconnectTask>> {
        self.tasks.get(&session).map(|t| Arc::clone(t.value()))
    }

    /// Whether the session is in a retry cycle
    pub fn is_active(&self, session: SessionId) -> bool {
        self.tasks.contains_key(&session)
    }

    /// Number of sessions in a retry cycle
    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }

    /// Remove and stop the session's task
    ///
    /// No-op if the session has no task.
    pub fn cancel(&self, session: SessionId) {
        if let Some((_, task)) = self.tasks.remove(&session) {
            self.stop_removed(&task);
        }
    }

    /// Start or continue reconnecting, unless the session already left
    pub fn trigger_if_live(self: &Arc<Self>, link: &Arc<BackendLink>) {
        let session = link.session();
        if !self.runtime.is_live(session) {
            debug!(%session, "Session gone, not reconnecting");
            self.cancel(session);
            return;
        }
        self.get_or_create(link).begin(self);
    }

    /// Ask whether an automatic reconnect to the link's backend may proceed
    ///
    /// Ignored backends are vetoed without asking listeners.
    pub fn allow_reconnect(&self, link: &BackendLink) -> bool {
        let session = link.session();
        let target = link.target();

        let ignored = self.policy.is_ignored(target.name());
        if !ignored && self.runtime.fire_reconnect_check(session, target) {
            return true;
        }

        info!(%session, backend = %target, ignored, "Reconnect vetoed");
        self.emit(ReconnectEvent::Vetoed {
            session,
            target: target.clone(),
            ignored,
        });
        false
    }

    /// Called right after the host established a backend link
    ///
    /// Any reconnect still running for the session is cancelled, and the
    /// returned interceptor should handle faults of the new link.
    pub fn on_link_established(
        self: &Arc<Self>,
        session: SessionId,
        target: BackendTarget,
    ) -> ReconnectInterceptor {
        self.cancel(session);
        ReconnectInterceptor::new(
            Arc::clone(self),
            Arc::new(BackendLink::new(session, target)),
        )
    }

    /// Session left the proxy
    pub fn on_session_closed(&self, session: SessionId) {
        self.cancel(session);
    }

    /// Cancel every task
    pub fn shutdown(&self) {
        let sessions: Vec<SessionId> = self.tasks.iter().map(|e| *e.key()).collect();
        info!("Cancelling {} reconnect tasks", sessions.len());
        for session in sessions {
            self.cancel(session);
        }
    }

    /// Move the session to the fallback, or disconnect it when the
    /// fallback is the unreachable backend itself
    pub(crate) fn fall_back(&self, link: &BackendLink, cause: FallbackCause) -> Resolution {
        let session = link.session();
        let target = link.target();

        match self.runtime.default_fallback(session) {
            Some(fallback) if &fallback != target => {
                link.mark_obsolete();
                info!(%session, from = %target, to = %fallback, "Moving to fallback");
                self.runtime.switch_backend_now(session, &fallback);
                self.runtime.send_message(session, ProxyMessage::ServerWentDown);
                if cause == FallbackCause::Exhausted {
                    self.feedback.failed(session);
                }
                Resolution::Fallback(fallback)
            }
            _ => {
                let message = match cause {
                    FallbackCause::Exception(reason) => ProxyMessage::Exception(reason),
                    FallbackCause::Exhausted | FallbackCause::Closed => ProxyMessage::LostConnection,
                };
                info!(%session, backend = %target, "Disconnecting");
                self.runtime.disconnect(session, message);
                Resolution::Disconnected
            }
        }
    }

    /// Whether `task` is still the session's active task
    pub(crate) fn is_current(&self, task: &ReconnectTask) -> bool {
        self.tasks
            .get(&task.session())
            .map(|t| std::ptr::eq(Arc::as_ptr(t.value()), task))
            .unwrap_or(false)
    }

    /// Remove a task that reached a terminal state
    ///
    /// Returns `false` if `task` was no longer the session's active task.
    pub(crate) fn finish(&self, task: &Arc<ReconnectTask>) -> bool {
        self.tasks
            .remove_if(&task.session(), |_, current| Arc::ptr_eq(current, task))
            .is_some()
    }

    /// Cancel a specific task, leaving any newer task alone
    pub(crate) fn cancel_task(&self, task: &Arc<ReconnectTask>) {
        let removed = self
            .tasks
            .remove_if(&task.session(), |_, current| Arc::ptr_eq(current, task));
        if let Some((_, task)) = removed {
            self.stop_removed(&task);
        }
    }

    fn stop_removed(&self, task: &ReconnectTask) {
        let session = task.session();
        if !task.stop() {
            return;
        }
        if self.runtime.is_live(session) {
            self.feedback.clear(session);
        }
        debug!(%session, "Reconnect task cancelled");
        self.emit(ReconnectEvent::Cancelled { session });
    }

    pub(crate) fn emit(&self, event: ReconnectEvent) {
        let _ = self.event_tx.send(event);
    }

    pub(crate) fn spawn<F>(&self, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(future)
    }
}
