//! Per-session reconnect state machine
//!
//! ```text
//! Idle ──► Attempting ──► Succeeded
//!              │   ▲
//!              ▼   │
//!          WaitingRetry ──► (attempt limit) Exhausted
//!
//! Idle / WaitingRetry ──► WaitingRetry   (connect already pending)
//! Attempting / WaitingRetry ──► Cancelled
//! ```
//!
//! Every transition happens under the task's own lock, so a fault trigger,
//! the retry timer and a cancellation for the same session never interleave.
//! The lock is never held across an `.await`.

use crate::connector::BackendTransport;
use crate::coordinator::{Coordinator, FallbackCause};
use crate::events::ReconnectEvent;
use crate::link::BackendLink;
use parking_lot::Mutex;
use relink_types::{BackendTarget, RelinkError, SessionId};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Reconnect task state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Created, no attempt yet
    Idle,
    /// A connect attempt is in flight
    Attempting,
    /// Waiting for the retry timer
    WaitingRetry,
    /// Reconnected
    Succeeded,
    /// Attempt limit reached
    Exhausted,
    /// Stopped from outside
    Cancelled,
}

impl TaskState {
    /// Whether the task is finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Exhausted | Self::Cancelled)
    }
}

struct TaskInner {
    state: TaskState,
    attempts: u32,
    retry_timer: Option<JoinHandle<()>>,
}

/// Retries one session's connection to one backend
pub struct ReconnectTask {
    link: Arc<BackendLink>,
    inner: Mutex<TaskInner>,
}

impl std::fmt::Debug for ReconnectTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ReconnectTask")
            .field("session", &self.link.session())
            .field("target", self.link.target())
            .field("state", &inner.state)
            .field("attempts", &inner.attempts)
            .finish()
    }
}

impl ReconnectTask {
    pub(crate) fn new(link: Arc<BackendLink>) -> Self {
        Self {
            link,
            inner: Mutex::new(TaskInner {
                state: TaskState::Idle,
                attempts: 0,
                retry_timer: None,
            }),
        }
    }

    /// Session being reconnected
    pub fn session(&self) -> SessionId {
        self.link.session()
    }

    /// Backend being retried
    pub fn target(&self) -> &BackendTarget {
        self.link.target()
    }

    /// Link that failed
    pub fn link(&self) -> &Arc<BackendLink> {
        &self.link
    }

    /// Current state
    pub fn state(&self) -> TaskState {
        self.inner.lock().state
    }

    /// Attempts started so far
    pub fn attempts(&self) -> u32 {
        self.inner.lock().attempts
    }

    /// Start the first attempt; no-op once the task is already running
    pub(crate) fn begin(self: &Arc<Self>, coordinator: &Arc<Coordinator>) {
        self.try_reconnect(coordinator, TaskState::Idle);
    }

    /// Make the next attempt, or give up if the limit is reached
    ///
    /// Only proceeds if the task is still in the state `from` the caller
    /// observed, so racing triggers cannot start two attempts.
    fn try_reconnect(self: &Arc<Self>, coordinator: &Arc<Coordinator>, from: TaskState) {
        let session = self.session();
        let target = self.target();
        let policy = coordinator.policy();
        let runtime = coordinator.runtime();

        let mut inner = self.inner.lock();
        if inner.state != from {
            debug!(%session, state = ?inner.state, "Reconnect already in progress");
            return;
        }

        if policy.is_exhausted(inner.attempts) {
            // Only whoever removes the task from the registry resolves it
            if !coordinator.finish(self) {
                debug!(%session, "Task replaced before giving up");
                return;
            }
            inner.state = TaskState::Exhausted;
            let attempts = inner.attempts;
            drop(inner);

            warn!(
                "Giving up reconnecting {} to {} after {} attempts",
                session, target, attempts
            );
            let resolution = coordinator.fall_back(&self.link, FallbackCause::Exhausted);
            coordinator.emit(ReconnectEvent::Exhausted {
                session,
                target: target.clone(),
                attempts,
                resolution,
            });
            return;
        }

        if runtime.contains_pending_connect(session, target)
            || !runtime.add_pending_connect(session, target)
        {
            warn!("Session {} already connecting to {}", session, target);
            self.schedule_retry(coordinator, &mut inner);
            drop(inner);
            coordinator.emit(ReconnectEvent::DuplicateConnect {
                session,
                target: target.clone(),
            });
            return;
        }

        inner.attempts += 1;
        inner.state = TaskState::Attempting;
        let attempt = inner.attempts;
        drop(inner);

        info!(
            "Reconnecting {} to {} (attempt {}/{})",
            session, target, attempt, policy.max_tries()
        );
        coordinator.feedback().reconnecting(session, attempt);
        coordinator.emit(ReconnectEvent::Attempt {
            session,
            target: target.clone(),
            attempt,
        });

        let task = Arc::clone(self);
        let coord = Arc::clone(coordinator);
        coordinator.spawn(async move {
            let result = coord
                .connector()
                .connect(session, task.target(), coord.policy().connect_timeout())
                .await;
            task.on_connect_result(&coord, attempt, result).await;
        });
    }

    async fn on_connect_result(
        self: &Arc<Self>,
        coordinator: &Arc<Coordinator>,
        attempt: u32,
        result: Result<Box<dyn BackendTransport>, RelinkError>,
    ) {
        let session = self.session();
        let runtime = coordinator.runtime();
        runtime.remove_pending_connect(session, self.target());

        match result {
            Ok(mut transport) => {
                if !self.transition_from_attempt(coordinator, attempt, TaskState::Succeeded) {
                    debug!(%session, attempt, "Dropping connection for stopped reconnect task");
                    transport.close().await;
                    coordinator.emit(ReconnectEvent::ResultDiscarded { session, attempt });
                    return;
                }

                info!("Reconnected {} to {} on attempt {}", session, self.target(), attempt);
                coordinator.finish(self);
                runtime.adopt_backend(session, transport);
                coordinator.feedback().connecting(session);
                coordinator.emit(ReconnectEvent::Succeeded {
                    session,
                    target: self.target().clone(),
                    attempts: attempt,
                });
            }
            Err(err) => {
                debug!(%session, attempt, "Reconnect attempt failed: {}", err);

                let delay = coordinator.policy().retry_delay;
                let mut inner = self.inner.lock();
                if inner.state != TaskState::Attempting
                    || inner.attempts != attempt
                    || !coordinator.is_current(self)
                {
                    drop(inner);
                    coordinator.emit(ReconnectEvent::ResultDiscarded { session, attempt });
                    return;
                }

                runtime.send_keep_alive(session, rand::random());
                self.schedule_retry(coordinator, &mut inner);
                drop(inner);

                debug!(%session, attempt, ?delay, "Retry scheduled");
                coordinator.emit(ReconnectEvent::RetryScheduled {
                    session,
                    attempt,
                    delay,
                });
            }
        }
    }

    /// Wait out the retry delay, then re-check and try again
    fn schedule_retry(self: &Arc<Self>, coordinator: &Arc<Coordinator>, inner: &mut TaskInner) {
        let delay = coordinator.policy().retry_delay;
        inner.state = TaskState::WaitingRetry;

        let task = Arc::clone(self);
        let coord = Arc::clone(coordinator);
        inner.retry_timer = Some(coordinator.spawn(async move {
            tokio::time::sleep(delay).await;
            task.on_retry_timer(&coord);
        }));
    }

    fn transition_from_attempt(
        &self,
        coordinator: &Coordinator,
        attempt: u32,
        next: TaskState,
    ) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == TaskState::Attempting
            && inner.attempts == attempt
            && coordinator.is_current(self)
        {
            inner.state = next;
            true
        } else {
            false
        }
    }

    /// Retry timer fired; liveness and backend are checked now, not when
    /// the timer was set
    fn on_retry_timer(self: &Arc<Self>, coordinator: &Arc<Coordinator>) {
        {
            let mut inner = self.inner.lock();
            inner.retry_timer = None;
            if inner.state != TaskState::WaitingRetry {
                return;
            }
        }
        if !coordinator.is_current(self) {
            return;
        }

        let session = self.session();
        let runtime = coordinator.runtime();
        let live = runtime.is_live(session);
        let same_backend = runtime.current_backend(session).as_ref() == Some(self.target());

        if live && same_backend {
            self.try_reconnect(coordinator, TaskState::WaitingRetry);
        } else {
            debug!(%session, live, same_backend, "Abandoning reconnect");
            coordinator.cancel_task(self);
        }
    }

    /// Stop the task; returns `false` if it had already finished
    pub(crate) fn stop(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() {
            return false;
        }
        inner.state = TaskState::Cancelled;
        if let Some(timer) = inner.retry_timer.take() {
            timer.abort();
        }
        true
    }
}
