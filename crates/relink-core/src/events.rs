//! Reconnect lifecycle events
//!
//! The [`Coordinator`](crate::coordinator::Coordinator) reports what its
//! tasks do on an event channel, for logging, metrics or tests.

use relink_types::{BackendTarget, SessionId};
use std::time::Duration;

/// How a link that could not be restored was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Session was moved to the fallback backend
    Fallback(BackendTarget),
    /// Session was disconnected from the proxy
    Disconnected,
}

/// Reconnect lifecycle events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectEvent {
    /// A reconnect task was created for the session
    Started {
        session: SessionId,
        target: BackendTarget,
    },
    /// A connect attempt began
    Attempt {
        session: SessionId,
        target: BackendTarget,
        /// Attempt number (1-indexed)
        attempt: u32,
    },
    /// An attempt failed and the next one is scheduled
    RetryScheduled {
        session: SessionId,
        attempt: u32,
        delay: Duration,
    },
    /// An attempt succeeded; the task is finished
    Succeeded {
        session: SessionId,
        target: BackendTarget,
        attempts: u32,
    },
    /// All attempts failed; the task is finished
    Exhausted {
        session: SessionId,
        target: BackendTarget,
        attempts: u32,
        resolution: Resolution,
    },
    /// The task was cancelled
    Cancelled { session: SessionId },
    /// Automatic reconnect was vetoed (ignore-list or listener)
    Vetoed {
        session: SessionId,
        target: BackendTarget,
        /// Vetoed by the ignore-list without asking listeners
        ignored: bool,
    },
    /// A connect to the same target was already pending; no attempt made
    DuplicateConnect {
        session: SessionId,
        target: BackendTarget,
    },
    /// A connect result arrived after the task stopped and was dropped
    ResultDiscarded { session: SessionId, attempt: u32 },
}

impl ReconnectEvent {
    /// Session the event is about
    pub fn session(&self) -> SessionId {
        match self {
            Self::Started { session, .. }
            | Self::Attempt { session, .. }
            | Self::RetryScheduled { session, .. }
            | Self::Succeeded { session, .. }
            | Self::Exhausted { session, .. }
            | Self::Cancelled { session }
            | Self::Vetoed { session, .. }
            | Self::DuplicateConnect { session, .. }
            | Self::ResultDiscarded { session, .. } => *session,
        }
    }

    /// Whether this event ends a task
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::Exhausted { .. } | Self::Cancelled { .. }
        )
    }
}
