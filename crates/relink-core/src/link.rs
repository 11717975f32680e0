//! A session's link to one backend

use relink_types::{BackendTarget, SessionId};
use std::sync::atomic::{AtomicBool, Ordering};

/// The proxy ↔ backend link of one session
///
/// Once a link is marked obsolete it has been superseded, and every later
/// fault reported for it is ignored.
#[derive(Debug)]
pub struct BackendLink {
    session: SessionId,
    target: BackendTarget,
    obsolete: AtomicBool,
}

impl BackendLink {
    /// Create a fresh, healthy link
    pub fn new(session: SessionId, target: BackendTarget) -> Self {
        Self {
            session,
            target,
            obsolete: AtomicBool::new(false),
        }
    }

    /// Session the link belongs to
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Backend the link points to
    pub fn target(&self) -> &BackendTarget {
        &self.target
    }

    /// Whether the link has been superseded
    pub fn is_obsolete(&self) -> bool {
        self.obsolete.load(Ordering::Acquire)
    }

    /// Mark the link superseded
    ///
    /// Returns `true` only for the call that actually flipped the flag.
    pub fn mark_obsolete(&self) -> bool {
        self.obsolete
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
