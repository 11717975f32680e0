//! Titles and action bars shown while reconnecting

use crate::policy::{ReconnectPolicy, DOTS_PLACEHOLDER};
use crate::runtime::{NotificationSink, Title};
use relink_types::SessionId;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// How long the failed action bar stays before it is cleared
pub const FAILED_ACTION_BAR_LINGER: Duration = Duration::from_secs(5);

/// Dots animation for an attempt count
pub fn dots(attempts: u32) -> String {
    ".".repeat((attempts % 4) as usize)
}

/// Renders the policy's texts onto a [`NotificationSink`]
#[derive(Clone)]
pub struct Feedback {
    sink: Arc<dyn NotificationSink>,
    policy: Arc<ReconnectPolicy>,
    handle: Handle,
}

impl Feedback {
    /// Create feedback glue; `handle` runs delayed clears
    pub fn new(sink: Arc<dyn NotificationSink>, policy: Arc<ReconnectPolicy>, handle: Handle) -> Self {
        Self { sink, policy, handle }
    }

    /// Attempt `attempts` is starting
    pub fn reconnecting(&self, session: SessionId, attempts: u32) {
        let texts = &self.policy.texts;
        let dots = dots(attempts);

        if !texts.reconnecting_title.is_empty() {
            let title = Title {
                main: String::new(),
                sub: texts.reconnecting_title.replace(DOTS_PLACEHOLDER, &dots),
                stay_ticks: self.policy.reconnecting_title_ticks(),
                fade_in_ticks: 0,
                fade_out_ticks: 0,
            };
            self.sink.show_title(session, &title);
        }

        if !texts.reconnecting_action_bar.is_empty() {
            let text = texts.reconnecting_action_bar.replace(DOTS_PLACEHOLDER, &dots);
            self.sink.show_action_bar(session, &text);
        }
    }

    /// The session is back on its backend
    pub fn connecting(&self, session: SessionId) {
        let texts = &self.policy.texts;

        if !texts.connecting_title.is_empty() {
            let title = Title {
                main: String::new(),
                sub: texts.connecting_title.clone(),
                stay_ticks: 20,
                fade_in_ticks: 10,
                fade_out_ticks: 10,
            };
            self.sink.show_title(session, &title);
        }

        if !texts.connecting_action_bar.is_empty() {
            self.sink.show_action_bar(session, &texts.connecting_action_bar);
        }
    }

    /// The session was moved to the fallback backend
    ///
    /// Unconfigured slots are cleared instead so no stale reconnecting text
    /// stays on screen.
    pub fn failed(&self, session: SessionId) {
        let texts = &self.policy.texts;

        if !texts.failed_title.is_empty() {
            let title = Title {
                main: String::new(),
                sub: texts.failed_title.clone(),
                stay_ticks: 80,
                fade_in_ticks: 10,
                fade_out_ticks: 10,
            };
            self.sink.show_title(session, &title);
        } else {
            self.sink.clear_title(session);
        }

        if !texts.failed_action_bar.is_empty() {
            self.sink.show_action_bar(session, &texts.failed_action_bar);

            let sink = Arc::clone(&self.sink);
            self.handle.spawn(async move {
                tokio::time::sleep(FAILED_ACTION_BAR_LINGER).await;
                sink.clear_action_bar(session);
            });
        } else {
            self.sink.clear_action_bar(session);
        }
    }

    /// Remove whatever reconnect feedback may still be visible
    pub fn clear(&self, session: SessionId) {
        let texts = &self.policy.texts;

        if !texts.reconnecting_title.is_empty() || !texts.connecting_title.is_empty() {
            self.sink.clear_title(session);
        }
        if !texts.reconnecting_action_bar.is_empty() || !texts.connecting_action_bar.is_empty() {
            self.sink.clear_action_bar(session);
        }
    }
}
