//! Reconnect policy: how often, how long, and what to show

use crate::shutdown::ShutdownMatcher;
use relink_types::translate_color_codes;
use std::collections::HashSet;
use std::time::Duration;

/// Lowest connect timeout a policy will use
pub const MIN_CONNECT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Placeholder in reconnecting texts replaced by the dots animation
pub const DOTS_PLACEHOLDER: &str = "{%dots%}";

/// On-screen texts, already translated to `§` colour codes
///
/// An empty text means "don't show anything" for that slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackTexts {
    /// Subtitle while a reconnect attempt is running
    pub reconnecting_title: String,
    /// Action bar while a reconnect attempt is running
    pub reconnecting_action_bar: String,
    /// Subtitle after a successful reconnect
    pub connecting_title: String,
    /// Action bar after a successful reconnect
    pub connecting_action_bar: String,
    /// Subtitle after falling back
    pub failed_title: String,
    /// Action bar after falling back
    pub failed_action_bar: String,
}

/// Built-in texts, `&`-coded as in config files
pub(crate) mod defaults {
    pub const RECONNECTING_TITLE: &str = "&7Reconnecting{%dots%}";
    pub const RECONNECTING_ACTION_BAR: &str =
        "&a&lPlease do not leave! &7Reconnecting to server{%dots%}";
    pub const CONNECTING_TITLE: &str = "&aConnecting..";
    pub const CONNECTING_ACTION_BAR: &str = "&7Connecting you to the server..";
    pub const FAILED_TITLE: &str = "&cReconnecting failed!";
    pub const FAILED_ACTION_BAR: &str = "&eYou have been moved to the fallback server!";
}

impl Default for FeedbackTexts {
    fn default() -> Self {
        Self::from_raw(
            defaults::RECONNECTING_TITLE,
            defaults::RECONNECTING_ACTION_BAR,
            defaults::CONNECTING_TITLE,
            defaults::CONNECTING_ACTION_BAR,
            defaults::FAILED_TITLE,
            defaults::FAILED_ACTION_BAR,
        )
    }
}

impl FeedbackTexts {
    /// Build from `&`-coded texts as written in config files
    pub fn from_raw(
        reconnecting_title: &str,
        reconnecting_action_bar: &str,
        connecting_title: &str,
        connecting_action_bar: &str,
        failed_title: &str,
        failed_action_bar: &str,
    ) -> Self {
        let t = |s: &str| translate_color_codes('&', s);
        Self {
            reconnecting_title: t(reconnecting_title),
            reconnecting_action_bar: t(reconnecting_action_bar),
            connecting_title: t(connecting_title),
            connecting_action_bar: t(connecting_action_bar),
            failed_title: t(failed_title),
            failed_action_bar: t(failed_action_bar),
        }
    }

    /// No feedback at all
    pub fn silent() -> Self {
        Self::from_raw("", "", "", "", "", "")
    }
}

/// Process-wide reconnect configuration
///
/// Loaded once and read-only afterwards. Use the `with_*` methods or
/// [`ReconnectSettings`](crate::settings::ReconnectSettings) to build one.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    max_tries: u32,
    /// Pause between a failed attempt and the next one
    pub retry_delay: Duration,
    connect_timeout: Duration,
    /// Backend names that never reconnect automatically
    pub ignored_backends: HashSet<String>,
    /// Which kicks count as "server shutting down"
    pub shutdown: ShutdownMatcher,
    /// On-screen texts
    pub texts: FeedbackTexts,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_tries: 20,
            retry_delay: Duration::from_millis(1000),
            connect_timeout: Duration::from_millis(5000),
            ignored_backends: HashSet::new(),
            shutdown: ShutdownMatcher::exact("Server closed"),
            texts: FeedbackTexts::default(),
        }
    }
}

impl ReconnectPolicy {
    /// Create a new policy with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum attempts (values below 1 become 1)
    pub fn with_max_tries(mut self, max: u32) -> Self {
        self.max_tries = max.max(1);
        self
    }

    /// Set delay between attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set connect timeout (raised to [`MIN_CONNECT_TIMEOUT`] if lower)
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout.max(MIN_CONNECT_TIMEOUT);
        self
    }

    /// Exempt a backend from automatic reconnects
    pub fn with_ignored_backend(mut self, name: impl Into<String>) -> Self {
        self.ignored_backends.insert(name.into());
        self
    }

    /// Exempt several backends from automatic reconnects
    pub fn with_ignored_backends(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ignored_backends.extend(names.into_iter().map(Into::into));
        self
    }

    /// Set shutdown-kick classification
    pub fn with_shutdown(mut self, matcher: ShutdownMatcher) -> Self {
        self.shutdown = matcher;
        self
    }

    /// Set on-screen texts
    pub fn with_texts(mut self, texts: FeedbackTexts) -> Self {
        self.texts = texts;
        self
    }

    /// Connect attempts made before giving up (at least 1)
    pub fn max_tries(&self) -> u32 {
        self.max_tries.max(1)
    }

    /// Effective connect timeout
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout.max(MIN_CONNECT_TIMEOUT)
    }

    /// Whether a backend is on the ignore-list
    pub fn is_ignored(&self, backend_name: &str) -> bool {
        self.ignored_backends.contains(backend_name)
    }

    /// Whether another attempt would exceed the limit
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts.saturating_add(1) > self.max_tries()
    }

    /// How long the reconnecting title stays, in game ticks
    ///
    /// Long enough to cover the slowest possible attempt plus the pause
    /// before it.
    pub fn reconnecting_title_ticks(&self) -> u32 {
        let millis = self.retry_delay.as_millis() + self.connect_timeout().as_millis() + 1000;
        (millis / 1000 * 20).min(u32::MAX as u128) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.max_tries(), 20);
        assert_eq!(policy.retry_delay, Duration::from_millis(1000));
        assert_eq!(policy.connect_timeout(), Duration::from_millis(5000));
        assert!(policy.shutdown.matches("Server closed"));
        assert_eq!(policy.texts.connecting_title, "§aConnecting..");
    }

    #[test]
    fn test_exhaustion_boundary() {
        let policy = ReconnectPolicy::new().with_max_tries(3);
        assert!(!policy.is_exhausted(0));
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
        assert!(policy.is_exhausted(u32::MAX));
    }

    #[test]
    fn test_floors() {
        let policy = ReconnectPolicy::new()
            .with_max_tries(0)
            .with_connect_timeout(Duration::from_millis(10));
        assert_eq!(policy.max_tries(), 1);
        assert!(!policy.is_exhausted(0));
        assert_eq!(policy.connect_timeout(), MIN_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_title_ticks() {
        let policy = ReconnectPolicy::new()
            .with_retry_delay(Duration::from_millis(1000))
            .with_connect_timeout(Duration::from_millis(5000));
        assert_eq!(policy.reconnecting_title_ticks(), 140);

        let policy = policy.with_retry_delay(Duration::from_millis(500));
        // Integer seconds, like the client's title timer
        assert_eq!(policy.reconnecting_title_ticks(), 120);
    }

    #[test]
    fn test_ignore_list() {
        let policy = ReconnectPolicy::new().with_ignored_backends(["lobby", "auth"]);
        assert!(policy.is_ignored("lobby"));
        assert!(!policy.is_ignored("survival"));
    }
}
