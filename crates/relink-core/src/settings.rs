//! Reconnect settings as written in the proxy's config file
//!
//! Finding and reading the file is the host's job; this module takes the
//! already-parsed document (or JSON text) and normalises it into a
//! [`ReconnectPolicy`].
//!
//! # Example
//!
//! ```
//! use relink_core::settings::ReconnectSettings;
//!
//! let settings = ReconnectSettings::from_json(r#"{
//!     "max-reconnect-tries": 3,
//!     "reconnect-time": 0,
//!     "ignored-servers": ["lobby"],
//!     "shutdown": { "text": "Server (closed|restarting)", "regex": true }
//! }"#).unwrap();
//!
//! let policy = settings.into_policy();
//! assert_eq!(policy.max_tries(), 3);
//! assert!(policy.shutdown.matches("Server restarting"));
//! ```

use crate::policy::{defaults, FeedbackTexts, ReconnectPolicy};
use crate::shutdown::ShutdownMatcher;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Settings parsing errors
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Document is not valid JSON or has wrongly typed fields
    #[error("invalid reconnect settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A title/action-bar text pair
///
/// Keys left out of the section fall back to the built-in text for that
/// slot; an empty string turns the slot off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TextPair {
    /// Subtitle text
    pub title: Option<String>,
    /// Action bar text
    pub actionbar: Option<String>,
}

impl TextPair {
    /// Both texts given explicitly
    pub fn new(title: impl Into<String>, actionbar: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            actionbar: Some(actionbar.into()),
        }
    }

    fn title_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.title.as_deref().unwrap_or(default)
    }

    fn actionbar_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.actionbar.as_deref().unwrap_or(default)
    }
}

/// Shutdown-kick section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShutdownSettings {
    /// Kick text (or pattern); empty disables classification
    pub text: Option<String>,
    /// Treat `text` as a regular expression
    pub regex: bool,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            text: Some("Server closed".to_string()),
            regex: false,
        }
    }
}

/// Raw reconnect settings, keyed like the config file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ReconnectSettings {
    /// Texts while reconnecting
    pub reconnecting_text: TextPair,
    /// Texts after reconnecting
    pub connecting_text: TextPair,
    /// Texts after falling back
    pub failed_text: TextPair,
    /// Attempts before giving up
    pub max_reconnect_tries: i64,
    /// Milliseconds between attempts
    pub reconnect_time: i64,
    /// Milliseconds before a single attempt times out
    pub reconnect_timeout: i64,
    /// Backend names exempt from automatic reconnects
    pub ignored_servers: Vec<String>,
    /// Shutdown-kick classification
    pub shutdown: ShutdownSettings,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            reconnecting_text: TextPair::default(),
            connecting_text: TextPair::default(),
            failed_text: TextPair::default(),
            max_reconnect_tries: 20,
            reconnect_time: 1000,
            reconnect_timeout: 5000,
            ignored_servers: Vec::new(),
            shutdown: ShutdownSettings::default(),
        }
    }
}

impl ReconnectSettings {
    /// Parse settings from JSON; missing keys keep their defaults
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse settings from an already-decoded document
    pub fn from_value(value: serde_json::Value) -> Result<Self, SettingsError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Shutdown matcher described by these settings
    ///
    /// An unparsable pattern is logged and disables classification.
    pub fn shutdown_matcher(&self) -> ShutdownMatcher {
        match self.shutdown.text.as_deref() {
            None | Some("") => ShutdownMatcher::None,
            Some(text) if self.shutdown.regex => ShutdownMatcher::pattern_or_disabled(text),
            Some(text) => ShutdownMatcher::exact(text),
        }
    }

    /// Normalise into a policy, clamping out-of-range numbers
    pub fn into_policy(self) -> ReconnectPolicy {
        let shutdown = self.shutdown_matcher();
        let texts = FeedbackTexts::from_raw(
            self.reconnecting_text.title_or(defaults::RECONNECTING_TITLE),
            self.reconnecting_text.actionbar_or(defaults::RECONNECTING_ACTION_BAR),
            self.connecting_text.title_or(defaults::CONNECTING_TITLE),
            self.connecting_text.actionbar_or(defaults::CONNECTING_ACTION_BAR),
            self.failed_text.title_or(defaults::FAILED_TITLE),
            self.failed_text.actionbar_or(defaults::FAILED_ACTION_BAR),
        );

        let max_tries = self.max_reconnect_tries.clamp(1, u32::MAX as i64) as u32;
        let retry_delay = Duration::from_millis(self.reconnect_time.max(0) as u64);
        let connect_timeout = Duration::from_millis(self.reconnect_timeout.max(0) as u64);

        ReconnectPolicy::new()
            .with_max_tries(max_tries)
            .with_retry_delay(retry_delay)
            .with_connect_timeout(connect_timeout)
            .with_ignored_backends(self.ignored_servers)
            .with_shutdown(shutdown)
            .with_texts(texts)
    }
}
