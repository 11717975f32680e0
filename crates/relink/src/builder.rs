//! Coordinator Builder Pattern
//!
//! Collects the policy and the host's collaborators, validates them and
//! constructs a [`Coordinator`].
//!
//! # Example
//!
//! ```
//! use relink::builder::RelinkBuilder;
//! use std::time::Duration;
//!
//! let builder = RelinkBuilder::new()
//!     .with_max_tries(10)
//!     .with_retry_delay(Duration::from_millis(500))
//!     .with_ignored_backend("limbo");
//!
//! assert_eq!(builder.policy().max_tries(), 10);
//! ```

use relink_core::{
    Connector, Coordinator, NotificationSink, ProxyRuntime, ReconnectPolicy, ReconnectSettings,
    SettingsError, ShutdownMatcher, TcpConnector,
};
use relink_types::RelinkError;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info};

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No proxy runtime given
    #[error("a proxy runtime must be specified")]
    MissingRuntime,

    /// No notification sink given
    #[error("a notification sink must be specified")]
    MissingNotifier,

    /// Settings could not be parsed
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),

    /// Coordinator construction failed
    #[error(transparent)]
    Core(#[from] RelinkError),
}

/// Builder for a [`Coordinator`]
///
/// Unset connector defaults to [`TcpConnector`]; unset handle defaults to
/// the current tokio runtime.
#[derive(Default)]
pub struct RelinkBuilder {
    policy: ReconnectPolicy,
    runtime: Option<Arc<dyn ProxyRuntime>>,
    notifier: Option<Arc<dyn NotificationSink>>,
    connector: Option<Arc<dyn Connector>>,
    handle: Option<Handle>,
}

impl std::fmt::Debug for RelinkBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelinkBuilder")
            .field("policy", &self.policy)
            .field("runtime", &self.runtime.is_some())
            .field("notifier", &self.notifier.is_some())
            .field("connector", &self.connector.is_some())
            .finish()
    }
}

impl RelinkBuilder {
    /// Create a builder with the default policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole policy
    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use a policy loaded from settings
    pub fn with_settings(mut self, settings: ReconnectSettings) -> Self {
        self.policy = settings.into_policy();
        self
    }

    /// Use a policy loaded from a JSON settings document
    pub fn with_settings_json(self, json: &str) -> Result<Self, ConfigError> {
        let settings = ReconnectSettings::from_json(json)?;
        Ok(self.with_settings(settings))
    }

    /// Set maximum attempts per outage
    pub fn with_max_tries(mut self, max: u32) -> Self {
        self.policy = self.policy.with_max_tries(max);
        self
    }

    /// Set the delay between attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.policy = self.policy.with_retry_delay(delay);
        self
    }

    /// Set the per-attempt connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.policy = self.policy.with_connect_timeout(timeout);
        self
    }

    /// Never reconnect to this backend automatically
    pub fn with_ignored_backend(mut self, name: impl Into<String>) -> Self {
        self.policy = self.policy.with_ignored_backend(name);
        self
    }

    /// Set how shutdown kicks are recognised
    pub fn with_shutdown(mut self, matcher: ShutdownMatcher) -> Self {
        self.policy = self.policy.with_shutdown(matcher);
        self
    }

    /// Set the host proxy
    pub fn with_runtime(mut self, runtime: Arc<dyn ProxyRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Set where titles and action bars go
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Set the connector
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Spawn attempts and timers onto this runtime
    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Policy as configured so far
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.is_none() {
            return Err(ConfigError::MissingRuntime);
        }
        if self.notifier.is_none() {
            return Err(ConfigError::MissingNotifier);
        }
        Ok(())
    }

    /// Validate and construct the coordinator
    pub fn build(self) -> Result<Arc<Coordinator>, ConfigError> {
        self.validate()?;

        let runtime = self.runtime.ok_or(ConfigError::MissingRuntime)?;
        let notifier = self.notifier.ok_or(ConfigError::MissingNotifier)?;
        let connector = match self.connector {
            Some(connector) => connector,
            None => {
                debug!("No connector given, using TCP");
                Arc::new(TcpConnector::new())
            }
        };

        info!(
            max_tries = self.policy.max_tries(),
            retry_delay = ?self.policy.retry_delay,
            connect_timeout = ?self.policy.connect_timeout(),
            ignored = self.policy.ignored_backends.len(),
            shutdown = self.policy.shutdown.is_enabled(),
            "Building reconnect coordinator"
        );

        let coordinator = match self.handle {
            Some(handle) => Coordinator::with_handle(self.policy, runtime, notifier, connector, handle),
            None => Coordinator::new(self.policy, runtime, notifier, connector)?,
        };
        Ok(coordinator)
    }
}
