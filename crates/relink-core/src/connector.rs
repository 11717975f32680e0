//! Backend connector abstraction
//!
//! A [`Connector`] makes one connection attempt to a backend under a
//! timeout. It has no retry policy of its own; reconnect tasks decide when
//! to call it again. The trait also lets tests replace real sockets with
//! [`MockConnector`].
//!
//! # Example
//!
//! ```no_run
//! use relink_core::connector::{Connector, TcpConnector};
//! use relink_types::{BackendTarget, RelinkError, SessionId};
//! use std::time::Duration;
//!
//! async fn example() -> Result<(), RelinkError> {
//!     let connector = TcpConnector::new();
//!     let target = BackendTarget::new("lobby", "127.0.0.1:25565");
//!     let mut transport = connector
//!         .connect(SessionId::random(), &target, Duration::from_secs(5))
//!         .await?;
//!     transport.close().await;
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use relink_types::{BackendTarget, RelinkError, SessionId};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpSocket, TcpStream};
use tokio::time::timeout;
use tracing::{debug, instrument};

/// A connected backend transport, handed to the proxy on success
#[async_trait]
pub trait BackendTransport: Send + Sync + fmt::Debug {
    /// Backend this transport is connected to
    fn target(&self) -> &BackendTarget;

    /// Whether the transport is still open
    fn is_open(&self) -> bool;

    /// Close the transport
    async fn close(&mut self);
}

/// Makes single connection attempts to backends
#[async_trait]
pub trait Connector: Send + Sync {
    /// Attempt one connection; the timeout is enforced here
    async fn connect(
        &self,
        session: SessionId,
        target: &BackendTarget,
        timeout: Duration,
    ) -> Result<Box<dyn BackendTransport>, RelinkError>;
}

/// Plain TCP connector
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    local_address: Option<IpAddr>,
}

impl TcpConnector {
    /// Create a connector using the OS-chosen local address
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind outgoing connections to a local address (port chosen by the OS)
    ///
    /// Useful on multi-homed hosts where backends whitelist the proxy IP.
    pub fn with_local_address(mut self, address: IpAddr) -> Self {
        self.local_address = Some(address);
        self
    }

    async fn resolve(target: &BackendTarget) -> Result<SocketAddr, RelinkError> {
        let invalid = |reason: String| RelinkError::InvalidAddress {
            address: target.address.clone(),
            reason,
        };

        tokio::net::lookup_host(target.address.as_str())
            .await
            .map_err(|e| invalid(e.to_string()))?
            .next()
            .ok_or_else(|| invalid("no addresses resolved".into()))
    }

    async fn dial(&self, remote: SocketAddr) -> std::io::Result<TcpStream> {
        let socket = if remote.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };

        if let Some(local) = self.local_address {
            socket.bind(SocketAddr::new(local, 0))?;
        }

        let stream = socket.connect(remote).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

#[async_trait]
impl Connector for TcpConnector {
    #[instrument(skip(self, target), fields(backend = %target))]
    async fn connect(
        &self,
        session: SessionId,
        target: &BackendTarget,
        connect_timeout: Duration,
    ) -> Result<Box<dyn BackendTransport>, RelinkError> {
        debug!("Connecting to backend");

        let attempt = async {
            let remote = Self::resolve(target).await?;
            self.dial(remote)
                .await
                .map_err(|e| RelinkError::connect_failed(target.name.clone(), e))
        };

        let stream = timeout(connect_timeout, attempt)
            .await
            .map_err(|_| RelinkError::ConnectTimeout {
                target: target.name.clone(),
                timeout: connect_timeout,
            })??;

        debug!("Backend connected");
        Ok(Box::new(TcpTransport {
            target: target.clone(),
            stream: Some(stream),
        }))
    }
}

/// TCP connection to a backend
#[derive(Debug)]
pub struct TcpTransport {
    target: BackendTarget,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Take the underlying stream, leaving the transport closed
    pub fn into_stream(mut self) -> Option<TcpStream> {
        self.stream.take()
    }
}

#[async_trait]
impl BackendTransport for TcpTransport {
    fn target(&self) -> &BackendTarget {
        &self.target
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
    }
}

/// Scripted outcome for [`MockConnector`]
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    /// Connect succeeds
    Succeed,
    /// Connect is refused
    Fail(String),
    /// Connect times out
    Timeout,
}

/// One recorded call to [`MockConnector::connect`]
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone)]
pub struct MockAttempt {
    /// Session being reconnected
    pub session: SessionId,
    /// Backend dialled
    pub target: BackendTarget,
    /// Timeout passed in
    pub timeout: Duration,
    /// When the call started
    pub at: std::time::Instant,
}

/// Mock connector for testing
///
/// Returns scripted outcomes in order, then the fallback outcome for every
/// further call, and records each attempt.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug)]
pub struct MockConnector {
    script: parking_lot::Mutex<std::collections::VecDeque<MockOutcome>>,
    fallback: MockOutcome,
    latency: Duration,
    attempts: parking_lot::Mutex<Vec<MockAttempt>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockConnector {
    /// Connector whose unscripted attempts fail
    pub fn failing() -> Self {
        Self::with_fallback(MockOutcome::Fail("mock connection refused".into()))
    }

    /// Connector whose unscripted attempts succeed
    pub fn succeeding() -> Self {
        Self::with_fallback(MockOutcome::Succeed)
    }

    /// Connector with a custom outcome for unscripted attempts
    pub fn with_fallback(fallback: MockOutcome) -> Self {
        Self {
            script: parking_lot::Mutex::new(std::collections::VecDeque::new()),
            fallback,
            latency: Duration::ZERO,
            attempts: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Delay every attempt by `latency` before resolving
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue an outcome for the next unscripted attempt
    pub fn push_outcome(&self, outcome: MockOutcome) {
        self.script.lock().push_back(outcome);
    }

    /// Queue several outcomes
    pub fn push_outcomes(&self, outcomes: impl IntoIterator<Item = MockOutcome>) {
        self.script.lock().extend(outcomes);
    }

    /// Attempts made so far
    pub fn attempts(&self) -> Vec<MockAttempt> {
        self.attempts.lock().clone()
    }

    /// Number of attempts made so far
    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().len()
    }
}

/// Transport produced by [`MockConnector`]
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug)]
pub struct MockTransport {
    target: BackendTarget,
    open: bool,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockTransport {
    /// Create an open mock transport
    pub fn new(target: BackendTarget) -> Self {
        Self { target, open: true }
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl BackendTransport for MockTransport {
    fn target(&self) -> &BackendTarget {
        &self.target
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) {
        self.open = false;
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        session: SessionId,
        target: &BackendTarget,
        timeout: Duration,
    ) -> Result<Box<dyn BackendTransport>, RelinkError> {
        self.attempts.lock().push(MockAttempt {
            session,
            target: target.clone(),
            timeout,
            at: std::time::Instant::now(),
        });

        let outcome = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match outcome {
            MockOutcome::Succeed => Ok(Box::new(MockTransport::new(target.clone()))),
            MockOutcome::Fail(reason) => Err(RelinkError::connect_failed(target.name.clone(), reason)),
            MockOutcome::Timeout => Err(RelinkError::ConnectTimeout {
                target: target.name.clone(),
                timeout,
            }),
        }
    }
}
