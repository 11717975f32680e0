//! Demo: Simulated Proxy Outages
//!
//! Showcases: shutdown-kick reconnects, retry exhaustion with fallback,
//! cancellation when a player leaves, and ignore-list vetoes
//!
//! Run: cargo run --bin proxy_sim
//! Logs: RUST_LOG=relink_core=debug cargo run --bin proxy_sim

use colored::*;
use relink::prelude::*;
use relink_core::testkit::SimProxy;
use relink_core::{MockConnector, MockOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

fn lobby() -> BackendTarget {
    BackendTarget::new("lobby", "10.0.0.2:25565")
}

fn hub() -> BackendTarget {
    BackendTarget::new("hub", "10.0.0.3:25565")
}

struct Sim {
    proxy: Arc<SimProxy>,
    coordinator: Arc<Coordinator>,
    events: UnboundedReceiver<ReconnectEvent>,
}

impl Sim {
    fn new(policy: ReconnectPolicy, connector: MockConnector) -> Result<Self, ConfigError> {
        let proxy = Arc::new(SimProxy::new());
        proxy.set_fallback(Some(hub()));

        let coordinator = RelinkBuilder::new()
            .with_policy(policy)
            .with_runtime(proxy.clone())
            .with_notifier(proxy.clone())
            .with_connector(Arc::new(connector.with_latency(Duration::from_millis(120))))
            .build()?;
        let events = coordinator
            .take_event_receiver()
            .ok_or_else(|| RelinkError::Configuration("event receiver taken".into()))?;

        Ok(Self {
            proxy,
            coordinator,
            events,
        })
    }

    fn join(&self) -> (SessionId, ReconnectInterceptor) {
        let session = SessionId::random();
        self.proxy.join(session, lobby());
        (session, self.coordinator.on_link_established(session, lobby()))
    }

    /// Print events until the session's task ends or nothing happens for a while
    async fn watch(&mut self) {
        loop {
            match tokio::time::timeout(Duration::from_secs(3), self.events.recv()).await {
                Ok(Some(event)) => {
                    print_event(&event);
                    if event.is_terminal() {
                        break;
                    }
                }
                _ => {
                    println!("  {}", "(no further events)".dimmed());
                    break;
                }
            }
        }
    }
}

fn print_event(event: &ReconnectEvent) {
    let now = chrono::Local::now().format("%H:%M:%S%.3f");
    let line = match event {
        ReconnectEvent::Started { target, .. } => format!("task started for {}", target).cyan(),
        ReconnectEvent::Attempt { attempt, .. } => format!("attempt #{}", attempt).yellow(),
        ReconnectEvent::RetryScheduled { delay, .. } => {
            format!("failed, retrying in {:?}", delay).dimmed()
        }
        ReconnectEvent::Succeeded { attempts, .. } => {
            format!("reconnected after {} attempts", attempts).green().bold()
        }
        ReconnectEvent::Exhausted { resolution, .. } => match resolution {
            Resolution::Fallback(to) => format!("gave up, moved to {}", to).red().bold(),
            Resolution::Disconnected => "gave up, disconnected".red().bold(),
        },
        ReconnectEvent::Cancelled { .. } => "cancelled".magenta(),
        ReconnectEvent::Vetoed { target, ignored, .. } => {
            let by = if *ignored { "ignore-list" } else { "listener" };
            format!("reconnect to {} vetoed by {}", target, by).magenta()
        }
        ReconnectEvent::DuplicateConnect { .. } => "connect already pending".yellow(),
        ReconnectEvent::ResultDiscarded { attempt, .. } => {
            format!("late result of attempt #{} dropped", attempt).dimmed()
        }
    };
    println!("  {}  {}", now.to_string().dimmed(), line);
}

fn header(title: &str) {
    println!();
    println!("{}", "─".repeat(65).cyan());
    println!("  {}", title.white().bold());
    println!("{}", "─".repeat(65).cyan());
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("{}", "═".repeat(65).cyan());
    println!("{}", "  PROXY OUTAGE SIMULATOR".cyan().bold());
    println!("{}", "  relink Demo - Backend Reconnection".cyan());
    println!("{}", "═".repeat(65).cyan());

    let policy = || {
        ReconnectPolicy::default()
            .with_max_tries(4)
            .with_retry_delay(Duration::from_millis(300))
    };

    // 1. Backend restarts and comes back on the third attempt
    header("1. Backend restart (shutdown kick)");
    let connector = MockConnector::failing();
    connector.push_outcomes([
        MockOutcome::Fail("connection refused".into()),
        MockOutcome::Timeout,
        MockOutcome::Succeed,
    ]);
    let mut sim = Sim::new(policy(), connector)?;
    let (session, handler) = sim.join();
    let outcome = handler.on_kick(&KickPacket::new(r#"{"text":"Server closed","color":"red"}"#));
    println!("  kick handled: {:?}", outcome);
    sim.watch().await;
    for title in sim.proxy.titles(session) {
        println!("  {} {}", "title:".dimmed(), strip_color(&title.sub));
    }

    // 2. Backend stays down
    header("2. Backend gone for good");
    let mut sim = Sim::new(policy(), MockConnector::failing())?;
    let (session, handler) = sim.join();
    handler.on_close();
    sim.watch().await;
    println!(
        "  {} now on {}",
        "player".dimmed(),
        sim.proxy
            .backend_of(session)
            .map(|b| b.to_string())
            .unwrap_or_else(|| "nothing".into())
    );

    // 3. Player gives up while waiting
    header("3. Player leaves mid-retry");
    let mut sim = Sim::new(policy(), MockConnector::failing())?;
    let (session, handler) = sim.join();
    handler.on_fault(&std::io::Error::new(
        std::io::ErrorKind::ConnectionReset,
        "Connection reset by peer",
    ));
    tokio::time::sleep(Duration::from_millis(200)).await;
    sim.proxy.leave(session);
    sim.coordinator.on_session_closed(session);
    sim.watch().await;

    // 4. Ignore-listed backend
    header("4. Ignored backend");
    let mut sim = Sim::new(policy().with_ignored_backend("lobby"), MockConnector::failing())?;
    let (session, handler) = sim.join();
    handler.on_close();
    sim.watch().await;
    for message in sim.proxy.disconnects(session) {
        println!("  {} {}", "disconnected:".dimmed(), message);
    }
    println!(
        "  {} now on {}",
        "player".dimmed(),
        sim.proxy
            .backend_of(session)
            .map(|b| b.to_string())
            .unwrap_or_else(|| "nothing".into())
    );

    println!();
    println!("{}", "═".repeat(65).cyan());
    Ok(())
}
