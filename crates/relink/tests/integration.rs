//! Integration tests for relink
//!
//! Drives the coordinator through complete outages: retries, exhaustion,
//! shutdown kicks, cancellation and vetoes.

mod common;

use common::*;
use relink::prelude::*;
use relink_core::testkit::SimCall;
use relink_core::{MockConnector, MockOutcome};
use std::sync::Arc;
use std::time::Duration;

fn fast_policy(max_tries: u32) -> ReconnectPolicy {
    ReconnectPolicy::default()
        .with_max_tries(max_tries)
        .with_retry_delay(Duration::ZERO)
}

// =============================================================================
// Exhaustion
// =============================================================================

#[tokio::test]
async fn test_exhaustion_with_fallback_on_same_backend_disconnects() {
    let mut h = Harness::new(fast_policy(3), MockConnector::failing());
    h.proxy.set_fallback(Some(lobby()));
    let (session, handler) = h.join();

    handler.on_fault(&reset());
    let events = h.until_terminal().await;

    assert_eq!(attempts(&events), 3);
    assert_eq!(h.connector.attempt_count(), 3);
    assert_eq!(
        events.last(),
        Some(&ReconnectEvent::Exhausted {
            session,
            target: lobby(),
            attempts: 3,
            resolution: Resolution::Disconnected,
        })
    );
    assert_eq!(h.proxy.disconnects(session), vec![ProxyMessage::LostConnection]);
    assert!(!h.proxy.calls().iter().any(|c| matches!(c, SimCall::Switched { .. })));
    assert!(!h.coordinator.is_active(session));
}

#[tokio::test]
async fn test_exhaustion_moves_to_fallback() {
    let mut h = Harness::new(fast_policy(3), MockConnector::failing());
    let (session, handler) = h.join();

    handler.on_fault(&reset());
    let events = h.until_terminal().await;

    assert_eq!(attempts(&events), 3);
    assert!(matches!(
        events.last(),
        Some(ReconnectEvent::Exhausted { resolution: Resolution::Fallback(to), .. }) if *to == hub()
    ));
    assert_eq!(h.proxy.backend_of(session), Some(hub()));
    assert!(h.proxy.disconnects(session).is_empty());
    assert!(h.proxy.has_call(&SimCall::Message {
        session,
        message: ProxyMessage::ServerWentDown
    }));

    let titles = h.proxy.titles(session);
    assert_eq!(titles.last().map(|t| t.sub.as_str()), Some("§cReconnecting failed!"));
    assert_eq!(titles.last().map(|t| t.stay_ticks), Some(80));
    assert_eq!(
        h.proxy.action_bars(session).last().map(String::as_str),
        Some("§eYou have been moved to the fallback server!")
    );
    assert!(handler.link().is_obsolete());
}

#[tokio::test]
async fn test_failed_action_bar_is_cleared_later() {
    let mut h = Harness::new(fast_policy(1), MockConnector::failing());
    let (session, handler) = h.join();

    handler.on_close();
    h.until_terminal().await;
    let clears = |h: &Harness| {
        h.proxy
            .calls()
            .iter()
            .filter(|c| matches!(c, SimCall::ClearActionBar { .. }))
            .count()
    };
    assert_eq!(clears(&h), 0);

    tokio::time::sleep(Duration::from_millis(5200)).await;
    assert_eq!(clears(&h), 1);
    assert!(h.proxy.has_call(&SimCall::ClearActionBar { session }));
}

#[tokio::test]
async fn test_retry_spacing_respects_delay() {
    let delay = Duration::from_millis(80);
    let policy = ReconnectPolicy::default()
        .with_max_tries(3)
        .with_retry_delay(delay);
    let mut h = Harness::new(policy, MockConnector::failing());
    let (session, handler) = h.join();

    handler.on_fault(&reset());
    h.until_terminal().await;

    let made = h.connector.attempts();
    assert_eq!(made.len(), 3);
    for pair in made.windows(2) {
        assert!(pair[1].at.duration_since(pair[0].at) >= delay);
    }
    assert!(made.iter().all(|a| a.session == session && a.target == lobby()));
    assert!(made.iter().all(|a| a.timeout == Duration::from_millis(5000)));
    // Every failed attempt keeps the client alive
    assert_eq!(h.proxy.keep_alives(session), 3);
}

// =============================================================================
// Success
// =============================================================================

#[tokio::test]
async fn test_success_on_third_attempt_stops_retrying() {
    let connector = MockConnector::failing();
    connector.push_outcomes([
        MockOutcome::Fail("refused".into()),
        MockOutcome::Timeout,
        MockOutcome::Succeed,
    ]);
    let mut h = Harness::new(fast_policy(5), connector);
    let (session, handler) = h.join();

    handler.on_fault(&reset());
    let events = h.until_terminal().await;

    assert_eq!(
        events.last(),
        Some(&ReconnectEvent::Succeeded {
            session,
            target: lobby(),
            attempts: 3
        })
    );
    assert!(!h.coordinator.is_active(session));

    // Nothing else happens afterwards
    let later = h.drain(Duration::from_millis(100)).await;
    assert!(later.is_empty());
    assert_eq!(h.connector.attempt_count(), 3);

    assert!(h.proxy.has_call(&SimCall::Adopted {
        session,
        target: lobby()
    }));
    assert_eq!(
        h.proxy.titles(session).last().map(|t| t.sub.as_str()),
        Some("§aConnecting..")
    );
    assert!(h.proxy.pending_of(session).is_empty());
}

#[tokio::test]
async fn test_reconnecting_feedback_animates_dots() {
    let connector = MockConnector::failing();
    connector.push_outcomes([MockOutcome::Timeout, MockOutcome::Timeout]);
    connector.push_outcome(MockOutcome::Succeed);
    let mut h = Harness::new(fast_policy(5), connector);
    let (session, handler) = h.join();

    handler.on_fault(&reset());
    h.until_terminal().await;

    let subs: Vec<String> = h.proxy.titles(session).into_iter().map(|t| t.sub).collect();
    assert_eq!(
        subs,
        vec![
            "§7Reconnecting.".to_string(),
            "§7Reconnecting..".to_string(),
            "§7Reconnecting...".to_string(),
            "§aConnecting..".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_new_link_after_success_gets_fresh_handler() {
    let mut h = Harness::new(fast_policy(3), MockConnector::succeeding());
    let (session, handler) = h.join();

    handler.on_fault(&reset());
    h.until_terminal().await;

    // The host reports the re-established link and installs a new handler
    let handler = h.coordinator.on_link_established(session, lobby());
    assert!(!handler.link().is_obsolete());
    handler.on_fault(&reset());
    let events = h.until_terminal().await;
    assert!(matches!(events.last(), Some(ReconnectEvent::Succeeded { attempts: 1, .. })));
}

// =============================================================================
// Shutdown kicks
// =============================================================================

#[tokio::test]
async fn test_shutdown_kick_starts_reconnect_immediately() {
    let mut h = Harness::new(
        ReconnectPolicy::default().with_retry_delay(Duration::from_secs(60)),
        MockConnector::failing(),
    );
    let (session, handler) = h.join();

    let outcome = handler.on_kick(&KickPacket::new(SHUTDOWN_KICK));
    assert_eq!(outcome, KickOutcome::Reconnecting);

    let events = h
        .until(|e| matches!(e, ReconnectEvent::Attempt { .. }))
        .await;
    assert_eq!(
        events,
        vec![
            ReconnectEvent::Started {
                session,
                target: lobby()
            },
            ReconnectEvent::Attempt {
                session,
                target: lobby(),
                attempt: 1
            },
        ]
    );
    assert!(h.coordinator.is_active(session));
    assert!(h.proxy.disconnects(session).is_empty());
    assert!(!h.proxy.calls().iter().any(|c| matches!(c, SimCall::KickEvent { .. })));
}

#[tokio::test]
async fn test_kick_one_character_off_is_delivered() {
    let h = Harness::new(fast_policy(3), MockConnector::failing());
    let (session, handler) = h.join();

    let outcome = handler.on_kick(&KickPacket::new(NEAR_SHUTDOWN_KICK));

    assert_eq!(outcome, KickOutcome::Disconnected);
    assert!(!h.coordinator.is_active(session));
    assert_eq!(
        h.proxy.disconnects(session),
        vec![ProxyMessage::Kick(NEAR_SHUTDOWN_KICK.into())]
    );
    assert_eq!(h.connector.attempt_count(), 0);
}

#[tokio::test]
async fn test_vetoed_shutdown_kick_is_delivered() {
    let h = Harness::new(fast_policy(3), MockConnector::failing());
    h.proxy.set_allow_reconnect(false);
    let (session, handler) = h.join();

    let outcome = handler.on_kick(&KickPacket::new(SHUTDOWN_KICK));

    assert_eq!(outcome, KickOutcome::Disconnected);
    assert_eq!(h.proxy.reconnect_checks(), 1);
    assert_eq!(h.proxy.disconnects(session).len(), 1);
}

#[tokio::test]
async fn test_settings_pattern_classifies_kicks() {
    let settings = ReconnectSettings::from_json(
        r#"{"shutdown": {"text": "(Server closed|Restarting.*)", "regex": true}}"#,
    )
    .unwrap();
    let h = Harness::new(settings.into_policy(), MockConnector::failing());

    let (_, handler) = h.join();
    assert_eq!(
        handler.on_kick(&KickPacket::new(r#"{"text":"Restarting in 10s"}"#)),
        KickOutcome::Reconnecting
    );

    let (_, handler) = h.join();
    assert_eq!(
        handler.on_kick(&KickPacket::new(BAN_KICK)),
        KickOutcome::Disconnected
    );
}

#[tokio::test]
async fn test_bad_pattern_disables_classification() {
    let settings = ReconnectSettings::from_json(
        r#"{"shutdown": {"text": "Server (closed", "regex": true}}"#,
    )
    .unwrap();
    let h = Harness::new(settings.into_policy(), MockConnector::failing());
    let (_, handler) = h.join();

    assert_eq!(
        handler.on_kick(&KickPacket::new(r#""Server (closed""#)),
        KickOutcome::Disconnected
    );
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_leaving_mid_retry_cancels_without_attempt() {
    let policy = ReconnectPolicy::default().with_retry_delay(Duration::from_millis(150));
    let mut h = Harness::new(policy, MockConnector::failing());
    let (session, handler) = h.join();

    handler.on_fault(&reset());
    h.until(|e| matches!(e, ReconnectEvent::RetryScheduled { .. }))
        .await;
    h.proxy.leave(session);

    let events = h.until_terminal().await;
    assert_eq!(events.last(), Some(&ReconnectEvent::Cancelled { session }));
    assert_eq!(attempts(&events), 0);
    assert_eq!(h.connector.attempt_count(), 1);
    assert!(!h.coordinator.is_active(session));
}

#[tokio::test]
async fn test_moved_backend_mid_retry_cancels() {
    let policy = ReconnectPolicy::default().with_retry_delay(Duration::from_millis(150));
    let mut h = Harness::new(policy, MockConnector::failing());
    let (session, handler) = h.join();

    handler.on_fault(&reset());
    h.until(|e| matches!(e, ReconnectEvent::RetryScheduled { .. }))
        .await;
    h.proxy.set_backend(session, hub());

    let events = h.until_terminal().await;
    assert_eq!(events.last(), Some(&ReconnectEvent::Cancelled { session }));
    assert_eq!(h.connector.attempt_count(), 1);
    // Session is still online, so leftover feedback is cleared
    assert!(h.proxy.has_call(&SimCall::ClearTitle { session }));
}

#[tokio::test]
async fn test_session_closed_cancels_pending_timer() {
    let policy = ReconnectPolicy::default().with_retry_delay(Duration::from_millis(100));
    let mut h = Harness::new(policy, MockConnector::failing());
    let (session, handler) = h.join();

    handler.on_fault(&reset());
    h.until(|e| matches!(e, ReconnectEvent::RetryScheduled { .. }))
        .await;
    h.proxy.leave(session);
    h.coordinator.on_session_closed(session);

    let events = h.drain(Duration::from_millis(300)).await;
    assert_eq!(events, vec![ReconnectEvent::Cancelled { session }]);
    assert_eq!(h.connector.attempt_count(), 1);
}

#[tokio::test]
async fn test_late_success_after_cancel_is_discarded() {
    let connector = MockConnector::succeeding().with_latency(Duration::from_millis(150));
    let mut h = Harness::new(fast_policy(3), connector);
    let (session, handler) = h.join();

    handler.on_fault(&reset());
    h.until(|e| matches!(e, ReconnectEvent::Attempt { .. })).await;
    h.coordinator.cancel(session);

    let events = h
        .until(|e| matches!(e, ReconnectEvent::ResultDiscarded { .. }))
        .await;
    assert_eq!(
        events,
        vec![
            ReconnectEvent::Cancelled { session },
            ReconnectEvent::ResultDiscarded {
                session,
                attempt: 1
            },
        ]
    );
    assert!(!h.proxy.calls().iter().any(|c| matches!(c, SimCall::Adopted { .. })));
    assert!(h.proxy.pending_of(session).is_empty());
}

#[tokio::test]
async fn test_cancel_without_task_is_noop() {
    let mut h = Harness::new(fast_policy(3), MockConnector::failing());
    let (session, _handler) = h.join();

    h.coordinator.cancel(session);
    h.coordinator.cancel(SessionId::random());

    assert!(h.drain(Duration::from_millis(50)).await.is_empty());
    assert!(h.proxy.calls().is_empty());
}

// =============================================================================
// Single task per session
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_triggers_make_one_attempt() {
    let policy = ReconnectPolicy::default().with_retry_delay(Duration::from_secs(60));
    let mut h = Harness::new(policy, MockConnector::failing());
    let (session, _) = h.join();

    let triggers: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = Arc::clone(&h.coordinator);
            let link = Arc::new(BackendLink::new(session, lobby()));
            tokio::spawn(async move { coordinator.trigger_if_live(&link) })
        })
        .collect();
    for trigger in triggers {
        trigger.await.unwrap();
    }

    let events = h.drain(Duration::from_millis(200)).await;
    let started = events
        .iter()
        .filter(|e| matches!(e, ReconnectEvent::Started { .. }))
        .count();
    assert_eq!(started, 1);
    assert_eq!(attempts(&events), 1);
    assert_eq!(h.connector.attempt_count(), 1);
    assert_eq!(h.coordinator.active_count(), 1);
}

#[tokio::test]
async fn test_pending_connect_blocks_duplicate_attempt() {
    let policy = fast_policy(3).with_retry_delay(Duration::from_millis(20));
    let mut h = Harness::new(policy, MockConnector::failing());
    let (session, handler) = h.join();
    h.proxy.hold_pending(session, lobby());

    handler.on_fault(&reset());
    let events = h
        .until(|e| matches!(e, ReconnectEvent::DuplicateConnect { .. }))
        .await;

    assert_eq!(attempts(&events), 0);
    assert_eq!(h.connector.attempt_count(), 0);
    assert_eq!(
        h.coordinator.task(session).map(|t| t.attempts()),
        Some(0)
    );
}

#[tokio::test]
async fn test_retry_resumes_after_pending_connect_clears() {
    let policy = fast_policy(3).with_retry_delay(Duration::from_millis(20));
    let mut h = Harness::new(policy, MockConnector::failing());
    let (session, handler) = h.join();
    h.proxy.hold_pending(session, lobby());

    handler.on_fault(&reset());
    h.until(|e| matches!(e, ReconnectEvent::DuplicateConnect { .. }))
        .await;
    assert_eq!(
        h.coordinator.task(session).map(|t| t.state()),
        Some(TaskState::WaitingRetry)
    );

    // The proxy's own connect gave up without touching the session
    h.proxy.remove_pending_connect(session, &lobby());
    let events = h
        .until(|e| matches!(e, ReconnectEvent::Attempt { .. }))
        .await;

    assert_eq!(attempts(&events), 1);
    assert_eq!(
        h.coordinator.task(session).map(|t| t.attempts()),
        Some(1)
    );
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let connector = MockConnector::failing();
    let mut h = Harness::new(fast_policy(2), connector);
    let (first, first_handler) = h.join();
    let (second, second_handler) = h.join();

    first_handler.on_fault(&reset());
    second_handler.on_close();

    let mut finished = Vec::new();
    while finished.len() < 2 {
        let events = h.until_terminal().await;
        match events.last() {
            Some(event) if event.is_terminal() => finished.push(event.session()),
            _ => break,
        }
    }

    finished.sort();
    let mut expected = vec![first, second];
    expected.sort();
    assert_eq!(finished, expected);
    assert_eq!(h.connector.attempt_count(), 4);
}

// =============================================================================
// Veto
// =============================================================================

#[tokio::test]
async fn test_ignored_backend_resolves_every_fault() {
    let policy = fast_policy(3).with_ignored_backend("lobby");
    let h = Harness::new(policy, MockConnector::failing());
    h.proxy.set_fallback(None);

    let (faulted, handler) = h.join();
    handler.on_fault(&reset());
    assert_eq!(
        h.proxy.disconnects(faulted),
        vec![ProxyMessage::Exception("Connection reset by peer".into())]
    );

    let (closed, handler) = h.join();
    handler.on_close();
    assert_eq!(h.proxy.disconnects(closed), vec![ProxyMessage::LostConnection]);

    let (kicked, handler) = h.join();
    assert_eq!(handler.on_kick(&KickPacket::new(SHUTDOWN_KICK)), KickOutcome::Disconnected);
    assert_eq!(h.proxy.disconnects(kicked).len(), 1);

    assert_eq!(h.proxy.reconnect_checks(), 0);
    assert_eq!(h.coordinator.active_count(), 0);
    assert_eq!(h.connector.attempt_count(), 0);
}

#[tokio::test]
async fn test_listener_veto_moves_to_fallback() {
    let mut h = Harness::new(fast_policy(3), MockConnector::failing());
    h.proxy.set_allow_reconnect(false);
    let (session, handler) = h.join();

    handler.on_fault(&reset());

    assert_eq!(h.proxy.backend_of(session), Some(hub()));
    let events = h.drain(Duration::from_millis(50)).await;
    assert_eq!(
        events,
        vec![ReconnectEvent::Vetoed {
            session,
            target: lobby(),
            ignored: false
        }]
    );
}
