/// Tests for the polling scheduler against an in-memory source: busy guard,
/// bootstrap ordering, probe retries, live period changes and shutdown.
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::FakeSource;
use crate::console::ConsoleEvent;
use crate::plan::ConnectionStatus;
use crate::scheduler::{BootstrapError, PollingScheduler};
use crate::types::{FlagId, ListId, Resource};

fn flag() -> Resource {
    Resource::Flag(FlagId::from("trading_enabled"))
}

fn list() -> Resource {
    Resource::List(ListId::from("workers"))
}

fn scheduler(
    source: Arc<FakeSource>,
) -> (PollingScheduler<FakeSource>, mpsc::Receiver<ConsoleEvent>, CancellationToken) {
    let (tx, rx) = mpsc::channel(256);
    let cancel = CancellationToken::new();
    (PollingScheduler::new(source, tx, cancel.clone()), rx, cancel)
}

fn drain(rx: &mut mpsc::Receiver<ConsoleEvent>) -> Vec<ConsoleEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

// ── busy guard ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn slow_fetch_never_overlaps_and_drops_ticks() {
    let source = FakeSource::with_delay(Duration::from_millis(350));
    let (mut sched, _rx, _) = scheduler(source.clone());
    sched.register(list(), Duration::from_millis(100));

    sched.start();
    tokio::time::sleep(Duration::from_millis(1000)).await;
    sched.shutdown().await;

    assert_eq!(source.max_active.load(Ordering::SeqCst), 1);
    // ten ticks elapsed, but each fetch spans several of them
    let fetches = source.fetches();
    assert!((2..=4).contains(&fetches), "fetches = {fetches}");
}

#[tokio::test(start_paused = true)]
async fn busy_flag_is_set_while_fetch_outstanding() {
    let source = FakeSource::with_delay(Duration::from_millis(500));
    let (mut sched, _rx, _) = scheduler(source);
    sched.register(list(), Duration::from_millis(100));

    sched.start();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!sched.is_busy(&list()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(sched.is_busy(&list()));
    sched.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn start_is_idempotent() {
    let source = FakeSource::with_delay(Duration::ZERO);
    let (mut sched, _rx, _) = scheduler(source.clone());
    sched.register(list(), Duration::from_millis(100));

    sched.start();
    sched.start();
    tokio::time::sleep(Duration::from_millis(550)).await;
    sched.shutdown().await;

    assert_eq!(source.fetches(), 5);
}

// ── bootstrap ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn bootstrap_fetches_in_registration_order_then_ready() {
    let source = FakeSource::with_delay(Duration::ZERO);
    let (mut sched, mut rx, _) = scheduler(source);
    sched.register(flag(), Duration::from_secs(60));
    sched.register(list(), Duration::from_secs(60));

    sched.bootstrap(3, Duration::from_millis(10)).await.unwrap();
    let events = drain(&mut rx);
    sched.shutdown().await;

    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], ConsoleEvent::Polled { resource, .. } if *resource == flag()));
    assert!(matches!(&events[1], ConsoleEvent::Polled { resource, .. } if *resource == list()));
    assert!(matches!(events[2], ConsoleEvent::Ready));
}

#[tokio::test(start_paused = true)]
async fn exhausted_probe_reports_unavailable_then_recovers() {
    let source = FakeSource::failing_probes(4);
    let (mut sched, mut rx, _) = scheduler(source);
    sched.register(flag(), Duration::from_secs(60));

    sched.bootstrap(2, Duration::from_millis(100)).await.unwrap();
    let events = drain(&mut rx);
    sched.shutdown().await;

    assert!(matches!(
        events[0],
        ConsoleEvent::Connection(ConnectionStatus::Unavailable(_))
    ));
    assert!(matches!(events[1], ConsoleEvent::Connection(ConnectionStatus::Connecting)));
    assert!(matches!(events[2], ConsoleEvent::Polled { .. }));
    assert!(matches!(events[3], ConsoleEvent::Ready));
    assert_eq!(events.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn probe_failures_below_attempts_stay_quiet() {
    let source = FakeSource::failing_probes(2);
    let (mut sched, mut rx, _) = scheduler(source);
    sched.register(flag(), Duration::from_secs(60));

    sched.bootstrap(5, Duration::from_millis(100)).await.unwrap();
    let events = drain(&mut rx);
    sched.shutdown().await;

    assert!(!events.iter().any(|e| matches!(e, ConsoleEvent::Connection(_))));
}

#[tokio::test(start_paused = true)]
async fn bootstrap_stops_when_cancelled() {
    let source = FakeSource::failing_probes(u32::MAX);
    let (mut sched, _rx, cancel) = scheduler(source);
    sched.register(flag(), Duration::from_secs(60));

    cancel.cancel();
    let err = sched.bootstrap(3, Duration::from_millis(100)).await.unwrap_err();
    assert!(matches!(err, BootstrapError::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn bootstrap_fails_when_console_gone() {
    let source = FakeSource::with_delay(Duration::ZERO);
    let (mut sched, rx, _) = scheduler(source);
    sched.register(flag(), Duration::from_secs(60));
    drop(rx);

    let err = sched.bootstrap(3, Duration::from_millis(100)).await.unwrap_err();
    assert!(matches!(err, BootstrapError::ConsoleGone));
}

// ── period ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn set_period_validates_input() {
    let (mut sched, _rx, _) = scheduler(FakeSource::with_delay(Duration::ZERO));
    sched.register(list(), Duration::from_secs(3));

    assert!(!sched.set_period(&list(), Duration::ZERO));
    assert!(!sched.set_period(&flag(), Duration::from_secs(1)));
    assert!(sched.set_period(&list(), Duration::from_secs(1)));
    assert_eq!(sched.period(&list()), Some(Duration::from_secs(1)));
    assert_eq!(sched.periods().get("list:workers"), Some(&1000));
}

#[tokio::test(start_paused = true)]
async fn period_change_takes_effect_on_running_loop() {
    let source = FakeSource::with_delay(Duration::ZERO);
    let (mut sched, _rx, _) = scheduler(source.clone());
    sched.register(list(), Duration::from_secs(10));

    sched.start();
    tokio::time::sleep(Duration::from_millis(10)).await;
    sched.set_period(&list(), Duration::from_millis(100));
    tokio::time::sleep(Duration::from_millis(545)).await;
    sched.shutdown().await;

    assert_eq!(source.fetches(), 5);
}

// ── shutdown ──────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn shutdown_stops_all_loops() {
    let source = FakeSource::with_delay(Duration::ZERO);
    let (mut sched, _rx, _) = scheduler(source.clone());
    sched.register(flag(), Duration::from_millis(100));
    sched.register(list(), Duration::from_millis(100));

    sched.start();
    tokio::time::sleep(Duration::from_millis(350)).await;
    sched.shutdown().await;
    let after_shutdown = source.fetches();
    assert_eq!(after_shutdown, 6);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(source.fetches(), after_shutdown);
}
