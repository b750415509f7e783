/// Tests for the optimistic flag state machine: override windows, confirmation,
/// expiry, write failures and mirroring across surfaces.
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{WriteThroughError, WriteThroughKind};
use crate::optimistic::{FlagState, OptimisticMutationTracker};
use crate::plan::{RenderOp, RenderPlan};
use crate::types::{FlagId, SurfaceId};

const GRACE: Duration = Duration::from_secs(15);

fn trading() -> FlagId {
    FlagId::from("trading_enabled")
}

fn tracker() -> OptimisticMutationTracker {
    OptimisticMutationTracker::new(
        [trading()],
        vec![SurfaceId::from("header"), SurfaceId::from("settings")],
        GRACE,
    )
}

fn loaded(value: bool, now: Instant) -> OptimisticMutationTracker {
    let mut t = tracker();
    t.on_poll(&trading(), value, now);
    t
}

fn set_flag_values(plan: &RenderPlan) -> Vec<(String, bool)> {
    plan.ops
        .iter()
        .filter_map(|op| match op {
            RenderOp::SetFlag { surface, value, .. } => Some((surface.to_string(), *value)),
            _ => None,
        })
        .collect()
}

// ── baseline ──────────────────────────────────────────────────────────────────

#[test]
fn first_poll_sets_baseline_on_every_surface() {
    let now = Instant::now();
    let mut t = tracker();
    let plan = t.on_poll(&trading(), false, now);
    assert_eq!(
        set_flag_values(&plan),
        vec![("header".to_string(), false), ("settings".to_string(), false)]
    );
    assert_eq!(t.rendered(&trading()), Some(false));
}

#[test]
fn toggle_before_baseline_is_refused() {
    let mut t = tracker();
    assert!(t.user_set(&trading(), true, Instant::now()).is_none());
    assert!(!t.is_pending(&trading()));
}

#[test]
fn toggle_on_unknown_flag_is_refused() {
    let mut t = loaded(false, Instant::now());
    assert!(t.user_set(&FlagId::from("nope"), true, Instant::now()).is_none());
}

#[test]
fn unchanged_poll_while_synced_renders_nothing() {
    let now = Instant::now();
    let mut t = loaded(false, now);
    assert!(t.on_poll(&trading(), false, now + Duration::from_secs(1)).is_empty());
}

// ── override window ───────────────────────────────────────────────────────────

#[test]
fn user_toggle_renders_immediately_and_mirrors() {
    let now = Instant::now();
    let mut t = loaded(false, now);
    let plan = t.user_set(&trading(), true, now).unwrap();
    assert_eq!(
        set_flag_values(&plan),
        vec![("header".to_string(), true), ("settings".to_string(), true)]
    );
    assert_eq!(t.rendered(&trading()), Some(true));
    assert_eq!(
        t.flag(&trading()).unwrap().state,
        FlagState::PendingLocal { value: true, expires_at: now + GRACE }
    );
}

#[test]
fn contradicting_polls_inside_window_are_held_back() {
    let t0 = Instant::now();
    let mut t = loaded(false, t0);
    t.user_set(&trading(), true, t0);

    for secs in [0u64, 2, 5, 10, 14] {
        let plan = t.on_poll(&trading(), false, t0 + Duration::from_secs(secs));
        assert!(plan.is_empty(), "poll at {secs}s must not render");
        assert_eq!(t.rendered(&trading()), Some(true));
    }
    assert_eq!(t.flag(&trading()).unwrap().last_polled, Some(false));
}

#[test]
fn confirming_poll_ends_window_early() {
    let t0 = Instant::now();
    let mut t = loaded(false, t0);
    t.user_set(&trading(), true, t0);

    assert!(t.on_poll(&trading(), true, t0 + Duration::from_secs(3)).is_empty());
    assert!(!t.is_pending(&trading()));

    // source is authoritative again straight away
    let plan = t.on_poll(&trading(), false, t0 + Duration::from_secs(4));
    assert_eq!(set_flag_values(&plan).len(), 2);
    assert_eq!(t.rendered(&trading()), Some(false));
}

#[test]
fn poll_after_expiry_is_authoritative() {
    let t0 = Instant::now();
    let mut t = loaded(false, t0);
    t.user_set(&trading(), true, t0);

    let plan = t.on_poll(&trading(), false, t0 + Duration::from_secs(20));
    assert_eq!(set_flag_values(&plan).len(), 2);
    assert_eq!(t.rendered(&trading()), Some(false));
    assert!(!t.is_pending(&trading()));
}

#[test]
fn poll_exactly_at_expiry_is_authoritative() {
    let t0 = Instant::now();
    let mut t = loaded(false, t0);
    t.user_set(&trading(), true, t0);
    t.on_poll(&trading(), false, t0 + GRACE);
    assert_eq!(t.rendered(&trading()), Some(false));
}

#[test]
fn expire_keeps_rendered_value_until_next_poll() {
    let t0 = Instant::now();
    let mut t = loaded(false, t0);
    t.user_set(&trading(), true, t0);

    assert!(t.expire(t0 + Duration::from_secs(10)).is_empty());
    let expired = t.expire(t0 + Duration::from_secs(16));
    assert_eq!(expired, vec![trading()]);
    assert_eq!(t.rendered(&trading()), Some(true));
    assert!(!t.is_pending(&trading()));
}

#[test]
fn retoggle_restarts_window() {
    let t0 = Instant::now();
    let mut t = loaded(false, t0);
    t.user_set(&trading(), true, t0);
    t.user_set(&trading(), false, t0 + Duration::from_secs(10));
    assert_eq!(t.next_deadline(), Some(t0 + Duration::from_secs(25)));
    assert_eq!(t.rendered(&trading()), Some(false));
}

#[test]
fn grace_change_applies_to_new_windows_only() {
    let t0 = Instant::now();
    let mut t = loaded(false, t0);
    t.user_set(&trading(), true, t0);
    t.set_grace(Duration::from_secs(30));
    assert_eq!(t.next_deadline(), Some(t0 + GRACE));

    t.user_set(&trading(), false, t0);
    assert_eq!(t.next_deadline(), Some(t0 + Duration::from_secs(30)));
}

#[test]
fn no_deadline_when_synced() {
    let t = loaded(true, Instant::now());
    assert_eq!(t.next_deadline(), None);
}

// ── write-through ─────────────────────────────────────────────────────────────

#[test]
fn write_failure_notifies_but_keeps_optimistic_value() {
    let t0 = Instant::now();
    let mut t = loaded(false, t0);
    t.user_set(&trading(), true, t0);

    let err = WriteThroughError {
        target: "flag trading_enabled".into(),
        kind: WriteThroughKind::Timeout,
        detail: "timed out".into(),
    };
    let plan = t.on_write_result(&trading(), Err(err));

    assert!(matches!(plan.ops.as_slice(), [RenderOp::Notify { .. }]));
    assert_eq!(t.rendered(&trading()), Some(true));
    assert!(t.is_pending(&trading()));
    assert_eq!(t.next_deadline(), Some(t0 + GRACE));
}

#[test]
fn write_success_changes_nothing() {
    let t0 = Instant::now();
    let mut t = loaded(false, t0);
    t.user_set(&trading(), true, t0);
    assert!(t.on_write_result(&trading(), Ok(Some(true))).is_empty());
    assert!(t.is_pending(&trading()));
}
