use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::WriteThroughError;
use crate::plan::{NoticeLevel, RenderOp, RenderPlan};
use crate::types::{FlagId, SurfaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagState {
    Synced,
    /// The user's intent wins over polled values until `expires_at`.
    PendingLocal { value: bool, expires_at: Instant },
}

#[derive(Debug, Clone)]
pub struct TrackedFlag {
    /// `None` until the first poll delivered a baseline.
    pub rendered: Option<bool>,
    pub state: FlagState,
    /// Most recent polled value, kept even while it is being overridden.
    pub last_polled: Option<bool>,
}

impl TrackedFlag {
    fn new() -> Self {
        Self { rendered: None, state: FlagState::Synced, last_polled: None }
    }
}

/// Arbitrates between polled flag values and pending local edits.
#[derive(Debug)]
pub struct OptimisticMutationTracker {
    flags: BTreeMap<FlagId, TrackedFlag>,
    surfaces: Vec<SurfaceId>,
    grace: Duration,
}

impl OptimisticMutationTracker {
    pub fn new(
        flags: impl IntoIterator<Item = FlagId>,
        surfaces: Vec<SurfaceId>,
        grace: Duration,
    ) -> Self {
        Self {
            flags: flags.into_iter().map(|f| (f, TrackedFlag::new())).collect(),
            surfaces,
            grace,
        }
    }

    /// Applies to override windows opened from now on.
    pub fn set_grace(&mut self, grace: Duration) {
        self.grace = grace;
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    pub fn flag(&self, flag: &FlagId) -> Option<&TrackedFlag> {
        self.flags.get(flag)
    }

    pub fn rendered(&self, flag: &FlagId) -> Option<bool> {
        self.flags.get(flag).and_then(|f| f.rendered)
    }

    pub fn is_pending(&self, flag: &FlagId) -> bool {
        matches!(
            self.flags.get(flag).map(|f| f.state),
            Some(FlagState::PendingLocal { .. })
        )
    }

    pub fn has_baseline(&self, flag: &FlagId) -> bool {
        self.rendered(flag).is_some()
    }

    /// User toggled `flag`. Returns `None` when the flag is unknown or its
    /// baseline has not been loaded yet.
    pub fn user_set(&mut self, flag: &FlagId, value: bool, now: Instant) -> Option<RenderPlan> {
        let tracked = self.flags.get_mut(flag)?;
        tracked.rendered?;

        tracked.rendered = Some(value);
        tracked.state = FlagState::PendingLocal { value, expires_at: now + self.grace };
        tracing::info!(%flag, value, grace_ms = self.grace.as_millis() as u64, "flag override opened");

        Some(self.mirror(flag, value))
    }

    /// Feed a polled value. Returns the render mutations it causes, if any.
    pub fn on_poll(&mut self, flag: &FlagId, polled: bool, now: Instant) -> RenderPlan {
        let Some(tracked) = self.flags.get_mut(flag) else {
            tracing::warn!(%flag, "poll for untracked flag");
            return RenderPlan::new();
        };
        tracked.last_polled = Some(polled);

        if let FlagState::PendingLocal { value, expires_at } = tracked.state {
            if now >= expires_at {
                tracing::info!(%flag, pending = value, polled, "override window lapsed, trusting source");
                tracked.state = FlagState::Synced;
            } else if polled == value {
                tracing::info!(%flag, value, "override confirmed by source");
                tracked.state = FlagState::Synced;
                return RenderPlan::new();
            } else {
                tracing::debug!(%flag, pending = value, polled, "polled value held back by override");
                return RenderPlan::new();
            }
        }

        if tracked.rendered == Some(polled) {
            return RenderPlan::new();
        }
        tracked.rendered = Some(polled);
        self.mirror(flag, polled)
    }

    /// Close every override window that has lapsed. The rendered value is left
    /// alone; the next applied poll is authoritative again.
    pub fn expire(&mut self, now: Instant) -> Vec<FlagId> {
        let mut expired = Vec::new();
        for (id, tracked) in self.flags.iter_mut() {
            if let FlagState::PendingLocal { value, expires_at } = tracked.state {
                if now >= expires_at {
                    tracing::info!(flag = %id, pending = value, "override window expired");
                    tracked.state = FlagState::Synced;
                    expired.push(id.clone());
                }
            }
        }
        expired
    }

    /// Write-through outcome. Failures are surfaced but never roll back the
    /// optimistic value; the window still expires on schedule.
    pub fn on_write_result(
        &mut self,
        flag: &FlagId,
        result: Result<Option<bool>, WriteThroughError>,
    ) -> RenderPlan {
        let mut plan = RenderPlan::new();
        match result {
            Ok(applied) => {
                tracing::debug!(%flag, ?applied, "flag write accepted");
            }
            Err(e) => {
                tracing::warn!(%flag, error = %e, "flag write failed, keeping optimistic value");
                plan.notify(NoticeLevel::Error, format!("{flag}: {e}"));
            }
        }
        plan
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.flags
            .values()
            .filter_map(|f| match f.state {
                FlagState::PendingLocal { expires_at, .. } => Some(expires_at),
                FlagState::Synced => None,
            })
            .min()
    }

    /// One `SetFlag` per bound surface so no two controls disagree.
    fn mirror(&self, flag: &FlagId, value: bool) -> RenderPlan {
        self.surfaces
            .iter()
            .map(|surface| RenderOp::SetFlag { flag: flag.clone(), surface: surface.clone(), value })
            .collect::<Vec<_>>()
            .into()
    }
}
