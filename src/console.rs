use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::detector::ChangeDetector;
use crate::error::{PollError, WriteThroughError};
use crate::filter::DebouncedFilterPipeline;
use crate::optimistic::OptimisticMutationTracker;
use crate::plan::{ConnectionStatus, NoticeLevel, RenderOp, RenderPlan};
use crate::reconciler::ListReconciler;
use crate::source::{Payload, StateSource};
use crate::types::{
    EntityKey, EntityOperation, FlagId, ListId, Resource, SurfaceId, VersionedSnapshot,
};
use crate::view::{ViewApplier, ViewModel};

/// Something the user did in the browser.
#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    SetFlag { flag: FlagId, value: bool },
    FilterInput { list: ListId, term: String },
    ClearFilter { list: ListId },
    ToggleDetail { list: ListId, key: EntityKey },
    MutateEntity { list: ListId, key: EntityKey, operation: EntityOperation },
}

/// Everything the console actor reacts to.
#[derive(Debug)]
pub enum ConsoleEvent {
    Polled { resource: Resource, result: Result<VersionedSnapshot<Payload>, PollError> },
    FlagWritten { flag: FlagId, result: Result<Option<bool>, WriteThroughError> },
    EntityMutated {
        list: ListId,
        key: EntityKey,
        operation: EntityOperation,
        result: Result<(), WriteThroughError>,
    },
    Command(UserCommand),
    Connection(ConnectionStatus),
    GraceChanged(Duration),
    /// Bootstrap finished; periodic loops are running.
    Ready,
}

/// I/O the core asks the runner to perform on its behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    WriteFlag { flag: FlagId, value: bool },
    MutateEntity { list: ListId, key: EntityKey, operation: EntityOperation },
}

/// The reconciliation core. Synchronous and free of I/O: every input is an
/// event plus the current instant, every output a render plan plus effects.
#[derive(Debug)]
pub struct Console {
    detector: ChangeDetector,
    flags: OptimisticMutationTracker,
    lists: BTreeMap<ListId, ListReconciler>,
    filters: BTreeMap<ListId, DebouncedFilterPipeline>,
    connection: ConnectionStatus,
    ready: bool,
}

impl Console {
    pub fn new(config: &Config) -> Self {
        Self::with_parts(
            config.flags.clone(),
            config.flag_surfaces.clone(),
            config.lists.clone(),
            config.grace(),
            config.filter_debounce(),
        )
    }

    pub fn with_parts(
        flags: Vec<FlagId>,
        surfaces: Vec<SurfaceId>,
        lists: Vec<ListId>,
        grace: Duration,
        debounce: Duration,
    ) -> Self {
        Self {
            detector: ChangeDetector::new(),
            flags: OptimisticMutationTracker::new(flags, surfaces, grace),
            lists: lists.iter().map(|l| (l.clone(), ListReconciler::new(l.clone()))).collect(),
            filters: lists
                .iter()
                .map(|l| (l.clone(), DebouncedFilterPipeline::new(l.clone(), debounce)))
                .collect(),
            connection: ConnectionStatus::Connecting,
            ready: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn flags(&self) -> &OptimisticMutationTracker {
        &self.flags
    }

    pub fn list(&self, list: &ListId) -> Option<&ListReconciler> {
        self.lists.get(list)
    }

    pub fn filter(&self, list: &ListId) -> Option<&DebouncedFilterPipeline> {
        self.filters.get(list)
    }

    pub fn handle(&mut self, event: ConsoleEvent, now: Instant) -> (RenderPlan, Vec<Effect>) {
        match event {
            ConsoleEvent::Polled { resource, result } => (self.on_poll(&resource, result, now), vec![]),
            ConsoleEvent::FlagWritten { flag, result } => {
                (self.flags.on_write_result(&flag, result), vec![])
            }
            ConsoleEvent::EntityMutated { list, key, operation, result } => {
                (on_entity_mutated(&list, &key, operation, result), vec![])
            }
            ConsoleEvent::Command(cmd) => self.on_command(cmd, now),
            ConsoleEvent::Connection(status) => (self.set_connection(status), vec![]),
            ConsoleEvent::GraceChanged(grace) => {
                tracing::info!(grace_ms = grace.as_millis() as u64, "override grace updated");
                self.flags.set_grace(grace);
                (RenderPlan::new(), vec![])
            }
            ConsoleEvent::Ready => {
                self.ready = true;
                let mut plan = RenderPlan::new();
                plan.notify(NoticeLevel::Info, "bootstrap complete, polling started");
                (plan, vec![])
            }
        }
    }

    pub fn on_poll(
        &mut self,
        resource: &Resource,
        result: Result<VersionedSnapshot<Payload>, PollError>,
        now: Instant,
    ) -> RenderPlan {
        let snapshot = match result {
            Ok(s) => s,
            Err(e) if e.is_in_flight() => {
                tracing::debug!(%resource, "fetch already in flight");
                return RenderPlan::new();
            }
            Err(e) => {
                tracing::warn!(%resource, error = %e, "poll failed, keeping last known state");
                return self.set_connection(ConnectionStatus::Degraded(e.to_string()));
            }
        };

        self.expire_overrides(now);
        let mut plan = self.set_connection(ConnectionStatus::Live);

        match (resource, snapshot.data) {
            (Resource::Flag(flag), Payload::Flag(value)) => {
                let local_is_empty = !self.flags.has_baseline(flag);
                if self.detector.gate(resource, snapshot.version, local_is_empty) {
                    plan.extend(self.flags.on_poll(flag, value, now));
                }
            }
            (Resource::List(list), Payload::List(entities)) => {
                let Some(reconciler) = self.lists.get_mut(list) else {
                    tracing::warn!(%list, "poll for untracked list");
                    return plan;
                };
                if self.detector.gate(resource, snapshot.version, reconciler.is_empty()) {
                    let list_plan = reconciler.apply(entities);
                    // Patches can move a row across the filter (status label).
                    let touched = !list_plan.is_empty();
                    plan.extend(list_plan);
                    if touched {
                        if let Some(filter) = self.filters.get(list) {
                            plan.extend(filter.reapply(reconciler.entities()));
                        }
                    }
                }
            }
            (Resource::Health, _) => {}
            (resource, _) => {
                tracing::warn!(%resource, "payload shape does not match resource");
            }
        }
        plan
    }

    pub fn on_command(&mut self, cmd: UserCommand, now: Instant) -> (RenderPlan, Vec<Effect>) {
        let mut plan = RenderPlan::new();
        let mut effects = Vec::new();

        match cmd {
            UserCommand::SetFlag { flag, value } => match self.flags.user_set(&flag, value, now) {
                Some(p) => {
                    plan.extend(p);
                    effects.push(Effect::WriteFlag { flag, value });
                }
                None => {
                    tracing::warn!(%flag, value, "toggle refused, flag not loaded yet");
                    plan.notify(NoticeLevel::Warn, format!("{flag} is not loaded yet, try again shortly"));
                }
            },
            UserCommand::FilterInput { list, term } => match self.filters.get_mut(&list) {
                Some(filter) => plan.extend(filter.on_input(&term, now)),
                None => plan.notify(NoticeLevel::Warn, format!("unknown list {list}")),
            },
            UserCommand::ClearFilter { list } => {
                match (self.filters.get_mut(&list), self.lists.get(&list)) {
                    (Some(filter), Some(reconciler)) => plan.extend(filter.clear(reconciler.entities())),
                    _ => plan.notify(NoticeLevel::Warn, format!("unknown list {list}")),
                }
            }
            UserCommand::ToggleDetail { list, key } => {
                match self.lists.get_mut(&list).and_then(|r| r.toggle_detail(&key)) {
                    Some(p) => plan.extend(p),
                    None => tracing::debug!(%list, %key, "toggle for a row that is not rendered"),
                }
            }
            UserCommand::MutateEntity { list, key, operation } => {
                if self.lists.get(&list).is_some_and(|r| r.contains(&key)) {
                    tracing::info!(%list, %key, %operation, "entity operation requested");
                    effects.push(Effect::MutateEntity { list, key, operation });
                } else {
                    plan.notify(NoticeLevel::Warn, format!("{key} is not in {list}"));
                }
            }
        }
        (plan, effects)
    }

    /// Close lapsed override windows and settle quiet filters.
    pub fn on_timers(&mut self, now: Instant) -> RenderPlan {
        self.expire_overrides(now);
        let mut plan = RenderPlan::new();
        for (list, filter) in self.filters.iter_mut() {
            let Some(reconciler) = self.lists.get(list) else { continue };
            if let Some(p) = filter.fire(now, reconciler.entities()) {
                plan.extend(p);
            }
        }
        plan
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        let filters = self.filters.values().filter_map(|f| f.next_deadline());
        self.flags.next_deadline().into_iter().chain(filters).min()
    }

    /// A lapsed flag must accept the next poll even if its version did not move.
    fn expire_overrides(&mut self, now: Instant) {
        for flag in self.flags.expire(now) {
            self.detector.invalidate(&Resource::Flag(flag));
        }
    }

    fn set_connection(&mut self, status: ConnectionStatus) -> RenderPlan {
        if self.connection == status {
            return RenderPlan::new();
        }
        // A degraded poll must not mask a persistent bootstrap failure.
        if matches!(self.connection, ConnectionStatus::Unavailable(_))
            && matches!(status, ConnectionStatus::Degraded(_))
        {
            return RenderPlan::new();
        }
        self.connection = status.clone();
        vec![RenderOp::SetConnection { status }].into()
    }
}

fn on_entity_mutated(
    list: &ListId,
    key: &str,
    operation: EntityOperation,
    result: Result<(), WriteThroughError>,
) -> RenderPlan {
    let mut plan = RenderPlan::new();
    match result {
        Ok(()) => {
            tracing::info!(%list, key, %operation, "entity operation accepted");
            plan.notify(NoticeLevel::Info, format!("{operation} {key} accepted"));
        }
        Err(e) => {
            tracing::warn!(%list, key, %operation, error = %e, "entity operation failed");
            plan.notify(NoticeLevel::Error, e.to_string());
        }
    }
    plan
}

// ── Runner ──────────────────────────────────────────────────────────────────

/// Handles other tasks use to talk to the console actor.
#[derive(Clone)]
pub struct ConsoleHandle {
    pub events: mpsc::Sender<ConsoleEvent>,
    pub view: watch::Receiver<ViewModel>,
}

pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Drives `console` on one task until `cancel` fires. All reconciled state
/// lives here, so nothing else needs a lock on it.
pub async fn run<S: StateSource>(
    mut console: Console,
    source: Arc<S>,
    mut events: mpsc::Receiver<ConsoleEvent>,
    events_tx: mpsc::Sender<ConsoleEvent>,
    view_tx: watch::Sender<ViewModel>,
    cancel: CancellationToken,
) {
    tracing::info!("console actor started");

    loop {
        let deadline = console.next_deadline();

        let (plan, effects) = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep_until(deadline) => (console.on_timers(Instant::now()), vec![]),
            event = events.recv() => match event {
                Some(event) => console.handle(event, Instant::now()),
                None => break,
            },
        };

        for effect in effects {
            spawn_effect(effect, source.clone(), events_tx.clone());
        }

        if !plan.is_empty() {
            let ready = console.is_ready();
            view_tx.send_modify(|view| {
                view.apply(&plan);
                view.ready = ready;
            });
        }
    }

    tracing::info!("console actor stopped");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

/// Write-through calls run off the actor; their outcome comes back as an event.
fn spawn_effect<S: StateSource>(effect: Effect, source: Arc<S>, events: mpsc::Sender<ConsoleEvent>) {
    tokio::spawn(async move {
        let event = match effect {
            Effect::WriteFlag { flag, value } => {
                let result = source.write_flag(&flag, value).await;
                ConsoleEvent::FlagWritten { flag, result }
            }
            Effect::MutateEntity { list, key, operation } => {
                let result = source.mutate_entity(&list, &key, operation).await;
                ConsoleEvent::EntityMutated { list, key, operation, result }
            }
        };
        if events.send(event).await.is_err() {
            tracing::debug!("console gone, dropping write-through result");
        }
    });
}
