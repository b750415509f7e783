use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::console::ConsoleEvent;
use crate::plan::ConnectionStatus;
use crate::source::StateSource;
use crate::types::Resource;

/// One periodic loop. `busy` is set while its fetch is outstanding.
struct PollLoop {
    resource: Resource,
    period: watch::Sender<Duration>,
    busy: Arc<AtomicBool>,
}

/// Owns the periodic polling loops and the ordered startup bootstrap.
pub struct PollingScheduler<S> {
    source: Arc<S>,
    events: mpsc::Sender<ConsoleEvent>,
    loops: Vec<PollLoop>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("bootstrap cancelled")]
    Cancelled,
    #[error("console event channel closed")]
    ConsoleGone,
}

impl<S: StateSource> PollingScheduler<S> {
    pub fn new(source: Arc<S>, events: mpsc::Sender<ConsoleEvent>, cancel: CancellationToken) -> Self {
        Self { source, events, loops: Vec::new(), handles: Mutex::new(Vec::new()), cancel }
    }

    /// Register a loop. Registration order is the bootstrap fetch order.
    pub fn register(&mut self, resource: Resource, period: Duration) {
        let (period, _) = watch::channel(period);
        self.loops.push(PollLoop { resource, period, busy: Arc::new(AtomicBool::new(false)) });
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.loops.iter().map(|l| &l.resource)
    }

    pub fn periods(&self) -> BTreeMap<String, u64> {
        self.loops
            .iter()
            .map(|l| (l.resource.to_string(), l.period.borrow().as_millis() as u64))
            .collect()
    }

    pub fn period(&self, resource: &Resource) -> Option<Duration> {
        self.find(resource).map(|l| *l.period.borrow())
    }

    /// The only way to change a loop's period. Takes effect from the next tick.
    pub fn set_period(&self, resource: &Resource, period: Duration) -> bool {
        if period.is_zero() {
            return false;
        }
        let Some(l) = self.find(resource) else {
            return false;
        };
        l.period.send_replace(period);
        tracing::info!(%resource, period_ms = period.as_millis() as u64, "poll period updated");
        true
    }

    pub fn is_busy(&self, resource: &Resource) -> bool {
        self.find(resource).is_some_and(|l| l.busy.load(Ordering::Acquire))
    }

    /// Probe, then one full fetch per resource in registration order, then
    /// start the periodic loops and tell the console it is ready.
    pub async fn bootstrap(
        &self,
        probe_attempts: u32,
        probe_retry: Duration,
    ) -> Result<(), BootstrapError> {
        self.probe_until_reachable(probe_attempts, probe_retry).await?;

        for l in &self.loops {
            if self.cancel.is_cancelled() {
                return Err(BootstrapError::Cancelled);
            }
            tracing::info!(resource = %l.resource, "initial fetch");
            let result = self.source.fetch(&l.resource).await;
            self.send(ConsoleEvent::Polled { resource: l.resource.clone(), result }).await?;
        }

        self.start();
        self.send(ConsoleEvent::Ready).await?;
        tracing::info!(loops = self.loops.len(), "bootstrap complete");
        Ok(())
    }

    async fn probe_until_reachable(&self, attempts: u32, retry: Duration) -> Result<(), BootstrapError> {
        let mut failures = 0u32;
        loop {
            match self.source.probe().await {
                Ok(()) => {
                    if failures >= attempts {
                        self.send(ConsoleEvent::Connection(ConnectionStatus::Connecting)).await?;
                    }
                    tracing::info!(failures, "remote service reachable");
                    return Ok(());
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(attempt = failures, error = %e, "connectivity probe failed");
                    if failures == attempts {
                        tracing::error!(attempts, "remote service unavailable, still retrying");
                        self.send(ConsoleEvent::Connection(ConnectionStatus::Unavailable(e.to_string())))
                            .await?;
                    }
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(BootstrapError::Cancelled),
                _ = tokio::time::sleep(retry) => {}
            }
        }
    }

    /// Spawn every registered loop. Called by `bootstrap`; calling it twice
    /// would double-poll, so it is idempotent.
    pub fn start(&self) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        if !handles.is_empty() {
            return;
        }
        for l in &self.loops {
            handles.push(tokio::spawn(run_loop(
                l.resource.clone(),
                self.source.clone(),
                self.events.clone(),
                l.busy.clone(),
                l.period.subscribe(),
                self.cancel.clone(),
            )));
        }
    }

    /// Stop every loop and wait for them to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "poll loop panicked");
            }
        }
        tracing::info!("polling stopped");
    }

    fn find(&self, resource: &Resource) -> Option<&PollLoop> {
        self.loops.iter().find(|l| &l.resource == resource)
    }

    async fn send(&self, event: ConsoleEvent) -> Result<(), BootstrapError> {
        self.events.send(event).await.map_err(|_| BootstrapError::ConsoleGone)
    }
}

fn make_interval(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn run_loop<S: StateSource>(
    resource: Resource,
    source: Arc<S>,
    events: mpsc::Sender<ConsoleEvent>,
    busy: Arc<AtomicBool>,
    mut period_rx: watch::Receiver<Duration>,
    cancel: CancellationToken,
) {
    let mut interval = make_interval(*period_rx.borrow_and_update());
    tracing::debug!(%resource, "poll loop started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = period_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                interval = make_interval(*period_rx.borrow_and_update());
            }
            _ = interval.tick() => {
                if busy.swap(true, Ordering::AcqRel) {
                    tracing::debug!(%resource, "previous poll still in flight, tick dropped");
                    continue;
                }
                tokio::spawn(poll_once(
                    resource.clone(),
                    source.clone(),
                    events.clone(),
                    busy.clone(),
                    cancel.clone(),
                ));
            }
        }
    }

    tracing::debug!(%resource, "poll loop stopped");
}

async fn poll_once<S: StateSource>(
    resource: Resource,
    source: Arc<S>,
    events: mpsc::Sender<ConsoleEvent>,
    busy: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        result = source.fetch(&resource) => {
            // Busy stays set until the result is queued, keeping this loop's
            // results in order.
            if events.send(ConsoleEvent::Polled { resource, result }).await.is_err() {
                tracing::debug!("console gone, dropping poll result");
            }
        }
    }
    busy.store(false, Ordering::Release);
}
