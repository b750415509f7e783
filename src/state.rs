use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::config::Config;
use crate::console::{ConsoleEvent, ConsoleHandle, UserCommand};
use crate::scheduler::PollingScheduler;
use crate::source::RemoteStateSource;
use crate::view::ViewModel;

/// Shared by every HTTP handler. Reconciled state itself lives in the console
/// actor; handlers only send it commands and read its published view.
pub struct AppState {
    pub config: Config,
    pub console: ConsoleHandle,
    pub scheduler: Arc<PollingScheduler<RemoteStateSource>>,
    /// Effective override grace in ms; follows flag poll period changes.
    grace_ms: AtomicU64,
}

impl AppState {
    pub fn new(
        config: Config,
        events: mpsc::Sender<ConsoleEvent>,
        view: watch::Receiver<ViewModel>,
        scheduler: Arc<PollingScheduler<RemoteStateSource>>,
    ) -> Arc<Self> {
        let grace_ms = AtomicU64::new(config.grace().as_millis() as u64);
        Arc::new(Self { config, console: ConsoleHandle { events, view }, scheduler, grace_ms })
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms.load(Ordering::Relaxed))
    }

    /// Re-derive GRACE for a new flag poll period and hand it to the console.
    /// Returns false once the console has stopped.
    pub async fn flag_period_changed(&self, period: Duration) -> bool {
        let grace = self.config.grace_at(period);
        self.grace_ms.store(grace.as_millis() as u64, Ordering::Relaxed);
        self.send(ConsoleEvent::GraceChanged(grace)).await
    }

    pub fn view(&self) -> ViewModel {
        self.console.view.borrow().clone()
    }

    pub async fn command(&self, cmd: UserCommand) -> bool {
        self.console.events.send(ConsoleEvent::Command(cmd)).await.is_ok()
    }

    pub async fn send(&self, event: ConsoleEvent) -> bool {
        self.console.events.send(event).await.is_ok()
    }
}
