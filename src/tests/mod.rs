mod config_tests;
mod optimistic_tests;
mod scheduler_tests;

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::error::{FetchError, FetchErrorKind, PollError, WriteThroughError};
use crate::source::{Payload, StateSource};
use crate::types::{Entity, EntityOperation, FlagId, ListId, Resource, VersionedSnapshot, WorkerStatus};

pub(crate) fn worker(symbol: &str, status: WorkerStatus, pnl: Decimal) -> Entity {
    Entity {
        symbol: symbol.to_string(),
        status,
        pnl,
        position_size: Decimal::ONE,
        entry_price: Decimal::ONE_HUNDRED,
        extra: serde_json::Map::new(),
    }
}

/// In-memory `StateSource` with counters and switchable failures.
#[derive(Default)]
pub(crate) struct FakeSource {
    pub delay: Duration,
    pub probe_failures: AtomicU32,
    pub reject_writes: AtomicBool,
    pub fetches: AtomicUsize,
    pub writes: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl FakeSource {
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay, ..Default::default() })
    }

    pub fn failing_probes(n: u32) -> Arc<Self> {
        Arc::new(Self { probe_failures: AtomicU32::new(n), ..Default::default() })
    }

    pub fn rejecting_writes() -> Arc<Self> {
        Arc::new(Self { reject_writes: AtomicBool::new(true), ..Default::default() })
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl StateSource for FakeSource {
    async fn probe(&self) -> Result<(), FetchError> {
        let remaining = self.probe_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.probe_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(FetchError {
                resource: Resource::Health,
                kind: FetchErrorKind::Transport,
                detail: "connection refused".into(),
            });
        }
        Ok(())
    }

    async fn fetch(&self, resource: &Resource) -> Result<VersionedSnapshot<Payload>, PollError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let data = match resource {
            Resource::List(_) => Payload::List(vec![]),
            _ => Payload::Flag(true),
        };
        Ok(VersionedSnapshot { data, version: Some(1) })
    }

    async fn write_flag(&self, flag: &FlagId, value: bool) -> Result<Option<bool>, WriteThroughError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(WriteThroughError::rejected(format!("flag {flag}"), Some("read-only".into())));
        }
        Ok(Some(value))
    }

    async fn mutate_entity(
        &self,
        _list: &ListId,
        _key: &str,
        _operation: EntityOperation,
    ) -> Result<(), WriteThroughError> {
        Ok(())
    }
}
