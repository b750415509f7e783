use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::plan::{RenderOp, RenderPlan};
use crate::types::{Entity, ListId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterState {
    /// What is in the input box right now.
    pub raw_term: String,
    /// What the predicate actually filters by.
    pub settled_term: String,
}

/// Trailing-edge debounced text filter for one list.
#[derive(Debug)]
pub struct DebouncedFilterPipeline {
    list: ListId,
    state: FilterState,
    delay: Duration,
    deadline: Option<Instant>,
}

impl DebouncedFilterPipeline {
    pub fn new(list: ListId, delay: Duration) -> Self {
        Self { list, state: FilterState::default(), delay, deadline: None }
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn settled_term(&self) -> &str {
        &self.state.settled_term
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// A keystroke: affordances update now, the predicate after the quiet period.
    pub fn on_input(&mut self, raw: &str, now: Instant) -> RenderPlan {
        self.state.raw_term = raw.to_string();
        self.deadline = Some(now + self.delay);
        vec![RenderOp::SetClearAffordance {
            list: self.list.clone(),
            visible: !raw.is_empty(),
        }]
        .into()
    }

    /// Settle the term if the quiet period elapsed without another keystroke.
    pub fn fire<'a>(
        &mut self,
        now: Instant,
        entities: impl Iterator<Item = &'a Entity>,
    ) -> Option<RenderPlan> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.state.settled_term = self.state.raw_term.clone();
                tracing::debug!(list = %self.list, term = %self.state.settled_term, "filter settled");
                Some(self.reapply(entities))
            }
            _ => None,
        }
    }

    /// Clearing is a discrete action and bypasses the debounce.
    pub fn clear<'a>(&mut self, entities: impl Iterator<Item = &'a Entity>) -> RenderPlan {
        self.state = FilterState::default();
        self.deadline = None;
        let mut plan = RenderPlan::from(vec![RenderOp::SetClearAffordance {
            list: self.list.clone(),
            visible: false,
        }]);
        plan.extend(self.reapply(entities));
        plan
    }

    /// Re-run the predicate with the settled term, e.g. after a list rebuild.
    pub fn reapply<'a>(&self, entities: impl Iterator<Item = &'a Entity>) -> RenderPlan {
        let term = self.state.settled_term.clone();
        let visible = entities
            .filter(|e| matches(e, &term))
            .map(|e| e.symbol.clone())
            .collect();
        vec![RenderOp::ApplyFilter { list: self.list.clone(), term, visible }].into()
    }
}

/// Case-insensitive substring match on key and status label.
pub fn matches(entity: &Entity, term: &str) -> bool {
    let term = term.trim();
    if term.is_empty() {
        return true;
    }
    let needle = term.to_lowercase();
    entity.symbol.to_lowercase().contains(&needle) || entity.status.label().contains(&needle)
}
