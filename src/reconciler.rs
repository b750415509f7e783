use std::collections::BTreeMap;

use crate::plan::{FieldPatch, RenderOp, RenderPlan, RowSubState, RowView};
use crate::types::{Entity, EntityKey, ListId};

pub type SubStateMap = BTreeMap<EntityKey, RowSubState>;

/// Keeps one rendered list in step with polled collections.
///
/// Rows are rendered in key order, so only membership decides between a full
/// rebuild and in-place patches.
#[derive(Debug)]
pub struct ListReconciler {
    list: ListId,
    rendered: BTreeMap<EntityKey, Entity>,
    sub_states: SubStateMap,
    loaded: bool,
}

impl ListReconciler {
    pub fn new(list: ListId) -> Self {
        Self { list, rendered: BTreeMap::new(), sub_states: BTreeMap::new(), loaded: false }
    }

    pub fn list(&self) -> &ListId {
        &self.list
    }

    pub fn is_empty(&self) -> bool {
        self.rendered.is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.rendered.values()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.rendered.contains_key(key)
    }

    pub fn sub_state(&self, key: &str) -> Option<RowSubState> {
        self.sub_states.get(key).copied()
    }

    /// Reconcile a freshly polled collection against what is on screen.
    pub fn apply(&mut self, next: Vec<Entity>) -> RenderPlan {
        let mut next_map = BTreeMap::new();
        for entity in next {
            if let Some(dup) = next_map.insert(entity.symbol.clone(), entity) {
                tracing::warn!(list = %self.list, key = %dup.symbol, "duplicate key in poll, keeping the later entry");
            }
        }

        let plan = reconcile(&self.list, &self.rendered, &next_map, &mut self.sub_states, self.loaded);
        self.rendered = next_map;
        self.loaded = true;
        plan
    }

    /// User expanded or collapsed one row's detail panel.
    pub fn toggle_detail(&mut self, key: &str) -> Option<RenderPlan> {
        if !self.rendered.contains_key(key) {
            return None;
        }
        let state = self.sub_states.entry(key.to_string()).or_default();
        state.expanded = !state.expanded;
        Some(RenderPlan::from(vec![RenderOp::SetDetailExpanded {
            list: self.list.clone(),
            key: key.to_string(),
            expanded: state.expanded,
        }]))
    }
}

/// Decide between full rebuild and targeted patches.
///
/// Sub-state entries survive for keys present in `next`, are dropped for keys
/// that disappeared and default to expanded for new keys.
pub fn reconcile(
    list: &ListId,
    prev: &BTreeMap<EntityKey, Entity>,
    next: &BTreeMap<EntityKey, Entity>,
    sub_states: &mut SubStateMap,
    loaded: bool,
) -> RenderPlan {
    let same_keys = loaded && prev.keys().eq(next.keys());

    if !same_keys {
        sub_states.retain(|key, _| next.contains_key(key));
        tracing::debug!(%list, prev = prev.len(), next = next.len(), "key set changed, full rebuild");

        if next.is_empty() {
            return vec![RenderOp::ShowPlaceholder { list: list.clone() }].into();
        }

        let rows = next
            .values()
            .map(|entity| RowView {
                entity: entity.clone(),
                sub_state: *sub_states.entry(entity.symbol.clone()).or_default(),
            })
            .collect();
        return vec![RenderOp::RebuildList { list: list.clone(), rows }].into();
    }

    let mut plan = RenderPlan::new();
    for (key, entity) in next {
        let Some(before) = prev.get(key) else { continue };
        let fields = diff_fields(before, entity);
        if !fields.is_empty() {
            plan.push(RenderOp::PatchEntity { list: list.clone(), key: key.clone(), fields });
        }
    }
    plan
}

/// Field-level differences that can be patched in place.
pub fn diff_fields(before: &Entity, after: &Entity) -> Vec<FieldPatch> {
    let mut fields = Vec::new();
    if before.status != after.status {
        fields.push(FieldPatch::Status(after.status));
    }
    if before.pnl != after.pnl {
        fields.push(FieldPatch::Pnl(after.pnl));
    }
    if before.position_size != after.position_size {
        fields.push(FieldPatch::PositionSize(after.position_size));
    }
    if before.entry_price != after.entry_price {
        fields.push(FieldPatch::EntryPrice(after.entry_price));
    }
    if before.extra != after.extra {
        fields.push(FieldPatch::Extra(after.extra.clone()));
    }
    fields
}
