use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

use crate::plan::{ConnectionStatus, FieldPatch, NoticeLevel, RenderOp, RenderPlan, RowView};
use crate::types::{EntityKey, FlagId, ListId, SurfaceId};

const MAX_NOTIFICATIONS: usize = 200;

/// Executes render plans against some rendering technology.
pub trait ViewApplier {
    fn apply(&mut self, plan: &RenderPlan);
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub ts: String,
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ListView {
    pub rows: Vec<RowView>,
    pub placeholder: bool,
    pub filter_term: String,
    /// Keys passing the filter; `None` until a filter was first applied.
    pub visible: Option<Vec<EntityKey>>,
    pub clear_visible: bool,
    pub rebuilds: u64,
    pub patches: u64,
}

impl ListView {
    pub fn row(&self, key: &str) -> Option<&RowView> {
        self.rows.iter().find(|r| r.entity.symbol == key)
    }

    fn row_mut(&mut self, key: &str) -> Option<&mut RowView> {
        self.rows.iter_mut().find(|r| r.entity.symbol == key)
    }
}

/// The rendered projection served to the browser.
#[derive(Debug, Clone, Serialize)]
pub struct ViewModel {
    pub connection: ConnectionStatus,
    pub ready: bool,
    pub flags: BTreeMap<FlagId, BTreeMap<SurfaceId, bool>>,
    pub lists: BTreeMap<ListId, ListView>,
    pub notifications: VecDeque<Notification>,
}

impl Default for ViewModel {
    fn default() -> Self {
        Self {
            connection: ConnectionStatus::Connecting,
            ready: false,
            flags: BTreeMap::new(),
            lists: BTreeMap::new(),
            notifications: VecDeque::with_capacity(MAX_NOTIFICATIONS),
        }
    }
}

impl ViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(&self, flag: &FlagId, surface: &SurfaceId) -> Option<bool> {
        self.flags.get(flag).and_then(|s| s.get(surface)).copied()
    }

    pub fn list(&self, list: &ListId) -> Option<&ListView> {
        self.lists.get(list)
    }

    pub fn push_notification(&mut self, level: NoticeLevel, message: &str) {
        if self.notifications.len() >= MAX_NOTIFICATIONS {
            self.notifications.pop_front();
        }
        self.notifications.push_back(Notification {
            ts: chrono::Utc::now().format("%H:%M:%S").to_string(),
            level,
            message: message.to_string(),
        });
    }

    fn apply_op(&mut self, op: &RenderOp) {
        match op {
            RenderOp::SetFlag { flag, surface, value } => {
                self.flags.entry(flag.clone()).or_default().insert(surface.clone(), *value);
            }
            RenderOp::RebuildList { list, rows } => {
                let view = self.lists.entry(list.clone()).or_default();
                view.rows = rows.clone();
                view.placeholder = false;
                view.rebuilds += 1;
            }
            RenderOp::ShowPlaceholder { list } => {
                let view = self.lists.entry(list.clone()).or_default();
                view.rows.clear();
                view.placeholder = true;
                view.rebuilds += 1;
            }
            RenderOp::PatchEntity { list, key, fields } => {
                let view = self.lists.entry(list.clone()).or_default();
                view.patches += 1;
                let Some(row) = view.row_mut(key) else {
                    tracing::warn!(%list, %key, "patch for a row that is not rendered");
                    return;
                };
                for field in fields {
                    match field {
                        FieldPatch::Status(s) => row.entity.status = *s,
                        FieldPatch::Pnl(v) => row.entity.pnl = *v,
                        FieldPatch::PositionSize(v) => row.entity.position_size = *v,
                        FieldPatch::EntryPrice(v) => row.entity.entry_price = *v,
                        FieldPatch::Extra(extra) => row.entity.extra = extra.clone(),
                    }
                }
            }
            RenderOp::ApplyFilter { list, term, visible } => {
                let view = self.lists.entry(list.clone()).or_default();
                view.filter_term = term.clone();
                view.visible = Some(visible.clone());
            }
            RenderOp::SetClearAffordance { list, visible } => {
                self.lists.entry(list.clone()).or_default().clear_visible = *visible;
            }
            RenderOp::SetDetailExpanded { list, key, expanded } => {
                if let Some(row) = self.lists.entry(list.clone()).or_default().row_mut(key) {
                    row.sub_state.expanded = *expanded;
                }
            }
            RenderOp::SetConnection { status } => {
                self.connection = status.clone();
            }
            RenderOp::Notify { level, message } => {
                self.push_notification(*level, message);
            }
        }
    }
}

impl ViewApplier for ViewModel {
    fn apply(&mut self, plan: &RenderPlan) {
        for op in &plan.ops {
            self.apply_op(op);
        }
    }
}
