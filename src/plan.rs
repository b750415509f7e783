use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::{Entity, EntityKey, FlagId, ListId, SurfaceId, WorkerStatus};

/// Per-row view state that reconciliation never overwrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowSubState {
    pub expanded: bool,
}

impl Default for RowSubState {
    fn default() -> Self {
        Self { expanded: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowView {
    pub entity: Entity,
    pub sub_state: RowSubState,
}

/// A single in-place field update on an already rendered row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldPatch {
    Status(WorkerStatus),
    Pnl(Decimal),
    PositionSize(Decimal),
    EntryPrice(Decimal),
    Extra(serde_json::Map<String, serde_json::Value>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Live,
    /// A poll failed; the last known good state is still shown.
    Degraded(String),
    /// Bootstrap probe exhausted its attempts.
    Unavailable(String),
}

/// One instruction for a view applier.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RenderOp {
    SetFlag { flag: FlagId, surface: SurfaceId, value: bool },
    RebuildList { list: ListId, rows: Vec<RowView> },
    ShowPlaceholder { list: ListId },
    PatchEntity { list: ListId, key: EntityKey, fields: Vec<FieldPatch> },
    ApplyFilter { list: ListId, term: String, visible: Vec<EntityKey> },
    SetClearAffordance { list: ListId, visible: bool },
    SetDetailExpanded { list: ListId, key: EntityKey, expanded: bool },
    SetConnection { status: ConnectionStatus },
    Notify { level: NoticeLevel, message: String },
}

/// Ordered list of render instructions produced by the reconciliation core.
/// An empty plan means "nothing to do".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderPlan {
    pub ops: Vec<RenderOp>,
}

impl RenderPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: RenderOp) {
        self.ops.push(op);
    }

    pub fn extend(&mut self, other: RenderPlan) {
        self.ops.extend(other.ops);
    }

    pub fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.ops.push(RenderOp::Notify { level, message: message.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn has_rebuild(&self) -> bool {
        self.ops
            .iter()
            .any(|op| matches!(op, RenderOp::RebuildList { .. } | RenderOp::ShowPlaceholder { .. }))
    }

    pub fn patches(&self) -> impl Iterator<Item = (&EntityKey, &[FieldPatch])> {
        self.ops.iter().filter_map(|op| match op {
            RenderOp::PatchEntity { key, fields, .. } => Some((key, fields.as_slice())),
            _ => None,
        })
    }
}

impl From<Vec<RenderOp>> for RenderPlan {
    fn from(ops: Vec<RenderOp>) -> Self {
        Self { ops }
    }
}
