use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Scalar on/off flag owned by the remote service (e.g. `trading_enabled`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagId(pub String);

/// Polled keyed collection (e.g. `workers`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListId(pub String);

/// One control surface a flag is rendered on (header toggle, settings panel, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(pub String);

/// Stable entity identity. For workers this is the traded symbol.
pub type EntityKey = String;

/// Monotonic version stamp reported by the source. `None` = unversioned.
pub type Version = Option<i64>;

macro_rules! display_id {
    ($($t:ty),*) => {$(
        impl std::fmt::Display for $t {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $t {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    )*};
}

display_id!(FlagId, ListId, SurfaceId);

/// A polled resource on the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    /// Connectivity probe, fetched only during bootstrap.
    Health,
    Flag(FlagId),
    List(ListId),
}

impl Resource {
    pub fn path(&self) -> String {
        match self {
            Resource::Health => "/api/health".to_string(),
            Resource::Flag(id) => format!("/api/flags/{id}"),
            Resource::List(id) => format!("/api/lists/{id}"),
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Health => write!(f, "health"),
            Resource::Flag(id) => write!(f, "flag:{id}"),
            Resource::List(id) => write!(f, "list:{id}"),
        }
    }
}

/// Worker lifecycle as reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Running,
    Stopped,
    Starting,
    Stopping,
    Error,
    #[serde(other)]
    Unknown,
}

impl WorkerStatus {
    pub fn label(self) -> &'static str {
        match self {
            WorkerStatus::Running => "running",
            WorkerStatus::Stopped => "stopped",
            WorkerStatus::Starting => "starting",
            WorkerStatus::Stopping => "stopping",
            WorkerStatus::Error => "error",
            WorkerStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One active worker. Replaced wholesale on every poll; `symbol` is the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub symbol: EntityKey,
    pub status: WorkerStatus,
    #[serde(default)]
    pub pnl: Decimal,
    #[serde(default)]
    pub position_size: Decimal,
    #[serde(default)]
    pub entry_price: Decimal,
    /// Fields owned by the remote service that the console only passes through.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Fire-and-forget action against a single entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityOperation {
    Start,
    Stop,
}

impl EntityOperation {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityOperation::Start => write!(f, "start"),
            EntityOperation::Stop => write!(f, "stop"),
        }
    }
}

/// `{ data, version? }` as returned by one fetch. Lives for one poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedSnapshot<T> {
    pub data: T,
    pub version: Version,
}

// ── Wire shapes ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FlagPayload {
    pub value: bool,
    #[serde(default)]
    pub version: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ListPayload {
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub version: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct FlagWriteRequest {
    pub value: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagWriteResponse {
    pub success: bool,
    #[serde(default)]
    pub applied_value: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MutateRequest<'a> {
    pub key: &'a str,
    pub operation: EntityOperation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MutateResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}
