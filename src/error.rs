use thiserror::Error;

use crate::types::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Transport,
    Timeout,
    Status(u16),
    /// A fetch for the same resource is already outstanding.
    InFlight,
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchErrorKind::Transport => write!(f, "transport"),
            FetchErrorKind::Timeout => write!(f, "timeout"),
            FetchErrorKind::Status(code) => write!(f, "HTTP {code}"),
            FetchErrorKind::InFlight => write!(f, "in flight"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("fetch {resource} failed ({kind}): {detail}")]
pub struct FetchError {
    pub resource: Resource,
    pub kind: FetchErrorKind,
    pub detail: String,
}

impl FetchError {
    pub fn from_reqwest(resource: Resource, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            FetchErrorKind::Timeout
        } else if let Some(status) = err.status() {
            FetchErrorKind::Status(status.as_u16())
        } else {
            FetchErrorKind::Transport
        };
        Self { resource, kind, detail: err.to_string() }
    }
}

#[derive(Debug, Clone, Error)]
#[error("decode {resource} failed: {detail}")]
pub struct DecodeError {
    pub resource: Resource,
    pub detail: String,
}

/// Anything that can go wrong on a poll. Both variants leave rendered state untouched.
#[derive(Debug, Clone, Error)]
pub enum PollError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl PollError {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, PollError::Fetch(FetchError { kind: FetchErrorKind::InFlight, .. }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteThroughKind {
    Transport,
    Timeout,
    Status(u16),
    /// The service answered `success: false`.
    Rejected,
}

impl std::fmt::Display for WriteThroughKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteThroughKind::Transport => write!(f, "transport"),
            WriteThroughKind::Timeout => write!(f, "timeout"),
            WriteThroughKind::Status(code) => write!(f, "HTTP {code}"),
            WriteThroughKind::Rejected => write!(f, "rejected"),
        }
    }
}

/// A write-through call (flag write or entity mutation) did not succeed.
#[derive(Debug, Clone, Error)]
#[error("{target} write failed ({kind}): {detail}")]
pub struct WriteThroughError {
    pub target: String,
    pub kind: WriteThroughKind,
    pub detail: String,
}

impl WriteThroughError {
    pub fn from_reqwest(target: impl Into<String>, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            WriteThroughKind::Timeout
        } else if let Some(status) = err.status() {
            WriteThroughKind::Status(status.as_u16())
        } else {
            WriteThroughKind::Transport
        };
        Self { target: target.into(), kind, detail: err.to_string() }
    }

    pub fn rejected(target: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            target: target.into(),
            kind: WriteThroughKind::Rejected,
            detail: detail.unwrap_or_else(|| "no reason given".to_string()),
        }
    }
}
