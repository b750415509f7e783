use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use url::Url;

use crate::types::{FlagId, ListId, SurfaceId};

/// Override windows never end before two flag polls had a chance to confirm them.
const GRACE_POLL_MULTIPLE: u32 = 2;

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub remote_base_url: String,

    pub flags: Vec<FlagId>,
    pub flag_surfaces: Vec<SurfaceId>,
    pub lists: Vec<ListId>,

    pub flag_poll_interval_ms: u64,
    pub list_poll_interval_ms: u64,
    pub override_grace_ms: u64,
    pub filter_debounce_ms: u64,
    pub request_timeout_ms: u64,

    pub probe_attempts: u32,
    pub probe_retry_ms: u64,

    pub log_level: String,
    pub http_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let remote_base_url = env_or("REMOTE_BASE_URL", "http://127.0.0.1:8080");
        Url::parse(&remote_base_url)
            .with_context(|| format!("invalid REMOTE_BASE_URL: {remote_base_url}"))?;

        let config = Self {
            remote_base_url: remote_base_url.trim_end_matches('/').to_string(),

            flags: list_env("FLAGS", "trading_enabled")
                .into_iter()
                .map(FlagId)
                .collect(),
            flag_surfaces: list_env("FLAG_SURFACES", "header,settings")
                .into_iter()
                .map(SurfaceId)
                .collect(),
            lists: list_env("LISTS", "workers").into_iter().map(ListId).collect(),

            flag_poll_interval_ms: u64_env("FLAG_POLL_INTERVAL_MS", "5000")?,
            list_poll_interval_ms: u64_env("LIST_POLL_INTERVAL_MS", "3000")?,
            override_grace_ms: u64_env("OVERRIDE_GRACE_MS", "15000")?,
            filter_debounce_ms: u64_env("FILTER_DEBOUNCE_MS", "150")?,
            request_timeout_ms: u64_env("REQUEST_TIMEOUT_MS", "5000")?,

            probe_attempts: env_or("PROBE_ATTEMPTS", "5")
                .parse()
                .context("invalid PROBE_ATTEMPTS")?,
            probe_retry_ms: u64_env("PROBE_RETRY_MS", "2000")?,

            log_level: env_or("LOG_LEVEL", "info"),
            http_port: env_or("HTTP_PORT", "3000").parse().context("invalid HTTP_PORT")?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.flag_poll_interval_ms == 0 || self.list_poll_interval_ms == 0 {
            bail!("poll intervals must be > 0");
        }
        if self.request_timeout_ms == 0 {
            bail!("REQUEST_TIMEOUT_MS must be > 0");
        }
        if self.flag_surfaces.is_empty() {
            bail!("FLAG_SURFACES must name at least one surface");
        }
        if self.probe_attempts == 0 {
            bail!("PROBE_ATTEMPTS must be > 0");
        }
        Ok(())
    }

    pub fn flag_poll_interval(&self) -> Duration {
        Duration::from_millis(self.flag_poll_interval_ms)
    }

    pub fn list_poll_interval(&self) -> Duration {
        Duration::from_millis(self.list_poll_interval_ms)
    }

    pub fn filter_debounce(&self) -> Duration {
        Duration::from_millis(self.filter_debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn probe_retry(&self) -> Duration {
        Duration::from_millis(self.probe_retry_ms)
    }

    /// Effective override window for the current flag poll period.
    pub fn grace(&self) -> Duration {
        self.grace_at(self.flag_poll_interval())
    }

    pub fn grace_at(&self, flag_poll_period: Duration) -> Duration {
        derive_grace(Duration::from_millis(self.override_grace_ms), flag_poll_period)
    }
}

/// GRACE is the requested window, raised so it always spans
/// `GRACE_POLL_MULTIPLE` flag polls.
pub fn derive_grace(requested: Duration, flag_poll_period: Duration) -> Duration {
    let floor = flag_poll_period * GRACE_POLL_MULTIPLE;
    if requested < floor {
        tracing::warn!(
            requested_ms = requested.as_millis() as u64,
            floor_ms = floor.as_millis() as u64,
            "override grace shorter than two flag polls, raising it"
        );
        floor
    } else {
        requested
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn u64_env(key: &str, default: &str) -> Result<u64> {
    let raw = env_or(key, default);
    raw.trim().parse().with_context(|| format!("invalid integer for {key}: {raw}"))
}

fn list_env(key: &str, default: &str) -> Vec<String> {
    split_list(&env_or(key, default))
}

pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
