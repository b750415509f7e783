/// Tests for configuration helpers: grace derivation, list parsing, validation.
use std::time::Duration;

use crate::config::{derive_grace, split_list, Config};
use crate::types::{FlagId, ListId, SurfaceId};

pub(super) fn config() -> Config {
    Config {
        remote_base_url: "http://127.0.0.1:8080".into(),
        flags: vec![FlagId::from("trading_enabled")],
        flag_surfaces: vec![SurfaceId::from("header"), SurfaceId::from("settings")],
        lists: vec![ListId::from("workers")],
        flag_poll_interval_ms: 5000,
        list_poll_interval_ms: 3000,
        override_grace_ms: 15000,
        filter_debounce_ms: 150,
        request_timeout_ms: 5000,
        probe_attempts: 5,
        probe_retry_ms: 2000,
        log_level: "info".into(),
        http_port: 3000,
    }
}

#[test]
fn grace_above_floor_is_kept() {
    let grace = derive_grace(Duration::from_secs(15), Duration::from_secs(5));
    assert_eq!(grace, Duration::from_secs(15));
}

#[test]
fn grace_below_two_polls_is_raised() {
    let grace = derive_grace(Duration::from_secs(3), Duration::from_secs(5));
    assert_eq!(grace, Duration::from_secs(10));
}

#[test]
fn grace_tracks_slower_flag_polling() {
    let c = config();
    assert_eq!(c.grace(), Duration::from_secs(15));
    let slow = Config { flag_poll_interval_ms: 20_000, ..c };
    assert_eq!(slow.grace(), Duration::from_secs(40));
}

#[test]
fn split_list_trims_and_drops_blanks() {
    assert_eq!(split_list(" header , settings,,"), vec!["header", "settings"]);
    assert!(split_list("").is_empty());
}

#[test]
fn defaults_validate() {
    assert!(config().validate().is_ok());
}

#[test]
fn zero_poll_interval_is_rejected() {
    let c = Config { list_poll_interval_ms: 0, ..config() };
    assert!(c.validate().is_err());
}

#[test]
fn no_surfaces_is_rejected() {
    let c = Config { flag_surfaces: vec![], ..config() };
    assert!(c.validate().is_err());
}

#[test]
fn zero_probe_attempts_is_rejected() {
    let c = Config { probe_attempts: 0, ..config() };
    assert!(c.validate().is_err());
}
