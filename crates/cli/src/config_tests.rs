// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use tempfile::TempDir;
use yare::parameterized;

#[test]
fn empty_file_uses_defaults() {
    let config = Config::parse("").unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.queue.max_attempts, DEFAULT_MAX_ATTEMPTS);
    assert_eq!(config.queue.flush_interval_ms, 30_000);
    assert_eq!(config.realtime.max_stream_attempts, 5);
    assert_eq!(config.conflicts.modified_fields, default_modified_fields());
}

#[test]
fn full_file_parses() {
    let config = Config::parse(
        r#"
database = "/tmp/sync.db"

[remote]
url = "https://records.example.com"
stream_url = "wss://records.example.com/stream"
token = "abc"
request_timeout_ms = 5000

[queue]
max_attempts = 7
backoff_base_ms = 200
backoff_cap_ms = 2000
flush_interval_ms = 1000
max_concurrent_chains = 2

[realtime]
channels = ["tasks", "chat"]
poll_interval_ms = 500

[conflicts]
excluded_fields = ["message_ids"]
local_preferred_fields = ["notes"]
"#,
    )
    .unwrap();

    assert_eq!(config.database, Some(PathBuf::from("/tmp/sync.db")));
    assert_eq!(config.remote.url.as_deref(), Some("https://records.example.com"));
    assert_eq!(config.queue.max_attempts, 7);
    assert_eq!(config.realtime.channels, vec!["tasks".to_string(), "chat".to_string()]);
    // Unset fields in a present table keep their defaults.
    assert_eq!(config.realtime.reconnect_cap_ms, 30_000);

    let settings = config.coordinator_settings();
    assert_eq!(settings.request_timeout, Duration::from_secs(5));
    assert_eq!(settings.max_concurrent_chains, 2);
    assert!(settings.exclusions.is_excluded("message_ids"));
    assert!(settings.exclusions.is_excluded("write_date"));
    assert!(settings.merge_policy.local_preferred_fields.contains("notes"));

    let engine = config.engine_config();
    assert_eq!(engine.flush_interval, Duration::from_secs(1));
    assert_eq!(engine.realtime.poll_interval, Duration::from_millis(500));
    assert_eq!(
        config.backoff(),
        Backoff::new(Duration::from_millis(200), Duration::from_secs(2))
    );
}

#[parameterized(
    zero_attempts = { "[queue]\nmax_attempts = 0" },
    base_above_cap = { "[queue]\nbackoff_base_ms = 5000\nbackoff_cap_ms = 100" },
    zero_interval = { "[queue]\nflush_interval_ms = 0" },
    bad_url = { "[remote]\nurl = \"ftp://example.com\"" },
    bad_stream_url = { "[remote]\nstream_url = \"https://example.com\"" },
)]
fn invalid_values_are_rejected(content: &str) {
    assert!(matches!(Config::parse(content), Err(Error::Config(_))));
}

#[test]
fn unknown_top_level_key_is_a_parse_error() {
    assert!(matches!(
        Config::parse("databse = \"x\""),
        Err(Error::ConfigParse(_))
    ));
}

#[test]
fn cli_path_wins_over_env_and_default() {
    let source = ConfigSource::resolve_with(
        Some(Path::new("/cli.toml")),
        Some(PathBuf::from("/env.toml")),
        Some(PathBuf::from("/home/me/.config")),
    )
    .unwrap();
    assert_eq!(source.path, PathBuf::from("/cli.toml"));
    assert!(source.explicit);

    let source = ConfigSource::resolve_with(
        None,
        Some(PathBuf::from("/env.toml")),
        Some(PathBuf::from("/home/me/.config")),
    )
    .unwrap();
    assert_eq!(source.path, PathBuf::from("/env.toml"));

    let source =
        ConfigSource::resolve_with(None, None, Some(PathBuf::from("/home/me/.config"))).unwrap();
    assert_eq!(source.path, PathBuf::from("/home/me/.config/skiff/config.toml"));
    assert!(!source.explicit);
}

#[test]
fn missing_default_file_is_fine_but_missing_explicit_file_is_not() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let implicit = ConfigSource {
        path: path.clone(),
        explicit: false,
    };
    assert_eq!(Config::load_from(Some(&implicit)).unwrap(), Config::default());

    let explicit = ConfigSource {
        path: path.clone(),
        explicit: true,
    };
    assert!(matches!(
        Config::load_from(Some(&explicit)),
        Err(Error::Config(_))
    ));

    fs::write(&path, "[queue]\nmax_attempts = 9\n").unwrap();
    assert_eq!(
        Config::load_from(Some(&implicit)).unwrap().queue.max_attempts,
        9
    );
}

#[test]
fn database_path_precedence() {
    let mut config = Config::default();
    assert_eq!(
        config.database_path(Some(Path::new("/cli.db"))).unwrap(),
        PathBuf::from("/cli.db")
    );
    config.database = Some(PathBuf::from("/configured.db"));
    assert_eq!(config.database_path(None).unwrap(), PathBuf::from("/configured.db"));
}

#[test]
fn lock_file_sits_next_to_database() {
    assert_eq!(
        lock_path(Path::new("/data/skiff/sync.db")),
        PathBuf::from("/data/skiff/sync.lock")
    );
}

#[test]
fn config_round_trips_through_toml() {
    let mut config = Config::default();
    config.remote.url = Some("http://localhost:8069".into());
    config.realtime.channels = vec!["tasks".into()];
    let text = toml::to_string_pretty(&config).unwrap();
    assert_eq!(Config::parse(&text).unwrap(), config);
}
