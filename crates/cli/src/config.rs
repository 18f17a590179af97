// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration.
//!
//! Configuration is read from a TOML file located, in order of precedence,
//! at `--config`, `$SKIFF_CONFIG`, or `<config dir>/skiff/config.toml`.
//! Every field has a default, so an empty or missing file is valid.
//!
//! ```toml
//! database = "/var/lib/skiff/sync.db"
//!
//! [remote]
//! url = "https://records.example.com"
//! stream_url = "wss://records.example.com/stream"
//!
//! [queue]
//! max_attempts = 5
//!
//! [realtime]
//! channels = ["tasks"]
//!
//! [conflicts]
//! excluded_fields = ["message_follower_ids"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sk_core::merge::DEFAULT_MODIFIED_FIELDS;
use sk_core::{Backoff, FieldExclusions, MergePolicy, DEFAULT_MAX_ATTEMPTS};

use crate::env;
use crate::error::{Error, Result};
use crate::realtime::RealtimeSettings;
use crate::sync::{CoordinatorSettings, EngineConfig};

const APP_DIR_NAME: &str = "skiff";
const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "sync.db";
const LOCK_FILE_NAME: &str = "sync.lock";
const LOG_FILE_NAME: &str = "skiff.log";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Path of the SQLite store. Defaults to `<data dir>/skiff/sync.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub conflicts: ConflictConfig,
}

/// Remote record server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the HTTP API. Without it the engine works offline only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// WebSocket URL of the event stream. Without it channels are polled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
    /// Bearer token. `$SKIFF_TOKEN` takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            url: None,
            stream_url: None,
            token: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Operation queue and flush loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    #[serde(default = "default_max_concurrent_chains")]
    pub max_concurrent_chains: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            flush_interval_ms: default_flush_interval_ms(),
            max_concurrent_chains: default_max_concurrent_chains(),
        }
    }
}

/// Realtime channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Channels subscribed while `skiff run` is active.
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    #[serde(default = "default_reconnect_cap_ms")]
    pub reconnect_cap_ms: u64,
    /// Consecutive stream failures before channels fall back to polling.
    #[serde(default = "default_max_stream_attempts")]
    pub max_stream_attempts: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        RealtimeConfig {
            channels: Vec::new(),
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_cap_ms: default_reconnect_cap_ms(),
            max_stream_attempts: default_max_stream_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Conflict detection and merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictConfig {
    /// Ignored when comparing snapshots, in addition to the built-in set.
    #[serde(default)]
    pub excluded_fields: Vec<String>,
    /// Fields that keep the local value in a `merge` resolution.
    #[serde(default)]
    pub local_preferred_fields: Vec<String>,
    /// Timestamp fields that decide which snapshot is newer.
    #[serde(default = "default_modified_fields")]
    pub modified_fields: Vec<String>,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        ConflictConfig {
            excluded_fields: Vec::new(),
            local_preferred_fields: Vec::new(),
            modified_fields: default_modified_fields(),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_cap_ms() -> u64 {
    60_000
}

fn default_flush_interval_ms() -> u64 {
    30_000
}

fn default_max_concurrent_chains() -> usize {
    4
}

fn default_reconnect_base_ms() -> u64 {
    1_000
}

fn default_reconnect_cap_ms() -> u64 {
    30_000
}

fn default_max_stream_attempts() -> u32 {
    5
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

fn default_modified_fields() -> Vec<String> {
    DEFAULT_MODIFIED_FIELDS.iter().map(|f| f.to_string()).collect()
}

/// Where the config file is looked up, and whether it must exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// Named explicitly by `--config` or `$SKIFF_CONFIG`.
    pub explicit: bool,
}

impl ConfigSource {
    /// Resolve the config path from the command line, then the environment,
    /// then the platform config directory.
    pub fn resolve(cli: Option<&Path>) -> Option<Self> {
        Self::resolve_with(cli, env::config_path(), dirs::config_dir())
    }

    fn resolve_with(
        cli: Option<&Path>,
        from_env: Option<PathBuf>,
        config_dir: Option<PathBuf>,
    ) -> Option<Self> {
        if let Some(path) = cli {
            return Some(ConfigSource {
                path: path.to_path_buf(),
                explicit: true,
            });
        }
        if let Some(path) = from_env {
            return Some(ConfigSource {
                path,
                explicit: true,
            });
        }
        config_dir.map(|dir| ConfigSource {
            path: dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME),
            explicit: false,
        })
    }
}

impl Config {
    /// Parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `source`. A missing file at the default location yields the
    /// default config; a missing explicit file is an error.
    pub fn load_from(source: Option<&ConfigSource>) -> Result<Self> {
        match source {
            Some(source) if source.explicit || source.path.exists() => Self::load(&source.path),
            _ => Ok(Config::default()),
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.queue.max_attempts == 0 {
            return Err(Error::Config("queue.max_attempts must be at least 1".into()));
        }
        if self.queue.backoff_base_ms == 0 || self.realtime.reconnect_base_ms == 0 {
            return Err(Error::Config("backoff base delays must be positive".into()));
        }
        if self.queue.backoff_base_ms > self.queue.backoff_cap_ms {
            return Err(Error::Config(
                "queue.backoff_base_ms must not exceed queue.backoff_cap_ms".into(),
            ));
        }
        if self.queue.flush_interval_ms == 0 || self.realtime.poll_interval_ms == 0 {
            return Err(Error::Config("intervals must be positive".into()));
        }
        if let Some(url) = &self.remote.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "invalid remote.url '{url}'\n  hint: use an http:// or https:// URL"
                )));
            }
        }
        if let Some(url) = &self.remote.stream_url {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(Error::Config(format!(
                    "invalid remote.stream_url '{url}'\n  hint: use a ws:// or wss:// URL"
                )));
            }
        }
        Ok(())
    }

    /// The database path: the `--db` override, the configured path, or the
    /// platform data directory.
    pub fn database_path(&self, cli: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = cli {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = &self.database {
            return Ok(path.clone());
        }
        dirs::data_local_dir()
            .map(|dir| dir.join(APP_DIR_NAME).join(DB_FILE_NAME))
            .ok_or_else(|| {
                Error::Config(
                    "cannot determine a data directory\n  hint: set 'database' in the config file or pass --db"
                        .into(),
                )
            })
    }

    /// The auth token, preferring `$SKIFF_TOKEN`.
    pub fn token(&self) -> Option<String> {
        env::token().or_else(|| self.remote.token.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.remote.request_timeout_ms)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.queue.backoff_base_ms),
            Duration::from_millis(self.queue.backoff_cap_ms),
        )
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        let merge_policy = MergePolicy {
            modified_fields: self.conflicts.modified_fields.clone(),
            ..MergePolicy::default()
        }
        .with_local_preferred(self.conflicts.local_preferred_fields.iter().cloned());

        CoordinatorSettings {
            request_timeout: self.request_timeout(),
            max_concurrent_chains: self.queue.max_concurrent_chains.max(1),
            max_attempts: self.queue.max_attempts,
            exclusions: FieldExclusions::with_fields(self.conflicts.excluded_fields.iter().cloned()),
            merge_policy,
        }
    }

    pub fn realtime_settings(&self) -> RealtimeSettings {
        RealtimeSettings {
            reconnect: Backoff::new(
                Duration::from_millis(self.realtime.reconnect_base_ms),
                Duration::from_millis(self.realtime.reconnect_cap_ms),
            ),
            max_stream_attempts: self.realtime.max_stream_attempts.max(1),
            poll_interval: Duration::from_millis(self.realtime.poll_interval_ms),
            request_timeout: self.request_timeout(),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            flush_interval: Duration::from_millis(self.queue.flush_interval_ms),
            channels: self.realtime.channels.clone(),
            realtime: self.realtime_settings(),
        }
    }
}

/// Lock file guarding the store at `db_path`.
pub fn lock_path(db_path: &Path) -> PathBuf {
    db_path.with_file_name(LOCK_FILE_NAME)
}

/// Directory for the engine log file.
pub fn state_dir() -> Option<PathBuf> {
    env::state_dir().or_else(|| {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .map(|dir| dir.join(APP_DIR_NAME))
    })
}

/// Path of the engine log file.
pub fn log_path() -> Option<PathBuf> {
    state_dir().map(|dir| dir.join(LOG_FILE_NAME))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
