//! Watcher configuration
//!
//! Loaded from TOML at startup, falls back to defaults if no config file
//! exists. Section and key names follow the preferences file the audit
//! tooling already uses (`[Watcher]`, `IGNORE_DIRECTORIES`).

use autoremedy_bots::{DuplicatePolicy, DEFAULT_MAX_TRANSITIONS};
use autoremedy_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the watched root when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "PREFERENCES.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemedyConfig {
    #[serde(rename = "Watcher")]
    pub watcher: WatcherSection,
    #[serde(rename = "Dispatcher")]
    pub dispatcher: DispatcherSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherSection {
    /// Comma-separated directory names; events under any of them are ignored.
    #[serde(rename = "IGNORE_DIRECTORIES")]
    pub ignore_directories: String,
    /// Audit script, relative to the watched root unless absolute.
    pub audit_script: PathBuf,
    /// Log the audit script writes, relative to the watched root unless absolute.
    pub audit_log: PathBuf,
    /// Tree poll interval in milliseconds.
    pub poll_ms: u64,
    /// Quiet period in milliseconds that closes an event burst.
    pub debounce_ms: u64,
    /// Audit subprocess timeout in seconds. 0 disables it.
    pub audit_timeout_secs: u64,
    /// Seconds an in-flight audit may keep running after shutdown is requested.
    pub shutdown_grace_secs: u64,
    /// Dispatch bots over the audit log after each successful audit.
    pub dispatch_after_audit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherSection {
    /// Handler invocations allowed per bot run before it is forced to ERROR.
    pub max_transitions: usize,
    /// Collision policy for bots registering the same trigger.
    pub duplicate_policy: DuplicatePolicy,
}

// ============================================================
// Defaults
// ============================================================

impl Default for WatcherSection {
    fn default() -> Self {
        Self {
            ignore_directories: String::new(),
            audit_script: PathBuf::from("run_all_audits.sh"),
            audit_log: PathBuf::from("audit_results.log"),
            poll_ms: 500,
            debounce_ms: 500,
            audit_timeout_secs: 600,
            shutdown_grace_secs: 10,
            dispatch_after_audit: true,
        }
    }
}

impl Default for DispatcherSection {
    fn default() -> Self {
        Self { max_transitions: DEFAULT_MAX_TRANSITIONS, duplicate_policy: DuplicatePolicy::default() }
    }
}

// ============================================================
// Loading
// ============================================================

impl RemedyConfig {
    /// Load config from a TOML file, falling back to defaults. Never fails.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => {
                tracing::info!("Loaded config from {}", path.display());
                config
            }
            Err(Error::ConfigMissing(_)) => {
                tracing::warn!("{} not found. Running with default settings.", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Strict variant for an explicitly requested file.
    pub fn try_load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ConfigMissing(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

/// Split a comma-separated list, dropping blanks.
pub fn parse_ignore_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect()
}

/// Runtime watcher settings with paths resolved against the watched root.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub root: PathBuf,
    pub ignored_directory_names: BTreeSet<String>,
    pub audit_script: PathBuf,
    pub audit_log: PathBuf,
    pub poll_interval: Duration,
    pub debounce: Duration,
    pub audit_timeout: Option<Duration>,
    pub shutdown_grace: Duration,
    pub dispatch_after_audit: bool,
}

impl WatcherConfig {
    /// The root is made absolute first: the audit script is spawned with the
    /// root as its working directory, so a relative script path would resolve twice.
    pub fn resolve(root: impl Into<PathBuf>, config: &RemedyConfig) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        let w = &config.watcher;
        Self {
            audit_script: root.join(&w.audit_script),
            audit_log: root.join(&w.audit_log),
            ignored_directory_names: parse_ignore_list(&w.ignore_directories),
            poll_interval: Duration::from_millis(w.poll_ms.max(1)),
            debounce: Duration::from_millis(w.debounce_ms),
            audit_timeout: (w.audit_timeout_secs > 0).then(|| Duration::from_secs(w.audit_timeout_secs)),
            shutdown_grace: Duration::from_secs(w.shutdown_grace_secs),
            dispatch_after_audit: w.dispatch_after_audit,
            root,
        }
    }
}
