//! Configuration system: TOML file + env var overrides + defaults.
//!
//! Unlike most sections, `[notifier]` has required fields: the endpoint URL,
//! its API key, and at least one recipient. A config that lacks them fails
//! validation and the daemon refuses to start.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{MonError, Result};
use crate::monitor::thresholds::{DEFAULT_THRESHOLDS, ThresholdTable, validate_bands};
use crate::platform::pal::DEFAULT_IGNORED_FS_TYPES;

/// Env var naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "DISKMON_CONFIG";

/// Full monitor configuration model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorConfig,
    pub notifier: NotifierConfig,
    pub sampler: SamplerConfig,
    pub paths: PathsConfig,
}

/// Poll cadence and severity bands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Delay between the end of one cycle and the start of the next.
    pub poll_interval_secs: u64,
    /// Descending ratios ending in `0`.
    pub thresholds: Vec<f64>,
}

/// Notification endpoint and recipients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotifierConfig {
    pub api_url: String,
    pub api_key: String,
    pub recipients: Vec<String>,
    /// Transport timeout per delivery attempt.
    pub timeout_secs: u64,
}

/// Host sampler tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SamplerConfig {
    pub ignored_fs_types: Vec<String>,
}

/// Filesystem paths used by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub state_file: PathBuf,
    pub activity_log: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            thresholds: DEFAULT_THRESHOLDS.to_vec(),
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key: String::new(),
            recipients: Vec::new(),
            timeout_secs: 10,
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            ignored_fs_types: DEFAULT_IGNORED_FS_TYPES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from("/etc/diskmon/config.toml"),
            state_file: PathBuf::from("/var/tmp/system-monitor.json"),
            activity_log: PathBuf::from("/var/tmp/diskmon-activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path, honoring `DISKMON_CONFIG`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        env_var(CONFIG_PATH_ENV).map_or_else(|| PathsConfig::default().config_file, PathBuf::from)
    }

    /// Load config from the default or an explicit path, then apply env overrides.
    ///
    /// The file must exist: required notifier fields have no sensible default.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        if !path_buf.exists() {
            return Err(MonError::MissingConfig { path: path_buf });
        }
        let raw = fs::read_to_string(&path_buf).map_err(|source| MonError::io(&path_buf, source))?;
        let mut cfg = Self::from_toml_str(&raw)?;
        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse TOML without env overrides or validation.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Validated threshold table.
    pub fn threshold_table(&self) -> Result<ThresholdTable> {
        ThresholdTable::new(self.monitor.thresholds.clone())
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over canonical JSON, with the API key blanked so the hash can be
    /// logged without leaking the credential.
    pub fn stable_hash(&self) -> Result<String> {
        let mut redacted = self.clone();
        redacted.notifier.api_key = String::new();
        let canonical = serde_json::to_string(&redacted)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("DISKMON_MONITOR_POLL_INTERVAL_SECS") {
            self.monitor.poll_interval_secs =
                parse_env_u64("DISKMON_MONITOR_POLL_INTERVAL_SECS", &raw)?;
        }
        if let Some(raw) = lookup("DISKMON_MONITOR_THRESHOLDS") {
            self.monitor.thresholds = parse_env_f64_list("DISKMON_MONITOR_THRESHOLDS", &raw)?;
        }

        if let Some(raw) = lookup("DISKMON_NOTIFIER_API_URL") {
            self.notifier.api_url = raw;
        }
        if let Some(raw) = lookup("DISKMON_NOTIFIER_API_KEY") {
            self.notifier.api_key = raw;
        }
        if let Some(raw) = lookup("DISKMON_NOTIFIER_RECIPIENTS") {
            self.notifier.recipients = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(raw) = lookup("DISKMON_NOTIFIER_TIMEOUT_SECS") {
            self.notifier.timeout_secs = parse_env_u64("DISKMON_NOTIFIER_TIMEOUT_SECS", &raw)?;
        }

        if let Some(raw) = lookup("DISKMON_PATHS_STATE_FILE") {
            self.paths.state_file = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("DISKMON_PATHS_ACTIVITY_LOG") {
            self.paths.activity_log = PathBuf::from(raw);
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.notifier.api_url.trim().is_empty() {
            return Err(MonError::InvalidConfig {
                details: "notifier.api_url is required".to_string(),
            });
        }
        if self.notifier.api_key.trim().is_empty() {
            return Err(MonError::InvalidConfig {
                details: "notifier.api_key is required".to_string(),
            });
        }
        if self.notifier.recipients.is_empty() {
            return Err(MonError::InvalidConfig {
                details: "notifier.recipients must name at least one user".to_string(),
            });
        }
        if let Some(index) = self.notifier.recipients.iter().position(|r| r.trim().is_empty()) {
            return Err(MonError::InvalidConfig {
                details: format!("notifier.recipients[{index}] is blank"),
            });
        }
        if self.notifier.timeout_secs == 0 {
            return Err(MonError::InvalidConfig {
                details: "notifier.timeout_secs must be >= 1".to_string(),
            });
        }
        if self.monitor.poll_interval_secs == 0 {
            return Err(MonError::InvalidConfig {
                details: "monitor.poll_interval_secs must be >= 1".to_string(),
            });
        }
        validate_bands(&self.monitor.thresholds).map_err(|err| match err {
            MonError::InvalidConfig { details } => MonError::InvalidConfig {
                details: format!("monitor.thresholds: {details}"),
            },
            other => other,
        })?;
        if self.paths.state_file.as_os_str().is_empty() {
            return Err(MonError::InvalidConfig {
                details: "paths.state_file must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|error| MonError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_f64_list(name: &str, raw: &str) -> Result<Vec<f64>> {
    raw.split(',')
        .map(|part| {
            part.trim().parse::<f64>().map_err(|error| MonError::ConfigParse {
                context: "env",
                details: format!("{name}={raw:?}: {error}"),
            })
        })
        .collect()
}
