// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::cfg::logger::LogConfig;

/// Runtime configuration loaded from YAML. All sections are optional; the
/// built-in defaults describe the reference deployment.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Fixed bounds of the session table.
    pub limits: Limits,
    /// Timer driving the diagnostic tick.
    pub timing: Timing,
    /// Credential store location.
    pub store: StoreConfig,
    /// Logging setup (level, output, optional file rotation).
    pub logger: LogConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct Limits {
    /// Size of the descriptor table. Slot 0 belongs to the listener, so
    /// `max_sessions - 1` clients can be connected at once; further
    /// connects are accepted and immediately closed.
    pub max_sessions: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_sessions: 5 }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct Timing {
    /// Interval between diagnostic ticks (counter persist + manager
    /// report).
    #[serde(with = "serde_secs")]
    pub diagnostic_interval: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            diagnostic_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the `user_db` / `index_db` / `meta_db` files.
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
        }
    }
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {:?}", path.as_ref()))?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(
            self.limits.max_sessions >= 2,
            "limits.max_sessions must leave room for the listener and at least one client"
        );
        ensure!(
            self.timing.diagnostic_interval >= Duration::from_millis(100),
            "timing.diagnostic_interval must be at least 100ms"
        );
        Ok(())
    }
}

/// Serde helpers for representing `Duration` as a number of seconds.
mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
