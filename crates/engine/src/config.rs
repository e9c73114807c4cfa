// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination configuration.
//!
//! Loaded from TOML with human-readable duration strings:
//!
//! ```toml
//! auto_validity_check = true
//! validity_check_timeout = "30s"
//! heartbeat_interval = "5s"
//! delayed_executor = false
//! ```

use flotilla_core::WorldKind;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid duration for {field}: {detail}")]
    Duration { field: &'static str, detail: String },
}

/// Parse a duration string like "200ms", "30s", "5m", "1h".
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the numeric prefix
    let (num_str, suffix) = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, ""));

    let num: u64 = num_str.parse().map_err(|_| format!("invalid number in duration: {}", s))?;

    let multiplier = match suffix.trim() {
        "ms" | "millis" | "millisecond" | "milliseconds" => {
            return Ok(Duration::from_millis(num));
        }
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        "d" | "day" | "days" => 86400,
        other => return Err(format!("unknown duration suffix: {}", other)),
    };

    Ok(Duration::from_secs(num * multiplier))
}

/// Tunables for one world's coordination behavior.
#[derive(Debug, Clone)]
pub struct CoordinationConfig {
    /// Run the startup validity sweep. `None` keeps the kind default:
    /// enabled for executors, disabled for clients.
    pub auto_validity_check: Option<bool>,
    /// How long a heartbeat is trusted.
    pub validity_check_timeout: Duration,
    /// How often a live world refreshes its heartbeat row.
    pub heartbeat_interval: Duration,
    /// Acquire the delayed-dispatch role lock on startup.
    pub delayed_executor: bool,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            auto_validity_check: None,
            validity_check_timeout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(5),
            delayed_executor: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    auto_validity_check: Option<bool>,
    validity_check_timeout: Option<String>,
    heartbeat_interval: Option<String>,
    delayed_executor: Option<bool>,
}

impl CoordinationConfig {
    /// Effective startup-check setting for a world of the given kind.
    pub fn auto_validity_check_for(&self, kind: WorldKind) -> bool {
        self.auto_validity_check.unwrap_or(kind == WorldKind::Executor)
    }

    pub fn auto_validity_check(mut self, v: bool) -> Self {
        self.auto_validity_check = Some(v);
        self
    }

    pub fn validity_check_timeout(mut self, v: Duration) -> Self {
        self.validity_check_timeout = v;
        self
    }

    pub fn heartbeat_interval(mut self, v: Duration) -> Self {
        self.heartbeat_interval = v;
        self
    }

    pub fn delayed_executor(mut self, v: bool) -> Self {
        self.delayed_executor = v;
        self
    }

    /// Parse from TOML, with defaults for anything omitted.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(input)?;
        let mut config = Self::default();
        config.auto_validity_check = raw.auto_validity_check;
        if let Some(v) = raw.delayed_executor {
            config.delayed_executor = v;
        }
        if let Some(s) = raw.validity_check_timeout {
            config.validity_check_timeout = parse_duration(&s)
                .map_err(|detail| ConfigError::Duration { field: "validity_check_timeout", detail })?;
        }
        if let Some(s) = raw.heartbeat_interval {
            config.heartbeat_interval = parse_duration(&s)
                .map_err(|detail| ConfigError::Duration { field: "heartbeat_interval", detail })?;
        }
        Ok(config)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
