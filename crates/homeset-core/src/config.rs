use std::time::Duration;

use anyhow::{Context, Result};

pub const COOLDOWN_VAR: &str = "HOMESET_COOLDOWN_SECS";
pub const TELEPORT_DELAY_VAR: &str = "HOMESET_TELEPORT_DELAY_SECS";
pub const MAX_HOMES_VAR: &str = "HOMESET_MAX_HOMES";

/// Tunables read from the environment. Zero or negative values mean
/// "disabled" for the durations and "unlimited" for the home limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub cooldown_secs: i64,
    pub teleport_delay_secs: i64,
    pub max_homes: i64,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Missing keys fall back to 0.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| -> Result<i64> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{} must be an integer, got '{}'", key, raw)),
                None => Ok(0),
            }
        };

        Ok(Self {
            cooldown_secs: read(COOLDOWN_VAR)?,
            teleport_delay_secs: read(TELEPORT_DELAY_VAR)?,
            max_homes: read(MAX_HOMES_VAR)?,
        })
    }

    pub fn cooldown(&self) -> Option<Duration> {
        positive_secs(self.cooldown_secs)
    }

    pub fn teleport_delay(&self) -> Option<Duration> {
        positive_secs(self.teleport_delay_secs)
    }

    pub fn home_limit(&self) -> Option<u32> {
        (self.max_homes > 0).then(|| u32::try_from(self.max_homes).unwrap_or(u32::MAX))
    }
}

fn positive_secs(secs: i64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs as u64))
}
