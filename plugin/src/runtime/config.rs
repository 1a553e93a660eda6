use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use super::notifier::DebounceScope;
use crate::animation::override_engine::{DEFAULT_RESTORE_TICKS, DEFAULT_SETTLE_TICKS};
use crate::error::{PluginError, Result};
use crate::tracking::OverrideRule;

/// Environment variable pointing at the plugin's TOML config file.
pub const CONFIG_PATH_ENV: &str = "EMOTE_CONFIG_PATH";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    pub tracking: TrackingConfig,
    pub reset: ResetConfig,
    pub sync: SyncConfig,
    pub verifier: VerifierConfig,
    pub overrides: Vec<OverrideRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Radians of turn that interrupt a loop; unset disables the check.
    pub rotation_epsilon: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    pub settle_ticks: u32,
    pub restore_ticks: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    pub debounce_ms: u64,
    /// Defaults to one debounce timer per character, so events for different
    /// characters no longer cancel each other's re-publish. `scope = "global"`
    /// restores the single shared timer.
    pub scope: DebounceScope,
    pub channel_prefix: String,
    pub bus_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    pub enabled: bool,
}

impl PluginConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| PluginError::Config(format!("{}: {e}", path.display())))?;
        Self::parse(&content)
    }

    /// Loads the file named by `EMOTE_CONFIG_PATH`, or the defaults when unset.
    pub fn load_from_env() -> Result<Self> {
        match env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load_from_file(path),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let parsed = toml::from_str::<Self>(content)
            .map_err(|e| PluginError::Config(e.to_string()))?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reset.settle_ticks == 0 {
            return Err(PluginError::Config(
                "reset.settle_ticks must be at least 1".to_string(),
            ));
        }
        if self.sync.channel_prefix.is_empty() {
            return Err(PluginError::Config(
                "sync.channel_prefix must not be empty".to_string(),
            ));
        }
        if let Some(epsilon) = self.tracking.rotation_epsilon {
            if !(epsilon.is_finite() && epsilon > 0.0) {
                return Err(PluginError::Config(format!(
                    "tracking.rotation_epsilon must be positive, got {epsilon}"
                )));
            }
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.sync.debounce_ms)
    }
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            settle_ticks: DEFAULT_SETTLE_TICKS,
            restore_ticks: DEFAULT_RESTORE_TICKS,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 500,
            scope: DebounceScope::PerCharacter,
            channel_prefix: "emotesync".to_string(),
            bus_capacity: 64,
        }
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
