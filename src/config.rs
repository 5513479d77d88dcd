//! Configuration management
//!
//! Handles loading and validation of JSON deployment files describing the
//! instrument, the strategy variant, trading windows, the daily flatten
//! cutoff, and optional multi-instance rotation. Validation errors are
//! fatal at startup; nothing here is recovered at runtime.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::flatten::FlattenScheduler;
use crate::strategy::BreakoutConfig;
use crate::types::OrderKind;
use crate::window::{parse_time, WindowGate, WindowMode};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub instrument: InstrumentConfig,
    pub strategy: BreakoutConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows: Option<WindowConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flatten: Option<FlattenConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<RotationConfig>,
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the strategy cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.instrument.tick_size <= 0.0 {
            bail!("instrument.tick_size must be positive");
        }
        if self.strategy.quantity <= 0.0 {
            bail!("strategy.quantity must be positive");
        }
        if self.strategy.reward_multiple <= 0.0 {
            bail!("strategy.reward_multiple must be positive");
        }
        if !matches!(
            self.strategy.entry_kind,
            OrderKind::StopMarket | OrderKind::StopLimit
        ) {
            bail!("strategy.entry_kind must be StopMarket or StopLimit");
        }
        if let Some(windows) = &self.windows {
            windows.build().context("invalid windows section")?;
        }
        if let Some(flatten) = &self.flatten {
            flatten.build().context("invalid flatten section")?;
        }
        if let Some(rotation) = &self.rotation {
            rotation.validate()?;
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            instrument: InstrumentConfig::default(),
            strategy: BreakoutConfig::default(),
            windows: None,
            flatten: None,
            rotation: None,
        }
    }
}

/// Instrument configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub symbol: String,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    pub tick_size: f64,
}

fn default_timeframe() -> String {
    "30m".to_string()
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        InstrumentConfig {
            symbol: "BTCUSDT".to_string(),
            timeframe: default_timeframe(),
            tick_size: 0.01,
        }
    }
}

/// Trade window configuration: explicit mode plus either interval strings
/// or a fixed-granularity slot table, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    pub mode: WindowMode,
    #[serde(default)]
    pub intervals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots: Option<Vec<bool>>,
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: u32,
}

fn default_slot_minutes() -> u32 {
    30
}

impl WindowConfig {
    pub fn build(&self) -> Result<WindowGate> {
        match &self.slots {
            Some(slots) => {
                if !self.intervals.is_empty() {
                    bail!("windows: specify either intervals or slots, not both");
                }
                if self.slot_minutes == 0 || 1440 % self.slot_minutes != 0 {
                    bail!("windows.slot_minutes must divide a day evenly");
                }
                Ok(WindowGate::from_slots(
                    self.mode,
                    self.slot_minutes,
                    slots.clone(),
                ))
            }
            None => WindowGate::parse_intervals(self.mode, &self.intervals),
        }
    }
}

/// Daily flatten cutoff interval, half-open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlattenConfig {
    pub start: String,
    pub end: String,
}

impl FlattenConfig {
    pub fn build(&self) -> Result<FlattenScheduler> {
        let start = parse_time(&self.start)?;
        let end = parse_time(&self.end)?;
        if end <= start {
            bail!("flatten cutoff must not wrap midnight");
        }
        Ok(FlattenScheduler::new(start, end))
    }
}

impl Default for FlattenConfig {
    fn default() -> Self {
        FlattenConfig {
            start: "17:00".to_string(),
            end: "17:01".to_string(),
        }
    }
}

/// Multi-instance rotation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Number of cooperating instances sharing the account.
    pub instances: u32,
    /// This instance's index, 1..=instances.
    pub instance_index: u32,
    /// Shared token file visible to every instance.
    pub token_path: String,
}

impl RotationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.instances == 0 {
            bail!("rotation.instances must be at least 1");
        }
        if self.instance_index == 0 || self.instance_index > self.instances {
            bail!(
                "rotation.instance_index {} out of range 1..={}",
                self.instance_index,
                self.instances
            );
        }
        Ok(())
    }
}
