//! Courier configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Main courier configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session discovery
    pub sessions: SessionConfig,

    /// Transport wiring for the binary
    pub transport: TransportConfig,

    /// Anti-burst delay policy
    pub delays: DelayPolicy,

    /// Flood-wait handling
    pub flood: FloodConfig,
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        self.delays.validate()?;
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .courier.yml
        let local_config = PathBuf::from(".courier.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/courier/courier.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("courier").join("courier.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Session discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory scanned for *.session files
    pub dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./sessions"),
        }
    }
}

/// Transport mode for the binary
///
/// The engine only ever sees `dyn Outbox`; this selects what the binary
/// wires behind that seam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportMode {
    /// In-memory transport; deliveries land in a ledger and the log
    #[default]
    DryRun,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub mode: TransportMode,
}

/// An inclusive seconds range sampled per use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min: u64,
    pub max: u64,
}

impl DelayRange {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub const fn zero() -> Self {
        Self { min: 0, max: 0 }
    }

    /// Sample a duration from the range
    pub fn sample(&self) -> Duration {
        if self.max == 0 {
            return Duration::ZERO;
        }
        let secs = rand::rng().random_range(self.min..=self.max);
        Duration::from_secs(secs)
    }
}

/// Anti-burst delays between remote actions
///
/// These are empirical anti-abuse heuristics, not protocol requirements;
/// tune them per deployment. Zero ranges disable a delay entirely (tests
/// rely on that).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayPolicy {
    /// Short pause after each successful send
    #[serde(rename = "success-jitter")]
    pub success_jitter: DelayRange,

    /// Longer pause between consecutive targets in a round
    #[serde(rename = "target-gap")]
    pub target_gap: DelayRange,

    /// Pause between accounts in the join workflow
    #[serde(rename = "join-gap")]
    pub join_gap: DelayRange,
}

impl DelayPolicy {
    /// All delays disabled; used by tests
    pub fn none() -> Self {
        Self {
            success_jitter: DelayRange::zero(),
            target_gap: DelayRange::zero(),
            join_gap: DelayRange::zero(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, range) in [
            ("success-jitter", self.success_jitter),
            ("target-gap", self.target_gap),
            ("join-gap", self.join_gap),
        ] {
            if range.min > range.max {
                return Err(eyre::eyre!("delay range {} has min > max ({} > {})", name, range.min, range.max));
            }
        }
        Ok(())
    }
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            success_jitter: DelayRange::new(2, 5),
            target_gap: DelayRange::new(5, 10),
            join_gap: DelayRange::new(3, 8),
        }
    }
}

/// Flood-wait handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodConfig {
    /// Safety margin added on top of the advertised wait
    #[serde(rename = "margin-secs")]
    pub margin_secs: u64,

    /// Consecutive flood-wait retries per target before skipping it
    #[serde(rename = "max-retries")]
    pub max_retries: u32,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            margin_secs: 1,
            max_retries: 1,
        }
    }
}
