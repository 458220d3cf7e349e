//! Configuration loading and validation.
//!
//! The host is configured by a single `mill.toml` with four tables:
//! `[drive]` (motor/thread geometry), `[pru]` (co-processor device paths
//! and clock), `[motion]` (speed, dwell, poll period) and `[toolpath]`
//! (the waypoint list). All machine constants live here — nothing is
//! hard-baked into the binary.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::types::Waypoint;
use crate::units::{StepScale, UnitError};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<UnitError> for ConfigError {
    fn from(e: UnitError) -> Self {
        ConfigError::ValidationError(e.to_string())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
/// - Semantic validation is a separate step (`MillConfig::validate`)
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

/// Motor and leadscrew geometry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriveConfig {
    /// Steps per motor revolution, including microstepping.
    pub steps_per_rev: u32,
    /// Millimeters of travel per motor revolution (thread pitch).
    pub mm_per_rev: f64,
}

/// Co-processor device paths and clock.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PruDeviceConfig {
    /// Approximate duration of one PRU instruction cycle, in nanoseconds.
    pub ns_per_cycle: u32,
    /// Firmware image name (resolved by the remoteproc firmware loader).
    pub firmware: String,
    /// UIO device exposing shared RAM and the readiness interrupt.
    #[serde(default = "default_uio_path")]
    pub uio_path: PathBuf,
    /// remoteproc sysfs directory for this PRU core.
    #[serde(default = "default_rproc_dir")]
    pub rproc_dir: PathBuf,
    /// Upper bound on waiting for a readiness signal before declaring the
    /// co-processor dead.
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
}

fn default_uio_path() -> PathBuf {
    PathBuf::from("/dev/uio0")
}

fn default_rproc_dir() -> PathBuf {
    PathBuf::from("/sys/class/remoteproc/remoteproc1")
}

fn default_ready_timeout_ms() -> u64 {
    30_000
}

/// Motion parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotionConfig {
    /// Target linear speed along each segment, mm/s.
    pub speed_mm_s: f64,
    /// Settling pause between segments, milliseconds.
    #[serde(default = "default_dwell_ms")]
    pub dwell_ms: u64,
    /// Position monitor sampling period, milliseconds.
    #[serde(default = "default_poll_period_ms")]
    pub poll_period_ms: u64,
}

fn default_dwell_ms() -> u64 {
    1_000
}

fn default_poll_period_ms() -> u64 {
    100
}

/// The ordered waypoint list. Index 0 is the machine's resting position
/// and is never issued as a move target.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolpathConfig {
    pub waypoints: Vec<Waypoint>,
}

/// Root configuration for the motion host.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MillConfig {
    pub drive: DriveConfig,
    pub pru: PruDeviceConfig,
    pub motion: MotionConfig,
    pub toolpath: ToolpathConfig,
}

impl MillConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - drive geometry yields a non-positive steps/mm ratio
    /// - the PRU clock or firmware name is empty/zero
    /// - the target speed is not positive and finite
    /// - the poll period or ready timeout is zero
    /// - the toolpath has fewer than two waypoints or contains a
    ///   consecutive duplicate (a zero-length segment)
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Evaluates the ratio, including finiteness.
        self.step_scale()?;

        if self.pru.ns_per_cycle == 0 {
            return Err(ConfigError::ValidationError(
                "pru.ns_per_cycle must be nonzero".to_string(),
            ));
        }
        if self.pru.firmware.is_empty() {
            return Err(ConfigError::ValidationError(
                "pru.firmware cannot be empty".to_string(),
            ));
        }
        if self.pru.ready_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "pru.ready_timeout_ms must be nonzero".to_string(),
            ));
        }

        if !self.motion.speed_mm_s.is_finite() || self.motion.speed_mm_s <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "motion.speed_mm_s must be positive (got {})",
                self.motion.speed_mm_s
            )));
        }
        if self.motion.poll_period_ms == 0 {
            return Err(ConfigError::ValidationError(
                "motion.poll_period_ms must be nonzero".to_string(),
            ));
        }

        let waypoints = &self.toolpath.waypoints;
        if waypoints.len() < 2 {
            return Err(ConfigError::ValidationError(format!(
                "toolpath needs at least 2 waypoints (got {})",
                waypoints.len()
            )));
        }
        // A repeated waypoint would reach the planner as a zero-length
        // segment, which is fatal at runtime; reject it up front.
        for (i, pair) in waypoints.windows(2).enumerate() {
            if pair[0] == pair[1] {
                return Err(ConfigError::ValidationError(format!(
                    "toolpath waypoints {} and {} are identical (zero-length segment)",
                    i,
                    i + 1
                )));
            }
        }

        Ok(())
    }

    /// The millimeter/step conversion derived from the drive geometry.
    pub fn step_scale(&self) -> Result<StepScale, ConfigError> {
        Ok(StepScale::from_drive(
            self.drive.steps_per_rev,
            self.drive.mm_per_rev,
        )?)
    }

    /// Inter-segment dwell as a [`Duration`].
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.motion.dwell_ms)
    }

    /// Monitor sampling period as a [`Duration`].
    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.motion.poll_period_ms)
    }

    /// Readiness-wait upper bound as a [`Duration`].
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.pru.ready_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_toml() -> &'static str {
        r#"
[drive]
steps_per_rev = 6400
mm_per_rev = 0.7

[pru]
ns_per_cycle = 180
firmware = "cnc.bin"

[motion]
speed_mm_s = 2.0

[toolpath]
waypoints = [[0, 0, 0], [100, 0, 0], [100, 100, 0]]
"#
    }

    #[test]
    fn reference_config_parses_and_validates() {
        let cfg: MillConfig = toml::from_str(reference_toml()).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.drive.steps_per_rev, 6400);
        assert_eq!(cfg.toolpath.waypoints.len(), 3);
        assert_eq!(cfg.toolpath.waypoints[1], Waypoint::new(100.0, 0.0, 0.0));
    }

    #[test]
    fn defaults_applied_for_omitted_keys() {
        let cfg: MillConfig = toml::from_str(reference_toml()).unwrap();
        assert_eq!(cfg.motion.dwell_ms, 1_000);
        assert_eq!(cfg.motion.poll_period_ms, 100);
        assert_eq!(cfg.pru.ready_timeout_ms, 30_000);
        assert_eq!(cfg.pru.uio_path, PathBuf::from("/dev/uio0"));
        assert_eq!(cfg.dwell(), Duration::from_secs(1));
        assert_eq!(cfg.poll_period(), Duration::from_millis(100));
    }

    #[test]
    fn rejects_duplicate_consecutive_waypoints() {
        let toml_str = reference_toml().replace(
            "[[0, 0, 0], [100, 0, 0], [100, 100, 0]]",
            "[[0, 0, 0], [100, 0, 0], [100, 0, 0]]",
        );
        let cfg: MillConfig = toml::from_str(&toml_str).unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("identical"));
    }

    #[test]
    fn rejects_non_positive_speed() {
        let toml_str = reference_toml().replace("speed_mm_s = 2.0", "speed_mm_s = 0.0");
        let cfg: MillConfig = toml::from_str(&toml_str).unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn rejects_zero_pitch() {
        let toml_str = reference_toml().replace("mm_per_rev = 0.7", "mm_per_rev = 0.0");
        let cfg: MillConfig = toml::from_str(&toml_str).unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn rejects_short_toolpath() {
        let toml_str = reference_toml().replace(
            "[[0, 0, 0], [100, 0, 0], [100, 100, 0]]",
            "[[0, 0, 0]]",
        );
        let cfg: MillConfig = toml::from_str(&toml_str).unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn rejects_unknown_fields() {
        let toml_str = format!("{}\nsurprise = true\n", reference_toml());
        assert!(toml::from_str::<MillConfig>(&toml_str).is_err());
    }
}
