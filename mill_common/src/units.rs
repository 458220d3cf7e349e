//! Millimeter ↔ step conversion.
//!
//! The machine moves on fine-pitch threaded rod driven by microstepped
//! steppers, so positions are scaled by a single steps-per-millimeter
//! ratio derived from the drive geometry. Stateless; the ratio is fixed
//! for the life of a run.

use thiserror::Error;

/// Error from constructing a [`StepScale`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    /// The derived steps-per-millimeter ratio is zero, negative or non-finite.
    #[error("steps-per-mm ratio must be positive and finite (got {0})")]
    NonPositiveRatio(f64),
}

/// Conversion between millimeter space and motor step counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepScale {
    steps_per_mm: f64,
}

impl StepScale {
    /// Build the scale from drive geometry: full steps per revolution
    /// (including microstepping) and millimeters of travel per revolution.
    pub fn from_drive(steps_per_rev: u32, mm_per_rev: f64) -> Result<Self, UnitError> {
        let ratio = steps_per_rev as f64 / mm_per_rev;
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(UnitError::NonPositiveRatio(ratio));
        }
        Ok(Self { steps_per_mm: ratio })
    }

    /// The raw ratio in steps per millimeter.
    #[inline]
    pub fn steps_per_mm(&self) -> f64 {
        self.steps_per_mm
    }

    /// Convert millimeters to steps, rounded to the nearest whole step.
    #[inline]
    pub fn mm_to_steps(&self, mm: f64) -> i64 {
        (mm * self.steps_per_mm).round() as i64
    }

    /// Convert a signed step count back to millimeters.
    #[inline]
    pub fn steps_to_mm(&self, steps: i64) -> f64 {
        steps as f64 / self.steps_per_mm
    }

    /// Recover origin-relative millimeters from a raw counter value.
    ///
    /// Counters are unsigned and boot mid-range, so the origin-relative
    /// offset is formed in `i64` before scaling.
    #[inline]
    pub fn relative_mm(&self, origin: u32, raw: u32) -> f64 {
        self.steps_to_mm(raw as i64 - origin as i64)
    }
}
