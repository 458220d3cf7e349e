//! Core motion types shared between the transport and the sequencer.

use serde::Deserialize;

use crate::consts::{AXIS_COUNT, HOLD_HALF_PERIOD};

/// Absolute step counts for the three axes, in slot order (X, Y, Z).
pub type StepTriple = [u32; AXIS_COUNT];

/// One of the three controlled axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    /// All axes in slot order.
    pub const ALL: [Axis; AXIS_COUNT] = [Axis::X, Axis::Y, Axis::Z];

    /// Slot-bank offset of this axis.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
            Axis::Z => write!(f, "Z"),
        }
    }
}

/// A target position in millimeter space.
///
/// Deserializes from a 3-element array (`[x, y, z]`), the form used by the
/// toolpath table in `mill.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f64; 3]")]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Waypoint {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Coordinate of the given axis.
    #[inline]
    pub fn coord(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Per-axis displacement `self - from`, in millimeters.
    pub fn delta_from(&self, from: &Waypoint) -> [f64; AXIS_COUNT] {
        [self.x - from.x, self.y - from.y, self.z - from.z]
    }
}

impl From<[f64; 3]> for Waypoint {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Pulse programming for a single axis within one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisPulse {
    /// Axis does not move in this segment; its pulse generator is held.
    Held,
    /// Half of the pulse period, in PRU clock cycles. Always nonzero.
    HalfPeriod(u32),
}

impl AxisPulse {
    #[inline]
    pub const fn is_held(self) -> bool {
        matches!(self, AxisPulse::Held)
    }

    /// Raw value written into the half-period slot.
    #[inline]
    pub const fn slot_value(self) -> u32 {
        match self {
            AxisPulse::Held => HOLD_HALF_PERIOD,
            AxisPulse::HalfPeriod(cycles) => cycles,
        }
    }
}

/// A fully planned segment command, ready for the shared-RAM handoff.
///
/// Targets are absolute counter values (origin plus scaled waypoint),
/// never deltas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepCommand {
    /// Absolute step target per axis (slots 4-6).
    pub targets: StepTriple,
    /// Pulse programming per axis (slots 7-9).
    pub pulses: [AxisPulse; AXIS_COUNT],
}
