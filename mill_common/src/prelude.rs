//! Common re-exports for downstream crates.

pub use crate::config::{ConfigLoader, MillConfig};
pub use crate::consts::{
    AXIS_COUNT, BOOT_STEP_COUNT, HOLD_HALF_PERIOD, SLOT_HALF_PERIOD_BASE, SLOT_LIVE_BASE,
    SLOT_STATUS, SLOT_TARGET_BASE,
};
pub use crate::types::{Axis, AxisPulse, StepCommand, StepTriple, Waypoint};
pub use crate::units::StepScale;
