//! Shared-RAM slot layout and firmware constants.
//!
//! Single source of truth for the host ↔ PRU handoff layout. The PRU
//! firmware addresses shared data RAM as an array of `u32` slots; the
//! indices below are fixed by the firmware image and must never drift.

use static_assertions::const_assert;

/// Number of controlled axes (X, Y, Z).
pub const AXIS_COUNT: usize = 3;

/// Slot 0: status/busy flag. The host writes 0 to start the pending move;
/// the firmware sets it nonzero when idle and awaiting a command.
pub const SLOT_STATUS: usize = 0;

/// Slots 1-3: live absolute step count per axis (firmware writes).
pub const SLOT_LIVE_BASE: usize = 1;

/// Slots 4-6: target absolute step count per axis (host writes).
pub const SLOT_TARGET_BASE: usize = 4;

/// Slots 7-9: pulse half-period per axis in PRU clock cycles (host writes).
pub const SLOT_HALF_PERIOD_BASE: usize = 7;

/// Total number of slots in the command region.
pub const SLOT_COUNT: usize = 10;

/// Size of the mapped shared-RAM window in bytes (one page).
pub const SHARED_RAM_BYTES: usize = 4096;

/// Step counter value at firmware boot. Mid-range of the unsigned counter
/// so the firmware never has to handle negative positions.
pub const BOOT_STEP_COUNT: u32 = 0x7FFF_FFFF;

/// Half-period written for an axis that must not move. The target slot for
/// a held axis equals its live count, so no pulses are produced; the
/// longest expressible period keeps the generator idle either way.
pub const HOLD_HALF_PERIOD: u32 = u32::MAX;

// The three per-axis banks are contiguous and the whole table fits the
// mapped window.
const_assert!(SLOT_LIVE_BASE + AXIS_COUNT == SLOT_TARGET_BASE);
const_assert!(SLOT_TARGET_BASE + AXIS_COUNT == SLOT_HALF_PERIOD_BASE);
const_assert!(SLOT_HALF_PERIOD_BASE + AXIS_COUNT == SLOT_COUNT);
const_assert!(SLOT_COUNT * core::mem::size_of::<u32>() <= SHARED_RAM_BYTES);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_banks_do_not_overlap() {
        let live = SLOT_LIVE_BASE..SLOT_LIVE_BASE + AXIS_COUNT;
        let target = SLOT_TARGET_BASE..SLOT_TARGET_BASE + AXIS_COUNT;
        let period = SLOT_HALF_PERIOD_BASE..SLOT_HALF_PERIOD_BASE + AXIS_COUNT;

        assert!(!live.contains(&SLOT_STATUS));
        assert!(!target.contains(&SLOT_STATUS));
        assert!(!period.contains(&SLOT_STATUS));
        assert!(live.end <= target.start);
        assert!(target.end <= period.start);
    }

    #[test]
    fn boot_count_is_mid_range() {
        assert_eq!(BOOT_STEP_COUNT, u32::MAX / 2);
    }
}
