//! Deterministic in-process model of the PRU step engine.
//!
//! Used by `--sim` runs and by integration tests. The model keeps the
//! real handshake shape — boot readiness, edge latch, explicit clear and
//! rearm — but completes each commanded move lazily, the first time the
//! host waits on it. That keeps tests deterministic without threads or
//! timing assumptions.
//!
//! Latch semantics follow the hardware: delivery consumes the *arm*, not
//! the latch. A host that re-arms without clearing sees the stale edge
//! again immediately; a host that clears but forgets to re-arm waits
//! forever.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use mill_common::consts::{
    BOOT_STEP_COUNT, SLOT_COUNT, SLOT_HALF_PERIOD_BASE, SLOT_LIVE_BASE, SLOT_STATUS,
    SLOT_TARGET_BASE,
};
use mill_common::types::{Axis, StepCommand, StepTriple};

use crate::engine::{LiveSteps, StepEngine};
use crate::error::PruError;

#[derive(Debug)]
struct EdgeState {
    /// A readiness edge is latched (set at boot and on move completion).
    latched: bool,
    /// Delivery is enabled; consumed by each delivered wait.
    armed: bool,
    /// A released command has not yet completed.
    moving: bool,
}

struct SimShared {
    /// The slot table. The mutex orders the handshake; the atomics only
    /// provide tear-free individual slot access for concurrent taps.
    slots: [AtomicU32; SLOT_COUNT],
    state: Mutex<EdgeState>,
    cv: Condvar,
}

impl SimShared {
    fn slot(&self, idx: usize) -> u32 {
        self.slots[idx].load(Ordering::Relaxed)
    }

    fn set_slot(&self, idx: usize, value: u32) {
        self.slots[idx].store(value, Ordering::Relaxed);
    }

    fn read_live(&self) -> StepTriple {
        let mut live = [0u32; 3];
        for axis in Axis::ALL {
            live[axis.index()] = self.slot(SLOT_LIVE_BASE + axis.index());
        }
        live
    }

    /// Teleport the live counters onto the targets, flag idle, latch the
    /// readiness edge.
    fn complete_move(&self, state: &mut EdgeState) {
        for axis in Axis::ALL {
            let i = axis.index();
            self.set_slot(SLOT_LIVE_BASE + i, self.slot(SLOT_TARGET_BASE + i));
        }
        self.set_slot(SLOT_STATUS, 1);
        state.moving = false;
        state.latched = true;
    }
}

/// A simulated PRU, split into commander and tap like the real device.
pub struct SimEngine {
    shared: Arc<SimShared>,
}

impl SimEngine {
    /// Boot the simulated firmware with mid-range counters.
    pub fn new() -> Self {
        Self::with_boot_counts([BOOT_STEP_COUNT; 3])
    }

    /// Boot with specific counter values (targets start equal to the
    /// counters, exactly as the firmware initializes them).
    pub fn with_boot_counts(counts: StepTriple) -> Self {
        let slots: [AtomicU32; SLOT_COUNT] = std::array::from_fn(|_| AtomicU32::new(0));
        let shared = Arc::new(SimShared {
            slots,
            state: Mutex::new(EdgeState {
                latched: true,
                armed: true,
                moving: false,
            }),
            cv: Condvar::new(),
        });

        for axis in Axis::ALL {
            let i = axis.index();
            shared.set_slot(SLOT_LIVE_BASE + i, counts[i]);
            shared.set_slot(SLOT_TARGET_BASE + i, counts[i]);
        }
        shared.set_slot(SLOT_STATUS, 1);

        Self { shared }
    }

    /// Split into the command side and the monitor side.
    pub fn split(self) -> (SimCommander, SimTap) {
        (
            SimCommander {
                shared: self.shared.clone(),
            },
            SimTap {
                shared: self.shared,
            },
        )
    }
}

impl Default for SimEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Command-side handle to the simulated engine.
pub struct SimCommander {
    shared: Arc<SimShared>,
}

/// Monitor-side handle to the simulated engine.
pub struct SimTap {
    shared: Arc<SimShared>,
}

impl SimTap {
    /// Raw slot inspection for tests.
    pub fn raw_slot(&self, idx: usize) -> u32 {
        self.shared.slot(idx)
    }
}

impl LiveSteps for SimCommander {
    fn live_steps(&self) -> StepTriple {
        self.shared.read_live()
    }
}

impl LiveSteps for SimTap {
    fn live_steps(&self) -> StepTriple {
        self.shared.read_live()
    }
}

impl StepEngine for SimCommander {
    fn write_command(&mut self, cmd: &StepCommand) -> Result<(), PruError> {
        for axis in Axis::ALL {
            let i = axis.index();
            self.shared.set_slot(SLOT_TARGET_BASE + i, cmd.targets[i]);
            self.shared
                .set_slot(SLOT_HALF_PERIOD_BASE + i, cmd.pulses[i].slot_value());
        }
        Ok(())
    }

    fn release(&mut self) -> Result<(), PruError> {
        self.shared.set_slot(SLOT_STATUS, 0);
        let mut state = self.shared.state.lock().unwrap();
        state.moving = true;
        self.shared.cv.notify_all();
        Ok(())
    }

    fn wait_ready(&mut self, timeout: Duration) -> Result<bool, PruError> {
        let mut state = self.shared.state.lock().unwrap();

        // Lazy completion: by the time anyone waits, the move is done.
        if state.moving {
            self.shared.complete_move(&mut state);
        }
        if state.armed && state.latched {
            state.armed = false;
            return Ok(true);
        }

        let (mut state, _timed_out) = self
            .shared
            .cv
            .wait_timeout(state, timeout)
            .unwrap();
        if state.moving {
            self.shared.complete_move(&mut state);
        }
        if state.armed && state.latched {
            state.armed = false;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn clear_event(&mut self) -> Result<(), PruError> {
        self.shared.state.lock().unwrap().latched = false;
        Ok(())
    }

    fn rearm(&mut self) -> Result<(), PruError> {
        self.shared.state.lock().unwrap().armed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mill_common::consts::HOLD_HALF_PERIOD;
    use mill_common::types::AxisPulse;

    const TICK: Duration = Duration::from_millis(1);

    #[test]
    fn boot_readiness_delivered_once() {
        let (mut cmd, _tap) = SimEngine::new().split();
        assert!(cmd.wait_ready(TICK).unwrap());
        // Arm was consumed; no delivery until rearm.
        assert!(!cmd.wait_ready(TICK).unwrap());
    }

    #[test]
    fn stale_latch_retriggers_when_not_cleared() {
        let (mut cmd, _tap) = SimEngine::new().split();
        assert!(cmd.wait_ready(TICK).unwrap());
        // Rearm without clearing: the boot edge is still latched.
        cmd.rearm().unwrap();
        assert!(cmd.wait_ready(TICK).unwrap());
    }

    #[test]
    fn cleared_but_unarmed_line_never_delivers() {
        let (mut cmd, _tap) = SimEngine::new().split();
        assert!(cmd.wait_ready(TICK).unwrap());
        cmd.clear_event().unwrap();
        assert!(!cmd.wait_ready(TICK).unwrap());
    }

    #[test]
    fn release_runs_the_move_and_signals_readiness() {
        let (mut cmd, tap) = SimEngine::with_boot_counts([1000, 1000, 1000]).split();
        assert!(cmd.wait_ready(TICK).unwrap());

        cmd.write_command(&StepCommand {
            targets: [1500, 1000, 1000],
            pulses: [
                AxisPulse::HalfPeriod(1519),
                AxisPulse::Held,
                AxisPulse::Held,
            ],
        })
        .unwrap();

        // Command written but not released: nothing moves yet.
        assert_eq!(tap.raw_slot(SLOT_TARGET_BASE), 1500);
        assert_eq!(tap.raw_slot(SLOT_HALF_PERIOD_BASE), 1519);
        assert_eq!(tap.raw_slot(SLOT_HALF_PERIOD_BASE + 1), HOLD_HALF_PERIOD);
        assert_eq!(cmd.live_steps(), [1000, 1000, 1000]);

        cmd.release().unwrap();
        assert_eq!(tap.raw_slot(SLOT_STATUS), 0);

        cmd.clear_event().unwrap();
        cmd.rearm().unwrap();
        assert!(cmd.wait_ready(TICK).unwrap());

        assert_eq!(cmd.live_steps(), [1500, 1000, 1000]);
        assert_eq!(tap.live_steps(), [1500, 1000, 1000]);
        // Firmware is idle again.
        assert_eq!(tap.raw_slot(SLOT_STATUS), 1);
    }

    #[test]
    fn boot_counts_default_to_mid_range() {
        let (cmd, tap) = SimEngine::new().split();
        assert_eq!(cmd.live_steps(), [BOOT_STEP_COUNT; 3]);
        assert_eq!(tap.raw_slot(SLOT_TARGET_BASE), BOOT_STEP_COUNT);
        assert_ne!(tap.raw_slot(SLOT_STATUS), 0);
    }
}
