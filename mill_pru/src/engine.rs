//! Co-processor interface traits.
//!
//! The sequencer drives the PRU through [`StepEngine`]; the position
//! monitor samples it through [`LiveSteps`]. Splitting the two lets the
//! monitor read shared RAM concurrently with the sequencer's handshake —
//! monitor reads are advisory and tolerate tearing.

use std::time::Duration;

use mill_common::types::{StepCommand, StepTriple};

use crate::error::PruError;

/// Read-only view of the live step counters.
pub trait LiveSteps {
    /// Read the live absolute step count for all three axes (slots 1-3).
    ///
    /// The firmware updates these continuously; a read concurrent with an
    /// update may mix old and new axis values. Callers must treat the
    /// result as best-effort.
    fn live_steps(&self) -> StepTriple;
}

/// Command-side interface to the step-pulse engine.
///
/// # Handshake Contract
///
/// | Operation       | Ordering requirement                                |
/// |-----------------|-----------------------------------------------------|
/// | `write_command` | All command slots; never touches the status flag    |
/// | `release`       | Strictly after `write_command` for the same segment |
/// | `clear_event`   | Before `rearm`, to drop stale latched state         |
/// | `rearm`         | Before the next `wait_ready`                        |
///
/// The firmware only begins consuming a command once `release` clears the
/// status flag, so the write/release order is what makes a multi-slot
/// command atomic from its perspective. The readiness line is
/// edge-triggered: a latched event that is not cleared re-triggers the
/// next wait immediately, and a line that is not re-armed never delivers.
pub trait StepEngine: LiveSteps + Send {
    /// Write every field of a step command into shared RAM
    /// (targets into slots 4-6, half-periods into slots 7-9).
    fn write_command(&mut self, cmd: &StepCommand) -> Result<(), PruError>;

    /// Clear the status/busy flag (slot 0), releasing the firmware to
    /// consume the previously written command.
    fn release(&mut self) -> Result<(), PruError>;

    /// Block up to `timeout` for a readiness edge.
    ///
    /// Returns `Ok(true)` when an edge was delivered, `Ok(false)` on
    /// timeout.
    fn wait_ready(&mut self, timeout: Duration) -> Result<bool, PruError>;

    /// Drop any latched readiness state left over from the previous edge.
    fn clear_event(&mut self) -> Result<(), PruError>;

    /// Re-enable readiness delivery for the next edge.
    fn rearm(&mut self) -> Result<(), PruError>;
}
