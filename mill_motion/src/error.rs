//! Run-level error taxonomy.
//!
//! Every variant is fatal to the run: a segment that cannot be planned is
//! never skipped (skipping would change the executed path without operator
//! confirmation), and transport or protocol failures stop the machine.
//! All errors propagate to the process boundary for operator visibility.

use thiserror::Error;

use mill_pru::PruError;

use crate::kinematics::KinematicsError;
use crate::sequencer::SequencerState;

/// Fatal errors surfaced by the motion sequencer.
#[derive(Debug, Error)]
pub enum MotionError {
    /// Segment planning failed (degenerate geometry or a value that does
    /// not fit the firmware's registers).
    #[error("segment planning failed: {0}")]
    Kinematics(#[from] KinematicsError),

    /// The co-processor transport failed.
    #[error("co-processor transport failed: {0}")]
    Pru(#[from] PruError),

    /// A readiness signal arrived in a state that does not expect one,
    /// e.g. after the toolpath completed.
    #[error("protocol violation: readiness signal while {state:?}")]
    UnexpectedReady { state: SequencerState },

    /// The co-processor never signalled readiness within the configured
    /// bound.
    #[error("co-processor not ready within {waited_ms} ms")]
    ReadyTimeout { waited_ms: u64 },
}
