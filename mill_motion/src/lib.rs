//! # Mill Motion Library
//!
//! The motion-sequencing core for the PRU-driven 3-axis mill. Turns an
//! ordered list of millimeter waypoints into correctly scaled, correctly
//! queued step/timing commands, synchronized with the co-processor's
//! readiness signal, while a decoupled monitor samples live position for
//! status reporting.
//!
//! ## Components
//!
//! 1. **Kinematics** — pure per-segment planning: step targets and pulse
//!    half-periods from a waypoint pair and a linear speed
//! 2. **Sequencer** — the handshake state machine driving the engine:
//!    origin capture, arm, dwell, release, re-arm
//! 3. **Monitor** — fixed-period position/speed sampling, advisory only
//!
//! All mutable run state lives inside [`sequencer::MotionSequencer`];
//! the only cross-thread artifacts are the write-once
//! [`origin::OriginLatch`] and the shutdown flag.

pub mod error;
pub mod kinematics;
pub mod monitor;
pub mod origin;
pub mod sequencer;
