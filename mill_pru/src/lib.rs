//! # Mill PRU Transport
//!
//! Host-side interface to the PRU co-processor that generates step pulses
//! for the mill's three axes. The PRU is an opaque executable image; the
//! host talks to it through a fixed-layout shared-RAM slot table and an
//! edge-triggered readiness interrupt.
//!
//! Two backends implement the same [`engine`] traits:
//!
//! - [`uio`] — the real device: `/dev/uioN` shared RAM + interrupt line,
//!   firmware installed through the remoteproc sysfs interface.
//! - [`sim`] — a deterministic in-process model for hardware-free runs
//!   and integration tests.

pub mod engine;
pub mod error;
pub mod firmware;
pub mod sim;
pub mod uio;

pub use engine::{LiveSteps, StepEngine};
pub use error::PruError;
