//! Transport error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the co-processor transport.
#[derive(Debug, Error)]
pub enum PruError {
    /// The UIO device could not be opened.
    #[error("failed to open UIO device {path}: {source}")]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Mapping the shared-RAM window failed.
    #[error("failed to map PRU shared RAM: {0}")]
    Map(std::io::Error),

    /// Installing or starting the firmware image failed.
    #[error("firmware load failed for '{image}': {reason}")]
    FirmwareLoad { image: String, reason: String },

    /// Waiting on or consuming the readiness event failed.
    #[error("readiness event wait failed: {0}")]
    EventWait(std::io::Error),

    /// Re-enabling readiness delivery failed.
    #[error("readiness event rearm failed: {0}")]
    EventRearm(std::io::Error),
}
