//! Firmware installation through the remoteproc sysfs interface.
//!
//! The PRU core is managed by the kernel's remoteproc framework: writing
//! an image name to the `firmware` attribute selects it (the kernel
//! resolves it against its firmware search path), and writing `start` /
//! `stop` to the `state` attribute boots or halts the core. None of the
//! shared-RAM slots are valid until the image is running.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::PruError;

/// Install the named image and start the PRU core.
pub fn load_firmware(rproc_dir: &Path, image: &str) -> Result<(), PruError> {
    let firmware_attr = rproc_dir.join("firmware");
    fs::write(&firmware_attr, image).map_err(|e| PruError::FirmwareLoad {
        image: image.to_string(),
        reason: format!("writing {}: {e}", firmware_attr.display()),
    })?;

    let state_attr = rproc_dir.join("state");
    fs::write(&state_attr, "start").map_err(|e| PruError::FirmwareLoad {
        image: image.to_string(),
        reason: format!("starting via {}: {e}", state_attr.display()),
    })?;

    info!("firmware '{}' started via {}", image, rproc_dir.display());
    Ok(())
}

/// Halt the PRU core. Best-effort shutdown companion to [`load_firmware`].
pub fn stop_firmware(rproc_dir: &Path) -> Result<(), PruError> {
    let state_attr = rproc_dir.join("state");
    fs::write(&state_attr, "stop").map_err(|e| PruError::FirmwareLoad {
        image: String::new(),
        reason: format!("stopping via {}: {e}", state_attr.display()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_image_name_then_start() {
        let tmp = TempDir::new().unwrap();
        load_firmware(tmp.path(), "cnc.bin").unwrap();

        assert_eq!(fs::read_to_string(tmp.path().join("firmware")).unwrap(), "cnc.bin");
        assert_eq!(fs::read_to_string(tmp.path().join("state")).unwrap(), "start");
    }

    #[test]
    fn stop_writes_state() {
        let tmp = TempDir::new().unwrap();
        stop_firmware(tmp.path()).unwrap();
        assert_eq!(fs::read_to_string(tmp.path().join("state")).unwrap(), "stop");
    }

    #[test]
    fn missing_rproc_dir_is_load_failure() {
        let tmp = TempDir::new().unwrap();
        let gone = tmp.path().join("no_such_rproc");
        let err = load_firmware(&gone, "cnc.bin").unwrap_err();
        match err {
            PruError::FirmwareLoad { image, .. } => assert_eq!(image, "cnc.bin"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
