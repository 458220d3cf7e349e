//! UIO-backed PRU device.
//!
//! The kernel exposes the PRU subsystem as a UIO device: mapping page 0
//! yields the shared data RAM holding the command slot table, and the
//! file descriptor doubles as the interrupt interface — a blocking read
//! returns the event counter when the PRU signals readiness, and writing
//! `1` re-enables delivery after the kernel masks the line.
//!
//! The device is opened once and shared between the command side
//! ([`UioCommander`]) and the monitor side ([`UioLiveTap`]); slot access
//! is volatile, with no locking — see the contract notes on
//! [`StepEngine`](crate::engine::StepEngine).

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{Ordering, fence};
use std::time::Duration;

use memmap2::{MmapMut, MmapOptions};
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::{debug, info};

use mill_common::consts::{
    SHARED_RAM_BYTES, SLOT_COUNT, SLOT_HALF_PERIOD_BASE, SLOT_LIVE_BASE, SLOT_STATUS,
    SLOT_TARGET_BASE,
};
use mill_common::types::{Axis, StepCommand, StepTriple};

use crate::engine::{LiveSteps, StepEngine};
use crate::error::PruError;

/// One opened UIO device: the interrupt fd plus the mapped slot table.
pub struct UioDevice {
    file: File,
    base: *mut u32,
    /// Keeps the mapping alive; slot access goes through `base`.
    _map: MmapMut,
}

// Slot access is volatile through a stable pointer; concurrent readers
// tolerate torn values and the write/release ordering is handled by the
// commander. The mapping itself never moves.
unsafe impl Send for UioDevice {}
unsafe impl Sync for UioDevice {}

impl UioDevice {
    /// Open the UIO device and map the shared-RAM window.
    ///
    /// The fd is opened nonblocking so that event reads can be used both
    /// for draining stale state and, combined with `poll`, for bounded
    /// readiness waits.
    pub fn open(path: &Path) -> Result<Arc<Self>, PruError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|e| PruError::DeviceOpen {
                path: path.to_path_buf(),
                source: e,
            })?;

        let mut map = unsafe { MmapOptions::new().len(SHARED_RAM_BYTES).map_mut(&file) }
            .map_err(PruError::Map)?;
        let base = map.as_mut_ptr() as *mut u32;

        info!("UIO device {} opened, {} bytes mapped", path.display(), SHARED_RAM_BYTES);

        Ok(Arc::new(Self {
            file,
            base,
            _map: map,
        }))
    }

    #[inline]
    fn read_slot(&self, slot: usize) -> u32 {
        debug_assert!(slot < SLOT_COUNT);
        unsafe { std::ptr::read_volatile(self.base.add(slot)) }
    }

    #[inline]
    fn write_slot(&self, slot: usize, value: u32) {
        debug_assert!(slot < SLOT_COUNT);
        unsafe { std::ptr::write_volatile(self.base.add(slot), value) }
    }

    fn read_live(&self) -> StepTriple {
        let mut live = [0u32; 3];
        for axis in Axis::ALL {
            live[axis.index()] = self.read_slot(SLOT_LIVE_BASE + axis.index());
        }
        live
    }
}

/// Open a UIO device and split it into command and monitor handles.
pub fn open_pair(path: &Path) -> Result<(UioCommander, UioLiveTap), PruError> {
    let dev = UioDevice::open(path)?;
    Ok((
        UioCommander { dev: dev.clone() },
        UioLiveTap { dev },
    ))
}

/// Command-side handle: slot writes plus the event line.
pub struct UioCommander {
    dev: Arc<UioDevice>,
}

/// Monitor-side handle: live counter reads only.
pub struct UioLiveTap {
    dev: Arc<UioDevice>,
}

impl LiveSteps for UioCommander {
    fn live_steps(&self) -> StepTriple {
        self.dev.read_live()
    }
}

impl LiveSteps for UioLiveTap {
    fn live_steps(&self) -> StepTriple {
        self.dev.read_live()
    }
}

impl StepEngine for UioCommander {
    fn write_command(&mut self, cmd: &StepCommand) -> Result<(), PruError> {
        for axis in Axis::ALL {
            let i = axis.index();
            self.dev.write_slot(SLOT_TARGET_BASE + i, cmd.targets[i]);
            self.dev.write_slot(SLOT_HALF_PERIOD_BASE + i, cmd.pulses[i].slot_value());
        }
        Ok(())
    }

    fn release(&mut self) -> Result<(), PruError> {
        // The command slots must be visible to the other bus master before
        // the go flag.
        fence(Ordering::Release);
        self.dev.write_slot(SLOT_STATUS, 0);
        Ok(())
    }

    fn wait_ready(&mut self, timeout: Duration) -> Result<bool, PruError> {
        let mut fds = [PollFd::new(self.dev.file.as_fd(), PollFlags::POLLIN)];
        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        let n = poll(&mut fds, PollTimeout::from(millis))
            .map_err(|e| PruError::EventWait(e.into()))?;
        if n == 0 {
            return Ok(false);
        }

        let mut count = [0u8; 4];
        match (&self.dev.file).read_exact(&mut count) {
            Ok(()) => {
                debug!("readiness event #{}", u32::from_ne_bytes(count));
                Ok(true)
            }
            // Raced with another consumer of the counter; treat as timeout.
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(PruError::EventWait(e)),
        }
    }

    fn clear_event(&mut self) -> Result<(), PruError> {
        // Drain any counter value latched since the last read, so a stale
        // edge cannot satisfy the next wait.
        let mut count = [0u8; 4];
        loop {
            match (&self.dev.file).read(&mut count) {
                Ok(0) => return Ok(()),
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(PruError::EventWait(e)),
            }
        }
    }

    fn rearm(&mut self) -> Result<(), PruError> {
        (&self.dev.file)
            .write_all(&1u32.to_ne_bytes())
            .map_err(PruError::EventRearm)
    }
}
