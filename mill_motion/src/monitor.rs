//! Fixed-period position and speed monitoring.
//!
//! Samples the live step counters on its own timer, completely decoupled
//! from the sequencer's handshake. Readings are advisory: a sample torn
//! across a firmware update is tolerated, and nothing here feeds back
//! into control decisions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::info;

use mill_common::types::Axis;
use mill_common::units::StepScale;
use mill_pru::LiveSteps;

use crate::origin::OriginLatch;

/// One status sample: origin-relative position and a finite-difference
/// speed estimate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatusRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub speed_mm_s: f64,
}

/// Destination for status samples.
///
/// The production sink logs one line per sample; tests collect records.
pub trait StatusSink {
    fn publish(&mut self, record: &StatusRecord);
}

/// Logs each sample as a single human-readable line.
#[derive(Debug, Default)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn publish(&mut self, record: &StatusRecord) {
        info!(
            "pos {:8.2} {:8.2} {:8.2} mm  speed {:5.1} mm/s",
            record.x, record.y, record.z, record.speed_mm_s
        );
    }
}

/// Periodic sampler over a [`LiveSteps`] handle.
pub struct PositionMonitor<L: LiveSteps, S: StatusSink> {
    live: L,
    sink: S,
    scale: StepScale,
    origin: OriginLatch,
    period: Duration,
    /// Previous sample position, for the finite-difference speed.
    last: Option<[f64; 3]>,
}

impl<L: LiveSteps, S: StatusSink> PositionMonitor<L, S> {
    pub fn new(
        live: L,
        sink: S,
        scale: StepScale,
        origin: OriginLatch,
        period: Duration,
    ) -> Self {
        Self {
            live,
            sink,
            scale,
            origin,
            period,
            last: None,
        }
    }

    /// Take one sample and publish it.
    ///
    /// Until the sequencer has captured the origin there is no reference
    /// frame; a zero record is published and no speed history accumulates.
    pub fn sample(&mut self) -> StatusRecord {
        let Some(origin) = self.origin.get() else {
            let record = StatusRecord::default();
            self.sink.publish(&record);
            return record;
        };

        let raw = self.live.live_steps();
        let mut pos = [0.0f64; 3];
        for axis in Axis::ALL {
            let i = axis.index();
            pos[i] = self.scale.relative_mm(origin[i], raw[i]);
        }

        // Displacement since the previous tick, scaled by the nominal
        // period. The first converted sample has no history and reports
        // zero speed.
        let speed_mm_s = match self.last {
            Some(prev) => {
                let dist = pos
                    .iter()
                    .zip(prev.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>()
                    .sqrt();
                dist / self.period.as_secs_f64()
            }
            None => 0.0,
        };
        self.last = Some(pos);

        let record = StatusRecord {
            x: pos[0],
            y: pos[1],
            z: pos[2],
            speed_mm_s,
        };
        self.sink.publish(&record);
        record
    }

    /// Sample on the configured period until shutdown.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        while !shutdown.load(Ordering::Relaxed) {
            let started = Instant::now();
            self.sample();
            if let Some(remaining) = self.period.checked_sub(started.elapsed()) {
                std::thread::sleep(remaining);
            }
        }
    }
}
