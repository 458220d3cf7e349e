//! The motion sequencer state machine.
//!
//! Owns the waypoint queue, the current index, the origin capture and the
//! co-processor handshake. Driven by the readiness signal in a blocking
//! wait-then-handle loop:
//!
//! `AwaitingOrigin → Idle → Armed → Dwelling → Idle → … → Done`
//!
//! - The first readiness signal only captures the origin (waypoint 0 is
//!   the implicit resting position, never commanded).
//! - Every later signal plans the segment `(waypoints[i-1], waypoints[i])`,
//!   writes all command slots, dwells, and only then clears the busy flag —
//!   the write/release order is what makes the multi-slot command atomic
//!   from the firmware's perspective.
//! - Planning errors abort the run; a skipped waypoint would silently
//!   change the executed path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use mill_common::config::{ConfigError, MillConfig};
use mill_common::types::{StepTriple, Waypoint};
use mill_common::units::StepScale;
use mill_pru::StepEngine;

use crate::error::MotionError;
use crate::kinematics::plan_segment;
use crate::origin::OriginLatch;

/// Granularity of cancellable waits.
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Sequencer lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    /// Waiting for the first readiness signal to capture the origin.
    AwaitingOrigin,
    /// Origin known, waiting for the next readiness signal.
    Idle,
    /// A segment command is written but the firmware is not yet released.
    Armed,
    /// Settling pause between arming and release.
    Dwelling,
    /// Toolpath exhausted; no further commands will be issued.
    Done,
}

/// What a readiness signal produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadyOutcome {
    /// First signal: origin captured, no command issued.
    OriginCaptured(StepTriple),
    /// Segment `index` planned and written (not yet released).
    SegmentArmed {
        index: usize,
        /// Wall-clock time since the previous release; diagnostic only.
        travel: Option<Duration>,
    },
}

/// Per-run counters, diagnostic only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequencerStats {
    /// Segments written and released.
    pub segments_issued: u64,
    /// Travel time of the most recent completed segment.
    pub last_travel: Option<Duration>,
    /// Longest observed segment travel time.
    pub max_travel: Option<Duration>,
}

impl SequencerStats {
    fn record_travel(&mut self, travel: Duration) {
        self.last_travel = Some(travel);
        if self.max_travel.is_none_or(|m| travel > m) {
            self.max_travel = Some(travel);
        }
    }
}

/// The sequencer: all mutable run state in one place, engine owned.
pub struct MotionSequencer<E: StepEngine> {
    engine: E,
    waypoints: Vec<Waypoint>,
    speed_mm_s: f64,
    scale: StepScale,
    ns_per_cycle: u32,
    dwell: Duration,
    ready_timeout: Duration,
    origin: OriginLatch,
    state: SequencerState,
    /// Index of the next waypoint to command. Monotonically increasing.
    next_index: usize,
    /// Set at each release; basis for the travel diagnostic.
    segment_started: Option<Instant>,
    stats: SequencerStats,
}

impl<E: StepEngine> MotionSequencer<E> {
    /// Build a sequencer over a validated configuration.
    pub fn new(engine: E, config: &MillConfig, origin: OriginLatch) -> Result<Self, ConfigError> {
        Ok(Self {
            engine,
            waypoints: config.toolpath.waypoints.clone(),
            speed_mm_s: config.motion.speed_mm_s,
            scale: config.step_scale()?,
            ns_per_cycle: config.pru.ns_per_cycle,
            dwell: config.dwell(),
            ready_timeout: config.ready_timeout(),
            origin,
            state: SequencerState::AwaitingOrigin,
            next_index: 0,
            segment_started: None,
            stats: SequencerStats::default(),
        })
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn stats(&self) -> SequencerStats {
        self.stats
    }

    /// Handle one readiness signal.
    ///
    /// Does not release the firmware — release happens in
    /// [`finish_cycle`](Self::finish_cycle), after the dwell, so the busy
    /// flag is cleared strictly after every command slot is written.
    pub fn handle_ready(&mut self, now: Instant) -> Result<ReadyOutcome, MotionError> {
        match (self.state, self.origin.get()) {
            (SequencerState::AwaitingOrigin, _) => {
                let origin = self.engine.live_steps();
                if !self.origin.capture(origin) {
                    warn!("origin latch was already set; keeping first capture");
                }
                // Waypoint 0 is where the machine already rests.
                self.next_index = 1;
                self.state = SequencerState::Idle;
                Ok(ReadyOutcome::OriginCaptured(origin))
            }
            (SequencerState::Idle, Some(origin)) => {
                let travel = self.segment_started.map(|started| now - started);
                if let Some(t) = travel {
                    self.stats.record_travel(t);
                }

                let i = self.next_index;
                let cmd = plan_segment(
                    &self.waypoints[i - 1],
                    &self.waypoints[i],
                    self.speed_mm_s,
                    origin,
                    &self.scale,
                    self.ns_per_cycle,
                )?;
                self.engine.write_command(&cmd)?;
                self.next_index += 1;
                self.state = SequencerState::Armed;
                Ok(ReadyOutcome::SegmentArmed { index: i, travel })
            }
            (state, _) => Err(MotionError::UnexpectedReady { state }),
        }
    }

    /// Complete the handshake for the current cycle: release the firmware,
    /// clear the latched event, re-arm delivery, and stamp the new
    /// segment start. Transitions to `Idle`, or `Done` when the toolpath
    /// is exhausted.
    pub fn finish_cycle(&mut self) -> Result<(), MotionError> {
        self.engine.release()?;
        self.engine.clear_event()?;
        self.engine.rearm()?;
        self.segment_started = Some(Instant::now());

        if self.state == SequencerState::Dwelling || self.state == SequencerState::Armed {
            self.stats.segments_issued += 1;
        }
        self.state = if self.next_index < self.waypoints.len() {
            SequencerState::Idle
        } else {
            SequencerState::Done
        };
        Ok(())
    }

    /// Drive the full toolpath. Returns when the last segment has been
    /// released, on shutdown request, or on the first fatal error.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), MotionError> {
        info!(
            "sequencer starting: {} waypoints, {} mm/s, dwell {} ms",
            self.waypoints.len(),
            self.speed_mm_s,
            self.dwell.as_millis()
        );

        // Register interest before the firmware's boot edge can fire.
        self.engine.rearm()?;

        while self.state != SequencerState::Done {
            if !self.wait_ready(shutdown)? {
                info!("shutdown requested, stopping between segments");
                return Ok(());
            }

            match self.handle_ready(Instant::now())? {
                ReadyOutcome::OriginCaptured(origin) => {
                    info!(
                        "origin captured: [{}, {}, {}]",
                        origin[0], origin[1], origin[2]
                    );
                }
                ReadyOutcome::SegmentArmed { index, travel } => {
                    if let Some(t) = travel {
                        info!("previous move took {} ms", t.as_millis());
                    }
                    debug!(
                        "segment {} armed: {:?} -> {:?}",
                        index,
                        self.waypoints[index - 1],
                        self.waypoints[index]
                    );
                    if !self.settle(shutdown) {
                        info!("shutdown requested, cancelling pending dwell");
                        return Ok(());
                    }
                }
            }

            self.finish_cycle()?;
        }

        info!(
            "toolpath complete: {} segments issued",
            self.stats.segments_issued
        );
        Ok(())
    }

    /// Bounded, cancellable wait for the next readiness signal.
    ///
    /// `Ok(true)` on a delivered edge, `Ok(false)` on shutdown,
    /// `Err(ReadyTimeout)` if the co-processor stays silent past the
    /// configured bound.
    fn wait_ready(&mut self, shutdown: &AtomicBool) -> Result<bool, MotionError> {
        let deadline = Instant::now() + self.ready_timeout;
        loop {
            if shutdown.load(Ordering::Relaxed) {
                return Ok(false);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(MotionError::ReadyTimeout {
                    waited_ms: self.ready_timeout.as_millis() as u64,
                });
            }
            let slice = WAIT_SLICE.min(deadline - now);
            if self.engine.wait_ready(slice)? {
                return Ok(true);
            }
        }
    }

    /// Settling pause between arming and release. Returns `false` if a
    /// shutdown request cancelled it.
    fn settle(&mut self, shutdown: &AtomicBool) -> bool {
        self.state = SequencerState::Dwelling;
        let deadline = Instant::now() + self.dwell;
        loop {
            if shutdown.load(Ordering::Relaxed) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(WAIT_SLICE.min(deadline - now));
        }
    }
}
