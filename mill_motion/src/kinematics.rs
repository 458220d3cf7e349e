//! Per-segment kinematics planning.
//!
//! A segment is one straight-line motion between two consecutive
//! waypoints at a constant linear speed. Planning distributes the
//! requested speed across the axes in proportion to each axis's share of
//! the total displacement, so all axes arrive simultaneously, and turns
//! each axis's speed into a pulse half-period in PRU clock cycles.
//!
//! Pure and stateless; nothing here touches shared RAM.

use thiserror::Error;

use mill_common::types::{Axis, AxisPulse, StepCommand, StepTriple, Waypoint};
use mill_common::units::StepScale;

/// Errors from planning a single segment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KinematicsError {
    /// The segment has identical endpoints. The speed-scaling formula
    /// divides by the segment length, so this must be rejected before a
    /// non-finite value can reach a hardware register.
    #[error("degenerate segment: {from:?} -> {to:?} has zero length")]
    DegenerateSegment { from: Waypoint, to: Waypoint },

    /// The axis does not move in this segment. Surfaced by the per-axis
    /// computation; the planner converts it into a held axis rather than
    /// an undefined period.
    #[error("axis {axis} has zero speed in this segment")]
    ZeroAxisSpeed { axis: Axis },

    /// The absolute step target does not fit the firmware's unsigned
    /// 32-bit counter.
    #[error("axis {axis} step target {steps} outside counter range")]
    TargetOutOfRange { axis: Axis, steps: i64 },

    /// The half-period does not fit the firmware's 32-bit period register
    /// (the axis would move too slowly to express).
    #[error("axis {axis} half-period {cycles:.0} cycles exceeds register range")]
    HalfPeriodOutOfRange { axis: Axis, cycles: f64 },
}

/// Plan the command for one segment.
///
/// `origin` is the counter snapshot from the first readiness signal;
/// targets are emitted as absolute counter values (`origin + scaled
/// waypoint`), never deltas. Axes with no displacement are planned as
/// [`AxisPulse::Held`]; a segment where *all* axes are stationary is a
/// [`KinematicsError::DegenerateSegment`].
pub fn plan_segment(
    from: &Waypoint,
    to: &Waypoint,
    speed_mm_s: f64,
    origin: StepTriple,
    scale: &StepScale,
    ns_per_cycle: u32,
) -> Result<StepCommand, KinematicsError> {
    let delta = to.delta_from(from);
    let length = delta.iter().map(|d| d * d).sum::<f64>().sqrt();
    if length == 0.0 {
        return Err(KinematicsError::DegenerateSegment {
            from: *from,
            to: *to,
        });
    }

    let mut targets = [0u32; 3];
    let mut pulses = [AxisPulse::Held; 3];
    for axis in Axis::ALL {
        let i = axis.index();
        targets[i] = axis_target(origin[i], to.coord(axis), scale, axis)?;
        pulses[i] = match axis_pulse(delta[i], length, speed_mm_s, scale, ns_per_cycle, axis) {
            Ok(cycles) => AxisPulse::HalfPeriod(cycles),
            Err(KinematicsError::ZeroAxisSpeed { .. }) => AxisPulse::Held,
            Err(e) => return Err(e),
        };
    }

    Ok(StepCommand { targets, pulses })
}

/// Absolute step target for one axis.
fn axis_target(
    origin: u32,
    mm: f64,
    scale: &StepScale,
    axis: Axis,
) -> Result<u32, KinematicsError> {
    let steps = origin as i64 + scale.mm_to_steps(mm);
    u32::try_from(steps).map_err(|_| KinematicsError::TargetOutOfRange { axis, steps })
}

/// Pulse half-period for one axis, in PRU clock cycles.
///
/// The axis speed is the linear speed scaled by this axis's share of the
/// displacement. Inverting speed × steps/mm gives seconds per step; one
/// step is one full pulse period, and the firmware programs half-periods.
fn axis_pulse(
    delta_mm: f64,
    length_mm: f64,
    speed_mm_s: f64,
    scale: &StepScale,
    ns_per_cycle: u32,
    axis: Axis,
) -> Result<u32, KinematicsError> {
    let axis_speed = speed_mm_s / length_mm * delta_mm.abs();
    if axis_speed == 0.0 {
        return Err(KinematicsError::ZeroAxisSpeed { axis });
    }

    let steps_per_sec = axis_speed * scale.steps_per_mm();
    let cycle_secs = ns_per_cycle as f64 * 1e-9;
    let half_period = (1.0 / steps_per_sec / cycle_secs / 2.0).round();
    if !half_period.is_finite() || half_period > u32::MAX as f64 {
        return Err(KinematicsError::HalfPeriodOutOfRange {
            axis,
            cycles: half_period,
        });
    }

    // A very fast axis can round to zero cycles; the register needs at
    // least one.
    Ok((half_period as u32).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mill_common::consts::BOOT_STEP_COUNT;

    const NS_PER_CYCLE: u32 = 180;

    fn scale() -> StepScale {
        StepScale::from_drive(400 * 16, 0.7).unwrap()
    }

    fn wp(x: f64, y: f64, z: f64) -> Waypoint {
        Waypoint::new(x, y, z)
    }

    /// Expected half-period for a given axis speed, straight from the
    /// definition.
    fn expected_half_period(axis_speed: f64) -> u32 {
        let steps_per_sec = axis_speed * scale().steps_per_mm();
        (1.0 / steps_per_sec / (NS_PER_CYCLE as f64 * 1e-9) / 2.0).round() as u32
    }

    #[test]
    fn straight_x_segment() {
        let origin = [1000, 1000, 1000];
        let cmd = plan_segment(&wp(0.0, 0.0, 0.0), &wp(100.0, 0.0, 0.0), 2.0, origin, &scale(), NS_PER_CYCLE)
            .unwrap();

        assert_eq!(cmd.targets[0], 1000 + scale().mm_to_steps(100.0) as u32);
        assert_eq!(cmd.targets[1], 1000);
        assert_eq!(cmd.targets[2], 1000);

        // The whole requested speed lands on X.
        assert_eq!(cmd.pulses[0], AxisPulse::HalfPeriod(expected_half_period(2.0)));
        assert_eq!(cmd.pulses[1], AxisPulse::Held);
        assert_eq!(cmd.pulses[2], AxisPulse::Held);
    }

    #[test]
    fn axis_roles_swap_with_direction() {
        let origin = [1000, 1000, 1000];
        let cmd = plan_segment(&wp(100.0, 0.0, 0.0), &wp(100.0, 100.0, 0.0), 2.0, origin, &scale(), NS_PER_CYCLE)
            .unwrap();

        assert_eq!(cmd.targets[0], 1000 + scale().mm_to_steps(100.0) as u32);
        assert_eq!(cmd.targets[1], 1000 + scale().mm_to_steps(100.0) as u32);
        assert!(cmd.pulses[0].is_held());
        assert!(!cmd.pulses[1].is_held());
        assert!(cmd.pulses[2].is_held());
    }

    #[test]
    fn identical_endpoints_are_degenerate() {
        let p = wp(42.0, 7.0, -3.0);
        let err = plan_segment(&p, &p, 2.0, [0; 3], &scale(), NS_PER_CYCLE).unwrap_err();
        assert!(matches!(err, KinematicsError::DegenerateSegment { .. }));
    }

    #[test]
    fn diagonal_speed_split_is_symmetric() {
        let cmd = plan_segment(&wp(0.0, 0.0, 0.0), &wp(100.0, 100.0, 0.0), 2.0, [0; 3], &scale(), NS_PER_CYCLE)
            .unwrap();

        // Equal displacement, equal per-axis speed (2/sqrt(2) mm/s each).
        assert_eq!(cmd.pulses[0], cmd.pulses[1]);
        let expected = expected_half_period(2.0 / 2f64.sqrt());
        assert_eq!(cmd.pulses[0], AxisPulse::HalfPeriod(expected));
        assert!(cmd.pulses[2].is_held());
    }

    #[test]
    fn moving_axes_arrive_simultaneously() {
        // 100 mm in X against 50 mm in Y: X steps twice as fast, so both
        // finish together (within one cycle of rounding per pulse).
        let from = wp(0.0, 0.0, 0.0);
        let to = wp(100.0, 50.0, 0.0);
        let cmd = plan_segment(&from, &to, 2.0, [0; 3], &scale(), NS_PER_CYCLE).unwrap();

        let duration = |axis: Axis| -> f64 {
            let steps = scale().mm_to_steps(to.coord(axis)).abs() as f64;
            let half = match cmd.pulses[axis.index()] {
                AxisPulse::HalfPeriod(c) => c as f64,
                AxisPulse::Held => panic!("axis {axis} unexpectedly held"),
            };
            steps * 2.0 * half * NS_PER_CYCLE as f64 * 1e-9
        };

        let tx = duration(Axis::X);
        let ty = duration(Axis::Y);
        assert!(
            (tx - ty).abs() / tx < 0.01,
            "axis travel times diverge: {tx} s vs {ty} s"
        );
    }

    #[test]
    fn negative_displacement_targets_move_back_toward_origin() {
        let origin = [BOOT_STEP_COUNT; 3];
        let cmd = plan_segment(&wp(100.0, 0.0, 0.0), &wp(0.0, 0.0, 0.0), 2.0, origin, &scale(), NS_PER_CYCLE)
            .unwrap();

        // Target is the absolute position of the destination, not a delta.
        assert_eq!(cmd.targets[0], BOOT_STEP_COUNT);
        assert!(!cmd.pulses[0].is_held());
    }

    #[test]
    fn target_overflow_is_rejected() {
        let err = plan_segment(
            &wp(0.0, 0.0, 0.0),
            &wp(100.0, 0.0, 0.0),
            2.0,
            [u32::MAX, 0, 0],
            &scale(),
            NS_PER_CYCLE,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            KinematicsError::TargetOutOfRange { axis: Axis::X, .. }
        ));
    }

    #[test]
    fn target_underflow_is_rejected() {
        // Moving 100 mm negative from an origin near zero would need a
        // negative counter value.
        let err = plan_segment(
            &wp(0.0, 0.0, 0.0),
            &wp(-100.0, 0.0, 0.0),
            2.0,
            [0, 0, 0],
            &scale(),
            NS_PER_CYCLE,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            KinematicsError::TargetOutOfRange { axis: Axis::X, .. }
        ));
    }

    #[test]
    fn glacial_speed_overflows_period_register() {
        let err = plan_segment(
            &wp(0.0, 0.0, 0.0),
            &wp(100.0, 0.0, 0.0),
            1e-12,
            [BOOT_STEP_COUNT; 3],
            &scale(),
            NS_PER_CYCLE,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            KinematicsError::HalfPeriodOutOfRange { axis: Axis::X, .. }
        ));
    }

    #[test]
    fn extreme_speed_clamps_to_one_cycle() {
        let cmd = plan_segment(
            &wp(0.0, 0.0, 0.0),
            &wp(100.0, 0.0, 0.0),
            1e9,
            [BOOT_STEP_COUNT; 3],
            &scale(),
            NS_PER_CYCLE,
        )
        .unwrap();
        assert_eq!(cmd.pulses[0], AxisPulse::HalfPeriod(1));
    }

    #[test]
    fn all_half_periods_positive_for_moving_axes() {
        let cases = [
            (wp(0.0, 0.0, 0.0), wp(10.0, 20.0, 30.0)),
            (wp(-5.0, 0.0, 5.0), wp(5.0, 0.1, -5.0)),
            (wp(0.0, 0.0, 0.0), wp(0.0, 0.0, 0.05)),
        ];
        for (from, to) in cases {
            let cmd =
                plan_segment(&from, &to, 2.0, [BOOT_STEP_COUNT; 3], &scale(), NS_PER_CYCLE)
                    .unwrap();
            for axis in Axis::ALL {
                if to.coord(axis) != from.coord(axis) {
                    match cmd.pulses[axis.index()] {
                        AxisPulse::HalfPeriod(c) => assert!(c > 0),
                        AxisPulse::Held => panic!("moving axis {axis} held"),
                    }
                }
            }
        }
    }
}
