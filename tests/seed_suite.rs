//! Seed-suite scenarios (§8 S1–S6), driven against `SimMaster` and
//! ticked through `support::run_cycles` rather than real wall-clock
//! sleep.

mod support;

use csp_motion_core::command::Command;
use csp_motion_core::units::AxisKind;

const CYCLES_PER_SECOND: u32 = (1.0 / support::CYCLE_TIME_S) as u32;

/// S1: single move, Z axis, 50 RPM, -50mm, settles within ~10s.
#[test]
fn s1_single_move_settles_near_target() {
    let (mut runner, tx, shared) = support::harness(1);
    tx.enqueue(Command::MoveToMm {
        axis: 0,
        target_mm: -50.0,
    })
    .unwrap();

    support::run_cycles(&mut runner, 11 * CYCLES_PER_SECOND);

    let snap = shared.snapshot(0).unwrap();
    let mm = support::current_position_mm(&snap, AxisKind::Z);
    assert!((mm - (-50.0)).abs() < 0.02, "settled at {mm}mm");
    assert!(!support::is_moving(&snap));
}

/// S2: synchronized two-axis move, both finish within a couple of
/// cycles of each other.
#[test]
fn s2_synchronized_two_axis_move_finishes_together() {
    let (mut runner, tx, shared) = support::harness(2);
    tx.enqueue(Command::MoveToMm {
        axis: 0,
        target_mm: -50.0,
    })
    .unwrap();
    tx.enqueue(Command::MoveToMm {
        axis: 1,
        target_mm: -30.0,
    })
    .unwrap();

    // Tick once to install segments, then check both share a duration
    // by running a bounded number of cycles and confirming both settle
    // within a couple of cycles of one another.
    support::run_cycles(&mut runner, 9 * CYCLES_PER_SECOND);
    assert!(shared.snapshot(0).unwrap().moving);
    assert!(shared.snapshot(1).unwrap().moving);

    support::run_cycles(&mut runner, 2 * CYCLES_PER_SECOND);
    assert!(!shared.snapshot(0).unwrap().moving, "axis 0 should have completed");
    assert!(!shared.snapshot(1).unwrap().moving, "axis 1 should have completed");
}

/// S3: cancellation — a new move replaces an in-flight one.
#[test]
fn s3_new_move_cancels_the_in_flight_segment() {
    let (mut runner, tx, shared) = support::harness(1);
    tx.enqueue(Command::MoveToMm {
        axis: 0,
        target_mm: -50.0,
    })
    .unwrap();
    support::run_cycles(&mut runner, 2 * CYCLES_PER_SECOND);
    assert!(shared.snapshot(0).unwrap().moving);
    let mid_flight_pulse = shared.snapshot(0).unwrap().actual_pulse;

    tx.enqueue(Command::MoveToMm {
        axis: 0,
        target_mm: 10.0,
    })
    .unwrap();
    support::run_cycles(&mut runner, 1);

    // The new segment should now target +10mm from a start close to
    // where the cancelled move had reached, not from the original -50mm.
    support::run_cycles(&mut runner, 10 * CYCLES_PER_SECOND);
    let snap = shared.snapshot(0).unwrap();
    let mm = support::current_position_mm(&snap, AxisKind::Z);
    assert!((mm - 10.0).abs() < 0.05, "settled at {mm}mm, started replace near {mid_flight_pulse} pulses");
}

/// S4: a fault on one axis during a coordinated move freezes both.
#[test]
fn s4_fault_during_motion_freezes_all_axes() {
    let (mut runner, tx, shared) = support::harness(2);
    tx.enqueue(Command::MoveToMm {
        axis: 0,
        target_mm: -50.0,
    })
    .unwrap();
    tx.enqueue(Command::MoveToMm {
        axis: 1,
        target_mm: -30.0,
    })
    .unwrap();
    support::run_cycles(&mut runner, 3 * CYCLES_PER_SECOND);
    assert!(shared.snapshot(0).unwrap().moving);
    assert!(shared.snapshot(1).unwrap().moving);

    runner.master_mut().set_statusword(1, 0x0027 | 0x0008);
    support::run_cycles(&mut runner, 1);

    assert!(!shared.snapshot(0).unwrap().moving, "axis 0 must freeze too");
    assert!(!shared.snapshot(1).unwrap().moving);

    // Fault Reset is issued on the faulting slave until the bit clears.
    runner.master_mut().set_statusword(1, 0x0021);
    support::run_cycles(&mut runner, 5);
    // Drive progresses back toward Operation Enabled once the fault clears.
    assert!(!shared.snapshot(1).unwrap().moving);
}

/// S5: `SetOrigin` then `MoveToMm(0)` targets the latched origin.
#[test]
fn s5_set_origin_then_move_to_zero_returns_to_origin() {
    let (mut runner, tx, shared) = support::harness(1);
    runner.master_mut().set_actual_pulse(0, 12_345_678);
    support::run_cycles(&mut runner, 1);

    tx.enqueue(Command::SetOrigin { axis: 0 }).unwrap();
    support::run_cycles(&mut runner, 1);

    tx.enqueue(Command::MoveToMm {
        axis: 0,
        target_mm: 0.0,
    })
    .unwrap();
    // Already at the origin, so this segment completes within the same
    // cycle it installs; what matters is that it targets the latched
    // offset rather than drifting away from it.
    support::run_cycles(&mut runner, 15 * CYCLES_PER_SECOND);
    let snap = shared.snapshot(0).unwrap();
    assert!((snap.actual_pulse - 12_345_678).abs() < 50_000);
}

/// S6: `StopAll` during motion is reported by `tick` so the caller can
/// run the shutdown sequence and exit the loop.
#[test]
fn s6_stop_all_during_motion_is_reported() {
    let (mut runner, tx, shared) = support::harness(1);
    tx.enqueue(Command::MoveToMm {
        axis: 0,
        target_mm: -50.0,
    })
    .unwrap();
    support::run_cycles(&mut runner, 2 * CYCLES_PER_SECOND);
    assert!(shared.snapshot(0).unwrap().moving);

    tx.enqueue(Command::StopAll).unwrap();
    let stop = runner.tick().unwrap();
    assert!(stop);
}
