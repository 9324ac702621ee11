//! Deadline overruns on the virtual clock.
//!
//! The simulated bridge consumes a queued cost at each actuation, so a tick
//! can be made to "take" any amount of virtual time.

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use motorlab_common::control::{ControlConfig, ControlMode, PidParams, ReferenceProfile};
use motorlab_common::error::FaultFlags;
use motorlab_common::state::{LoopState, OverrunPolicy};
use motorlab_control_unit::config::ControlUnitConfig;

use super::rig_runner;

const MS: Duration = Duration::from_millis(1);

fn config(policy: OverrunPolicy) -> ControlUnitConfig {
    let mut cfg = ControlUnitConfig {
        control: ControlConfig {
            mode: ControlMode::Pid,
            reference: ReferenceProfile::Constant { value: 2.0 },
            pid: PidParams {
                kp: 0.3,
                ki: 6.0,
                kd: 0.0,
                tf: 0.0,
            },
            ..Default::default()
        },
        ..Default::default()
    };
    cfg.loop_cfg.overrun_policy = policy;
    cfg
}

fn timestamps_ms<const N: usize>(runner: &super::RigRunner<N>) -> Vec<f64> {
    runner
        .sink()
        .iter()
        .map(|s| (s.timestamp * 1e4).round() / 10.0)
        .collect()
}

#[test]
fn on_time_ticks_follow_the_period_grid() {
    let cfg = config(OverrunPolicy::Skip);
    let (mut runner, rig) = rig_runner::<16>(&cfg);
    for _ in 0..5 {
        rig.push_tick_cost(MS / 2);
    }
    let running = AtomicBool::new(true);

    let summary = runner.run(&running, Some(5)).unwrap();

    assert_eq!(summary.overruns, 0);
    assert!(!summary.flags.contains(FaultFlags::OVERRUN));
    assert_eq!(timestamps_ms(&runner), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    assert_eq!(runner.stats().max_cycle_ns, 500_000);
    assert_eq!(runner.stats().max_latency_ns, 0);
}

#[test]
fn skip_policy_drops_missed_slots() {
    let cfg = config(OverrunPolicy::Skip);
    let (mut runner, rig) = rig_runner::<16>(&cfg);
    rig.push_tick_cost(Duration::ZERO);
    rig.push_tick_cost(3 * MS + MS / 5); // runs from 1 ms to 4.2 ms
    let running = AtomicBool::new(true);

    let summary = runner.run(&running, Some(4)).unwrap();

    assert_eq!(summary.overruns, 1);
    assert_eq!(summary.skipped, 3);
    assert!(summary.flags.contains(FaultFlags::OVERRUN));
    assert_eq!(summary.state, LoopState::Stopped);
    // Slots 2, 3 and 4 ms are dropped; the grid is kept.
    assert_eq!(timestamps_ms(&runner), vec![0.0, 1.0, 5.0, 6.0]);
    assert_eq!(runner.stats().max_cycle_ns, 3_200_000);
}

#[test]
fn back_to_back_policy_runs_late_ticks_immediately() {
    let cfg = config(OverrunPolicy::BackToBack);
    let (mut runner, rig) = rig_runner::<16>(&cfg);
    rig.push_tick_cost(Duration::ZERO);
    rig.push_tick_cost(3 * MS + MS / 5);
    let running = AtomicBool::new(true);

    let summary = runner.run(&running, Some(6)).unwrap();

    assert_eq!(summary.skipped, 0);
    assert!(summary.flags.contains(FaultFlags::OVERRUN));
    // Deadlines 2, 3 and 4 ms are all behind 4.2 ms and run at once; 5 ms is
    // back on time.
    assert_eq!(timestamps_ms(&runner), vec![0.0, 1.0, 4.2, 4.2, 4.2, 5.0]);
    // Tick 1 and the catch-up ticks for 2 and 3 ms finished past their slot.
    assert_eq!(summary.overruns, 3);
    assert_eq!(runner.stats().max_latency_ns, 2_200_000);
}

#[test]
fn periodic_overruns_do_not_stop_tracking() {
    for policy in [OverrunPolicy::Skip, OverrunPolicy::BackToBack] {
        let cfg = config(policy);
        let (mut runner, rig) = rig_runner::<16>(&cfg);
        for i in 0..1000 {
            let cost = if i % 10 == 9 { MS + MS / 2 } else { MS / 4 };
            rig.push_tick_cost(cost);
        }
        let running = AtomicBool::new(true);

        let summary = runner.run(&running, Some(1000)).unwrap();

        assert_eq!(summary.ticks, 1000);
        assert_eq!(summary.state, LoopState::Stopped, "{policy:?}");
        assert_eq!(summary.overruns, 100, "{policy:?}");
        assert!(!summary.flags.has_critical());
        assert!(
            (rig.true_velocity() - 2.0).abs() < 0.02,
            "{policy:?}: velocity {}",
            rig.true_velocity()
        );
    }
}
