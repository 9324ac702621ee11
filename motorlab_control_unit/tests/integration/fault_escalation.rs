//! Fault handling end to end: single dropouts are absorbed, repeated ones
//! and driver faults halt the loop with the outputs off.

use std::sync::atomic::AtomicBool;

use motorlab_common::control::{ControlConfig, ControlMode, PidParams, ReferenceProfile};
use motorlab_common::error::{ControlFault, FaultFlags};
use motorlab_common::state::LoopState;
use motorlab_control_unit::config::ControlUnitConfig;
use motorlab_control_unit::cycle::{CycleError, CycleRunner};
use motorlab_control_unit::sim::SimRig;
use motorlab_control_unit::telemetry::TelemetryRecorder;

use super::rig_runner;

fn tracking_config() -> ControlUnitConfig {
    ControlUnitConfig {
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
    }
}

#[test]
fn scattered_dropouts_do_not_stop_the_loop() {
    let mut cfg = tracking_config();
    // Isolated and paired misses, never three in a row.
    cfg.sim.nack_reads = vec![50, 120, 121, 300, 301, 450];
    let (mut runner, rig) = rig_runner::<1024>(&cfg);
    let running = AtomicBool::new(true);

    let summary = runner.run(&running, Some(600)).unwrap();

    assert_eq!(summary.ticks, 600);
    assert_eq!(summary.state, LoopState::Stopped);
    assert!(summary.flags.contains(FaultFlags::SENSOR_UNAVAILABLE));
    assert!(!summary.flags.has_critical());
    // Every tick still actuated.
    assert_eq!(rig.steps(), 600);
    assert!((rig.true_velocity() - 2.0).abs() < 0.02);

    // The dropout tick repeats the previous estimate.
    let samples: Vec<_> = runner.sink().iter().copied().collect();
    assert_eq!(samples[50].estimate, samples[49].estimate);
    assert_eq!(samples[121].estimate, samples[119].estimate);
}

#[test]
fn three_consecutive_dropouts_halt_with_zero_command() {
    let mut cfg = tracking_config();
    cfg.sim.nack_reads = vec![200, 201, 202];
    let (mut runner, rig) = rig_runner::<1024>(&cfg);
    let running = AtomicBool::new(true);

    let err = runner.run(&running, Some(1000)).unwrap_err();

    assert!(
        matches!(
            err,
            CycleError::Halted(ControlFault::Escalated { count: 3, last }) if last.contains(FaultFlags::SENSOR_UNAVAILABLE)
        ),
        "got {err:?}"
    );
    assert_eq!(runner.state(), LoopState::Faulted);
    assert!(runner.flags().contains(FaultFlags::ESCALATED));
    assert!(rig.fault_signaled());
    assert!(!rig.outputs_enabled());
    assert_eq!(rig.last_uq(), 0.0);
    // Ticks 200 and 201 held, 202 halted before actuating.
    assert_eq!(rig.steps(), 202);
    assert_eq!(runner.tick_count(), 202);

    // The final sample records the zero command.
    let last = runner.sink().latest().copied().unwrap();
    assert_eq!(last.command, 0.0);
    assert!((last.timestamp - 0.202).abs() < 1e-9);
}

#[test]
fn escalation_threshold_is_configurable() {
    let mut cfg = tracking_config();
    cfg.loop_cfg.fault_escalation_threshold = 5;
    cfg.sim.nack_reads = vec![10, 11, 12, 13];
    let (mut runner, _rig) = rig_runner::<16>(&cfg);
    let running = AtomicBool::new(true);

    // Four in a row is below a threshold of five.
    let summary = runner.run(&running, Some(100)).unwrap();
    assert_eq!(summary.ticks, 100);
    assert!(!summary.flags.contains(FaultFlags::ESCALATED));
}

#[test]
fn halted_loop_never_actuates_again() {
    let cfg = tracking_config();
    let (mut runner, rig) = rig_runner::<16>(&cfg);
    runner.start().unwrap();
    for i in 0..10 {
        runner.tick(f64::from(i) * 0.001, 0.001).unwrap();
    }
    rig.fail_gyro_reads(3);
    for i in 10..12 {
        assert!(runner.tick(f64::from(i) * 0.001, 0.001).unwrap().held);
    }
    assert!(runner.tick(0.012, 0.001).is_err());
    let steps = rig.steps();

    // Sensor is healthy again but the stop is latched.
    for i in 13..50 {
        assert!(matches!(
            runner.tick(f64::from(i) * 0.001, 0.001),
            Err(CycleError::Halted(ControlFault::Escalated { .. }))
        ));
    }
    let running = AtomicBool::new(true);
    assert!(matches!(
        runner.run(&running, Some(10)),
        Err(CycleError::Halted(_))
    ));
    assert_eq!(rig.steps(), steps);
}

#[test]
fn driver_fault_mid_run_is_fatal() {
    let cfg = tracking_config();
    let (mut runner, rig) = rig_runner::<16>(&cfg);
    runner.start().unwrap();
    for i in 0..100 {
        runner.tick(f64::from(i) * 0.001, 0.001).unwrap();
    }
    rig.fail_driver(true);

    let err = runner.tick(0.1, 0.001).unwrap_err();
    assert!(matches!(err, CycleError::Halted(ControlFault::DriverFault)));
    assert_eq!(runner.halt_reason(), Some(ControlFault::DriverFault));
    assert!(runner.flags().contains(FaultFlags::DRIVER_FAULT));
    assert!(rig.fault_signaled());
    assert_eq!(runner.last_sample().command, 0.0);
}

#[test]
fn reset_after_fault_resumes_control() {
    let mut cfg = tracking_config();
    cfg.sim.nack_reads = vec![100, 101, 102];
    let (mut runner, rig) = rig_runner::<16>(&cfg);
    let running = AtomicBool::new(true);
    assert!(runner.run(&running, Some(500)).is_err());

    runner.reset();
    assert_eq!(runner.state(), LoopState::Stopped);
    assert!(runner.flags().is_empty());

    // Controller restarts from scratch and tracks again.
    let summary = runner.run(&running, Some(800)).unwrap();
    assert_eq!(summary.state, LoopState::Stopped);
    assert!((rig.true_velocity() - 2.0).abs() < 0.02);
}

#[test]
fn wrong_sensor_address_fails_init() {
    let mut cfg = tracking_config();
    cfg.sensor.address = 0x69;
    // Rig answers on 0x68 only.
    let rig = SimRig::new(&cfg.sim, &cfg.motor, 0x68);
    let handle = rig.handle.clone();
    let mut runner = CycleRunner::from_config(
        &cfg,
        rig.gyro,
        rig.driver,
        rig.clock,
        TelemetryRecorder::<16>::new(),
    );
    let running = AtomicBool::new(true);

    let err = runner.run(&running, Some(10)).unwrap_err();
    assert!(matches!(
        err,
        CycleError::Init(ControlFault::SensorUnavailable { address: 0x69 })
    ));
    assert_eq!(runner.state(), LoopState::Faulted);
    assert_eq!(handle.steps(), 0);
    assert!(handle.fault_signaled());
}
