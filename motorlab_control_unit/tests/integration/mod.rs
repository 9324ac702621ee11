mod closed_loop;
mod config_files;
mod fault_escalation;
mod overrun;

use motorlab_control_unit::config::ControlUnitConfig;
use motorlab_control_unit::cycle::CycleRunner;
use motorlab_control_unit::sim::{SimGyro, SimHandle, SimPhaseDriver, SimRig, VirtualClock};
use motorlab_control_unit::telemetry::TelemetryRecorder;

pub type RigRunner<const N: usize> =
    CycleRunner<SimGyro, SimPhaseDriver, VirtualClock, TelemetryRecorder<N>>;

/// Runner on a fresh simulated rig built from `cfg`.
pub fn rig_runner<const N: usize>(cfg: &ControlUnitConfig) -> (RigRunner<N>, SimHandle) {
    let rig = SimRig::new(&cfg.sim, &cfg.motor, cfg.sensor.address);
    let runner = CycleRunner::from_config(
        cfg,
        rig.gyro,
        rig.driver,
        rig.clock,
        TelemetryRecorder::new(),
    );
    (runner, rig.handle)
}
