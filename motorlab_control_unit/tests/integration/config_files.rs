//! Configuration files and telemetry output on disk.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::AtomicBool;

use motorlab_common::config::ConfigError;
use motorlab_common::control::{ControlMode, ReferenceProfile};
use motorlab_common::sensor::{DlpfBandwidth, GyroRange};
use motorlab_common::state::OverrunPolicy;
use motorlab_common::telemetry::TelemetrySample;
use motorlab_control_unit::config::{ControlUnitConfig, load_config};
use motorlab_control_unit::cycle::CycleRunner;
use motorlab_control_unit::sim::SimRig;
use motorlab_control_unit::telemetry::{LineWriter, TelemetryFormat};
use tempfile::{NamedTempFile, TempDir};

use super::rig_runner;

fn shipped_config() -> ControlUnitConfig {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/motorlab.toml");
    load_config(&path).unwrap()
}

#[test]
fn shipped_config_loads_and_runs() {
    let cfg = shipped_config();
    assert_eq!(cfg.loop_cfg.cycle_time_us, 1000);
    assert_eq!(cfg.loop_cfg.overrun_policy, OverrunPolicy::Skip);
    assert_eq!(cfg.motor.pole_pairs, 14);
    assert_eq!(cfg.sensor.range, GyroRange::Dps1000);
    assert_eq!(cfg.sensor.bandwidth, DlpfBandwidth::Hz42);
    assert_eq!(cfg.control.mode, ControlMode::Pid);
    assert!(matches!(
        cfg.control.reference,
        ReferenceProfile::Step { value, .. } if value == 3.0
    ));

    let (mut runner, rig) = rig_runner::<16>(&cfg);
    let running = AtomicBool::new(true);
    let summary = runner.run(&running, Some(1000)).unwrap();
    assert!(summary.flags.is_empty());
    assert!((rig.true_velocity() - 3.0).abs() < 0.02);
}

#[test]
fn lqr_config_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[shared]
service_name = "lqr-bench"

[loop]
cycle_time_us = 2000
fault_escalation_threshold = 4

[control]
mode = "lqr"
reference = {{ kind = "constant", value = 0.0 }}

[control.lqr]
k = [0.5, 0.4]
observer = [0.02, 0.3]

[sim]
initial_velocity = -2.0
"#
    )
    .unwrap();

    let cfg = load_config(file.path()).unwrap();
    assert_eq!(cfg.shared.service_name, "lqr-bench");
    assert_eq!(cfg.loop_cfg.fault_escalation_threshold, 4);
    assert_eq!(cfg.control.mode, ControlMode::Lqr);
    assert_eq!(cfg.sim.initial_velocity, -2.0);

    // 2 ms period: 500 ticks is one second.
    let (mut runner, rig) = rig_runner::<16>(&cfg);
    let running = AtomicBool::new(true);
    runner.run(&running, Some(500)).unwrap();
    assert!(rig.true_velocity().abs() < 0.05, "velocity {}", rig.true_velocity());
}

#[test]
fn invalid_files_are_rejected() {
    let dir = TempDir::new().unwrap();

    let missing = dir.path().join("nope.toml");
    assert!(matches!(load_config(&missing), Err(ConfigError::FileNotFound(_))));

    let broken = dir.path().join("broken.toml");
    fs::write(&broken, "[loop\ncycle_time_us = 1000").unwrap();
    assert!(matches!(load_config(&broken), Err(ConfigError::ParseError(_))));

    // ±250 °/s cannot measure the 500 °/s velocity limit.
    let narrow = dir.path().join("narrow.toml");
    fs::write(&narrow, "[sensor]\nrange = \"dps250\"\n").unwrap();
    assert!(matches!(load_config(&narrow), Err(ConfigError::ValidationError(_))));

    let unstable = dir.path().join("unstable.toml");
    fs::write(
        &unstable,
        "[control]\nmode = \"lqr\"\n[control.lqr]\nk = [0.5, 0.4]\nobserver = [0.0, 1.5]\n",
    )
    .unwrap();
    assert!(matches!(load_config(&unstable), Err(ConfigError::ValidationError(_))));
}

fn run_to_file(cfg: &ControlUnitConfig, path: &Path, format: TelemetryFormat, ticks: u64) {
    let rig = SimRig::new(&cfg.sim, &cfg.motor, cfg.sensor.address);
    let sink = LineWriter::new(BufWriter::new(File::create(path).unwrap()), format);
    let mut runner = CycleRunner::from_config(cfg, rig.gyro, rig.driver, rig.clock, sink);
    let running = AtomicBool::new(true);
    runner.run(&running, Some(ticks)).unwrap();
    assert_eq!(runner.sink_errors(), 0);
}

#[test]
fn csv_telemetry_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.csv");
    let mut cfg = shipped_config();
    cfg.loop_cfg.telemetry_interval = 5;

    run_to_file(&cfg, &path, TelemetryFormat::Csv, 300);

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], TelemetrySample::CSV_HEADER);
    assert_eq!(lines.len(), 1 + 300 / 5);
    assert_eq!(lines[1], "0.000000,0.000000,0.000000,0.000000");
    assert!(lines[2].starts_with("0.005000,"));

    // Step at 0.2 s shows up in the reference column.
    let row_at = |t: &str| lines.iter().find(|l| l.starts_with(t)).copied().unwrap();
    assert_eq!(row_at("0.195000").split(',').nth(1), Some("0.000000"));
    assert_eq!(row_at("0.200000").split(',').nth(1), Some("3.000000"));
    for line in &lines[1..] {
        let cols: Vec<f64> = line.split(',').map(|c| c.parse().unwrap()).collect();
        assert_eq!(cols.len(), 4);
        assert!(cols.iter().all(|c| c.is_finite()));
    }
}

#[test]
fn json_lines_telemetry_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.jsonl");
    let cfg = shipped_config();

    run_to_file(&cfg, &path, TelemetryFormat::JsonLines, 50);

    let text = fs::read_to_string(&path).unwrap();
    let samples: Vec<TelemetrySample> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(samples.len(), 50);
    assert_eq!(samples[0].timestamp, 0.0);
    assert!((samples[49].timestamp - 0.049).abs() < 1e-12);
    assert!(samples.windows(2).all(|w| w[1].timestamp > w[0].timestamp));
}
