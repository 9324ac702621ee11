//! Deterministic fixed-period loop: sense → estimate → control → actuate.
//!
//! ## RT Setup Sequence
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)` locks all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity` pins to one CPU core.
//! 4. `sched_setscheduler(SCHED_FIFO, prio)`.
//!
//! All four are no-ops without the `rt` feature.
//!
//! ## Pacing
//! Deadlines sit on a grid `t0 + k·period` measured by a [`TickClock`].
//! When a tick finishes after the next deadline the [`OverrunPolicy`]
//! decides:
//! - `Skip`: jump to the first grid point not in the past; the dropped
//!   slots are counted. The tick that follows sees `dt = (skipped + 1)·period`.
//! - `BackToBack`: next deadline is exactly one period later, so late ticks
//!   run immediately until the loop has caught up. Every tick sees
//!   `dt = period`.
//!
//! ## Faults
//! Recoverable faults hold (estimate or command) and feed the
//! [`FaultMonitor`]. A fatal fault or an escalation zeroes the command,
//! signals the power stage, moves the loop to `Faulted` and makes every
//! later call return [`CycleError::Halted`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use embedded_hal::i2c::I2c;
use motorlab_common::control::{ControlCommand, ControlMode, ReferenceProfile};
use motorlab_common::error::{ControlFault, FaultFlags};
use motorlab_common::state::{LoopState, OverrunPolicy};
use motorlab_common::telemetry::TelemetrySample;
use motorlab_common::timing::LoopConfig;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::actuator::{ActuatorDriver, PhaseDriver};
use crate::config::ControlUnitConfig;
use crate::control::controller::Controller;
use crate::estimator::{ObserverGains, StateEstimator, VelocityEstimate};
use crate::safety::monitor::{FaultMonitor, FaultVerdict};
use crate::safety::stop::FatalStop;
use crate::sensor::SensorReader;
use crate::state::machine::{LoopEvent, LoopStateMachine, TransitionResult};
use crate::telemetry::TelemetrySink;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics, no allocation.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total ticks recorded.
    pub cycle_count: u64,
    /// Last tick body duration [ns].
    pub last_cycle_ns: i64,
    /// Shortest tick body [ns].
    pub min_cycle_ns: i64,
    /// Longest tick body [ns].
    pub max_cycle_ns: i64,
    /// Running sum for the average.
    pub sum_cycle_ns: i64,
    /// Running sum of squares for the standard deviation.
    pub sum_sq_cycle_ns: i128,
    /// Ticks that finished after the following deadline.
    pub overruns: u64,
    /// Worst wake-up latency (start − deadline) [ns].
    pub max_latency_ns: i64,
}

impl CycleStats {
    /// Zeroed statistics.
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            sum_sq_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record one tick. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns += duration_ns;
        self.sum_sq_cycle_ns += i128::from(duration_ns) * i128::from(duration_ns);
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Average tick duration [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }

    /// Population standard deviation [ns].
    pub fn stddev_cycle_ns(&self) -> f64 {
        if self.cycle_count == 0 {
            return 0.0;
        }
        let n = self.cycle_count as f64;
        let mean = self.sum_cycle_ns as f64 / n;
        (self.sum_sq_cycle_ns as f64 / n - mean * mean).max(0.0).sqrt()
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Errors ─────────────────────────────────────────────────────────

/// Errors that end `run` or reject a tick.
#[derive(Debug, Error)]
pub enum CycleError {
    /// Memory locking, affinity or scheduler call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),

    /// Time source failed to read or sleep.
    #[error("clock error: {0}")]
    Clock(String),

    /// Sensor init sequence failed; the loop never ran.
    #[error("loop init failed: {0}")]
    Init(ControlFault),

    /// `tick` called before `start`.
    #[error("loop not started")]
    NotStarted,

    /// Fatal stop executed. Sticky until reset.
    #[error("loop halted: {0}")]
    Halted(ControlFault),
}

// ─── RT Setup ───────────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch 256 KiB of stack so the loop never takes a page fault on it.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Full RT setup. Call once, before the first tick.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    info!(cpu_core, rt_priority, rt = cfg!(feature = "rt"), "RT setup complete");
    Ok(())
}

// ─── Clocks ─────────────────────────────────────────────────────────

/// Monotonic time source driving the loop.
pub trait TickClock {
    /// Time since a fixed, arbitrary origin.
    fn now(&mut self) -> Result<Duration, CycleError>;

    /// Block until `deadline` (same origin). Returns at once if it has passed.
    fn sleep_until(&mut self, deadline: Duration) -> Result<(), CycleError>;
}

/// `Instant` + `thread::sleep`. Good to a few hundred µs on a desktop kernel.
pub struct StdClock {
    origin: Instant,
}

impl StdClock {
    /// Clock with its origin at construction.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickClock for StdClock {
    #[inline]
    fn now(&mut self) -> Result<Duration, CycleError> {
        Ok(self.origin.elapsed())
    }

    fn sleep_until(&mut self, deadline: Duration) -> Result<(), CycleError> {
        if let Some(remaining) = deadline.checked_sub(self.origin.elapsed()) {
            std::thread::sleep(remaining);
        }
        Ok(())
    }
}

/// `CLOCK_MONOTONIC` with `clock_nanosleep(TIMER_ABSTIME)`, drift-free.
#[cfg(feature = "rt")]
pub struct MonotonicClock {
    origin: nix::sys::time::TimeSpec,
}

#[cfg(feature = "rt")]
impl MonotonicClock {
    /// Clock with its origin at construction.
    pub fn new() -> Result<Self, CycleError> {
        use nix::time::{ClockId, clock_gettime};
        let origin = clock_gettime(ClockId::CLOCK_MONOTONIC)
            .map_err(|e| CycleError::Clock(format!("clock_gettime: {e}")))?;
        Ok(Self { origin })
    }
}

#[cfg(feature = "rt")]
impl TickClock for MonotonicClock {
    fn now(&mut self) -> Result<Duration, CycleError> {
        use nix::time::{ClockId, clock_gettime};
        let ts = clock_gettime(ClockId::CLOCK_MONOTONIC)
            .map_err(|e| CycleError::Clock(format!("clock_gettime: {e}")))?;
        let ns = timespec_diff_ns(&ts, &self.origin).max(0);
        Ok(Duration::from_nanos(ns as u64))
    }

    fn sleep_until(&mut self, deadline: Duration) -> Result<(), CycleError> {
        use nix::errno::Errno;
        use nix::time::{ClockId, ClockNanosleepFlags, clock_nanosleep};
        let wake = timespec_add_ns(self.origin, deadline.as_nanos() as i64);
        loop {
            match clock_nanosleep(
                ClockId::CLOCK_MONOTONIC,
                ClockNanosleepFlags::TIMER_ABSTIME,
                &wake,
            ) {
                Ok(_) => return Ok(()),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(CycleError::Clock(format!("clock_nanosleep: {e}"))),
            }
        }
    }
}

#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    let total = ts.tv_nsec() + ns;
    let secs = ts.tv_sec() + total.div_euclid(1_000_000_000);
    let nanos = total.rem_euclid(1_000_000_000);
    nix::sys::time::TimeSpec::new(secs, nanos)
}

/// (a − b) in nanoseconds.
#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}

// ─── Overrun Policy ─────────────────────────────────────────────────

/// Next deadline after a tick scheduled at `deadline` finished at `now`.
///
/// Returns `(next_deadline, skipped_slots)`. A tick ending exactly on the
/// next grid point is not an overrun.
pub fn next_deadline(
    policy: OverrunPolicy,
    deadline: Duration,
    now: Duration,
    period: Duration,
) -> (Duration, u64) {
    let nominal = deadline + period;
    if now <= nominal {
        return (nominal, 0);
    }
    match policy {
        OverrunPolicy::BackToBack => (nominal, 0),
        OverrunPolicy::Skip => {
            let late = now.saturating_sub(deadline).as_nanos();
            let p = period.as_nanos().max(1);
            // First grid point at or after `now`; always >= 2 periods here.
            let steps = late.div_ceil(p);
            let offset = u64::try_from(steps * p).unwrap_or(u64::MAX);
            let skipped = u64::try_from(steps - 1).unwrap_or(u64::MAX);
            (deadline + Duration::from_nanos(offset), skipped)
        }
    }
}

#[inline]
fn duration_ns(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Result of one successful tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Estimate the command was computed from.
    pub estimate: VelocityEstimate,
    /// Command sent to the actuator (zero once stopped).
    pub command: ControlCommand,
    /// A recoverable fault was absorbed this tick.
    pub held: bool,
}

/// Outcome of a `run` call that ended without a fatal stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Ticks executed by this `run` call.
    pub ticks: u64,
    /// Grid slots dropped by the skip policy.
    pub skipped: u64,
    /// Ticks that ended past the following deadline.
    pub overruns: u64,
    /// Sticky fault and condition flags.
    pub flags: FaultFlags,
    /// Loop state after the run.
    pub state: LoopState,
}

/// Owns every loop component. Single-threaded, no locks, no allocation on
/// the tick path (sinks excepted).
pub struct CycleRunner<I, D, C, S> {
    sensor: SensorReader<I>,
    estimator: StateEstimator,
    controller: Controller,
    actuator: ActuatorDriver<D>,
    clock: C,
    sink: S,

    reference: ReferenceProfile,
    loop_cfg: LoopConfig,
    velocity_limit: f64,

    machine: LoopStateMachine,
    monitor: FaultMonitor,
    stop: FatalStop,
    stats: CycleStats,

    tick_count: u64,
    skipped_ticks: u64,
    sink_errors: u64,
    last_sample: TelemetrySample,
}

impl<I, D, C, S> CycleRunner<I, D, C, S>
where
    I: I2c,
    D: PhaseDriver,
    C: TickClock,
    S: TelemetrySink,
{
    /// Wire every component from `cfg`. The loop starts `Stopped`.
    pub fn from_config(cfg: &ControlUnitConfig, bus: I, driver: D, clock: C, sink: S) -> Self {
        let estimator = match cfg.control.mode {
            ControlMode::Lqr => StateEstimator::observer(ObserverGains::from(&cfg.control.lqr)),
            ControlMode::Pid | ControlMode::OpenLoop => StateEstimator::direct(),
        };
        Self {
            sensor: SensorReader::new(bus, cfg.sensor),
            estimator,
            controller: Controller::from_config(&cfg.control, &cfg.motor),
            actuator: ActuatorDriver::new(driver, &cfg.motor),
            clock,
            sink,
            reference: cfg.control.reference,
            loop_cfg: cfg.loop_cfg,
            velocity_limit: cfg.motor.velocity_limit,
            machine: LoopStateMachine::new(),
            monitor: FaultMonitor::new(cfg.loop_cfg.fault_escalation_threshold),
            stop: FatalStop::new(),
            stats: CycleStats::new(),
            tick_count: 0,
            skipped_ticks: 0,
            sink_errors: 0,
            last_sample: TelemetrySample::default(),
        }
    }

    /// Run the sensor init sequence and enter `Running`.
    pub fn start(&mut self) -> Result<(), CycleError> {
        match self.machine.state() {
            LoopState::Running => return Ok(()),
            LoopState::Faulted => {
                return Err(CycleError::Halted(
                    self.stop.reason().unwrap_or(ControlFault::DriverFault),
                ));
            }
            LoopState::Stopped => {}
        }

        if let Err(fault) = self.sensor.init() {
            self.machine.handle_event(LoopEvent::InitFailed);
            self.stop.trigger(fault, self.tick_count);
            self.monitor.note(fault.flag());
            self.actuator.signal_fault();
            return Err(CycleError::Init(fault));
        }

        self.machine.handle_event(LoopEvent::SensorReady);
        info!(
            mode = ?self.controller.law().mode(),
            period_us = self.loop_cfg.cycle_time_us,
            policy = ?self.loop_cfg.overrun_policy,
            "control loop running"
        );
        Ok(())
    }

    /// Execute one tick at loop time `t` [s] with interval `dt` [s].
    pub fn tick(&mut self, t: f64, dt: f64) -> Result<TickReport, CycleError> {
        if let Some(reason) = self.stop.reason() {
            return Err(CycleError::Halted(reason));
        }
        if !self.machine.allows_actuation() {
            return Err(CycleError::NotStarted);
        }

        let mut held = false;

        // ═══ SENSE + ESTIMATE ═══
        let estimate = match self.sensor.read_angular_rate() {
            Ok(rate) => self.estimator.update(rate, dt),
            Err(fault) => {
                held = true;
                if let FaultVerdict::Stop(reason) = self.monitor.report(fault) {
                    return Err(self.fatal(reason, t));
                }
                self.estimator.hold()
            }
        };

        if estimate.velocity.abs() > self.velocity_limit {
            if !self.monitor.flags().contains(FaultFlags::OVERSPEED) {
                warn!(
                    velocity = estimate.velocity,
                    limit = self.velocity_limit,
                    "velocity above profile limit"
                );
            }
            self.monitor.note(FaultFlags::OVERSPEED);
        }

        // ═══ CONTROL ═══
        let reference = self.reference.at(t);
        let command = match self.controller.compute_command(reference, &estimate, dt) {
            Ok(cmd) => cmd,
            Err(fault) => {
                held = true;
                match self.monitor.report(fault) {
                    FaultVerdict::Hold => self.controller.held_command(),
                    FaultVerdict::Stop(reason) => return Err(self.fatal(reason, t)),
                }
            }
        };
        self.monitor.end_tick();

        // ═══ ACTUATE ═══
        let command = self.stop.gate(command);
        if let Err(fault) = self.actuator.apply_command(command, estimate.angle) {
            if let FaultVerdict::Stop(reason) = self.monitor.report(fault) {
                return Err(self.fatal(reason, t));
            }
        }
        self.estimator.observe_command(command.volts());

        trace!(t, reference, velocity = estimate.velocity, u = command.volts(), "tick");

        // ═══ TELEMETRY ═══
        self.last_sample = TelemetrySample {
            timestamp: t,
            reference,
            estimate: estimate.velocity,
            command: command.volts(),
        };
        let interval = u64::from(self.loop_cfg.telemetry_interval.max(1));
        if self.tick_count % interval == 0 {
            self.emit(self.last_sample);
        }
        self.tick_count += 1;

        Ok(TickReport {
            estimate,
            command,
            held,
        })
    }

    /// Tick on the clock until `running` clears, `max_ticks` ticks have run,
    /// or a fatal stop. Starts the loop if needed; disables the outputs on a
    /// clean exit.
    pub fn run(
        &mut self,
        running: &AtomicBool,
        max_ticks: Option<u64>,
    ) -> Result<RunSummary, CycleError> {
        self.start()?;

        let period = self.loop_cfg.period();
        let policy = self.loop_cfg.overrun_policy;
        let t0 = self.clock.now()?;
        let mut deadline = t0;
        let mut prev_deadline: Option<Duration> = None;
        let mut ran = 0u64;
        let skipped_before = self.skipped_ticks;
        let overruns_before = self.stats.overruns;

        while running.load(Ordering::Acquire) && max_ticks.is_none_or(|m| ran < m) {
            self.clock.sleep_until(deadline)?;
            let start = self.clock.now()?;

            let dt = prev_deadline.map_or(self.loop_cfg.dt(), |p| (deadline - p).as_secs_f64());
            prev_deadline = Some(deadline);
            let t = start.saturating_sub(t0).as_secs_f64();

            self.tick(t, dt)?;
            ran += 1;

            let end = self.clock.now()?;
            self.stats.record(
                duration_ns(end.saturating_sub(start)),
                duration_ns(start.saturating_sub(deadline)),
            );

            let (next, skipped) = next_deadline(policy, deadline, end, period);
            if end > deadline + period {
                self.stats.overruns += 1;
                self.monitor.note(FaultFlags::OVERRUN);
                warn!(
                    late_us = end.saturating_sub(deadline + period).as_micros() as u64,
                    skipped,
                    ?policy,
                    "cycle overrun"
                );
            }
            self.skipped_ticks += skipped;
            deadline = next;
        }

        self.shutdown();
        Ok(RunSummary {
            ticks: ran,
            skipped: self.skipped_ticks - skipped_before,
            overruns: self.stats.overruns - overruns_before,
            flags: self.monitor.flags(),
            state: self.machine.state(),
        })
    }

    /// Leave `Running`: outputs off, sink flushed.
    pub fn shutdown(&mut self) {
        if self.machine.state() != LoopState::Running {
            return;
        }
        self.machine.handle_event(LoopEvent::Shutdown);
        if let Err(fault) = self.actuator.disable() {
            warn!(%fault, "disable on shutdown failed");
        }
        self.flush_sink();
        info!(
            ticks = self.tick_count,
            skipped = self.skipped_ticks,
            overruns = self.stats.overruns,
            avg_cycle_ns = self.stats.avg_cycle_ns(),
            flags = %self.monitor.flags(),
            "control loop stopped"
        );
    }

    /// Clear a fatal stop and all history. The next `start` re-inits the
    /// sensor.
    pub fn reset(&mut self) {
        if self.machine.handle_event(LoopEvent::Reset) != TransitionResult::Ok(LoopState::Stopped) {
            return;
        }
        self.stop.clear();
        self.monitor.reset();
        self.estimator.reset();
        self.controller.reset();
        info!("loop reset after fault");
    }

    fn fatal(&mut self, reason: ControlFault, t: f64) -> CycleError {
        self.stop.trigger(reason, self.tick_count);
        self.actuator.signal_fault();
        self.machine.handle_event(LoopEvent::FatalFault);
        self.last_sample = TelemetrySample {
            timestamp: t,
            reference: self.reference.at(t),
            estimate: self.estimator.estimate().velocity,
            command: ControlCommand::ZERO.volts(),
        };
        self.emit(self.last_sample);
        self.flush_sink();
        CycleError::Halted(reason)
    }

    fn emit(&mut self, sample: TelemetrySample) {
        if let Err(e) = self.sink.record(&sample) {
            if self.sink_errors == 0 {
                warn!(error = %e, "telemetry sink failed, further errors counted only");
            }
            self.sink_errors += 1;
        }
    }

    fn flush_sink(&mut self) {
        if let Err(e) = self.sink.flush() {
            warn!(error = %e, "telemetry flush failed");
        }
    }

    // ── Accessors ──

    /// Current loop state.
    #[inline]
    pub fn state(&self) -> LoopState {
        self.machine.state()
    }

    /// Sticky flags since the last reset.
    #[inline]
    pub fn flags(&self) -> FaultFlags {
        self.monitor.flags()
    }

    /// Fault that latched the stop, if any.
    #[inline]
    pub fn halt_reason(&self) -> Option<ControlFault> {
        self.stop.reason()
    }

    /// Timing statistics.
    #[inline]
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Ticks completed since construction.
    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Grid slots dropped since construction.
    #[inline]
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks
    }

    /// Samples the sink failed to take.
    #[inline]
    pub fn sink_errors(&self) -> u64 {
        self.sink_errors
    }

    /// Last sample produced (emitted or not).
    #[inline]
    pub fn last_sample(&self) -> TelemetrySample {
        self.last_sample
    }

    /// Latest state estimate.
    #[inline]
    pub fn estimate(&self) -> VelocityEstimate {
        self.estimator.estimate()
    }

    /// Controller, for inspecting phase and law state.
    #[inline]
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Telemetry sink.
    #[inline]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Telemetry sink, mutable.
    #[inline]
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Clock, mutable.
    #[inline]
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Consume the runner and keep the telemetry.
    pub fn into_sink(self) -> S {
        debug!(ticks = self.tick_count, "runner dropped");
        self.sink
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
