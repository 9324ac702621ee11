//! Simulated rig: first-order motor plant, MPU6050 register model, phase
//! bridge and a virtual clock sharing one state.
//!
//! ## Plant
//! ```text
//! ω⁺ = a·ω + b·Uq        a = exp(−h/τ), b = K·(1 − a)
//! θ⁺ = θ + h·(ω + ω⁺)/2
//! ```
//! Uq is recovered from the written duties (common mode removed, Clarke,
//! Park at the true electrical angle), so a commutation error shows up as
//! lost torque exactly like on hardware. The bridge holds Uq between writes.
//! `h` is the virtual time since the plant was last brought up to date,
//! which happens on every gyro transaction, bridge write and observation,
//! so an overrunning tick lets the shaft run on for as long as it took.
//!
//! ## Gyro
//! Responds at the configured address, `WHO_AM_I = 0x68`, powers up asleep
//! (`PWR_MGMT_1 = 0x40`, rate registers read 0). The shaft rate is encoded
//! with the range programmed into `GYRO_CONFIG`.
//!
//! [`SimHandle`] observes the true state and injects faults between ticks.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use motorlab_common::config::ConfigError;
use motorlab_common::control::PlantModel;
use motorlab_common::profile::MotorProfile;
use motorlab_common::sensor::{GyroAxis, GyroRange, MPU6050_WHO_AM_I, MpuRegister};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actuator::{PhaseDriver, PhaseDuty};
use crate::cycle::{CycleError, TickClock};

const PWR_SLEEP: u8 = 0x40;
const SQRT3: f64 = 1.732_050_807_568_877_2;

/// `[sim]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// True plant. May differ from the observer model on purpose.
    #[serde(default)]
    pub plant: PlantModel,
    /// Shaft velocity at start [rad/s].
    #[serde(default)]
    pub initial_velocity: f64,
    /// Gyro axis the shaft rotates about.
    #[serde(default)]
    pub shaft_axis: GyroAxis,
    /// Rate-read indices (0-based) answered with NACK.
    #[serde(default)]
    pub nack_reads: Vec<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            plant: PlantModel::default(),
            initial_velocity: 0.0,
            shaft_axis: GyroAxis::Y,
            nack_reads: Vec::new(),
        }
    }
}

impl SimConfig {
    /// Check the plant and the initial state.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.plant.time_constant > 0.0 && self.plant.gain.is_finite()) {
            return Err(ConfigError::ValidationError(
                "sim.plant.time_constant must be > 0".to_string(),
            ));
        }
        if !self.initial_velocity.is_finite() {
            return Err(ConfigError::ValidationError(
                "sim.initial_velocity must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Error returned by the simulated bridge when told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("simulated bridge fault")]
pub struct BridgeFault;

struct RigState {
    // plant
    model: PlantModel,
    /// Virtual time the plant state refers to.
    plant_time: Duration,
    motor: MotorProfile,
    supply: f64,
    angle: f64,
    velocity: f64,
    last_uq: f64,
    steps: u64,
    // bridge
    outputs_enabled: bool,
    fault_signaled: bool,
    driver_fail: bool,
    // gyro
    address: u8,
    shaft_axis: GyroAxis,
    regs: [u8; 128],
    rate_reads: u64,
    scheduled_nacks: VecDeque<u64>,
    nack_pending: u32,
    // clock
    now: Rc<Cell<Duration>>,
    tick_costs: VecDeque<Duration>,
}

impl RigState {
    /// Integrate the held Uq up to the current virtual time.
    fn catch_up(&mut self) {
        let now = self.now.get();
        if now <= self.plant_time {
            return;
        }
        let h = (now - self.plant_time).as_secs_f64();
        self.plant_time = now;

        let a = (-h / self.model.time_constant).exp();
        let b = self.model.gain * (1.0 - a);
        let w0 = self.velocity;
        self.velocity = a * w0 + b * self.last_uq;
        self.angle += 0.5 * (w0 + self.velocity) * h;
    }

    /// q-axis voltage produced by `duty` at the true rotor angle.
    fn recover_uq(&self, duty: PhaseDuty) -> f64 {
        let mean = (duty.u + duty.v + duty.w) / 3.0;
        let (u, v, w) = (
            (duty.u - mean) * self.supply,
            (duty.v - mean) * self.supply,
            (duty.w - mean) * self.supply,
        );
        let alpha = u;
        let beta = (v - w) / SQRT3;
        let (s, c) = self.motor.electrical_angle(self.angle).sin_cos();
        -alpha * s + beta * c
    }

    fn range(&self) -> GyroRange {
        match (self.regs[MpuRegister::GyroConfig.addr() as usize] >> 3) & 0x03 {
            0 => GyroRange::Dps250,
            1 => GyroRange::Dps500,
            2 => GyroRange::Dps1000,
            _ => GyroRange::Dps2000,
        }
    }

    fn encoded_rate(&self) -> i16 {
        if self.regs[MpuRegister::PwrMgmt1.addr() as usize] & PWR_SLEEP != 0 {
            return 0;
        }
        let lsb = self.velocity.to_degrees() * self.range().lsb_per_dps();
        lsb.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
    }

    fn read_reg(&self, reg: u8) -> u8 {
        let first = MpuRegister::GyroXoutH.addr();
        if (first..first + 6).contains(&reg) {
            let offset = reg - first;
            let axis = match offset / 2 {
                0 => GyroAxis::X,
                1 => GyroAxis::Y,
                _ => GyroAxis::Z,
            };
            let raw = if axis == self.shaft_axis {
                self.encoded_rate()
            } else {
                0
            };
            let [hi, lo] = raw.to_be_bytes();
            return if offset % 2 == 0 { hi } else { lo };
        }
        self.regs.get(reg as usize).copied().unwrap_or(0)
    }

    fn is_rate_register(reg: u8) -> bool {
        let first = MpuRegister::GyroXoutH.addr();
        (first..first + 6).contains(&reg)
    }
}

type Shared = Rc<RefCell<RigState>>;

/// Everything the loop needs, wired to one plant.
pub struct SimRig {
    /// MPU6050 register model.
    pub gyro: SimGyro,
    /// Three-phase bridge feeding the plant.
    pub driver: SimPhaseDriver,
    /// Virtual clock shared with the plant.
    pub clock: VirtualClock,
    /// Observation and fault injection.
    pub handle: SimHandle,
}

impl SimRig {
    /// Rig with the shaft at angle 0 and `cfg.initial_velocity`, gyro asleep
    /// on `address`, bridge enabled and the clock at zero.
    pub fn new(cfg: &SimConfig, motor: &MotorProfile, address: u8) -> Self {
        let mut regs = [0u8; 128];
        regs[MpuRegister::WhoAmI.addr() as usize] = MPU6050_WHO_AM_I;
        regs[MpuRegister::PwrMgmt1.addr() as usize] = PWR_SLEEP;

        let mut nacks: Vec<u64> = cfg.nack_reads.clone();
        nacks.sort_unstable();
        nacks.dedup();

        let now = Rc::new(Cell::new(Duration::ZERO));
        let state = Rc::new(RefCell::new(RigState {
            model: cfg.plant,
            plant_time: Duration::ZERO,
            motor: *motor,
            supply: motor.supply_voltage,
            angle: 0.0,
            velocity: cfg.initial_velocity,
            last_uq: 0.0,
            steps: 0,
            outputs_enabled: true,
            fault_signaled: false,
            driver_fail: false,
            address,
            shaft_axis: cfg.shaft_axis,
            regs,
            rate_reads: 0,
            scheduled_nacks: nacks.into(),
            nack_pending: 0,
            now: Rc::clone(&now),
            tick_costs: VecDeque::new(),
        }));

        Self {
            gyro: SimGyro {
                state: Rc::clone(&state),
            },
            driver: SimPhaseDriver {
                state: Rc::clone(&state),
            },
            clock: VirtualClock { now },
            handle: SimHandle { state },
        }
    }
}

/// Observation and fault injection.
#[derive(Clone)]
pub struct SimHandle {
    state: Shared,
}

impl SimHandle {
    /// Shaft velocity at the current virtual time [rad/s].
    pub fn true_velocity(&self) -> f64 {
        let mut st = self.state.borrow_mut();
        st.catch_up();
        st.velocity
    }

    /// Shaft angle at the current virtual time [rad].
    pub fn true_angle(&self) -> f64 {
        let mut st = self.state.borrow_mut();
        st.catch_up();
        st.angle
    }

    /// Uq the bridge is holding (0 once disabled).
    pub fn last_uq(&self) -> f64 {
        self.state.borrow().last_uq
    }

    /// Bridge writes accepted so far.
    pub fn steps(&self) -> u64 {
        self.state.borrow().steps
    }

    /// Rate transactions so far, NACKed ones included.
    pub fn rate_reads(&self) -> u64 {
        self.state.borrow().rate_reads
    }

    /// NACK the next `n` gyro transactions.
    pub fn fail_gyro_reads(&self, n: u32) {
        self.state.borrow_mut().nack_pending = n;
    }

    /// Make every bridge write fail until cleared.
    pub fn fail_driver(&self, fail: bool) {
        self.state.borrow_mut().driver_fail = fail;
    }

    /// Extra time the next tick takes (consumed at its actuation).
    pub fn push_tick_cost(&self, cost: Duration) {
        self.state.borrow_mut().tick_costs.push_back(cost);
    }

    /// Bridge is driving the phases.
    pub fn outputs_enabled(&self) -> bool {
        self.state.borrow().outputs_enabled
    }

    /// `signal_fault` has been called.
    pub fn fault_signaled(&self) -> bool {
        self.state.borrow().fault_signaled
    }

    /// Current virtual time.
    pub fn virtual_time(&self) -> Duration {
        self.state.borrow().now.get()
    }

    /// Move the shared clock forward, for driving `tick` by hand.
    pub fn advance(&self, by: Duration) {
        let st = self.state.borrow();
        st.now.set(st.now.get() + by);
    }

    /// Let `clock` pace the loop and carry the rig's time along with it.
    pub fn paced<C: TickClock>(&self, clock: C) -> PacedClock<C> {
        PacedClock {
            inner: clock,
            now: Rc::clone(&self.state.borrow().now),
        }
    }
}

/// Simulated MPU6050 on the rig bus.
pub struct SimGyro {
    state: Shared,
}

impl ErrorType for SimGyro {
    type Error = ErrorKind;
}

impl I2c for SimGyro {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut st = self.state.borrow_mut();
        st.catch_up();
        if address != st.address {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        let is_rate_read = matches!(
            operations.first(),
            Some(Operation::Write(b)) if b.len() == 1 && RigState::is_rate_register(b[0])
        ) && operations.iter().any(|op| matches!(op, Operation::Read(_)));

        if is_rate_read {
            let index = st.rate_reads;
            st.rate_reads += 1;
            if st.scheduled_nacks.front() == Some(&index) {
                st.scheduled_nacks.pop_front();
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
            }
        }
        if st.nack_pending > 0 {
            st.nack_pending -= 1;
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
        }

        let mut ptr: u8 = 0;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    let Some((&reg, data)) = bytes.split_first() else {
                        continue;
                    };
                    ptr = reg;
                    for &b in data {
                        if let Some(slot) = st.regs.get_mut(ptr as usize) {
                            *slot = b;
                        }
                        ptr = ptr.wrapping_add(1);
                    }
                }
                Operation::Read(buf) => {
                    for b in buf.iter_mut() {
                        *b = st.read_reg(ptr);
                        ptr = ptr.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Simulated three-phase bridge.
pub struct SimPhaseDriver {
    state: Shared,
}

impl PhaseDriver for SimPhaseDriver {
    type Error = BridgeFault;

    fn set_duties(&mut self, duty: PhaseDuty) -> Result<(), Self::Error> {
        let mut st = self.state.borrow_mut();
        if st.driver_fail {
            return Err(BridgeFault);
        }
        st.catch_up();
        st.outputs_enabled = true;
        st.last_uq = st.recover_uq(duty);
        st.steps += 1;
        if let Some(cost) = st.tick_costs.pop_front() {
            st.now.set(st.now.get() + cost);
        }
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Self::Error> {
        let mut st = self.state.borrow_mut();
        st.catch_up();
        st.outputs_enabled = false;
        st.last_uq = 0.0;
        Ok(())
    }

    fn signal_fault(&mut self) -> Result<(), Self::Error> {
        self.state.borrow_mut().fault_signaled = true;
        self.disable()
    }
}

/// Simulated time. Sleeping jumps forward instantly, so a run of N ticks
/// costs no wall time.
pub struct VirtualClock {
    now: Rc<Cell<Duration>>,
}

impl VirtualClock {
    /// Standalone clock not attached to a rig.
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    /// Move time forward without sleeping.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickClock for VirtualClock {
    #[inline]
    fn now(&mut self) -> Result<Duration, CycleError> {
        Ok(self.now.get())
    }

    #[inline]
    fn sleep_until(&mut self, deadline: Duration) -> Result<(), CycleError> {
        if deadline > self.now.get() {
            self.now.set(deadline);
        }
        Ok(())
    }
}

/// A real clock whose readings also become the rig's time, so the plant
/// runs at wall speed under `--realtime`.
pub struct PacedClock<C> {
    inner: C,
    now: Rc<Cell<Duration>>,
}

impl<C: TickClock> PacedClock<C> {
    fn sync(&self, t: Duration) -> Duration {
        if t > self.now.get() {
            self.now.set(t);
        }
        t
    }
}

impl<C: TickClock> TickClock for PacedClock<C> {
    fn now(&mut self) -> Result<Duration, CycleError> {
        let t = self.inner.now()?;
        Ok(self.sync(t))
    }

    fn sleep_until(&mut self, deadline: Duration) -> Result<(), CycleError> {
        self.inner.sleep_until(deadline)?;
        let t = self.inner.now()?;
        self.sync(t);
        Ok(())
    }
}
