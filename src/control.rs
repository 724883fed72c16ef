//! Pedal-driven control state machine
//!
//! One engine instance owns the control mode, the PID controller and the
//! calibration/autotune routines; every mode has a single writer of the power
//! percentage at any instant. The firmware task calls `tick()` at the cadence
//! the previous tick requested and forwards the returned power percentage to
//! the firing layer.

use crate::autotune::{AutotuneState, PidAutotune};
use crate::calibration::{CalibrationState, MaxRpmCalibration};
use crate::config::params;
use crate::config::{Config, StopPosition};
use crate::phase;
use crate::pid::Pid;
use crate::status::{ControlRequest, DriveStatus};

/// Drive control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlMode {
    /// Pedal released, motor off
    Idle,
    /// Ramping toward the pedal target
    SoftStart,
    /// Pedal target applied directly
    Running,
    /// Creeping toward the configured needle position
    Stopping,
    /// Max-RPM discovery active
    Calibrating,
    /// PID autotune active
    Autotuning,
}

/// Sensor and clock readings for one tick
#[derive(Debug, Clone, Copy)]
pub struct ControlInputs {
    pub now_ms: u32,
    pub pedal_raw: u16,
    pub rpm: u32,
    pub needle_up: bool,
    pub needle_down: bool,
}

/// Terminal result of a stop sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopOutcome {
    /// The selected needle sensor asserted
    AtPosition,
    /// The sensor never asserted within the timeout; power was forced to zero
    Timeout,
}

/// Output of one engine tick
#[derive(Debug, Clone, Copy)]
pub struct ControlTick {
    /// Power to command for the coming tick [%]
    pub power_percent: f32,
    /// Requested delay before the next tick [ms]
    pub next_tick_ms: u32,
    /// Present on the tick that ends a stop sequence
    pub stop_outcome: Option<StopOutcome>,
}

/// The control engine: mode, controller state and routine ownership
pub struct ControlEngine {
    mode: ControlMode,
    pid: Pid,
    applied_gains: (f32, f32, f32),
    applied_pid_enabled: bool,
    open_loop_ramp: f32,
    stop_target: StopPosition,
    stop_deadline_ms: u32,
    power_percent: f32,
    calibration: MaxRpmCalibration,
    autotune: PidAutotune,
    calibration_requested: bool,
    calibration_cancel: bool,
    autotune_requested: bool,
    autotune_cancel: bool,
    force_stop: bool,
}

impl ControlEngine {
    pub fn new(config: &Config, now_ms: u32) -> Self {
        Self {
            mode: ControlMode::Idle,
            pid: Pid::new(config.kp, config.ki, config.kd, now_ms),
            applied_gains: config.gains(),
            applied_pid_enabled: config.pid_enabled,
            open_loop_ramp: 0.0,
            stop_target: config.stop_position,
            stop_deadline_ms: 0,
            power_percent: 0.0,
            calibration: MaxRpmCalibration::new(),
            autotune: PidAutotune::new(),
            calibration_requested: false,
            calibration_cancel: false,
            autotune_requested: false,
            autotune_cancel: false,
            force_stop: false,
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    /// Power commanded by the most recent tick [%]
    pub fn power_percent(&self) -> f32 {
        self.power_percent
    }

    /// File an operator request; it takes effect at the top of a tick
    pub fn request(&mut self, request: ControlRequest) {
        match request {
            ControlRequest::StartCalibration => self.calibration_requested = true,
            ControlRequest::CancelCalibration => self.calibration_cancel = true,
            ControlRequest::StartAutotune => self.autotune_requested = true,
            ControlRequest::CancelAutotune => self.autotune_cancel = true,
            ControlRequest::ForceStop => self.force_stop = true,
        }
    }

    /// Status snapshot for the external reporter
    pub fn snapshot(&self, inputs: &ControlInputs) -> DriveStatus {
        let (kp, ki, kd) = self.applied_gains;
        DriveStatus {
            power_percent: self.power_percent,
            rpm: inputs.rpm,
            needle_up: inputs.needle_up,
            needle_down: inputs.needle_down,
            mode: self.mode,
            calibration: self.calibration.state(),
            autotune: self.autotune.state(),
            kp,
            ki,
            kd,
        }
    }

    /// One control tick
    pub fn tick(&mut self, config: &mut Config, inputs: &ControlInputs) -> ControlTick {
        if self.force_stop {
            self.force_stop = false;
            return self.enter_idle(inputs.now_ms);
        }

        match self.mode {
            ControlMode::Calibrating => self.calibration_tick(config, inputs),
            ControlMode::Autotuning => self.autotune_tick(config, inputs),
            _ => self.pedal_tick(config, inputs),
        }
    }

    /// Safety exit shared by force-stop and routine teardown: power to zero,
    /// routines cancelled, controller reset
    fn enter_idle(&mut self, now_ms: u32) -> ControlTick {
        if self.calibration.is_active() {
            self.calibration.cancel();
        }
        if self.autotune.is_active() {
            self.autotune.cancel();
        }
        self.calibration_requested = false;
        self.calibration_cancel = false;
        self.autotune_requested = false;
        self.autotune_cancel = false;
        self.pid.reset(now_ms);
        self.open_loop_ramp = 0.0;
        self.mode = ControlMode::Idle;
        self.command(0.0, params::RUN_TICK_MS, None)
    }

    fn command(
        &mut self,
        power_percent: f32,
        next_tick_ms: u32,
        stop_outcome: Option<StopOutcome>,
    ) -> ControlTick {
        self.power_percent = power_percent;
        ControlTick {
            power_percent,
            next_tick_ms,
            stop_outcome,
        }
    }

    fn calibration_tick(&mut self, config: &mut Config, inputs: &ControlInputs) -> ControlTick {
        if self.calibration_cancel {
            self.calibration_cancel = false;
            self.calibration.cancel();
        }

        let power = self.calibration.update(inputs.now_ms, inputs.rpm);
        match self.calibration.state() {
            CalibrationState::Complete => {
                config.max_motor_rpm = self.calibration.max_observed_rpm() as f32;
                self.mode = ControlMode::Idle;
                self.command(0.0, params::RUN_TICK_MS, None)
            }
            CalibrationState::Cancelled => {
                self.mode = ControlMode::Idle;
                self.command(0.0, params::RUN_TICK_MS, None)
            }
            _ => self.command(power, params::calibration::SAMPLE_INTERVAL_MS, None),
        }
    }

    fn autotune_tick(&mut self, config: &mut Config, inputs: &ControlInputs) -> ControlTick {
        if self.autotune_cancel {
            self.autotune_cancel = false;
            self.autotune.cancel();
        }

        let power = self.autotune.update(inputs.now_ms, inputs.rpm);
        match self.autotune.state() {
            AutotuneState::Complete => {
                if let Some(gains) = self.autotune.result() {
                    config.kp = gains.kp;
                    config.ki = gains.ki;
                    config.kd = gains.kd;
                    config.pid_enabled = true;
                }
                self.mode = ControlMode::Idle;
                self.command(0.0, params::RUN_TICK_MS, None)
            }
            AutotuneState::TimedOut | AutotuneState::Cancelled => {
                self.mode = ControlMode::Idle;
                self.command(0.0, params::RUN_TICK_MS, None)
            }
            _ => self.command(power, params::autotune::TICK_MS, None),
        }
    }

    fn pedal_tick(&mut self, config: &mut Config, inputs: &ControlInputs) -> ControlTick {
        // Gain changes apply only at the top of a tick, never mid-update, and
        // always with a fresh controller
        if config.gains() != self.applied_gains {
            self.pid = Pid::new(config.kp, config.ki, config.kd, inputs.now_ms);
            self.applied_gains = config.gains();
        }
        // Toggling the control path also invalidates the controller state
        if config.pid_enabled != self.applied_pid_enabled {
            self.pid.reset(inputs.now_ms);
            self.applied_pid_enabled = config.pid_enabled;
        }

        let engaged = phase::pedal_engaged(inputs.pedal_raw);

        match self.mode {
            ControlMode::Idle => {
                if !engaged {
                    if self.calibration_requested {
                        self.calibration_requested = false;
                        self.calibration.start(inputs.now_ms);
                        self.mode = ControlMode::Calibrating;
                        return self.command(0.0, params::calibration::SAMPLE_INTERVAL_MS, None);
                    }
                    if self.autotune_requested {
                        self.autotune_requested = false;
                        self.autotune.start(inputs.now_ms, config);
                        self.mode = ControlMode::Autotuning;
                        return self.command(0.0, params::autotune::TICK_MS, None);
                    }
                    return self.command(0.0, params::RUN_TICK_MS, None);
                }

                // Pedal just pressed: ramp up from zero
                self.mode = ControlMode::SoftStart;
                self.open_loop_ramp = 0.0;
                self.pid.reset(inputs.now_ms);
                self.drive_tick(config, inputs)
            }
            ControlMode::SoftStart | ControlMode::Running => {
                if !engaged {
                    return self.begin_stop(config, inputs);
                }
                self.drive_tick(config, inputs)
            }
            ControlMode::Stopping => self.stopping_tick(inputs),
            // Calibrating/Autotuning are dispatched by the caller
            _ => self.command(0.0, params::RUN_TICK_MS, None),
        }
    }

    /// Soft-start and running power computation while the pedal is engaged
    fn drive_tick(&mut self, config: &Config, inputs: &ControlInputs) -> ControlTick {
        if config.pid_enabled {
            let target_rpm = phase::pedal_to_target_rpm(
                inputs.pedal_raw,
                config.max_rpm_setting,
                config.max_motor_rpm,
            );

            if self.mode == ControlMode::SoftStart {
                let step = target_rpm / config.soft_start_ramp_steps as f32;
                if self.pid.advance_soft_start(step, target_rpm) {
                    self.mode = ControlMode::Running;
                }
                let setpoint = self.pid.soft_start_setpoint();
                let power = self.pid.update(inputs.now_ms, setpoint, inputs.rpm as f32);
                self.command(power, config.soft_start_step_ms, None)
            } else {
                let power = self
                    .pid
                    .update(inputs.now_ms, target_rpm, inputs.rpm as f32);
                self.command(power, params::RUN_TICK_MS, None)
            }
        } else {
            let target_power = phase::pedal_to_open_loop_power(
                inputs.pedal_raw,
                config.free_running_power_percent,
                config.load_offset_percent,
            );

            if self.mode == ControlMode::SoftStart {
                let step = target_power / config.soft_start_ramp_steps as f32;
                self.open_loop_ramp += step;
                if self.open_loop_ramp >= target_power {
                    self.open_loop_ramp = target_power;
                    self.mode = ControlMode::Running;
                }
                self.command(self.open_loop_ramp, config.soft_start_step_ms, None)
            } else {
                self.command(target_power, params::RUN_TICK_MS, None)
            }
        }
    }

    /// Pedal released: creep toward the configured needle position
    fn begin_stop(&mut self, config: &Config, inputs: &ControlInputs) -> ControlTick {
        self.pid.reset(inputs.now_ms);
        self.open_loop_ramp = 0.0;
        self.stop_target = config.stop_position;
        self.stop_deadline_ms = inputs.now_ms.wrapping_add(params::STOP_TIMEOUT_MS);
        self.mode = ControlMode::Stopping;
        self.stopping_tick(inputs)
    }

    fn stopping_tick(&mut self, inputs: &ControlInputs) -> ControlTick {
        let at_target = match self.stop_target {
            StopPosition::Up => inputs.needle_up,
            StopPosition::Down => inputs.needle_down,
        };
        if at_target {
            self.mode = ControlMode::Idle;
            return self.command(0.0, params::RUN_TICK_MS, Some(StopOutcome::AtPosition));
        }
        if (inputs.now_ms.wrapping_sub(self.stop_deadline_ms) as i32) >= 0 {
            self.mode = ControlMode::Idle;
            return self.command(0.0, params::RUN_TICK_MS, Some(StopOutcome::Timeout));
        }
        self.command(params::STOP_CREEP_PERCENT, params::STOP_TICK_MS, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::params::{PEDAL_ADC_MAX, STOP_CREEP_PERCENT, STOP_TIMEOUT_MS};

    fn inputs(now_ms: u32, pedal_raw: u16, rpm: u32) -> ControlInputs {
        ControlInputs {
            now_ms,
            pedal_raw,
            rpm,
            needle_up: false,
            needle_down: false,
        }
    }

    #[test]
    fn test_idle_holds_power_off() {
        let mut config = Config::default();
        let mut engine = ControlEngine::new(&config, 0);
        let tick = engine.tick(&mut config, &inputs(0, 0, 0));
        assert_eq!(tick.power_percent, 0.0);
        assert_eq!(engine.mode(), ControlMode::Idle);
    }

    #[test]
    fn test_pid_soft_start_lands_exactly_on_target() {
        let mut config = Config::default();
        config.pid_enabled = true;
        config.max_rpm_setting = 300.0;
        let mut engine = ControlEngine::new(&config, 0);

        // Full pedal: target 300 RPM, 50 ramp steps of 6 RPM
        let mut now = 0;
        for _ in 0..49 {
            engine.tick(&mut config, &inputs(now, PEDAL_ADC_MAX, 0));
            assert_eq!(engine.mode(), ControlMode::SoftStart);
            now += config.soft_start_step_ms;
        }
        engine.tick(&mut config, &inputs(now, PEDAL_ADC_MAX, 0));
        assert_eq!(engine.mode(), ControlMode::Running);
        assert_eq!(engine.pid.soft_start_setpoint(), 300.0);
    }

    #[test]
    fn test_open_loop_soft_start_reaches_target_power() {
        let mut config = Config::default();
        let mut engine = ControlEngine::new(&config, 0);

        // Defaults: 80% + 10% at full pedal
        let mut now = 0;
        let mut last_power = 0.0;
        while engine.mode() != ControlMode::Running {
            let tick = engine.tick(&mut config, &inputs(now, PEDAL_ADC_MAX, 0));
            assert!(tick.power_percent > last_power || tick.power_percent == 90.0);
            assert!(tick.power_percent <= 90.0);
            last_power = tick.power_percent;
            now += config.soft_start_step_ms;
        }
        assert_eq!(engine.power_percent(), 90.0);

        // Running keeps commanding the pedal target directly
        let tick = engine.tick(&mut config, &inputs(now, PEDAL_ADC_MAX, 0));
        assert_eq!(tick.power_percent, 90.0);
        assert_eq!(tick.next_tick_ms, params::RUN_TICK_MS);
    }

    #[test]
    fn test_release_creeps_until_the_needle_sensor() {
        let mut config = Config::default();
        let mut engine = ControlEngine::new(&config, 0);

        engine.tick(&mut config, &inputs(0, PEDAL_ADC_MAX, 0));
        let tick = engine.tick(&mut config, &inputs(20, 0, 100));
        assert_eq!(engine.mode(), ControlMode::Stopping);
        assert_eq!(tick.power_percent, STOP_CREEP_PERCENT);

        // Default stop position is Down; Up asserting does not finish it
        let mut up = inputs(70, 0, 50);
        up.needle_up = true;
        let tick = engine.tick(&mut config, &up);
        assert_eq!(tick.stop_outcome, None);

        let mut down = inputs(120, 0, 20);
        down.needle_down = true;
        let tick = engine.tick(&mut config, &down);
        assert_eq!(tick.stop_outcome, Some(StopOutcome::AtPosition));
        assert_eq!(tick.power_percent, 0.0);
        assert_eq!(engine.mode(), ControlMode::Idle);
    }

    #[test]
    fn test_stop_sequence_times_out() {
        let mut config = Config::default();
        let mut engine = ControlEngine::new(&config, 0);

        engine.tick(&mut config, &inputs(0, PEDAL_ADC_MAX, 0));
        engine.tick(&mut config, &inputs(20, 0, 100));
        assert_eq!(engine.mode(), ControlMode::Stopping);

        // The sensor never asserts; the sequence must end at the deadline
        let tick = engine.tick(&mut config, &inputs(20 + STOP_TIMEOUT_MS, 0, 0));
        assert_eq!(tick.stop_outcome, Some(StopOutcome::Timeout));
        assert_eq!(tick.power_percent, 0.0);
        assert_eq!(engine.mode(), ControlMode::Idle);
    }

    #[test]
    fn test_gain_change_is_applied_at_tick_top() {
        let mut config = Config::default();
        let mut engine = ControlEngine::new(&config, 0);
        engine.tick(&mut config, &inputs(0, 0, 0));

        config.kp = 2.0;
        let snapshot = {
            let i = inputs(20, 0, 0);
            engine.tick(&mut config, &i);
            engine.snapshot(&i)
        };
        assert_eq!(snapshot.kp, 2.0);
        assert_eq!(engine.pid.gains(), (2.0, 0.01, 0.05));
    }

    #[test]
    fn test_pid_enable_toggle_resets_the_controller() {
        let mut config = Config::default();
        config.pid_enabled = true;
        let mut engine = ControlEngine::new(&config, 0);

        engine.tick(&mut config, &inputs(0, PEDAL_ADC_MAX, 0));
        engine.tick(&mut config, &inputs(20, PEDAL_ADC_MAX, 0));
        assert!(engine.pid.soft_start_setpoint() > 0.0);

        // Switching to open loop clears the stale controller state
        config.pid_enabled = false;
        engine.tick(&mut config, &inputs(40, PEDAL_ADC_MAX, 0));
        assert_eq!(engine.pid.soft_start_setpoint(), 0.0);
    }

    #[test]
    fn test_calibration_request_waits_for_idle_pedal() {
        let mut config = Config::default();
        let mut engine = ControlEngine::new(&config, 0);

        engine.tick(&mut config, &inputs(0, PEDAL_ADC_MAX, 0));
        engine.request(ControlRequest::StartCalibration);
        engine.tick(&mut config, &inputs(20, PEDAL_ADC_MAX, 0));
        assert_ne!(engine.mode(), ControlMode::Calibrating);

        // Release: stop sequence runs out, then the request is honored
        let mut down = inputs(40, 0, 0);
        down.needle_down = true;
        engine.tick(&mut config, &down);
        assert_eq!(engine.mode(), ControlMode::Idle);
        engine.tick(&mut config, &inputs(60, 0, 0));
        assert_eq!(engine.mode(), ControlMode::Calibrating);
    }

    #[test]
    fn test_calibration_writes_the_observed_maximum() {
        let mut config = Config::default();
        let mut engine = ControlEngine::new(&config, 0);

        engine.request(ControlRequest::StartCalibration);
        engine.tick(&mut config, &inputs(0, 0, 0));
        assert_eq!(engine.mode(), ControlMode::Calibrating);

        let mut now = 0;
        while engine.mode() == ControlMode::Calibrating {
            now += 100;
            let tick = engine.tick(&mut config, &inputs(now, 0, 1_650));
            assert!(tick.power_percent == 100.0 || tick.power_percent == 0.0);
        }
        assert_eq!(config.max_motor_rpm, 1_650.0);
        assert_eq!(engine.mode(), ControlMode::Idle);
    }

    #[test]
    fn test_cancelled_calibration_leaves_config_untouched() {
        let mut config = Config::default();
        let mut engine = ControlEngine::new(&config, 0);

        engine.request(ControlRequest::StartCalibration);
        engine.tick(&mut config, &inputs(0, 0, 0));
        engine.tick(&mut config, &inputs(100, 0, 1_650));

        engine.request(ControlRequest::CancelCalibration);
        let tick = engine.tick(&mut config, &inputs(200, 0, 1_650));
        assert_eq!(tick.power_percent, 0.0);
        assert_eq!(engine.mode(), ControlMode::Idle);
        assert_eq!(config.max_motor_rpm, 2_000.0);
    }

    #[test]
    fn test_autotune_writes_gains_and_enables_pid() {
        let mut config = Config::default();
        let mut engine = ControlEngine::new(&config, 0);

        engine.request(ControlRequest::StartAutotune);
        engine.tick(&mut config, &inputs(0, 0, 0));
        assert_eq!(engine.mode(), ControlMode::Autotuning);

        // Drive an alternating response around the 300 RPM target
        let mut now = 0;
        let mut high = true;
        while engine.mode() == ControlMode::Autotuning {
            now += 100;
            let rpm = if now <= 2_000 {
                0
            } else {
                high = !high;
                if high {
                    350
                } else {
                    250
                }
            };
            engine.tick(&mut config, &inputs(now, 0, rpm));
            assert!(now < 60_000);
        }

        assert!(config.pid_enabled);
        assert_eq!(config.gains(), (0.24, 0.24, 0.06));
        assert_eq!(engine.mode(), ControlMode::Idle);
    }

    #[test]
    fn test_force_stop_clears_an_active_routine() {
        let mut config = Config::default();
        let mut engine = ControlEngine::new(&config, 0);

        engine.request(ControlRequest::StartAutotune);
        engine.tick(&mut config, &inputs(0, 0, 0));
        assert_eq!(engine.mode(), ControlMode::Autotuning);

        engine.request(ControlRequest::ForceStop);
        let tick = engine.tick(&mut config, &inputs(50, 0, 200));
        assert_eq!(tick.power_percent, 0.0);
        assert_eq!(engine.mode(), ControlMode::Idle);
        assert!(!config.pid_enabled);
    }
}
