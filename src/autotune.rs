//! Relay-method PID autotune
//!
//! Forces an oscillation by switching between two power levels around a
//! target speed, then derives gains with Ziegler-Nichols constants. Only the
//! swing amplitude is taken from the data; the oscillation period is the
//! `ASSUMED_PERIOD_S` constant, not a measured peak-to-peak time. Replacing
//! the constant with real peak/valley timestamps changes the resulting gains.

use crate::config::params::autotune::{
    ASSUMED_PERIOD_S, FALLBACK_ULTIMATE_GAIN, HYSTERESIS_FRACTION, MIN_EVAL_MS,
    MIN_SWING_FRACTION, MIN_VALID_RPM, SAMPLE_INTERVAL_MS, SETTLE_MS, TIMEOUT_MS,
};
use crate::config::Config;

/// Autotune routine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AutotuneState {
    /// Not started
    Idle,
    /// High power, waiting for the motor to come up to speed
    Spinup,
    /// Relay switching between the high and low power levels
    Oscillating,
    /// Gains derived and reported
    Complete,
    /// No usable oscillation within the timeout, nothing written
    TimedOut,
    /// Stopped externally, nothing written
    Cancelled,
}

/// Gains produced by a completed autotune run
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AutotuneResult {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

/// Relay autotune routine
pub struct PidAutotune {
    state: AutotuneState,
    target_rpm: f32,
    power_high: f32,
    power_low: f32,
    spinup_deadline_ms: u32,
    oscillation_started_ms: u32,
    last_sample_ms: u32,
    max_rpm: u32,
    min_rpm: u32,
    power_cmd: f32,
    result: Option<AutotuneResult>,
}

impl PidAutotune {
    pub const fn new() -> Self {
        Self {
            state: AutotuneState::Idle,
            target_rpm: 0.0,
            power_high: 0.0,
            power_low: 0.0,
            spinup_deadline_ms: 0,
            oscillation_started_ms: 0,
            last_sample_ms: 0,
            max_rpm: 0,
            min_rpm: u32::MAX,
            power_cmd: 0.0,
            result: None,
        }
    }

    /// Begin a run with the tuning parameters captured from the configuration
    pub fn start(&mut self, now_ms: u32, config: &Config) {
        self.state = AutotuneState::Spinup;
        self.target_rpm = config.autotune_target_rpm;
        self.power_high = config.autotune_power_high;
        self.power_low = config.autotune_power_low;
        self.spinup_deadline_ms = now_ms.wrapping_add(SETTLE_MS);
        self.max_rpm = 0;
        self.min_rpm = u32::MAX;
        self.power_cmd = self.power_high;
        self.result = None;
    }

    /// Observed at the top of the next tick
    pub fn cancel(&mut self) {
        if self.is_active() {
            self.state = AutotuneState::Cancelled;
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, AutotuneState::Spinup | AutotuneState::Oscillating)
    }

    pub fn state(&self) -> AutotuneState {
        self.state
    }

    /// Gains from the last completed run
    pub fn result(&self) -> Option<AutotuneResult> {
        self.result
    }

    /// One routine tick. Returns the power percentage to command.
    pub fn update(&mut self, now_ms: u32, rpm: u32) -> f32 {
        match self.state {
            AutotuneState::Spinup => {
                if (now_ms.wrapping_sub(self.spinup_deadline_ms) as i32) >= 0 {
                    self.state = AutotuneState::Oscillating;
                    self.oscillation_started_ms = now_ms;
                    self.last_sample_ms = now_ms;
                }
                self.power_cmd
            }
            AutotuneState::Oscillating => self.oscillation_tick(now_ms, rpm),
            _ => 0.0,
        }
    }

    fn oscillation_tick(&mut self, now_ms: u32, rpm: u32) -> f32 {
        let elapsed_ms = now_ms.wrapping_sub(self.oscillation_started_ms);
        if elapsed_ms >= TIMEOUT_MS {
            self.state = AutotuneState::TimedOut;
            return 0.0;
        }

        // Sample on a fixed grid, ignoring readings from a barely turning shaft
        if rpm > MIN_VALID_RPM
            && now_ms.wrapping_sub(self.last_sample_ms) >= SAMPLE_INTERVAL_MS
        {
            self.last_sample_ms = now_ms;

            let rpm_f = rpm as f32;
            if rpm_f < self.target_rpm * (1.0 - HYSTERESIS_FRACTION) {
                self.power_cmd = self.power_high;
            } else if rpm_f > self.target_rpm * (1.0 + HYSTERESIS_FRACTION) {
                self.power_cmd = self.power_low;
            }

            if rpm > self.max_rpm {
                self.max_rpm = rpm;
            }
            if rpm < self.min_rpm {
                self.min_rpm = rpm;
            }

            if elapsed_ms > MIN_EVAL_MS {
                let swing = self.max_rpm.saturating_sub(self.min_rpm) as f32;
                if swing > self.target_rpm * MIN_SWING_FRACTION {
                    self.result = Some(derive_gains(self.power_high - self.power_low, swing));
                    self.state = AutotuneState::Complete;
                    return 0.0;
                }
            }
        }
        self.power_cmd
    }
}

/// Ziegler-Nichols continuous-cycling gains from the relay swing
fn derive_gains(delta_power: f32, delta_rpm: f32) -> AutotuneResult {
    let ku = if delta_rpm > 0.0 {
        delta_power / delta_rpm
    } else {
        FALLBACK_ULTIMATE_GAIN
    };
    let pu = ASSUMED_PERIOD_S;

    let kp = 0.6 * ku;
    let ki = kp / (pu / 2.0);
    let kd = kp * (pu / 8.0);

    AutotuneResult {
        kp: round_gain(kp),
        ki: round_gain(ki),
        kd: round_gain(kd),
    }
}

/// Round a gain to three decimals for reporting and storage
fn round_gain(gain: f32) -> f32 {
    libm::roundf(gain * 1000.0) / 1000.0
}
