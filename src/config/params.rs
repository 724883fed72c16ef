//! Drive control and pedal input parameters

/// AC mains half-cycle duration [µs] (50Hz mains; use 8333 for 60Hz)
pub const AC_HALF_CYCLE_US: u32 = 10_000;

/// Minimum firing delay after a zero crossing [µs] (TRIAC reaction time)
pub const MIN_FIRE_DELAY_US: u32 = 500;

/// Safety margin before the next zero crossing [µs]
pub const ZERO_CROSS_MARGIN_US: u32 = 200;

/// Latest usable firing delay [µs]
pub const MAX_EFFECTIVE_DELAY_US: u32 = AC_HALF_CYCLE_US - ZERO_CROSS_MARGIN_US;

/// "Do not fire this cycle" sentinel delay [µs] (beyond the half-cycle)
pub const TRIAC_OFF_DELAY_US: u32 = AC_HALF_CYCLE_US + 100;

/// TRIAC gate pulse width [µs]
pub const GATE_PULSE_US: u32 = 50;

/// Power percentage at or below which the motor is held off
pub const MOTOR_OFF_PERCENT: f32 = 5.0;

/// Full-scale pedal ADC reading (12-bit)
pub const PEDAL_ADC_MAX: u16 = 4095;

/// Pedal readings at or below this count are "not pressed"
pub const PEDAL_DEAD_ZONE: u16 = 100;

/// Minimum interval between accepted shaft pulses [µs] (contact bounce)
pub const PULSE_DEBOUNCE_US: u32 = 100;

/// Control tick period outside soft start [ms]
pub const RUN_TICK_MS: u32 = 20;

/// Stop-sequence poll period [ms]
pub const STOP_TICK_MS: u32 = 50;

/// Creep power during the stop sequence [%] (must exceed MOTOR_OFF_PERCENT)
pub const STOP_CREEP_PERCENT: f32 = 8.0;

/// Stop-sequence timeout [ms]
pub const STOP_TIMEOUT_MS: u32 = 5_000;

/// User speed limit [RPM] (default value)
pub const DEFAULT_MAX_RPM_SETTING: f32 = 500.0;

/// Motor maximum at 100% power [RPM] (default before calibration)
pub const DEFAULT_MAX_MOTOR_RPM: f32 = 2_000.0;

/// Soft-start ramp update period [ms] (default value)
pub const DEFAULT_SOFT_START_STEP_MS: u32 = 20;

/// Number of soft-start ramp increments (default value)
pub const DEFAULT_SOFT_START_RAMP_STEPS: u32 = 50;

/// Power needed to free-run at the speed limit [%] (default value)
pub const DEFAULT_FREE_RUNNING_POWER_PERCENT: f32 = 80.0;

/// Additional power reserve for load [%] (default value)
pub const DEFAULT_LOAD_OFFSET_PERCENT: f32 = 10.0;

/// Shaft pulses per revolution (default value; 1 = single handwheel magnet)
pub const DEFAULT_PULSES_PER_REV: u32 = 1;

/// Closed-loop PID control enabled (default value)
pub const DEFAULT_PID_ENABLED: bool = false;

/// PID proportional gain (default value)
pub const DEFAULT_KP: f32 = 0.5;

/// PID integral gain (default value)
pub const DEFAULT_KI: f32 = 0.01;

/// PID derivative gain (default value)
pub const DEFAULT_KD: f32 = 0.05;

/// Max-RPM calibration parameters
pub mod calibration {
    /// Calibration window [ms]
    pub const DURATION_MS: u32 = 5_000;

    /// RPM sample period [ms]
    pub const SAMPLE_INTERVAL_MS: u32 = 100;

    /// Drive power during calibration [%]
    pub const POWER_PERCENT: f32 = 100.0;
}

/// PID autotune parameters
pub mod autotune {
    /// Tuning target speed [RPM] (default value)
    pub const DEFAULT_TARGET_RPM: f32 = 300.0;

    /// High relay power [%] (default value)
    pub const DEFAULT_POWER_HIGH: f32 = 70.0;

    /// Low relay power [%] (default value)
    pub const DEFAULT_POWER_LOW: f32 = 30.0;

    /// Spin-up settle time before relay switching starts [ms]
    pub const SETTLE_MS: u32 = 2_000;

    /// RPM sample period during oscillation [ms]
    pub const SAMPLE_INTERVAL_MS: u32 = 100;

    /// Routine tick period [ms]
    pub const TICK_MS: u32 = 50;

    /// Minimum oscillation time before gains are evaluated [ms]
    pub const MIN_EVAL_MS: u32 = 10_000;

    /// Overall tuning timeout, measured from the end of spin-up [ms]
    pub const TIMEOUT_MS: u32 = 45_000;

    /// RPM samples at or below this are ignored (motor not yet turning)
    pub const MIN_VALID_RPM: u32 = 10;

    /// Relay switching band around the target (fraction of target RPM)
    pub const HYSTERESIS_FRACTION: f32 = 0.1;

    /// Minimum peak-to-trough swing for a usable oscillation (fraction of target RPM)
    pub const MIN_SWING_FRACTION: f32 = 0.1;

    /// Assumed oscillation period [s] (approximation, not measured)
    pub const ASSUMED_PERIOD_S: f32 = 2.0;

    /// Ultimate-gain fallback when no RPM swing was measured
    pub const FALLBACK_ULTIMATE_GAIN: f32 = 0.5;
}
