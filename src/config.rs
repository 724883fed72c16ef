//! Runtime configuration
//!
//! In-memory parameter set consumed by the control loop once per tick.
//! Persistence and the operator transport live outside this crate; external
//! writers go through the name-keyed `get`/`set` surface. Unknown names never
//! halt the loop: every field always holds a valid value, starting from the
//! `params` defaults.

pub mod params;

/// Needle stop position selected when the pedal is released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopPosition {
    Up,
    Down,
}

/// Value carried through the name-keyed configuration surface
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParamValue {
    Float(f32),
    Uint(u32),
    Bool(bool),
    Position(StopPosition),
}

/// Configuration surface errors, reported back to the operator layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    UnknownParam,
    WrongType,
}

/// Runtime configuration for the drive core
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// User speed limit [RPM]
    pub max_rpm_setting: f32,

    /// Motor maximum at 100% power [RPM], written by calibration
    pub max_motor_rpm: f32,

    /// Soft-start ramp update period [ms]
    pub soft_start_step_ms: u32,

    /// Number of soft-start ramp increments
    pub soft_start_ramp_steps: u32,

    /// Needle position to stop at when the pedal is released
    pub stop_position: StopPosition,

    /// Open loop: power needed to free-run at the speed limit [%]
    pub free_running_power_percent: f32,

    /// Open loop: additional power reserve for load [%]
    pub load_offset_percent: f32,

    /// Shaft pulses per revolution
    pub pulses_per_rev: u32,

    /// Closed-loop PID control enabled
    pub pid_enabled: bool,

    /// PID proportional gain
    pub kp: f32,

    /// PID integral gain
    pub ki: f32,

    /// PID derivative gain
    pub kd: f32,

    /// Autotune target speed [RPM]
    pub autotune_target_rpm: f32,

    /// Autotune high relay power [%]
    pub autotune_power_high: f32,

    /// Autotune low relay power [%]
    pub autotune_power_low: f32,
}

impl Config {
    /// Default configuration from the `params` constants
    pub const fn default() -> Self {
        Self {
            max_rpm_setting: params::DEFAULT_MAX_RPM_SETTING,
            max_motor_rpm: params::DEFAULT_MAX_MOTOR_RPM,
            soft_start_step_ms: params::DEFAULT_SOFT_START_STEP_MS,
            soft_start_ramp_steps: params::DEFAULT_SOFT_START_RAMP_STEPS,
            stop_position: StopPosition::Down,
            free_running_power_percent: params::DEFAULT_FREE_RUNNING_POWER_PERCENT,
            load_offset_percent: params::DEFAULT_LOAD_OFFSET_PERCENT,
            pulses_per_rev: params::DEFAULT_PULSES_PER_REV,
            pid_enabled: params::DEFAULT_PID_ENABLED,
            kp: params::DEFAULT_KP,
            ki: params::DEFAULT_KI,
            kd: params::DEFAULT_KD,
            autotune_target_rpm: params::autotune::DEFAULT_TARGET_RPM,
            autotune_power_high: params::autotune::DEFAULT_POWER_HIGH,
            autotune_power_low: params::autotune::DEFAULT_POWER_LOW,
        }
    }

    /// Current PID gain triple, compared against the last-applied copy by the
    /// control engine at the top of every tick
    pub fn gains(&self) -> (f32, f32, f32) {
        (self.kp, self.ki, self.kd)
    }

    /// Read a parameter by name. Unknown names return `None`.
    pub fn get(&self, name: &str) -> Option<ParamValue> {
        let value = match name {
            "max_rpm_setting" => ParamValue::Float(self.max_rpm_setting),
            "max_motor_rpm" => ParamValue::Float(self.max_motor_rpm),
            "soft_start_step_ms" => ParamValue::Uint(self.soft_start_step_ms),
            "soft_start_ramp_steps" => ParamValue::Uint(self.soft_start_ramp_steps),
            "stop_position" => ParamValue::Position(self.stop_position),
            "free_running_power_percent" => ParamValue::Float(self.free_running_power_percent),
            "load_offset_percent" => ParamValue::Float(self.load_offset_percent),
            "pulses_per_rev" => ParamValue::Uint(self.pulses_per_rev),
            "pid_enabled" => ParamValue::Bool(self.pid_enabled),
            "kp" => ParamValue::Float(self.kp),
            "ki" => ParamValue::Float(self.ki),
            "kd" => ParamValue::Float(self.kd),
            "autotune_target_rpm" => ParamValue::Float(self.autotune_target_rpm),
            "autotune_power_high" => ParamValue::Float(self.autotune_power_high),
            "autotune_power_low" => ParamValue::Float(self.autotune_power_low),
            _ => return None,
        };
        Some(value)
    }

    /// Write a parameter by name, rejecting unknown names and type mismatches
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ConfigError> {
        use ParamValue::*;
        match (name, value) {
            ("max_rpm_setting", Float(v)) => self.max_rpm_setting = v,
            ("max_motor_rpm", Float(v)) => self.max_motor_rpm = v,
            ("soft_start_step_ms", Uint(v)) => self.soft_start_step_ms = v,
            ("soft_start_ramp_steps", Uint(v)) => self.soft_start_ramp_steps = v,
            ("stop_position", Position(v)) => self.stop_position = v,
            ("free_running_power_percent", Float(v)) => self.free_running_power_percent = v,
            ("load_offset_percent", Float(v)) => self.load_offset_percent = v,
            ("pulses_per_rev", Uint(v)) => self.pulses_per_rev = v,
            ("pid_enabled", Bool(v)) => self.pid_enabled = v,
            ("kp", Float(v)) => self.kp = v,
            ("ki", Float(v)) => self.ki = v,
            ("kd", Float(v)) => self.kd = v,
            ("autotune_target_rpm", Float(v)) => self.autotune_target_rpm = v,
            ("autotune_power_high", Float(v)) => self.autotune_power_high = v,
            ("autotune_power_low", Float(v)) => self.autotune_power_low = v,
            (name, _) if self.get(name).is_some() => return Err(ConfigError::WrongType),
            _ => return Err(ConfigError::UnknownParam),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.max_rpm_setting, 500.0);
        assert_eq!(config.max_motor_rpm, 2000.0);
        assert_eq!(config.soft_start_ramp_steps, 50);
        assert_eq!(config.stop_position, StopPosition::Down);
        assert!(!config.pid_enabled);
        assert_eq!(config.gains(), (0.5, 0.01, 0.05));
    }

    #[test]
    fn test_set_and_get_by_name() {
        let mut config = Config::default();
        config.set("kp", ParamValue::Float(1.25)).unwrap();
        config
            .set("stop_position", ParamValue::Position(StopPosition::Up))
            .unwrap();
        config.set("pid_enabled", ParamValue::Bool(true)).unwrap();

        assert_eq!(config.get("kp"), Some(ParamValue::Float(1.25)));
        assert_eq!(
            config.get("stop_position"),
            Some(ParamValue::Position(StopPosition::Up))
        );
        assert!(config.pid_enabled);
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let mut config = Config::default();
        assert_eq!(config.get("wifi_ssid"), None);
        assert_eq!(
            config.set("wifi_ssid", ParamValue::Bool(true)),
            Err(ConfigError::UnknownParam)
        );
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let mut config = Config::default();
        assert_eq!(
            config.set("kp", ParamValue::Bool(true)),
            Err(ConfigError::WrongType)
        );
        // The stored value is untouched after a rejected write
        assert_eq!(config.kp, 0.5);
    }
}
