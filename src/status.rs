// Status and command surface between the drive core and the operator layer
// (transport-agnostic; an external reporter consumes these types)

use crate::autotune::AutotuneState;
use crate::calibration::CalibrationState;
use crate::config::params;
use crate::control::ControlMode;

/// Operator requests, consumed at the top of a control tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlRequest {
    StartCalibration,
    CancelCalibration,
    StartAutotune,
    CancelAutotune,
    /// Zero power, clear all active modes
    ForceStop,
}

/// Read-only drive snapshot, published once per control tick
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriveStatus {
    /// Commanded power [%]
    pub power_percent: f32,
    /// Measured shaft speed [RPM]
    pub rpm: u32,
    pub needle_up: bool,
    pub needle_down: bool,
    pub mode: ControlMode,
    pub calibration: CalibrationState,
    pub autotune: AutotuneState,
    /// PID gains currently applied by the controller
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl DriveStatus {
    pub const fn new() -> Self {
        Self {
            power_percent: 0.0,
            rpm: 0,
            needle_up: false,
            needle_down: false,
            mode: ControlMode::Idle,
            calibration: CalibrationState::Idle,
            autotune: AutotuneState::Idle,
            kp: params::DEFAULT_KP,
            ki: params::DEFAULT_KI,
            kd: params::DEFAULT_KD,
        }
    }
}

impl Default for DriveStatus {
    fn default() -> Self {
        Self::new()
    }
}
