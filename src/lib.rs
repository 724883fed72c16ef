// AC phase-angle drive core for a pedal-controlled sewing machine motor
// Hardware-independent control logic; time is injected as integer timestamps

#![no_std]

pub mod autotune;
pub mod calibration;
pub mod config;
pub mod control;
pub mod firing;
pub mod phase;
pub mod pid;
pub mod sensor;
pub mod status;

// Re-export main types for easier access
pub use autotune::{AutotuneResult, AutotuneState, PidAutotune};
pub use calibration::{CalibrationState, MaxRpmCalibration};
pub use config::{Config, ConfigError, ParamValue, StopPosition};
pub use control::{ControlEngine, ControlInputs, ControlMode, ControlTick, StopOutcome};
pub use firing::{FiringDelayCell, FiringPlanner, GateAction, ZeroCrossStamp};
pub use pid::Pid;
pub use sensor::{PulseCounter, RpmSampler};
pub use status::{ControlRequest, DriveStatus};
