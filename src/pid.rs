//! PID speed controller
//!
//! Converts a speed error into a power percentage clamped to `[0, 100]`.
//! The integral term is not clamped; callers must `reset()` whenever control
//! resumes after an idle period or a gain change, otherwise stale
//! integral/derivative state causes a transient. The soft-start auxiliary
//! setpoint lives here so a reset clears it together with the rest of the
//! controller state.

/// PID controller with a soft-start auxiliary setpoint
pub struct Pid {
    kp: f32,
    ki: f32,
    kd: f32,
    integral: f32,
    previous_error: f32,
    last_update_ms: u32,
    soft_start_setpoint: f32,
}

impl Pid {
    pub fn new(kp: f32, ki: f32, kd: f32, now_ms: u32) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral: 0.0,
            previous_error: 0.0,
            last_update_ms: now_ms,
            soft_start_setpoint: 0.0,
        }
    }

    /// Gains this controller was built with
    pub fn gains(&self) -> (f32, f32, f32) {
        (self.kp, self.ki, self.kd)
    }

    /// One control update.
    ///
    /// The time step is the wall-clock distance to the previous update. A
    /// zero-length step returns the stored previous error unchanged instead
    /// of dividing by zero.
    pub fn update(&mut self, now_ms: u32, setpoint: f32, measured: f32) -> f32 {
        let dt = now_ms.wrapping_sub(self.last_update_ms) as f32 / 1000.0;
        if dt == 0.0 {
            return self.previous_error;
        }

        let error = setpoint - measured;

        let p_term = self.kp * error;

        self.integral += error * dt;
        let i_term = self.ki * self.integral;

        let d_term = self.kd * (error - self.previous_error) / dt;

        self.previous_error = error;
        self.last_update_ms = now_ms;

        (p_term + i_term + d_term).clamp(0.0, 100.0)
    }

    /// Clear integral, previous error and the soft-start setpoint, and
    /// re-stamp the time base
    pub fn reset(&mut self, now_ms: u32) {
        self.integral = 0.0;
        self.previous_error = 0.0;
        self.last_update_ms = now_ms;
        self.soft_start_setpoint = 0.0;
    }

    /// Current soft-start setpoint
    pub fn soft_start_setpoint(&self) -> f32 {
        self.soft_start_setpoint
    }

    /// Advance the soft-start setpoint by one ramp step, clamping at
    /// `target`. Returns true once the target is reached.
    pub fn advance_soft_start(&mut self, step: f32, target: f32) -> bool {
        self.soft_start_setpoint += step;
        if self.soft_start_setpoint >= target {
            self.soft_start_setpoint = target;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proportional_only() {
        let mut pid = Pid::new(1.0, 0.0, 0.0, 0);
        let output = pid.update(1_000, 100.0, 80.0);
        assert_eq!(output, 20.0);
    }

    #[test]
    fn test_output_clamped_to_power_range() {
        let mut pid = Pid::new(1.0, 0.0, 0.0, 0);
        assert_eq!(pid.update(1_000, 500.0, 0.0), 100.0);

        let mut pid = Pid::new(1.0, 0.0, 0.0, 0);
        assert_eq!(pid.update(1_000, 0.0, 500.0), 0.0);
    }

    #[test]
    fn test_zero_dt_does_not_divide() {
        let mut pid = Pid::new(1.0, 0.0, 0.0, 0);
        let first = pid.update(1_000, 100.0, 80.0);
        assert_eq!(first, 20.0);
        // Two calls in the same millisecond return the same value both times
        let a = pid.update(1_000, 100.0, 80.0);
        let b = pid.update(1_000, 100.0, 80.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_integral_accumulation() {
        let mut pid = Pid::new(0.0, 1.0, 0.0, 0);
        // Error 10 over 1s: integral contributes 10
        assert_eq!(pid.update(1_000, 10.0, 0.0), 10.0);
        // Another second at the same error doubles the integral
        assert_eq!(pid.update(2_000, 10.0, 0.0), 20.0);
    }

    #[test]
    fn test_derivative_term() {
        let mut pid = Pid::new(0.0, 0.0, 1.0, 0);
        // First step: error jumps 0 -> 10 over 1s
        assert_eq!(pid.update(1_000, 10.0, 0.0), 10.0);
        // Constant error: derivative falls to zero
        assert_eq!(pid.update(2_000, 10.0, 0.0), 0.0);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut pid = Pid::new(0.0, 1.0, 0.0, 0);
        pid.update(1_000, 10.0, 0.0);
        pid.advance_soft_start(5.0, 100.0);
        pid.reset(1_000);
        assert_eq!(pid.soft_start_setpoint(), 0.0);
        // Integral starts over after the reset
        assert_eq!(pid.update(2_000, 10.0, 0.0), 10.0);
    }

    #[test]
    fn test_soft_start_reaches_target_exactly() {
        let mut pid = Pid::new(1.0, 0.0, 0.0, 0);
        let target = 300.0;
        let step = target / 50.0;
        let mut reached = 0;
        for _ in 0..50 {
            let before = pid.soft_start_setpoint();
            if pid.advance_soft_start(step, target) {
                reached += 1;
            }
            // Strictly increasing until the target, never beyond it
            assert!(pid.soft_start_setpoint() > before);
            assert!(pid.soft_start_setpoint() <= target);
        }
        assert_eq!(reached, 1);
        assert_eq!(pid.soft_start_setpoint(), target);
    }
}
