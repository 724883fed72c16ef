//! Shaft speed sensing
//!
//! `PulseCounter` is the interrupt-side capture cell for the shaft pulse
//! sensor; `RpmSampler` converts the accumulated pulse count into RPM once per
//! control tick. The sampler's own call cadence defines the sampling window,
//! so callers must invoke it at a roughly fixed tick rate.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::config::params::PULSE_DEBOUNCE_US;

/// Debounced pulse accumulator. Written only by the pulse interrupt, drained
/// by the control task. Both fields are single-word atomics; no locks.
pub struct PulseCounter {
    pulses: AtomicU32,
    last_accepted_us: AtomicU32,
}

impl PulseCounter {
    pub const fn new() -> Self {
        Self {
            pulses: AtomicU32::new(0),
            last_accepted_us: AtomicU32::new(0),
        }
    }

    /// Interrupt side: count a rising edge. Edges closer than the debounce
    /// interval to the previously accepted edge are contact bounce and are
    /// dropped. Safe to call from interrupt context.
    #[inline(always)]
    pub fn record_pulse(&self, now_us: u32) {
        let last = self.last_accepted_us.load(Ordering::Relaxed);
        if (now_us.wrapping_sub(last) as i32) > PULSE_DEBOUNCE_US as i32 {
            self.pulses.fetch_add(1, Ordering::Relaxed);
            self.last_accepted_us.store(now_us, Ordering::Relaxed);
        }
    }

    /// Task side: take the pulses accumulated since the last call, starting a
    /// new window
    pub fn take(&self) -> u32 {
        self.pulses.swap(0, Ordering::Relaxed)
    }
}

/// Windowed RPM computation over wall-clock time
pub struct RpmSampler {
    last_sample_ms: u32,
}

impl RpmSampler {
    pub const fn new(now_ms: u32) -> Self {
        Self {
            last_sample_ms: now_ms,
        }
    }

    /// Convert the pulse count of the window since the previous call into
    /// integer RPM. A zero-length window reports 0 instead of dividing by
    /// zero, and a stalled shaft (no pulses) reports 0 rather than a stale
    /// value.
    pub fn sample(&mut self, now_ms: u32, pulses: u32, pulses_per_rev: u32) -> u32 {
        let elapsed_ms = now_ms.wrapping_sub(self.last_sample_ms);
        self.last_sample_ms = now_ms;

        if elapsed_ms == 0 || pulses_per_rev == 0 {
            return 0;
        }
        ((pulses as u64 * 60_000) / (elapsed_ms as u64 * pulses_per_rev as u64)) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpm_from_pulse_window() {
        let mut sampler = RpmSampler::new(0);
        // 30 pulses in one second at one pulse per revolution
        assert_eq!(sampler.sample(1_000, 30, 1), 1_800);
    }

    #[test]
    fn test_zero_length_window_reports_zero() {
        let mut sampler = RpmSampler::new(500);
        assert_eq!(sampler.sample(500, 30, 1), 0);
    }

    #[test]
    fn test_stalled_shaft_reports_zero() {
        let mut sampler = RpmSampler::new(0);
        assert_eq!(sampler.sample(1_000, 0, 1), 0);
    }

    #[test]
    fn test_pulses_per_rev_scaling() {
        let mut sampler = RpmSampler::new(0);
        // Two pulses per revolution halves the result
        assert_eq!(sampler.sample(1_000, 30, 2), 900);
        // A zero divisor is guarded, not propagated
        assert_eq!(sampler.sample(2_000, 30, 0), 0);
    }

    #[test]
    fn test_debounce_rejects_fast_edges() {
        let counter = PulseCounter::new();
        counter.record_pulse(1_000);
        counter.record_pulse(1_050); // bounce, 50µs after the accepted edge
        counter.record_pulse(1_090); // bounce
        counter.record_pulse(1_200); // real edge
        assert_eq!(counter.take(), 2);
        // The window restarts after a take
        assert_eq!(counter.take(), 0);
    }
}
