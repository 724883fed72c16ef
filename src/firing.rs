//! Zero-cross reference and per-half-cycle firing decision
//!
//! `ZeroCrossStamp` is the single-writer cell the zero-cross interrupt writes;
//! `FiringDelayCell` is the single-writer cell the control loop writes.
//! `FiringPlanner` is the task-side consumer: it detects a new half-cycle by
//! comparing the stamp against its own last-seen copy (never a boolean flag)
//! and decides whether and when the gate must fire. A torn or stale read is at
//! worst one half-cycle old; the next cycle corrects it.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::config::params::TRIAC_OFF_DELAY_US;
use crate::phase::delay_is_firable;

/// Microsecond timestamp of the most recent zero-cross rising edge
pub struct ZeroCrossStamp(AtomicU32);

impl ZeroCrossStamp {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Interrupt side: store the current microsecond tick. No locks, no
    /// allocation; safe to call from interrupt context.
    #[inline(always)]
    pub fn record(&self, now_us: u32) {
        self.0.store(now_us, Ordering::Relaxed);
    }

    /// Task side: most recent stamp, modulo timer wraparound
    #[inline(always)]
    pub fn latest(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Target firing delay [µs], written by the control loop, read by the firing
/// task. Starts at the off sentinel so the gate stays low until the first
/// power command.
pub struct FiringDelayCell(AtomicU32);

impl FiringDelayCell {
    pub const fn new() -> Self {
        Self(AtomicU32::new(TRIAC_OFF_DELAY_US))
    }

    #[inline(always)]
    pub fn command(&self, delay_us: u32) {
        self.0.store(delay_us, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Gate decision for one poll of the firing task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    /// Spin until `at_us`, then pulse the gate
    Fire { at_us: u32 },
    /// Hold the gate low
    HoldOff,
}

/// Per-half-cycle firing decision state
pub struct FiringPlanner {
    last_seen_us: u32,
}

impl FiringPlanner {
    pub const fn new() -> Self {
        Self { last_seen_us: 0 }
    }

    /// Decide the gate action for this poll.
    ///
    /// A new half-cycle is one whose stamp is ahead of the last handled stamp
    /// (wraparound-aware signed comparison). Each new stamp is consumed
    /// exactly once, so at most one pulse is issued per half-cycle. An
    /// unfirable delay still consumes the stamp and holds the gate low.
    pub fn poll(&mut self, latest_zc_us: u32, delay_us: u32) -> GateAction {
        if (latest_zc_us.wrapping_sub(self.last_seen_us) as i32) <= 0 {
            return GateAction::HoldOff;
        }
        self.last_seen_us = latest_zc_us;

        if !delay_is_firable(delay_us) {
            return GateAction::HoldOff;
        }
        GateAction::Fire {
            at_us: latest_zc_us.wrapping_add(delay_us),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::params::AC_HALF_CYCLE_US;

    #[test]
    fn test_no_new_crossing_holds_off() {
        let mut planner = FiringPlanner::new();
        assert_eq!(planner.poll(0, 3_000), GateAction::HoldOff);
    }

    #[test]
    fn test_fires_once_per_half_cycle() {
        let mut planner = FiringPlanner::new();
        assert_eq!(
            planner.poll(10_000, 3_000),
            GateAction::Fire { at_us: 13_000 }
        );
        // Same stamp polled again: the half-cycle was already handled
        assert_eq!(planner.poll(10_000, 3_000), GateAction::HoldOff);
        // Next crossing fires again
        assert_eq!(
            planner.poll(20_000, 3_000),
            GateAction::Fire { at_us: 23_000 }
        );
    }

    #[test]
    fn test_off_sentinel_holds_gate_low() {
        let mut planner = FiringPlanner::new();
        assert_eq!(planner.poll(10_000, TRIAC_OFF_DELAY_US), GateAction::HoldOff);
        // The crossing was still consumed
        assert_eq!(planner.poll(10_000, 3_000), GateAction::HoldOff);
    }

    #[test]
    fn test_delay_at_half_cycle_is_not_firable() {
        let mut planner = FiringPlanner::new();
        assert_eq!(planner.poll(10_000, AC_HALF_CYCLE_US), GateAction::HoldOff);
    }

    #[test]
    fn test_timer_wraparound_is_still_a_new_cycle() {
        let mut planner = FiringPlanner::new();
        // Walk the stamp up to just below the wrap point
        assert!(matches!(
            planner.poll(0x6000_0000, 3_000),
            GateAction::Fire { .. }
        ));
        assert!(matches!(
            planner.poll(0xC000_0000, 3_000),
            GateAction::Fire { .. }
        ));
        let near_wrap = u32::MAX - 2_000;
        assert_eq!(
            planner.poll(near_wrap, 3_000),
            GateAction::Fire {
                at_us: near_wrap.wrapping_add(3_000)
            }
        );
        // Stamp wrapped past zero: still ahead of last-seen, so it fires
        assert_eq!(planner.poll(8_000, 3_000), GateAction::Fire { at_us: 11_000 });
    }

    #[test]
    fn test_delay_cell_starts_off() {
        let cell = FiringDelayCell::new();
        assert_eq!(cell.get(), TRIAC_OFF_DELAY_US);
        cell.command(2_500);
        assert_eq!(cell.get(), 2_500);
    }

    #[test]
    fn test_zero_cross_stamp_round_trip() {
        let stamp = ZeroCrossStamp::new();
        assert_eq!(stamp.latest(), 0);
        stamp.record(123_456);
        assert_eq!(stamp.latest(), 123_456);
    }
}
