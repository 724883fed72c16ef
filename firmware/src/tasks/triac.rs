//! TRIAC点弧タスク
//!
//! 半サイクルごとに、ゼロクロス基準時刻から目標遅延の経過をスピンウェイト
//! で待ち、ゲートへ50µsのパルスを出力します。協調スケジューラの最小
//! スリープ粒度は要求精度（数十µs）より粗いため、点弧待ちはタスク内の
//! CPUスピンで行います。待機窓の間CPUを占有するのは仕様です。
//!
//! 点弧の失敗・遅れは例外にしない：その半サイクルのトルクが下がるだけで、
//! 次のサイクルで回復します。

use embassy_stm32::gpio::Output;
use embassy_time::{Duration, Instant, Timer};

use needle_drive::config::params::GATE_PULSE_US;
use needle_drive::{FiringPlanner, GateAction};

use crate::fmt::*;
use crate::state::{TARGET_FIRING_DELAY, ZERO_CROSS};

/// TRIAC点弧タスク
#[embassy_executor::task]
pub async fn triac_task(mut gate: Output<'static>) {
    info!("TRIAC firing task started");

    let mut planner = FiringPlanner::new();

    loop {
        match planner.poll(ZERO_CROSS.latest(), TARGET_FIRING_DELAY.get()) {
            GateAction::Fire { at_us } => {
                // 点弧時刻までCPUスピン
                spin_until(at_us);

                // ゲートパルス（パルス幅もスピンで確保、ここではyieldしない）
                gate.set_high();
                spin_until(now_us().wrapping_add(GATE_PULSE_US));
                gate.set_low();
            }
            GateAction::HoldOff => {
                // 新しいゼロクロスが無い、または遅延が無効（モーターオフ）
                gate.set_low();
            }
        }

        // 最小の協調yield。半サイクル10msに対して十分な反応性
        Timer::after(Duration::from_millis(1)).await;
    }
}

#[inline(always)]
fn now_us() -> u32 {
    Instant::now().as_micros() as u32
}

/// 指定時刻までのビジーウェイト（ラップ対応の符号付き比較）
#[inline(always)]
fn spin_until(deadline_us: u32) {
    while (deadline_us.wrapping_sub(now_us()) as i32) > 0 {}
}
