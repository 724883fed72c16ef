//! 制御ループタスク
//!
//! ペダル読み取り、RPM算出、制御エンジンのtick実行、点弧遅延の更新、
//! ステータス公開を行います。tick周期はエンジンが返す値に従います
//! （ソフトスタート中は設定のステップ周期、通常運転は20ms）。

use embassy_stm32::adc::{Adc, AnyAdcChannel};
use embassy_stm32::gpio::Input;
use embassy_stm32::peripherals;
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Instant, Timer};

use needle_drive::{phase, ControlEngine, ControlInputs, ControlRequest, RpmSampler, StopOutcome};

use crate::fmt::*;
use crate::state::{
    AUTOTUNE_CANCEL, AUTOTUNE_REQUEST, CALIBRATION_CANCEL, CALIBRATION_REQUEST, CONFIG,
    DRIVE_STATUS, FORCE_STOP, SHAFT_PULSES, TARGET_FIRING_DELAY,
};

/// 制御ループタスク
#[embassy_executor::task]
pub async fn control_task(
    mut adc: Adc<'static, peripherals::ADC2>,
    mut pedal_pin: AnyAdcChannel<peripherals::ADC2>,
    needle_up: Input<'static>,
    needle_down: Input<'static>,
) {
    info!("Control task started");

    let now = now_ms();
    let mut engine = {
        let config = CONFIG.lock().await;
        ControlEngine::new(&config, now)
    };
    let mut rpm_sampler = RpmSampler::new(now);

    loop {
        let now = now_ms();

        // 操作リクエストをtick先頭で消費
        if take_flag(&CALIBRATION_REQUEST).await {
            info!("Max-RPM calibration requested");
            engine.request(ControlRequest::StartCalibration);
        }
        if take_flag(&CALIBRATION_CANCEL).await {
            engine.request(ControlRequest::CancelCalibration);
        }
        if take_flag(&AUTOTUNE_REQUEST).await {
            info!("PID autotune requested");
            engine.request(ControlRequest::StartAutotune);
        }
        if take_flag(&AUTOTUNE_CANCEL).await {
            engine.request(ControlRequest::CancelAutotune);
        }
        if take_flag(&FORCE_STOP).await {
            warn!("Force stop requested");
            engine.request(ControlRequest::ForceStop);
        }

        let pedal_raw = adc.blocking_read(&mut pedal_pin);

        let mut config = CONFIG.lock().await;
        let pulses = SHAFT_PULSES.take();
        let rpm = rpm_sampler.sample(now, pulses, config.pulses_per_rev);

        // 針位置センサはアクティブロー（センサがLowに引くと「位置にある」）
        let inputs = ControlInputs {
            now_ms: now,
            pedal_raw,
            rpm,
            needle_up: needle_up.is_low(),
            needle_down: needle_down.is_low(),
        };

        let tick = engine.tick(&mut config, &inputs);
        drop(config);

        // 電力→点弧遅延変換。オフ帯ではセンチネルとなりゲートはLow維持
        TARGET_FIRING_DELAY.command(phase::firing_delay_us(tick.power_percent));

        if let Some(outcome) = tick.stop_outcome {
            match outcome {
                StopOutcome::AtPosition => info!("Needle stopped at the configured position"),
                StopOutcome::Timeout => warn!("Needle stop timed out, power forced to 0"),
            }
        }

        *DRIVE_STATUS.lock().await = engine.snapshot(&inputs);

        Timer::after(Duration::from_millis(tick.next_tick_ms as u64)).await;
    }
}

/// フラグを読み取りつつクリア
async fn take_flag(flag: &Mutex<ThreadModeRawMutex, bool>) -> bool {
    let mut guard = flag.lock().await;
    core::mem::take(&mut *guard)
}

#[inline(always)]
fn now_ms() -> u32 {
    Instant::now().as_millis() as u32
}
