#![no_std]
#![no_main]

mod fmt;
mod hardware;
mod sensor_exti;
mod state;
mod tasks;

#[cfg(not(feature = "defmt"))]
use panic_halt as _;
#[cfg(feature = "defmt")]
use {defmt_rtt as _, panic_probe as _};

use embassy_executor::Spawner;
use embassy_stm32::{
    adc::{Adc, AdcChannel, SampleTime},
    gpio::{Input, Level, Output, Pull, Speed},
};
use embassy_time::{Duration, Timer};

use fmt::*;
use tasks::{control_task, led_task, triac_task};

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // ハードウェア初期化
    let config = hardware::create_clock_config();
    let p = embassy_stm32::init(config);

    info!("AC Pedal Drive • STM32G431VB @ 170MHz");

    // 設定はデフォルト値で起動（永続化と操作系トランスポートは外部レイヤー）
    {
        let config = state::CONFIG.lock().await;
        info!("Config defaults loaded:");
        info!(
            "  Speed limit: {} RPM (motor max {} RPM)",
            config.max_rpm_setting, config.max_motor_rpm
        );
        info!(
            "  PID enabled: {}, gains: Kp={} Ki={} Kd={}",
            config.pid_enabled, config.kp, config.ki, config.kd
        );
        info!(
            "  Soft start: {} steps @ {}ms",
            config.soft_start_ramp_steps, config.soft_start_step_ms
        );
    }

    // ステータスLED初期化＆タスク起動
    let led = Output::new(p.PC13, Level::High, Speed::Low);
    spawner.spawn(led_task(led)).unwrap();

    // TRIACゲート出力（起動時は必ずLow = モーターオフ）
    let gate = Output::new(p.PA8, Level::Low, Speed::High);

    // 針位置センサ（アクティブロー、プルアップ）
    let needle_up = Input::new(p.PB0, Pull::Up);
    let needle_down = Input::new(p.PB1, Pull::Up);

    // ペダルADC初期化（PC1 = ADC2_IN7）
    let mut adc2 = Adc::new(p.ADC2);
    adc2.set_sample_time(SampleTime::CYCLES640_5);
    let pedal_pin = p.PC1.degrade_adc();
    info!("Pedal input on PC1 (ADC2_IN7)");

    // ゼロクロス＋シャフトパルスのEXTI割り込み初期化（PA0/PA1）
    unsafe {
        hardware::init_sensor_interrupts();
    }

    // 点弧タスクと制御ループを起動
    spawner.spawn(triac_task(gate)).unwrap();
    spawner
        .spawn(control_task(adc2, pedal_pin, needle_up, needle_down))
        .unwrap();

    info!("Pedal drive control started");

    // メインループ（将来の拡張用）
    loop {
        Timer::after(Duration::from_millis(100)).await;
    }
}
