//! ステータスLEDタスク
//!
//! ハートビートとして500ms周期で点滅させ、制御ファームウェアの生存を
//! 示します。

use embassy_stm32::gpio::Output;
use embassy_time::{Duration, Timer};

use crate::fmt::*;

/// ステータスLEDタスク
#[embassy_executor::task]
pub async fn led_task(mut led: Output<'static>) {
    info!("LED task started");

    loop {
        led.toggle();
        Timer::after(Duration::from_millis(500)).await;
    }
}
