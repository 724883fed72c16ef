//! ハードウェア初期化モジュール
//!
//! ペリフェラルの初期化ロジックを集約します。

use embassy_stm32::Config;

use crate::fmt::*;
use crate::sensor_exti;

/// RCCクロック設定を初期化
///
/// HSI → PLL（÷4 × 85 ÷ 2）で170MHz生成
pub fn create_clock_config() -> Config {
    let mut config = Config::default();
    {
        use embassy_stm32::rcc::mux::{Adcsel, ClockMux};
        use embassy_stm32::rcc::{Pll, PllMul, PllPreDiv, PllRDiv, PllSource, Sysclk};

        config.rcc.hsi = true;
        config.rcc.pll = Some(Pll {
            source: PllSource::HSI,
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL85,
            divp: None,
            divq: None,
            divr: Some(PllRDiv::DIV2),
        });
        config.rcc.sys = Sysclk::PLL1_R; // システムクロックをPLLに設定

        let mut clock_mux = ClockMux::default();
        clock_mux.adc12sel = Adcsel::SYS;
        config.rcc.mux = clock_mux;
    }
    config
}

/// ゼロクロス＋シャフトパルスのEXTI割り込み初期化
///
/// PA0=ゼロクロス、PA1=シャフトパルス
///
/// # Safety
/// PACを使用した直接レジスタ操作を含む
pub unsafe fn init_sensor_interrupts() {
    info!("Initializing zero-cross / shaft-pulse EXTI (PA0, PA1)...");
    sensor_exti::init_sensor_exti();
    info!("Sensor interrupts initialized");
}
