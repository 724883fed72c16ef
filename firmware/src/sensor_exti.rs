//! ゼロクロス／シャフトパルス割り込み（EXTI）
//!
//! 真の割り込みコンテキストで動作する2本のエッジ捕捉を実装します。
//! - PA0 (EXTI0): ACゼロクロス検出（オプトアイソレータ出力の立ち上がりエッジ）
//! - PA1 (EXTI1): シャフトパルスセンサ（立ち上がりエッジ、デバウンスはセル側）
//!
//! ハンドラは単一ワードのアトミック書き込みのみを行います。ロック・メモリ
//! 確保・ログ出力は禁止（点弧タスクを含む全協調タスクをプリエンプトするため）。
//! 読み手側は最悪1サイクル分古い値を許容します。

use embassy_stm32::pac;
use embassy_time::Instant;

use crate::state::{SHAFT_PULSES, ZERO_CROSS};

/// EXTI0/EXTI1の初期化
///
/// # Safety
/// PACを使用した直接的なレジスタ操作を含むため、unsafe
pub unsafe fn init_sensor_exti() {
    let rcc = pac::RCC;
    let gpioa = pac::GPIOA;
    let syscfg = pac::SYSCFG;
    let exti = pac::EXTI;

    // 1. クロック有効化
    rcc.ahb2enr().modify(|w| w.set_gpioaen(true)); // GPIOA
    rcc.apb2enr().modify(|w| w.set_syscfgen(true)); // SYSCFG（EXTIルーティング用）

    // 2. GPIO設定（PA0/PA1を入力・プルアップに設定）
    // オプトアイソレータがLowに引き、開放でHighになる配線を想定
    for pin in 0..2usize {
        gpioa
            .moder()
            .modify(|w| w.set_moder(pin, pac::gpio::vals::Moder::INPUT));
        gpioa
            .pupdr()
            .modify(|w| w.set_pupdr(pin, pac::gpio::vals::Pupdr::PULL_UP));
    }

    // 3. EXTIライン0/1をポートAにマップ
    syscfg.exticr(0).modify(|w| {
        w.set_exti(0, 0); // EXTI0 <- PA0
        w.set_exti(1, 0); // EXTI1 <- PA1
    });

    // 4. 立ち上がりエッジトリガ設定＋割り込みマスク解除
    exti.rtsr(0).modify(|w| {
        w.set_line(0, true);
        w.set_line(1, true);
    });
    exti.ftsr(0).modify(|w| {
        w.set_line(0, false);
        w.set_line(1, false);
    });
    exti.imr(0).modify(|w| {
        w.set_line(0, true);
        w.set_line(1, true);
    });

    // 5. NVIC割り込み有効化
    // ゼロクロスは点弧基準のため最も高い優先度を与える
    unsafe {
        cortex_m::peripheral::NVIC::unmask(pac::Interrupt::EXTI0);
        cortex_m::peripheral::NVIC::unmask(pac::Interrupt::EXTI1);
        let mut cp = cortex_m::Peripherals::steal();
        cp.NVIC.set_priority(pac::Interrupt::EXTI0, 0x20);
        cp.NVIC.set_priority(pac::Interrupt::EXTI1, 0x30);
    }
}

/// 現在時刻 [µs]（32bit、ラップあり）
#[inline(always)]
fn now_us() -> u32 {
    Instant::now().as_micros() as u32
}

/// EXTI0割り込みハンドラ（ゼロクロス）
///
/// # Safety
/// 割り込みコンテキストで実行されるため、処理は最小限にする
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn EXTI0() {
    pac::EXTI.pr(0).write(|w| w.set_line(0, true)); // フラグクリア
    ZERO_CROSS.record(now_us());
}

/// EXTI1割り込みハンドラ（シャフトパルス）
///
/// # Safety
/// 割り込みコンテキストで実行されるため、処理は最小限にする
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn EXTI1() {
    pac::EXTI.pr(0).write(|w| w.set_line(1, true)); // フラグクリア
    SHAFT_PULSES.record_pulse(now_us());
}
