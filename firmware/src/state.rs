//! グローバル共有状態管理
//!
//! タスク間で共有される状態をMutexで保護して管理します。
//! 割り込みとタスク間の共有には単一ライターのアトミックセルを使用します
//! （割り込みコンテキストではロック禁止）。

use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::mutex::Mutex;

use needle_drive::{Config, DriveStatus, FiringDelayCell, PulseCounter, ZeroCrossStamp};

/// ランタイム設定（制御ループが毎tick読み取り、外部レイヤーが書き込み）
pub static CONFIG: Mutex<ThreadModeRawMutex, Config> = Mutex::new(Config::default());

/// ドライブステータス（外部レポート用、制御ループが毎tick更新）
pub static DRIVE_STATUS: Mutex<ThreadModeRawMutex, DriveStatus> = Mutex::new(DriveStatus::new());

/// 最大RPMキャリブレーション開始リクエスト
pub static CALIBRATION_REQUEST: Mutex<ThreadModeRawMutex, bool> = Mutex::new(false);

/// 最大RPMキャリブレーション中止リクエスト
pub static CALIBRATION_CANCEL: Mutex<ThreadModeRawMutex, bool> = Mutex::new(false);

/// PIDオートチューン開始リクエスト
pub static AUTOTUNE_REQUEST: Mutex<ThreadModeRawMutex, bool> = Mutex::new(false);

/// PIDオートチューン中止リクエスト
pub static AUTOTUNE_CANCEL: Mutex<ThreadModeRawMutex, bool> = Mutex::new(false);

/// 強制停止リクエスト（出力0、全モード解除）
pub static FORCE_STOP: Mutex<ThreadModeRawMutex, bool> = Mutex::new(false);

/// ゼロクロス割り込みが書き込むタイムスタンプ [µs]（読み手：点弧タスク）
pub static ZERO_CROSS: ZeroCrossStamp = ZeroCrossStamp::new();

/// シャフトパルス割り込みが書き込むパルスカウンタ（読み手：制御タスク）
pub static SHAFT_PULSES: PulseCounter = PulseCounter::new();

/// 目標点弧遅延 [µs]（書き手：制御タスク、読み手：点弧タスク）
pub static TARGET_FIRING_DELAY: FiringDelayCell = FiringDelayCell::new();
