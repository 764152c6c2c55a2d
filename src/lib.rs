// src/lib.rs

// WASM と JavaScript を繋ぐための基本！
use wasm_bindgen::prelude::*;

// 自分で作ったモジュールたち！ これでコードを整理してるんだ。
pub mod app; // エンジン本体とドラッグ・着地待ちの流れ
pub mod components; // データの形 (ID, 領域, 位置)
pub mod config; // レイアウト定数と EngineConfig
pub mod error;
pub mod logic; // レイアウト計算 (純粋な関数)
pub mod protocol; // サーバーとのメッセージ

pub use app::game_app::TabletopApp;
pub use app::table_engine::{ReleaseOutcome, TableEngine};
pub use error::{TableError, TableResult};

// log クレートの出力をブラウザのコンソールに流すロガー。
struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("[{}] {}", record.target(), record.args()));
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&line),
            log::Level::Warn => web_sys::console::warn_1(&line),
            log::Level::Info => web_sys::console::info_1(&line),
            log::Level::Debug | log::Level::Trace => web_sys::console::log_1(&line),
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

// main 関数の代わりに、Wasm がロードされた時に最初に実行される関数だよ。
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    // 2回目以降の set_logger は失敗するけど問題ない
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Info);
    }
    log::info!("Panic hook and console logger set!");
}

/// デバッグ用にログの詳しさを変える ("error" / "warn" / "info" / "debug" / "trace")。
#[wasm_bindgen]
pub fn set_log_level(level: &str) {
    match level.parse::<log::LevelFilter>() {
        Ok(filter) => log::set_max_level(filter),
        Err(_) => log::warn!("set_log_level: unknown level {:?}", level),
    }
}
