// src/app/mod.rs
//! テーブルエンジン本体と、それを組み立てる部品たちだよ！
//! 純粋な計算は logic/、ここは状態とイベントの流れを持つ側。

pub mod animation;
pub mod browser_timers;
pub mod drag_handler;
pub mod drag_state_store;
pub mod game_app;
pub mod network_sender;
pub mod projection;
pub mod reconciliation;
pub mod table_engine;
pub mod timers;

// エンジンを通しで動かすテストは別ファイル
#[cfg(test)]
mod engine_tests;
