// src/app/timers.rs
//! キャンセルできるタイマーの抽象。
//!
//! エンジンは「この ID のタイマーを N ミリ秒後に」「この ID はもういらない」と頼むだけ。
//! 時間が来たらホストが `TableEngine::on_timer(id)` を呼び返す。
//! ブラウザでは `BrowserTimers` (setTimeout)、テストでは `ManualTimers` を使う。

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

pub trait TimerScheduler {
    fn schedule(&mut self, id: TimerId, delay_ms: u32);
    /// 予約済みでなければ何もしない。
    fn cancel(&mut self, id: TimerId);
}

/// 手動で時間を進めるタイマー。テストとネイティブのホスト用。
#[derive(Debug, Default)]
pub struct ManualTimers {
    now_ms: u64,
    scheduled: Vec<(u64, TimerId)>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.scheduled.iter().any(|(_, t)| *t == id)
    }

    pub fn scheduled_count(&self) -> usize {
        self.scheduled.len()
    }

    /// 時間を進めて、期限が来たタイマーを期限順に返す (返したものは予約から消える)。
    pub fn advance(&mut self, ms: u64) -> Vec<TimerId> {
        self.now_ms += ms;
        let now = self.now_ms;
        let mut due: Vec<(u64, TimerId)> = self.scheduled.iter().copied().filter(|(at, _)| *at <= now).collect();
        self.scheduled.retain(|(at, _)| *at > now);
        due.sort();
        due.into_iter().map(|(_, id)| id).collect()
    }
}

impl TimerScheduler for ManualTimers {
    fn schedule(&mut self, id: TimerId, delay_ms: u32) {
        self.cancel(id);
        self.scheduled.push((self.now_ms + u64::from(delay_ms), id));
    }

    fn cancel(&mut self, id: TimerId) {
        self.scheduled.retain(|(_, t)| *t != id);
    }
}
