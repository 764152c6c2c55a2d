// src/app/animation.rs
//! 着地待ちが解決したスタック (と、どこにも落とせなかったスタック) を定位置に戻すアニメーション。
//!
//! 1. スライド: 持ち上げた高さのまま、定位置の真上まで xz を動かす
//! 2. セトル: 定位置に降ろす
//! 定位置は毎フレーム呼び出し側から渡してもらう (途中で状態が更新されても自然に行き先が変わる)。

use std::collections::HashMap;

use log::debug;

use crate::components::position::Position;
use crate::components::stack::StackId;
use crate::config::EngineConfig;

/// 速く動き出して、ゆっくり止まる。
pub fn ease_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionPhase {
    Slide,
    Settle,
}

#[derive(Debug, Clone, PartialEq)]
struct Motion {
    from: Position,
    elapsed_ms: f32,
    render_order: u64,
}

#[derive(Debug, Clone)]
pub struct SettleAnimator {
    slide_ms: f32,
    settle_ms: f32,
    motions: HashMap<StackId, Motion>,
}

impl SettleAnimator {
    pub fn new(config: &EngineConfig) -> Self {
        Self { slide_ms: config.slide_ms.max(0.0), settle_ms: config.settle_ms.max(0.0), motions: HashMap::new() }
    }

    /// `from` (持ち上がった位置) から定位置へのアニメーションを始める。同じスタックの前のものは置き換える。
    pub fn start(&mut self, stack_id: StackId, from: Position, render_order: u64) {
        debug!("SettleAnimator: settling stack {} from ({:.1}, {:.1}, {:.1})", stack_id, from.x, from.y, from.z);
        self.motions.insert(stack_id, Motion { from, elapsed_ms: 0.0, render_order });
    }

    /// ドラッグで掴み直されたときなど。
    pub fn cancel(&mut self, stack_id: &StackId) -> bool {
        self.motions.remove(stack_id).is_some()
    }

    pub fn is_animating(&self, stack_id: &StackId) -> bool {
        self.motions.contains_key(stack_id)
    }

    pub fn is_idle(&self) -> bool {
        self.motions.is_empty()
    }

    pub fn render_order(&self, stack_id: &StackId) -> Option<u64> {
        self.motions.get(stack_id).map(|m| m.render_order)
    }

    pub fn phase(&self, stack_id: &StackId) -> Option<MotionPhase> {
        self.motions
            .get(stack_id)
            .map(|m| if m.elapsed_ms < self.slide_ms { MotionPhase::Slide } else { MotionPhase::Settle })
    }

    /// 時間を進める。終わったスタックを返す (もう sample しても None)。
    pub fn advance(&mut self, dt_ms: f32) -> Vec<StackId> {
        let total = self.slide_ms + self.settle_ms;
        let step = dt_ms.max(0.0);
        for motion in self.motions.values_mut() {
            motion.elapsed_ms += step;
        }
        let finished: Vec<StackId> = self
            .motions
            .iter()
            .filter(|(_, m)| m.elapsed_ms >= total)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &finished {
            self.motions.remove(id);
        }
        finished
    }

    /// 定位置が `resting` のときの今の位置。アニメーション中でなければ None。
    pub fn sample(&self, stack_id: &StackId, resting: Position) -> Option<Position> {
        let motion = self.motions.get(stack_id)?;
        let from = motion.from;
        if motion.elapsed_ms < self.slide_ms {
            let t = ease_out(motion.elapsed_ms / self.slide_ms);
            let mut position = from.lerp(resting, t);
            position.y = from.y;
            Some(position)
        } else {
            let t = if self.settle_ms <= 0.0 { 1.0 } else { ease_out((motion.elapsed_ms - self.slide_ms) / self.settle_ms) };
            Some(Position::new(resting.x, from.y + (resting.y - from.y) * t, resting.z))
        }
    }
}
