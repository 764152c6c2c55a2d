// src/components/position.rs

use serde::{Deserialize, Serialize};

use crate::components::stack::{CardId, StackId};

/// テーブル空間での位置だよ！📍
/// x は右向き、z は手前向き、y は高さ (持ち上げ量)。地面は y = 0 の平面。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// 地面上の点 (高さ 0)。
    pub fn ground(x: f32, z: f32) -> Self {
        Self { x, y: 0.0, z }
    }

    pub fn with_height(self, y: f32) -> Self {
        Self { y, ..self }
    }

    /// 線形補間。t = 0 で self、t = 1 で target。
    pub fn lerp(self, target: Position, t: f32) -> Position {
        Position {
            x: self.x + (target.x - self.x) * t,
            y: self.y + (target.y - self.y) * t,
            z: self.z + (target.z - self.z) * t,
        }
    }
}

/// 地面上の軸平行な長方形 (絶対座標)。`top` は z の小さい側。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TableRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub depth: f32,
}

impl TableRect {
    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.depth
    }

    pub fn center(&self) -> (f32, f32) {
        (self.left + self.width / 2.0, self.top + self.depth / 2.0)
    }

    /// 境界を含む当たり判定。
    pub fn contains(&self, x: f32, z: f32) -> bool {
        x >= self.left && x <= self.right() && z >= self.top && z <= self.bottom()
    }
}

/// レンダラーに渡すカード1枚分の描画情報。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardPlacement {
    pub card_id: CardId,
    pub stack_id: StackId,
    pub position: Position,
    /// 垂直軸まわりの回転 (度)。
    pub rotation: f32,
    /// 描画の優先度。大きいほど手前。
    pub render_order: u64,
}
