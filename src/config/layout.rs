// src/config/layout.rs
//! テーブルのレイアウトやドラッグ挙動に関する定数を定義するよ！
//! 単位はテーブル空間の長さ (だいたい cm) とミリ秒。
//! 実行時に変えたい値は `EngineConfig` で上書きできる。

use serde::{Deserialize, Serialize};

use crate::error::{TableError, TableResult};

pub const TABLE_WIDTH: f32 = 160.0; // テーブルの横幅 (x)
pub const TABLE_DEPTH: f32 = 100.0; // テーブルの奥行き (z)

pub const CARD_WIDTH: f32 = 6.0; // カードの幅 (縦長に置いたとき)
pub const CARD_DEPTH: f32 = 8.5; // カードの長さ
pub const ROW_GAP: f32 = 1.0; // row 領域でスタック同士が「ぴったり」並ぶときのすき間
pub const FAN_MAX_SPACING_RATIO: f32 = 0.5; // fan 領域の最大間隔 (カード幅に対する割合)

pub const STACK_CARD_OFFSET: f32 = 1.5; // スタック内のカードを二次軸方向にずらす量
pub const CARD_THICKNESS: f32 = 0.05; // スタック内のカード1枚ごとの高さ
pub const LIFT_HEIGHT: f32 = 2.0; // ドラッグ中・着地待ちのときの持ち上げ量

pub const FAN_ROTATION_STEP_DEG: f32 = 3.0; // fan のスタック1つごとの回転
pub const FAN_MAX_ROTATION_DEG: f32 = 12.0;

pub const DRAG_THRESHOLD_PX: f32 = 5.0; // これを超えて動いたらクリックではなくドラッグ
pub const CLICK_SUPPRESS_MS: f64 = 250.0; // クリック後に合成 click イベントを無視する時間

pub const SAME_GROUP_FALLBACK_MS: u32 = 400; // 同じグループ内の並べ替えで変化が見えないときの待ち時間
pub const MAX_PENDING_MS: u32 = 2_500; // どんな PendingDrop もこれ以上は待たない

pub const SLIDE_MS: f32 = 180.0; // 持ち上げたまま定位置へスライドする時間
pub const SETTLE_MS: f32 = 120.0; // 定位置に降ろす時間

pub const REGION_PRIORITY_STRIDE: u64 = 10_000; // 領域ごとの描画優先度の幅
pub const LIFTED_PRIORITY_BASE: u64 = 1_000_000; // 持ち上げ中のスタックは全部の領域より手前
pub const STACK_PRIORITY_STRIDE: u64 = 1_000; // 持ち上げ中スタック1回分の優先度の幅

/// 実行時に変更できるエンジン設定。JSON で一部だけ指定してもOK (残りはデフォルト)。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub table_width: f32,
    pub table_depth: f32,
    pub card_width: f32,
    pub card_depth: f32,
    pub row_gap: f32,
    pub fan_max_spacing_ratio: f32,
    pub stack_card_offset: f32,
    pub card_thickness: f32,
    pub lift_height: f32,
    pub fan_rotation_step_deg: f32,
    pub fan_max_rotation_deg: f32,
    pub drag_threshold_px: f32,
    pub click_suppress_ms: f64,
    pub same_group_fallback_ms: u32,
    pub max_pending_ms: u32,
    pub slide_ms: f32,
    pub settle_ms: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            table_width: TABLE_WIDTH,
            table_depth: TABLE_DEPTH,
            card_width: CARD_WIDTH,
            card_depth: CARD_DEPTH,
            row_gap: ROW_GAP,
            fan_max_spacing_ratio: FAN_MAX_SPACING_RATIO,
            stack_card_offset: STACK_CARD_OFFSET,
            card_thickness: CARD_THICKNESS,
            lift_height: LIFT_HEIGHT,
            fan_rotation_step_deg: FAN_ROTATION_STEP_DEG,
            fan_max_rotation_deg: FAN_MAX_ROTATION_DEG,
            drag_threshold_px: DRAG_THRESHOLD_PX,
            click_suppress_ms: CLICK_SUPPRESS_MS,
            same_group_fallback_ms: SAME_GROUP_FALLBACK_MS,
            max_pending_ms: MAX_PENDING_MS,
            slide_ms: SLIDE_MS,
            settle_ms: SETTLE_MS,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> TableResult<Self> {
        serde_json::from_str(json).map_err(TableError::ConfigParse)
    }

    /// row 領域の自然な間隔 (ぴったり並んだとき)。
    pub fn row_footprint(&self) -> f32 {
        self.card_width + self.row_gap
    }

    /// fan 領域は縦長カードの幅そのもの。
    pub fn fan_footprint(&self) -> f32 {
        self.card_width
    }

    pub fn fan_max_spacing(&self) -> f32 {
        self.card_width * self.fan_max_spacing_ratio
    }
}
