// src/app/projection.rs
//! 画面座標 (ピクセル) → テーブルの地面 (y = 0 の平面) 上の座標への変換。
//! 描画側のカメラが何であれ、エンジンはこの trait 越しにしか画面座標を扱わない。

/// 画面 → 地面の変換。地面と交わらない (空を指している等) なら `None`。
pub trait ScreenProjector {
    fn screen_to_world(&self, screen_x: f32, screen_y: f32) -> Option<(f32, f32)>;
}

/// 真上から見下ろしたカメラ用の、線形な変換。
/// ビューポートの左上がテーブルの左上 `(-width/2, -depth/2)`、右下が右下に対応する。
/// ビューポートの外もそのまま外挿する (ドラッグ中にポインタが外に出ても追従するように)。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundPlaneProjector {
    viewport_width: f32,
    viewport_height: f32,
    table_width: f32,
    table_depth: f32,
}

impl GroundPlaneProjector {
    pub fn new(viewport_width: f32, viewport_height: f32, table_width: f32, table_depth: f32) -> Self {
        Self { viewport_width, viewport_height, table_width, table_depth }
    }

    /// ウィンドウのリサイズ時に呼ぶ。
    pub fn resize(&mut self, viewport_width: f32, viewport_height: f32) {
        self.viewport_width = viewport_width;
        self.viewport_height = viewport_height;
    }

    pub fn viewport(&self) -> (f32, f32) {
        (self.viewport_width, self.viewport_height)
    }
}

impl ScreenProjector for GroundPlaneProjector {
    fn screen_to_world(&self, screen_x: f32, screen_y: f32) -> Option<(f32, f32)> {
        if self.viewport_width <= 0.0 || self.viewport_height <= 0.0 || !screen_x.is_finite() || !screen_y.is_finite() {
            return None;
        }
        let x = screen_x / self.viewport_width * self.table_width - self.table_width / 2.0;
        let z = screen_y / self.viewport_height * self.table_depth - self.table_depth / 2.0;
        Some((x, z))
    }
}
