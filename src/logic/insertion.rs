// src/logic/insertion.rs
//! ポインタの x 座標から、row/fan 領域のどこに差し込むか (挿入位置) を決める。
//! `LayoutProjector` と同じ `slot_geometry` を使うので、プレビューと最終的な並びが食い違わない。

use crate::components::position::TableRect;
use crate::components::region::RegionType;
use crate::logic::layout_projector::{slot_geometry, LayoutMetrics};

/// 挿入位置 (0..=effective_stack_count) を返す。pile/free には順序が無いので `None`。
///
/// `effective_stack_count` は動かすスタックを除いた、領域内のスタック数。
/// 動かすスタックの分の仮スロット (+1) はここで足す。
pub fn insertion_index(
    pointer_x: f32,
    region_type: RegionType,
    rect: &TableRect,
    effective_stack_count: usize,
    metrics: &LayoutMetrics,
) -> Option<usize> {
    let geometry = slot_geometry(region_type, rect, effective_stack_count + 1, metrics)?;
    if geometry.spacing <= f32::EPSILON {
        // 幅が足りなくて全部のスロットが重なっている
        return Some(if pointer_x > geometry.first_center { effective_stack_count } else { 0 });
    }
    let slots = ((pointer_x - geometry.first_center) / geometry.spacing).round();
    Some(slots.clamp(0.0, effective_stack_count as f32) as usize)
}
