// src/logic/mod.rs
//! レイアウトとドラッグの純粋な計算ロジック。World も状態も持たない関数だけを置く。

pub mod insertion;
pub mod layout_projector;
pub mod percent;
pub mod region_index;

pub use insertion::insertion_index;
pub use layout_projector::{LayoutMetrics, LayoutProjector, LayoutRequest, SlotReservation, StackLayout};
pub use region_index::RegionIndex;
