// src/components/dragging_info.rs

use serde::{Deserialize, Serialize};

use crate::components::position::Position;
use crate::components::stack::{CardId, GroupId, RegionId, StackId};
use crate::protocol::IntentId;

/// ドラッグ中のスタックに関する情報だよ！🖱️➡️🃏
/// ドラッグ開始で作られて、ポインタを離した瞬間に (同期的に) 消える。
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DragSession {
    pub stack_id: StackId,
    /// 実際に掴んだカード。
    pub card_id: CardId,
    pub source_group_id: Option<GroupId>,
    pub source_region_id: Option<RegionId>,
    /// 一番下のカードの今の位置 (持ち上げ済み)。
    pub position: Position,
    pub hovered_region_id: Option<RegionId>,
    pub hovered_group_id: Option<GroupId>,
    /// row/fan の上にいるときの、空けてもらうスロット。
    pub preview_index: Option<usize>,
}

impl DragSession {
    /// 今いる領域が元の領域かどうか。
    pub fn is_over_source(&self) -> bool {
        self.hovered_region_id.is_some() && self.hovered_region_id == self.source_region_id
    }
}

/// ドロップしてから権威ストアの更新が届くまでの「着地待ち」の記録。
/// システム全体で同時に1つしか存在しない。
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PendingDrop {
    pub intent_id: IntentId,
    pub stack_id: StackId,
    pub card_id: CardId,
    pub source_group_id: Option<GroupId>,
    pub target_group_id: GroupId,
    pub target_region_id: RegionId,
    /// 持ち上げたまま止まっている位置。
    pub drop_position: Position,
    pub insertion_index: usize,
    /// ドロップした時点での、元グループ内のスタックの位置。
    pub index_at_drop: Option<usize>,
    /// このドロップの持ち上げ描画優先度。
    pub render_order: u64,
}

impl PendingDrop {
    /// 同じグループ内での並べ替えかどうか。
    pub fn is_same_group(&self) -> bool {
        self.source_group_id.as_ref() == Some(&self.target_group_id)
    }
}
