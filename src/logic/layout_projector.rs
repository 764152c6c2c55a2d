// src/logic/layout_projector.rs
//! 領域の形・種類・中身の順番から、見えているカード全部の描画位置を計算する。
//! (元々は layout_calculator が Tableau/Foundation ごとに座標を決めていたやつを、
//!  領域の種類ごとの汎用ロジックにしたもの)
//!
//! ここは純粋関数だけ。同じ入力なら何回呼んでも同じ結果になる。

use crate::components::position::{CardPlacement, Position, TableRect};
use crate::components::region::{Direction, Region, RegionType};
use crate::components::stack::{StackId, TableState};
use crate::config::EngineConfig;

/// 並べ方の計算に使う寸法。`EngineConfig` から作る。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutMetrics {
    pub card_width: f32,
    pub card_depth: f32,
    pub row_footprint: f32,
    pub fan_footprint: f32,
    pub fan_max_spacing: f32,
    pub stack_card_offset: f32,
    pub card_thickness: f32,
    pub fan_rotation_step_deg: f32,
    pub fan_max_rotation_deg: f32,
}

impl From<&EngineConfig> for LayoutMetrics {
    fn from(config: &EngineConfig) -> Self {
        Self {
            card_width: config.card_width,
            card_depth: config.card_depth,
            row_footprint: config.row_footprint(),
            fan_footprint: config.fan_footprint(),
            fan_max_spacing: config.fan_max_spacing(),
            stack_card_offset: config.stack_card_offset,
            card_thickness: config.card_thickness,
            fan_rotation_step_deg: config.fan_rotation_step_deg,
            fan_max_rotation_deg: config.fan_max_rotation_deg,
        }
    }
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        LayoutMetrics::from(&EngineConfig::default())
    }
}

/// row/fan で「このスタックはこの番目にあるものとして並べて」という予約。
/// ドラッグ中のプレビューと、着地待ち (PendingDrop) の両方で使う。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotReservation {
    pub stack_id: StackId,
    pub index: usize,
}

/// row/fan のスロットの並び。スロット i の中心 x は `first_center + spacing * i`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotGeometry {
    pub first_center: f32,
    pub spacing: f32,
    pub slot_count: usize,
}

impl SlotGeometry {
    pub fn center_of(&self, index: usize) -> f32 {
        self.first_center + self.spacing * index as f32
    }
}

/// row/fan で `slot_count` 個のスタックを並べるときの間隔と先頭位置。
/// 間隔は幅に収まるように縮むけど、自然な大きさ (ぴったり並んだ状態) より広がることはない。
/// 並び全体は領域の中央に寄せる。
pub fn slot_geometry(
    region_type: RegionType,
    rect: &TableRect,
    slot_count: usize,
    metrics: &LayoutMetrics,
) -> Option<SlotGeometry> {
    let (footprint, cap) = match region_type {
        RegionType::Row => (metrics.row_footprint, metrics.row_footprint),
        RegionType::Fan => (metrics.fan_footprint, metrics.fan_max_spacing.min(metrics.fan_footprint)),
        _ => return None,
    };
    let (center_x, _) = rect.center();
    if slot_count <= 1 {
        return Some(SlotGeometry { first_center: center_x, spacing: footprint, slot_count: slot_count.max(1) });
    }
    let gaps = (slot_count - 1) as f32;
    let spacing = ((rect.width - footprint) / gaps).clamp(0.0, cap);
    Some(SlotGeometry { first_center: center_x - spacing * gaps / 2.0, spacing, slot_count })
}

/// 1つの領域の並べ方リクエスト。
pub struct LayoutRequest<'a> {
    pub region: &'a Region,
    pub rect: TableRect,
    /// 権威ストアでの順番。
    pub stacks: &'a [StackId],
    pub state: &'a TableState,
    /// 並びから外すスタック (ドラッグ中・着地待ちで持ち上がっているもの)。
    pub exclude: &'a [StackId],
    /// 並びに差し込むスタック (着地待ち、ドラッグ中のプレビューの順)。
    pub reserve: &'a [SlotReservation],
    /// 最初のカードに付ける描画優先度。
    pub base_priority: u64,
}

/// スタック1つ分の結果。`anchor` はスタックの一番下のカードの位置。
#[derive(Debug, Clone, PartialEq)]
pub struct StackLayout {
    pub stack_id: StackId,
    pub anchor: Position,
    pub rotation: f32,
    pub cards: Vec<CardPlacement>,
}

/// 除外と予約を反映した、実際に並べる順番。
/// 予約は前から順に差し込む。後の予約の位置は、前の予約を差し込んだあとの並びに対するもの。
pub fn effective_order<'a>(
    stacks: &'a [StackId],
    exclude: &'a [StackId],
    reserve: &'a [SlotReservation],
) -> Vec<&'a StackId> {
    let mut order: Vec<&StackId> = stacks
        .iter()
        .filter(|s| !exclude.contains(s))
        .filter(|s| !reserve.iter().any(|r| &r.stack_id == *s))
        .collect();
    for reservation in reserve.iter().filter(|r| !exclude.contains(&r.stack_id)) {
        let index = reservation.index.min(order.len());
        order.insert(index, &reservation.stack_id);
    }
    order
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutProjector {
    metrics: LayoutMetrics,
}

impl LayoutProjector {
    pub fn new(metrics: LayoutMetrics) -> Self {
        Self { metrics }
    }

    pub fn metrics(&self) -> &LayoutMetrics {
        &self.metrics
    }

    /// 領域の中の見えているカード全部を並べる。
    pub fn project(&self, request: &LayoutRequest<'_>) -> Vec<StackLayout> {
        let order = effective_order(request.stacks, request.exclude, request.reserve);
        let region = request.region;
        let rect = request.rect;
        let direction = region.stack_direction();
        let mut next_priority = request.base_priority;

        match region.region_type {
            RegionType::Row | RegionType::Fan => {
                let geometry = match slot_geometry(region.region_type, &rect, order.len(), &self.metrics) {
                    Some(geometry) => geometry,
                    None => return Vec::new(),
                };
                let anchor_z = self.ordered_anchor_z(&rect, direction);
                order
                    .iter()
                    .enumerate()
                    .map(|(i, stack_id)| {
                        let anchor = Position::ground(geometry.center_of(i), anchor_z);
                        let rotation = if region.region_type == RegionType::Fan {
                            self.fan_rotation(i, order.len())
                        } else {
                            0.0
                        };
                        self.layout_stack(request.state, stack_id, anchor, rotation, direction, 0, &mut next_priority)
                    })
                    .collect()
            }
            RegionType::Free => order
                .iter()
                .map(|stack_id| {
                    let (x, z) = request
                        .state
                        .stack(stack_id)
                        .and_then(|s| s.free_position)
                        .map(|p| {
                            (
                                rect.left + p.x.clamp(0.0, 100.0) / 100.0 * rect.width,
                                rect.top + p.z.clamp(0.0, 100.0) / 100.0 * rect.depth,
                            )
                        })
                        .unwrap_or_else(|| rect.center());
                    self.layout_stack(request.state, stack_id, Position::ground(x, z), 0.0, direction, 0, &mut next_priority)
                })
                .collect(),
            RegionType::Pile | RegionType::Unknown => {
                let (x, z) = if region.region_type == RegionType::Pile {
                    rect.center()
                } else {
                    // 左上の角にカードの左上を合わせる
                    (rect.left + self.metrics.card_width / 2.0, rect.top + self.metrics.card_depth / 2.0)
                };
                // 山の中では前のスタックの上に積み上げていく (高さが重ならないように)
                let mut cards_below = 0;
                order
                    .iter()
                    .map(|stack_id| {
                        let layout = self.layout_stack(
                            request.state,
                            stack_id,
                            Position::ground(x, z),
                            0.0,
                            direction,
                            cards_below,
                            &mut next_priority,
                        );
                        cards_below += layout.cards.len();
                        layout
                    })
                    .collect()
            }
        }
    }

    /// row/fan のスタックの z。カードが下にずれていくなら領域の上端から始める。
    fn ordered_anchor_z(&self, rect: &TableRect, direction: Direction) -> f32 {
        let half = self.metrics.card_depth / 2.0;
        match direction {
            Direction::Down => (rect.top + half).min(rect.center().1),
            Direction::Up => (rect.bottom() - half).max(rect.center().1),
            _ => rect.center().1,
        }
    }

    fn fan_rotation(&self, index: usize, count: usize) -> f32 {
        let middle = (count as f32 - 1.0) / 2.0;
        let max = self.metrics.fan_max_rotation_deg;
        ((index as f32 - middle) * self.metrics.fan_rotation_step_deg).clamp(-max, max)
    }

    /// スタックのカードを二次軸方向にずらしながら並べる。
    /// `cards_below` はこのスタックより下に既にあるカードの数 (pile 用)。
    #[allow(clippy::too_many_arguments)]
    fn layout_stack(
        &self,
        state: &TableState,
        stack_id: &StackId,
        anchor: Position,
        rotation: f32,
        direction: Direction,
        cards_below: usize,
        next_priority: &mut u64,
    ) -> StackLayout {
        let (dx, dz) = direction.axis();
        let cards = state
            .stack(stack_id)
            .map(|stack| {
                stack
                    .cards
                    .iter()
                    .enumerate()
                    .map(|(k, card_id)| {
                        let lateral = self.metrics.stack_card_offset * (cards_below + k) as f32;
                        let placement = CardPlacement {
                            card_id: card_id.clone(),
                            stack_id: stack_id.clone(),
                            position: Position::new(
                                anchor.x + dx * lateral,
                                anchor.y + self.metrics.card_thickness * (cards_below + k) as f32,
                                anchor.z + dz * lateral,
                            ),
                            rotation,
                            render_order: *next_priority,
                        };
                        *next_priority += 1;
                        placement
                    })
                    .collect()
            })
            .unwrap_or_default();
        StackLayout { stack_id: stack_id.clone(), anchor, rotation, cards }
    }
}

/// 持ち上がったスタック (ドラッグ中・着地待ち・アニメーション中) を、
/// 一番下のカードの位置 `anchor` から並べ直す。領域の並びとは関係なく同じずらし方をする。
pub fn lifted_stack_cards(
    projector: &LayoutProjector,
    state: &TableState,
    stack_id: &StackId,
    anchor: Position,
    rotation: f32,
    direction: Direction,
    base_priority: u64,
) -> Vec<CardPlacement> {
    let mut next = base_priority;
    projector
        .layout_stack(state, stack_id, anchor, rotation, direction, 0, &mut next)
        .cards
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::stack::{CardId, GroupId, Stack};

    fn state_with(stack_cards: &[(&str, usize)]) -> (TableState, Vec<StackId>) {
        let mut state = TableState::default();
        let mut ids = Vec::new();
        for (name, count) in stack_cards {
            let cards = (0..*count).map(|k| CardId::new(format!("{}-{}", name, k)));
            state.stacks.insert(StackId::from(*name), Stack::new(cards));
            ids.push(StackId::from(*name));
        }
        state.groups.insert(GroupId::from("g"), ids.clone());
        (state, ids)
    }

    fn rect(left: f32, width: f32) -> TableRect {
        TableRect { left, top: 0.0, width, depth: 20.0 }
    }

    fn request<'a>(
        region: &'a Region,
        rect: TableRect,
        stacks: &'a [StackId],
        state: &'a TableState,
    ) -> LayoutRequest<'a> {
        LayoutRequest { region, rect, stacks, state, exclude: &[], reserve: &[], base_priority: 0 }
    }

    #[test]
    fn row_uses_natural_footprint_when_there_is_room() {
        let metrics = LayoutMetrics::default();
        let projector = LayoutProjector::new(metrics);
        let region = Region::new("r", RegionType::Row, 0.0, 0.0, 0.0, 0.0);
        let (state, ids) = state_with(&[("a", 1), ("b", 1), ("c", 1)]);
        let layouts = projector.project(&request(&region, rect(0.0, 100.0), &ids, &state));
        let xs: Vec<f32> = layouts.iter().map(|l| l.anchor.x).collect();
        let fp = metrics.row_footprint;
        assert_eq!(xs, vec![50.0 - fp, 50.0, 50.0 + fp]);
    }

    #[test]
    fn row_spacing_shrinks_to_fit_narrow_regions() {
        let metrics = LayoutMetrics::default();
        let projector = LayoutProjector::new(metrics);
        let region = Region::new("r", RegionType::Row, 0.0, 0.0, 0.0, 0.0);
        let (state, ids) = state_with(&[("a", 1), ("b", 1), ("c", 1), ("d", 1), ("e", 1)]);
        let width = metrics.row_footprint * 2.0;
        let layouts = projector.project(&request(&region, rect(0.0, width), &ids, &state));
        let spacing = layouts[1].anchor.x - layouts[0].anchor.x;
        assert!(spacing < metrics.row_footprint);
        assert!((spacing - (width - metrics.row_footprint) / 4.0).abs() < 1e-4);
        // 両端のカードが領域内に収まる
        let half = metrics.row_footprint / 2.0;
        assert!(layouts[0].anchor.x - half >= -1e-4);
        assert!(layouts[4].anchor.x + half <= width + 1e-4);
    }

    #[test]
    fn single_stack_is_centered() {
        let projector = LayoutProjector::default();
        let region = Region::new("r", RegionType::Row, 0.0, 0.0, 0.0, 0.0);
        let (state, ids) = state_with(&[("only", 2)]);
        let layouts = projector.project(&request(&region, rect(10.0, 30.0), &ids, &state));
        assert_eq!(layouts.len(), 1);
        assert_eq!(layouts[0].anchor.x, 25.0);
    }

    #[test]
    fn fan_is_tighter_than_row_and_rotates_symmetrically() {
        let metrics = LayoutMetrics::default();
        let projector = LayoutProjector::new(metrics);
        let region = Region::new("hand", RegionType::Fan, 0.0, 0.0, 0.0, 0.0);
        let (state, ids) = state_with(&[("a", 1), ("b", 1), ("c", 1)]);
        let layouts = projector.project(&request(&region, rect(0.0, 100.0), &ids, &state));
        let spacing = layouts[1].anchor.x - layouts[0].anchor.x;
        assert!((spacing - metrics.fan_max_spacing).abs() < 1e-4);
        assert_eq!(layouts[0].rotation, -layouts[2].rotation);
        assert_eq!(layouts[1].rotation, 0.0);
    }

    #[test]
    fn pile_collapses_to_center_and_keeps_stacking_height() {
        let metrics = LayoutMetrics::default();
        let projector = LayoutProjector::new(metrics);
        let region = Region::new("deck", RegionType::Pile, 0.0, 0.0, 0.0, 0.0);
        let (state, ids) = state_with(&[("a", 2), ("b", 2)]);
        let layouts = projector.project(&request(&region, rect(0.0, 40.0), &ids, &state));
        let cards: Vec<&CardPlacement> = layouts.iter().flat_map(|l| l.cards.iter()).collect();
        assert_eq!(cards.len(), 4);
        for (k, card) in cards.iter().enumerate() {
            assert_eq!(card.position.x, 20.0);
            assert_eq!(card.position.z, 10.0);
            assert!((card.position.y - metrics.card_thickness * k as f32).abs() < 1e-6);
        }
    }

    #[test]
    fn free_stacks_keep_their_stored_position() {
        let metrics = LayoutMetrics::default();
        let projector = LayoutProjector::new(metrics);
        let region = Region::new("table", RegionType::Free, 0.0, 0.0, 0.0, 0.0);
        let (mut state, ids) = state_with(&[("a", 3), ("b", 1)]);
        if let Some(a) = state.stacks.get_mut(&StackId::from("a")) {
            *a = a.clone().with_free_position(25.0, 50.0);
        }
        let layouts = projector.project(&request(&region, rect(0.0, 40.0), &ids, &state));
        assert_eq!(layouts[0].anchor, Position::ground(10.0, 10.0));
        // 位置が無いスタックは中央
        assert_eq!(layouts[1].anchor, Position::ground(20.0, 10.0));
        // 下向きに per-card オフセット
        let zs: Vec<f32> = layouts[0].cards.iter().map(|c| c.position.z).collect();
        assert_eq!(zs, vec![10.0, 10.0 + metrics.stack_card_offset, 10.0 + 2.0 * metrics.stack_card_offset]);
    }

    #[test]
    fn unknown_type_anchors_at_top_left() {
        let metrics = LayoutMetrics::default();
        let projector = LayoutProjector::new(metrics);
        let region = Region::new("odd", RegionType::Unknown, 0.0, 0.0, 0.0, 0.0);
        let (state, ids) = state_with(&[("a", 1)]);
        let layouts = projector.project(&request(&region, rect(5.0, 40.0), &ids, &state));
        assert_eq!(layouts[0].anchor, Position::ground(5.0 + metrics.card_width / 2.0, metrics.card_depth / 2.0));
    }

    #[test]
    fn render_priorities_strictly_increase() {
        let projector = LayoutProjector::default();
        let region = Region::new("r", RegionType::Row, 0.0, 0.0, 0.0, 0.0);
        let (state, ids) = state_with(&[("a", 3), ("b", 2), ("c", 4)]);
        let mut req = request(&region, rect(0.0, 100.0), &ids, &state);
        req.base_priority = 500;
        let orders: Vec<u64> = projector
            .project(&req)
            .iter()
            .flat_map(|l| l.cards.iter().map(|c| c.render_order))
            .collect();
        assert_eq!(orders, (500..509).collect::<Vec<u64>>());
    }

    #[test]
    fn projection_is_idempotent() {
        let projector = LayoutProjector::default();
        for region_type in [RegionType::Row, RegionType::Fan, RegionType::Pile, RegionType::Free, RegionType::Unknown] {
            let region = Region::new("r", region_type, 0.0, 0.0, 0.0, 0.0);
            let (state, ids) = state_with(&[("a", 2), ("b", 1), ("c", 3)]);
            let req = request(&region, rect(-20.0, 60.0), &ids, &state);
            assert_eq!(projector.project(&req), projector.project(&req));
        }
    }

    #[test]
    fn exclusion_and_reservation_change_the_order() {
        let a = StackId::from("a");
        let b = StackId::from("b");
        let c = StackId::from("c");
        let stacks = vec![a.clone(), b.clone(), c.clone()];
        assert_eq!(effective_order(&stacks, &[b.clone()], &[]), vec![&a, &c]);
        let reserve = [SlotReservation { stack_id: c.clone(), index: 0 }];
        assert_eq!(effective_order(&stacks, &[], &reserve), vec![&c, &a, &b]);
        let incoming = [SlotReservation { stack_id: StackId::from("z"), index: 9 }];
        assert_eq!(effective_order(&stacks, &[], &incoming).last().map(|s| s.as_str()), Some("z"));
    }

    #[test]
    fn later_reservations_index_into_the_reserved_order() {
        let a = StackId::from("a");
        let b = StackId::from("b");
        let stacks = vec![a.clone(), b.clone()];
        let landing = StackId::from("landing");
        let dragged = StackId::from("dragged");
        let reserve = [
            SlotReservation { stack_id: landing.clone(), index: 1 },
            SlotReservation { stack_id: dragged.clone(), index: 3 },
        ];
        assert_eq!(effective_order(&stacks, &[], &reserve), vec![&a, &landing, &b, &dragged]);
        // 除外された予約は差し込まない
        assert_eq!(effective_order(&stacks, &[landing.clone()], &reserve), vec![&a, &b, &dragged]);
    }
}
