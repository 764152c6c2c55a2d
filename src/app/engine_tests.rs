// src/app/engine_tests.rs
// TableEngine のシナリオテスト！ ポインタ操作からサーバーの返事、タイマーまで通しで動かす。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::drag_handler::PointerMove;
use super::network_sender::Outbox;
use super::projection::GroundPlaneProjector;
use super::table_engine::{ReleaseOutcome, TableEngine};
use super::timers::ManualTimers;
use crate::components::position::CardPlacement;
use crate::components::stack::{CardId, GroupId, RegionId, Stack, StackId, TableState};
use crate::config::EngineConfig;
use crate::error::TableError;
use crate::logic::region_index::RegionIndex;
use crate::protocol::{ClientMessage, IntentId, MoveIntent, ServerMessage};

const LAYOUT: &str = r#"{ "regions": [
    { "id": "row", "type": "row", "left": "10%", "top": 0, "width": "40%", "height": "20%", "groupId": "row" },
    { "id": "secret", "type": "row", "left": "60%", "top": 0, "width": "40%", "height": "20%", "groupId": "secret", "visible": false },
    { "id": "table", "type": "free", "left": 0, "top": "20%", "width": "100%", "height": "60%", "groupId": "table" },
    { "id": "hand", "type": "fan", "left": 0, "top": "80%", "width": "100%", "height": "20%", "groupId": "hand", "label": "Hand" }
] }"#;

// テーブル 160 x 100 を 800 x 500 px で映す (1px = 0.2)
const VIEW_W: f32 = 800.0;
const VIEW_H: f32 = 500.0;

// row 領域: x -64..0, z -50..-30。3 スタックは x = -39, -32, -25 に並ぶ
const ROW_Z: f32 = -45.75;
// hand 領域: z 30..50、fan なので z は中央
const HAND_Z: f32 = 40.0;

type Engine = TableEngine<ManualTimers, Outbox>;

fn screen(x: f32, z: f32) -> (f32, f32) {
    ((x + 80.0) * 5.0, (z + 50.0) * 5.0)
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

fn table_state(revision: u64, groups: &[(&str, &[&str])]) -> TableState {
    let mut state = TableState { revision, ..TableState::default() };
    for (group, stacks) in groups {
        let ids: Vec<StackId> = stacks.iter().map(|s| StackId::from(*s)).collect();
        for id in &ids {
            let cards: Vec<CardId> = if id.as_str() == "h" {
                vec![CardId::from("h1"), CardId::from("h2")]
            } else {
                vec![CardId::new(format!("{}1", id))]
            };
            state.stacks.insert(id.clone(), Stack::new(cards));
        }
        state.groups.insert(GroupId::from(*group), ids);
    }
    state
}

fn initial_state() -> TableState {
    table_state(0, &[("row", &["a", "b", "c"]), ("table", &[]), ("hand", &["h"]), ("secret", &[])])
}

fn engine() -> Engine {
    let config = EngineConfig::default();
    let regions = RegionIndex::from_json(LAYOUT, &config).expect("layout");
    let screen = GroundPlaneProjector::new(VIEW_W, VIEW_H, config.table_width, config.table_depth);
    let mut engine = TableEngine::new(regions, config, ManualTimers::new(), Outbox::new(), Box::new(screen));
    engine.apply_state(initial_state());
    engine
}

/// 押して、一気に動かして、離す。
fn drag(engine: &mut Engine, card: &str, from: (f32, f32), to: (f32, f32)) -> ReleaseOutcome {
    let (sx, sy) = screen(from.0, from.1);
    assert!(engine.pointer_down(&CardId::from(card), sx, sy).expect("known card"), "press on {}", card);
    let (tx, ty) = screen(to.0, to.1);
    engine.pointer_move(tx, ty);
    engine.pointer_up(tx, ty, 0.0)
}

fn advance(engine: &mut Engine, ms: u64) {
    for id in engine.timers_mut().advance(ms) {
        engine.on_timer(id);
    }
}

fn placement<'a>(placements: &'a [CardPlacement], card: &str) -> &'a CardPlacement {
    placements
        .iter()
        .find(|p| p.card_id.as_str() == card)
        .unwrap_or_else(|| panic!("card {} is not placed", card))
}

fn sent_moves(engine: &Engine) -> Vec<(MoveIntent, String)> {
    engine
        .sink()
        .peek()
        .filter_map(|m| match m {
            ClientMessage::MoveStack { intent, log_line } => Some((intent.clone(), log_line.clone())),
            _ => None,
        })
        .collect()
}

#[test]
fn initial_layout_matches_region_geometry() {
    let engine = engine();
    let placements = engine.placements();
    assert_eq!(placements.len(), 5);
    for (card, x) in [("a1", -39.0), ("b1", -32.0), ("c1", -25.0)] {
        let p = placement(&placements, card);
        assert!(close(p.position.x, x) && close(p.position.z, ROW_Z), "{} at {:?}", card, p.position);
    }
    let h1 = placement(&placements, "h1");
    let h2 = placement(&placements, "h2");
    assert!(close(h1.position.x, 0.0) && close(h1.position.z, HAND_Z));
    assert!(h2.position.y > h1.position.y);
    // 描画優先度の順に並んでいて、重複しない
    assert!(placements.windows(2).all(|w| w[0].render_order < w[1].render_order));
}

#[test]
fn reorder_within_row_previews_and_settles_into_second_slot() {
    let mut engine = engine();
    let (sx, sy) = screen(-39.0, ROW_Z);
    engine.pointer_down(&CardId::from("a1"), sx, sy).expect("known card");
    let (tx, ty) = screen(-32.0, ROW_Z);
    assert_eq!(engine.pointer_move(tx, ty), PointerMove::Started(StackId::from("a")));

    // 他のスタックは 0 番と 2 番に寄る
    let snapshot = engine.snapshot();
    let session = snapshot.session.as_ref().expect("dragging");
    assert_eq!(session.hovered_region_id, Some(RegionId::from("row")));
    assert_eq!(session.preview_index, Some(1));
    let placements = engine.placements();
    assert!(close(placement(&placements, "b1").position.x, -39.0));
    assert!(close(placement(&placements, "c1").position.x, -25.0));
    let a1 = placement(&placements, "a1");
    assert!(close(a1.position.y, engine.config().lift_height));
    assert_eq!(a1.render_order, placements.last().map(|p| p.render_order).unwrap_or_default());

    let outcome = engine.pointer_up(tx, ty, 0.0);
    assert!(matches!(outcome, ReleaseOutcome::Dropped { .. }));
    assert!(!engine.is_dragging());
    let moves = sent_moves(&engine);
    assert_eq!(moves.len(), 1);
    assert_eq!(moves[0].0.stack_id, StackId::from("a"));
    assert_eq!(moves[0].0.dest_group_id, GroupId::from("row"));
    assert_eq!(moves[0].0.dest_index, 1);
    assert_eq!(moves[0].1, "moved 1 card to \"row\" at position 2");
    // 同じグループ内なので短いタイマーと最大タイマーの2つ
    assert_eq!(engine.timers_mut().scheduled_count(), 2);

    // 着地待ちの間も並びは崩れない
    let placements = engine.placements();
    assert!(close(placement(&placements, "b1").position.x, -39.0));
    assert!(close(placement(&placements, "c1").position.x, -25.0));
    assert!(close(placement(&placements, "a1").position.y, engine.config().lift_height));

    engine.apply_state(table_state(1, &[("row", &["b", "a", "c"]), ("table", &[]), ("hand", &["h"])]));
    assert!(engine.pending().is_none());
    assert_eq!(engine.timers_mut().scheduled_count(), 0);
    assert!(engine.is_animating(&StackId::from("a")));

    engine.tick(1_000.0);
    let a1 = placement(&engine.placements(), "a1").clone();
    assert!(close(a1.position.x, -32.0) && close(a1.position.y, 0.0));
}

#[test]
fn drop_on_hidden_region_sends_nothing() {
    let mut engine = engine();
    let outcome = drag(&mut engine, "h1", (0.0, HAND_Z), (40.0, -40.0));
    assert_eq!(outcome, ReleaseOutcome::Reverted { stack_id: StackId::from("h") });
    assert!(sent_moves(&engine).is_empty());
    assert!(engine.pending().is_none());
    assert!(engine.snapshot().session.is_none());
    assert_eq!(engine.timers_mut().scheduled_count(), 0);
    // 離した場所から元の場所へ戻っていく
    assert!(engine.is_animating(&StackId::from("h")));
    engine.tick(1_000.0);
    let h1 = placement(&engine.placements(), "h1").clone();
    assert!(close(h1.position.x, 0.0) && close(h1.position.z, HAND_Z));
}

#[test]
fn cross_group_drop_without_confirmation_settles_at_the_max_timeout() {
    let mut engine = engine();
    let outcome = drag(&mut engine, "h1", (0.0, HAND_Z), (0.0, 0.0));
    assert!(matches!(outcome, ReleaseOutcome::Dropped { .. }));
    let moves = sent_moves(&engine);
    let free = moves[0].0.options.free_position.expect("free drop carries a position");
    assert!(close(free.x, 50.0) && close(free.z, 50.0));
    assert_eq!(moves[0].0.options.source_group_id, Some(GroupId::from("hand")));
    assert_eq!(engine.timers_mut().scheduled_count(), 1);

    let max = u64::from(engine.config().max_pending_ms);
    advance(&mut engine, max - 1);
    assert!(engine.pending().is_some());
    advance(&mut engine, 1);
    assert!(engine.pending().is_none());
    assert!(engine.snapshot().pending.is_none());

    // 状態は変わっていないので手札に戻る
    engine.tick(1_000.0);
    assert!(!engine.is_animating(&StackId::from("h")));
    let h1 = placement(&engine.placements(), "h1").clone();
    assert!(close(h1.position.z, HAND_Z) && close(h1.position.y, 0.0));
}

#[test]
fn cross_group_drop_converges_when_the_stack_arrives() {
    let mut engine = engine();
    let outcome = drag(&mut engine, "c1", (-25.0, ROW_Z), (20.0, HAND_Z));
    assert!(matches!(outcome, ReleaseOutcome::Dropped { .. }));
    let moves = sent_moves(&engine);
    assert_eq!(moves[0].0.dest_group_id, GroupId::from("hand"));
    assert_eq!(moves[0].0.dest_index, 1);
    assert_eq!(moves[0].1, "moved 1 card to \"Hand\" at position 2");

    // 手札は c の場所を空け、row は c の抜けた穴を詰める
    let placements = engine.placements();
    assert!(close(placement(&placements, "h1").position.x, -1.5));
    assert!(close(placement(&placements, "a1").position.x, -35.5));
    assert!(close(placement(&placements, "b1").position.x, -28.5));

    engine.apply_state(table_state(1, &[("row", &["a", "b"]), ("table", &[]), ("hand", &["h", "c"])]));
    assert!(engine.pending().is_none());
    engine.tick(1_000.0);
    let c1 = placement(&engine.placements(), "c1").clone();
    assert!(close(c1.position.x, 1.5) && close(c1.position.z, HAND_Z) && close(c1.position.y, 0.0));
}

#[test]
fn explicit_ack_resolves_the_pending_drop() {
    let mut engine = engine();
    let intent_id = match drag(&mut engine, "h1", (0.0, HAND_Z), (0.0, 0.0)) {
        ReleaseOutcome::Dropped { intent_id } => intent_id,
        other => panic!("expected a drop, got {:?}", other),
    };
    engine.apply_server_message(ServerMessage::MoveAck { intent_id: IntentId("someone-else-1".to_string()) });
    assert!(engine.pending().is_some());
    let json = format!(r#"{{ "MoveAck": {{ "intent_id": "{}" }} }}"#, intent_id);
    engine.apply_server_message_json(&json).expect("valid message");
    assert!(engine.pending().is_none());
    assert_eq!(engine.timers_mut().scheduled_count(), 0);
}

#[test]
fn rejected_move_settles_back() {
    let mut engine = engine();
    let intent_id = match drag(&mut engine, "h1", (0.0, HAND_Z), (0.0, 0.0)) {
        ReleaseOutcome::Dropped { intent_id } => intent_id,
        other => panic!("expected a drop, got {:?}", other),
    };
    engine.apply_server_message(ServerMessage::MoveRejected { intent_id, reason: "not your turn".to_string() });
    assert!(engine.pending().is_none());
    assert!(engine.is_animating(&StackId::from("h")));
}

#[test]
fn a_new_drop_replaces_the_pending_one() {
    let mut engine = engine();
    let first = drag(&mut engine, "h1", (0.0, HAND_Z), (0.0, 0.0));
    let first_id = match first {
        ReleaseOutcome::Dropped { intent_id } => intent_id,
        other => panic!("expected a drop, got {:?}", other),
    };
    drag(&mut engine, "c1", (-25.0, ROW_Z), (30.0, 0.0));
    assert_eq!(engine.pending().map(|p| p.stack_id.clone()), Some(StackId::from("c")));
    assert!(engine.is_animating(&StackId::from("h")));
    // 古い着地待ちのタイマーは止まっている
    assert_eq!(engine.timers_mut().scheduled_count(), 1);
    engine.apply_server_message(ServerMessage::MoveAck { intent_id: first_id });
    assert_eq!(engine.pending().map(|p| p.stack_id.clone()), Some(StackId::from("c")));

    advance(&mut engine, 3_000);
    assert!(engine.pending().is_none());
}

#[test]
fn grabbing_the_pending_stack_supersedes_it_first() {
    let mut engine = engine();
    let overlap = Arc::new(AtomicBool::new(false));
    let seen = Arc::clone(&overlap);
    engine.reader().subscribe(move |snapshot| {
        if let (Some(session), Some(pending)) = (&snapshot.session, &snapshot.pending) {
            if session.stack_id == pending.stack_id {
                seen.store(true, Ordering::SeqCst);
            }
        }
    });

    drag(&mut engine, "h1", (0.0, HAND_Z), (0.0, 0.0));
    assert!(engine.pending().is_some());
    // 持ち上がったまま (0, 0) にいるのでそこを掴む
    let (sx, sy) = screen(0.0, 0.0);
    assert!(engine.pointer_down(&CardId::from("h1"), sx, sy).expect("known card"));
    engine.pointer_move(sx + 20.0, sy);
    assert!(engine.is_dragging());
    assert!(engine.pending().is_none());
    assert_eq!(engine.timers_mut().scheduled_count(), 0);
    assert!(!engine.is_animating(&StackId::from("h")));
    assert!(!overlap.load(Ordering::SeqCst));
}

#[test]
fn short_presses_are_clicks() {
    let mut engine = engine();
    let (sx, sy) = screen(-32.0, ROW_Z);
    engine.pointer_down(&CardId::from("b1"), sx, sy).expect("known card");
    assert_eq!(engine.pointer_move(sx + 3.0, sy + 3.0), PointerMove::Armed);
    let outcome = engine.pointer_up(sx + 3.0, sy + 3.0, 500.0);
    assert_eq!(outcome, ReleaseOutcome::Click { card_id: CardId::from("b1") });
    assert!(engine.should_suppress_click(600.0));
    assert!(sent_moves(&engine).is_empty());
    assert!(engine.pending().is_none());
}

#[test]
fn pointer_cancel_drops_at_the_last_position() {
    let mut engine = engine();
    let (sx, sy) = screen(0.0, HAND_Z);
    engine.pointer_down(&CardId::from("h1"), sx, sy).expect("known card");
    let (tx, ty) = screen(-10.0, 10.0);
    engine.pointer_move(tx, ty);
    assert_eq!(engine.hovered_region_id(), Some(RegionId::from("table")));
    assert_eq!(engine.hovered_group_id(), Some(GroupId::from("table")));
    assert!(matches!(engine.pointer_cancel(0.0), ReleaseOutcome::Dropped { .. }));
    assert_eq!(sent_moves(&engine)[0].0.dest_group_id, GroupId::from("table"));
}

#[test]
fn store_update_mid_drag_is_picked_up_at_release() {
    let mut engine = engine();
    let (sx, sy) = screen(-39.0, ROW_Z);
    engine.pointer_down(&CardId::from("a1"), sx, sy).expect("known card");
    let (tx, ty) = screen(-10.0, HAND_Z);
    engine.pointer_move(tx, ty);

    // 他の参加者が a をテーブルに動かした
    engine.apply_state(table_state(1, &[("row", &["b", "c"]), ("table", &["a"]), ("hand", &["h"])]));
    assert!(engine.is_dragging());
    engine.pointer_up(tx, ty, 0.0);
    let moves = sent_moves(&engine);
    assert_eq!(moves[0].0.options.source_group_id, Some(GroupId::from("table")));
    let pending = engine.pending().expect("pending");
    assert!(!pending.is_same_group());
}

#[test]
fn stack_removed_mid_drag_makes_the_release_a_no_op() {
    let mut engine = engine();
    let (sx, sy) = screen(-39.0, ROW_Z);
    engine.pointer_down(&CardId::from("a1"), sx, sy).expect("known card");
    let (tx, ty) = screen(0.0, 0.0);
    engine.pointer_move(tx, ty);
    engine.apply_state(table_state(1, &[("row", &["b", "c"]), ("table", &[]), ("hand", &["h"])]));
    assert!(engine.is_dragging());
    assert_eq!(engine.pointer_up(tx, ty, 0.0), ReleaseOutcome::Reverted { stack_id: StackId::from("a") });
    assert!(sent_moves(&engine).is_empty());
}

#[test]
fn stale_revisions_are_ignored() {
    let mut engine = engine();
    engine.apply_state(table_state(5, &[("row", &["a"]), ("hand", &["h"])]));
    engine.apply_state(table_state(4, &[("row", &["a", "b", "c"]), ("hand", &["h"])]));
    assert_eq!(engine.state().revision, 5);
    assert_eq!(engine.state().group_stacks(&GroupId::from("row")).len(), 1);
}

#[test]
fn state_json_round_trip_through_the_engine() {
    let mut engine = engine();
    let json = r#"{
        "revision": 2,
        "groups": { "table": ["t"] },
        "stacks": { "t": { "cards": ["t1"], "free_position": { "x": 25.0, "z": 50.0 } } }
    }"#;
    engine.apply_state_json(json).expect("valid state");
    let t1 = placement(&engine.placements(), "t1").clone();
    assert!(close(t1.position.x, -40.0) && close(t1.position.z, 0.0));
    assert!(matches!(engine.apply_state_json("{ nope"), Err(TableError::StateParse(_))));
}

#[test]
fn hit_testing_finds_the_topmost_card() {
    let engine = engine();
    let top = engine.card_at(0.5, HAND_Z + 1.0).expect("hand card");
    assert_eq!(top.card_id, CardId::from("h2"));
    let row = engine.card_at(-32.0, ROW_Z).expect("row card");
    assert_eq!(row.card_id, CardId::from("b1"));
    assert!(engine.card_at(0.0, 0.0).is_none());
}

#[test]
fn unknown_ids_are_errors() {
    let mut engine = engine();
    assert!(matches!(engine.pointer_down(&CardId::from("ghost"), 0.0, 0.0), Err(TableError::UnknownCard(_))));
    assert!(matches!(engine.region_rect(&RegionId::from("nowhere")), Err(TableError::UnknownRegion(_))));
    let rect = engine.region_rect(&RegionId::from("row")).expect("declared");
    assert!(close(rect.left, -64.0) && close(rect.width, 64.0));
}

#[test]
fn drag_events_reach_subscribers() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let mut engine = engine();
    let count = Rc::new(RefCell::new(0));
    let seen = Rc::clone(&count);
    engine.on_drag_event(move |_| *seen.borrow_mut() += 1);
    drag(&mut engine, "h1", (0.0, HAND_Z), (0.0, 0.0));
    // start, end (一気に動かしたので move は無し)
    assert_eq!(*count.borrow(), 2);
}

#[test]
fn pending_slot_stays_reserved_while_another_stack_is_dragged_over() {
    let mut engine = engine();
    engine.apply_state(table_state(1, &[("row", &["a", "b", "c"]), ("table", &[]), ("hand", &["h", "k"]), ("secret", &[])]));

    // h を row の 2 番目に落とす。row は a, [h], b, c の4スロット (間隔 7)
    let h1 = placement(&engine.placements(), "h1").position;
    let outcome = drag(&mut engine, "h1", (h1.x, h1.z), (-35.5, ROW_Z));
    assert!(matches!(outcome, ReleaseOutcome::Dropped { .. }));
    assert_eq!(engine.pending().map(|p| p.insertion_index), Some(1));
    let placements = engine.placements();
    let gap = placement(&placements, "b1").position.x - placement(&placements, "a1").position.x;
    assert!(close(gap, 14.0), "gap while pending {}", gap);

    // 着地待ちのまま k を row の右端へ
    let k1 = placement(&engine.placements(), "k1").position;
    let (sx, sy) = screen(k1.x, k1.z);
    assert!(engine.pointer_down(&CardId::from("k1"), sx, sy).expect("known card"));
    let (tx, ty) = screen(-10.0, ROW_Z);
    assert_eq!(engine.pointer_move(tx, ty), PointerMove::Started(StackId::from("k")));
    assert!(engine.pending().is_some());

    // a, [h], b, c, [k] の5スロット
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.session.as_ref().and_then(|s| s.preview_index), Some(4));
    let placements = engine.placements();
    let a = placement(&placements, "a1").position.x;
    let b = placement(&placements, "b1").position.x;
    let c = placement(&placements, "c1").position.x;
    assert!(close(a, -46.0) && close(b, -32.0) && close(c, -25.0), "a {} b {} c {}", a, b, c);
    assert!(close(b - a, 14.0));
    assert!(close(placement(&placements, "h1").position.y, engine.config().lift_height));
}
