// src/app/drag_handler.rs
//! ポインタ1つ分のドラッグのライフサイクル (押す → しきい値 → 動かす → 離す)。
//!
//! Idle --押す--> Armed --しきい値を超えて動く--> Dragging --離す/キャンセル--> (Released) --> Idle
//!                  └--しきい値を超えずに離す (クリック)--> Idle
//!
//! ドロップ先に移動意図を出したり PendingDrop を作ったりするのは TableEngine と
//! ReconciliationManager の仕事。ここは「何をどこに離したか」を返すところまで。

use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info};

use crate::app::drag_state_store::{DragStateReader, DragStateWriter};
use crate::app::projection::ScreenProjector;
use crate::components::dragging_info::{DragSession, PendingDrop};
use crate::components::position::Position;
use crate::components::stack::{CardId, GroupId, RegionId, StackId, TableState};
use crate::config::layout::{LIFTED_PRIORITY_BASE, STACK_PRIORITY_STRIDE};
use crate::config::EngineConfig;
use crate::logic::insertion::insertion_index;
use crate::logic::layout_projector::LayoutMetrics;
use crate::logic::region_index::RegionIndex;

/// 押された (ドラッグできる) もの。`anchor` は今描画されているスタックの一番下のカードの位置。
#[derive(Debug, Clone, PartialEq)]
pub struct DragTarget {
    pub stack_id: StackId,
    pub card_id: CardId,
    pub anchor: Position,
}

/// ホバー判定に必要なものをまとめて借りる。
pub struct DragContext<'a> {
    pub regions: &'a RegionIndex,
    pub state: &'a TableState,
    pub metrics: &'a LayoutMetrics,
    pub projector: &'a dyn ScreenProjector,
    /// 着地待ちのスタックは、落とした先のグループで場所を取っている。
    pub pending: Option<&'a PendingDrop>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragEvent {
    Started { stack_id: StackId, card_id: CardId },
    Moved { stack_id: StackId, position: Position, hovered_region_id: Option<RegionId> },
    Ended { stack_id: StackId, drop_region_id: Option<RegionId> },
}

/// ドラッグを離したときの結果。
#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    /// 離した瞬間のセッション。移動元グループは最新の状態から取り直してある。
    pub session: DragSession,
    /// ドロップ先 (見えていて、グループを持つ領域)。無ければ何もしない。
    pub drop_region_id: Option<RegionId>,
    pub drop_group_id: Option<GroupId>,
    /// row/fan のときの挿入位置。
    pub insertion_index: Option<usize>,
    /// 離した地点 (地面上)。
    pub pointer: (f32, f32),
    pub render_order: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointerUp {
    /// 押していなかった。
    Ignored,
    /// しきい値を超えずに離した。
    Click { stack_id: StackId, card_id: CardId },
    Released(Release),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointerMove {
    Ignored,
    /// まだしきい値の内側。
    Armed,
    /// この移動でドラッグが始まった。
    Started(StackId),
    Moved,
}

#[derive(Debug)]
enum DragPhase {
    Idle,
    Armed { origin: (f32, f32), last_screen: (f32, f32), offset: (f32, f32), target: DragTarget },
    Dragging { last_screen: (f32, f32), offset: (f32, f32), pointer: (f32, f32), session: DragSession },
}

type DragListener = Box<dyn FnMut(&DragEvent)>;

pub struct DragController {
    phase: DragPhase,
    threshold_px: f32,
    click_suppress_ms: f64,
    lift_height: f32,
    suppress_click_until: Option<f64>,
    /// 持ち上げ描画優先度のカウンター。ドロップのたびに1つ増える。
    lift_counter: AtomicU64,
    writer: DragStateWriter,
    listeners: Vec<DragListener>,
}

impl DragController {
    pub fn new(config: &EngineConfig, writer: DragStateWriter) -> Self {
        Self {
            phase: DragPhase::Idle,
            threshold_px: config.drag_threshold_px,
            click_suppress_ms: config.click_suppress_ms,
            lift_height: config.lift_height,
            suppress_click_until: None,
            lift_counter: AtomicU64::new(0),
            writer,
            listeners: Vec::new(),
        }
    }

    pub fn reader(&self) -> DragStateReader {
        self.writer.reader()
    }

    pub fn on_drag_event(&mut self, listener: impl FnMut(&DragEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, DragPhase::Idle)
    }

    pub fn session(&self) -> Option<&DragSession> {
        match &self.phase {
            DragPhase::Dragging { session, .. } => Some(session),
            _ => None,
        }
    }

    /// ドラッグ中のスタックの描画優先度 (次のドロップで確定する値)。
    pub fn dragging_render_order(&self) -> u64 {
        lifted_priority(self.lift_counter.load(Ordering::Relaxed).saturating_add(1))
    }

    /// カウンターを1つ進めて、その優先度を返す。
    pub fn bump_render_order(&self) -> u64 {
        let counter = self.lift_counter.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        lifted_priority(counter)
    }

    /// 着地待ちの更新もこのコントローラーの writer 経由 (書き込み口は1つだけ)。
    pub fn publish_pending(&mut self, pending: Option<PendingDrop>) {
        self.writer.set_pending(pending);
    }

    /// クリック直後の合成 click イベントを無視すべきか。
    pub fn should_suppress_click(&self, now_ms: f64) -> bool {
        self.suppress_click_until.map_or(false, |until| now_ms < until)
    }

    pub fn pointer_down(&mut self, target: DragTarget, screen_x: f32, screen_y: f32, projector: &dyn ScreenProjector) -> bool {
        if !self.is_idle() {
            debug!("DragController: pointer down ignored, already {}", self.phase_name());
            return false;
        }
        let offset = projector
            .screen_to_world(screen_x, screen_y)
            .map(|(x, z)| (target.anchor.x - x, target.anchor.z - z))
            .unwrap_or((0.0, 0.0));
        self.phase = DragPhase::Armed { origin: (screen_x, screen_y), last_screen: (screen_x, screen_y), offset, target };
        true
    }

    /// この移動でドラッグが始まるなら、そのスタック。
    /// (着地待ちのスタックを掴み直すときは、先に着地待ちを片付けてから `pointer_move` を呼ぶ)
    pub fn starting_stack(&self, screen_x: f32, screen_y: f32) -> Option<&StackId> {
        match &self.phase {
            DragPhase::Armed { origin, target, .. } if self.crosses_threshold(*origin, (screen_x, screen_y)) => {
                Some(&target.stack_id)
            }
            _ => None,
        }
    }

    pub fn pointer_move(&mut self, screen_x: f32, screen_y: f32, ctx: &DragContext<'_>) -> PointerMove {
        match std::mem::replace(&mut self.phase, DragPhase::Idle) {
            DragPhase::Idle => PointerMove::Ignored,
            DragPhase::Armed { origin, offset, target, .. } => {
                let screen = (screen_x, screen_y);
                if !self.crosses_threshold(origin, screen) {
                    self.phase = DragPhase::Armed { origin, last_screen: screen, offset, target };
                    return PointerMove::Armed;
                }
                let pointer = ctx
                    .projector
                    .screen_to_world(screen_x, screen_y)
                    .unwrap_or((target.anchor.x - offset.0, target.anchor.z - offset.1));
                let source_group_id = ctx.state.group_of(&target.stack_id).cloned();
                let source_region_id = source_group_id
                    .as_ref()
                    .and_then(|g| ctx.regions.region_for_group(g))
                    .map(|r| r.id.clone());
                let mut session = DragSession {
                    stack_id: target.stack_id.clone(),
                    card_id: target.card_id.clone(),
                    source_group_id,
                    source_region_id,
                    position: target.anchor.with_height(self.lift_height),
                    hovered_region_id: None,
                    hovered_group_id: None,
                    preview_index: None,
                };
                self.track(&mut session, pointer, offset, ctx);
                info!("DragController: drag started for stack {} (card {})", session.stack_id, session.card_id);
                self.writer.set_session(Some(session.clone()));
                self.emit(&DragEvent::Started { stack_id: session.stack_id.clone(), card_id: session.card_id.clone() });
                let stack_id = session.stack_id.clone();
                self.phase = DragPhase::Dragging { last_screen: screen, offset, pointer, session };
                PointerMove::Started(stack_id)
            }
            DragPhase::Dragging { offset, pointer, mut session, .. } => {
                let pointer = ctx.projector.screen_to_world(screen_x, screen_y).unwrap_or(pointer);
                self.track(&mut session, pointer, offset, ctx);
                self.writer.set_session(Some(session.clone()));
                self.emit(&DragEvent::Moved {
                    stack_id: session.stack_id.clone(),
                    position: session.position,
                    hovered_region_id: session.hovered_region_id.clone(),
                });
                self.phase = DragPhase::Dragging { last_screen: (screen_x, screen_y), offset, pointer, session };
                PointerMove::Moved
            }
        }
    }

    pub fn pointer_up(&mut self, screen_x: f32, screen_y: f32, now_ms: f64, ctx: &DragContext<'_>) -> PointerUp {
        match std::mem::replace(&mut self.phase, DragPhase::Idle) {
            DragPhase::Idle => PointerUp::Ignored,
            DragPhase::Armed { target, .. } => {
                self.suppress_click_until = Some(now_ms + self.click_suppress_ms);
                debug!("DragController: click on card {}", target.card_id);
                PointerUp::Click { stack_id: target.stack_id, card_id: target.card_id }
            }
            DragPhase::Dragging { offset, pointer, mut session, .. } => {
                let pointer = ctx.projector.screen_to_world(screen_x, screen_y).unwrap_or(pointer);
                let render_order = self.bump_render_order();
                self.track(&mut session, pointer, offset, ctx);
                // 途中で状態が更新されているかもしれないので取り直す
                session.source_group_id = ctx.state.group_of(&session.stack_id).cloned();

                let still_on_table = ctx.state.stack(&session.stack_id).is_some();
                let (drop_region_id, drop_group_id, insertion_index) =
                    match (still_on_table, &session.hovered_region_id, &session.hovered_group_id) {
                        (true, Some(region), Some(group)) => {
                            (Some(region.clone()), Some(group.clone()), session.preview_index)
                        }
                        _ => (None, None, None),
                    };

                // どんな場合でもセッションはここで消す
                self.writer.set_session(None);
                self.emit(&DragEvent::Ended { stack_id: session.stack_id.clone(), drop_region_id: drop_region_id.clone() });
                info!(
                    "DragController: released stack {} over {}",
                    session.stack_id,
                    drop_region_id.as_ref().map_or("nothing", |r| r.as_str())
                );
                PointerUp::Released(Release { session, drop_region_id, drop_group_id, insertion_index, pointer, render_order })
            }
        }
    }

    /// キャンセルは最後に分かっている位置での pointer up と同じ。
    pub fn pointer_cancel(&mut self, now_ms: f64, ctx: &DragContext<'_>) -> PointerUp {
        let (x, y) = match &self.phase {
            DragPhase::Idle => return PointerUp::Ignored,
            DragPhase::Armed { last_screen, .. } | DragPhase::Dragging { last_screen, .. } => *last_screen,
        };
        self.pointer_up(x, y, now_ms, ctx)
    }

    fn crosses_threshold(&self, origin: (f32, f32), screen: (f32, f32)) -> bool {
        let (dx, dy) = (screen.0 - origin.0, screen.1 - origin.1);
        (dx * dx + dy * dy).sqrt() > self.threshold_px
    }

    /// ポインタ位置からセッションの位置とホバー先を更新する。
    fn track(&self, session: &mut DragSession, pointer: (f32, f32), offset: (f32, f32), ctx: &DragContext<'_>) {
        session.position = Position::new(pointer.0 + offset.0, self.lift_height, pointer.1 + offset.1);
        let region = ctx.regions.find_region_at_point(pointer.0, pointer.1);
        session.hovered_region_id = region.map(|r| r.id.clone());
        session.hovered_group_id = region.and_then(|r| r.group_id.clone());
        session.preview_index = match (region, &session.hovered_group_id) {
            (Some(region), Some(group)) if region.region_type.is_ordered() => {
                // ドラッグ中のスタック自身は数えない。着地待ちのスタックは落とした先のグループで数える
                let pending = ctx.pending.filter(|p| p.stack_id != session.stack_id);
                let settled = ctx
                    .state
                    .group_stacks(group)
                    .iter()
                    .filter(|s| **s != session.stack_id && pending.map_or(true, |p| p.stack_id != **s))
                    .count();
                let holding = pending.map_or(false, |p| &p.target_group_id == group);
                let others = settled + usize::from(holding);
                let rect = ctx.regions.resolve(region);
                insertion_index(pointer.0, region.region_type, &rect, others, ctx.metrics)
            }
            _ => None,
        };
    }

    fn emit(&mut self, event: &DragEvent) {
        for listener in self.listeners.iter_mut() {
            listener(event);
        }
    }

    fn phase_name(&self) -> &'static str {
        match self.phase {
            DragPhase::Idle => "idle",
            DragPhase::Armed { .. } => "armed",
            DragPhase::Dragging { .. } => "dragging",
        }
    }
}

fn lifted_priority(counter: u64) -> u64 {
    LIFTED_PRIORITY_BASE.saturating_add(counter.saturating_mul(STACK_PRIORITY_STRIDE))
}
