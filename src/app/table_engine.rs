// src/app/table_engine.rs
//! テーブル全体をまとめる本体。
//!
//! ポインタ入力・権威ストアの更新・ack・タイマーを受け取って状態を進め、
//! 毎フレーム `placements()` でレンダラー向けのカード配置を作る。
//! 権威ストアのスナップショット (`TableState`) は書き換えない。
//! ドラッグ中のプレビューや着地待ちは全部レイアウト時の除外/予約で表現する。

use itertools::Itertools;
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::app::animation::SettleAnimator;
use crate::app::drag_handler::{DragContext, DragController, DragEvent, DragTarget, PointerMove, PointerUp, Release};
use crate::app::drag_state_store::{drag_state_store, DragStateReader, DragStateSnapshot};
use crate::app::network_sender::MoveSink;
use crate::app::projection::ScreenProjector;
use crate::app::reconciliation::{free_position_in, DropRequest, ReconciliationManager, Resolved};
use crate::app::timers::{TimerId, TimerScheduler};
use crate::components::dragging_info::PendingDrop;
use crate::components::position::{CardPlacement, Position, TableRect};
use crate::components::region::{Direction, RegionType};
use crate::components::stack::{CardId, GroupId, RegionId, StackId, TableState};
use crate::config::layout::REGION_PRIORITY_STRIDE;
use crate::config::EngineConfig;
use crate::error::{TableError, TableResult};
use crate::logic::layout_projector::{lifted_stack_cards, LayoutMetrics, LayoutProjector, LayoutRequest};
use crate::logic::region_index::RegionIndex;
use crate::protocol::{IntentId, ServerMessage};

/// ポインタを離した結果。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ReleaseOutcome {
    Ignored,
    Click { card_id: CardId },
    /// 移動意図を出して着地待ちになった。
    Dropped { intent_id: IntentId },
    /// 落とす先が無かったので元の位置に戻る。
    Reverted { stack_id: StackId },
}

pub struct TableEngine<T: TimerScheduler, M: MoveSink> {
    config: EngineConfig,
    regions: RegionIndex,
    metrics: LayoutMetrics,
    projector: LayoutProjector,
    screen: Box<dyn ScreenProjector>,
    state: TableState,
    drag: DragController,
    reader: DragStateReader,
    reconciliation: ReconciliationManager,
    animator: SettleAnimator,
    timers: T,
    sink: M,
}

impl<T: TimerScheduler, M: MoveSink> TableEngine<T, M> {
    pub fn new(regions: RegionIndex, config: EngineConfig, timers: T, sink: M, screen: Box<dyn ScreenProjector>) -> Self {
        let (writer, reader) = drag_state_store();
        let metrics = LayoutMetrics::from(&config);
        let engine = Self {
            regions,
            metrics,
            projector: LayoutProjector::new(metrics),
            screen,
            state: TableState::default(),
            drag: DragController::new(&config, writer),
            reader,
            reconciliation: ReconciliationManager::new(&config),
            animator: SettleAnimator::new(&config),
            timers,
            sink,
            config,
        };
        info!(
            "TableEngine: ready with {} regions (session {})",
            engine.regions.regions().len(),
            engine.reconciliation.session_tag()
        );
        engine
    }

    // --- 参照系 ---

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn regions(&self) -> &RegionIndex {
        &self.regions
    }

    pub fn state(&self) -> &TableState {
        &self.state
    }

    /// 描画コンポーネントに配るための読み込みハンドル。
    pub fn reader(&self) -> DragStateReader {
        self.reader.clone()
    }

    pub fn snapshot(&self) -> DragStateSnapshot {
        self.reader.snapshot()
    }

    pub fn hovered_region_id(&self) -> Option<RegionId> {
        self.reader.hovered_region_id()
    }

    pub fn hovered_group_id(&self) -> Option<GroupId> {
        self.reader.hovered_group_id()
    }

    pub fn pending(&self) -> Option<&PendingDrop> {
        self.reconciliation.pending()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.session().is_some()
    }

    pub fn is_animating(&self, stack_id: &StackId) -> bool {
        self.animator.is_animating(stack_id)
    }

    pub fn should_suppress_click(&self, now_ms: f64) -> bool {
        self.drag.should_suppress_click(now_ms)
    }

    pub fn timers_mut(&mut self) -> &mut T {
        &mut self.timers
    }

    pub fn sink(&self) -> &M {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut M {
        &mut self.sink
    }

    pub fn on_drag_event(&mut self, listener: impl FnMut(&DragEvent) + 'static) {
        self.drag.on_drag_event(listener);
    }

    pub fn set_screen_projector(&mut self, screen: Box<dyn ScreenProjector>) {
        self.screen = screen;
    }

    pub fn region_rect(&self, region_id: &RegionId) -> TableResult<TableRect> {
        self.regions
            .get(region_id)
            .map(|region| self.regions.resolve(region))
            .ok_or_else(|| TableError::UnknownRegion(region_id.clone()))
    }

    // --- ポインタ入力 ---

    /// カードを押した。ドラッグできる状態になったら true。
    pub fn pointer_down(&mut self, card_id: &CardId, screen_x: f32, screen_y: f32) -> TableResult<bool> {
        let stack_id = self
            .state
            .stack_of_card(card_id)
            .cloned()
            .ok_or_else(|| TableError::UnknownCard(card_id.clone()))?;
        let anchor = match self.stack_anchor(&stack_id) {
            Some(anchor) => anchor,
            None => {
                debug!("TableEngine: stack {} is not on a visible region, ignoring press", stack_id);
                return Ok(false);
            }
        };
        let target = DragTarget { stack_id, card_id: card_id.clone(), anchor };
        Ok(self.drag.pointer_down(target, screen_x, screen_y, self.screen.as_ref()))
    }

    pub fn pointer_move(&mut self, screen_x: f32, screen_y: f32) -> PointerMove {
        if let Some(stack_id) = self.drag.starting_stack(screen_x, screen_y).cloned() {
            // 着地待ちのスタックを掴み直した: 先に着地待ちを片付ける
            if self.reconciliation.supersede_stack(&stack_id, &mut self.timers).is_some() {
                debug!("TableEngine: pending drop of {} superseded by a new drag", stack_id);
                self.drag.publish_pending(None);
            }
            self.animator.cancel(&stack_id);
        }
        let ctx = DragContext {
            regions: &self.regions,
            state: &self.state,
            metrics: &self.metrics,
            projector: self.screen.as_ref(),
            pending: self.reconciliation.pending(),
        };
        self.drag.pointer_move(screen_x, screen_y, &ctx)
    }

    pub fn pointer_up(&mut self, screen_x: f32, screen_y: f32, now_ms: f64) -> ReleaseOutcome {
        let ctx = DragContext {
            regions: &self.regions,
            state: &self.state,
            metrics: &self.metrics,
            projector: self.screen.as_ref(),
            pending: self.reconciliation.pending(),
        };
        let up = self.drag.pointer_up(screen_x, screen_y, now_ms, &ctx);
        self.handle_release(up)
    }

    pub fn pointer_cancel(&mut self, now_ms: f64) -> ReleaseOutcome {
        let ctx = DragContext {
            regions: &self.regions,
            state: &self.state,
            metrics: &self.metrics,
            projector: self.screen.as_ref(),
            pending: self.reconciliation.pending(),
        };
        let up = self.drag.pointer_cancel(now_ms, &ctx);
        self.handle_release(up)
    }

    // --- 権威ストア・タイマー ---

    /// 新しいスナップショット。古いリビジョンは無視する。
    pub fn apply_state(&mut self, state: TableState) {
        if state.revision < self.state.revision {
            warn!("TableEngine: ignoring stale state revision {} (have {})", state.revision, self.state.revision);
            return;
        }
        debug!("TableEngine: state revision {}", state.revision);
        self.state = state;
        let resolved = self.reconciliation.observe_state(&self.state, &mut self.timers);
        self.settle(resolved);
    }

    pub fn apply_state_json(&mut self, json: &str) -> TableResult<()> {
        let state: TableState = serde_json::from_str(json).map_err(TableError::StateParse)?;
        self.apply_state(state);
        Ok(())
    }

    pub fn apply_server_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::StateUpdate { state } => self.apply_state(state),
            ServerMessage::MoveAck { intent_id } => {
                let resolved = self.reconciliation.on_ack(&intent_id, &mut self.timers);
                self.settle(resolved);
            }
            ServerMessage::MoveRejected { intent_id, reason } => {
                let resolved = self.reconciliation.on_rejected(&intent_id, &reason, &mut self.timers);
                self.settle(resolved);
            }
            ServerMessage::Error { message } => error!("TableEngine: server error: {}", message),
        }
    }

    pub fn apply_server_message_json(&mut self, json: &str) -> TableResult<()> {
        let message = ServerMessage::from_json(json)?;
        self.apply_server_message(message);
        Ok(())
    }

    /// ホストがタイマーの発火を知らせてくる。
    pub fn on_timer(&mut self, id: TimerId) {
        let resolved = self.reconciliation.on_timer(id, &mut self.timers);
        self.settle(resolved);
    }

    /// 毎フレーム。補間を進めるだけ。
    pub fn tick(&mut self, dt_ms: f32) {
        for stack_id in self.animator.advance(dt_ms) {
            debug!("TableEngine: stack {} came to rest", stack_id);
        }
    }

    // --- 出力 ---

    /// 見えているカード全部の配置。描画優先度の順。
    pub fn placements(&self) -> Vec<CardPlacement> {
        let snapshot = self.reader.snapshot();
        let lifted: Vec<StackId> = snapshot
            .session
            .iter()
            .map(|s| s.stack_id.clone())
            .chain(snapshot.pending.iter().map(|p| p.stack_id.clone()))
            .collect();

        let mut placements = Vec::new();
        for (index, region) in self.regions.regions().iter().enumerate() {
            let group = match (&region.group_id, region.visible) {
                (Some(group), true) => group,
                _ => continue,
            };
            let reservations = snapshot.reservations_for(&region.id);
            let exclude: Vec<StackId> = lifted
                .iter()
                .filter(|s| !reservations.iter().any(|r| &r.stack_id == *s))
                .cloned()
                .collect();
            let request = LayoutRequest {
                region,
                rect: self.regions.resolve(region),
                stacks: self.state.group_stacks(group),
                state: &self.state,
                exclude: &exclude,
                reserve: &reservations,
                base_priority: (index as u64).saturating_mul(REGION_PRIORITY_STRIDE),
            };
            for layout in self.projector.project(&request) {
                if lifted.contains(&layout.stack_id) {
                    continue;
                }
                match self.animator.sample(&layout.stack_id, layout.anchor) {
                    Some(current) => {
                        let base = self.animator.render_order(&layout.stack_id).unwrap_or_default();
                        let (dx, dy, dz) = (current.x - layout.anchor.x, current.y - layout.anchor.y, current.z - layout.anchor.z);
                        placements.extend(layout.cards.into_iter().enumerate().map(|(k, card)| CardPlacement {
                            position: Position::new(card.position.x + dx, card.position.y + dy, card.position.z + dz),
                            render_order: base.saturating_add(k as u64),
                            ..card
                        }));
                    }
                    None => placements.extend(layout.cards),
                }
            }
        }

        if let Some(session) = &snapshot.session {
            placements.extend(lifted_stack_cards(
                &self.projector,
                &self.state,
                &session.stack_id,
                session.position,
                0.0,
                self.direction_of(session.source_region_id.as_ref()),
                self.drag.dragging_render_order(),
            ));
        }
        if let Some(pending) = &snapshot.pending {
            placements.extend(lifted_stack_cards(
                &self.projector,
                &self.state,
                &pending.stack_id,
                pending.drop_position,
                0.0,
                self.direction_of(Some(&pending.target_region_id)),
                pending.render_order,
            ));
        }

        placements.into_iter().sorted_by_key(|p| p.render_order).collect()
    }

    /// (x, z) にある一番手前のカード。
    pub fn card_at(&self, x: f32, z: f32) -> Option<CardPlacement> {
        let (half_w, half_d) = (self.config.card_width / 2.0, self.config.card_depth / 2.0);
        self.placements()
            .into_iter()
            .filter(|p| {
                let rect = TableRect {
                    left: p.position.x - half_w,
                    top: p.position.z - half_d,
                    width: self.config.card_width,
                    depth: self.config.card_depth,
                };
                rect.contains(x, z)
            })
            .max_by_key(|p| p.render_order)
    }

    // --- 内部 ---

    fn handle_release(&mut self, up: PointerUp) -> ReleaseOutcome {
        match up {
            PointerUp::Ignored => ReleaseOutcome::Ignored,
            PointerUp::Click { card_id, .. } => ReleaseOutcome::Click { card_id },
            PointerUp::Released(release) => self.finish_drop(release),
        }
    }

    fn finish_drop(&mut self, release: Release) -> ReleaseOutcome {
        let session = &release.session;
        let target = match (&release.drop_region_id, release.drop_group_id.clone()) {
            (Some(region_id), Some(group_id)) => self.regions.get(region_id).cloned().map(|region| (region, group_id)),
            _ => None,
        };
        let (region, group_id) = match target {
            Some(target) => target,
            None => {
                // どこにも落とせなかった: 何も送らずに元の場所へ戻す
                info!("TableEngine: stack {} dropped outside any region", session.stack_id);
                self.animator.start(session.stack_id.clone(), session.position, release.render_order);
                return ReleaseOutcome::Reverted { stack_id: session.stack_id.clone() };
            }
        };

        let insertion_index = release.insertion_index.unwrap_or_else(|| {
            // pile/free は一番上 (末尾) に
            self.state.group_stacks(&group_id).iter().filter(|s| **s != session.stack_id).count()
        });
        let free_position = (region.region_type == RegionType::Free)
            .then(|| free_position_in(&self.regions.resolve(&region), session.position));

        let begun = self.reconciliation.begin(
            DropRequest {
                session,
                target_region: &region,
                target_group_id: group_id,
                insertion_index,
                free_position,
                render_order: release.render_order,
            },
            &self.state,
            &mut self.timers,
        );
        // 前の着地待ちはすぐ定位置へ
        if let Some(old) = begun.superseded {
            self.animator.start(old.drop.stack_id.clone(), old.drop.drop_position, old.drop.render_order);
        }
        self.drag.publish_pending(Some(begun.pending));
        let intent_id = begun.intent.intent_id.clone();
        self.sink.emit(begun.intent, begun.log_line);
        ReleaseOutcome::Dropped { intent_id }
    }

    /// 解決した着地待ちを片付けて、定位置へのアニメーションを始める。
    fn settle(&mut self, resolved: Option<Resolved>) {
        if let Some(Resolved { drop, reason }) = resolved {
            debug!("TableEngine: {} settled ({:?})", drop.intent_id, reason);
            self.drag.publish_pending(None);
            self.animator.start(drop.stack_id, drop.drop_position, drop.render_order);
        }
    }

    /// スタックの一番下のカードが今描画されている位置。
    fn stack_anchor(&self, stack_id: &StackId) -> Option<Position> {
        let bottom = self.state.stack(stack_id)?.cards.first()?;
        self.placements()
            .into_iter()
            .find(|p| &p.stack_id == stack_id && &p.card_id == bottom)
            .map(|p| p.position)
    }

    fn direction_of(&self, region_id: Option<&RegionId>) -> Direction {
        region_id
            .and_then(|id| self.regions.get(id))
            .map_or(Direction::Down, |region| region.stack_direction())
    }
}
