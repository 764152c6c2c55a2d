// src/app/reconciliation.rs
//! ドロップしてから権威ストアが追いつくまでの「着地待ち」(PendingDrop) を管理する。
//!
//! 着地待ちは同時に1つだけ。次のどれかで解決する:
//! - 別グループへの移動: 移動先グループにスタックが現れた
//! - 同じグループ内: スタックの位置がドロップ時点から変わった
//! - MoveAck / MoveRejected が intent id 付きで届いた
//! - タイムアウト (同じグループ内だけの短いタイマーと、全部に付く最大タイマー)
//! 解決したらタイマーを両方止めて、着地待ちを消して、スタックを呼び出し側 (アニメーション) に返す。

use log::{debug, info, warn};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::app::timers::{TimerId, TimerScheduler};
use crate::components::dragging_info::{DragSession, PendingDrop};
use crate::components::position::{Position, TableRect};
use crate::components::region::Region;
use crate::components::stack::{FreePosition, GroupId, StackId, TableState};
use crate::config::EngineConfig;
use crate::protocol::{IntentId, MoveIntent, MoveOptions};

const SESSION_TAG_LEN: usize = 8;

/// なぜ着地待ちが終わったか。
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionReason {
    /// 移動先グループにスタックが入った。
    Arrived,
    /// 同じグループ内で位置が変わった。
    Reordered,
    Acknowledged,
    Rejected(String),
    TimedOut,
    /// 新しいドロップ (か、そのスタックのドラッグ) に置き換えられた。
    Superseded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub drop: PendingDrop,
    pub reason: ResolutionReason,
}

/// ドロップ1回分の入力。
#[derive(Debug, Clone)]
pub struct DropRequest<'a> {
    pub session: &'a DragSession,
    pub target_region: &'a Region,
    pub target_group_id: GroupId,
    pub insertion_index: usize,
    pub free_position: Option<FreePosition>,
    pub render_order: u64,
}

/// `begin` の戻り値。`intent` と `log_line` はそのまま MoveSink へ。
#[derive(Debug, Clone, PartialEq)]
pub struct Begun {
    pub pending: PendingDrop,
    pub intent: MoveIntent,
    pub log_line: String,
    pub superseded: Option<Resolved>,
}

#[derive(Debug)]
struct Tracked {
    drop: PendingDrop,
    short_timer: Option<TimerId>,
    max_timer: TimerId,
}

#[derive(Debug)]
pub struct ReconciliationManager {
    session_tag: String,
    intent_counter: u64,
    timer_counter: u64,
    same_group_fallback_ms: u32,
    max_pending_ms: u32,
    current: Option<Tracked>,
}

impl ReconciliationManager {
    /// セッションタグはランダム (他の参加者の intent id とぶつからないように)。
    pub fn new(config: &EngineConfig) -> Self {
        let tag: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_TAG_LEN)
            .map(char::from)
            .collect();
        Self::with_session_tag(config, tag)
    }

    pub fn with_session_tag(config: &EngineConfig, session_tag: impl Into<String>) -> Self {
        Self {
            session_tag: session_tag.into(),
            intent_counter: 0,
            timer_counter: 0,
            same_group_fallback_ms: config.same_group_fallback_ms,
            max_pending_ms: config.max_pending_ms,
            current: None,
        }
    }

    pub fn session_tag(&self) -> &str {
        &self.session_tag
    }

    pub fn pending(&self) -> Option<&PendingDrop> {
        self.current.as_ref().map(|t| &t.drop)
    }

    /// 新しい着地待ちを作ってタイマーを仕掛ける。前の着地待ちがあれば置き換える。
    pub fn begin(&mut self, request: DropRequest<'_>, state: &TableState, timers: &mut dyn TimerScheduler) -> Begun {
        let superseded = self.finish(ResolutionReason::Superseded, timers);

        self.intent_counter += 1;
        let intent_id = IntentId(format!("{}-{}", self.session_tag, self.intent_counter));
        let session = request.session;
        let index_at_drop = session
            .source_group_id
            .as_ref()
            .and_then(|group| state.index_in_group(group, &session.stack_id));

        let drop = PendingDrop {
            intent_id: intent_id.clone(),
            stack_id: session.stack_id.clone(),
            card_id: session.card_id.clone(),
            source_group_id: session.source_group_id.clone(),
            target_group_id: request.target_group_id.clone(),
            target_region_id: request.target_region.id.clone(),
            drop_position: session.position,
            insertion_index: request.insertion_index,
            index_at_drop,
            render_order: request.render_order,
        };

        let max_timer = self.next_timer();
        timers.schedule(max_timer, self.max_pending_ms);
        let short_timer = if drop.is_same_group() {
            let id = self.next_timer();
            timers.schedule(id, self.same_group_fallback_ms);
            Some(id)
        } else {
            None
        };

        let card_count = state.stack(&drop.stack_id).map_or(1, |s| s.cards.len());
        let log_line = move_log_line(card_count, request.target_region, request.insertion_index);
        let intent = MoveIntent {
            intent_id,
            stack_id: drop.stack_id.clone(),
            dest_group_id: request.target_group_id,
            dest_index: request.insertion_index,
            options: MoveOptions { free_position: request.free_position, source_group_id: drop.source_group_id.clone() },
        };
        info!("Reconciliation: pending {} ({})", drop.intent_id, log_line);

        self.current = Some(Tracked { drop: drop.clone(), short_timer, max_timer });
        Begun { pending: drop, intent, log_line, superseded }
    }

    /// 新しいスナップショットが着地待ちを解決するか調べる。
    pub fn observe_state(&mut self, state: &TableState, timers: &mut dyn TimerScheduler) -> Option<Resolved> {
        let drop = &self.current.as_ref()?.drop;
        let reason = if drop.is_same_group() {
            let index = state.index_in_group(&drop.target_group_id, &drop.stack_id);
            (index != drop.index_at_drop).then_some(ResolutionReason::Reordered)
        } else {
            state
                .group_stacks(&drop.target_group_id)
                .contains(&drop.stack_id)
                .then_some(ResolutionReason::Arrived)
        }?;
        self.finish(reason, timers)
    }

    pub fn on_ack(&mut self, intent_id: &IntentId, timers: &mut dyn TimerScheduler) -> Option<Resolved> {
        if !self.is_current(intent_id) {
            debug!("Reconciliation: ack for stale intent {}", intent_id);
            return None;
        }
        self.finish(ResolutionReason::Acknowledged, timers)
    }

    pub fn on_rejected(&mut self, intent_id: &IntentId, reason: &str, timers: &mut dyn TimerScheduler) -> Option<Resolved> {
        if !self.is_current(intent_id) {
            debug!("Reconciliation: rejection for stale intent {}", intent_id);
            return None;
        }
        warn!("Reconciliation: move {} rejected: {}", intent_id, reason);
        self.finish(ResolutionReason::Rejected(reason.to_string()), timers)
    }

    /// タイマーが発火した。もう関係ない ID なら何もしない。
    pub fn on_timer(&mut self, id: TimerId, timers: &mut dyn TimerScheduler) -> Option<Resolved> {
        let tracked = self.current.as_ref()?;
        if tracked.max_timer != id && tracked.short_timer != Some(id) {
            return None;
        }
        debug!("Reconciliation: {} timed out, settling as a no-op", tracked.drop.intent_id);
        self.finish(ResolutionReason::TimedOut, timers)
    }

    /// このスタックを掴み直したときに呼ぶ。
    pub fn supersede_stack(&mut self, stack_id: &StackId, timers: &mut dyn TimerScheduler) -> Option<Resolved> {
        if self.pending()?.stack_id != *stack_id {
            return None;
        }
        self.finish(ResolutionReason::Superseded, timers)
    }

    fn is_current(&self, intent_id: &IntentId) -> bool {
        self.pending().map_or(false, |d| &d.intent_id == intent_id)
    }

    fn finish(&mut self, reason: ResolutionReason, timers: &mut dyn TimerScheduler) -> Option<Resolved> {
        let tracked = self.current.take()?;
        timers.cancel(tracked.max_timer);
        if let Some(short) = tracked.short_timer {
            timers.cancel(short);
        }
        debug!("Reconciliation: {} resolved ({:?})", tracked.drop.intent_id, reason);
        Some(Resolved { drop: tracked.drop, reason })
    }

    fn next_timer(&mut self) -> TimerId {
        self.timer_counter += 1;
        TimerId(self.timer_counter)
    }
}

/// ルールエンジン側のログに出す1行。位置は 1 始まり。
pub fn move_log_line(card_count: usize, region: &Region, insertion_index: usize) -> String {
    let cards = if card_count == 1 { "1 card".to_string() } else { format!("{} cards", card_count) };
    if region.region_type.is_ordered() {
        format!("moved {} to \"{}\" at position {}", cards, region.display_name(), insertion_index + 1)
    } else {
        format!("moved {} to \"{}\"", cards, region.display_name())
    }
}

/// free 領域に落とした位置を、領域に対するパーセントにする。
pub fn free_position_in(rect: &TableRect, position: Position) -> FreePosition {
    let percent = |value: f32, start: f32, size: f32| {
        if size <= 0.0 {
            50.0
        } else {
            ((value - start) / size * 100.0).clamp(0.0, 100.0)
        }
    };
    FreePosition { x: percent(position.x, rect.left, rect.width), z: percent(position.z, rect.top, rect.depth) }
}
