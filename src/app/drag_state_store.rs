// src/app/drag_state_store.rs
//! ドラッグ中セッションと着地待ちドロップを共有する、観測可能なストア。
//!
//! 書き込みは `DragStateWriter` (ドラッグの持ち主の DragController が1つだけ持つ)、
//! 読み込みは `DragStateReader` (いくらでも clone して描画側に配れる)。
//! グローバル変数やコンテキスト経由ではなく、必要なところに明示的に渡して使う。

use std::sync::{Arc, Mutex, MutexGuard};

use log::warn;
use serde::Serialize;

use crate::components::dragging_info::{DragSession, PendingDrop};
use crate::components::stack::{GroupId, RegionId};
use crate::logic::layout_projector::SlotReservation;

/// 診断用にも使う、ある瞬間のドラッグ状態。
#[derive(Serialize, Clone, Debug, PartialEq, Default)]
pub struct DragStateSnapshot {
    pub session: Option<DragSession>,
    pub pending: Option<PendingDrop>,
    /// 書き込みごとに1つ増える。
    pub version: u64,
}

impl DragStateSnapshot {
    pub fn hovered_region_id(&self) -> Option<&RegionId> {
        self.session.as_ref().and_then(|s| s.hovered_region_id.as_ref())
    }

    pub fn hovered_group_id(&self) -> Option<&GroupId> {
        self.session.as_ref().and_then(|s| s.hovered_group_id.as_ref())
    }

    /// この領域で「場所を空けて」おくスロット。差し込む順番通り。
    /// 着地待ちが先、ドラッグ中のプレビューはその並びに対する位置なので後。
    pub fn reservations_for(&self, region_id: &RegionId) -> Vec<SlotReservation> {
        let pending = self
            .pending
            .as_ref()
            .filter(|p| &p.target_region_id == region_id)
            .map(|p| SlotReservation { stack_id: p.stack_id.clone(), index: p.insertion_index });
        let preview = self
            .session
            .as_ref()
            .filter(|s| s.hovered_region_id.as_ref() == Some(region_id))
            .and_then(|s| s.preview_index.map(|index| SlotReservation { stack_id: s.stack_id.clone(), index }));
        pending.into_iter().chain(preview).collect()
    }
}

type Listener = Arc<dyn Fn(&DragStateSnapshot) + Send + Sync>;

struct Shared {
    state: DragStateSnapshot,
    listeners: Vec<(u64, Listener)>,
    next_listener_id: u64,
}

fn lock_shared(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    match shared.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("DragStateStore: mutex poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// `subscribe` の戻り値。`unsubscribe` に渡すと購読をやめる。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

/// 書き込み側と読み込み側のペアを作る。
pub fn drag_state_store() -> (DragStateWriter, DragStateReader) {
    let shared = Arc::new(Mutex::new(Shared {
        state: DragStateSnapshot::default(),
        listeners: Vec::new(),
        next_listener_id: 0,
    }));
    (DragStateWriter { shared: Arc::clone(&shared) }, DragStateReader { shared })
}

/// 唯一の書き込み口。Clone できないようにしてある。
pub struct DragStateWriter {
    shared: Arc<Mutex<Shared>>,
}

impl DragStateWriter {
    pub fn reader(&self) -> DragStateReader {
        DragStateReader { shared: Arc::clone(&self.shared) }
    }

    pub fn set_session(&mut self, session: Option<DragSession>) {
        self.publish(|state| state.session = session);
    }

    pub fn set_pending(&mut self, pending: Option<PendingDrop>) {
        self.publish(|state| state.pending = pending);
    }

    /// 変更してから、ロックを外した状態で購読者に通知する。
    /// (購読者の中から reader を読んでもデッドロックしないように)
    fn publish(&mut self, mutate: impl FnOnce(&mut DragStateSnapshot)) {
        let (snapshot, listeners) = {
            let mut shared = lock_shared(&self.shared);
            mutate(&mut shared.state);
            shared.state.version += 1;
            if let (Some(session), Some(pending)) = (&shared.state.session, &shared.state.pending) {
                if session.stack_id == pending.stack_id {
                    warn!("DragStateStore: stack {} is both dragged and pending", session.stack_id);
                }
            }
            let listeners: Vec<Listener> = shared.listeners.iter().map(|(_, l)| Arc::clone(l)).collect();
            (shared.state.clone(), listeners)
        };
        for listener in listeners {
            listener(&snapshot);
        }
    }
}

/// 読み込み側。描画コンポーネントごとに clone して持たせる。
#[derive(Clone)]
pub struct DragStateReader {
    shared: Arc<Mutex<Shared>>,
}

impl DragStateReader {
    pub fn snapshot(&self) -> DragStateSnapshot {
        lock_shared(&self.shared).state.clone()
    }

    pub fn session(&self) -> Option<DragSession> {
        lock_shared(&self.shared).state.session.clone()
    }

    pub fn pending(&self) -> Option<PendingDrop> {
        lock_shared(&self.shared).state.pending.clone()
    }

    pub fn hovered_region_id(&self) -> Option<RegionId> {
        lock_shared(&self.shared).state.hovered_region_id().cloned()
    }

    pub fn hovered_group_id(&self) -> Option<GroupId> {
        lock_shared(&self.shared).state.hovered_group_id().cloned()
    }

    pub fn subscribe(&self, listener: impl Fn(&DragStateSnapshot) + Send + Sync + 'static) -> Subscription {
        let mut shared = lock_shared(&self.shared);
        let id = shared.next_listener_id;
        shared.next_listener_id += 1;
        shared.listeners.push((id, Arc::new(listener)));
        Subscription(id)
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        lock_shared(&self.shared).listeners.retain(|(id, _)| *id != subscription.0);
    }
}
