// src/protocol.rs

// クライアント(WASM)と権威ストア(サーバー)の間でやり取りするメッセージの形式を定義するよ！💌
// 実際の送受信 (WebSocket とか) はホスト側の仕事。ここでは JSON にする/戻すだけ。
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::components::stack::{FreePosition, GroupId, StackId, TableState};
use crate::error::{TableError, TableResult};

/// クライアントが発行する移動意図の ID。"<セッションタグ>-<連番>" の形。
/// サーバーからの確認 (MoveAck) をこれで突き合わせる。
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct IntentId(pub String);

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 移動意図のおまけ情報。
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct MoveOptions {
    /// free 領域に落としたときの置き場所 (領域に対するパーセント)。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_position: Option<FreePosition>,
    /// 移動元のグループ (ルールエンジン側のログ用)。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_group_id: Option<GroupId>,
}

/// 「このスタックを、このグループの、この位置へ」という移動のお願い。
/// 合法かどうかを決めるのはサーバー側のルールエンジン。こっちは投げっぱなし。
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MoveIntent {
    pub intent_id: IntentId,
    pub stack_id: StackId,
    pub dest_group_id: GroupId,
    pub dest_index: usize,
    #[serde(default)]
    pub options: MoveOptions,
}

// --- クライアントからサーバーへ送るメッセージ (C2S) ---
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// スタックの移動。`log_line` は人が読む用のログ1行。
    MoveStack { intent: MoveIntent, log_line: String },
    /// 今のテーブル状態をちょうだい (接続直後など)。
    RequestTableState,
}

// --- サーバーからクライアントへ届くメッセージ (S2C) ---
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// 権威ストアの新しいスナップショット。
    StateUpdate { state: TableState },
    /// 移動意図を受け付けた。
    MoveAck { intent_id: IntentId },
    /// 移動意図が拒否された。状態は次の StateUpdate で元に戻るはず。
    MoveRejected { intent_id: IntentId, reason: String },
    Error { message: String },
}

impl ServerMessage {
    pub fn from_json(json: &str) -> TableResult<Self> {
        serde_json::from_str(json).map_err(TableError::MessageParse)
    }
}

impl ClientMessage {
    pub fn to_json(&self) -> TableResult<String> {
        serde_json::to_string(self).map_err(TableError::Serialize)
    }
}
