// src/app/network_sender.rs
//! 移動意図をサーバーへ流す出口。
//! 実際の送信 (WebSocket など) はホストの仕事なので、ここではメッセージを溜めておくだけ。

use std::collections::VecDeque;

use log::{debug, error};

use crate::error::TableResult;
use crate::protocol::{ClientMessage, MoveIntent};

/// 移動意図の送り先。投げっぱなし (返事は ServerMessage で別に届く)。
pub trait MoveSink {
    fn emit(&mut self, intent: MoveIntent, log_line: String);
}

/// 送信待ちの ClientMessage のキュー。ホストが `drain` して送る。
#[derive(Debug, Default)]
pub struct Outbox {
    queue: VecDeque<ClientMessage>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ClientMessage) {
        debug!("Outbox: queued {:?}", message);
        self.queue.push_back(message);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn peek(&self) -> impl Iterator<Item = &ClientMessage> {
        self.queue.iter()
    }

    pub fn drain(&mut self) -> Vec<ClientMessage> {
        self.queue.drain(..).collect()
    }

    /// 全部 JSON にして取り出す。1つでも失敗したら、そのメッセージは捨ててエラーを返す。
    pub fn drain_json(&mut self) -> TableResult<Vec<String>> {
        self.drain()
            .iter()
            .map(|message| {
                message.to_json().map_err(|e| {
                    error!("Outbox: failed to serialize {:?}: {}", message, e);
                    e
                })
            })
            .collect()
    }
}

impl MoveSink for Outbox {
    fn emit(&mut self, intent: MoveIntent, log_line: String) {
        self.push(ClientMessage::MoveStack { intent, log_line });
    }
}
