// src/app/game_app.rs

// JavaScript から使うテーブルアプリ本体！
// やり取りは全部 JSON 文字列。送信 (WebSocket など) と描画は JS 側の仕事。
use js_sys::Array;
use log::info;
use wasm_bindgen::prelude::*;

use crate::app::browser_timers::BrowserTimers;
use crate::app::drag_handler::PointerMove;
use crate::app::network_sender::Outbox;
use crate::app::projection::{GroundPlaneProjector, ScreenProjector};
use crate::app::table_engine::{ReleaseOutcome, TableEngine};
use crate::components::stack::CardId;
use crate::config::EngineConfig;
use crate::error::TableError;
use crate::logic::region_index::RegionIndex;
use crate::protocol::ClientMessage;

// TableError を JS の Error に変換する
fn to_js(error: TableError) -> JsValue {
    js_sys::Error::new(&error.to_string()).into()
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| to_js(TableError::Serialize(e)))
}

#[wasm_bindgen]
pub struct TabletopApp {
    engine: TableEngine<BrowserTimers, Outbox>,
    screen: GroundPlaneProjector,
}

#[wasm_bindgen]
impl TabletopApp {
    /// `config_json` は省略可 (一部だけ指定したら残りはデフォルト)。
    #[wasm_bindgen(constructor)]
    pub fn new(
        layout_json: &str,
        config_json: Option<String>,
        viewport_width: f32,
        viewport_height: f32,
    ) -> Result<TabletopApp, JsValue> {
        let config = match config_json {
            Some(json) => EngineConfig::from_json(&json).map_err(to_js)?,
            None => EngineConfig::default(),
        };
        let regions = RegionIndex::from_json(layout_json, &config).map_err(to_js)?;
        let screen = GroundPlaneProjector::new(viewport_width, viewport_height, config.table_width, config.table_depth);
        let timers = BrowserTimers::new()?;
        let mut engine = TableEngine::new(regions, config, timers, Outbox::new(), Box::new(screen));
        // 接続直後は今の状態をもらう
        engine.sink_mut().push(ClientMessage::RequestTableState);
        info!("TabletopApp: created ({} x {} px)", viewport_width, viewport_height);
        Ok(TabletopApp { engine, screen })
    }

    pub fn resize(&mut self, viewport_width: f32, viewport_height: f32) {
        self.screen.resize(viewport_width, viewport_height);
        self.engine.set_screen_projector(Box::new(self.screen));
    }

    pub fn apply_state_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.engine.apply_state_json(json).map_err(to_js)
    }

    pub fn apply_server_message_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.engine.apply_server_message_json(json).map_err(to_js)
    }

    pub fn pointer_down(&mut self, card_id: &str, screen_x: f32, screen_y: f32) -> Result<bool, JsValue> {
        self.engine.pointer_down(&CardId::from(card_id), screen_x, screen_y).map_err(to_js)
    }

    /// ドラッグ中なら true (JS 側でスクロールを止めたりする用)。
    pub fn pointer_move(&mut self, screen_x: f32, screen_y: f32) -> bool {
        matches!(self.engine.pointer_move(screen_x, screen_y), PointerMove::Started(_) | PointerMove::Moved)
    }

    /// 結果を JSON で返す (`"Ignored"`, `{"Click": ...}`, `{"Dropped": ...}`, `{"Reverted": ...}`)。
    pub fn pointer_up(&mut self, screen_x: f32, screen_y: f32, now_ms: f64) -> Result<String, JsValue> {
        let outcome: ReleaseOutcome = self.engine.pointer_up(screen_x, screen_y, now_ms);
        to_json(&outcome)
    }

    pub fn pointer_cancel(&mut self, now_ms: f64) -> Result<String, JsValue> {
        let outcome = self.engine.pointer_cancel(now_ms);
        to_json(&outcome)
    }

    pub fn should_suppress_click(&self, now_ms: f64) -> bool {
        self.engine.should_suppress_click(now_ms)
    }

    /// 毎フレーム呼ぶ。発火したタイマーを処理してからアニメーションを進める。
    pub fn tick(&mut self, dt_ms: f32) {
        for id in self.engine.timers_mut().take_fired() {
            self.engine.on_timer(id);
        }
        self.engine.tick(dt_ms);
    }

    pub fn placements_json(&self) -> Result<String, JsValue> {
        to_json(&self.engine.placements())
    }

    /// 送信待ちのメッセージ (JSON 文字列の配列)。
    pub fn take_outgoing_messages(&mut self) -> Result<Array, JsValue> {
        let messages = self.engine.sink_mut().drain_json().map_err(to_js)?;
        Ok(messages.into_iter().map(|m| JsValue::from_str(&m)).collect())
    }

    pub fn request_table_state(&mut self) {
        self.engine.sink_mut().push(ClientMessage::RequestTableState);
    }

    pub fn snapshot_json(&self) -> Result<String, JsValue> {
        to_json(&self.engine.snapshot())
    }

    pub fn hovered_region_id(&self) -> Option<String> {
        self.engine.hovered_region_id().map(|id| id.0)
    }

    pub fn hovered_group_id(&self) -> Option<String> {
        self.engine.hovered_group_id().map(|id| id.0)
    }

    /// 画面座標の下にある一番手前のカード。
    pub fn card_at(&self, screen_x: f32, screen_y: f32) -> Option<String> {
        let (x, z) = self.screen.screen_to_world(screen_x, screen_y)?;
        self.engine.card_at(x, z).map(|p| p.card_id.0)
    }

    pub fn region_rect_json(&self, region_id: &str) -> Result<String, JsValue> {
        let rect = self.engine.region_rect(&region_id.into()).map_err(to_js)?;
        to_json(&rect)
    }
}
