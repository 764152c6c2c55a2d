// src/app/browser_timers.rs
//! ブラウザの setTimeout / clearTimeout を使う TimerScheduler。
//!
//! 発火したタイマーの ID はキューに溜まるだけ。エンジンを直接呼ぶと、
//! イベントハンドラの途中で再入してしまうので、ホストが `take_fired` で取り出して
//! `TableEngine::on_timer` に渡す。

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use log::error;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::Window;

use crate::app::timers::{TimerId, TimerScheduler};

pub struct BrowserTimers {
    window: Window,
    // 発火するまでクロージャを生かしておく
    active: HashMap<TimerId, (i32, Closure<dyn FnMut()>)>,
    fired: Arc<Mutex<VecDeque<TimerId>>>,
}

impl BrowserTimers {
    pub fn new() -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window available"))?;
        Ok(Self { window, active: HashMap::new(), fired: Arc::new(Mutex::new(VecDeque::new())) })
    }

    /// 発火済みのタイマーを取り出す。
    pub fn take_fired(&mut self) -> Vec<TimerId> {
        let fired: Vec<TimerId> = match self.fired.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        for id in &fired {
            self.active.remove(id);
        }
        fired
    }
}

impl TimerScheduler for BrowserTimers {
    fn schedule(&mut self, id: TimerId, delay_ms: u32) {
        self.cancel(id);
        let fired = Arc::clone(&self.fired);
        let callback = Closure::wrap(Box::new(move || match fired.lock() {
            Ok(mut queue) => queue.push_back(id),
            Err(poisoned) => poisoned.into_inner().push_back(id),
        }) as Box<dyn FnMut()>);
        let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.as_ref().unchecked_ref(), delay)
        {
            Ok(handle) => {
                self.active.insert(id, (handle, callback));
            }
            Err(e) => error!("BrowserTimers: setTimeout failed for {:?}: {:?}", id, e),
        }
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some((handle, _callback)) = self.active.remove(&id) {
            self.window.clear_timeout_with_handle(handle);
        }
    }
}
