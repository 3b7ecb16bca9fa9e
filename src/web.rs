//! Browser bindings
//!
//! Wraps [`Engine`] for JavaScript. The host page owns the canvas and the
//! animation loop: it calls `frame` from `requestAnimationFrame`,
//! `secondTick` from a one-second interval, and reads board and progression
//! snapshots back as plain JS objects for rendering.

use wasm_bindgen::prelude::*;

use crate::audio::WebAudio;
use crate::engine::{Engine, Subscription};
use crate::persistence::LocalStorage;
use crate::platform;
use crate::settings::Settings;

/// Set up panic reporting and console logging; runs once on module load
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("Kinetic Plinko engine loaded");
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let text = serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))?;
    js_sys::JSON::parse(&text)
}

fn err_to_js(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Registered JS observer; call `unsubscribe` to detach it
#[wasm_bindgen]
pub struct WebSubscription(Option<Subscription>);

#[wasm_bindgen]
impl WebSubscription {
    pub fn unsubscribe(&mut self) {
        if let Some(sub) = self.0.take() {
            sub.unsubscribe();
        }
    }
}

/// Board entity snapshot for the renderer
#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct BoardView<'a> {
    width: f32,
    height: f32,
    balls: Vec<BallView<'a>>,
    pegs: Vec<PegView>,
    bonus: Option<glam::Vec2>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct BallView<'a> {
    id: u32,
    x: f32,
    y: f32,
    radius: f32,
    rarity: crate::economy::Rarity,
    is_master: bool,
    is_micro: bool,
    trail: &'a std::collections::VecDeque<glam::Vec2>,
}

#[derive(serde::Serialize)]
struct PegView {
    x: f32,
    y: f32,
    glow: f32,
}

/// Engine handle exported to JavaScript
#[wasm_bindgen]
pub struct WebEngine {
    engine: Engine,
}

#[wasm_bindgen]
impl WebEngine {
    /// Load the save from localStorage; `seed` of 0 picks a time-based seed
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64) -> Self {
        let seed = if seed == 0 { platform::time_seed() } else { seed };
        Self {
            engine: Engine::new(Box::new(LocalStorage), Box::new(WebAudio::new()), seed),
        }
    }

    #[wasm_bindgen(js_name = attachBoard)]
    pub fn attach_board(&mut self, width: f32, height: f32) {
        self.engine.attach_board(width, height);
    }

    pub fn start(&mut self) {
        self.engine.start(platform::now_ms());
    }

    pub fn pause(&mut self) {
        self.engine.pause();
    }

    pub fn resume(&mut self) {
        self.engine.resume();
    }

    #[wasm_bindgen(js_name = togglePause)]
    pub fn toggle_pause(&mut self) {
        self.engine.toggle_pause();
    }

    pub fn phase(&self) -> Result<JsValue, JsValue> {
        to_js(&self.engine.phase())
    }

    /// `dt` in seconds since the previous frame
    pub fn frame(&mut self, dt: f32) {
        self.engine.frame(dt, platform::now_ms());
    }

    #[wasm_bindgen(js_name = secondTick)]
    pub fn second_tick(&mut self) {
        self.engine.second_tick(platform::now_ms());
    }

    // === Snapshots ===

    pub fn state(&self) -> Result<JsValue, JsValue> {
        to_js(self.engine.state())
    }

    pub fn board(&self) -> Result<JsValue, JsValue> {
        let world = self.engine.world();
        let view = BoardView {
            width: world.board.width,
            height: world.board.height,
            balls: world
                .balls
                .iter()
                .map(|b| BallView {
                    id: b.id,
                    x: b.pos.x,
                    y: b.pos.y,
                    radius: b.radius,
                    rarity: b.rarity,
                    is_master: b.is_master,
                    is_micro: b.is_micro,
                    trail: &b.trail,
                })
                .collect(),
            pegs: world
                .pegs
                .iter()
                .map(|p| PegView {
                    x: p.pos.x,
                    y: p.pos.y,
                    glow: p.glow,
                })
                .collect(),
            bonus: world.bonus.active.then_some(world.bonus.pos),
        };
        to_js(&view)
    }

    #[wasm_bindgen(js_name = drainPopups)]
    pub fn drain_popups(&mut self) -> Result<JsValue, JsValue> {
        to_js(&self.engine.drain_popups())
    }

    #[wasm_bindgen(js_name = drainEvents)]
    pub fn drain_events(&mut self) -> Result<JsValue, JsValue> {
        to_js(&self.engine.drain_events())
    }

    #[wasm_bindgen(js_name = takeOfflineEarnings)]
    pub fn take_offline_earnings(&mut self) -> Option<f64> {
        self.engine.take_offline_earnings()
    }

    /// Call `callback(state)` after every state change
    pub fn subscribe(&mut self, callback: js_sys::Function) -> WebSubscription {
        let sub = self.engine.subscribe(move |state| {
            let Ok(value) = to_js(state) else {
                return;
            };
            if let Err(err) = callback.call1(&JsValue::NULL, &value) {
                log::warn!("State observer threw: {err:?}");
            }
        });
        WebSubscription(Some(sub))
    }

    // === Commands ===

    #[wasm_bindgen(js_name = upgradeCost)]
    pub fn upgrade_cost(&self, id: &str) -> Option<f64> {
        self.engine.upgrade_cost(id)
    }

    #[wasm_bindgen(js_name = buyUpgrade)]
    pub fn buy_upgrade(&mut self, id: &str) -> Result<u32, JsValue> {
        self.engine.buy_upgrade(id).map_err(err_to_js)
    }

    #[wasm_bindgen(js_name = buyPermanentUpgrade)]
    pub fn buy_permanent_upgrade(&mut self, id: &str) -> Result<u32, JsValue> {
        self.engine.buy_permanent_upgrade(id).map_err(err_to_js)
    }

    #[wasm_bindgen(js_name = buySkin)]
    pub fn buy_skin(&mut self, id: &str) -> Result<u64, JsValue> {
        self.engine.buy_skin(id).map_err(err_to_js)
    }

    #[wasm_bindgen(js_name = equipSkin)]
    pub fn equip_skin(&mut self, id: &str) -> Result<(), JsValue> {
        self.engine.equip_skin(id).map_err(err_to_js)
    }

    #[wasm_bindgen(js_name = clickBonusMarble)]
    pub fn click_bonus_marble(&mut self, x: f32, y: f32) -> f64 {
        self.engine.click_bonus_marble(x, y)
    }

    #[wasm_bindgen(js_name = unpauseBonusMarble)]
    pub fn unpause_bonus_marble(&mut self) {
        self.engine.unpause_bonus_marble();
    }

    #[wasm_bindgen(js_name = spawnMicroMarble)]
    pub fn spawn_micro_marble(&mut self, x: f32, y: f32) -> u32 {
        self.engine.spawn_micro_marble(x, y)
    }

    /// Replace the settings with a JS object; missing fields keep defaults
    #[wasm_bindgen(js_name = setSettings)]
    pub fn set_settings(&mut self, settings: JsValue) -> Result<(), JsValue> {
        let text: String = js_sys::JSON::stringify(&settings)?.into();
        let next: Settings = serde_json::from_str(&text).map_err(err_to_js)?;
        self.engine.update_settings(|s| *s = next);
        Ok(())
    }

    #[wasm_bindgen(js_name = canPrestige)]
    pub fn can_prestige(&self) -> bool {
        self.engine.can_prestige()
    }

    #[wasm_bindgen(js_name = prestigePreview)]
    pub fn prestige_preview(&self) -> Result<JsValue, JsValue> {
        to_js(&self.engine.prestige_preview())
    }

    /// Prestige with engine-computed rewards; `undefined` if not eligible
    pub fn prestige(&mut self) -> Result<JsValue, JsValue> {
        match self.engine.prestige() {
            Some(rewards) => to_js(&rewards),
            None => Ok(JsValue::UNDEFINED),
        }
    }

    #[wasm_bindgen(js_name = commitPrestige)]
    pub fn commit_prestige(&mut self, shards: u64, master_multiplier_gain: u64) -> bool {
        self.engine.commit_prestige(shards, master_multiplier_gain)
    }

    #[wasm_bindgen(js_name = hardReset)]
    pub fn hard_reset(&mut self) {
        self.engine.hard_reset();
    }
}
