//! The game engine: one explicit instance owning progression, board and I/O
//!
//! Hosts drive it with two callbacks, [`Engine::frame`] once per rendered
//! frame and [`Engine::second_tick`] once per second, plus the imperative
//! commands below. Everything runs on the caller's thread; observers are
//! notified synchronously after each mutating command and, while ticking, at
//! most every [`NOTIFY_INTERVAL_MS`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::rc::{Rc, Weak};

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::audio::{AudioSink, SoundEffect};
use crate::consts::*;
use crate::economy::{self, IncomeTracker};
use crate::format::format_number;
use crate::persistence::{self, Storage};
use crate::platform;
use crate::prestige::{self, PrestigeRewards};
use crate::progression::{ProgressionState, UpgradeId};
use crate::settings::Settings;
use crate::shop::{self, PurchaseError};
use crate::sim::{self, Board, ScoringEvent, ScoringKind, World};

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerPhase {
    /// Session not started; nothing ticks
    #[default]
    Stopped,
    Running,
    /// User pause; board is frozen where it was
    Paused,
    /// Prestige transition in progress; frames arrive but physics is off
    Suspended,
}

/// One-shot notifications for the host UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    /// A bonus marble spawned paused; show the tutorial, then unpause it
    TutorialRequested,
    BonusSpawned,
    BonusCollected { reward: f64 },
    OfflineEarnings { amount: f64, elapsed_secs: f64 },
    Prestiged { rewards: PrestigeRewards },
    HardReset,
}

/// Floating "+$N" label for the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Popup {
    pub pos: Vec2,
    pub amount: f64,
    pub text: String,
    pub critical: bool,
    pub master: bool,
    pub micro: bool,
}

type Observer = Box<dyn FnMut(&ProgressionState)>;

#[derive(Default)]
struct ObserverList {
    next_id: u64,
    entries: Vec<(u64, Observer)>,
    /// Unsubscribed while their list was checked out for a notify
    removed: Vec<u64>,
}

/// Handle returned by [`Engine::subscribe`]
///
/// Dropping the handle leaves the observer registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    observers: Weak<RefCell<ObserverList>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        let Some(list) = self.observers.upgrade() else {
            return;
        };
        let mut list = list.borrow_mut();
        let before = list.entries.len();
        list.entries.retain(|(id, _)| *id != self.id);
        if list.entries.len() == before {
            list.removed.push(self.id);
        }
    }
}

impl std::fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverList")
            .field("count", &self.entries.len())
            .finish()
    }
}

/// Simulation and progression engine
pub struct Engine {
    state: ProgressionState,
    world: World,
    rng: Pcg32,
    income: IncomeTracker,
    storage: Box<dyn Storage>,
    audio: Box<dyn AudioSink>,
    observers: Rc<RefCell<ObserverList>>,
    phase: SchedulerPhase,
    last_bonus_spawn_ms: f64,
    last_notify_ms: f64,
    /// Latest time the host passed to `start`, `frame` or `second_tick`
    host_now_ms: Option<f64>,
    offline_earnings: Option<f64>,
    popups: VecDeque<Popup>,
    events: Vec<EngineEvent>,
}

impl Engine {
    /// Load the saved state from `storage` and build a default-sized board
    pub fn new(storage: Box<dyn Storage>, audio: Box<dyn AudioSink>, seed: u64) -> Self {
        let state = persistence::load(storage.as_ref());
        Self::with_state(state, storage, audio, seed)
    }

    /// Use `state` instead of whatever `storage` holds
    pub fn with_state(
        mut state: ProgressionState,
        storage: Box<dyn Storage>,
        mut audio: Box<dyn AudioSink>,
        seed: u64,
    ) -> Self {
        state.recompute_derived();
        audio.apply_settings(&state.settings);
        Self {
            state,
            world: World::new(Board::default()),
            rng: Pcg32::seed_from_u64(seed),
            income: IncomeTracker::default(),
            storage,
            audio,
            observers: Rc::new(RefCell::new(ObserverList::default())),
            phase: SchedulerPhase::Stopped,
            last_bonus_spawn_ms: 0.0,
            last_notify_ms: f64::NEG_INFINITY,
            host_now_ms: None,
            offline_earnings: None,
            popups: VecDeque::new(),
            events: Vec::new(),
        }
    }

    // === Read access ===

    pub fn state(&self) -> &ProgressionState {
        &self.state
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Money price of the next level, `None` for unknown ids
    pub fn upgrade_cost(&self, id: &str) -> Option<f64> {
        UpgradeId::from_str(id).map(|id| shop::upgrade_cost(&self.state, id))
    }

    pub fn can_prestige(&self) -> bool {
        prestige::is_eligible(&self.state)
    }

    /// What prestiging right now would pay
    pub fn prestige_preview(&self) -> PrestigeRewards {
        PrestigeRewards::compute(&self.state)
    }

    // === Observers ===

    /// Register a callback run after every state change
    pub fn subscribe(&mut self, callback: impl FnMut(&ProgressionState) + 'static) -> Subscription {
        let mut list = self.observers.borrow_mut();
        let id = list.next_id;
        list.next_id += 1;
        list.entries.push((id, Box::new(callback)));
        Subscription {
            id,
            observers: Rc::downgrade(&self.observers),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().entries.len()
    }

    fn notify(&mut self) {
        // Check the list out so a callback may unsubscribe itself
        let mut running = std::mem::take(&mut self.observers.borrow_mut().entries);
        for (_, callback) in running.iter_mut() {
            callback(&self.state);
        }
        let mut list = self.observers.borrow_mut();
        let removed = std::mem::take(&mut list.removed);
        running.retain(|(id, _)| !removed.contains(id));
        running.append(&mut list.entries);
        list.entries = running;
    }

    // === Scheduler ===

    /// Begin the session: offline grant, first ball, music
    pub fn start(&mut self, now_ms: f64) {
        if self.phase != SchedulerPhase::Stopped {
            log::debug!("start ignored in phase {:?}", self.phase);
            return;
        }
        self.phase = SchedulerPhase::Running;
        self.host_now_ms = Some(now_ms);
        self.last_bonus_spawn_ms = now_ms;
        self.grant_offline_earnings(now_ms);
        sim::top_up_population(&mut self.world, &self.state, &mut self.rng);
        self.audio.apply_settings(&self.state.settings);
        self.audio.restart_music();
        log::info!("Session started");
        self.notify();
    }

    pub fn pause(&mut self) {
        if self.phase == SchedulerPhase::Running {
            self.phase = SchedulerPhase::Paused;
            self.notify();
        }
    }

    pub fn resume(&mut self) {
        if self.phase == SchedulerPhase::Paused {
            self.phase = SchedulerPhase::Running;
            self.notify();
        }
    }

    pub fn toggle_pause(&mut self) {
        match self.phase {
            SchedulerPhase::Running => self.pause(),
            SchedulerPhase::Paused => self.resume(),
            _ => {}
        }
    }

    /// Per-frame callback; `dt` in seconds, clamped to [`MAX_FRAME_DT`]
    pub fn frame(&mut self, dt: f32, now_ms: f64) {
        if self.phase != SchedulerPhase::Running {
            return;
        }
        self.host_now_ms = Some(now_ms);
        let dt = if dt.is_finite() { dt.clamp(0.0, MAX_FRAME_DT) } else { 0.0 };
        self.state.total_play_time += f64::from(dt);

        if now_ms - self.last_notify_ms > NOTIFY_INTERVAL_MS {
            self.last_notify_ms = now_ms;
            self.notify();
        }

        let events = sim::tick(&mut self.world, &self.state, dt, &mut self.rng);
        for event in events {
            self.apply_scoring(event);
        }
    }

    /// Fixed one-second callback: income snapshot, autosave, bonus marble
    pub fn second_tick(&mut self, now_ms: f64) {
        if self.phase != SchedulerPhase::Running {
            return;
        }
        self.host_now_ms = Some(now_ms);
        self.income.snapshot(&mut self.state);
        self.persist(now_ms);

        let bonus_due = now_ms - self.last_bonus_spawn_ms > BONUS_SPAWN_COOLDOWN_SECS * 1000.0;
        if bonus_due && !self.world.bonus.active {
            if self.rng.random::<f64>() < self.state.derived.bonus_chance {
                self.spawn_bonus_marble(now_ms);
            } else {
                self.last_bonus_spawn_ms = now_ms;
            }
        }
    }

    fn apply_scoring(&mut self, event: ScoringEvent) {
        let (base, effect) = match event.kind {
            ScoringKind::Peg { .. } => {
                let effect = (!self.state.settings.peg_muted).then_some(if event.source.is_micro {
                    SoundEffect::MicroPeg
                } else {
                    SoundEffect::Peg
                });
                (economy::peg_base_value(&self.state), effect)
            }
            ScoringKind::Basket { lane } => {
                let effect = (!self.state.settings.basket_muted).then_some(if event.source.is_micro {
                    SoundEffect::MicroBasket
                } else {
                    SoundEffect::Basket
                });
                (economy::basket_base_value(&self.state, lane), effect)
            }
        };

        let payout = economy::score(&self.state, event.source, base, &mut self.rng);
        self.income.credit(&mut self.state, payout.amount);

        if !self.state.settings.disable_money_popups {
            self.push_popup(Popup {
                pos: event.pos,
                amount: payout.amount,
                text: format!("+${}", format_number(payout.amount)),
                critical: payout.critical,
                master: event.source.is_master,
                micro: event.source.is_micro,
            });
        }
        if let Some(effect) = effect {
            self.audio.play(effect);
        }
    }

    fn push_popup(&mut self, popup: Popup) {
        while self.popups.len() >= MAX_PENDING_POPUPS {
            self.popups.pop_front();
        }
        self.popups.push_back(popup);
    }

    fn persist(&mut self, now_ms: f64) {
        if let Err(err) = persistence::save(self.storage.as_mut(), &mut self.state, now_ms) {
            log::warn!("Save failed: {err}");
        }
    }

    /// Save from a command, stamped on the host's clock
    ///
    /// Before the host has supplied a time, the wall clock stands in.
    fn persist_command(&mut self) {
        let now_ms = self.host_now_ms.unwrap_or_else(platform::now_ms);
        self.persist(now_ms);
    }

    fn grant_offline_earnings(&mut self, now_ms: f64) {
        if self.state.last_save_time <= 0.0 {
            return;
        }
        let elapsed_secs = (now_ms - self.state.last_save_time) / 1000.0;
        let amount = economy::offline_grant(self.state.peak_mps, elapsed_secs);
        if amount <= 0.0 {
            return;
        }

        self.state.money += amount;
        self.state.lifetime_earnings += amount;
        self.state.total_earnings += amount;
        self.offline_earnings = Some(amount);
        self.events.push(EngineEvent::OfflineEarnings {
            amount,
            elapsed_secs,
        });
        log::info!(
            "Offline for {elapsed_secs:.0}s, granted ${}",
            format_number(amount)
        );
        self.persist(now_ms);
    }

    // === Board ===

    /// Resize the board to the host canvas; bad or oversized sizes fall back to 400x600
    pub fn attach_board(&mut self, width: f32, height: f32) {
        self.world.resize(Board::new(width, height));
    }

    fn spawn_bonus_marble(&mut self, now_ms: f64) {
        let paused = !self.state.settings.seen_bonus_tutorial;
        let board = self.world.board;
        self.world.bonus.spawn(&board, &mut self.rng, paused);
        self.last_bonus_spawn_ms = now_ms;
        self.events.push(EngineEvent::BonusSpawned);
        if paused {
            self.events.push(EngineEvent::TutorialRequested);
        }
        log::debug!("Bonus marble spawned (paused: {paused})");
    }

    /// Release a bonus marble held for the tutorial
    pub fn unpause_bonus_marble(&mut self) {
        self.world.bonus.paused = false;
        if !self.state.settings.seen_bonus_tutorial {
            self.state.settings.seen_bonus_tutorial = true;
            self.persist_command();
        }
        self.notify();
    }

    /// Try to catch the bonus marble at a board-space point; returns the reward or 0
    pub fn click_bonus_marble(&mut self, x: f32, y: f32) -> f64 {
        if !self.world.bonus.hit_test(Vec2::new(x, y)) {
            return 0.0;
        }
        let reward = economy::bonus_reward(&self.state);
        self.income.credit(&mut self.state, reward);
        self.world.bonus.active = false;
        self.audio.play(SoundEffect::Bonus);
        self.events.push(EngineEvent::BonusCollected { reward });
        log::info!("Bonus marble caught for ${}", format_number(reward));
        self.persist_command();
        self.notify();
        reward
    }

    /// Drop a micro ball at the pointer's board x; returns its id
    pub fn spawn_micro_marble(&mut self, x: f32, _y: f32) -> u32 {
        self.world.spawn_micro(x, &mut self.rng)
    }

    // === Shop ===

    fn after_purchase(&mut self) {
        self.audio.play(SoundEffect::Upgrade);
        self.persist_command();
        self.notify();
    }

    /// Buy one level of a run upgrade; returns the new level
    pub fn buy_upgrade(&mut self, id: &str) -> Result<u32, PurchaseError> {
        let result = UpgradeId::from_str(id)
            .ok_or_else(|| PurchaseError::UnknownId(id.to_string()))
            .and_then(|upgrade| shop::buy_upgrade(&mut self.state, upgrade));
        match &result {
            Ok(level) => {
                log::debug!("Bought {id} level {level}");
                self.after_purchase();
            }
            Err(err) => log::debug!("Upgrade {id} rejected: {err}"),
        }
        result
    }

    /// Buy one level of a shard upgrade; returns the new level
    pub fn buy_permanent_upgrade(&mut self, id: &str) -> Result<u32, PurchaseError> {
        let result = shop::buy_permanent_upgrade(&mut self.state, id);
        match &result {
            Ok(_) => self.after_purchase(),
            Err(err) => log::debug!("Permanent upgrade {id} rejected: {err}"),
        }
        result
    }

    /// Buy a skin; returns the shards spent
    pub fn buy_skin(&mut self, id: &str) -> Result<u64, PurchaseError> {
        let result = shop::buy_skin(&mut self.state, id);
        match &result {
            Ok(_) => self.after_purchase(),
            Err(err) => log::debug!("Skin {id} rejected: {err}"),
        }
        result
    }

    pub fn equip_skin(&mut self, id: &str) -> Result<(), PurchaseError> {
        let result = shop::equip_skin(&mut self.state, id);
        match &result {
            Ok(()) => {
                self.persist_command();
                self.notify();
            }
            Err(err) => log::debug!("Equip {id} rejected: {err}"),
        }
        result
    }

    // === Settings ===

    /// Edit settings, then push them to audio and save
    pub fn update_settings(&mut self, edit: impl FnOnce(&mut Settings)) {
        edit(&mut self.state.settings);
        self.state.settings.sanitize();
        self.audio.apply_settings(&self.state.settings);
        self.persist_command();
        self.notify();
    }

    // === Prestige ===

    /// Suspend physics and mute music until the returned guard is dropped
    pub fn begin_prestige(&mut self) -> PrestigeTransition<'_> {
        let previous = self.phase;
        self.phase = SchedulerPhase::Suspended;
        self.audio.set_music_volume(0.0);
        self.audio.play(SoundEffect::Prestige1);
        PrestigeTransition {
            engine: self,
            previous,
        }
    }

    /// Prestige with the engine's own reward computation
    pub fn prestige(&mut self) -> Option<PrestigeRewards> {
        let rewards = self.prestige_preview();
        self.commit_prestige(rewards.shards, rewards.master_multiplier_gain)
            .then_some(rewards)
    }

    /// Prestige with host-supplied rewards; false if the run isn't eligible
    pub fn commit_prestige(&mut self, shards: u64, master_multiplier_gain: u64) -> bool {
        if !self.can_prestige() {
            log::debug!("Prestige rejected: requirements not met");
            return false;
        }
        let transition = self.begin_prestige();
        transition.commit(PrestigeRewards {
            shards,
            master_multiplier_gain,
        });
        true
    }

    fn apply_prestige(&mut self, rewards: PrestigeRewards) {
        self.state = prestige::commit(&self.state, rewards);
        self.income.reset();
        self.persist_command();

        self.world.clear_balls();
        self.world.bonus = Default::default();
        sim::top_up_population(&mut self.world, &self.state, &mut self.rng);

        self.audio.play(SoundEffect::Prestige2);
        self.audio.restart_music();
        self.events.push(EngineEvent::Prestiged { rewards });
        log::info!(
            "Prestige #{}: +{} shards, +{} master multiplier",
            self.state.times_prestiged,
            rewards.shards,
            rewards.master_multiplier_gain
        );
        self.notify();
    }

    // === Lifecycle ===

    /// Wipe the save and start over from defaults
    pub fn hard_reset(&mut self) {
        if let Err(err) = persistence::clear(self.storage.as_mut()) {
            log::warn!("Failed to clear save: {err}");
        }
        self.state = ProgressionState::default();
        self.income.reset();
        self.world.clear_balls();
        self.world.bonus = Default::default();
        self.offline_earnings = None;
        self.popups.clear();
        if self.phase != SchedulerPhase::Stopped {
            sim::top_up_population(&mut self.world, &self.state, &mut self.rng);
        }
        self.audio.apply_settings(&self.state.settings);
        self.events.push(EngineEvent::HardReset);
        log::info!("Progress reset");
        self.notify();
    }

    /// Offline grant from session start, handed out once
    pub fn take_offline_earnings(&mut self) -> Option<f64> {
        self.offline_earnings.take()
    }

    pub fn drain_popups(&mut self) -> Vec<Popup> {
        self.popups.drain(..).collect()
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Scope of a prestige transition
///
/// Physics stays suspended for the guard's lifetime. Dropping it, by commit,
/// early return or unwinding, restores the previous phase and music volume.
pub struct PrestigeTransition<'a> {
    engine: &'a mut Engine,
    previous: SchedulerPhase,
}

impl PrestigeTransition<'_> {
    pub fn previous_phase(&self) -> SchedulerPhase {
        self.previous
    }

    /// Swap in the post-prestige state
    pub fn commit(self, rewards: PrestigeRewards) {
        self.engine.apply_prestige(rewards);
    }
}

impl Deref for PrestigeTransition<'_> {
    type Target = Engine;

    fn deref(&self) -> &Engine {
        self.engine
    }
}

impl DerefMut for PrestigeTransition<'_> {
    fn deref_mut(&mut self) -> &mut Engine {
        self.engine
    }
}

impl Drop for PrestigeTransition<'_> {
    fn drop(&mut self) {
        self.engine.phase = self.previous;
        let volume = self.engine.state.settings.effective_music_volume();
        self.engine.audio.set_music_volume(volume);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStorage;
    use crate::progression::catalog::PERM_BONUS_CHANCE;
    use std::cell::Cell;

    #[derive(Debug, Default)]
    struct AudioLog {
        played: Vec<SoundEffect>,
        music_volume: f32,
        restarts: u32,
    }

    struct RecordingAudio(Rc<RefCell<AudioLog>>);

    impl AudioSink for RecordingAudio {
        fn play(&mut self, effect: SoundEffect) {
            self.0.borrow_mut().played.push(effect);
        }
        fn set_sfx_volume(&mut self, _volume: f32) {}
        fn set_music_volume(&mut self, volume: f32) {
            self.0.borrow_mut().music_volume = volume;
        }
        fn restart_music(&mut self) {
            self.0.borrow_mut().restarts += 1;
        }
    }

    const FRAME: f32 = 1.0 / 60.0;

    fn engine_with(state: ProgressionState) -> (Engine, Rc<RefCell<AudioLog>>) {
        let log = Rc::new(RefCell::new(AudioLog::default()));
        let engine = Engine::with_state(
            state,
            Box::new(MemoryStorage::new()),
            Box::new(RecordingAudio(log.clone())),
            7,
        );
        (engine, log)
    }

    fn eligible_state() -> ProgressionState {
        let mut state = ProgressionState::default();
        state.upgrades.extra_ball = 50;
        state.money = 2e8;
        state.lifetime_earnings = 4e9;
        state.peak_mps = 2e6;
        state.recompute_derived();
        state
    }

    /// Run `seconds` of 60 fps frames with the one-second callback
    fn run(engine: &mut Engine, start_ms: f64, seconds: u32) -> f64 {
        let mut now = start_ms;
        for _ in 0..seconds {
            for _ in 0..60 {
                now += 1000.0 / 60.0;
                engine.frame(FRAME, now);
            }
            engine.second_tick(now);
        }
        now
    }

    #[test]
    fn test_new_engine_loads_saved_state() {
        let mut storage = MemoryStorage::new();
        let mut state = ProgressionState::default();
        state.money = 77.0;
        persistence::save(&mut storage, &mut state, 1.0).unwrap();

        let engine = Engine::new(Box::new(storage), Box::new(crate::audio::NullAudio), 1);
        assert_eq!(engine.state().money, 77.0);
        assert_eq!(engine.phase(), SchedulerPhase::Stopped);
    }

    #[test]
    fn test_frames_do_nothing_until_started() {
        let (mut engine, _) = engine_with(ProgressionState::default());
        engine.frame(FRAME, 0.0);
        assert!(engine.world().balls.is_empty());
        assert_eq!(engine.state().total_play_time, 0.0);
    }

    #[test]
    fn test_running_earns_money_and_saves() {
        let (mut engine, audio) = engine_with(ProgressionState::default());
        engine.start(0.0);
        assert_eq!(engine.world().balls.len(), 1);
        assert_eq!(audio.borrow().restarts, 1);

        run(&mut engine, 0.0, 10);
        let state = engine.state();
        assert!(state.money > 0.0);
        assert_eq!(state.money, state.lifetime_earnings);
        assert!(state.peak_mps > 0.0);
        assert!((state.total_play_time - 10.0).abs() < 1e-3);

        let saved = persistence::try_load(engine.storage()).unwrap().unwrap();
        assert!(saved.money > 0.0);
        assert!(audio.borrow().played.contains(&SoundEffect::Peg));
        assert!(!engine.drain_popups().is_empty());
    }

    #[test]
    fn test_muted_pegs_and_disabled_popups() {
        let mut state = ProgressionState::default();
        state.settings.peg_muted = true;
        state.settings.basket_muted = true;
        state.settings.disable_money_popups = true;
        let (mut engine, audio) = engine_with(state);
        engine.start(0.0);
        run(&mut engine, 0.0, 10);

        assert!(engine.state().money > 0.0);
        assert!(audio.borrow().played.is_empty());
        assert!(engine.drain_popups().is_empty());
    }

    #[test]
    fn test_popups_are_capped() {
        let mut state = ProgressionState::default();
        state.upgrades.extra_ball = 30;
        let (mut engine, _) = engine_with(state);
        engine.start(0.0);
        run(&mut engine, 0.0, 20);
        assert!(engine.drain_popups().len() <= MAX_PENDING_POPUPS);
    }

    #[test]
    fn test_pause_freezes_board() {
        let (mut engine, _) = engine_with(ProgressionState::default());
        engine.start(0.0);
        engine.frame(FRAME, 16.0);
        engine.toggle_pause();
        assert_eq!(engine.phase(), SchedulerPhase::Paused);

        let before: Vec<Vec2> = engine.world().balls.iter().map(|b| b.pos).collect();
        let play_time = engine.state().total_play_time;
        engine.frame(FRAME, 32.0);
        engine.second_tick(1000.0);
        let after: Vec<Vec2> = engine.world().balls.iter().map(|b| b.pos).collect();
        assert_eq!(before, after);
        assert_eq!(engine.state().total_play_time, play_time);

        engine.toggle_pause();
        assert_eq!(engine.phase(), SchedulerPhase::Running);
    }

    #[test]
    fn test_frame_dt_is_clamped() {
        let (mut engine, _) = engine_with(ProgressionState::default());
        engine.start(0.0);
        engine.frame(5.0, 100.0);
        assert!((engine.state().total_play_time - f64::from(MAX_FRAME_DT)).abs() < 1e-6);
        engine.frame(f32::NAN, 200.0);
        assert!((engine.state().total_play_time - f64::from(MAX_FRAME_DT)).abs() < 1e-6);
    }

    #[test]
    fn test_offline_earnings_once() {
        let mut state = ProgressionState::default();
        state.peak_mps = 100.0;
        state.last_save_time = 1_000_000.0;
        let (mut engine, _) = engine_with(state);

        engine.start(1_000_000.0 + 120_000.0);
        assert_eq!(engine.state().money, 3000.0);
        assert_eq!(engine.take_offline_earnings(), Some(3000.0));
        assert_eq!(engine.take_offline_earnings(), None);
        assert!(matches!(
            engine.drain_events().as_slice(),
            [EngineEvent::OfflineEarnings { amount, .. }] if *amount == 3000.0
        ));
    }

    #[test]
    fn test_short_absence_grants_nothing() {
        let mut state = ProgressionState::default();
        state.peak_mps = 100.0;
        state.last_save_time = 1_000_000.0;
        let (mut engine, _) = engine_with(state);
        engine.start(1_000_000.0 + 30_000.0);
        assert_eq!(engine.take_offline_earnings(), None);
        assert_eq!(engine.state().money, 0.0);
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let (mut engine, _) = engine_with(ProgressionState::default());
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let sub = engine.subscribe(move |_| seen.set(seen.get() + 1));

        engine.update_settings(|s| s.peg_muted = true);
        assert_eq!(calls.get(), 1);
        assert!(engine.state().settings.peg_muted);

        sub.unsubscribe();
        assert_eq!(engine.observer_count(), 0);
        engine.update_settings(|s| s.peg_muted = false);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_notify_is_throttled_while_ticking() {
        let (mut engine, _) = engine_with(ProgressionState::default());
        engine.start(0.0);
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        engine.subscribe(move |_| seen.set(seen.get() + 1));

        // One second of frames at 60 fps
        let mut now = 0.0;
        for _ in 0..60 {
            now += 1000.0 / 60.0;
            engine.frame(FRAME, now);
        }
        assert!(calls.get() >= 6 && calls.get() <= 7, "{} notifies", calls.get());
    }

    #[test]
    fn test_purchase_commands() {
        let mut state = ProgressionState::default();
        state.money = 1000.0;
        let (mut engine, audio) = engine_with(state);

        assert_eq!(
            engine.buy_upgrade("warpDrive"),
            Err(PurchaseError::UnknownId("warpDrive".to_string()))
        );
        assert!(audio.borrow().played.is_empty());

        let cost = engine.upgrade_cost("extraBall").unwrap();
        assert_eq!(engine.buy_upgrade("extraBall"), Ok(2));
        assert_eq!(engine.state().money, 1000.0 - cost);
        assert_eq!(audio.borrow().played, vec![SoundEffect::Upgrade]);
        assert!(persistence::try_load(engine.storage()).unwrap().is_some());

        assert!(engine.buy_skin("nope").is_err());
        assert!(engine.equip_skin("tie_dye_1").is_ok());
    }

    #[test]
    fn test_bonus_marble_tutorial_and_click() {
        let mut state = ProgressionState::default();
        state.perm_upgrades_levels.insert(PERM_BONUS_CHANCE.to_string(), 50);
        let (mut engine, audio) = engine_with(state);
        assert_eq!(engine.state().derived.bonus_chance, 1.0);

        engine.start(0.0);
        engine.second_tick(30_000.0);
        assert!(!engine.world().bonus.active);

        engine.second_tick(61_000.0);
        let bonus = engine.world().bonus.clone();
        assert!(bonus.active);
        assert!(bonus.paused);
        let events = engine.drain_events();
        assert!(events.contains(&EngineEvent::TutorialRequested));

        // Held in place while paused
        engine.frame(FRAME, 61_100.0);
        assert_eq!(engine.world().bonus.pos, bonus.pos);

        engine.unpause_bonus_marble();
        assert!(engine.state().settings.seen_bonus_tutorial);
        assert!(!engine.world().bonus.paused);

        assert_eq!(engine.click_bonus_marble(-500.0, -500.0), 0.0);
        let pos = engine.world().bonus.pos;
        let money = engine.state().money;
        assert_eq!(engine.click_bonus_marble(pos.x, pos.y), 100.0);
        assert_eq!(engine.state().money, money + 100.0);
        assert!(!engine.world().bonus.active);
        assert!(audio.borrow().played.contains(&SoundEffect::Bonus));
        assert_eq!(engine.click_bonus_marble(pos.x, pos.y), 0.0);
    }

    #[test]
    fn test_seen_tutorial_spawns_unpaused() {
        let mut state = ProgressionState::default();
        state.perm_upgrades_levels.insert(PERM_BONUS_CHANCE.to_string(), 50);
        state.settings.seen_bonus_tutorial = true;
        let (mut engine, _) = engine_with(state);
        engine.start(0.0);
        engine.second_tick(61_000.0);
        assert!(engine.world().bonus.active);
        assert!(!engine.world().bonus.paused);
        assert!(!engine.drain_events().contains(&EngineEvent::TutorialRequested));
    }

    #[test]
    fn test_micro_marble_spawn() {
        let (mut engine, _) = engine_with(ProgressionState::default());
        engine.attach_board(500.0, 700.0);
        let id = engine.spawn_micro_marble(123.0, 456.0);
        let ball = engine.world().balls.iter().find(|b| b.id == id).unwrap();
        assert!(ball.is_micro);
        assert_eq!(ball.pos, Vec2::new(123.0, SPAWN_Y));
    }

    #[test]
    fn test_prestige_requires_eligibility() {
        let (mut engine, _) = engine_with(ProgressionState::default());
        assert!(!engine.commit_prestige(9, 5));
        assert!(engine.prestige().is_none());
        assert_eq!(engine.state().times_prestiged, 0);
    }

    #[test]
    fn test_prestige_commit() {
        let (mut engine, audio) = engine_with(eligible_state());
        engine.start(0.0);
        run(&mut engine, 0.0, 1);
        let all_time_peak = engine.state().all_time_peak_mps.max(engine.state().peak_mps);

        let rewards = engine.prestige().unwrap();
        assert_eq!(rewards.shards, 9);

        let state = engine.state();
        assert_eq!(state.kinetic_shards, 9);
        assert_eq!(state.times_prestiged, 1);
        assert_eq!(state.money, 0.0);
        assert_eq!(state.population(), 1);
        assert!(state.all_time_peak_mps >= all_time_peak);
        assert_eq!(engine.phase(), SchedulerPhase::Running);

        // Board restarted with the master ball
        assert_eq!(engine.world().balls.len(), 1);
        assert!(engine.world().has_master());

        let log = audio.borrow();
        assert!(log.played.contains(&SoundEffect::Prestige1));
        assert!(log.played.contains(&SoundEffect::Prestige2));
        assert_eq!(log.restarts, 2);
        assert_eq!(log.music_volume, Settings::default().effective_music_volume());
        drop(log);

        let saved = persistence::try_load(engine.storage()).unwrap().unwrap();
        assert_eq!(saved.kinetic_shards, 9);
        assert!(engine
            .drain_events()
            .iter()
            .any(|e| matches!(e, EngineEvent::Prestiged { .. })));
    }

    #[test]
    fn test_abandoned_transition_restores_phase_and_music() {
        let (mut engine, audio) = engine_with(eligible_state());
        engine.start(0.0);
        engine.pause();
        {
            let mut transition = engine.begin_prestige();
            assert_eq!(transition.phase(), SchedulerPhase::Suspended);
            assert_eq!(transition.previous_phase(), SchedulerPhase::Paused);
            assert_eq!(audio.borrow().music_volume, 0.0);

            // Frames keep arriving but physics is off
            let before = transition.state().total_play_time;
            transition.frame(FRAME, 10.0);
            assert_eq!(transition.state().total_play_time, before);
        }
        assert_eq!(engine.phase(), SchedulerPhase::Paused);
        assert_eq!(audio.borrow().music_volume, 0.3);
        assert_eq!(engine.state().times_prestiged, 0);
    }

    #[test]
    fn test_command_saves_use_host_clock() {
        let mut state = ProgressionState::default();
        state.money = 1000.0;
        let (mut engine, _) = engine_with(state);
        engine.start(5000.0);
        engine.second_tick(6000.0);
        assert_eq!(engine.state().last_save_time, 6000.0);

        engine.buy_upgrade("extraBall").unwrap();
        assert_eq!(engine.state().last_save_time, 6000.0);
        let saved = persistence::try_load(engine.storage()).unwrap().unwrap();
        assert_eq!(saved.last_save_time, 6000.0);

        engine.frame(FRAME, 6500.0);
        engine.update_settings(|s| s.music_muted = true);
        assert_eq!(engine.state().last_save_time, 6500.0);
        engine.equip_skin("tie_dye_1").unwrap();
        assert_eq!(engine.state().last_save_time, 6500.0);
    }

    #[test]
    fn test_bonus_catch_is_saved() {
        let mut state = ProgressionState::default();
        state.perm_upgrades_levels.insert(PERM_BONUS_CHANCE.to_string(), 50);
        state.settings.seen_bonus_tutorial = true;
        let (mut engine, _) = engine_with(state);
        engine.start(0.0);
        engine.second_tick(61_000.0);

        let pos = engine.world().bonus.pos;
        let reward = engine.click_bonus_marble(pos.x, pos.y);
        assert_eq!(reward, 100.0);
        let saved = persistence::try_load(engine.storage()).unwrap().unwrap();
        assert_eq!(saved.money, engine.state().money);
        assert_eq!(saved.last_save_time, 61_000.0);
    }

    #[test]
    fn test_hard_reset() {
        let mut state = eligible_state();
        state.kinetic_shards = 50;
        let (mut engine, _) = engine_with(state);
        engine.start(0.0);
        engine.second_tick(1000.0);
        assert!(persistence::try_load(engine.storage()).unwrap().is_some());

        engine.hard_reset();
        assert_eq!(engine.state(), &ProgressionState::default());
        assert!(persistence::try_load(engine.storage()).unwrap().is_none());
        assert_eq!(engine.world().normal_ball_count(), 1);
    }
}
