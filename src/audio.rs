//! Audio: the sink the engine plays cues through, plus a Web Audio backend
//!
//! Procedurally generated sound effects - no external files needed!
//! The engine only ever talks to [`AudioSink`]; playback is fire-and-forget
//! and never blocks a tick.

use std::collections::HashMap;

use crate::settings::Settings;

/// Same cue within this window is dropped
pub const RETRIGGER_WINDOW_MS: f64 = 40.0;

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundEffect {
    /// Ball bounces off a peg
    Peg,
    MicroPeg,
    /// Ball lands in a basket
    Basket,
    MicroBasket,
    /// Any successful purchase
    Upgrade,
    /// Bonus marble caught
    Bonus,
    /// Prestige started
    Prestige1,
    /// Prestige committed
    Prestige2,
}

/// Oscillator shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

/// One oscillator blip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub freq: f32,
    /// Frequency at the end of the note, for sweeps
    pub sweep_to: Option<f32>,
    pub waveform: Waveform,
    /// Seconds after the cue starts
    pub delay: f64,
    pub duration: f64,
    /// Peak gain before the cue's volume scale
    pub level: f32,
}

const fn note(freq: f32, waveform: Waveform, delay: f64, duration: f64, level: f32) -> Note {
    Note {
        freq,
        sweep_to: None,
        waveform,
        delay,
        duration,
        level,
    }
}

impl SoundEffect {
    /// Random detune range in semitones
    pub fn pitch_variation(&self) -> f32 {
        match self {
            SoundEffect::Peg | SoundEffect::MicroPeg => 2.0,
            SoundEffect::Basket | SoundEffect::MicroBasket => 1.0,
            _ => 0.0,
        }
    }

    /// Per-cue gain on top of the SFX volume
    pub fn volume_scale(&self) -> f32 {
        match self {
            SoundEffect::Peg | SoundEffect::MicroPeg => 0.3,
            SoundEffect::Basket | SoundEffect::MicroBasket => 0.4,
            _ => 1.0,
        }
    }

    /// The notes that make up the cue
    pub fn notes(&self) -> Vec<Note> {
        use Waveform::*;
        match self {
            SoundEffect::Peg => vec![note(660.0, Sine, 0.0, 0.08, 0.6)],
            SoundEffect::MicroPeg => vec![note(1320.0, Sine, 0.0, 0.05, 0.4)],
            SoundEffect::Basket => vec![Note {
                sweep_to: Some(90.0),
                ..note(220.0, Triangle, 0.0, 0.18, 0.7)
            }],
            SoundEffect::MicroBasket => vec![Note {
                sweep_to: Some(180.0),
                ..note(440.0, Triangle, 0.0, 0.12, 0.5)
            }],
            SoundEffect::Upgrade => [523.0, 659.0, 784.0]
                .iter()
                .enumerate()
                .map(|(i, &f)| note(f, Triangle, i as f64 * 0.06, 0.15, 0.3))
                .collect(),
            SoundEffect::Bonus => [600.0, 800.0, 1000.0, 1200.0]
                .iter()
                .enumerate()
                .map(|(i, &f)| note(f, Sine, i as f64 * 0.08, 0.2, 0.3))
                .collect(),
            SoundEffect::Prestige1 => vec![Note {
                sweep_to: Some(40.0),
                ..note(400.0, Sawtooth, 0.0, 1.2, 0.35)
            }],
            SoundEffect::Prestige2 => [400.0, 500.0, 600.0, 800.0, 1000.0]
                .iter()
                .enumerate()
                .map(|(i, &f)| note(f, Triangle, i as f64 * 0.1, 0.5, 0.3))
                .collect(),
        }
    }
}

/// Drops a cue replayed within [`RETRIGGER_WINDOW_MS`] of its last play
#[derive(Debug, Clone, Default)]
pub struct RetriggerGuard {
    last_played: HashMap<SoundEffect, f64>,
}

impl RetriggerGuard {
    /// Whether `effect` may play at `now_ms`; records the play if so
    pub fn allow(&mut self, effect: SoundEffect, now_ms: f64) -> bool {
        if let Some(&last) = self.last_played.get(&effect) {
            if now_ms - last < RETRIGGER_WINDOW_MS {
                return false;
            }
        }
        self.last_played.insert(effect, now_ms);
        true
    }
}

/// Where the engine sends audio cues
pub trait AudioSink {
    fn play(&mut self, effect: SoundEffect);
    fn set_sfx_volume(&mut self, volume: f32);
    fn set_music_volume(&mut self, volume: f32);
    /// Start the music loop from the beginning
    fn restart_music(&mut self);

    /// Push volumes (respecting mutes) from settings
    fn apply_settings(&mut self, settings: &Settings) {
        self.set_sfx_volume(settings.effective_sfx_volume());
        self.set_music_volume(settings.effective_music_volume());
    }
}

/// Discards every cue (headless runs and tests)
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn play(&mut self, _effect: SoundEffect) {}
    fn set_sfx_volume(&mut self, _volume: f32) {}
    fn set_music_volume(&mut self, _volume: f32) {}
    fn restart_music(&mut self) {}
}

#[cfg(target_arch = "wasm32")]
pub use web::WebAudio;

#[cfg(target_arch = "wasm32")]
mod web {
    use web_sys::{AudioContext, GainNode, OscillatorNode, OscillatorType};

    use super::{AudioSink, Note, RetriggerGuard, SoundEffect, Waveform};

    /// Music drone partials (Hz)
    const MUSIC_PARTIALS: [f32; 3] = [110.0, 164.8, 220.5];

    impl From<Waveform> for OscillatorType {
        fn from(w: Waveform) -> Self {
            match w {
                Waveform::Sine => OscillatorType::Sine,
                Waveform::Triangle => OscillatorType::Triangle,
                Waveform::Square => OscillatorType::Square,
                Waveform::Sawtooth => OscillatorType::Sawtooth,
            }
        }
    }

    /// Web Audio synth with separate SFX and music buses
    pub struct WebAudio {
        ctx: Option<AudioContext>,
        sfx_bus: Option<GainNode>,
        music_bus: Option<GainNode>,
        music: Vec<OscillatorNode>,
        sfx_volume: f32,
        music_volume: f32,
        guard: RetriggerGuard,
    }

    impl Default for WebAudio {
        fn default() -> Self {
            Self::new()
        }
    }

    impl WebAudio {
        pub fn new() -> Self {
            // Try to create audio context (may fail if not in secure context)
            let ctx = AudioContext::new().ok();
            if ctx.is_none() {
                log::warn!("Failed to create AudioContext - audio disabled");
            }
            let bus = |ctx: &AudioContext| {
                let gain = ctx.create_gain().ok()?;
                gain.connect_with_audio_node(&ctx.destination()).ok()?;
                Some(gain)
            };
            let sfx_bus = ctx.as_ref().and_then(bus);
            let music_bus = ctx.as_ref().and_then(bus);
            let mut audio = Self {
                ctx,
                sfx_bus,
                music_bus,
                music: Vec::new(),
                sfx_volume: 0.5,
                music_volume: 0.3,
                guard: RetriggerGuard::default(),
            };
            audio.apply_volumes();
            audio
        }

        /// Resume audio context (required after user gesture)
        pub fn resume(&self) {
            if let Some(ctx) = &self.ctx {
                let _ = ctx.resume();
            }
        }

        fn apply_volumes(&mut self) {
            let Some(ctx) = &self.ctx else { return };
            let t = ctx.current_time();
            if let Some(bus) = &self.sfx_bus {
                bus.gain().set_value_at_time(self.sfx_volume, t).ok();
            }
            if let Some(bus) = &self.music_bus {
                bus.gain().set_value_at_time(self.music_volume, t).ok();
            }
        }

        /// Create an oscillator routed through its own envelope into `bus`
        fn create_osc(
            ctx: &AudioContext,
            bus: &GainNode,
            freq: f32,
            waveform: Waveform,
        ) -> Option<(OscillatorNode, GainNode)> {
            let osc = ctx.create_oscillator().ok()?;
            let gain = ctx.create_gain().ok()?;

            osc.set_type(waveform.into());
            osc.frequency().set_value(freq);
            osc.connect_with_audio_node(&gain).ok()?;
            gain.connect_with_audio_node(bus).ok()?;

            Some((osc, gain))
        }

        fn play_note(ctx: &AudioContext, bus: &GainNode, note: &Note, detune: f32, scale: f32) {
            let freq = note.freq * detune;
            let Some((osc, gain)) = Self::create_osc(ctx, bus, freq, note.waveform) else {
                return;
            };
            let t = ctx.current_time() + note.delay;
            let end = t + note.duration;

            gain.gain().set_value_at_time(note.level * scale, t).ok();
            gain.gain().exponential_ramp_to_value_at_time(0.01, end).ok();
            if let Some(target) = note.sweep_to {
                osc.frequency().set_value_at_time(freq, t).ok();
                osc.frequency()
                    .exponential_ramp_to_value_at_time(target * detune, end)
                    .ok();
            }

            osc.start_with_when(t).ok();
            osc.stop_with_when(end + 0.02).ok();
        }

        fn stop_music(&mut self) {
            for osc in self.music.drain(..) {
                osc.stop().ok();
                osc.disconnect().ok();
            }
        }
    }

    impl AudioSink for WebAudio {
        fn play(&mut self, effect: SoundEffect) {
            if self.sfx_volume <= 0.0 {
                return;
            }
            let (Some(ctx), Some(bus)) = (&self.ctx, &self.sfx_bus) else {
                return;
            };
            if !self.guard.allow(effect, js_sys::Date::now()) {
                return;
            }

            // Resume context if suspended (browsers require user gesture)
            if ctx.state() == web_sys::AudioContextState::Suspended {
                let _ = ctx.resume();
            }

            let semitones = (js_sys::Math::random() as f32 - 0.5) * 2.0 * effect.pitch_variation();
            let detune = 2f32.powf(semitones / 12.0);
            for note in effect.notes() {
                Self::play_note(ctx, bus, &note, detune, effect.volume_scale());
            }
        }

        fn set_sfx_volume(&mut self, volume: f32) {
            self.sfx_volume = volume.clamp(0.0, 1.0);
            self.apply_volumes();
        }

        fn set_music_volume(&mut self, volume: f32) {
            self.music_volume = volume.clamp(0.0, 1.0);
            self.apply_volumes();
        }

        fn restart_music(&mut self) {
            self.stop_music();
            let (Some(ctx), Some(bus)) = (&self.ctx, &self.music_bus) else {
                return;
            };
            for freq in MUSIC_PARTIALS {
                if let Some((osc, gain)) = Self::create_osc(ctx, bus, freq, Waveform::Sine) {
                    gain.gain().set_value(0.15);
                    osc.start().ok();
                    self.music.push(osc);
                }
            }
        }
    }
}
