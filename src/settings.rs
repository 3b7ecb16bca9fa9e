//! Player settings and preferences
//!
//! Persisted inside the progression save and carried across prestige.

use serde::{Deserialize, Serialize};

/// Colour theme for the UI shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Purple,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Purple => "purple",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dark" => Some(Theme::Dark),
            "purple" => Some(Theme::Purple),
            _ => None,
        }
    }
}

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    // === Audio ===
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,
    /// Music volume (0.0 - 1.0)
    pub music_volume: f32,
    pub sfx_muted: bool,
    pub music_muted: bool,
    /// Skip the peg "tick" sound (it gets busy with many balls)
    pub peg_muted: bool,
    /// Skip the basket landing sound
    pub basket_muted: bool,

    // === HUD ===
    /// Suppress floating "+$N" popups
    pub disable_money_popups: bool,
    #[serde(rename = "activeTheme")]
    pub theme: Theme,

    // === Tutorials ===
    /// Once set, bonus marbles are never held back for the tutorial
    pub seen_bonus_tutorial: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sfx_volume: 0.5,
            music_volume: 0.3,
            sfx_muted: false,
            music_muted: false,
            peg_muted: false,
            basket_muted: false,

            disable_money_popups: false,
            theme: Theme::Dark,

            seen_bonus_tutorial: false,
        }
    }
}

impl Settings {
    /// Effective SFX volume (respects mute)
    pub fn effective_sfx_volume(&self) -> f32 {
        if self.sfx_muted {
            0.0
        } else {
            self.sfx_volume.clamp(0.0, 1.0)
        }
    }

    /// Effective music volume (respects mute)
    pub fn effective_music_volume(&self) -> f32 {
        if self.music_muted {
            0.0
        } else {
            self.music_volume.clamp(0.0, 1.0)
        }
    }

    /// Clamp volumes back into range after an external edit
    pub fn sanitize(&mut self) {
        self.sfx_volume = self.sfx_volume.clamp(0.0, 1.0);
        self.music_volume = self.music_volume.clamp(0.0, 1.0);
    }
}
