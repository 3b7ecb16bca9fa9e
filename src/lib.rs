//! Kinetic Plinko - simulation and progression engine for an idle pegboard game
//!
//! Core modules:
//! - `sim`: Physics tick, spatial peg grid, ball/peg/bonus-marble entities
//! - `economy`: Pure payout and cost formulas
//! - `progression`: Durable player state, upgrade tables, derived stats
//! - `shop`: Upgrade, shard-upgrade and skin purchases
//! - `prestige`: Eligibility, reward computation and the reset swap
//! - `persistence`: Versioned save/load with schema migration
//! - `engine`: The session scheduler that owns all mutable state

pub mod audio;
pub mod economy;
pub mod engine;
pub mod format;
pub mod persistence;
pub mod platform;
pub mod prestige;
pub mod progression;
pub mod settings;
pub mod shop;
pub mod sim;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use engine::{Engine, EngineEvent, SchedulerPhase, Subscription};
pub use progression::{ProgressionState, UpgradeId};
pub use settings::{Settings, Theme};

/// Game configuration constants
pub mod consts {
    /// Fallback board size when the host reports degenerate dimensions
    pub const FALLBACK_BOARD_WIDTH: f32 = 400.0;
    pub const FALLBACK_BOARD_HEIGHT: f32 = 600.0;
    /// Larger reported dimensions also fall back
    pub const MAX_BOARD_DIMENSION: f32 = 16_384.0;

    /// Largest frame step the physics will integrate (tab-resume guard)
    pub const MAX_FRAME_DT: f32 = 0.1;
    /// Cooldowns are counted in frames of this rate, independent of real FPS
    pub const COOLDOWN_FRAME_RATE: f32 = 60.0;

    /// Downward acceleration before the time-scale upgrade is applied
    pub const GRAVITY: f32 = 500.0;
    /// Velocity kept after bouncing off a peg
    pub const PEG_BOUNCE: f32 = 0.6;
    /// Velocity kept after bouncing off a side wall
    pub const WALL_DAMPING: f32 = 0.6;
    /// Total spread of the random horizontal kick on peg contact
    pub const PEG_JITTER: f32 = 50.0;

    /// Ball radii
    pub const BALL_RADIUS: f32 = 6.0;
    pub const MICRO_BALL_RADIUS: f32 = 3.0;
    pub const PEG_RADIUS: f32 = 6.0;

    /// Frames a ball must wait before another peg contact can score
    pub const BALL_HIT_COOLDOWN: f32 = 10.0;
    /// Frames a peg stays "recently hit"
    pub const PEG_COOLDOWN: f32 = 10.0;
    /// Glow units lost per second
    pub const PEG_GLOW_DECAY: f32 = 3.0;

    /// Spatial grid cell size (independent of peg radius)
    pub const GRID_CELL_SIZE: f32 = 64.0;

    /// Peg honeycomb layout
    pub const PEG_ROWS: usize = 12;
    pub const PEG_SPACING_X: f32 = 40.0;
    pub const PEG_SPACING_Y: f32 = 40.0;
    pub const PEG_TOP: f32 = 80.0;
    pub const PEG_COLS_EVEN: usize = 11;
    pub const PEG_COLS_ODD: usize = 10;

    /// Vertical spawn line for new and respawned balls
    pub const SPAWN_Y: f32 = 20.0;
    /// Horizontal scatter around the board centre for fresh spawns
    pub const SPAWN_SCATTER: f32 = 50.0;
    /// Initial horizontal velocity spread for fresh spawns
    pub const SPAWN_VX_SPREAD: f32 = 4.0;
    /// Keep respawned normal balls this far away from the walls
    pub const RESPAWN_EDGE_MARGIN: f32 = 20.0;

    /// Basket band, measured up from the board bottom
    pub const BASKET_BAND_TOP: f32 = 40.0;
    pub const BASKET_BAND_BOTTOM: f32 = 10.0;
    /// Base payout of each basket lane, left to right
    pub const BASKET_LANE_VALUES: [f64; 5] = [10.0, 5.0, 20.0, 5.0, 10.0];
    /// Payout used if a ball lands outside every lane
    pub const BASKET_FALLBACK_VALUE: f64 = 5.0;

    /// Balls this far below the board are culled
    pub const DESPAWN_MARGIN: f32 = 100.0;

    /// Seconds between bonus marble rolls
    pub const BONUS_SPAWN_COOLDOWN_SECS: f64 = 60.0;
    /// Bonus marble motion
    pub const BONUS_DRIFT_SPEED: f32 = 40.0;
    pub const BONUS_WAVE_AMPLITUDE: f32 = 30.0;
    pub const BONUS_WAVE_FREQUENCY: f32 = 2.0;
    pub const BONUS_SPAWN_Y_MIN: f32 = 100.0;
    pub const BONUS_SPAWN_Y_RANGE: f32 = 200.0;
    pub const BONUS_OFFSCREEN_MARGIN: f32 = 50.0;
    /// Pointer hit radius for the bonus marble
    pub const BONUS_HIT_RADIUS: f32 = 40.0;

    /// Minimum milliseconds between throttled observer notifications
    pub const NOTIFY_INTERVAL_MS: f64 = 150.0;
    /// Renderer popup queue bound
    pub const MAX_PENDING_POPUPS: usize = 50;

    /// Offline earnings
    pub const OFFLINE_MIN_SECS: f64 = 60.0;
    pub const OFFLINE_RATE: f64 = 0.25;
}
