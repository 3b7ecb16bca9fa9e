//! Board entities: balls, pegs, the bonus marble and the world that owns them
//!
//! None of this is persisted; the board is rebuilt from the progression state
//! whenever a session starts.

use std::collections::VecDeque;

use glam::Vec2;
use rand::Rng;

use super::grid::{SpatialGrid, layout_pegs};
use crate::consts::*;
use crate::economy::{Rarity, ScoreSource};

/// Board dimensions in world units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Board {
    pub width: f32,
    pub height: f32,
}

impl Default for Board {
    fn default() -> Self {
        Self {
            width: FALLBACK_BOARD_WIDTH,
            height: FALLBACK_BOARD_HEIGHT,
        }
    }
}

impl Board {
    /// Degenerate, oversized or non-finite sizes fall back to the default board
    pub fn new(width: f32, height: f32) -> Self {
        let valid = |v: f32| v.is_finite() && v > 0.0 && v <= MAX_BOARD_DIMENSION;
        if valid(width) && valid(height) {
            Self { width, height }
        } else {
            log::warn!("Invalid board size {width}x{height}, using fallback");
            Self::default()
        }
    }

    /// Width of one of the five basket lanes
    pub fn lane_width(&self) -> f32 {
        self.width / BASKET_LANE_VALUES.len() as f32
    }

    /// Basket lane under `x` (may be out of range for x outside the board)
    pub fn basket_lane(&self, x: f32) -> usize {
        (x / self.lane_width()).floor().max(0.0) as usize
    }

    /// Whether `y` lies inside the basket band
    pub fn in_basket_band(&self, y: f32) -> bool {
        y > self.height - BASKET_BAND_TOP && y < self.height - BASKET_BAND_BOTTOM
    }
}

/// Maximum number of trail points to store
pub const TRAIL_LENGTH: usize = 20;

/// A falling ball
#[derive(Debug, Clone)]
pub struct Ball {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub rarity: Rarity,
    /// The single permanent high-value ball unlocked by prestige
    pub is_master: bool,
    /// Player-spawned bonus ball, removed after its basket landing
    pub is_micro: bool,
    /// Recent positions for rendering (oldest first)
    pub trail: VecDeque<Vec2>,
    /// Frames before a peg contact can score again
    pub hit_cooldown: f32,
    /// Set to cull the ball at the end of the tick
    pub remove: bool,
}

impl Ball {
    pub fn new(id: u32, pos: Vec2, vel: Vec2, rarity: Rarity) -> Self {
        Self {
            id,
            pos,
            vel,
            radius: BALL_RADIUS,
            rarity,
            is_master: false,
            is_micro: false,
            trail: VecDeque::with_capacity(TRAIL_LENGTH + 1),
            hit_cooldown: 0.0,
            remove: false,
        }
    }

    /// Record current position to trail, dropping the oldest point
    pub fn record_trail(&mut self) {
        self.trail.push_back(self.pos);
        while self.trail.len() > TRAIL_LENGTH {
            self.trail.pop_front();
        }
    }

    pub fn clear_trail(&mut self) {
        self.trail.clear();
    }

    /// Move back to the spawn line at rest
    pub fn reset_at(&mut self, x: f32) {
        self.pos = Vec2::new(x, SPAWN_Y);
        self.vel = Vec2::ZERO;
        self.clear_trail();
    }

    pub fn score_source(&self) -> ScoreSource {
        ScoreSource {
            rarity: self.rarity,
            is_master: self.is_master,
            is_micro: self.is_micro,
        }
    }
}

/// A static peg
#[derive(Debug, Clone, PartialEq)]
pub struct Peg {
    pub pos: Vec2,
    /// Hit highlight, 1.0 right after a contact
    pub glow: f32,
    /// Frames since the last contact, counting down
    pub cooldown: f32,
}

impl Peg {
    pub fn new(pos: Vec2) -> Self {
        Self {
            pos,
            glow: 0.0,
            cooldown: 0.0,
        }
    }

    pub fn hit(&mut self) {
        self.glow = 1.0;
        self.cooldown = PEG_COOLDOWN;
    }

    /// Fade glow and count down the cooldown
    pub fn decay(&mut self, dt: f32) {
        if self.glow > 0.0 {
            self.glow = (self.glow - dt * PEG_GLOW_DECAY).max(0.0);
        }
        if self.cooldown > 0.0 {
            self.cooldown = (self.cooldown - dt * COOLDOWN_FRAME_RATE).max(0.0);
        }
    }
}

/// The clickable bonus marble drifting across the board
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BonusMarble {
    pub active: bool,
    pub pos: Vec2,
    /// Centre line of the sine wave
    pub base_y: f32,
    /// Seconds alive (only advances while unpaused)
    pub t: f32,
    /// Held in place while the tutorial is showing
    pub paused: bool,
}

impl BonusMarble {
    /// Enter from the right edge at a random height
    pub fn spawn<R: Rng>(&mut self, board: &Board, rng: &mut R, paused: bool) {
        let y = BONUS_SPAWN_Y_MIN + rng.random::<f32>() * BONUS_SPAWN_Y_RANGE;
        *self = Self {
            active: true,
            pos: Vec2::new(board.width + BONUS_OFFSCREEN_MARGIN, y),
            base_y: y,
            t: 0.0,
            paused,
        };
    }

    /// Drift left along a sine wave; deactivate once off the left edge
    pub fn update(&mut self, dt: f32) {
        if !self.active || self.paused {
            return;
        }
        self.t += dt;
        self.pos.x -= BONUS_DRIFT_SPEED * dt;
        self.pos.y = self.base_y + (self.t * BONUS_WAVE_FREQUENCY).sin() * BONUS_WAVE_AMPLITUDE;
        if self.pos.x < -BONUS_OFFSCREEN_MARGIN {
            self.active = false;
        }
    }

    /// Whether a pointer at `point` catches the marble
    pub fn hit_test(&self, point: Vec2) -> bool {
        self.active && self.pos.distance(point) < BONUS_HIT_RADIUS
    }
}

/// Everything the physics tick owns
#[derive(Debug, Clone)]
pub struct World {
    pub board: Board,
    /// Active balls (sorted by id)
    pub balls: Vec<Ball>,
    pub pegs: Vec<Peg>,
    pub grid: SpatialGrid,
    pub bonus: BonusMarble,
    next_id: u32,
}

impl World {
    pub fn new(board: Board) -> Self {
        let pegs = layout_pegs(&board);
        let grid = SpatialGrid::build(&board, &pegs, GRID_CELL_SIZE);
        Self {
            board,
            balls: Vec::new(),
            pegs,
            grid,
            bonus: BonusMarble::default(),
            next_id: 1,
        }
    }

    /// Re-layout pegs and rebuild the grid for a new board size
    pub fn resize(&mut self, board: Board) {
        self.board = board;
        self.pegs = layout_pegs(&self.board);
        self.grid = SpatialGrid::build(&self.board, &self.pegs, GRID_CELL_SIZE);
        log::debug!(
            "Board resized to {}x{} ({} pegs)",
            board.width,
            board.height,
            self.pegs.len()
        );
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Random x near the board centre
    fn centred_x<R: Rng>(&self, rng: &mut R) -> f32 {
        self.board.width / 2.0 + (rng.random::<f32>() - 0.5) * SPAWN_SCATTER
    }

    fn spawn_velocity<R: Rng>(rng: &mut R) -> Vec2 {
        Vec2::new((rng.random::<f32>() - 0.5) * SPAWN_VX_SPREAD, 0.0)
    }

    /// Spawn a regular ball with the given rarity near the centre
    pub fn spawn_ball<R: Rng>(&mut self, rarity: Rarity, rng: &mut R) -> u32 {
        let id = self.next_entity_id();
        let pos = Vec2::new(self.centred_x(rng), SPAWN_Y);
        self.balls.push(Ball::new(id, pos, Self::spawn_velocity(rng), rarity));
        id
    }

    /// Spawn the master ball near the centre
    pub fn spawn_master<R: Rng>(&mut self, rng: &mut R) -> u32 {
        let id = self.spawn_ball(Rarity::Normal, rng);
        if let Some(ball) = self.balls.last_mut() {
            ball.is_master = true;
        }
        id
    }

    /// Spawn a micro ball on the spawn line at `x` (clamped inside the walls)
    pub fn spawn_micro<R: Rng>(&mut self, x: f32, rng: &mut R) -> u32 {
        let id = self.next_entity_id();
        let x = if x.is_finite() { x } else { self.board.width / 2.0 };
        let x = x.clamp(MICRO_BALL_RADIUS, (self.board.width - MICRO_BALL_RADIUS).max(MICRO_BALL_RADIUS));
        let mut ball = Ball::new(id, Vec2::new(x, SPAWN_Y), Self::spawn_velocity(rng), Rarity::Normal);
        ball.radius = MICRO_BALL_RADIUS;
        ball.is_micro = true;
        self.balls.push(ball);
        id
    }

    pub fn normal_ball_count(&self) -> usize {
        self.balls.iter().filter(|b| !b.is_micro).count()
    }

    pub fn has_master(&self) -> bool {
        self.balls.iter().any(|b| b.is_master)
    }

    pub fn clear_balls(&mut self) {
        self.balls.clear();
    }
}
