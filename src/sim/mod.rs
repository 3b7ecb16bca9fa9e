//! Board simulation
//!
//! Physics for the pegboard. This module must stay free of money and I/O:
//! - Randomness comes from the caller's RNG only
//! - Stable iteration order (balls by id, pegs by layout index)
//! - Scoring is reported as events, never applied here

pub mod collision;
pub mod grid;
pub mod state;
pub mod tick;

pub use collision::{PegContact, ball_peg_contact, peg_bounce_velocity, resolve_side_walls};
pub use grid::{SpatialGrid, layout_pegs};
pub use state::{Ball, BonusMarble, Board, Peg, TRAIL_LENGTH, World};
pub use tick::{ScoringEvent, ScoringKind, tick, top_up_population};
