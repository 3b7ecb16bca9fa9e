//! Variable timestep physics tick
//!
//! Advances every ball, resolves peg and wall contacts, detects basket
//! landings and keeps the board populated. Money is not touched here: the
//! tick reports scoring events and the engine prices them.

use glam::Vec2;
use rand::Rng;

use super::collision::{ball_peg_contact, peg_bounce_velocity, resolve_side_walls};
use super::state::World;
use crate::consts::*;
use crate::economy::{Rarity, ScoreSource};
use crate::progression::ProgressionState;

/// What a scoring event was triggered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringKind {
    /// Index into `World::pegs`
    Peg { peg: usize },
    /// Basket lane under the ball (0 = leftmost, may exceed the lane table)
    Basket { lane: usize },
}

/// A contact that earns money
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringEvent {
    pub kind: ScoringKind,
    /// Where to show the popup
    pub pos: Vec2,
    pub ball_id: u32,
    pub source: ScoreSource,
}

/// Advance the board by `dt` seconds
pub fn tick<R: Rng>(
    world: &mut World,
    progression: &ProgressionState,
    dt: f32,
    rng: &mut R,
) -> Vec<ScoringEvent> {
    let mut events = Vec::new();
    let time_scale = progression.derived.ball_speed as f32;
    let gravity = GRAVITY * time_scale;

    world.bonus.update(dt);

    let board = world.board;

    for ball in world.balls.iter_mut() {
        if ball.remove {
            continue;
        }

        // Integrate
        ball.vel.y += gravity * dt;
        ball.pos += ball.vel * dt * time_scale;
        resolve_side_walls(&mut ball.pos, &mut ball.vel, ball.radius, board.width, WALL_DAMPING);
        ball.record_trail();

        if ball.hit_cooldown > 0.0 {
            ball.hit_cooldown -= dt * COOLDOWN_FRAME_RATE;
        }

        // Pegs near the ball, resolved one after another
        let nearby: Vec<usize> = world.grid.candidates(ball.pos).collect();
        for idx in nearby {
            let Some(peg) = world.pegs.get_mut(idx) else {
                continue;
            };
            let Some(contact) = ball_peg_contact(ball.pos, ball.radius, peg.pos, PEG_RADIUS)
            else {
                continue;
            };

            let jitter = (rng.random::<f32>() - 0.5) * PEG_JITTER;
            ball.vel = peg_bounce_velocity(ball.vel, contact.normal, PEG_BOUNCE, jitter);
            ball.pos += contact.normal * contact.penetration;
            peg.hit();

            if ball.hit_cooldown <= 0.0 {
                ball.hit_cooldown = BALL_HIT_COOLDOWN;
                events.push(ScoringEvent {
                    kind: ScoringKind::Peg { peg: idx },
                    pos: peg.pos,
                    ball_id: ball.id,
                    source: ball.score_source(),
                });
            }
        }

        // Basket landing
        if board.in_basket_band(ball.pos.y) && ball.vel.y > 0.0 {
            events.push(ScoringEvent {
                kind: ScoringKind::Basket {
                    lane: board.basket_lane(ball.pos.x),
                },
                pos: ball.pos,
                ball_id: ball.id,
                source: ball.score_source(),
            });

            if ball.is_micro {
                ball.remove = true;
            } else if ball.is_master {
                let x = board.width / 2.0 + (rng.random::<f32>() - 0.5) * SPAWN_SCATTER;
                ball.reset_at(x);
            } else {
                ball.rarity = Rarity::roll(progression, rng);
                let span = (board.width - 2.0 * RESPAWN_EDGE_MARGIN).max(0.0);
                let x = RESPAWN_EDGE_MARGIN + rng.random::<f32>() * span;
                ball.reset_at(x);
            }
        }
    }

    let floor = board.height + DESPAWN_MARGIN;
    world.balls.retain(|b| !b.remove && b.pos.y <= floor);

    top_up_population(world, progression, rng);

    for peg in world.pegs.iter_mut() {
        peg.decay(dt);
    }

    events
}

/// Add one ball if the board holds fewer non-micro balls than the target
///
/// The master ball is spawned first once it is unlocked. Returns the new
/// ball's id.
pub fn top_up_population<R: Rng>(
    world: &mut World,
    progression: &ProgressionState,
    rng: &mut R,
) -> Option<u32> {
    if world.normal_ball_count() >= progression.target_ball_count() {
        return None;
    }
    if progression.master_unlocked() && !world.has_master() {
        Some(world.spawn_master(rng))
    } else {
        let rarity = Rarity::roll(progression, rng);
        Some(world.spawn_ball(rarity, rng))
    }
}
