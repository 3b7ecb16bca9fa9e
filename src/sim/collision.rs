//! Collision detection and response for round pegs and the side walls

use glam::Vec2;

/// Overlap between a ball and a peg
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PegContact {
    /// Unit vector from the peg centre toward the ball centre
    pub normal: Vec2,
    /// How far the ball must move along `normal` to just touch the peg
    pub penetration: f32,
}

/// Check a ball against a single peg
///
/// A ball sitting exactly on the peg centre is pushed out along +x.
pub fn ball_peg_contact(
    ball_pos: Vec2,
    ball_radius: f32,
    peg_pos: Vec2,
    peg_radius: f32,
) -> Option<PegContact> {
    let delta = ball_pos - peg_pos;
    let min_dist = ball_radius + peg_radius;
    let dist_sq = delta.length_squared();
    if dist_sq >= min_dist * min_dist {
        return None;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > 0.0 { delta / dist } else { Vec2::X };
    Some(PegContact {
        normal,
        penetration: min_dist - dist,
    })
}

/// Outgoing velocity after a peg bounce
///
/// The ball leaves along the contact normal with its speed scaled by
/// `bounce`; `jitter` is added to the horizontal component only.
pub fn peg_bounce_velocity(velocity: Vec2, normal: Vec2, bounce: f32, jitter: f32) -> Vec2 {
    let speed = velocity.length() * bounce;
    Vec2::new(normal.x * speed + jitter, normal.y * speed)
}

/// Clamp a ball inside the side walls, damping and reflecting x velocity
///
/// Returns true if a wall was touched.
pub fn resolve_side_walls(
    pos: &mut Vec2,
    vel: &mut Vec2,
    radius: f32,
    board_width: f32,
    damping: f32,
) -> bool {
    if pos.x < radius {
        pos.x = radius;
        vel.x = vel.x.abs() * damping;
        return true;
    }
    let right = board_width - radius;
    if pos.x > right {
        pos.x = right;
        vel.x = -vel.x.abs() * damping;
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_normal_and_penetration() {
        let contact = ball_peg_contact(Vec2::new(10.0, 0.0), 6.0, Vec2::ZERO, 6.0).unwrap();
        assert_eq!(contact.normal, Vec2::X);
        assert!((contact.penetration - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_no_contact_at_touching_distance() {
        assert!(ball_peg_contact(Vec2::new(0.0, 12.0), 6.0, Vec2::ZERO, 6.0).is_none());
        assert!(ball_peg_contact(Vec2::new(0.0, 11.9), 6.0, Vec2::ZERO, 6.0).is_some());
    }

    #[test]
    fn test_coincident_centres_push_along_x() {
        let contact = ball_peg_contact(Vec2::new(5.0, 5.0), 3.0, Vec2::new(5.0, 5.0), 6.0).unwrap();
        assert_eq!(contact.normal, Vec2::X);
        assert_eq!(contact.penetration, 9.0);
    }

    #[test]
    fn test_bounce_keeps_scaled_speed() {
        // Falling straight down onto the top of a peg
        let vel = Vec2::new(0.0, 100.0);
        let out = peg_bounce_velocity(vel, Vec2::new(0.0, -1.0), 0.6, 0.0);
        assert!((out.y + 60.0).abs() < 1e-4);
        assert!(out.x.abs() < 1e-4);

        let jittered = peg_bounce_velocity(vel, Vec2::new(0.0, -1.0), 0.6, 12.5);
        assert!((jittered.x - 12.5).abs() < 1e-4);
    }

    #[test]
    fn test_side_walls() {
        let mut pos = Vec2::new(2.0, 50.0);
        let mut vel = Vec2::new(-10.0, 5.0);
        assert!(resolve_side_walls(&mut pos, &mut vel, 6.0, 400.0, 0.6));
        assert_eq!(pos.x, 6.0);
        assert!((vel.x - 6.0).abs() < 1e-5);
        assert_eq!(vel.y, 5.0);

        let mut pos = Vec2::new(399.0, 50.0);
        let mut vel = Vec2::new(10.0, 0.0);
        assert!(resolve_side_walls(&mut pos, &mut vel, 6.0, 400.0, 0.6));
        assert_eq!(pos.x, 394.0);
        assert!((vel.x + 6.0).abs() < 1e-5);

        let mut pos = Vec2::new(200.0, 50.0);
        let mut vel = Vec2::new(10.0, 0.0);
        assert!(!resolve_side_walls(&mut pos, &mut vel, 6.0, 400.0, 0.6));
        assert_eq!(vel.x, 10.0);
    }
}
