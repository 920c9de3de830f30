//! Pointer tracking: turns raw per-frame pointer positions into the motion
//! data the force splat needs.

use glam::Vec2;

/// Velocity blend toward the new delta while the pointer is moving.
pub const MOVING_BLEND: f32 = 0.15;
/// Velocity blend toward zero while the pointer is still.
pub const STATIONARY_BLEND: f32 = 0.1;

/// One frame of pointer motion, in normalized device coordinates (-1..1).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerSample {
    pub current: Vec2,
    pub previous: Vec2,
    /// `current - previous`.
    pub delta: Vec2,
    /// Time-smoothed delta; keeps decaying after the pointer stops.
    pub velocity: Vec2,
    /// False when the pointer did not move, so no force is injected.
    pub moved: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PointerTracker {
    previous: Option<Vec2>,
    velocity: Vec2,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, current: Vec2) -> PointerSample {
        // First sample seeds the baseline so the jump from the origin is not
        // read as a stroke.
        let previous = self.previous.unwrap_or(current);
        let delta = current - previous;
        let moved = delta != Vec2::ZERO;

        self.velocity = if moved {
            self.velocity.lerp(delta, MOVING_BLEND)
        } else {
            self.velocity.lerp(Vec2::ZERO, STATIONARY_BLEND)
        };
        self.previous = Some(current);

        PointerSample {
            current,
            previous,
            delta,
            velocity: self.velocity,
            moved,
        }
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_reports_no_motion() {
        let mut tracker = PointerTracker::new();
        let sample = tracker.update(Vec2::new(0.5, -0.25));
        assert!(!sample.moved);
        assert_eq!(sample.delta, Vec2::ZERO);
        assert_eq!(sample.previous, sample.current);
    }

    #[test]
    fn motion_blends_velocity_toward_delta() {
        let mut tracker = PointerTracker::new();
        tracker.update(Vec2::ZERO);
        let sample = tracker.update(Vec2::new(0.2, 0.0));

        assert!(sample.moved);
        assert_eq!(sample.delta, Vec2::new(0.2, 0.0));
        assert!((sample.velocity.x - 0.2 * MOVING_BLEND).abs() < 1e-6);
        assert_eq!(sample.previous, Vec2::ZERO);
    }

    #[test]
    fn still_pointer_decays_velocity() {
        let mut tracker = PointerTracker::new();
        tracker.update(Vec2::ZERO);
        tracker.update(Vec2::new(0.4, 0.4));
        let moving = tracker.velocity();

        let still = tracker.update(Vec2::new(0.4, 0.4));
        assert!(!still.moved);
        assert!((still.velocity - moving * (1.0 - STATIONARY_BLEND)).length() < 1e-6);

        for _ in 0..200 {
            tracker.update(Vec2::new(0.4, 0.4));
        }
        assert!(tracker.velocity().length() < 1e-6);
    }
}
