//! Aiming and distance math

use crate::comms::protocol::Point;

/// Stateless geometry helpers used by the turn controller
pub struct AimSystem;

impl AimSystem {
    /// Euclidean distance between two points
    pub fn distance(a: Point, b: Point) -> f64 {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Firing direction from `own` to `enemy`, in degrees, in the server's convention.
    ///
    /// Targets to the left are mirrored as `180 - atan(dy/dx)`. A target straight
    /// above or below fires at 90 or 270 degrees instead of dividing by zero.
    pub fn shoot_angle(own: Point, enemy: Point) -> f64 {
        let dx = enemy.x - own.x;
        let dy = enemy.y - own.y;

        if dx == 0.0 {
            return if dy > 0.0 {
                90.0
            } else if dy < 0.0 {
                270.0
            } else {
                0.0
            };
        }

        let slope_deg = (dy / dx).atan().to_degrees();
        if dx < 0.0 {
            180.0 - slope_deg
        } else {
            slope_deg
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn shoots_right_and_left() {
        let origin = Point::new(0.0, 0.0);
        assert!(close(AimSystem::shoot_angle(origin, Point::new(10.0, 0.0)), 0.0));
        assert!(close(AimSystem::shoot_angle(origin, Point::new(-10.0, 0.0)), 180.0));
    }

    #[test]
    fn vertical_targets_do_not_divide_by_zero() {
        let origin = Point::new(0.0, 0.0);
        assert!(close(AimSystem::shoot_angle(origin, Point::new(0.0, 10.0)), 90.0));
        assert!(close(AimSystem::shoot_angle(origin, Point::new(0.0, -10.0)), 270.0));
        assert!(close(AimSystem::shoot_angle(origin, origin), 0.0));
    }

    #[test]
    fn diagonal_targets_follow_atan_convention() {
        let own = Point::new(100.0, 100.0);
        assert!(close(AimSystem::shoot_angle(own, Point::new(110.0, 110.0)), 45.0));
        assert!(close(AimSystem::shoot_angle(own, Point::new(110.0, 90.0)), -45.0));
        assert!(close(AimSystem::shoot_angle(own, Point::new(90.0, 110.0)), 225.0));
    }

    #[test]
    fn distance_is_euclidean() {
        assert!(close(
            AimSystem::distance(Point::new(0.0, 0.0), Point::new(3.0, 4.0)),
            5.0
        ));
    }
}
