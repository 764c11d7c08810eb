//! 2D vector and angle math for the arena simulation

use std::f32::consts::{PI, TAU};

/// A 2D vector. Operations return new values; entity records store plain
/// `x`/`y` scalars and convert at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing at `radians`.
    pub fn from_angle(radians: f32) -> Self {
        Self {
            x: radians.cos(),
            y: radians.sin(),
        }
    }

    /// Vector from `from` towards `to` (not normalized).
    pub fn direction(from: Vec2, to: Vec2) -> Self {
        Self {
            x: to.x - from.x,
            y: to.y - from.y,
        }
    }

    pub fn add(self, other: Vec2) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    pub fn scale(self, factor: f32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    pub fn invert(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Normalize to unit length. The zero vector stays zero.
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == 0.0 {
            return Self::ZERO;
        }
        Self {
            x: self.x / len,
            y: self.y / len,
        }
    }

    /// Heading angle in radians.
    pub fn angle(self) -> f32 {
        self.y.atan2(self.x)
    }

    pub fn distance(self, other: Vec2) -> f32 {
        Self::direction(self, other).length()
    }

    /// Clamp both components into `[min, max]`.
    pub fn clamp_axes(self, min: f32, max: f32) -> Self {
        Self {
            x: self.x.clamp(min, max),
            y: self.y.clamp(min, max),
        }
    }
}

/// Linear interpolation between two scalars.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Interpolate between two angles (radians) along the shortest arc.
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    let diff = (to - from).rem_euclid(TAU);
    let delta = if diff > PI { diff - TAU } else { diff };
    from + delta * t
}

/// Circle overlap test used for both hits and deflection proximity.
pub fn circles_overlap(a: Vec2, a_radius: f32, b: Vec2, b_radius: f32) -> bool {
    a.distance(b) < a_radius + b_radius
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_zero_stays_zero() {
        assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);
    }

    #[test]
    fn normalize_diagonal_is_unit_length() {
        let v = Vec2::new(3.0, 4.0).normalize();
        assert!((v.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn clamp_axes_bounds_both_components() {
        let v = Vec2::new(-5.0, 900.0).clamp_axes(10.0, 790.0);
        assert_eq!(v, Vec2::new(10.0, 790.0));
    }

    #[test]
    fn lerp_angle_takes_shortest_path() {
        // 350deg -> 10deg should pass through 0, not wind backwards.
        let from = 350.0_f32.to_radians();
        let to = 10.0_f32.to_radians();
        let mid = lerp_angle(from, to, 0.5);
        let expected = 360.0_f32.to_radians();
        assert!((mid - expected).abs() < 1e-4);
    }

    #[test]
    fn lerp_angle_full_fraction_reaches_target() {
        let out = lerp_angle(0.0, PI / 2.0, 1.0);
        assert!((out - PI / 2.0).abs() < 1e-6);
    }

    #[test]
    fn circle_overlap_is_exclusive_at_exact_touch() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, 0.0);
        assert!(!circles_overlap(a, 5.0, b, 5.0));
        assert!(circles_overlap(a, 5.1, b, 5.0));
    }
}
