//! Signed angle between two 2D vectors.
//!
//! Uses the dot product for the magnitude and the 2D cross product for the
//! sign: cos(θ) = (v1 · v2) / (|v1| × |v2|), negative when
//! v1.x·v2.y − v1.y·v2.x < 0. Image space has y pointing down.

use std::ops::Sub;

use serde::{Deserialize, Serialize};

/// Vectors shorter than this are treated as zero-length.
const MIN_LENGTH: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Vector2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn cross(self, other: Vector2) -> f32 {
        self.x * other.y - self.y * other.x
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }
}

impl Sub for Vector2 {
    type Output = Vector2;

    fn sub(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Signed angle from `v1` to `v2` in degrees, within [-180, 180].
///
/// Returns `None` when either vector has (near) zero length or a component
/// is not finite; the angle is undefined there and callers skip the sample.
pub fn angle_between(v1: Vector2, v2: Vector2) -> Option<f32> {
    let mag1 = v1.length();
    let mag2 = v2.length();

    if !mag1.is_finite() || !mag2.is_finite() || mag1 < MIN_LENGTH || mag2 < MIN_LENGTH {
        return None;
    }

    // Rounding can push the ratio a hair outside [-1, 1], where acos is NaN.
    let cos_angle = (v1.dot(v2) / (mag1 * mag2)).clamp(-1.0, 1.0);
    let unsigned = cos_angle.acos().to_degrees();

    if v1.cross(v2) < 0.0 {
        Some(-unsigned)
    } else {
        Some(unsigned)
    }
}
