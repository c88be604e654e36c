//! Spline control nodes.

use serde::{Deserialize, Serialize};

use super::{Point3, Vec2, Vec3};

/// A user-placed control point of a [`Spline`](super::Spline).
///
/// `direction` is the absolute position of the outgoing tangent handle, not a
/// unit vector. The incoming handle is its mirror through `position`. A handle
/// equal to `position` yields a zero-length tangent at that end of the curve;
/// sampling then falls back to the chord direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplineNode {
    pub position: Point3,
    pub direction: Point3,
    pub up: Vec3,
    pub scale: Vec2,
    /// Roll in degrees.
    pub roll: f64,
}

impl SplineNode {
    /// Node with default up (`+Y`), unit scale and no roll.
    #[must_use]
    pub const fn new(position: Point3, direction: Point3) -> Self {
        Self {
            position,
            direction,
            up: Vec3::Y,
            scale: Vec2::ONE,
            roll: 0.0,
        }
    }

    #[must_use]
    pub const fn with_up(mut self, up: Vec3) -> Self {
        self.up = up;
        self
    }

    #[must_use]
    pub const fn with_scale(mut self, scale: Vec2) -> Self {
        self.scale = scale;
        self
    }

    #[must_use]
    pub const fn with_roll(mut self, roll: f64) -> Self {
        self.roll = roll;
        self
    }

    /// The incoming handle, `2 * position - direction`.
    #[must_use]
    pub const fn mirrored_direction(&self) -> Point3 {
        self.direction.reflect_through(self.position)
    }

    /// Handle offset relative to the node position.
    #[must_use]
    pub const fn handle(&self) -> Vec3 {
        self.direction.sub_point(self.position)
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.direction.is_finite()
            && self.up.is_finite()
            && self.scale.is_finite()
            && self.roll.is_finite()
    }
}

impl Default for SplineNode {
    fn default() -> Self {
        Self::new(Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0))
    }
}
