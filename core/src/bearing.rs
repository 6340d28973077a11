//! Compass bearings measured clockwise from north.

use glam::Vec2;
use serde::{Deserialize, Serialize};

const CIRCLE_DEGREES: f32 = 360.0;
const HALF_CIRCLE_DEGREES: f32 = 180.0;

/// Conventional bearing (azimuthal angle) expressed in degrees.
///
/// North is `0`, east is `90`, south is `180` and west is `270`. World space is
/// right-handed with the y-axis pointing north, so a bearing of `0` corresponds
/// to the unit vector `(0, 1)` and positive rotations turn clockwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Bearing {
    degrees: f32,
}

impl Bearing {
    /// Bearing facing due north.
    pub const NORTH: Self = Self { degrees: 0.0 };

    /// Creates a bearing from any angle in degrees, wrapping it into `[0, 360)`.
    #[must_use]
    pub fn new(degrees: f32) -> Self {
        Self {
            degrees: wrap(degrees),
        }
    }

    /// Bearing of the provided direction vector.
    ///
    /// A zero vector has no direction and maps to [`Bearing::NORTH`].
    #[must_use]
    pub fn from_vector(vector: Vec2) -> Self {
        if vector == Vec2::ZERO {
            return Self::NORTH;
        }
        Self::new(vector.x.atan2(vector.y).to_degrees())
    }

    /// Bearing in degrees within `[0, 360)`, clockwise from north.
    #[must_use]
    pub const fn degrees(self) -> f32 {
        self.degrees
    }

    /// Bearing in degrees within `[-180, 180)`.
    ///
    /// Negative values lie to port (counter-clockwise), positive values to
    /// starboard. Due south reports `-180`.
    #[must_use]
    pub fn normalised(self) -> f32 {
        if self.degrees >= HALF_CIRCLE_DEGREES {
            self.degrees - CIRCLE_DEGREES
        } else {
            self.degrees
        }
    }

    /// Unit vector pointing along the bearing.
    #[must_use]
    pub fn vector(self) -> Vec2 {
        let (sin, cos) = self.degrees.to_radians().sin_cos();
        Vec2::new(sin, cos)
    }

    /// Turn required to face along `vector` starting from this bearing.
    #[must_use]
    pub fn relative(self, vector: Vec2) -> Self {
        Self::new(Self::from_vector(vector).degrees - self.degrees)
    }

    /// Returns the bearing rotated clockwise by `delta` degrees.
    ///
    /// Negative deltas rotate counter-clockwise.
    #[must_use]
    pub fn rotated(self, delta: f32) -> Self {
        Self::new(self.degrees + delta)
    }
}

fn wrap(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(CIRCLE_DEGREES);
    // rem_euclid rounds tiny negative inputs up to exactly 360.
    if wrapped >= CIRCLE_DEGREES {
        0.0
    } else {
        wrapped
    }
}
