use super::{Point, Vector3};

/// A 3D coordinate system, expressed relative to a canonical coordinate system.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CoordinateSystem {
    /// Unit vector pointing to the right (local +x axis).
    pub right: Vector3,

    /// Unit vector pointing upwards (local +y axis).
    pub up: Vector3,

    /// Unit vector pointing forwards (local -z axis).
    pub ahead: Vector3,

    /// The origin, relative to the canonical coordinate system.
    pub origin: Point,
}

impl CoordinateSystem {
    /// Returns a coordinate system with the canonical axes, centered on `origin`.
    pub fn from_origin(origin: Point) -> Self {
        Self {
            origin,
            ..Self::default()
        }
    }
}

impl Default for CoordinateSystem {
    fn default() -> Self {
        Self {
            right: Vector3::new(1.0, 0.0, 0.0),
            up: Vector3::new(0.0, 1.0, 0.0),
            ahead: Vector3::new(0.0, 0.0, -1.0),
            origin: Point::ZERO,
        }
    }
}
