//! Directivity patterns for modeling sound intensity as a function of the source's orientation.

use crate::geometry::{CoordinateSystem, Point};

/// A directivity pattern that can be used to model changes in sound intensity as a function of the source’s orientation.
///
/// Baked sources use the default, omnidirectional pattern.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Directivity {
    /// A linear blend between an omnidirectional source (which emits sound with equal intensity in all directions), and a dipole oriented along the ahead axis of the source’s coordinate system.
    WeightedDipole {
        /// How much of the dipole to blend into the directivity pattern.
        /// 0.0 = pure omnidirectional, 1.0 = pure dipole.
        /// 0.5 results in a cardioid directivity pattern.
        weight: f32,

        /// How “sharp” the dipole is.
        /// Higher values result in sound being focused within a narrower range of directions.
        power: f32,
    },
}

impl Directivity {
    /// An omnidirectional pattern.
    pub const OMNIDIRECTIONAL: Self = Self::WeightedDipole {
        weight: 0.0,
        power: 0.0,
    };

    /// Calculates the attenuation of a source due to its directivity pattern and orientation relative to a listener.
    ///
    /// Returns a value between 0.0 and 1.0.
    pub fn attenuation(&self, source: &CoordinateSystem, listener: Point) -> f32 {
        match *self {
            Self::WeightedDipole { weight, power } => {
                let direction = (listener - source.origin).normalized();
                let cosine = direction.dot(source.ahead);
                ((1.0 - weight) + weight * cosine).abs().powf(power)
            }
        }
    }
}

impl Default for Directivity {
    fn default() -> Self {
        Self::OMNIDIRECTIONAL
    }
}
