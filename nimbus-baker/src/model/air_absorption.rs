//! Frequency-dependent attenuation of sound over distance.

use crate::NUM_BANDS;

/// Exponential decay coefficients (per meter) of the default air absorption model, for the low, mid and high bands.
pub const DEFAULT_AIR_ABSORPTION_COEFFICIENTS: [f32; NUM_BANDS] = [0.0002, 0.0017, 0.0182];

/// An air absorption model that can be used for modeling frequency-dependent attenuation of sound over distance.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub enum AirAbsorptionModel {
    /// The default air absorption model.
    /// This is an exponential falloff, with decay rates derived from physical properties of air.
    #[default]
    Default,

    /// An exponential falloff.
    /// You can configure the decay rates for each frequency band.
    Exponential {
        /// The exponential falloff coefficients to use.
        coefficients: [f32; NUM_BANDS],
    },
}

impl AirAbsorptionModel {
    /// Returns the per-band decay coefficients of the model.
    pub fn coefficients(&self) -> [f32; NUM_BANDS] {
        match self {
            Self::Default => DEFAULT_AIR_ABSORPTION_COEFFICIENTS,
            Self::Exponential { coefficients } => *coefficients,
        }
    }

    /// Returns the fraction of energy in `band` that survives travelling `distance` meters, between 0.0 and 1.0.
    ///
    /// # Panics
    ///
    /// Panics if `band` is not less than [`NUM_BANDS`].
    pub fn evaluate(&self, distance: f32, band: usize) -> f32 {
        (-self.coefficients()[band] * distance.max(0.0)).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model() {
        let model = AirAbsorptionModel::default();

        // All bands should have some absorption (< 1.0) at 10m.
        for band in 0..NUM_BANDS {
            let absorption = model.evaluate(10.0, band);
            assert!(absorption > 0.0 && absorption < 1.0);
        }
    }

    #[test]
    fn test_exponential_model() {
        let model = AirAbsorptionModel::Exponential {
            coefficients: [0.01, 0.02, 0.03],
        };

        let absorption: [f32; NUM_BANDS] = std::array::from_fn(|band| model.evaluate(5.0, band));

        // Higher frequencies should have more absorption.
        assert!(absorption[2] <= absorption[1]);
        assert!(absorption[1] <= absorption[0]);
        assert!((absorption[0] - (-0.05f32).exp()).abs() < 1e-6);
    }

    #[test]
    fn test_zero_and_negative_distance() {
        let model = AirAbsorptionModel::default();

        for band in 0..NUM_BANDS {
            assert_eq!(model.evaluate(0.0, band), 1.0);
            assert_eq!(model.evaluate(-3.0, band), 1.0);
        }
    }
}
