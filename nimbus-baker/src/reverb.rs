//! Parametric reverb, estimated from energy fields.

use crate::NUM_BANDS;
use crate::energy_field::{BIN_DURATION, EnergyField};
use crate::model::AirAbsorptionModel;

/// Speed of sound in air (in meters per second), used to turn arrival times into travelled distances.
pub const SPEED_OF_SOUND: f32 = 343.0;

/// Shortest reverb time (in seconds) an estimate can produce.
pub const MIN_REVERB_TIME: f32 = 0.1;

/// Longest reverb time (in seconds) an estimate can produce.
pub const MAX_REVERB_TIME: f32 = 10.0;

// Decay range of the energy decay curve used for the line fit (T30).
const FIT_START_DB: f64 = -5.0;
const FIT_END_DB: f64 = -35.0;

/// A compact parametric description of a reverb.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Reverb {
    /// Time (in seconds) for the energy in each band (low, mid, high) to decay by 60 dB.
    pub reverb_times: [f32; NUM_BANDS],

    /// Relative level of each band, between 0.0 and 1.0. The loudest band is 1.0.
    pub eq: [f32; NUM_BANDS],
}

impl Default for Reverb {
    fn default() -> Self {
        Self {
            reverb_times: [MIN_REVERB_TIME; NUM_BANDS],
            eq: [0.0; NUM_BANDS],
        }
    }
}

/// Derives [`Reverb`] parameters from energy fields.
#[derive(Debug, Copy, Clone, Default)]
pub struct ReverbEstimator;

impl ReverbEstimator {
    /// Estimates the reverb described by the omnidirectional channel of `energy_field`.
    ///
    /// For each band, air absorption over the distance sound travels by each bin's arrival time is applied,
    /// the histogram is backward-integrated (Schroeder integration), and a line is fitted to the resulting
    /// decay curve between -5 dB and -35 dB. Bands whose curve does not reach -35 dB are fitted over
    /// every bin that still holds energy.
    ///
    /// The result only depends on the arguments.
    pub fn estimate(energy_field: &EnergyField, air_absorption: &AirAbsorptionModel) -> Reverb {
        let num_bins = energy_field.num_bins();
        let mut reverb = Reverb::default();
        let mut band_energies = [0.0f32; NUM_BANDS];

        for band in 0..NUM_BANDS {
            // The omnidirectional channel comes first.
            let histogram = &energy_field.data()[band * num_bins..(band + 1) * num_bins];

            let absorbed = histogram
                .iter()
                .enumerate()
                .map(|(bin, &energy)| {
                    let arrival_time = (bin as f32 + 0.5) * BIN_DURATION;
                    energy.max(0.0) * air_absorption.evaluate(arrival_time * SPEED_OF_SOUND, band)
                })
                .collect::<Vec<_>>();

            band_energies[band] = absorbed.iter().sum();
            reverb.reverb_times[band] = reverb_time(&absorbed);
        }

        let loudest = band_energies.iter().copied().fold(0.0f32, f32::max);
        if loudest > 0.0 {
            reverb.eq = band_energies.map(|energy| energy / loudest);
        }

        reverb
    }
}

fn reverb_time(histogram: &[f32]) -> f32 {
    let mut decay_curve = vec![0.0f64; histogram.len()];
    let mut remaining = 0.0f64;
    for (bin, &energy) in histogram.iter().enumerate().rev() {
        remaining += f64::from(energy);
        decay_curve[bin] = remaining;
    }

    let total = decay_curve.first().copied().unwrap_or(0.0);
    if total <= 0.0 {
        return MIN_REVERB_TIME;
    }

    let decay_db = decay_curve
        .iter()
        .enumerate()
        .filter(|&(_, &energy)| energy > 0.0)
        .map(|(bin, &energy)| {
            (
                bin as f64 * f64::from(BIN_DURATION),
                10.0 * (energy / total).log10(),
            )
        })
        .collect::<Vec<_>>();

    let fit_range = decay_db
        .iter()
        .copied()
        .filter(|&(_, level)| (FIT_END_DB..=FIT_START_DB).contains(&level))
        .collect::<Vec<_>>();

    let points = if fit_range.len() >= 2 {
        &fit_range
    } else {
        &decay_db
    };

    match slope(points) {
        Some(slope) if slope < 0.0 => {
            let seconds = (-60.0 / slope) as f32;
            seconds.clamp(MIN_REVERB_TIME, MAX_REVERB_TIME)
        }
        _ => MIN_REVERB_TIME,
    }
}

/// Least-squares slope of `points`, or `None` if it is undefined.
fn slope(points: &[(f64, f64)]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|&(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|&(_, y)| y).sum::<f64>() / n;

    let (covariance, variance) = points.iter().fold((0.0, 0.0), |(cov, var), &(x, y)| {
        let dx = x - mean_x;
        (cov + dx * (y - mean_y), var + dx * dx)
    });

    (variance > 0.0).then(|| covariance / variance)
}
