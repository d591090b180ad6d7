//! Types and utilities for working with energy fields.

use crate::NUM_BANDS;
use crate::device::{ComputeDevice, DeviceBuffer, DeviceError};
use crate::ray_tracing::SceneType;
use std::sync::Arc;

/// Duration (in seconds) of one histogram bin of an [`EnergyField`].
pub const BIN_DURATION: f32 = 0.01;

/// An energy field.
///
/// Energy fields represent a histogram of sound energy arriving at a point, as a function of incident direction, frequency band, and arrival time.
///
/// Time is subdivided into “bins” of the histogram, with each bin corresponding to 10ms.
/// For each bin, incident energy is stored separately for each frequency band.
/// For a given frequency band and time bin, we store an Ambisonic representation of the variation of incident energy as a function of direction.
///
/// Energy field data is stored as a 3D array of size #channels * #bands * #bins, in row-major order.
///
/// An energy field may additionally be backed by a buffer in device memory (see [`Self::try_new_on_device`]).
/// Its host data is then only meaningful after [`Self::copy_device_to_host`].
#[derive(Debug)]
pub struct EnergyField {
    order: u32,
    num_channels: usize,
    num_bins: usize,
    data: Vec<f32>,
    device_buffer: Option<DeviceBuffer>,
}

impl EnergyField {
    /// Creates a new, zeroed energy field in host memory.
    ///
    /// # Errors
    ///
    /// Returns [`EnergyFieldError::InvalidDuration`] if the duration is not a positive, finite number.
    pub fn try_new(settings: &EnergyFieldSettings) -> Result<Self, EnergyFieldError> {
        let num_bins = settings.num_bins()?;
        let num_channels = settings.num_channels();

        Ok(Self {
            order: settings.order,
            num_channels,
            num_bins,
            data: vec![0.0; num_channels * NUM_BANDS * num_bins],
            device_buffer: None,
        })
    }

    /// Creates a new, zeroed energy field whose contents are produced in the memory of `device`.
    ///
    /// # Errors
    ///
    /// Returns [`EnergyFieldError`] if the duration is invalid or the device buffer cannot be allocated.
    pub fn try_new_on_device(
        settings: &EnergyFieldSettings,
        device: &Arc<dyn ComputeDevice>,
    ) -> Result<Self, EnergyFieldError> {
        let mut energy_field = Self::try_new(settings)?;
        energy_field.device_buffer = Some(DeviceBuffer::try_new(device, energy_field.data.len())?);
        Ok(energy_field)
    }

    /// Returns the Ambisonic order.
    pub fn order(&self) -> u32 {
        self.order
    }

    /// Returns the number of channels in the energy field.
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Returns the number of bins in the energy field.
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// Returns the duration (in seconds) covered by the bins of the energy field.
    pub fn duration(&self) -> f32 {
        self.num_bins as f32 * BIN_DURATION
    }

    /// Returns the data stored in the energy field, in row-major order.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Returns the data stored in the energy field for the given channel, in row-major order.
    ///
    /// # Errors
    ///
    /// Returns [`EnergyFieldError::ChannelIndexOutOfBounds`] if `channel_index` is out of bounds.
    pub fn channel(&self, channel_index: usize) -> Result<&[f32], EnergyFieldError> {
        let range = self.channel_range(channel_index)?;
        Ok(&self.data[range])
    }

    pub fn channel_mut(&mut self, channel_index: usize) -> Result<&mut [f32], EnergyFieldError> {
        let range = self.channel_range(channel_index)?;
        Ok(&mut self.data[range])
    }

    /// Returns the data stored in the energy field for the given channel and band.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - [`EnergyFieldError::ChannelIndexOutOfBounds`] if `channel_index` is out of bounds.
    /// - [`EnergyFieldError::BandIndexOutOfBounds`] if `band_index` is out of bounds.
    pub fn band(
        &self,
        channel_index: usize,
        band_index: usize,
    ) -> Result<&[f32], EnergyFieldError> {
        let range = self.band_range(channel_index, band_index)?;
        Ok(&self.data[range])
    }

    pub fn band_mut(
        &mut self,
        channel_index: usize,
        band_index: usize,
    ) -> Result<&mut [f32], EnergyFieldError> {
        let range = self.band_range(channel_index, band_index)?;
        Ok(&mut self.data[range])
    }

    /// Resets all values stored in host memory to zero.
    ///
    /// Device memory, if any, is left untouched.
    pub fn reset(&mut self) {
        self.data.fill(0.0);
    }

    /// Copies data from `self` into the `dst` energy field.
    ///
    /// If the source and destination energy fields have different numbers of channels, only the smaller of the two numbers of channels will be copied.
    ///
    /// If the source and destination energy fields have different numbers of bins, only the smaller of the two numbers of bins will be copied.
    /// Bins of `dst` past that point are zeroed.
    pub fn copy_into(&self, dst: &mut Self) {
        dst.reset();

        let num_channels = self.num_channels.min(dst.num_channels);
        let num_bins = self.num_bins.min(dst.num_bins);

        for channel in 0..num_channels {
            for band in 0..NUM_BANDS {
                let src_start = (channel * NUM_BANDS + band) * self.num_bins;
                let dst_start = (channel * NUM_BANDS + band) * dst.num_bins;
                dst.data[dst_start..dst_start + num_bins]
                    .copy_from_slice(&self.data[src_start..src_start + num_bins]);
            }
        }
    }

    /// Adds the values stored in the `other` energy field to those in `self`.
    ///
    /// If the energy fields have different numbers of channels or bins, only the overlapping part is added.
    pub fn add(&mut self, other: &Self) {
        let num_channels = self.num_channels.min(other.num_channels);
        let num_bins = self.num_bins.min(other.num_bins);

        for channel in 0..num_channels {
            for band in 0..NUM_BANDS {
                let start = (channel * NUM_BANDS + band) * self.num_bins;
                let other_start = (channel * NUM_BANDS + band) * other.num_bins;
                for (value, other_value) in self.data[start..start + num_bins]
                    .iter_mut()
                    .zip(&other.data[other_start..other_start + num_bins])
                {
                    *value += other_value;
                }
            }
        }
    }

    /// Scales the values stored in the energy field by a scalar.
    pub fn scale(&mut self, scalar: f32) {
        self.data.iter_mut().for_each(|value| *value *= scalar);
    }

    /// Returns `true` if the contents of the energy field are produced in device memory.
    pub fn is_device_resident(&self) -> bool {
        self.device_buffer.is_some()
    }

    /// Returns the device buffer backing the energy field, if any.
    ///
    /// Simulators running on a device write their results here.
    pub fn device_buffer(&self) -> Option<&DeviceBuffer> {
        self.device_buffer.as_ref()
    }

    /// Synchronously copies the device buffer into host memory.
    ///
    /// Does nothing for energy fields that live in host memory only.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] if the device read fails.
    pub fn copy_device_to_host(&mut self) -> Result<(), DeviceError> {
        match &self.device_buffer {
            Some(buffer) => buffer.read(&mut self.data),
            None => Ok(()),
        }
    }

    /// Detaches the energy field from device memory, keeping its host data.
    ///
    /// The device buffer, if any, is released.
    pub fn into_host(mut self) -> Self {
        self.device_buffer = None;
        self
    }

    /// Reconstructs a mono impulse response from the omnidirectional channel, at the given sampling rate.
    ///
    /// Each bin's energy (summed over bands) shapes a deterministic noise sequence, so the mean squared amplitude of a bin matches its energy per sample.
    pub fn impulse_response(&self, sampling_rate: u32) -> Vec<f32> {
        let samples_per_bin = ((sampling_rate as f32 * BIN_DURATION).round() as usize).max(1);
        let mut noise = NoiseGenerator::default();
        let mut impulse_response = Vec::with_capacity(self.num_bins * samples_per_bin);

        for bin in 0..self.num_bins {
            let energy: f32 = (0..NUM_BANDS)
                .map(|band| self.data[band * self.num_bins + bin])
                .sum();
            // Uniform noise in [-1, 1] has a mean square of 1/3.
            let amplitude = (3.0 * energy.max(0.0) / samples_per_bin as f32).sqrt();

            impulse_response.extend((0..samples_per_bin).map(|_| amplitude * noise.next_sample()));
        }

        impulse_response
    }

    fn channel_range(
        &self,
        channel_index: usize,
    ) -> Result<std::ops::Range<usize>, EnergyFieldError> {
        if channel_index >= self.num_channels {
            return Err(EnergyFieldError::ChannelIndexOutOfBounds {
                channel_index,
                num_channels: self.num_channels,
            });
        }

        let len = NUM_BANDS * self.num_bins;
        Ok(channel_index * len..(channel_index + 1) * len)
    }

    fn band_range(
        &self,
        channel_index: usize,
        band_index: usize,
    ) -> Result<std::ops::Range<usize>, EnergyFieldError> {
        let channel = self.channel_range(channel_index)?;

        if band_index >= NUM_BANDS {
            return Err(EnergyFieldError::BandIndexOutOfBounds {
                band_index,
                max_bands: NUM_BANDS,
            });
        }

        let start = channel.start + band_index * self.num_bins;
        Ok(start..start + self.num_bins)
    }
}

/// Settings used to create an [`EnergyField`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EnergyFieldSettings {
    /// Total duration (in seconds) of the energy field.
    ///
    /// This determines the number of bins in each channel and band.
    pub duration: f32,

    /// The Ambisonic order.
    ///
    /// This determines the number of channels.
    pub order: u32,
}

impl EnergyFieldSettings {
    /// Returns the number of Ambisonic channels, `(order + 1)²`.
    pub fn num_channels(&self) -> usize {
        let order = self.order as usize;
        (order + 1) * (order + 1)
    }

    /// Returns the number of bins needed to cover the duration.
    ///
    /// # Errors
    ///
    /// Returns [`EnergyFieldError::InvalidDuration`] if the duration is not a positive, finite number.
    pub fn num_bins(&self) -> Result<usize, EnergyFieldError> {
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(EnergyFieldError::InvalidDuration {
                duration: self.duration,
            });
        }

        // Tolerance keeps exact multiples of the bin duration from rounding up to an extra bin.
        Ok(((self.duration / BIN_DURATION) - 1e-3).ceil().max(1.0) as usize)
    }
}

impl Default for EnergyFieldSettings {
    fn default() -> Self {
        Self {
            duration: 1.0,
            order: 1,
        }
    }
}

/// Creates energy fields suited to a ray tracing backend.
#[derive(Debug, Copy, Clone, Default)]
pub struct EnergyFieldFactory;

impl EnergyFieldFactory {
    /// Creates an energy field of the given duration and order.
    ///
    /// GPU backends get a field backed by a buffer on `device`; other backends get a host-only field and ignore `device`.
    ///
    /// # Errors
    ///
    /// Returns [`EnergyFieldError::MissingDevice`] if `scene_type` is a GPU backend and no device was given.
    pub fn create(
        scene_type: SceneType,
        duration: f32,
        order: u32,
        device: Option<&Arc<dyn ComputeDevice>>,
    ) -> Result<EnergyField, EnergyFieldError> {
        let settings = EnergyFieldSettings { duration, order };

        if scene_type.is_gpu() {
            let device = device.ok_or(EnergyFieldError::MissingDevice { scene_type })?;
            EnergyField::try_new_on_device(&settings, device)
        } else {
            EnergyField::try_new(&settings)
        }
    }
}

/// An energy field handed over from simulation to baked storage.
///
/// When the saved duration equals the simulated duration, the simulated field itself is stored, without copying its data.
/// Otherwise a new host field of the saved duration is allocated and the simulated data is copied (and truncated or zero-extended) into it.
#[derive(Debug)]
pub enum StoredEnergyField {
    /// The energy field produced by the simulation, moved as-is.
    Moved(EnergyField),

    /// A freshly allocated energy field holding a copy of the simulated data.
    Reallocated(EnergyField),
}

impl StoredEnergyField {
    /// Transfers ownership of `simulated` into storage, resizing it to `saved_duration` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`EnergyFieldError::InvalidDuration`] if a new field must be allocated and `saved_duration` is invalid.
    pub fn transfer(
        simulated: EnergyField,
        simulated_duration: f32,
        saved_duration: f32,
    ) -> Result<Self, EnergyFieldError> {
        if simulated_duration == saved_duration {
            return Ok(Self::Moved(simulated));
        }

        let mut saved = EnergyField::try_new(&EnergyFieldSettings {
            duration: saved_duration,
            order: simulated.order(),
        })?;
        simulated.copy_into(&mut saved);

        Ok(Self::Reallocated(saved))
    }

    /// Returns `true` if the simulated field was stored without copying.
    pub fn is_zero_copy(&self) -> bool {
        matches!(self, Self::Moved(_))
    }

    pub fn energy_field(&self) -> &EnergyField {
        match self {
            Self::Moved(energy_field) | Self::Reallocated(energy_field) => energy_field,
        }
    }

    pub fn into_inner(self) -> EnergyField {
        match self {
            Self::Moved(energy_field) | Self::Reallocated(energy_field) => energy_field,
        }
    }
}

/// [`EnergyField`] errors.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EnergyFieldError {
    /// Channel index is out of bounds.
    #[error("channel index {channel_index} out of bounds (num_channels: {num_channels})")]
    ChannelIndexOutOfBounds {
        channel_index: usize,
        num_channels: usize,
    },

    /// Band index is out of bounds.
    #[error("band index {band_index} out of bounds (max_bands: {max_bands})")]
    BandIndexOutOfBounds { band_index: usize, max_bands: usize },

    /// Duration is not a positive, finite number of seconds.
    #[error("invalid energy field duration: {duration}")]
    InvalidDuration { duration: f32 },

    /// A GPU backend was asked for an energy field without a compute device.
    #[error("{scene_type:?} energy fields require a compute device")]
    MissingDevice { scene_type: SceneType },

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Xorshift noise, reseeded for every impulse response so reconstruction is reproducible.
struct NoiseGenerator(u32);

impl Default for NoiseGenerator {
    fn default() -> Self {
        Self(0x9E37_79B9)
    }
}

impl NoiseGenerator {
    /// Returns a sample uniformly distributed in [-1, 1].
    fn next_sample(&mut self) -> f32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        (self.0 as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SoftwareDevice;

    fn energy_field(duration: f32, order: u32) -> EnergyField {
        EnergyField::try_new(&EnergyFieldSettings { duration, order }).unwrap()
    }

    mod energy_field {
        use super::*;

        #[test]
        fn test_dimensions() {
            let energy_field = energy_field(1.0, 1);

            assert_eq!(energy_field.num_channels(), 4);
            assert_eq!(energy_field.num_bins(), 100);
            assert_eq!(energy_field.data().len(), 4 * NUM_BANDS * 100);
        }

        #[test]
        fn test_invalid_duration() {
            let result = EnergyField::try_new(&EnergyFieldSettings {
                duration: 0.0,
                order: 1,
            });

            assert!(matches!(
                result,
                Err(EnergyFieldError::InvalidDuration { .. })
            ));
        }

        mod channel {
            use super::*;

            #[test]
            fn test_valid() {
                let energy_field = energy_field(1.0, 1);

                assert!(energy_field.channel(2).is_ok());
                assert!(energy_field.channel(3).is_ok());
            }

            #[test]
            fn test_index_out_of_bounds() {
                let energy_field = energy_field(1.0, 1);

                assert_eq!(
                    energy_field.channel(5),
                    Err(EnergyFieldError::ChannelIndexOutOfBounds {
                        channel_index: 5,
                        num_channels: 4,
                    }),
                );
            }
        }

        mod band {
            use super::*;

            #[test]
            fn test_valid() {
                let energy_field = energy_field(1.0, 1);

                assert!(energy_field.band(0, 0).is_ok());
                assert!(energy_field.band(3, NUM_BANDS - 1).is_ok());
            }

            #[test]
            fn test_band_index_out_of_bounds() {
                let energy_field = energy_field(1.0, 1);

                assert_eq!(
                    energy_field.band(0, 5),
                    Err(EnergyFieldError::BandIndexOutOfBounds {
                        band_index: 5,
                        max_bands: 3,
                    }),
                );
            }

            #[test]
            fn test_band_channel_index_out_of_bounds() {
                let energy_field = energy_field(1.0, 1);

                assert_eq!(
                    energy_field.band(10, 0),
                    Err(EnergyFieldError::ChannelIndexOutOfBounds {
                        channel_index: 10,
                        num_channels: 4,
                    }),
                );
            }
        }

        #[test]
        fn test_copy_into_truncates() {
            let mut long = energy_field(1.0, 1);
            long.data_mut().fill(2.0);

            let mut short = energy_field(0.5, 1);
            long.copy_into(&mut short);

            assert!(short.data().iter().all(|&value| value == 2.0));
        }

        #[test]
        fn test_copy_into_zero_extends() {
            let mut short = energy_field(0.5, 0);
            short.data_mut().fill(1.0);

            let mut long = energy_field(1.0, 0);
            long.data_mut().fill(7.0);
            short.copy_into(&mut long);

            let band = long.band(0, 1).unwrap();
            assert!(band[..50].iter().all(|&value| value == 1.0));
            assert!(band[50..].iter().all(|&value| value == 0.0));
        }

        #[test]
        fn test_add_and_scale() {
            let mut a = energy_field(0.1, 0);
            let mut b = energy_field(0.1, 0);
            a.data_mut().fill(1.0);
            b.data_mut().fill(2.0);

            a.add(&b);
            a.scale(0.5);

            assert!(a.data().iter().all(|&value| value == 1.5));
        }

        #[test]
        fn test_impulse_response_length() {
            let mut energy_field = energy_field(0.1, 1);
            energy_field.band_mut(0, 0).unwrap().fill(1.0);

            let impulse_response = energy_field.impulse_response(44100);

            assert_eq!(impulse_response.len(), 10 * 441);
            assert!(impulse_response.iter().any(|&sample| sample != 0.0));
            assert_eq!(impulse_response, energy_field.impulse_response(44100));
        }

        #[test]
        fn test_silent_impulse_response() {
            let energy_field = energy_field(0.1, 0);

            assert!(
                energy_field
                    .impulse_response(48000)
                    .iter()
                    .all(|&sample| sample == 0.0)
            );
        }
    }

    mod device {
        use super::*;

        #[test]
        fn test_copy_device_to_host() {
            let device: Arc<dyn ComputeDevice> = Arc::new(SoftwareDevice::new());
            let mut energy_field =
                EnergyFieldFactory::create(SceneType::RadeonRays, 0.1, 0, Some(&device)).unwrap();
            assert!(energy_field.is_device_resident());

            let len = energy_field.data().len();
            energy_field
                .device_buffer()
                .unwrap()
                .write(0, &vec![3.0; len])
                .unwrap();
            assert!(energy_field.data().iter().all(|&value| value == 0.0));

            energy_field.copy_device_to_host().unwrap();
            assert!(energy_field.data().iter().all(|&value| value == 3.0));
        }

        #[test]
        fn test_into_host_releases_buffer() {
            let software_device = Arc::new(SoftwareDevice::new());
            let device: Arc<dyn ComputeDevice> = software_device.clone();
            let mut energy_field =
                EnergyFieldFactory::create(SceneType::RadeonRays, 0.1, 0, Some(&device)).unwrap();
            energy_field.data_mut().fill(2.0);
            let data_ptr = energy_field.data().as_ptr();
            assert_eq!(software_device.num_buffers(), 1);

            let energy_field = energy_field.into_host();

            assert!(!energy_field.is_device_resident());
            assert_eq!(energy_field.data().as_ptr(), data_ptr);
            assert!(energy_field.data().iter().all(|&value| value == 2.0));
            assert_eq!(software_device.num_buffers(), 0);
        }

        #[test]
        fn test_missing_device() {
            let result = EnergyFieldFactory::create(SceneType::RadeonRays, 1.0, 1, None);

            assert!(matches!(
                result,
                Err(EnergyFieldError::MissingDevice {
                    scene_type: SceneType::RadeonRays
                })
            ));
        }

        #[test]
        fn test_cpu_backend_ignores_device() {
            let device: Arc<dyn ComputeDevice> = Arc::new(SoftwareDevice::new());
            let energy_field =
                EnergyFieldFactory::create(SceneType::Embree, 1.0, 1, Some(&device)).unwrap();

            assert!(!energy_field.is_device_resident());
        }
    }

    mod transfer {
        use super::*;

        #[test]
        fn test_equal_durations_move() {
            let simulated = energy_field(1.0, 1);
            let data_ptr = simulated.data().as_ptr();

            let stored = StoredEnergyField::transfer(simulated, 1.0, 1.0).unwrap();

            assert!(stored.is_zero_copy());
            assert_eq!(stored.energy_field().data().as_ptr(), data_ptr);
        }

        #[test]
        fn test_different_durations_reallocate() {
            let mut simulated = energy_field(2.0, 1);
            simulated.data_mut().fill(1.0);
            let data_ptr = simulated.data().as_ptr();

            let stored = StoredEnergyField::transfer(simulated, 2.0, 0.5).unwrap();

            assert!(!stored.is_zero_copy());
            let saved = stored.into_inner();
            assert_ne!(saved.data().as_ptr(), data_ptr);
            assert_eq!(saved.num_bins(), 50);
            assert_eq!(saved.num_channels(), 4);
            assert!(saved.data().iter().all(|&value| value == 1.0));
        }
    }
}
