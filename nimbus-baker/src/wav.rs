//! Diagnostic export of impulse responses as WAV files.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Size (in bytes) of the header written before the samples.
pub const WAV_HEADER_LEN: usize = 44;

/// Highest sampling rate (in Hz) accepted for exported impulse responses.
pub const MAX_SAMPLING_RATE: u32 = 384_000;

/// Encoding of the samples of a WAV file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SampleFormat {
    /// 32-bit IEEE float samples.
    #[default]
    Float32,

    /// 16-bit signed integer PCM samples. Samples are clamped to [-1.0, 1.0] before conversion.
    Int16,
}

impl SampleFormat {
    /// The `AudioFormat` field of the `fmt ` chunk.
    pub const fn audio_format(self) -> u16 {
        match self {
            Self::Float32 => 3,
            Self::Int16 => 1,
        }
    }

    pub const fn bits_per_sample(self) -> u16 {
        match self {
            Self::Float32 => 32,
            Self::Int16 => 16,
        }
    }

    const fn bytes_per_sample(self) -> usize {
        self.bits_per_sample() as usize / 8
    }
}

/// Layout of a WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    /// Number of interleaved channels.
    pub num_channels: u16,

    /// Sampling rate, in Hz.
    pub sampling_rate: u32,

    /// Encoding of the samples.
    pub sample_format: SampleFormat,
}

impl Default for WavSpec {
    fn default() -> Self {
        Self {
            num_channels: 1,
            sampling_rate: 44100,
            sample_format: SampleFormat::Float32,
        }
    }
}

/// Writes `samples` (interleaved if there are several channels) as a WAV file to `writer`.
///
/// The output is a 44-byte header (`RIFF`, `WAVE`, `fmt ` and `data` chunks, little-endian fields) followed by the raw samples.
///
/// # Errors
///
/// Returns [`io::ErrorKind::InvalidInput`] if there are no channels, if the number of samples is not a multiple of the number of channels,
/// or if the data does not fit in a WAV file. Errors from `writer` are passed through.
pub fn write_wav<W: Write>(writer: &mut W, samples: &[f32], spec: &WavSpec) -> io::Result<()> {
    if spec.num_channels == 0 || samples.len() % usize::from(spec.num_channels) != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "{} samples cannot be split into {} channel(s)",
                samples.len(),
                spec.num_channels
            ),
        ));
    }

    let bytes_per_sample = spec.sample_format.bytes_per_sample();
    let data_size = samples
        .len()
        .checked_mul(bytes_per_sample)
        .and_then(|size| u32::try_from(size).ok())
        .filter(|size| size.checked_add(36).is_some())
        .ok_or_else(|| invalid_input("too many samples for a WAV file"))?;

    let block_align = spec
        .num_channels
        .checked_mul(spec.sample_format.bits_per_sample() / 8)
        .ok_or_else(|| invalid_input("too many channels for a WAV file"))?;
    let byte_rate = spec
        .sampling_rate
        .checked_mul(u32::from(block_align))
        .ok_or_else(|| invalid_input("sampling rate too high for a WAV file"))?;

    let mut header = Vec::with_capacity(WAV_HEADER_LEN);
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&(36 + data_size).to_le_bytes());
    header.extend_from_slice(b"WAVE");
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes());
    header.extend_from_slice(&spec.sample_format.audio_format().to_le_bytes());
    header.extend_from_slice(&spec.num_channels.to_le_bytes());
    header.extend_from_slice(&spec.sampling_rate.to_le_bytes());
    header.extend_from_slice(&byte_rate.to_le_bytes());
    header.extend_from_slice(&block_align.to_le_bytes());
    header.extend_from_slice(&spec.sample_format.bits_per_sample().to_le_bytes());
    header.extend_from_slice(b"data");
    header.extend_from_slice(&data_size.to_le_bytes());
    writer.write_all(&header)?;

    let mut data = Vec::with_capacity(data_size as usize);
    match spec.sample_format {
        SampleFormat::Float32 => {
            for sample in samples {
                data.extend_from_slice(&sample.to_le_bytes());
            }
        }
        SampleFormat::Int16 => {
            for sample in samples {
                let quantized = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16;
                data.extend_from_slice(&quantized.to_le_bytes());
            }
        }
    }
    writer.write_all(&data)
}

fn invalid_input(message: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message)
}

/// Writes `samples` as a WAV file at `path`, creating parent directories as needed.
///
/// # Errors
///
/// See [`write_wav`]. File system errors are passed through.
pub fn export_wav(path: impl AsRef<Path>, samples: &[f32], spec: &WavSpec) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    write_wav(&mut writer, samples, spec)?;
    writer.flush()
}
