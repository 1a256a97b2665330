//! WAV rendering output.

use crate::Result;
use cadenza_core::iter::deinterleave;
use hound::{SampleFormat, WavReader, WavWriter};
use std::path::Path;

/// WAV file specification.
///
/// 32-bit files are written as IEEE float, other depths as integer PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    /// Number of interleaved channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bit depth per sample (16, 24 or 32).
    pub bits_per_sample: u16,
}

impl Default for WavSpec {
    fn default() -> Self {
        Self {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 32,
        }
    }
}

impl From<hound::WavSpec> for WavSpec {
    fn from(spec: hound::WavSpec) -> Self {
        Self {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
        }
    }
}

impl From<WavSpec> for hound::WavSpec {
    fn from(spec: WavSpec) -> Self {
        hound::WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            sample_format: if spec.bits_per_sample == 32 {
                SampleFormat::Float
            } else {
                SampleFormat::Int
            },
        }
    }
}

/// Writes interleaved samples laid out as `spec.channels` channels.
///
/// ```ignore
/// let rendered = OfflineBackend::new(256, 2).render(&mut engine, 48000);
/// write_wav("phrase.wav", &rendered, WavSpec::default())?;
/// ```
pub fn write_wav<P: AsRef<Path>>(path: P, samples: &[f32], spec: WavSpec) -> Result<()> {
    let mut writer = WavWriter::create(path, hound::WavSpec::from(spec))?;

    if spec.bits_per_sample == 32 {
        for &sample in samples {
            writer.write_sample(sample)?;
        }
    } else {
        let max_val = (1i32 << (spec.bits_per_sample - 1)) as f32;
        for &sample in samples {
            let int_sample = (sample * max_val).clamp(-max_val, max_val - 1.0) as i32;
            writer.write_sample(int_sample)?;
        }
    }

    writer.finalize()?;
    Ok(())
}

/// Writes separate left and right channels as a stereo file.
///
/// Frames beyond the shorter channel are dropped.
pub fn write_wav_stereo<P: AsRef<Path>>(
    path: P,
    left: &[f32],
    right: &[f32],
    spec: WavSpec,
) -> Result<()> {
    let interleaved: Vec<f32> = left.iter().zip(right).flat_map(|(&l, &r)| [l, r]).collect();
    write_wav(
        path,
        &interleaved,
        WavSpec {
            channels: 2,
            ..spec
        },
    )
}

/// Reads a WAV file as interleaved `f32` samples.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, WavSpec)> {
    let reader = WavReader::open(path)?;
    let spec = WavSpec::from(reader.spec());

    let samples = match reader.spec().sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let max_val = (1i32 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };
    Ok((samples, spec))
}

/// Reads a WAV file as separate left and right channels.
///
/// Mono files are duplicated to both channels; channels beyond the second
/// are ignored.
pub fn read_wav_stereo<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, Vec<f32>, WavSpec)> {
    let (samples, spec) = read_wav(path)?;
    let channels = usize::from(spec.channels.max(1));
    let frames = samples.len() / channels;

    let mut left = vec![0.0; frames];
    let mut right = vec![0.0; frames];
    if channels == 1 {
        left.copy_from_slice(&samples[..frames]);
        right.copy_from_slice(&samples[..frames]);
    } else {
        deinterleave(
            &samples,
            channels,
            &mut [left.as_mut_slice(), right.as_mut_slice()],
        );
    }
    Ok((left, right, spec))
}
