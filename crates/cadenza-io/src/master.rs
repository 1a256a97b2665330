//! Master output stage.

use core::f32::consts::FRAC_PI_2;

use cadenza_core::ProcessData;

/// Rational arctangent approximation, max error about 0.005 rad.
///
/// Used as a soft saturator: bounded to ±π/2 and linear near zero.
#[inline]
pub fn fast_atan(x: f32) -> f32 {
    if x.abs() <= 1.0 {
        x / (1.0 + 0.28 * x * x)
    } else {
        FRAC_PI_2.copysign(x) - x / (x * x + 0.28)
    }
}

/// Final gain and saturation before the driver.
///
/// The volume control is perceptual: gain is `volume²`, applied before a
/// [`fast_atan`] saturator. Non-finite samples are replaced with silence
/// and counted; [`Master::process`] logs once when a run of corrupt blocks
/// starts, not per sample.
#[derive(Debug, Clone)]
pub struct Master {
    volume: f32,
    gain: f32,
    scrubbed: u64,
    scrubbing: bool,
}

impl Master {
    /// Creates a master stage at `volume` (0..1).
    pub fn new(volume: f32) -> Self {
        let mut master = Self {
            volume: 0.0,
            gain: 0.0,
            scrubbed: 0,
            scrubbing: false,
        };
        master.set_volume(volume);
        master
    }

    /// Sets the volume, clamped to 0..1.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.gain = self.volume * self.volume;
    }

    /// Current volume.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Total non-finite samples replaced by [`Master::process`].
    pub fn scrubbed_samples(&self) -> u64 {
        self.scrubbed
    }

    #[inline]
    fn shape(&self, x: f32) -> Option<f32> {
        Some(fast_atan(x * self.gain)).filter(|y| y.is_finite())
    }

    /// Processes one sample.
    #[inline]
    pub fn tick(&self, x: f32) -> f32 {
        self.shape(x).unwrap_or(0.0)
    }

    /// Processes both channels in place.
    pub fn process(&mut self, mut data: ProcessData<2>) -> ProcessData<2> {
        let mut scrubbed = 0u64;
        for channel in data.audio_mut() {
            for sample in channel.make_mut() {
                *sample = match self.shape(*sample) {
                    Some(y) => y,
                    None => {
                        scrubbed += 1;
                        0.0
                    }
                };
            }
        }

        self.scrubbed += scrubbed;
        match (scrubbed > 0, self.scrubbing) {
            (true, false) => {
                tracing::error!(samples = scrubbed, "non-finite samples at master output");
            }
            (false, true) => {
                tracing::warn!(total = self.scrubbed, "master output finite again");
            }
            _ => {}
        }
        self.scrubbing = scrubbed > 0;
        data
    }
}

impl Default for Master {
    fn default() -> Self {
        Self::new(0.8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_core::{AudioBufferPool, ClockRange, SharedEvents};

    #[test]
    fn test_fast_atan_tracks_libm() {
        for i in -100..=100 {
            let x = i as f32 * 0.1;
            assert!(
                (fast_atan(x) - x.atan()).abs() < 0.01,
                "fast_atan({x}) = {}, atan = {}",
                fast_atan(x),
                x.atan()
            );
        }
    }

    #[test]
    fn test_fast_atan_bounded_and_odd() {
        for x in [0.5, 3.0, 1e3, 1e9] {
            assert!(fast_atan(x).abs() < FRAC_PI_2 + 1e-6);
            assert_eq!(fast_atan(-x), -fast_atan(x));
        }
        assert_eq!(fast_atan(0.0), 0.0);
    }

    #[test]
    fn test_volume_squared() {
        let master = Master::new(0.5);
        assert_eq!(master.volume(), 0.5);
        let y = master.tick(0.4);
        assert!((y - fast_atan(0.1)).abs() < 1e-7);
    }

    #[test]
    fn test_volume_clamped() {
        assert_eq!(Master::new(2.0).volume(), 1.0);
        assert_eq!(Master::new(-1.0).volume(), 0.0);
    }

    #[test]
    fn test_non_finite_scrubbed() {
        let master = Master::new(1.0);
        assert_eq!(master.tick(f32::NAN), 0.0);
        assert!(master.tick(f32::INFINITY).is_finite());
    }

    #[test]
    fn test_process_counts_scrubbed_samples() {
        let pool = AudioBufferPool::new(4, 8);
        let mut master = Master::new(1.0);
        for _ in 0..3 {
            let mut left = pool.allocate();
            left.make_mut().fill(f32::NAN);
            let mut right = pool.allocate();
            right.make_mut().fill(0.5);
            right.make_mut()[0] = f32::NAN;
            let data = ProcessData::new(SharedEvents::empty(), ClockRange::new(0, 8))
                .with([left, right]);

            let out = master.process(data);
            let [l, r] = out.raw_buffers();
            assert!(l.iter().all(|&s| s == 0.0));
            assert_eq!(r[0], 0.0);
            assert!((r[1] - fast_atan(0.5)).abs() < 1e-6);
        }
        assert_eq!(master.scrubbed_samples(), 27);
    }

    #[test]
    fn test_process_aliased_channels() {
        let pool = AudioBufferPool::new(4, 8);
        let mut mono = pool.allocate();
        mono.make_mut().fill(1.0);
        let data = ProcessData::new(SharedEvents::empty(), ClockRange::new(0, 8))
            .with([mono.clone(), mono]);

        let out = Master::new(1.0).process(data);
        let [l, r] = out.raw_buffers();
        let expected = fast_atan(1.0);
        assert!(l.iter().chain(r).all(|&s| (s - expected).abs() < 1e-6));
        assert!(!out.audio()[0].shares_storage_with(&out.audio()[1]));
    }
}
