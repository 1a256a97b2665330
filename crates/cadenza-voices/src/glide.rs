//! Portamento: curved interpolation of a voice's frequency target.

use libm::expf;

/// Curvature of the glide segment. Negative values move quickly at first and
/// settle slowly.
const CURVATURE: f32 = -3.0;

/// Glides from the current value to a target over a fixed period.
///
/// Setting a new target restarts the segment from wherever the glide
/// currently is, so retargeting mid-glide never jumps. With a zero period
/// the target is reached immediately.
///
/// ```rust
/// use cadenza_voices::Glide;
///
/// let mut glide = Glide::new(48000.0, 220.0);
/// glide.set_period(0.1);
/// glide.set_target(440.0);
///
/// let first = glide.advance();
/// assert!(first > 220.0 && first < 440.0);
///
/// glide.finish();
/// assert_eq!(glide.advance(), 440.0);
/// ```
#[derive(Debug, Clone)]
pub struct Glide {
    start: f32,
    end: f32,
    /// Remaining distance factor, `exp(CURVATURE * t)` for segment time `t`.
    decay: f32,
    /// Per-sample multiplier applied to `decay`.
    step: f32,
    samples_remaining: u32,
    period_samples: u32,
    sample_rate: f32,
    period_secs: f32,
}

impl Glide {
    /// Creates a settled glide at `initial`.
    pub fn new(sample_rate: f32, initial: f32) -> Self {
        Self {
            start: initial,
            end: initial,
            decay: 1.0,
            step: 1.0,
            samples_remaining: 0,
            period_samples: 0,
            sample_rate,
            period_secs: 0.0,
        }
    }

    /// Sets the glide period in seconds. Takes effect on the next target.
    pub fn set_period(&mut self, secs: f32) {
        self.period_secs = secs.max(0.0);
        self.period_samples = (self.period_secs * self.sample_rate) as u32;
        self.step = if self.period_samples == 0 {
            1.0
        } else {
            expf(CURVATURE / self.period_samples as f32)
        };
    }

    /// Glide period in seconds.
    pub fn period(&self) -> f32 {
        self.period_secs
    }

    /// Updates the sample rate, keeping the period in seconds.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.set_period(self.period_secs);
    }

    /// Starts a new segment from the current value toward `target`.
    pub fn set_target(&mut self, target: f32) {
        self.start = self.current();
        self.end = target;
        self.decay = 1.0;
        self.samples_remaining = self.period_samples;
    }

    /// Jumps to the end of the current segment.
    pub fn finish(&mut self) {
        self.start = self.end;
        self.samples_remaining = 0;
    }

    /// Target of the current segment.
    pub fn target(&self) -> f32 {
        self.end
    }

    /// True once the target has been reached.
    pub fn is_done(&self) -> bool {
        self.samples_remaining == 0
    }

    /// Current value without advancing.
    pub fn current(&self) -> f32 {
        if self.is_done() {
            return self.end;
        }
        let shape = (1.0 - self.decay) / (1.0 - expf(CURVATURE));
        self.start + (self.end - self.start) * shape
    }

    /// Advances one sample and returns the new value.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        if self.samples_remaining > 0 {
            self.decay *= self.step;
            self.samples_remaining -= 1;
        }
        self.current()
    }
}
