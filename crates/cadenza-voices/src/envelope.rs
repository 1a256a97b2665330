//! Per-voice ADSR amplitude envelope.
//!
//! Exponential segments, a soft reset that restarts the attack from the
//! current level (no click on retrigger), and an output amplitude used by
//! the allocation strategies to scale pinned voices.

use libm::expf;

/// Envelope stages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopeStage {
    /// Inactive, output is zero.
    #[default]
    Idle,
    /// Rising toward peak level.
    Attack,
    /// Falling from peak toward the sustain level.
    Decay,
    /// Holding the sustain level while the note is held.
    Sustain,
    /// Falling to zero after the note was released.
    Release,
}

/// ADSR envelope with exponential segments.
///
/// Times are in seconds. The value returned by [`advance`](Self::advance)
/// is the envelope level multiplied by the output amplitude
/// ([`set_amp`](Self::set_amp)).
///
/// # Example
///
/// ```rust
/// use cadenza_voices::{Envelope, EnvelopeStage};
///
/// let mut env = Envelope::new(48000.0);
/// env.set_attack(0.01);
/// env.set_release(0.05);
///
/// env.reset_soft();
/// for _ in 0..480 {
///     env.advance();
/// }
/// env.release();
/// assert_eq!(env.stage(), EnvelopeStage::Release);
/// assert!(env.is_released());
/// ```
#[derive(Debug, Clone)]
pub struct Envelope {
    stage: EnvelopeStage,
    level: f32,
    amp: f32,
    sample_rate: f32,

    attack_secs: f32,
    decay_secs: f32,
    release_secs: f32,
    sustain: f32,

    attack_coeff: f32,
    decay_coeff: f32,
    release_coeff: f32,
}

/// Overshoot target for the attack curve; the stage ends at 1.0.
const ATTACK_TARGET: f32 = 1.2;

/// Level below which decay and release are considered finished.
const SILENCE: f32 = 0.0001;

impl Default for Envelope {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

impl Envelope {
    /// Creates an idle envelope.
    ///
    /// Defaults: attack 20 ms, decay 520 ms, sustain 1.0, release 180 ms,
    /// amplitude 1.0.
    pub fn new(sample_rate: f32) -> Self {
        let mut env = Self {
            stage: EnvelopeStage::Idle,
            level: 0.0,
            amp: 1.0,
            sample_rate,
            attack_secs: 0.02,
            decay_secs: 0.52,
            release_secs: 0.18,
            sustain: 1.0,
            attack_coeff: 0.0,
            decay_coeff: 0.0,
            release_coeff: 0.0,
        };
        env.recalculate();
        env
    }

    /// Sets the attack time in seconds.
    pub fn set_attack(&mut self, secs: f32) {
        self.attack_secs = secs.max(0.0);
        self.attack_coeff = self.coeff(self.attack_secs);
    }

    /// Sets the decay time in seconds.
    pub fn set_decay(&mut self, secs: f32) {
        self.decay_secs = secs.max(0.0);
        self.decay_coeff = self.coeff(self.decay_secs);
    }

    /// Sets the sustain level (0.0 to 1.0).
    pub fn set_sustain(&mut self, level: f32) {
        self.sustain = level.clamp(0.0, 1.0);
    }

    /// Sets the release time in seconds.
    pub fn set_release(&mut self, secs: f32) {
        self.release_secs = secs.max(0.0);
        self.release_coeff = self.coeff(self.release_secs);
    }

    /// Sets the output amplitude multiplier.
    pub fn set_amp(&mut self, amp: f32) {
        self.amp = amp;
    }

    /// Updates the sample rate, keeping the configured times.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.recalculate();
    }

    /// Attack time in seconds.
    pub fn attack(&self) -> f32 {
        self.attack_secs
    }

    /// Decay time in seconds.
    pub fn decay(&self) -> f32 {
        self.decay_secs
    }

    /// Sustain level.
    pub fn sustain(&self) -> f32 {
        self.sustain
    }

    /// Release time in seconds.
    pub fn release_time(&self) -> f32 {
        self.release_secs
    }

    /// Output amplitude multiplier.
    pub fn amp(&self) -> f32 {
        self.amp
    }

    /// Current stage.
    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    /// Raw level, before the amplitude multiplier.
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Current output value without advancing.
    pub fn value(&self) -> f32 {
        self.level * self.amp
    }

    /// Restarts the attack from the current level.
    pub fn reset_soft(&mut self) {
        self.stage = EnvelopeStage::Attack;
    }

    /// Enters the release stage, unless already idle.
    pub fn release(&mut self) {
        if self.stage != EnvelopeStage::Idle {
            self.stage = EnvelopeStage::Release;
        }
    }

    /// Jumps straight to idle and silence.
    pub fn finish(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.level = 0.0;
    }

    /// True once the note has been let go: releasing or idle.
    pub fn is_released(&self) -> bool {
        matches!(self.stage, EnvelopeStage::Release | EnvelopeStage::Idle)
    }

    /// True while any sound is produced.
    pub fn is_active(&self) -> bool {
        self.stage != EnvelopeStage::Idle
    }

    /// Advances one sample and returns the output value.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => {
                self.level = 0.0;
            }
            EnvelopeStage::Attack => {
                self.level = ATTACK_TARGET + (self.level - ATTACK_TARGET) * self.attack_coeff;
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = EnvelopeStage::Decay;
                }
            }
            EnvelopeStage::Decay => {
                self.level = self.sustain + (self.level - self.sustain) * self.decay_coeff;
                if (self.level - self.sustain).abs() < SILENCE {
                    self.level = self.sustain;
                    self.stage = EnvelopeStage::Sustain;
                }
            }
            EnvelopeStage::Sustain => {
                self.level = self.sustain;
            }
            EnvelopeStage::Release => {
                self.level *= self.release_coeff;
                if self.level < SILENCE {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }
        self.level * self.amp
    }

    fn recalculate(&mut self) {
        self.attack_coeff = self.coeff(self.attack_secs);
        self.decay_coeff = self.coeff(self.decay_secs);
        self.release_coeff = self.coeff(self.release_secs);
    }

    // One time constant per segment length.
    fn coeff(&self, secs: f32) -> f32 {
        let samples = secs * self.sample_rate;
        expf(-1.0 / samples.max(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    fn run(env: &mut Envelope, samples: usize) {
        for _ in 0..samples {
            env.advance();
        }
    }

    #[test]
    fn test_idle_is_silent_and_released() {
        let mut env = Envelope::new(SR);
        assert!(env.is_released());
        assert!(!env.is_active());
        assert_eq!(env.advance(), 0.0);
    }

    #[test]
    fn test_attack_reaches_decay() {
        let mut env = Envelope::new(SR);
        env.set_attack(0.005);
        env.set_sustain(0.5);
        env.reset_soft();
        assert!(!env.is_released());

        run(&mut env, 2000);
        assert!(
            matches!(env.stage(), EnvelopeStage::Decay | EnvelopeStage::Sustain),
            "Expected Decay or Sustain, got {:?}",
            env.stage()
        );
    }

    #[test]
    fn test_decay_settles_on_sustain() {
        let mut env = Envelope::new(SR);
        env.set_attack(0.001);
        env.set_decay(0.01);
        env.set_sustain(0.4);
        env.reset_soft();

        run(&mut env, 10_000);
        assert_eq!(env.stage(), EnvelopeStage::Sustain);
        assert!((env.level() - 0.4).abs() < 0.001);
    }

    #[test]
    fn test_release_goes_idle() {
        let mut env = Envelope::new(SR);
        env.set_attack(0.001);
        env.set_release(0.02);
        env.reset_soft();
        run(&mut env, 1000);

        env.release();
        assert_eq!(env.stage(), EnvelopeStage::Release);
        assert!(env.is_released());
        run(&mut env, 20_000);
        assert_eq!(env.stage(), EnvelopeStage::Idle);
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn test_release_when_idle_is_noop() {
        let mut env = Envelope::new(SR);
        env.release();
        assert_eq!(env.stage(), EnvelopeStage::Idle);
    }

    #[test]
    fn test_reset_soft_keeps_level() {
        let mut env = Envelope::new(SR);
        env.set_attack(0.01);
        env.reset_soft();
        run(&mut env, 100);
        env.release();
        run(&mut env, 10);
        let level = env.level();

        env.reset_soft();
        assert_eq!(env.stage(), EnvelopeStage::Attack);
        assert!((env.level() - level).abs() < 1e-6, "soft reset must not jump");
    }

    #[test]
    fn test_amp_scales_output() {
        let mut env = Envelope::new(SR);
        env.set_attack(0.0);
        env.set_amp(0.25);
        env.reset_soft();
        run(&mut env, 100);
        assert!((env.value() - env.level() * 0.25).abs() < 1e-6);
        assert!(env.value() <= 0.25 + 1e-6);
    }

    #[test]
    fn test_finish_silences_immediately() {
        let mut env = Envelope::new(SR);
        env.reset_soft();
        run(&mut env, 500);
        env.finish();
        assert_eq!(env.value(), 0.0);
        assert_eq!(env.stage(), EnvelopeStage::Idle);
    }
}
