//! Reference sine generator.

use core::f32::consts::PI;
use libm::{floorf, sinf};

use crate::voice::{SynthVoice, VoiceParams};

/// Phase-accumulating sine generator.
///
/// Output is scaled by the note velocity. The phase restarts on note-on so
/// every note begins at a zero crossing.
#[derive(Debug, Clone)]
pub struct SineVoice {
    /// Current phase position [0.0, 1.0)
    phase: f32,
    sample_rate: f32,
}

impl SineVoice {
    /// Creates a generator for the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            sample_rate,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> f32 {
        self.phase
    }
}

impl SynthVoice for SineVoice {
    #[inline]
    fn generate(&mut self, params: &VoiceParams) -> f32 {
        let out = sinf(2.0 * PI * self.phase) * params.velocity;
        self.phase += params.frequency / self.sample_rate;
        self.phase -= floorf(self.phase);
        out
    }

    fn on_note_on(&mut self, _freq_target: f32) {
        self.phase = 0.0;
    }
}
