//! A single voice and the generator interface it drives.
//!
//! The voice owns pitch tracking (glide), velocity, aftertouch and the
//! amplitude envelope. The timbre comes from a [`SynthVoice`] generator
//! supplied by the instrument.

use crate::envelope::Envelope;
use crate::glide::Glide;

/// Per-sample state handed to a generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceParams {
    /// Current frequency in Hz, after glide and pitch bend.
    pub frequency: f32,
    /// Velocity of the triggering note, 0..1.
    pub velocity: f32,
    /// Channel pressure, 0..1.
    pub aftertouch: f32,
}

/// Sound generator for one voice.
///
/// `generate` is called once per sample for every voice, sounding or not;
/// the envelope decides what is heard.
pub trait SynthVoice {
    /// Produces the next sample.
    fn generate(&mut self, params: &VoiceParams) -> f32;

    /// Called when the voice is triggered (not on legato pitch changes).
    fn on_note_on(&mut self, _freq_target: f32) {}

    /// Called when the voice is released.
    fn on_note_off(&mut self) {}
}

/// Hooks run around the voice sum on every sample.
///
/// `pre` runs before the voices are summed, `post` maps the sum to the
/// output sample. The unit type is the no-op implementation.
pub trait MixHooks {
    /// Runs before the voices are summed.
    fn pre(&mut self) {}

    /// Maps the voice sum to the output sample.
    fn post(&mut self, sum: f32) -> f32 {
        sum
    }
}

impl MixHooks for () {}

/// Convert a (possibly transposed) note number to frequency in Hz.
///
/// Uses standard tuning: A4 (note 69) = 440 Hz.
#[inline]
pub fn note_to_freq(note: i32) -> f32 {
    440.0 * libm::powf(2.0, (note as f32 - 69.0) / 12.0)
}

/// One sound-generating unit in the voice manager's fixed array.
#[derive(Debug, Clone)]
pub struct Voice<G> {
    generator: G,
    envelope: Envelope,
    glide: Glide,
    frequency: f32,
    midi_note: Option<i32>,
    velocity: f32,
    aftertouch: f32,
}

impl<G: SynthVoice> Voice<G> {
    /// Creates an idle voice around `generator`.
    pub fn new(sample_rate: f32, generator: G) -> Self {
        let mut envelope = Envelope::new(sample_rate);
        envelope.finish();
        Self {
            generator,
            envelope,
            glide: Glide::new(sample_rate, 0.0),
            frequency: 0.0,
            midi_note: None,
            velocity: 0.0,
            aftertouch: 0.0,
        }
    }

    /// Sets the voice to `note` detuned by the `detune` ratio.
    ///
    /// The frequency glides to the new target unless `jump` is set. Without
    /// `legato` the generator's note-on hook fires and the envelope restarts
    /// softly from its current level.
    pub fn trigger(&mut self, note: i32, detune: f32, velocity: f32, legato: bool, jump: bool) {
        let target = note_to_freq(note) * detune;
        // A voice that never sounded has no pitch to glide from.
        let first = self.midi_note.is_none();
        self.midi_note = Some(note);
        self.glide.set_target(target);
        if jump || first {
            self.glide.finish();
        }
        self.frequency = self.glide.current();
        self.velocity = velocity;
        if !legato {
            self.generator.on_note_on(target);
            self.envelope.reset_soft();
        }
    }

    /// Starts the envelope release and fires note-off, if triggered.
    pub fn release(&mut self) {
        if self.is_triggered() {
            self.envelope.release();
            self.generator.on_note_off();
        }
    }

    /// Fires note-off without touching the envelope, if triggered.
    ///
    /// Used when a pinned voice is handed to a new note so the envelope
    /// carries on.
    pub fn release_no_env(&mut self) {
        if self.is_triggered() {
            self.generator.on_note_off();
        }
    }

    /// True from trigger until release.
    pub fn is_triggered(&self) -> bool {
        !self.envelope.is_released()
    }

    /// True while the envelope produces sound.
    pub fn is_active(&self) -> bool {
        self.envelope.is_active()
    }

    /// Renders one sample: advances glide and envelope, then the generator.
    #[inline]
    pub fn next_sample(&mut self, pitch_bend: f32) -> f32 {
        self.frequency = self.glide.advance() * pitch_bend;
        let env = self.envelope.advance();
        let params = VoiceParams {
            frequency: self.frequency,
            velocity: self.velocity,
            aftertouch: self.aftertouch,
        };
        env * self.generator.generate(&params)
    }

    /// Moves the frequency target without retriggering.
    pub fn retarget(&mut self, freq: f32) {
        self.glide.set_target(freq);
    }

    /// Sets channel pressure, 0..1.
    pub fn set_aftertouch(&mut self, value: f32) {
        self.aftertouch = value;
    }

    /// Note last assigned to this voice.
    pub fn midi_note(&self) -> Option<i32> {
        self.midi_note
    }

    /// Current frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Frequency the glide is heading to.
    pub fn frequency_target(&self) -> f32 {
        self.glide.target()
    }

    /// Velocity of the last trigger, 0..1.
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    /// Channel pressure, 0..1.
    pub fn aftertouch(&self) -> f32 {
        self.aftertouch
    }

    /// The amplitude envelope.
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Mutable access to the amplitude envelope.
    pub fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    /// Mutable access to the glide.
    pub fn glide_mut(&mut self) -> &mut Glide {
        &mut self.glide
    }

    /// The generator.
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Mutable access to the generator.
    pub fn generator_mut(&mut self) -> &mut G {
        &mut self.generator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Generator that records hook calls and outputs 1.0.
    #[derive(Debug, Default)]
    struct Probe {
        note_ons: usize,
        note_offs: usize,
    }

    impl SynthVoice for Probe {
        fn generate(&mut self, _params: &VoiceParams) -> f32 {
            1.0
        }

        fn on_note_on(&mut self, _freq_target: f32) {
            self.note_ons += 1;
        }

        fn on_note_off(&mut self) {
            self.note_offs += 1;
        }
    }

    fn voice() -> Voice<Probe> {
        Voice::new(48000.0, Probe::default())
    }

    #[test]
    fn test_note_to_freq() {
        assert!((note_to_freq(69) - 440.0).abs() < 0.001);
        assert!((note_to_freq(81) - 880.0).abs() < 0.01);
        assert!((note_to_freq(60) - 261.63).abs() < 0.01);
    }

    #[test]
    fn test_new_voice_is_idle() {
        let v = voice();
        assert!(!v.is_triggered());
        assert!(!v.is_active());
        assert_eq!(v.midi_note(), None);
    }

    #[test]
    fn test_trigger_and_release() {
        let mut v = voice();
        v.trigger(69, 1.0, 0.8, false, false);
        assert!(v.is_triggered());
        assert_eq!(v.generator().note_ons, 1);
        assert_eq!(v.midi_note(), Some(69));
        assert!((v.frequency_target() - 440.0).abs() < 0.001);
        assert_eq!(v.velocity(), 0.8);

        v.release();
        assert!(!v.is_triggered());
        assert_eq!(v.generator().note_offs, 1);

        v.release();
        assert_eq!(v.generator().note_offs, 1, "release is a no-op when not triggered");
    }

    #[test]
    fn test_legato_keeps_envelope() {
        let mut v = voice();
        v.trigger(60, 1.0, 1.0, false, false);
        for _ in 0..100 {
            v.next_sample(1.0);
        }
        let stage = v.envelope().stage();
        let level = v.envelope().level();

        v.trigger(64, 1.0, 1.0, true, false);
        assert_eq!(v.generator().note_ons, 1, "legato does not fire note-on");
        assert_eq!(v.envelope().stage(), stage);
        assert_eq!(v.envelope().level(), level);
        assert!((v.frequency_target() - note_to_freq(64)).abs() < 0.001);
    }

    #[test]
    fn test_release_no_env_keeps_envelope() {
        let mut v = voice();
        v.trigger(60, 1.0, 1.0, false, false);
        v.release_no_env();
        assert!(v.is_triggered());
        assert_eq!(v.generator().note_offs, 1);
    }

    #[test]
    fn test_glide_between_notes() {
        let mut v = voice();
        v.glide_mut().set_period(0.1);
        v.trigger(57, 1.0, 1.0, false, false);
        assert!((v.frequency() - 220.0).abs() < 0.01, "first note does not glide");

        v.trigger(69, 1.0, 1.0, false, false);
        v.next_sample(1.0);
        assert!(v.frequency() > 220.0 && v.frequency() < 440.0);

        v.trigger(57, 1.0, 1.0, false, true);
        assert!((v.frequency() - 220.0).abs() < 0.01, "jump snaps to pitch");
    }

    #[test]
    fn test_pitch_bend_scales_frequency() {
        let mut v = voice();
        v.trigger(69, 1.0, 1.0, false, false);
        v.next_sample(2.0);
        assert!((v.frequency() - 880.0).abs() < 0.01);
    }

    #[test]
    fn test_detune_ratio() {
        let mut v = voice();
        v.trigger(69, 1.5, 1.0, false, false);
        assert!((v.frequency_target() - 660.0).abs() < 0.01);
    }
}
