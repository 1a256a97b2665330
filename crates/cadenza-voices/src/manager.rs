//! The voice manager: event dispatch, settings fan-out and block rendering.

use std::collections::VecDeque;

use cadenza_core::{
    AudioBufferPool, CC_SUSTAIN, Event, PITCH_BEND_CENTER, ProcessData,
};

use crate::allocator::{Allocator, MONO_VOICES, NoteContext, NoteVoicePair, VoiceBank};
use crate::settings::{EnvelopeSettings, PlayMode, VoiceSettings};
use crate::voice::{MixHooks, SynthVoice, Voice};

/// Detune step per unison voice pair, as a frequency ratio per unit of
/// the detune setting.
const UNISON_DETUNE_STEP: f32 = 0.015;

/// Maximum per-voice random detune in poly mode, as a frequency ratio.
const RAND_SPREAD: f32 = 0.02;

/// Fixed pseudo-random spread in [-1, 1] for voice `i`.
fn spread(i: usize) -> f32 {
    let mut x = (i as u32).wrapping_add(1).wrapping_mul(0x9E37_79B9);
    x ^= x >> 16;
    x = x.wrapping_mul(0x85EB_CA6B);
    x ^= x >> 13;
    (x as f32 / u32::MAX as f32) * 2.0 - 1.0
}

/// Polyphonic voice manager over `N` voices.
///
/// Owns a fixed voice array and dispatches performance events to the
/// active allocation strategy. Rendering sums every voice's
/// `envelope * generator` output between the `pre` and `post` hooks of `H`.
///
/// Settings changes take effect immediately: envelope and portamento
/// changes reach every voice, detune and sub level changes retarget the
/// pinned voices, and a play-mode change resets all voices.
///
/// # Example
///
/// ```rust
/// use cadenza_core::{AudioBufferPool, ClockRange, Event, ProcessData, SharedEvents};
/// use cadenza_voices::{SineVoice, VoiceManager};
///
/// let pool = AudioBufferPool::new(8, 64);
/// let mut vm: VoiceManager<SineVoice, 6> =
///     VoiceManager::new(48000.0, pool, |_| SineVoice::new(48000.0));
///
/// let events = SharedEvents::from(vec![Event::NoteOn { key: 69, velocity: 100 }]);
/// let out = vm.process(ProcessData::new(events, ClockRange::new(0, 64)));
///
/// assert_eq!(out.nframes(), 64);
/// assert_eq!(vm.active_voice_count(), 1);
/// ```
pub struct VoiceManager<V, const N: usize, H = ()> {
    bank: VoiceBank<V, N>,
    allocator: Allocator,
    settings: VoiceSettings,
    envelope: EnvelopeSettings,
    sustain: bool,
    pitch_bend: f32,
    rand_max: [f32; N],
    rand_values: [f32; N],
    detune_values: [f32; N],
    hooks: H,
    pool: AudioBufferPool,
    sample_rate: f32,
}

impl<V: SynthVoice, const N: usize> VoiceManager<V, N, ()> {
    /// Creates a manager with default settings.
    ///
    /// `factory` builds the generator for each voice index.
    ///
    /// # Panics
    ///
    /// Panics if `N` is smaller than the three voices mono mode pins.
    pub fn new(sample_rate: f32, pool: AudioBufferPool, factory: impl FnMut(usize) -> V) -> Self {
        Self::with_settings(
            sample_rate,
            pool,
            VoiceSettings::default(),
            EnvelopeSettings::default(),
            factory,
        )
    }

    /// Creates a manager with initial settings.
    pub fn with_settings(
        sample_rate: f32,
        pool: AudioBufferPool,
        settings: VoiceSettings,
        envelope: EnvelopeSettings,
        mut factory: impl FnMut(usize) -> V,
    ) -> Self {
        assert!(
            N >= MONO_VOICES,
            "voice manager needs at least {} voices, got {}",
            MONO_VOICES,
            N
        );
        let voices = core::array::from_fn(|i| Voice::new(sample_rate, factory(i)));
        let mut vm = Self {
            bank: VoiceBank::new(voices),
            allocator: Allocator::for_mode(settings.play_mode, N),
            settings,
            envelope: envelope.clone(),
            sustain: false,
            pitch_bend: 1.0,
            rand_max: core::array::from_fn(|i| 1.0 + RAND_SPREAD * spread(i)),
            rand_values: [1.0; N],
            detune_values: [1.0; N],
            hooks: (),
            pool,
            sample_rate,
        };
        vm.set_envelope(envelope);
        vm.set_portamento(vm.settings.portamento);
        vm.update_rand_values();
        vm.update_detune_values();
        vm.rebuild();
        vm
    }
}

impl<V: SynthVoice, const N: usize, H: MixHooks> VoiceManager<V, N, H> {
    /// Replaces the mix hooks.
    pub fn with_hooks<H2: MixHooks>(self, hooks: H2) -> VoiceManager<V, N, H2> {
        VoiceManager {
            bank: self.bank,
            allocator: self.allocator,
            settings: self.settings,
            envelope: self.envelope,
            sustain: self.sustain,
            pitch_bend: self.pitch_bend,
            rand_max: self.rand_max,
            rand_values: self.rand_values,
            detune_values: self.detune_values,
            hooks,
            pool: self.pool,
            sample_rate: self.sample_rate,
        }
    }

    // ---------- events ----------

    /// Applies one performance event.
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::NoteOn { key, velocity: 0 } | Event::NoteOff { key } => self.note_off(key),
            Event::NoteOn { key, velocity } => self.note_on(key, velocity),
            Event::ControlChange {
                controller: CC_SUSTAIN,
                value,
            } => self.set_sustain(value > 63),
            Event::PitchBend { value } => {
                self.pitch_bend =
                    libm::powf(2.0, f32::from(value) / f32::from(PITCH_BEND_CENTER) - 1.0);
            }
            Event::Aftertouch { value } => {
                let pressure = f32::from(value) / 127.0;
                for voice in self.bank.voices.iter_mut().filter(|v| v.is_triggered()) {
                    voice.set_aftertouch(pressure);
                }
            }
            Event::AllNotesOff => self.rebuild(),
            Event::ControlChange { .. } | Event::ProgramChange { .. } => {}
        }
    }

    fn note_on(&mut self, key: u8, velocity: u8) {
        let key = self.settings.resolve_key(key);
        let ctx = NoteContext {
            settings: &self.settings,
            rand_values: &self.rand_values,
            detune_values: &self.detune_values,
        };
        self.bank
            .note_on(self.allocator, key, f32::from(velocity) / 127.0, &ctx);
    }

    fn note_off(&mut self, key: u8) {
        let key = self.settings.resolve_key(key);
        self.bank.note_off(key, self.sustain, self.settings.legato);
    }

    /// Sets the sustain pedal. Releasing it stops every note let go while
    /// it was down.
    pub fn set_sustain(&mut self, on: bool) {
        let was_on = self.sustain;
        self.sustain = on;
        if was_on && !on {
            self.bank.release_sustained(self.settings.legato);
        }
    }

    // ---------- rendering ----------

    /// Renders one sample.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        self.hooks.pre();
        let pitch_bend = self.pitch_bend;
        let sum: f32 = self
            .bank
            .voices
            .iter_mut()
            .map(|voice| voice.next_sample(pitch_bend))
            .sum();
        self.hooks.post(sum)
    }

    /// Renders into `output`, one sample per frame.
    pub fn render(&mut self, output: &mut [f32]) {
        for sample in output {
            *sample = self.next_sample();
        }
    }

    /// Applies the block's events, then renders the block into a fresh
    /// pool buffer bound as mono output.
    ///
    /// # Panics
    ///
    /// Panics if the block is longer than the pool's block size, or if the
    /// pool is exhausted.
    pub fn process<const C: usize>(&mut self, data: ProcessData<C>) -> ProcessData<1> {
        for &event in data.events().iter() {
            self.handle_event(event);
        }

        let nframes = data.nframes();
        let mut buffer = self.pool.allocate();
        assert!(
            nframes <= buffer.len(),
            "block of {} frames exceeds pool block size {}",
            nframes,
            buffer.len()
        );
        if nframes < buffer.len() {
            buffer = buffer.slice(0, nframes);
        }
        self.render(buffer.make_mut());
        data.with_mono(buffer)
    }

    // ---------- settings ----------

    /// Switches the allocation strategy. Changing mode releases every voice.
    pub fn set_play_mode(&mut self, mode: PlayMode) {
        if mode != self.settings.play_mode {
            self.settings.play_mode = mode;
            self.rebuild();
        }
    }

    /// Sets the semitone transposition for subsequent notes.
    pub fn set_transpose(&mut self, semitones: i32) {
        self.settings.transpose = semitones;
    }

    /// Sets the octave shift for subsequent notes.
    pub fn set_octave(&mut self, octave: i32) {
        self.settings.octave = octave;
    }

    /// Enables legato for pinned strategies.
    pub fn set_legato(&mut self, legato: bool) {
        self.settings.legato = legato;
    }

    /// Makes pinned voices jump to pitch at the start of a phrase.
    pub fn set_retrig(&mut self, retrig: bool) {
        self.settings.retrig = retrig;
    }

    /// Sets the poly random detune amount, 0..1.
    pub fn set_rand(&mut self, rand: f32) {
        self.settings.rand = rand.clamp(0.0, 1.0);
        self.update_rand_values();
    }

    /// Sets the unison detune spread, 0..1.
    ///
    /// In unison mode the pinned voices are retuned right away.
    pub fn set_detune(&mut self, detune: f32) {
        self.settings.detune = detune.clamp(0.0, 1.0);
        self.update_detune_values();
        if let Allocator::Unison { voices_used } = self.allocator {
            for (voice, &ratio) in self.bank.voices[..voices_used]
                .iter_mut()
                .zip(&self.detune_values)
            {
                if let Some(note) = voice.midi_note() {
                    voice.retarget(crate::voice::note_to_freq(note) * ratio);
                }
            }
        }
    }

    /// Sets the sub-voice level, 0..1. Applied to the sub voices in mono
    /// mode.
    pub fn set_sub(&mut self, sub: f32) {
        self.settings.sub = sub.clamp(0.0, 1.0);
        if self.allocator == Allocator::Mono {
            for voice in &mut self.bank.voices[1..MONO_VOICES] {
                voice.envelope_mut().set_amp(self.settings.sub);
            }
        }
    }

    /// Sets the interval-mode offset in semitones.
    pub fn set_interval(&mut self, semitones: i32) {
        self.settings.interval = semitones.clamp(-12, 12);
    }

    /// Sets the portamento time in seconds. Running glides finish first.
    pub fn set_portamento(&mut self, secs: f32) {
        self.settings.portamento = secs.max(0.0);
        for voice in &mut self.bank.voices {
            let glide = voice.glide_mut();
            glide.finish();
            glide.set_period(self.settings.portamento);
        }
    }

    /// Applies normalized envelope controls to every voice.
    pub fn set_envelope(&mut self, envelope: EnvelopeSettings) {
        for voice in &mut self.bank.voices {
            let env = voice.envelope_mut();
            env.set_attack(envelope.attack_secs());
            env.set_decay(envelope.decay_secs());
            env.set_sustain(envelope.sustain);
            env.set_release(envelope.release_secs());
        }
        self.envelope = envelope;
    }

    /// Applies every field of `settings` through its setter.
    pub fn apply_settings(&mut self, settings: &VoiceSettings) {
        self.set_play_mode(settings.play_mode);
        self.set_transpose(settings.transpose);
        self.set_octave(settings.octave);
        self.set_legato(settings.legato);
        self.set_retrig(settings.retrig);
        self.set_rand(settings.rand);
        self.set_sub(settings.sub);
        self.set_detune(settings.detune);
        self.set_interval(settings.interval);
        self.set_portamento(settings.portamento);
    }

    /// Updates the sample rate of every voice.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for voice in &mut self.bank.voices {
            voice.envelope_mut().set_sample_rate(sample_rate);
            voice.glide_mut().set_sample_rate(sample_rate);
        }
    }

    // Hard reset into the current play mode.
    fn rebuild(&mut self) {
        self.allocator = Allocator::for_mode(self.settings.play_mode, N);
        self.bank.reset();
        self.bank.setup(self.allocator, self.settings.sub);
        #[cfg(feature = "tracing")]
        tracing::debug!(mode = %self.settings.play_mode, "voice allocator rebuilt");
    }

    fn update_rand_values(&mut self) {
        let r = self.settings.rand;
        for (value, max) in self.rand_values.iter_mut().zip(&self.rand_max) {
            *value = max * r - r + 1.0;
        }
    }

    // [1, 1+s, 1/(1+s), 1+2s, 1/(1+2s), ...] with s = 0.015 * detune.
    fn update_detune_values(&mut self) {
        let step = UNISON_DETUNE_STEP * self.settings.detune;
        for (i, value) in self.detune_values.iter_mut().enumerate() {
            let pair = i.div_ceil(2) as f32;
            let ratio = 1.0 + step * pair;
            *value = if i % 2 == 0 { 1.0 / ratio } else { ratio };
        }
    }

    // ---------- queries ----------

    /// The voice array.
    pub fn voices(&self) -> &[Voice<V>; N] {
        &self.bank.voices
    }

    /// Mutable access to the voice array.
    pub fn voices_mut(&mut self) -> &mut [Voice<V>; N] {
        &mut self.bank.voices
    }

    /// Held and sustained notes, newest first.
    pub fn note_stack(&self) -> &VecDeque<NoteVoicePair> {
        &self.bank.note_stack
    }

    /// Voices on the free list.
    pub fn free_voice_count(&self) -> usize {
        self.bank.free_voices.len()
    }

    /// Voices whose envelope is producing sound.
    pub fn active_voice_count(&self) -> usize {
        self.bank.voices.iter().filter(|v| v.is_active()).count()
    }

    /// Current allocation strategy.
    pub fn allocator(&self) -> Allocator {
        self.allocator
    }

    /// Current play mode.
    pub fn play_mode(&self) -> PlayMode {
        self.settings.play_mode
    }

    /// True while the sustain pedal is down.
    pub fn sustain(&self) -> bool {
        self.sustain
    }

    /// Current pitch bend multiplier.
    pub fn pitch_bend(&self) -> f32 {
        self.pitch_bend
    }

    /// Current voice settings.
    pub fn settings(&self) -> &VoiceSettings {
        &self.settings
    }

    /// Current envelope settings.
    pub fn envelope_settings(&self) -> &EnvelopeSettings {
        &self.envelope
    }

    /// Unison detune ratios per pinned voice.
    pub fn detune_values(&self) -> &[f32; N] {
        &self.detune_values
    }

    /// Poly detune ratios per voice.
    pub fn rand_values(&self) -> &[f32; N] {
        &self.rand_values
    }

    /// The buffer pool output blocks are drawn from.
    pub fn pool(&self) -> &AudioBufferPool {
        &self.pool
    }

    /// The mix hooks.
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Mutable access to the mix hooks.
    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SineVoice;

    fn manager() -> VoiceManager<SineVoice, 6> {
        VoiceManager::new(48000.0, AudioBufferPool::new(4, 64), |_| {
            SineVoice::new(48000.0)
        })
    }

    #[test]
    fn test_detune_table_is_symmetric() {
        let mut vm = manager();
        vm.set_detune(1.0);
        let d = vm.detune_values();
        assert_eq!(d[0], 1.0);
        assert!((d[1] - 1.015).abs() < 1e-6);
        assert!((d[1] * d[2] - 1.0).abs() < 1e-6);
        assert!((d[3] - 1.03).abs() < 1e-6);
        assert!((d[3] * d[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rand_values_scale_with_amount() {
        let mut vm = manager();
        assert!(vm.rand_values().iter().all(|&r| r == 1.0));
        vm.set_rand(1.0);
        assert!(
            vm.rand_values()
                .iter()
                .all(|&r| (r - 1.0).abs() <= RAND_SPREAD + 1e-6)
        );
        assert!(vm.rand_values().iter().any(|&r| r != 1.0));
    }

    #[test]
    fn test_spread_range() {
        for i in 0..64 {
            let s = spread(i);
            assert!((-1.0..=1.0).contains(&s));
        }
    }

    #[test]
    fn test_pitch_bend_mapping() {
        let mut vm = manager();
        vm.handle_event(Event::PitchBend { value: 8192 });
        assert!((vm.pitch_bend() - 1.0).abs() < 1e-6);
        vm.handle_event(Event::PitchBend { value: 0 });
        assert!((vm.pitch_bend() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_zero_velocity_note_on_is_note_off() {
        let mut vm = manager();
        vm.handle_event(Event::NoteOn { key: 60, velocity: 90 });
        vm.handle_event(Event::NoteOn { key: 60, velocity: 0 });
        assert!(vm.note_stack().is_empty());
    }

    #[test]
    fn test_transpose_and_octave_resolve_keys() {
        let mut vm = manager();
        vm.set_transpose(2);
        vm.set_octave(-1);
        vm.handle_event(Event::NoteOn { key: 60, velocity: 90 });
        assert_eq!(vm.note_stack()[0].key, 50);
        vm.handle_event(Event::NoteOff { key: 60 });
        assert!(vm.note_stack().is_empty());
    }

    #[test]
    fn test_aftertouch_reaches_triggered_voices() {
        let mut vm = manager();
        vm.handle_event(Event::NoteOn { key: 60, velocity: 90 });
        vm.handle_event(Event::Aftertouch { value: 127 });
        let pressed: Vec<_> = vm
            .voices()
            .iter()
            .filter(|v| v.is_triggered())
            .map(|v| v.aftertouch())
            .collect();
        assert_eq!(pressed, vec![1.0]);
        assert!(
            vm.voices()
                .iter()
                .filter(|v| !v.is_triggered())
                .all(|v| v.aftertouch() == 0.0)
        );
    }

    #[test]
    fn test_sub_level_applies_in_mono_only() {
        let mut vm = manager();
        vm.set_sub(0.25);
        assert_eq!(vm.voices()[1].envelope().amp(), 1.0);

        vm.set_play_mode(PlayMode::Mono);
        assert_eq!(vm.voices()[0].envelope().amp(), 1.0);
        assert_eq!(vm.voices()[1].envelope().amp(), 0.25);
        assert_eq!(vm.voices()[2].envelope().amp(), 0.25);

        vm.set_sub(0.75);
        assert_eq!(vm.voices()[2].envelope().amp(), 0.75);

        vm.set_play_mode(PlayMode::Poly);
        assert!(vm.voices().iter().all(|v| v.envelope().amp() == 1.0));
    }

    #[test]
    fn test_envelope_settings_reach_voices() {
        let mut vm = manager();
        vm.set_envelope(EnvelopeSettings {
            attack: 0.5,
            decay: 0.3,
            sustain: 0.6,
            release: 1.0,
        });
        for voice in vm.voices() {
            assert!((voice.envelope().attack() - 2.02).abs() < 1e-6);
            assert!((voice.envelope().sustain() - 0.6).abs() < 1e-6);
            assert!((voice.envelope().release_time() - 4.02).abs() < 1e-6);
        }
    }

    #[test]
    fn test_detune_retunes_unison_voices() {
        let mut vm = manager();
        vm.set_play_mode(PlayMode::Unison);
        vm.handle_event(Event::NoteOn { key: 69, velocity: 100 });
        vm.set_detune(1.0);
        assert!((vm.voices()[1].frequency_target() - 440.0 * 1.015).abs() < 0.01);
    }

    #[test]
    fn test_process_short_block() {
        let mut vm = manager();
        let data = ProcessData::new(
            vec![Event::NoteOn { key: 69, velocity: 127 }].into(),
            cadenza_core::ClockRange::new(0, 32),
        );
        let out = vm.process(data);
        assert_eq!(out.nframes(), 32);
        assert!(out.buffer().iter().any(|&s| s != 0.0));
    }

    #[test]
    #[should_panic]
    fn test_too_few_voices_panics() {
        let _vm: VoiceManager<SineVoice, 2> =
            VoiceManager::new(48000.0, AudioBufferPool::new(4, 64), |_| {
                SineVoice::new(48000.0)
            });
    }
}
