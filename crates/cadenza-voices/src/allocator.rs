//! Voice allocation strategies.
//!
//! The strategy set is closed, so it is a plain enum dispatched by `match`.
//! The strategies share these primitives on [`VoiceBank`]:
//!
//! - `get_voice`: take a free voice (preferring one that last played the
//!   same note), or steal the oldest note-stack entry's voice. Poly and
//!   interval only.
//! - `take_pinned`: move one of the mono or unison pinned voices to the
//!   new note, wherever it sits in the stack.
//! - `stop_voice`: remove every entry of a key and hand each freed voice to
//!   the oldest entry still waiting for one, or back to the free list.
//!
//! The note stack is ordered newest first.

use std::collections::VecDeque;

use crate::settings::{PlayMode, VoiceSettings};
use crate::voice::{SynthVoice, Voice};

/// Voices pinned by the mono strategy: the note plus two sub-octave voices.
pub const MONO_VOICES: usize = 3;

/// Distinct keys the note stack is provisioned for.
const NOTE_STACK_KEYS: usize = 128;

/// One note-stack entry: a held (or sustained) note and the voice sounding
/// it, if any.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteVoicePair {
    /// Resolved key that created the entry.
    pub key: i32,
    /// Note the voice plays. Differs from `key` for interval and sub voices.
    pub note: i32,
    /// Frequency ratio applied on trigger.
    pub detune: f32,
    /// Trigger velocity, 0..1.
    pub velocity: f32,
    /// Index of the sounding voice, `None` while stolen.
    pub voice: Option<usize>,
    /// Key went up while the sustain pedal was down.
    pub should_release: bool,
}

impl NoteVoicePair {
    fn new(key: i32, note: i32, detune: f32, velocity: f32, voice: usize) -> Self {
        Self {
            key,
            note,
            detune,
            velocity,
            voice: Some(voice),
            should_release: false,
        }
    }

    /// True while a voice is assigned.
    pub fn has_voice(&self) -> bool {
        self.voice.is_some()
    }
}

/// The active allocation strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Allocator {
    /// One voice per key.
    Poly,
    /// Three pinned voices.
    Mono,
    /// `voices_used` pinned voices on one note.
    Unison {
        /// Number of voices a note occupies.
        voices_used: usize,
    },
    /// Two voices per key.
    Interval,
}

impl Allocator {
    /// Strategy for `mode` over `voice_count` voices.
    ///
    /// Unison uses an odd number of voices so the detune stack is centred.
    pub fn for_mode(mode: PlayMode, voice_count: usize) -> Self {
        match mode {
            PlayMode::Poly => Allocator::Poly,
            PlayMode::Mono => Allocator::Mono,
            PlayMode::Unison => Allocator::Unison {
                voices_used: voice_count - (voice_count + 1) % 2,
            },
            PlayMode::Interval => Allocator::Interval,
        }
    }

    /// The play mode this strategy implements.
    pub fn play_mode(self) -> PlayMode {
        match self {
            Allocator::Poly => PlayMode::Poly,
            Allocator::Mono => PlayMode::Mono,
            Allocator::Unison { .. } => PlayMode::Unison,
            Allocator::Interval => PlayMode::Interval,
        }
    }

    /// Voices a single note occupies.
    pub fn voices_per_note(self) -> usize {
        match self {
            Allocator::Poly => 1,
            Allocator::Mono => MONO_VOICES,
            Allocator::Unison { voices_used } => voices_used,
            Allocator::Interval => 2,
        }
    }
}

/// Per-note inputs the strategies read besides the bank itself.
pub(crate) struct NoteContext<'a> {
    pub(crate) settings: &'a VoiceSettings,
    pub(crate) rand_values: &'a [f32],
    pub(crate) detune_values: &'a [f32],
}

/// The fixed voice array with its note stack and free list.
#[derive(Debug)]
pub(crate) struct VoiceBank<V, const N: usize> {
    pub(crate) voices: [Voice<V>; N],
    pub(crate) note_stack: VecDeque<NoteVoicePair>,
    pub(crate) free_voices: Vec<usize>,
}

impl<V: SynthVoice, const N: usize> VoiceBank<V, N> {
    pub(crate) fn new(voices: [Voice<V>; N]) -> Self {
        Self {
            voices,
            note_stack: VecDeque::with_capacity(NOTE_STACK_KEYS * N.max(MONO_VOICES)),
            free_voices: (0..N).collect(),
        }
    }

    /// Releases every voice and returns all of them to the free list at
    /// unity amplitude.
    pub(crate) fn reset(&mut self) {
        for voice in &mut self.voices {
            voice.release();
            voice.envelope_mut().set_amp(1.0);
        }
        self.note_stack.clear();
        self.free_voices.clear();
        self.free_voices.extend(0..N);
    }

    /// Applies the strategy's amplitude layout after a reset.
    pub(crate) fn setup(&mut self, allocator: Allocator, sub: f32) {
        match allocator {
            Allocator::Mono => {
                for voice in &mut self.voices[1..MONO_VOICES] {
                    voice.envelope_mut().set_amp(sub);
                }
            }
            Allocator::Unison { .. } => {
                let amp = 1.0 / N as f32;
                for voice in &mut self.voices {
                    voice.envelope_mut().set_amp(amp);
                }
            }
            Allocator::Poly | Allocator::Interval => {}
        }
    }

    /// Takes a voice for `note`.
    pub(crate) fn get_voice(&mut self, note: i32) -> usize {
        if !self.free_voices.is_empty() {
            let voices = &self.voices;
            let pos = self
                .free_voices
                .iter()
                .position(|&v| voices[v].midi_note() == Some(note) && !voices[v].is_triggered())
                .unwrap_or(0);
            return self.free_voices.remove(pos);
        }

        if let Some(entry) = self.note_stack.iter_mut().rev().find(|e| e.has_voice()) {
            if let Some(v) = entry.voice.take() {
                #[cfg(feature = "tracing")]
                tracing::debug!(voice = v, from = entry.note, to = note, "stealing voice");
                self.voices[v].release();
                return v;
            }
        }

        #[cfg(feature = "tracing")]
        tracing::error!(note, "no voice found, using voice 0");
        0
    }

    /// Removes every entry of `key`, oldest first, handing their voices on.
    pub(crate) fn stop_voice(&mut self, key: i32, legato: bool) {
        let mut i = self.note_stack.len();
        while i > 0 {
            i -= 1;
            if self.note_stack[i].key != key {
                continue;
            }
            if let Some(voice) = self.note_stack.remove(i).and_then(|e| e.voice) {
                self.hand_over(voice, key, legato);
            }
        }
    }

    // Gives a freed voice to the oldest waiting entry of another key.
    fn hand_over(&mut self, v: usize, key: i32, legato: bool) {
        let waiting = self
            .note_stack
            .iter_mut()
            .rev()
            .find(|e| !e.has_voice() && e.key != key);
        match waiting {
            Some(entry) => {
                entry.voice = Some(v);
                self.voices[v].trigger(entry.note, entry.detune, entry.velocity, legato, false);
            }
            None => {
                self.voices[v].release();
                if !self.free_voices.contains(&v) {
                    self.free_voices.push(v);
                }
            }
        }
    }

    // Removes a specific voice from the free list, for pinned strategies.
    fn claim(&mut self, v: usize) -> usize {
        if let Some(pos) = self.free_voices.iter().position(|&f| f == v) {
            self.free_voices.remove(pos);
        }
        v
    }

    // Takes pinned voice `pinned` for a restrike. The entry at `offset`
    // normally holds it; after a hand-over to an older key it may sit
    // further down the stack, or be free.
    fn take_pinned(&mut self, offset: usize, pinned: usize, legato: bool) -> usize {
        let slot = match self.note_stack.get(offset) {
            Some(entry) if entry.voice == Some(pinned) => Some(offset),
            _ => self.note_stack.iter().position(|e| e.voice == Some(pinned)),
        };
        match slot.and_then(|pos| self.note_stack[pos].voice.take()) {
            Some(v) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(voice = v, "moving pinned voice");
                // Keep the envelope running; note-off only when restriking.
                if !legato {
                    self.voices[v].release_no_env();
                }
                v
            }
            None => self.claim(pinned),
        }
    }

    /// Starts `key` under `allocator`.
    pub(crate) fn note_on(
        &mut self,
        allocator: Allocator,
        key: i32,
        velocity: f32,
        ctx: &NoteContext<'_>,
    ) {
        let legato = ctx.settings.legato;
        self.stop_voice(key, legato);

        match allocator {
            Allocator::Poly => {
                let v = self.get_voice(key);
                let detune = ctx.rand_values.get(v).copied().unwrap_or(1.0);
                self.note_stack
                    .push_front(NoteVoicePair::new(key, key, detune, velocity, v));
                self.voices[v].trigger(key, detune, velocity, false, false);
            }
            Allocator::Interval => {
                for i in 0..2 {
                    let note = key + ctx.settings.interval * i;
                    let v = self.get_voice(note);
                    self.note_stack
                        .push_front(NoteVoicePair::new(key, note, 1.0, velocity, v));
                    self.voices[v].trigger(note, 1.0, velocity, false, false);
                }
            }
            Allocator::Mono => {
                let sub = ctx.settings.sub;
                let restrike = !self.note_stack.is_empty();
                for i in 0..MONO_VOICES {
                    let sv = if i > 0 { 1.0 } else { 0.0 };
                    let note = key - 12 * sv as i32;
                    let vel = velocity * (1.0 - sv + sub * sv);
                    if restrike {
                        let v = self.take_pinned(MONO_VOICES - 1, i, legato);
                        let glide = legato && self.voices[v].is_triggered();
                        self.note_stack
                            .push_front(NoteVoicePair::new(key, note, 1.0, vel, v));
                        self.voices[v].trigger(note, 1.0, vel, glide, false);
                    } else {
                        let v = self.claim(i);
                        self.note_stack
                            .push_front(NoteVoicePair::new(key, note, 1.0, vel, v));
                        self.voices[v].trigger(note, 1.0, vel, false, ctx.settings.retrig);
                    }
                }
            }
            Allocator::Unison { voices_used } => {
                let restrike = !self.note_stack.is_empty();
                for i in 0..voices_used {
                    let detune = ctx.detune_values.get(i).copied().unwrap_or(1.0);
                    if restrike {
                        let v = self.take_pinned(voices_used - 1, i, legato);
                        let glide = legato && self.voices[v].is_triggered();
                        self.note_stack
                            .push_front(NoteVoicePair::new(key, key, detune, velocity, v));
                        self.voices[v].trigger(key, detune, velocity, glide, false);
                    } else {
                        let v = self.claim(i);
                        self.note_stack
                            .push_front(NoteVoicePair::new(key, key, detune, velocity, v));
                        self.voices[v].trigger(key, detune, velocity, false, ctx.settings.retrig);
                    }
                }
            }
        }
    }

    /// Ends `key`, or marks it for release while `sustain` is held.
    pub(crate) fn note_off(&mut self, key: i32, sustain: bool, legato: bool) {
        if sustain {
            for entry in self.note_stack.iter_mut().filter(|e| e.key == key) {
                entry.should_release = true;
            }
        } else {
            self.stop_voice(key, legato);
        }
    }

    /// Stops every key marked while the pedal was down, oldest first.
    pub(crate) fn release_sustained(&mut self, legato: bool) {
        while let Some(key) = self
            .note_stack
            .iter()
            .rev()
            .find(|e| e.should_release)
            .map(|e| e.key)
        {
            self.stop_voice(key, legato);
        }
    }
}
