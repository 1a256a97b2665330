//! Voice manager settings.
//!
//! All values are plain data: persistence lives outside this crate. Enable
//! the `serde` feature to (de)serialize them.

use core::fmt;
use core::str::FromStr;

/// Selects the allocation strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PlayMode {
    /// One voice per key, oldest note stolen when full.
    #[default]
    Poly,
    /// Three pinned voices: the note plus two sub-octave voices.
    Mono,
    /// All voices on one note, detuned around it.
    Unison,
    /// Two voices per key: the key and a fixed interval above it.
    Interval,
}

impl PlayMode {
    /// All play modes, in display order.
    pub const ALL: [PlayMode; 4] = [
        PlayMode::Poly,
        PlayMode::Mono,
        PlayMode::Unison,
        PlayMode::Interval,
    ];

    /// Lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            PlayMode::Poly => "poly",
            PlayMode::Mono => "mono",
            PlayMode::Unison => "unison",
            PlayMode::Interval => "interval",
        }
    }
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown play mode name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePlayModeError(String);

impl fmt::Display for ParsePlayModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown play mode '{}', expected poly, mono, unison or interval",
            self.0
        )
    }
}

impl std::error::Error for ParsePlayModeError {}

impl FromStr for PlayMode {
    type Err = ParsePlayModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlayMode::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParsePlayModeError(s.to_string()))
    }
}

/// Voice allocation and tuning settings.
///
/// ## Fields
///
/// - `play_mode`: Allocation strategy (default: poly)
/// - `transpose`: Semitones added to every key (default: 0)
/// - `octave`: Octaves added to every key (default: 0)
/// - `legato`: Reuse sounding envelopes in mono and unison modes (default: false)
/// - `retrig`: Snap pinned voices to pitch instead of gliding on a fresh phrase (default: false)
/// - `rand`: Per-voice random detune amount in poly mode, 0..1 (default: 0.0)
/// - `sub`: Sub-voice level in mono mode, 0..1 (default: 0.5)
/// - `detune`: Detune spread in unison mode, 0..1 (default: 0.0)
/// - `interval`: Semitone offset of the second voice in interval mode (default: 7)
/// - `portamento`: Glide time in seconds, 0..1 (default: 0.0)
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct VoiceSettings {
    /// Allocation strategy.
    pub play_mode: PlayMode,
    /// Semitone transposition.
    pub transpose: i32,
    /// Octave shift.
    pub octave: i32,
    /// Keep envelopes running when pinned voices change pitch.
    pub legato: bool,
    /// Jump pinned voices to pitch at the start of a phrase.
    pub retrig: bool,
    /// Random detune amount (poly).
    pub rand: f32,
    /// Sub-voice level (mono).
    pub sub: f32,
    /// Detune spread (unison).
    pub detune: f32,
    /// Interval in semitones (interval).
    pub interval: i32,
    /// Portamento time in seconds.
    pub portamento: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            play_mode: PlayMode::Poly,
            transpose: 0,
            octave: 0,
            legato: false,
            retrig: false,
            rand: 0.0,
            sub: 0.5,
            detune: 0.0,
            interval: 7,
            portamento: 0.0,
        }
    }
}

impl VoiceSettings {
    /// Maps a pressed key to the played note.
    #[inline]
    pub fn resolve_key(&self, key: u8) -> i32 {
        i32::from(key) + self.octave * 12 + self.transpose
    }
}

/// Normalized envelope controls, each 0..1.
///
/// Mapped to seconds with curves that give fine control over short times:
/// attack `8a² + 0.02`, decay `d + 0.02`, release `4r² + 0.02`. Sustain is a
/// level.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EnvelopeSettings {
    /// Attack control.
    pub attack: f32,
    /// Decay control.
    pub decay: f32,
    /// Sustain level.
    pub sustain: f32,
    /// Release control.
    pub release: f32,
}

impl Default for EnvelopeSettings {
    fn default() -> Self {
        Self {
            attack: 0.0,
            decay: 0.5,
            sustain: 1.0,
            release: 0.2,
        }
    }
}

impl EnvelopeSettings {
    /// Attack time in seconds.
    pub fn attack_secs(&self) -> f32 {
        8.0 * self.attack * self.attack + 0.02
    }

    /// Decay time in seconds.
    pub fn decay_secs(&self) -> f32 {
        self.decay + 0.02
    }

    /// Release time in seconds.
    pub fn release_secs(&self) -> f32 {
        4.0 * self.release * self.release + 0.02
    }
}
