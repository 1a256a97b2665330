//! Cadenza Voices - polyphonic voice management for the cadenza engine
//!
//! This crate turns a block's performance events into a mono audio block by
//! allocating a fixed array of voices to notes.
//!
//! # Core Components
//!
//! ## Voices
//!
//! - [`Voice`] - Pitch, velocity and envelope state around a generator
//! - [`SynthVoice`] - The per-voice sound generator an instrument supplies
//! - [`MixHooks`] - Hooks run before and after the voices are summed
//! - [`SineVoice`] - Reference sine generator
//!
//! ## Building Blocks
//!
//! - [`Envelope`] / [`EnvelopeStage`] - ADSR with soft retrigger and output amplitude
//! - [`Glide`] - Curved portamento between frequency targets
//!
//! ```rust
//! use cadenza_voices::Glide;
//!
//! let mut glide = Glide::new(48000.0, 220.0);
//! glide.set_period(0.05);
//! glide.set_target(330.0);
//! let freq = glide.advance();
//! assert!(freq > 220.0);
//! ```
//!
//! ## Allocation
//!
//! - [`VoiceManager`] - Event dispatch, settings and rendering
//! - [`Allocator`] - Poly, mono, unison and interval strategies
//! - [`VoiceSettings`] / [`EnvelopeSettings`] / [`PlayMode`] - Plain settings data
//!
//! # Play Modes
//!
//! | Mode | Voices per note | Stealing |
//! |------|-----------------|----------|
//! | poly | 1 | oldest note |
//! | interval | 2 (key and key + interval) | oldest note |
//! | mono | 3 pinned (key and two sub-octave voices) | pinned voices move |
//! | unison | all, odd count, detuned | pinned voices move |
//!
//! # Features
//!
//! - `serde`: derive `Serialize`/`Deserialize` for the settings types
//! - `tracing`: log voice steals and allocator rebuilds
//!
//! # Example
//!
//! ```rust
//! use cadenza_core::{AudioBufferPool, Event};
//! use cadenza_voices::{PlayMode, SineVoice, VoiceManager};
//!
//! let pool = AudioBufferPool::new(8, 128);
//! let mut vm: VoiceManager<SineVoice, 8> =
//!     VoiceManager::new(48000.0, pool, |_| SineVoice::new(48000.0));
//! vm.set_play_mode(PlayMode::Mono);
//!
//! vm.handle_event(Event::NoteOn { key: 60, velocity: 100 });
//! assert_eq!(vm.note_stack().len(), 3);
//!
//! let mut block = [0.0f32; 128];
//! vm.render(&mut block);
//! ```

pub mod allocator;
pub mod envelope;
pub mod glide;
pub mod manager;
pub mod settings;
pub mod sine;
pub mod voice;

pub use allocator::{Allocator, MONO_VOICES, NoteVoicePair};
pub use envelope::{Envelope, EnvelopeStage};
pub use glide::Glide;
pub use manager::VoiceManager;
pub use settings::{EnvelopeSettings, ParsePlayModeError, PlayMode, VoiceSettings};
pub use sine::SineVoice;
pub use voice::{MixHooks, SynthVoice, Voice, VoiceParams, note_to_freq};
