//! Audio engine and I/O layer for cadenza.
//!
//! This crate provides:
//!
//! - **Callback loop**: [`AudioEngine`] runs once per driver callback on the
//!   audio thread; [`AudioHandle`] is its control-thread side
//! - **Synth chain**: [`SynthChain`] wires a voice manager through the
//!   [`Master`] stage into stereo output
//! - **Backends**: [`AudioBackend`] with [`CpalBackend`] for devices and
//!   [`OfflineBackend`] for deterministic rendering
//! - **WAV output**: [`write_wav`] and [`read_wav`] via hound
//!
//! ## Quick Start
//!
//! ```rust
//! use cadenza_core::Event;
//! use cadenza_io::{AudioEngine, EngineOptions, OfflineBackend, SynthChain};
//! use cadenza_voices::{SineVoice, VoiceManager};
//!
//! let options = EngineOptions::default();
//! let (mut handle, mut engine) = AudioEngine::new(&options);
//!
//! let voices: VoiceManager<SineVoice, 8> =
//!     VoiceManager::new(48000.0, engine.pool().clone(), |_| SineVoice::new(48000.0));
//! handle.set_process_callback(SynthChain::new(voices, 0.8).into_callback());
//! handle.enqueue(Event::NoteOn { key: 60, velocity: 100 });
//!
//! let rendered = OfflineBackend::new(256, 2).render(&mut engine, 4800);
//! assert_eq!(rendered.len(), 4800 * 2);
//! ```

pub mod backend;
mod chain;
mod cpal_backend;
mod engine;
mod master;
mod offline;
mod wav;

pub use backend::{
    AudioBackend, AudioDevice, BackendStreamConfig, ErrorCallback, OutputCallback, StreamHandle,
};
pub use chain::SynthChain;
pub use cpal_backend::{CpalBackend, list_devices};
pub use engine::{
    AudioEngine, AudioHandle, EngineOptions, EngineState, ForwardingHandler, MidiHandler,
    ProcessCallback,
};
pub use master::{Master, fast_atan};
pub use offline::OfflineBackend;
pub use wav::{WavSpec, read_wav, read_wav_stereo, write_wav, write_wav_stereo};

/// Error types for audio I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Audio stream setup or runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for audio I/O operations.
pub type Result<T> = std::result::Result<T, Error>;
