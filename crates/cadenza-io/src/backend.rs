//! Pluggable audio backend abstraction.
//!
//! [`AudioBackend`] decouples the engine from any platform audio API. Two
//! implementations ship with this crate:
//!
//! - [`CpalBackend`](crate::CpalBackend): ALSA, CoreAudio and WASAPI via cpal
//! - [`OfflineBackend`](crate::OfflineBackend): a device-free clock for
//!   rendering and tests
//!
//! ```text
//!  control thread                 audio thread (driver)
//! ┌──────────────┐  events    ┌────────────────────────┐
//! │ AudioHandle  │──────────▶ │ OutputCallback          │
//! │              │  executor  │  └─ AudioEngine::process│
//! └──────────────┘──────────▶ └────────────────────────┘
//! ```
//!
//! Callbacks are boxed closures so the trait stays object-safe, and streams
//! come back as a type-erased [`StreamHandle`] that stops playback on drop.

use crate::Result;

/// Audio device information.
#[derive(Debug, Clone)]
pub struct AudioDevice {
    /// Human-readable device name.
    pub name: String,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
    /// Whether this is the system default output.
    pub is_default: bool,
}

/// Configuration for building an output stream.
///
/// ## Fields
///
/// - `sample_rate`: Requested sample rate in Hz (default: 48000)
/// - `buffer_size`: Preferred driver buffer size in frames (default: 256)
/// - `channels`: Number of output channels (default: 2, stereo)
/// - `device_name`: Optional device name filter (uses default device if `None`)
#[derive(Debug, Clone)]
pub struct BackendStreamConfig {
    /// Requested sample rate in Hz.
    pub sample_rate: u32,
    /// Preferred buffer size in frames.
    pub buffer_size: u32,
    /// Number of audio channels.
    pub channels: u16,
    /// Optional device name (uses system default if `None`).
    pub device_name: Option<String>,
}

impl Default for BackendStreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            buffer_size: 256,
            channels: 2,
            device_name: None,
        }
    }
}

/// Type-erased audio stream handle.
///
/// The stream is active while this handle exists; dropping it stops
/// playback.
pub struct StreamHandle {
    _inner: Box<dyn Send>,
}

impl StreamHandle {
    /// Wraps a backend-specific stream object, kept alive until drop.
    pub fn new<T: Send + 'static>(stream: T) -> Self {
        Self {
            _inner: Box::new(stream),
        }
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle").finish_non_exhaustive()
    }
}

/// Audio output callback.
///
/// Called on the audio thread with an interleaved buffer
/// (`[L0, R0, L1, R1, ...]` for stereo) that must be completely filled.
/// Implementations must not allocate, lock or block.
pub type OutputCallback = Box<dyn FnMut(&mut [f32]) + Send>;

/// Stream error callback, receiving a human-readable message.
pub type ErrorCallback = Box<dyn FnMut(&str) + Send>;

/// Pluggable audio backend.
///
/// Object-safe, so a backend can be picked at runtime as
/// `Box<dyn AudioBackend>`.
pub trait AudioBackend: Send {
    /// Human-readable name of this backend.
    fn name(&self) -> &str;

    /// List available output devices.
    fn list_devices(&self) -> Result<Vec<AudioDevice>>;

    /// Get the default output device, if any.
    fn default_output_device(&self) -> Result<Option<AudioDevice>>;

    /// Build and start an output stream.
    ///
    /// `callback` is invoked on the audio thread for every driver buffer.
    /// The returned [`StreamHandle`] keeps the stream alive.
    fn build_output_stream(
        &self,
        config: &BackendStreamConfig,
        callback: OutputCallback,
        error_callback: ErrorCallback,
    ) -> Result<StreamHandle>;

    /// Sample rate the backend will actually run at for `config`.
    fn actual_sample_rate(&self, config: &BackendStreamConfig) -> u32 {
        config.sample_rate
    }
}
