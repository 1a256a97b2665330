//! Device-free backend.
//!
//! [`OfflineBackend::render`] drives an engine synchronously into memory,
//! which is deterministic and runs faster than real time. As an
//! [`AudioBackend`] it runs the output callback on its own thread, paced to
//! the sample rate unless pacing is disabled, and discards the audio.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::Result;
use crate::backend::{
    AudioBackend, AudioDevice, BackendStreamConfig, ErrorCallback, OutputCallback, StreamHandle,
};
use crate::engine::AudioEngine;

const DEVICE_NAME: &str = "offline";

/// Renders without an audio device.
#[derive(Debug, Clone)]
pub struct OfflineBackend {
    buffer_size: usize,
    channels: usize,
    paced: bool,
}

impl OfflineBackend {
    /// Creates a backend that calls the engine with `buffer_size` frames of
    /// `channels` interleaved channels at a time.
    ///
    /// # Panics
    ///
    /// Panics if either argument is zero.
    pub fn new(buffer_size: usize, channels: usize) -> Self {
        assert!(buffer_size > 0, "offline buffer size must be non-zero");
        assert!(channels > 0, "offline channel count must be non-zero");
        Self {
            buffer_size,
            channels,
            paced: true,
        }
    }

    /// Whether streams sleep between callbacks to match real time.
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    /// Driver buffer size in frames.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Interleaved channel count.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Renders `frames` frames from `engine`, returned interleaved.
    pub fn render(&self, engine: &mut AudioEngine, frames: usize) -> Vec<f32> {
        let channels = self.channels;
        self.render_with(frames, |buffer| engine.process(buffer, channels))
    }

    /// Renders `frames` frames by calling `callback` once per driver buffer.
    /// The last call may be shorter than the buffer size.
    pub fn render_with(&self, frames: usize, mut callback: impl FnMut(&mut [f32])) -> Vec<f32> {
        let mut output = vec![0.0; frames * self.channels];
        for chunk in output.chunks_mut(self.buffer_size * self.channels) {
            callback(chunk);
        }
        tracing::debug!(frames, channels = self.channels, "offline render complete");
        output
    }
}

impl Default for OfflineBackend {
    fn default() -> Self {
        Self::new(256, 2)
    }
}

struct OfflineStream {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for OfflineStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!("offline stream thread panicked");
        }
    }
}

impl AudioBackend for OfflineBackend {
    fn name(&self) -> &'static str {
        DEVICE_NAME
    }

    fn list_devices(&self) -> Result<Vec<AudioDevice>> {
        Ok(self.default_output_device()?.into_iter().collect())
    }

    fn default_output_device(&self) -> Result<Option<AudioDevice>> {
        Ok(Some(AudioDevice {
            name: DEVICE_NAME.to_string(),
            default_sample_rate: 48000,
            is_default: true,
        }))
    }

    fn build_output_stream(
        &self,
        config: &BackendStreamConfig,
        mut callback: OutputCallback,
        _error_callback: ErrorCallback,
    ) -> Result<StreamHandle> {
        let frames = config.buffer_size.max(1) as usize;
        let channels = usize::from(config.channels.max(1));
        let period = Duration::from_secs_f64(frames as f64 / f64::from(config.sample_rate.max(1)));
        let paced = self.paced;

        let stop = Arc::new(AtomicBool::new(false));
        let running = Arc::clone(&stop);
        let thread = std::thread::Builder::new()
            .name("cadenza-offline".into())
            .spawn(move || {
                let mut buffer = vec![0.0f32; frames * channels];
                let mut next = Instant::now();
                while !running.load(Ordering::Acquire) {
                    callback(&mut buffer);
                    if paced {
                        next += period;
                        if let Some(wait) = next.checked_duration_since(Instant::now()) {
                            std::thread::sleep(wait);
                        }
                    } else {
                        std::thread::yield_now();
                    }
                }
            })?;

        tracing::info!(frames, channels, paced, "offline stream started");
        Ok(StreamHandle::new(OfflineStream {
            stop,
            thread: Some(thread),
        }))
    }
}
