//! cpal-based audio backend.
//!
//! [`CpalBackend`] is the device backend: ALSA on Linux, CoreAudio on
//! macOS, WASAPI on Windows.
//!
//! ```rust,ignore
//! use cadenza_io::{AudioBackend, BackendStreamConfig, CpalBackend};
//!
//! let backend = CpalBackend::new();
//! let stream = backend.build_output_stream(
//!     &BackendStreamConfig::default(),
//!     Box::new(move |buffer: &mut [f32]| engine.process(buffer, 2)),
//!     Box::new(|err: &str| tracing::error!(err, "stream error")),
//! )?;
//! // Plays until `stream` is dropped.
//! ```

use crate::backend::{
    AudioBackend, AudioDevice, BackendStreamConfig, ErrorCallback, OutputCallback, StreamHandle,
};
use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host};

/// Extract device name via `description()` (cpal 0.17+).
fn device_name(device: &Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

fn describe(device: &Device, default_name: Option<&str>) -> Option<AudioDevice> {
    let name = device_name(device).ok()?;
    let default_sample_rate = device
        .default_output_config()
        .map(|c| c.sample_rate())
        .unwrap_or(48000);
    Some(AudioDevice {
        is_default: default_name == Some(name.as_str()),
        name,
        default_sample_rate,
    })
}

/// List the output devices of the default host.
pub fn list_devices() -> Result<Vec<AudioDevice>> {
    CpalBackend::new().list_devices()
}

/// cpal-based audio backend.
pub struct CpalBackend {
    host: Host,
}

impl CpalBackend {
    /// Create a backend on the platform's default audio host.
    pub fn new() -> Self {
        let host = cpal::default_host();
        tracing::info!(host = host.id().name(), "cpal backend initialized");
        Self { host }
    }

    /// Find an output device whose name contains `name` (case-insensitive),
    /// or the default device.
    fn find_output_device(&self, name: Option<&str>) -> Result<Device> {
        match name {
            Some(search) => {
                let search_lower = search.to_lowercase();
                let devices = self
                    .host
                    .output_devices()
                    .map_err(|e| Error::Stream(e.to_string()))?;

                for device in devices {
                    if let Ok(dev_name) = device_name(&device)
                        && dev_name.to_lowercase().contains(search_lower.as_str())
                    {
                        return Ok(device);
                    }
                }
                Err(Error::DeviceNotFound(format!(
                    "no output device matching '{}'",
                    search
                )))
            }
            None => self.host.default_output_device().ok_or(Error::NoDevice),
        }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn list_devices(&self) -> Result<Vec<AudioDevice>> {
        let default_name = self
            .host
            .default_output_device()
            .and_then(|d| device_name(&d).ok());
        let devices = self
            .host
            .output_devices()
            .map_err(|e| Error::Stream(e.to_string()))?;
        Ok(devices
            .filter_map(|d| describe(&d, default_name.as_deref()))
            .collect())
    }

    fn default_output_device(&self) -> Result<Option<AudioDevice>> {
        Ok(self.host.default_output_device().and_then(|d| {
            describe(&d, None).map(|mut info| {
                info.is_default = true;
                info
            })
        }))
    }

    fn build_output_stream(
        &self,
        config: &BackendStreamConfig,
        mut callback: OutputCallback,
        mut error_callback: ErrorCallback,
    ) -> Result<StreamHandle> {
        let device = self.find_output_device(config.device_name.as_deref())?;

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: config.sample_rate,
            buffer_size: cpal::BufferSize::Fixed(config.buffer_size),
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback(data);
                },
                move |err| {
                    error_callback(&err.to_string());
                },
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))?;

        stream.play().map_err(|e| Error::Stream(e.to_string()))?;
        tracing::info!(
            channels = config.channels,
            sample_rate = config.sample_rate,
            buffer_size = config.buffer_size,
            "output stream started"
        );

        Ok(StreamHandle::new(stream))
    }
}
