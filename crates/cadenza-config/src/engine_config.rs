//! The engine configuration file.

use std::path::Path;

use cadenza_voices::{EnvelopeSettings, VoiceSettings};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Widest output layout the engine supports.
pub const MAX_OUTPUT_CHANNELS: u16 = 8;

/// Smallest buffer pool that can run the synth chain: voice bus, stereo
/// copy, and the block in flight.
pub const MIN_POOL_DEPTH: usize = 4;

/// Everything needed to provision and run the engine.
///
/// # TOML Format
///
/// Every field is optional; missing fields take their defaults.
///
/// ```toml
/// sample_rate = 48000
/// block_size = 256
/// output_channels = 2
/// device = "USB Audio"
/// master_volume = 0.8
///
/// [voices]
/// play_mode = "unison"
/// detune = 0.3
///
/// [envelope]
/// attack = 0.1
/// release = 0.4
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Frames per engine block.
    pub block_size: usize,
    /// Buffers preallocated in the pool.
    pub buffer_pool_depth: usize,
    /// Capacity of the control-to-audio event queue.
    pub event_queue_capacity: usize,
    /// Events drained from the queue per block.
    pub events_per_block: usize,
    /// Deferred calls that may be pending.
    pub executor_capacity: usize,
    /// Driver output channels.
    pub output_channels: u16,
    /// Output device name filter; the system default if absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Master volume, 0..1.
    pub master_volume: f32,
    /// Voice allocation and tuning.
    pub voices: VoiceSettings,
    /// Envelope controls.
    pub envelope: EnvelopeSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 256,
            buffer_pool_depth: 16,
            event_queue_capacity: 1024,
            events_per_block: 5,
            executor_capacity: 64,
            output_channels: 2,
            device: None,
            master_volume: 0.8,
            voices: VoiceSettings::default(),
            envelope: EnvelopeSettings::default(),
        }
    }
}

fn unit_range(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("must be within 0..=1, got {}", value),
        ))
    }
}

fn non_zero(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::invalid(field, "must be non-zero"))
    } else {
        Ok(())
    }
}

impl EngineConfig {
    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Load a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save the configuration, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Checks that the engine can be provisioned from this configuration.
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::invalid("sample_rate", "must be non-zero"));
        }
        non_zero("block_size", self.block_size)?;
        if self.buffer_pool_depth < MIN_POOL_DEPTH {
            return Err(ConfigError::invalid(
                "buffer_pool_depth",
                format!(
                    "must be at least {}, got {}",
                    MIN_POOL_DEPTH, self.buffer_pool_depth
                ),
            ));
        }
        non_zero("event_queue_capacity", self.event_queue_capacity)?;
        non_zero("events_per_block", self.events_per_block)?;
        non_zero("executor_capacity", self.executor_capacity)?;
        if !(1..=MAX_OUTPUT_CHANNELS).contains(&self.output_channels) {
            return Err(ConfigError::invalid(
                "output_channels",
                format!(
                    "must be within 1..={}, got {}",
                    MAX_OUTPUT_CHANNELS, self.output_channels
                ),
            ));
        }
        unit_range("master_volume", self.master_volume)?;

        let voices = &self.voices;
        unit_range("voices.rand", voices.rand)?;
        unit_range("voices.sub", voices.sub)?;
        unit_range("voices.detune", voices.detune)?;
        unit_range("voices.portamento", voices.portamento)?;
        if !(-12..=12).contains(&voices.interval) {
            return Err(ConfigError::invalid(
                "voices.interval",
                format!("must be within -12..=12 semitones, got {}", voices.interval),
            ));
        }

        let envelope = &self.envelope;
        unit_range("envelope.attack", envelope.attack)?;
        unit_range("envelope.decay", envelope.decay)?;
        unit_range("envelope.sustain", envelope.sustain)?;
        unit_range("envelope.release", envelope.release)?;
        Ok(())
    }
}
