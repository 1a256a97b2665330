//! Composition root shared by the render and play commands.
//!
//! The only place where the pool, queues, voice manager and synth chain are
//! constructed and wired together.

use std::path::{Path, PathBuf};

use cadenza_config::{EngineConfig, MAX_OUTPUT_CHANNELS, PlayMode, default_config_path};
use cadenza_io::{AudioEngine, AudioHandle, EngineOptions, SynthChain};
use cadenza_voices::{SineVoice, VoiceManager};
use clap::Args;

/// Voices in the demo synth.
pub const VOICES: usize = 8;

/// Options shared by every command that runs the engine.
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Configuration file (defaults to the user config, if present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the play mode: poly, mono, unison or interval
    #[arg(short, long)]
    pub mode: Option<PlayMode>,
}

impl EngineArgs {
    /// Loads, overrides and validates the configuration.
    pub fn load(&self) -> anyhow::Result<EngineConfig> {
        let mut config = load_config(self.config.as_deref())?;
        if let Some(mode) = self.mode {
            config.voices.play_mode = mode;
        }
        config.validate()?;
        Ok(config)
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    if let Some(path) = path {
        tracing::info!(path = %path.display(), "loading config");
        return Ok(EngineConfig::load(path)?);
    }
    let default = default_config_path();
    if default.exists() {
        tracing::info!(path = %default.display(), "loading user config");
        Ok(EngineConfig::load(&default)?)
    } else {
        Ok(EngineConfig::default())
    }
}

/// Engine sizing from the configuration.
pub fn engine_options(config: &EngineConfig) -> EngineOptions {
    EngineOptions {
        block_size: config.block_size,
        buffer_pool_depth: config.buffer_pool_depth,
        event_queue_capacity: config.event_queue_capacity,
        events_per_block: config.events_per_block,
        executor_capacity: config.executor_capacity,
        max_channels: usize::from(MAX_OUTPUT_CHANNELS),
    }
}

/// Builds the engine with the demo synth chain installed.
pub fn build_engine(config: &EngineConfig, sample_rate: u32) -> (AudioHandle, AudioEngine) {
    let (handle, mut engine) = AudioEngine::new(&engine_options(config));
    let sr = sample_rate as f32;
    let voices: VoiceManager<SineVoice, VOICES> = VoiceManager::with_settings(
        sr,
        engine.pool().clone(),
        config.voices.clone(),
        config.envelope.clone(),
        |_| SineVoice::new(sr),
    );
    engine
        .state_mut()
        .set_process_callback(SynthChain::new(voices, config.master_volume).into_callback());

    tracing::info!(
        mode = %config.voices.play_mode,
        voices = VOICES,
        sample_rate,
        block_size = config.block_size,
        "engine ready"
    );
    (handle, engine)
}
