//! Configuration for the cadenza engine.
//!
//! A single TOML file sizes the engine's preallocated resources and carries
//! the initial voice and envelope settings:
//!
//! - **[`EngineConfig`]**: load, save and validate
//! - **[`paths`]**: platform config directories
//!
//! # Example
//!
//! ```rust,no_run
//! use cadenza_config::{EngineConfig, paths};
//!
//! let path = paths::default_config_path();
//! let config = if path.exists() {
//!     EngineConfig::load(&path).unwrap()
//! } else {
//!     EngineConfig::default()
//! };
//! config.validate().unwrap();
//! ```

mod engine_config;
mod error;

/// Platform-specific configuration paths.
pub mod paths;

pub use engine_config::{EngineConfig, MAX_OUTPUT_CHANNELS, MIN_POOL_DEPTH};
pub use error::ConfigError;
pub use paths::{default_config_path, ensure_user_config_dir, user_config_dir};

/// Re-exported so callers can build configurations without depending on
/// `cadenza-voices` directly.
pub use cadenza_voices::{EnvelopeSettings, PlayMode, VoiceSettings};
