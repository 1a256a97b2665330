//! Offline rendering of the demo phrase.

use std::path::PathBuf;

use cadenza_io::{AudioEngine, AudioHandle, OfflineBackend, WavSpec, write_wav};
use clap::Args;

use super::common::{EngineArgs, build_engine};
use crate::phrase::{self, LENGTH_SECS};

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Output WAV file
    #[arg(short, long, value_name = "FILE")]
    out: PathBuf,

    /// Seconds to render (default: the phrase plus a one-second tail)
    #[arg(short, long)]
    seconds: Option<f32>,

    #[command(flatten)]
    engine: EngineArgs,
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let config = args.engine.load()?;
    let seconds = args.seconds.unwrap_or(LENGTH_SECS + 1.0);
    if !(seconds > 0.0 && seconds.is_finite()) {
        anyhow::bail!("--seconds must be positive, got {}", seconds);
    }

    let (mut handle, mut engine) = build_engine(&config, config.sample_rate);
    let channels = usize::from(config.output_channels);
    let frames = phrase::frame_of(seconds, config.sample_rate);

    println!(
        "Rendering {:.1}s in {} mode to {}",
        seconds,
        config.voices.play_mode,
        args.out.display()
    );
    let backend = OfflineBackend::new(config.block_size, channels);
    let samples = render_phrase(&backend, &mut handle, &mut engine, config.sample_rate, frames);

    let spec = WavSpec {
        channels: config.output_channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 32,
    };
    write_wav(&args.out, &samples, spec)?;

    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    println!("Wrote {} frames, peak {:.3}", frames, peak);
    Ok(())
}

/// Renders `frames` frames, enqueuing each cue as its time is reached.
///
/// Cues land on the first engine block that starts at or after their time.
pub fn render_phrase(
    backend: &OfflineBackend,
    handle: &mut AudioHandle,
    engine: &mut AudioEngine,
    sample_rate: u32,
    frames: usize,
) -> Vec<f32> {
    let channels = backend.channels();
    let mut output = Vec::with_capacity(frames * channels);
    let mut rendered = 0;

    for cue in phrase::cues() {
        let at = phrase::frame_of(cue.at, sample_rate).min(frames);
        if at > rendered {
            output.extend(backend.render(engine, at - rendered));
            rendered = at;
        }
        if at < frames && !handle.enqueue(cue.event) {
            tracing::warn!(event = ?cue.event, "event queue full, cue dropped");
        }
    }
    if frames > rendered {
        output.extend(backend.render(engine, frames - rendered));
    }
    output
}
