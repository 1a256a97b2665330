//! Real-time playback of the demo phrase.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use cadenza_core::Event;
use cadenza_io::{AudioBackend, BackendStreamConfig, CpalBackend};
use clap::Args;

use super::common::{EngineArgs, build_engine};
use crate::phrase::{self, LENGTH_SECS};

#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Output device (partial name, case-insensitive)
    #[arg(short, long)]
    device: Option<String>,

    /// Play the phrase once instead of looping
    #[arg(long)]
    once: bool,

    #[command(flatten)]
    engine: EngineArgs,
}

pub fn run(args: PlayArgs) -> anyhow::Result<()> {
    let config = args.engine.load()?;
    let backend = CpalBackend::new();
    let stream_config = BackendStreamConfig {
        sample_rate: config.sample_rate,
        buffer_size: u32::try_from(config.block_size)?,
        channels: config.output_channels,
        device_name: args.device.or_else(|| config.device.clone()),
    };
    let sample_rate = backend.actual_sample_rate(&stream_config);

    let (mut handle, mut engine) = build_engine(&config, sample_rate);
    let channels = usize::from(config.output_channels);
    let _stream = backend.build_output_stream(
        &stream_config,
        Box::new(move |buffer: &mut [f32]| engine.process(buffer, channels)),
        Box::new(|err: &str| tracing::error!(err, "output stream error")),
    )?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    println!(
        "Playing in {} mode{}... Press Ctrl+C to stop.",
        config.voices.play_mode,
        if args.once { "" } else { " (looping)" }
    );

    'outer: loop {
        let start = Instant::now();
        for cue in phrase::cues() {
            let due = start + Duration::from_secs_f32(cue.at);
            while Instant::now() < due {
                if !running.load(Ordering::SeqCst) {
                    break 'outer;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            if !handle.enqueue(cue.event) {
                tracing::warn!(event = ?cue.event, "event queue full, cue dropped");
            }
        }
        let end = start + Duration::from_secs_f32(LENGTH_SECS);
        while Instant::now() < end {
            if !running.load(Ordering::SeqCst) {
                break 'outer;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        if args.once {
            break;
        }
    }

    println!("\nStopping...");
    handle.enqueue(Event::AllNotesOff);
    if !handle.wait_for_blocks(2, Duration::from_millis(500)) {
        tracing::warn!("audio stream stopped advancing");
    }
    if handle.dropped_events() > 0 {
        tracing::warn!(dropped = handle.dropped_events(), "events dropped during playback");
    }
    Ok(())
}
