//! The per-block callback loop and its control-thread handle.
//!
//! Per engine block, on the audio thread:
//!
//! 1. drain at most `events_per_block` queued events through the
//!    [`MidiHandler`] into the block's event snapshot
//! 2. call the process callback, or write silence if none is registered
//! 3. run every executor call queued since the previous block
//!
//! Driver buffers need not match the engine block size. Whole engine blocks
//! are rendered into a carry buffer and copied out, so each driver call is
//! always completely filled.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use cadenza_core::iter::interleave_stereo;
use cadenza_core::{
    AudioBufferPool, ClockRange, Event, EventBlock, EventReceiver, EventSender, Executor,
    ExecutorHandle, ProcessData, event_queue, executor,
};

/// The registered block processor: events in, stereo audio out.
pub type ProcessCallback = Box<dyn FnMut(ProcessData<0>) -> ProcessData<2> + Send>;

/// Translates dequeued events into the events the process callback sees.
pub trait MidiHandler: Send {
    /// Handles one dequeued event, pushing zero or more events into `out`.
    fn handle(&mut self, event: Event, out: &mut EventBlock);
}

/// Passes every event through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForwardingHandler;

impl MidiHandler for ForwardingHandler {
    fn handle(&mut self, event: Event, out: &mut EventBlock) {
        out.push(event);
    }
}

/// Audio-side state that control code may replace through the executor.
pub struct EngineState {
    process: Option<ProcessCallback>,
    midi: Box<dyn MidiHandler>,
}

impl EngineState {
    /// Installs the process callback.
    pub fn set_process_callback(&mut self, callback: ProcessCallback) {
        self.process = Some(callback);
    }

    /// Removes the process callback; the engine outputs silence.
    pub fn clear_process_callback(&mut self) {
        self.process = None;
    }

    /// Installs the MIDI handler.
    pub fn set_midi_handler(&mut self, handler: Box<dyn MidiHandler>) {
        self.midi = handler;
    }

    /// True if a process callback is installed.
    pub fn has_process_callback(&self) -> bool {
        self.process.is_some()
    }
}

/// Sizing of the engine's preallocated resources.
///
/// ## Fields
///
/// - `block_size`: Frames per engine block (default: 256)
/// - `buffer_pool_depth`: Buffers in the pool (default: 16)
/// - `event_queue_capacity`: Control-to-audio event slots (default: 1024)
/// - `events_per_block`: Events drained per block (default: 5)
/// - `executor_capacity`: Deferred calls that may be pending (default: 64)
/// - `max_channels`: Widest driver layout supported (default: 8)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Frames per engine block.
    pub block_size: usize,
    /// Buffers in the pool.
    pub buffer_pool_depth: usize,
    /// Event queue capacity.
    pub event_queue_capacity: usize,
    /// Events drained per block.
    pub events_per_block: usize,
    /// Executor queue capacity.
    pub executor_capacity: usize,
    /// Widest output layout the carry buffer is sized for.
    pub max_channels: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            block_size: 256,
            buffer_pool_depth: 16,
            event_queue_capacity: 1024,
            events_per_block: 5,
            executor_capacity: 64,
            max_channels: 8,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    blocks: AtomicU64,
}

/// Control-thread side of the engine.
pub struct AudioHandle {
    events: EventSender,
    executor: ExecutorHandle<EngineState>,
    shared: Arc<Shared>,
}

impl AudioHandle {
    /// Queues an event for the audio thread. Returns `false` if the queue
    /// was full and the event was dropped.
    pub fn enqueue(&mut self, event: Event) -> bool {
        self.events.enqueue(event)
    }

    /// Schedules `f` to run on the audio thread after the next block.
    /// Returns `false` if the executor queue was full.
    pub fn execute(&self, f: impl FnOnce(&mut EngineState) + Send + 'static) -> bool {
        self.executor.execute(f)
    }

    /// Replaces the process callback between blocks.
    pub fn set_process_callback(
        &self,
        callback: impl FnMut(ProcessData<0>) -> ProcessData<2> + Send + 'static,
    ) -> bool {
        let callback: ProcessCallback = Box::new(callback);
        self.execute(move |state| state.set_process_callback(callback))
    }

    /// Replaces the MIDI handler between blocks.
    pub fn set_midi_handler(&self, handler: impl MidiHandler + 'static) -> bool {
        let handler: Box<dyn MidiHandler> = Box::new(handler);
        self.execute(move |state| state.set_midi_handler(handler))
    }

    /// Engine blocks rendered so far.
    pub fn block_count(&self) -> u64 {
        self.shared.blocks.load(Ordering::Acquire)
    }

    /// Waits until `n` more blocks have been rendered. Returns `false` on
    /// timeout.
    pub fn wait_for_blocks(&self, n: u64, timeout: Duration) -> bool {
        let target = self.block_count() + n;
        let deadline = Instant::now() + timeout;
        while self.block_count() < target {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }

    /// Events dropped because the queue was full.
    pub fn dropped_events(&self) -> u64 {
        self.events.dropped()
    }
}

/// Audio-thread side of the engine.
pub struct AudioEngine {
    pool: AudioBufferPool,
    events: EventReceiver,
    event_block: EventBlock,
    executor: Executor<EngineState>,
    state: EngineState,
    shared: Arc<Shared>,
    block_size: usize,
    events_per_block: usize,
    max_channels: usize,
    position: u64,
    carry: Vec<f32>,
    carry_len: usize,
    carry_pos: usize,
    carry_channels: usize,
}

impl AudioEngine {
    /// Creates the engine and its control handle.
    ///
    /// # Panics
    ///
    /// Panics if any size in `options` is zero.
    pub fn new(options: &EngineOptions) -> (AudioHandle, AudioEngine) {
        assert!(options.block_size > 0, "block size must be non-zero");
        assert!(options.max_channels > 0, "max channels must be non-zero");
        assert!(
            options.events_per_block > 0,
            "events per block must be non-zero"
        );

        let (tx, rx) = event_queue(options.event_queue_capacity);
        let (exec_handle, exec) = executor(options.executor_capacity);
        let shared = Arc::new(Shared::default());

        let handle = AudioHandle {
            events: tx,
            executor: exec_handle,
            shared: Arc::clone(&shared),
        };
        let engine = AudioEngine {
            pool: AudioBufferPool::new(options.buffer_pool_depth, options.block_size),
            events: rx,
            event_block: EventBlock::with_capacity(options.events_per_block),
            executor: exec,
            state: EngineState {
                process: None,
                midi: Box::new(ForwardingHandler),
            },
            shared,
            block_size: options.block_size,
            events_per_block: options.events_per_block,
            max_channels: options.max_channels,
            position: 0,
            carry: vec![0.0; options.block_size * options.max_channels],
            carry_len: 0,
            carry_pos: 0,
            carry_channels: 0,
        };
        tracing::debug!(
            block_size = options.block_size,
            pool = options.buffer_pool_depth,
            "audio engine created"
        );
        (handle, engine)
    }

    /// The engine's buffer pool.
    pub fn pool(&self) -> &AudioBufferPool {
        &self.pool
    }

    /// Frames per engine block.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Frame position of the next block.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Audio-side state, for installing callbacks before streaming starts.
    pub fn state_mut(&mut self) -> &mut EngineState {
        &mut self.state
    }

    /// Fills an interleaved driver buffer of `channels` channels.
    ///
    /// Always writes every sample of `output`.
    pub fn process(&mut self, output: &mut [f32], channels: usize) {
        if channels == 0 || channels > self.max_channels {
            tracing::error!(channels, max = self.max_channels, "unsupported channel count");
            output.fill(0.0);
            return;
        }
        if channels != self.carry_channels {
            self.carry_channels = channels;
            self.carry_len = 0;
            self.carry_pos = 0;
        }

        let mut written = 0;
        while written < output.len() {
            if self.carry_pos == self.carry_len {
                self.render_block(channels);
            }
            let n = (self.carry_len - self.carry_pos).min(output.len() - written);
            output[written..written + n]
                .copy_from_slice(&self.carry[self.carry_pos..self.carry_pos + n]);
            self.carry_pos += n;
            written += n;
        }
    }

    fn render_block(&mut self, channels: usize) {
        self.event_block.clear();
        let midi = &mut self.state.midi;
        let block = &mut self.event_block;
        self.events
            .drain_bounded(self.events_per_block, |event| midi.handle(event, block));

        let frames = self.block_size * channels;
        let out = &mut self.carry[..frames];
        let clock = ClockRange::new(self.position, self.block_size);
        match self.state.process.as_mut() {
            Some(callback) => {
                let data = callback(ProcessData::new(self.event_block.snapshot(), clock));
                let [left, right] = data.raw_buffers();
                if left.len() < self.block_size {
                    out.fill(0.0);
                }
                interleave_stereo(left, right, out, channels);
            }
            None => out.fill(0.0),
        }

        self.executor.run_queued(&mut self.state);

        self.position += self.block_size as u64;
        self.carry_len = frames;
        self.carry_pos = 0;
        self.shared.blocks.fetch_add(1, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(block_size: usize) -> EngineOptions {
        EngineOptions {
            block_size,
            ..Default::default()
        }
    }

    /// Callback writing a constant to both channels.
    fn constant(pool: AudioBufferPool, value: f32) -> ProcessCallback {
        Box::new(move |data: ProcessData<0>| {
            let mut bufs = pool.allocate_multi::<2>();
            for buf in &mut bufs {
                buf.make_mut().fill(value);
            }
            data.with(bufs)
        })
    }

    #[test]
    fn test_silence_without_callback() {
        let (_handle, mut engine) = AudioEngine::new(&options(64));
        let mut out = vec![1.0f32; 128];
        engine.process(&mut out, 2);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_callback_installed_via_executor_runs_next_block() {
        let (handle, mut engine) = AudioEngine::new(&options(64));
        let pool = engine.pool().clone();
        handle.execute(move |state| state.set_process_callback(constant(pool, 0.5)));

        let mut out = vec![0.0f32; 128];
        engine.process(&mut out, 2);
        assert!(out.iter().all(|&s| s == 0.0), "first block renders before the executor");

        engine.process(&mut out, 2);
        assert!(out.iter().all(|&s| s == 0.5));
        assert_eq!(handle.block_count(), 2);
    }

    #[test]
    fn test_odd_driver_sizes_are_filled() {
        let (_handle, mut engine) = AudioEngine::new(&options(64));
        let pool = engine.pool().clone();
        engine.state_mut().set_process_callback(constant(pool, 0.25));

        for size in [1, 37, 128, 200, 3] {
            let mut out = vec![0.0f32; size * 2];
            engine.process(&mut out, 2);
            assert!(out.iter().all(|&s| s == 0.25), "driver size {}", size);
        }
    }

    #[test]
    fn test_events_drained_per_block() {
        let (mut handle, mut engine) = AudioEngine::new(&EngineOptions {
            block_size: 16,
            events_per_block: 2,
            ..Default::default()
        });
        let seen = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&seen);
        let pool = engine.pool().clone();
        engine
            .state_mut()
            .set_process_callback(Box::new(move |data: ProcessData<0>| {
                counter.fetch_add(data.events().len() as u64, Ordering::Relaxed);
                assert!(data.events().len() <= 2);
                data.with(pool.allocate_multi::<2>())
            }));

        for key in 0..5 {
            handle.enqueue(Event::NoteOn { key, velocity: 1 });
        }
        let mut out = vec![0.0f32; 32];
        engine.process(&mut out, 2);
        assert_eq!(seen.load(Ordering::Relaxed), 2);
        engine.process(&mut out, 2);
        engine.process(&mut out, 2);
        assert_eq!(seen.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_midi_handler_translates() {
        struct Octave;
        impl MidiHandler for Octave {
            fn handle(&mut self, event: Event, out: &mut EventBlock) {
                if let Event::NoteOn { key, velocity } = event {
                    out.push(Event::NoteOn {
                        key: key + 12,
                        velocity,
                    });
                }
            }
        }

        let (mut handle, mut engine) = AudioEngine::new(&options(16));
        engine.state_mut().set_midi_handler(Box::new(Octave));
        let last = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&last);
        let pool = engine.pool().clone();
        engine
            .state_mut()
            .set_process_callback(Box::new(move |data: ProcessData<0>| {
                if let Some(Event::NoteOn { key, .. }) = data.events().first() {
                    seen.store(u64::from(*key), Ordering::Relaxed);
                }
                data.with(pool.allocate_multi::<2>())
            }));

        handle.enqueue(Event::NoteOn {
            key: 60,
            velocity: 100,
        });
        handle.enqueue(Event::NoteOff { key: 60 });
        let mut out = vec![0.0f32; 32];
        engine.process(&mut out, 2);
        assert_eq!(last.load(Ordering::Relaxed), 72);
    }

    #[test]
    fn test_mono_driver_gets_average() {
        let (_handle, mut engine) = AudioEngine::new(&options(16));
        let pool = engine.pool().clone();
        engine
            .state_mut()
            .set_process_callback(Box::new(move |data: ProcessData<0>| {
                let [mut l, mut r] = pool.allocate_multi::<2>();
                l.make_mut().fill(1.0);
                r.make_mut().fill(0.0);
                data.with([l, r])
            }));
        let mut out = vec![0.0f32; 16];
        engine.process(&mut out, 1);
        assert!(out.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_unsupported_channels_output_silence() {
        let (_handle, mut engine) = AudioEngine::new(&EngineOptions {
            max_channels: 2,
            ..Default::default()
        });
        let mut out = vec![1.0f32; 12];
        engine.process(&mut out, 3);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_position_advances_per_block() {
        let (_handle, mut engine) = AudioEngine::new(&options(32));
        let mut out = vec![0.0f32; 64 * 2];
        engine.process(&mut out, 2);
        assert_eq!(engine.position(), 64);
    }
}
