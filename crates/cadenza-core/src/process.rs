//! The per-stage data carrier passed through the processing pipeline.
//!
//! [`ProcessData<N>`] bundles `N` audio buffer handles (0 = events only,
//! 1 = mono, 2 = stereo), the block's [`SharedEvents`] snapshot and a
//! [`ClockRange`]. Each stage consumes one and returns another, usually by
//! rebinding the channel arrangement with [`ProcessData::with`]. Every
//! operation is zero-copy over the sample data.
//!
//! ```rust
//! use cadenza_core::{AudioBufferPool, ClockRange, ProcessData, SharedEvents};
//!
//! let pool = AudioBufferPool::new(4, 32);
//! let input = ProcessData::new(SharedEvents::empty(), ClockRange::new(0, 32));
//!
//! let mono = input.with([pool.allocate_cleared()]);
//! let stereo = mono.with(pool.allocate_multi::<2>());
//! assert_eq!(stereo.nframes(), 32);
//!
//! let tail = stereo.slice(16, -1);
//! assert_eq!(tail.nframes(), 16);
//! assert_eq!(tail.clock().position, 16);
//! ```

use crate::buffer::AudioBufferHandle;
use crate::event::SharedEvents;

/// Frame range covered by a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockRange {
    /// Absolute position of the first frame since the stream started.
    pub position: u64,
    /// Number of frames in the range.
    pub nframes: usize,
}

impl ClockRange {
    /// Creates a range of `nframes` frames starting at `position`.
    pub fn new(position: u64, nframes: usize) -> Self {
        Self { position, nframes }
    }

    /// Position one past the last frame.
    pub fn end(&self) -> u64 {
        self.position + self.nframes as u64
    }

    /// Returns the range that immediately follows this one, with the same
    /// length.
    pub fn next(&self) -> Self {
        Self::new(self.end(), self.nframes)
    }

    /// Returns the sub-range of `len` frames starting `index` frames in.
    pub fn slice(&self, index: usize, len: usize) -> Self {
        Self::new(self.position + index as u64, len)
    }
}

/// Audio buffers, shared events and clock for one pipeline stage.
#[derive(Debug)]
pub struct ProcessData<const N: usize> {
    audio: [AudioBufferHandle; N],
    events: SharedEvents,
    clock: ClockRange,
}

impl ProcessData<0> {
    /// Creates event-only process data for a block.
    pub fn new(events: SharedEvents, clock: ClockRange) -> Self {
        Self {
            audio: [],
            events,
            clock,
        }
    }
}

impl<const N: usize> ProcessData<N> {
    /// Assembles process data from its parts.
    ///
    /// # Panics
    ///
    /// Panics if any buffer length differs from `clock.nframes`.
    pub fn from_parts(
        audio: [AudioBufferHandle; N],
        events: SharedEvents,
        clock: ClockRange,
    ) -> Self {
        for (channel, buf) in audio.iter().enumerate() {
            assert_eq!(
                buf.len(),
                clock.nframes,
                "channel {} has {} frames, block has {}",
                channel,
                buf.len(),
                clock.nframes
            );
        }
        Self {
            audio,
            events,
            clock,
        }
    }

    /// Splits the process data into its parts.
    pub fn into_parts(self) -> ([AudioBufferHandle; N], SharedEvents, ClockRange) {
        (self.audio, self.events, self.clock)
    }

    /// Number of frames in this block (or slice).
    #[inline]
    pub fn nframes(&self) -> usize {
        self.clock.nframes
    }

    /// Clock range of this block.
    pub fn clock(&self) -> ClockRange {
        self.clock
    }

    /// Events shared by every stage of this block.
    pub fn events(&self) -> &SharedEvents {
        &self.events
    }

    /// The channel buffers.
    pub fn audio(&self) -> &[AudioBufferHandle; N] {
        &self.audio
    }

    /// Mutable access to the channel buffers.
    pub fn audio_mut(&mut self) -> &mut [AudioBufferHandle; N] {
        &mut self.audio
    }

    /// Read-only sample slices, one per channel.
    pub fn raw_buffers(&self) -> [&[f32]; N] {
        core::array::from_fn(|i| self.audio[i].as_slice())
    }

    /// Rebinds the channel arrangement, keeping events and clock.
    ///
    /// The buffers previously held are released.
    ///
    /// # Panics
    ///
    /// Panics if a new buffer's length differs from [`nframes`](Self::nframes).
    pub fn with<const M: usize>(self, audio: [AudioBufferHandle; M]) -> ProcessData<M> {
        ProcessData::from_parts(audio, self.events, self.clock)
    }

    /// Rebinds to a single mono buffer.
    pub fn with_mono(self, audio: AudioBufferHandle) -> ProcessData<1> {
        self.with([audio])
    }

    /// Drops the audio, keeping events and clock.
    pub fn midi_only(self) -> ProcessData<0> {
        ProcessData {
            audio: [],
            events: self.events,
            clock: self.clock,
        }
    }

    /// Drops the events, keeping audio and clock.
    pub fn audio_only(self) -> Self {
        Self {
            audio: self.audio,
            events: SharedEvents::empty(),
            clock: self.clock,
        }
    }

    /// Returns a view of `length` frames starting at `index`, sharing the
    /// sample storage. A negative `length` selects everything up to the end.
    ///
    /// # Panics
    ///
    /// Panics unless `index < nframes` and `index + length <= nframes`.
    pub fn slice(&self, index: usize, length: isize) -> Self {
        let nframes = self.nframes();
        assert!(
            index < nframes,
            "slice index {} out of range for {} frames",
            index,
            nframes
        );
        let length = usize::try_from(length).unwrap_or(nframes - index);
        assert!(
            index + length <= nframes,
            "slice {}..{} out of range for {} frames",
            index,
            index + length,
            nframes
        );
        Self {
            audio: core::array::from_fn(|i| self.audio[i].slice(index, length)),
            events: self.events.clone(),
            clock: self.clock.slice(index, length),
        }
    }
}

impl ProcessData<1> {
    /// The mono buffer.
    pub fn buffer(&self) -> &AudioBufferHandle {
        &self.audio[0]
    }

    /// Mutable access to the mono buffer.
    pub fn buffer_mut(&mut self) -> &mut AudioBufferHandle {
        &mut self.audio[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::AudioBufferPool;
    use crate::event::{Event, EventBlock};

    fn block_events() -> SharedEvents {
        let mut block = EventBlock::with_capacity(4);
        block.push(Event::NoteOn {
            key: 60,
            velocity: 100,
        });
        block.snapshot()
    }

    fn ramp(pool: &AudioBufferPool) -> AudioBufferHandle {
        let mut buf = pool.allocate();
        for (i, s) in buf.make_mut().iter_mut().enumerate() {
            *s = i as f32;
        }
        buf
    }

    #[test]
    fn test_with_keeps_events_and_clock() {
        let pool = AudioBufferPool::new(4, 16);
        let events = block_events();
        let data = ProcessData::new(events.clone(), ClockRange::new(100, 16));

        let mono = data.with_mono(pool.allocate());
        assert!(mono.events().ptr_eq(&events));
        assert_eq!(mono.clock(), ClockRange::new(100, 16));
        assert_eq!(mono.nframes(), 16);
    }

    #[test]
    fn test_rebind_releases_previous_buffers() {
        let pool = AudioBufferPool::new(4, 16);
        let data = ProcessData::new(SharedEvents::empty(), ClockRange::new(0, 16));
        let stereo = data.with(pool.allocate_multi::<2>());
        assert_eq!(pool.in_use(), 2);

        let mono = stereo.with_mono(pool.allocate());
        assert_eq!(pool.in_use(), 1);
        drop(mono);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    #[should_panic]
    fn test_with_mismatched_length_panics() {
        let pool = AudioBufferPool::new(1, 16);
        let data = ProcessData::new(SharedEvents::empty(), ClockRange::new(0, 8));
        let _ = data.with_mono(pool.allocate());
    }

    #[test]
    fn test_midi_only_and_audio_only() {
        let pool = AudioBufferPool::new(2, 8);
        let data = ProcessData::new(block_events(), ClockRange::new(0, 8)).with_mono(pool.allocate());

        let audio = data.audio_only();
        assert!(audio.events().is_empty());
        assert_eq!(pool.in_use(), 1);

        let midi = ProcessData::new(block_events(), ClockRange::new(0, 8))
            .with_mono(pool.allocate())
            .midi_only();
        assert_eq!(midi.events().len(), 1);
        assert_eq!(midi.nframes(), 8);
        assert_eq!(pool.in_use(), 1, "midi_only releases its buffer");
    }

    #[test]
    fn test_slice_matches_parent_range() {
        let pool = AudioBufferPool::new(2, 16);
        let data = ProcessData::new(SharedEvents::empty(), ClockRange::new(32, 16))
            .with([ramp(&pool), ramp(&pool)]);

        let part = data.slice(4, 6);
        assert_eq!(part.nframes(), 6);
        assert_eq!(part.clock(), ClockRange::new(36, 6));
        for ch in 0..2 {
            assert_eq!(part.audio()[ch].as_slice(), &data.audio()[ch][4..10]);
        }
        assert_eq!(pool.in_use(), 2, "slicing does not allocate");
    }

    #[test]
    fn test_slice_negative_length_runs_to_end() {
        let pool = AudioBufferPool::new(1, 16);
        let data = ProcessData::new(SharedEvents::empty(), ClockRange::new(0, 16))
            .with_mono(ramp(&pool));
        let tail = data.slice(10, -1);
        assert_eq!(tail.nframes(), 6);
        assert_eq!(tail.buffer()[0], 10.0);
    }

    #[test]
    #[should_panic]
    fn test_slice_index_out_of_range_panics() {
        let data = ProcessData::new(SharedEvents::empty(), ClockRange::new(0, 16));
        let _ = data.slice(16, 0);
    }

    #[test]
    #[should_panic]
    fn test_slice_length_out_of_range_panics() {
        let data = ProcessData::new(SharedEvents::empty(), ClockRange::new(0, 16));
        let _ = data.slice(8, 9);
    }

    #[test]
    fn test_raw_buffers() {
        let pool = AudioBufferPool::new(2, 4);
        let data = ProcessData::new(SharedEvents::empty(), ClockRange::new(0, 4))
            .with([ramp(&pool), pool.allocate_cleared()]);
        let [l, r] = data.raw_buffers();
        assert_eq!(l, &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(r, &[0.0; 4]);
    }

    #[test]
    fn test_clock_range_next() {
        let clock = ClockRange::new(256, 128);
        assert_eq!(clock.end(), 384);
        assert_eq!(clock.next(), ClockRange::new(384, 128));
    }
}
