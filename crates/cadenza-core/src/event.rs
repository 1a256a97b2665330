//! Performance events and the per-block shared event sequence.
//!
//! [`Event`] is the immutable message that travels from control threads to
//! the audio thread. Within a block, the audio thread collects the dequeued
//! events into an [`EventBlock`] and hands every pipeline stage the same
//! reference-counted snapshot ([`SharedEvents`]), so downstream stages see
//! an identical sequence without copying it.

use core::ops::Deref;
use std::sync::Arc;

/// Controller number of the sustain (damper) pedal.
pub const CC_SUSTAIN: u8 = 0x40;

/// Controller number of the "all notes off" channel mode message.
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// Centre value of a 14-bit pitch bend message.
pub const PITCH_BEND_CENTER: u16 = 8192;

/// A performance event.
///
/// Key and controller numbers follow MIDI 1.0 conventions: 7-bit values for
/// keys, velocities and controllers, 14-bit values for pitch bend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A key was pressed.
    NoteOn {
        /// Key number (0-127).
        key: u8,
        /// Strike velocity (1-127).
        velocity: u8,
    },
    /// A key was released.
    NoteOff {
        /// Key number (0-127).
        key: u8,
    },
    /// A continuous controller changed.
    ControlChange {
        /// Controller number (0-127).
        controller: u8,
        /// New value (0-127).
        value: u8,
    },
    /// The pitch wheel moved.
    PitchBend {
        /// Wheel position (0-16383, centre 8192).
        value: u16,
    },
    /// Channel pressure.
    Aftertouch {
        /// Pressure (0-127).
        value: u8,
    },
    /// A program (patch) was selected.
    ProgramChange {
        /// Program number (0-127).
        program: u8,
    },
    /// Every sounding note should be released.
    AllNotesOff,
}

impl Event {
    /// Decodes a raw MIDI 1.0 channel voice message.
    ///
    /// The channel nibble is ignored. A NoteOn with zero velocity decodes as
    /// [`Event::NoteOff`], and controller 123 decodes as
    /// [`Event::AllNotesOff`]. Returns `None` for system messages and for
    /// truncated input.
    ///
    /// ```rust
    /// use cadenza_core::Event;
    ///
    /// assert_eq!(
    ///     Event::from_midi_bytes(&[0x91, 60, 100]),
    ///     Some(Event::NoteOn { key: 60, velocity: 100 })
    /// );
    /// assert_eq!(
    ///     Event::from_midi_bytes(&[0xE0, 0x00, 0x40]),
    ///     Some(Event::PitchBend { value: 8192 })
    /// );
    /// ```
    pub fn from_midi_bytes(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        let data1 = || data.first().map(|b| b & 0x7F);
        let data2 = || data.get(1).map(|b| b & 0x7F);

        match status & 0xF0 {
            0x80 => Some(Self::NoteOff { key: data1()? }),
            0x90 => {
                let key = data1()?;
                match data2()? {
                    0 => Some(Self::NoteOff { key }),
                    velocity => Some(Self::NoteOn { key, velocity }),
                }
            }
            0xB0 => {
                let controller = data1()?;
                let value = data2()?;
                if controller == CC_ALL_NOTES_OFF {
                    Some(Self::AllNotesOff)
                } else {
                    Some(Self::ControlChange { controller, value })
                }
            }
            0xC0 => Some(Self::ProgramChange { program: data1()? }),
            0xD0 => Some(Self::Aftertouch { value: data1()? }),
            0xE0 => {
                let lsb = u16::from(data1()?);
                let msb = u16::from(data2()?);
                Some(Self::PitchBend {
                    value: (msb << 7) | lsb,
                })
            }
            _ => None,
        }
    }

    /// Returns true for events that start or stop a note.
    pub fn is_note(&self) -> bool {
        matches!(self, Self::NoteOn { .. } | Self::NoteOff { .. })
    }
}

/// Immutable, reference-counted snapshot of one block's events.
///
/// Cloning is a reference-count increment. An empty snapshot holds no
/// allocation at all.
#[derive(Debug, Clone, Default)]
pub struct SharedEvents(Option<Arc<Vec<Event>>>);

impl SharedEvents {
    /// Returns an empty snapshot.
    pub fn empty() -> Self {
        Self(None)
    }

    /// Returns true if both snapshots refer to the same storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Deref for SharedEvents {
    type Target = [Event];

    fn deref(&self) -> &[Event] {
        match &self.0 {
            Some(events) => events.as_slice(),
            None => &[],
        }
    }
}

impl From<Vec<Event>> for SharedEvents {
    fn from(events: Vec<Event>) -> Self {
        if events.is_empty() {
            Self(None)
        } else {
            Self(Some(Arc::new(events)))
        }
    }
}

/// Audio-thread builder for the per-block [`SharedEvents`] snapshot.
///
/// The block owns pre-reserved storage and reuses it from block to block.
/// If a stage kept the previous snapshot alive past its block, the storage
/// cannot be reclaimed and a fresh vector is allocated instead.
#[derive(Debug)]
pub struct EventBlock {
    current: Arc<Vec<Event>>,
    capacity: usize,
}

impl EventBlock {
    /// Creates a block that holds at most `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            current: Arc::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Maximum number of events per block.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events collected so far.
    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// Returns true if no event has been collected.
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Starts a new block, discarding the previous events.
    pub fn clear(&mut self) {
        if let Some(events) = Arc::get_mut(&mut self.current) {
            events.clear();
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!("event snapshot outlived its block, reallocating event storage");
            self.current = Arc::new(Vec::with_capacity(self.capacity));
        }
    }

    /// Appends an event. Returns false if the block is full or a snapshot
    /// of it is still alive.
    pub fn push(&mut self, event: Event) -> bool {
        match Arc::get_mut(&mut self.current) {
            Some(events) if events.len() < self.capacity => {
                events.push(event);
                true
            }
            _ => false,
        }
    }

    /// Returns the collected events as a shared snapshot.
    pub fn snapshot(&self) -> SharedEvents {
        if self.current.is_empty() {
            SharedEvents::empty()
        } else {
            SharedEvents(Some(Arc::clone(&self.current)))
        }
    }
}
