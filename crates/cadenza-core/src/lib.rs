//! Cadenza Core - real-time data carriers for the cadenza audio engine
//!
//! This crate provides the pieces that move audio and performance events
//! through a hard real-time audio callback. Nothing in the steady-state
//! audio path allocates, locks or blocks: all storage is sized up front.
//!
//! # Core Abstractions
//!
//! ## Buffers
//!
//! - [`AudioBufferPool`] - Fixed-capacity pool of block-sized sample buffers
//! - [`AudioBufferHandle`] - Reference-counted, sliceable view of a pool buffer
//!
//! ## Process Data
//!
//! - [`ProcessData`] - Channel-count-parameterized carrier passed between stages
//! - [`ClockRange`] - Frame range covered by a block
//!
//! ## Events
//!
//! - [`Event`] - Note, controller and pitch bend messages
//! - [`SharedEvents`] / [`EventBlock`] - Per-block shared event snapshot
//! - [`event_queue`] - Lock-free SPSC queue from control threads to the audio thread
//!
//! ## Deferred Work
//!
//! - [`executor()`] - Closures scheduled by control code, run between blocks
//!
//! # Threading Model
//!
//! There are two domains. The audio thread owns the pool, the event block
//! and the receiving ends of the queue and executor, and is their only
//! writer. Control threads hold the sending ends. No lock is shared between
//! the two.
//!
//! # Example
//!
//! ```rust
//! use cadenza_core::{
//!     AudioBufferPool, ClockRange, Event, EventBlock, ProcessData, event_queue,
//! };
//!
//! let pool = AudioBufferPool::new(16, 128);
//! let (mut tx, mut rx) = event_queue(64);
//! let mut block = EventBlock::with_capacity(64);
//!
//! // Control thread
//! tx.enqueue(Event::NoteOn { key: 60, velocity: 100 });
//!
//! // Audio thread, once per block
//! block.clear();
//! rx.drain_bounded(5, |event| {
//!     block.push(event);
//! });
//! let data = ProcessData::new(block.snapshot(), ClockRange::new(0, 128));
//! let out = data.with([pool.allocate_cleared()]);
//! assert_eq!(out.events().len(), 1);
//! ```

pub mod buffer;
pub mod event;
pub mod executor;
pub mod iter;
pub mod process;
pub mod queue;

pub use buffer::{AudioBufferHandle, AudioBufferPool};
pub use event::{
    CC_ALL_NOTES_OFF, CC_SUSTAIN, Event, EventBlock, PITCH_BEND_CENTER, SharedEvents,
};
pub use executor::{Executor, ExecutorHandle, Task, executor};
pub use process::{ClockRange, ProcessData};
pub use queue::{EventReceiver, EventSender, event_queue};
