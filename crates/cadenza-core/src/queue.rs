//! Lock-free single-producer/single-consumer event queue.
//!
//! Control threads push [`Event`]s through an [`EventSender`]; the audio
//! thread pops them through an [`EventReceiver`]. Both ends are wait-free.
//! When the queue is full the new event is dropped and counted: a missed
//! control change is preferable to stalling the producer or the audio
//! thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rtrb::{Consumer, Producer, RingBuffer};

use crate::event::Event;

/// Creates a bounded event queue holding at most `capacity` events.
///
/// ```rust
/// use cadenza_core::{Event, event_queue};
///
/// let (mut tx, mut rx) = event_queue(2);
/// assert!(tx.enqueue(Event::NoteOn { key: 60, velocity: 100 }));
/// assert!(tx.enqueue(Event::NoteOff { key: 60 }));
/// assert!(!tx.enqueue(Event::AllNotesOff)); // full, dropped
///
/// assert_eq!(rx.try_dequeue(), Some(Event::NoteOn { key: 60, velocity: 100 }));
/// assert_eq!(tx.dropped(), 1);
/// ```
pub fn event_queue(capacity: usize) -> (EventSender, EventReceiver) {
    let (producer, consumer) = RingBuffer::new(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        EventSender {
            producer,
            dropped: Arc::clone(&dropped),
            capacity,
        },
        EventReceiver {
            consumer,
            dropped,
            capacity,
        },
    )
}

/// Producer end of the event queue, owned by the control domain.
pub struct EventSender {
    producer: Producer<Event>,
    dropped: Arc<AtomicU64>,
    capacity: usize,
}

impl EventSender {
    /// Pushes an event without blocking.
    ///
    /// Returns false if the queue was full; the event is then dropped.
    pub fn enqueue(&mut self, event: Event) -> bool {
        if self.producer.push(event).is_ok() {
            true
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "tracing")]
            tracing::debug!(?event, "event queue full, dropping event");
            false
        }
    }

    /// Number of events dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Number of events that can be pushed before the queue is full.
    pub fn free_slots(&self) -> usize {
        self.producer.slots()
    }

    /// Maximum number of queued events.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for EventSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSender")
            .field("capacity", &self.capacity)
            .field("dropped", &self.dropped())
            .finish_non_exhaustive()
    }
}

/// Consumer end of the event queue, owned by the audio thread.
pub struct EventReceiver {
    consumer: Consumer<Event>,
    dropped: Arc<AtomicU64>,
    capacity: usize,
}

impl EventReceiver {
    /// Pops the oldest event, if any, without blocking.
    #[inline]
    pub fn try_dequeue(&mut self) -> Option<Event> {
        self.consumer.pop().ok()
    }

    /// Pops at most `max` events in FIFO order, handing each to `f`.
    ///
    /// Returns the number of events delivered. Events beyond `max` stay
    /// queued for the next call.
    pub fn drain_bounded(&mut self, max: usize, mut f: impl FnMut(Event)) -> usize {
        let mut delivered = 0;
        while delivered < max {
            match self.consumer.pop() {
                Ok(event) => {
                    f(event);
                    delivered += 1;
                }
                Err(_) => break,
            }
        }
        delivered
    }

    /// Number of events waiting.
    pub fn len(&self) -> usize {
        self.consumer.slots()
    }

    /// Returns true if no event is waiting.
    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    /// Maximum number of queued events.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events the producer dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for EventReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventReceiver")
            .field("capacity", &self.capacity)
            .field("pending", &self.len())
            .finish_non_exhaustive()
    }
}
