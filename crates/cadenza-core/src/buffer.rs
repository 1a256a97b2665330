//! Fixed-capacity pool of audio buffers with reference-counted handles.
//!
//! All sample storage is allocated once, when the [`AudioBufferPool`] is
//! constructed. [`AudioBufferPool::allocate`] pops a buffer off a lock-free
//! free list and wraps it in an [`AudioBufferHandle`]. Handles can be cloned
//! to fan one buffer out to several consumers; the buffer goes back on the
//! free list when the last handle referring to it is dropped.
//!
//! ## Aliasing
//!
//! A buffer is writable only through a handle that holds it exclusively.
//! [`AudioBufferHandle::get_mut`] returns `None` while the buffer is aliased,
//! and [`AudioBufferHandle::make_mut`] copies the samples into a fresh pool
//! buffer first (copy-on-write).
//!
//! Handles are `!Send`: they live for one block on the thread that allocated
//! them. This keeps the last-handle check in `Drop` exact without a lock.
//!
//! ## Exhaustion
//!
//! Running out of buffers is a provisioning bug, not a runtime condition, so
//! [`AudioBufferPool::allocate`] panics. Use [`AudioBufferPool::try_allocate`]
//! to probe capacity instead.

use core::fmt;
use core::marker::PhantomData;
use core::ops::Deref;
use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

struct PoolShared {
    free: ArrayQueue<Arc<[f32]>>,
    capacity: usize,
    block_size: usize,
}

impl PoolShared {
    fn take(&self) -> Arc<[f32]> {
        match self.free.pop() {
            Some(storage) => storage,
            None => panic!(
                "audio buffer pool exhausted: all {} buffers of {} frames are in use",
                self.capacity, self.block_size
            ),
        }
    }
}

/// Pool of fixed-size sample buffers shared by every stage of a block.
///
/// Cloning the pool is cheap and yields another reference to the same
/// storage, so the composition root can hand it to each component that
/// needs to allocate buses.
///
/// # Example
///
/// ```rust
/// use cadenza_core::AudioBufferPool;
///
/// let pool = AudioBufferPool::new(4, 64);
/// let mut bus = pool.allocate_cleared();
/// bus.make_mut().fill(0.5);
///
/// let alias = bus.clone();
/// assert_eq!(pool.in_use(), 1);
/// drop(bus);
/// drop(alias);
/// assert_eq!(pool.in_use(), 0);
/// ```
#[derive(Clone)]
pub struct AudioBufferPool {
    shared: Arc<PoolShared>,
}

impl AudioBufferPool {
    /// Creates a pool of `capacity` buffers, each `block_size` frames long.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, block_size: usize) -> Self {
        assert!(capacity > 0, "audio buffer pool needs at least one buffer");
        let free = ArrayQueue::new(capacity);
        for _ in 0..capacity {
            let storage: Arc<[f32]> = Arc::from(vec![0.0; block_size]);
            // Queue capacity matches the number of buffers pushed.
            let _ = free.push(storage);
        }
        Self {
            shared: Arc::new(PoolShared {
                free,
                capacity,
                block_size,
            }),
        }
    }

    /// Returns the total number of buffers owned by the pool.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Returns the length in frames of every buffer.
    pub fn block_size(&self) -> usize {
        self.shared.block_size
    }

    /// Returns the number of buffers currently on the free list.
    pub fn available(&self) -> usize {
        self.shared.free.len()
    }

    /// Returns the number of buffers referenced by at least one handle.
    pub fn in_use(&self) -> usize {
        self.shared.capacity - self.shared.free.len()
    }

    /// Takes a buffer off the free list, or returns `None` if none is left.
    ///
    /// The buffer contents are whatever the previous owner left behind.
    pub fn try_allocate(&self) -> Option<AudioBufferHandle> {
        self.shared
            .free
            .pop()
            .map(|storage| AudioBufferHandle::new(storage, Arc::clone(&self.shared)))
    }

    /// Takes a buffer off the free list.
    ///
    /// The buffer contents are whatever the previous owner left behind.
    ///
    /// # Panics
    ///
    /// Panics if every buffer is in use.
    pub fn allocate(&self) -> AudioBufferHandle {
        AudioBufferHandle::new(self.shared.take(), Arc::clone(&self.shared))
    }

    /// Takes a buffer off the free list and zeroes it.
    pub fn allocate_cleared(&self) -> AudioBufferHandle {
        let mut handle = self.allocate();
        handle.clear();
        handle
    }

    /// Allocates `N` zeroed buffers at once, one per channel.
    pub fn allocate_multi<const N: usize>(&self) -> [AudioBufferHandle; N] {
        core::array::from_fn(|_| self.allocate_cleared())
    }
}

impl fmt::Debug for AudioBufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBufferPool")
            .field("capacity", &self.capacity())
            .field("block_size", &self.block_size())
            .field("available", &self.available())
            .finish()
    }
}

/// Reference-counted view into one pool buffer.
///
/// A handle covers a frame range of its buffer: the whole block when freshly
/// allocated, or a sub-range after [`slice`](Self::slice). Reads go through
/// `Deref<Target = [f32]>`.
#[derive(Clone)]
pub struct AudioBufferHandle {
    storage: Arc<[f32]>,
    offset: usize,
    len: usize,
    pool: Arc<PoolShared>,
    _local: PhantomData<*const ()>,
}

impl AudioBufferHandle {
    fn new(storage: Arc<[f32]>, pool: Arc<PoolShared>) -> Self {
        let len = storage.len();
        Self {
            storage,
            offset: 0,
            len,
            pool,
            _local: PhantomData,
        }
    }

    /// Number of frames visible through this handle.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the handle covers zero frames.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the visible samples.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.storage[self.offset..self.offset + self.len]
    }

    /// Returns true if no other handle refers to the same buffer.
    #[inline]
    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.storage) == 1
    }

    /// Returns true if both handles refer to the same pool buffer.
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Mutable access to the visible samples, if this handle is exclusive.
    #[inline]
    pub fn get_mut(&mut self) -> Option<&mut [f32]> {
        let (start, end) = (self.offset, self.offset + self.len);
        Arc::get_mut(&mut self.storage).map(|samples| &mut samples[start..end])
    }

    /// Mutable access to the visible samples, copying them into a fresh
    /// pool buffer first if the current one is aliased.
    ///
    /// # Panics
    ///
    /// Panics if a copy is needed and the pool is exhausted.
    pub fn make_mut(&mut self) -> &mut [f32] {
        if !self.is_unique() {
            let mut fresh = self.pool.take();
            if let Some(dst) = Arc::get_mut(&mut fresh) {
                dst[..self.len].copy_from_slice(self.as_slice());
            }
            self.storage = fresh;
            self.offset = 0;
        }
        let (start, end) = (self.offset, self.offset + self.len);
        match Arc::get_mut(&mut self.storage) {
            Some(samples) => &mut samples[start..end],
            None => &mut [],
        }
    }

    /// Zeroes the visible samples.
    pub fn clear(&mut self) {
        self.make_mut().fill(0.0);
    }

    /// Returns a handle covering `len` frames starting at `index`, sharing
    /// the same storage.
    ///
    /// # Panics
    ///
    /// Panics if the range does not fit inside this handle.
    pub fn slice(&self, index: usize, len: usize) -> Self {
        assert!(
            index + len <= self.len,
            "buffer slice {}..{} out of range for {} frames",
            index,
            index + len,
            self.len
        );
        Self {
            storage: Arc::clone(&self.storage),
            offset: self.offset + index,
            len,
            pool: Arc::clone(&self.pool),
            _local: PhantomData,
        }
    }
}

impl Deref for AudioBufferHandle {
    type Target = [f32];

    #[inline]
    fn deref(&self) -> &[f32] {
        self.as_slice()
    }
}

impl AsRef<[f32]> for AudioBufferHandle {
    fn as_ref(&self) -> &[f32] {
        self.as_slice()
    }
}

impl Drop for AudioBufferHandle {
    fn drop(&mut self) {
        if self.is_unique() {
            // The free list can hold every buffer, so this push cannot fail.
            let _ = self.pool.free.push(Arc::clone(&self.storage));
        }
    }
}

impl fmt::Debug for AudioBufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBufferHandle")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("unique", &self.is_unique())
            .finish()
    }
}
