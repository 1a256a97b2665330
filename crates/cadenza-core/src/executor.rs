//! Deferred calls from the control domain into the audio thread.
//!
//! Structural changes such as swapping the process callback or
//! re-provisioning buffers must not race the audio thread. Control code
//! wraps them in a closure and sends it through an [`ExecutorHandle`]; the
//! audio thread runs them between blocks with [`Executor::run_queued`],
//! passing its own state `C` by mutable reference.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

/// A deferred call over the audio-side context `C`.
pub type Task<C> = Box<dyn FnOnce(&mut C) + Send>;

/// Creates an executor whose queue holds at most `capacity` pending calls.
pub fn executor<C>(capacity: usize) -> (ExecutorHandle<C>, Executor<C>) {
    let (tx, rx) = bounded(capacity);
    (ExecutorHandle { tx }, Executor { rx })
}

/// Control-side handle for scheduling calls on the audio thread.
pub struct ExecutorHandle<C> {
    tx: Sender<Task<C>>,
}

// Manual impl: `derive` would require `C: Clone`.
impl<C> Clone for ExecutorHandle<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<C> ExecutorHandle<C> {
    /// Schedules `f` to run on the audio thread after the current block.
    ///
    /// Never blocks. Returns false if the queue is full or the audio side
    /// has been dropped; `f` is discarded in that case.
    pub fn execute<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        match self.tx.try_send(Box::new(f)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("executor queue full, dropping deferred call");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Number of calls waiting to run.
    pub fn pending(&self) -> usize {
        self.tx.len()
    }
}

impl<C> std::fmt::Debug for ExecutorHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorHandle")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Audio-side end of the executor.
pub struct Executor<C> {
    rx: Receiver<Task<C>>,
}

impl<C> Executor<C> {
    /// Runs the calls queued before this invocation, in submission order.
    ///
    /// Calls scheduled while these run wait for the next invocation, which
    /// keeps the work per block bounded. Returns the number of calls run.
    pub fn run_queued(&self, context: &mut C) -> usize {
        let queued = self.rx.len();
        let mut ran = 0;
        for _ in 0..queued {
            match self.rx.try_recv() {
                Ok(task) => {
                    task(context);
                    ran += 1;
                }
                Err(_) => break,
            }
        }
        ran
    }

    /// Number of calls waiting to run.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl<C> std::fmt::Debug for Executor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("pending", &self.pending())
            .finish()
    }
}
