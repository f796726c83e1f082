//! Latest-frame state shared between the producer and every sink
//!
//! Each representation (JPEG bytes, matrix packet bytes) lives in its own
//! single-slot cell backed by `tokio::sync::watch`. Publishing replaces the
//! slot wholesale; readers clone the `Bytes` handle out of a momentary
//! borrow and never hold the borrow across I/O.
//!
//! ```text
//!                        Arc<FrameState>
//!                 ┌───────────────────────────┐
//!   update() ───► │ jpeg:   Latest<Bytes>     │ ───► /stream, /frame.jpg, file
//!                 │ packet: Latest<Bytes>     │ ───► TCP send loop
//!                 └───────────────────────────┘
//! ```
//!
//! Delivery is at-most-latest: a reader that falls behind skips straight to
//! the newest value. Sequence numbers are strictly increasing per cell, so a
//! reader can never observe an older value after a newer one.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::watch;

/// A published value tagged with its sequence number
#[derive(Debug, Clone)]
pub struct Published<T> {
    /// Starts at 1, increments on every publish
    pub seq: u64,
    pub value: T,
}

/// Single-slot latest-value cell
#[derive(Debug)]
pub struct Latest<T> {
    tx: watch::Sender<Option<Published<T>>>,
    next_seq: AtomicU64,
}

impl<T: Clone> Latest<T> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx,
            next_seq: AtomicU64::new(1),
        }
    }

    /// Replace the current value, returning the sequence number it was given
    ///
    /// Succeeds whether or not anybody is subscribed.
    pub fn publish(&self, value: T) -> u64 {
        let mut seq = 0;
        // Numbered under the slot's write lock so concurrent publishers stay ordered
        self.tx.send_modify(|slot| {
            seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            *slot = Some(Published { seq, value });
        });
        seq
    }

    /// Clone out the current value, if any
    pub fn snapshot(&self) -> Option<Published<T>> {
        self.tx.borrow().clone()
    }

    /// Receiver that wakes whenever a new value is published
    pub fn subscribe(&self) -> watch::Receiver<Option<Published<T>>> {
        self.tx.subscribe()
    }
}

impl<T: Clone> Default for Latest<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Encoded representations of the most recent frame
#[derive(Debug, Default)]
pub struct FrameState {
    /// Full-resolution JPEG for HTTP and file sinks
    pub jpeg: Latest<Bytes>,
    /// Downscaled RGB matrix packet for the TCP sink
    pub packet: Latest<Bytes>,
}

impl FrameState {
    pub fn new() -> Self {
        Self::default()
    }
}
