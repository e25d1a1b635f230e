//! Reusable byte buffers.
//!
//! Part bodies and the rendered message body are taken from a
//! [`BufferPool`] and handed back by [`Message::reset`](crate::Message::reset),
//! so a message object can be reused without reallocating.

use std::sync::{Mutex, PoisonError};

use tracing::trace;

/// Default number of idle buffers kept by a pool.
pub const DEFAULT_MAX_RETAINED: usize = 64;

/// Buffers whose capacity grew beyond this are dropped instead of pooled.
pub const DEFAULT_MAX_CAPACITY: usize = 4 * 1024 * 1024;

/// Pool of byte buffers.
///
/// [`acquire`](Self::acquire) hands out an empty buffer owned by the caller;
/// [`release`](Self::release) takes ownership back. Released buffers keep
/// their capacity but never their content.
#[derive(Debug)]
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    max_retained: usize,
    max_capacity: usize,
}

impl BufferPool {
    /// Creates a pool with the default limits.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_RETAINED, DEFAULT_MAX_CAPACITY)
    }

    /// Creates a pool keeping at most `max_retained` idle buffers of at most
    /// `max_capacity` bytes each.
    #[must_use]
    pub const fn with_limits(max_retained: usize, max_capacity: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
            max_retained,
            max_capacity,
        }
    }

    /// Takes an empty buffer out of the pool, allocating if none is idle.
    pub fn acquire(&self) -> Vec<u8> {
        self.buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default()
    }

    /// Returns a buffer to the pool.
    pub fn release(&self, mut buf: Vec<u8>) {
        buf.clear();
        if buf.capacity() == 0 || buf.capacity() > self.max_capacity {
            trace!(capacity = buf.capacity(), "dropping buffer");
            return;
        }

        let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        if buffers.len() < self.max_retained {
            buffers.push(buf);
        }
    }

    /// Number of idle buffers.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}
