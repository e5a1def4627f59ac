//! Wait-free bounded single-producer/single-consumer ring.
//!
//! A Rigtorp-style SPSC queue: monotonically increasing head/tail indices
//! masked into a power-of-two slot array, Acquire/Release ordering only,
//! and a cached copy of the remote index on each side so the hot path does
//! not touch the other core's cache line. Both `try_push` and `try_pop`
//! complete in a bounded number of steps; callers supply their own wait
//! strategy.
#![allow(unsafe_code)]

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use crate::error::{Error, Result};

/// Shared ring storage.
///
/// Invariants: `capacity` is a power of two; slots in `[head, tail)`
/// (masked) are initialized and all others are not; only the consumer
/// stores `head`, only the producer stores `tail`.
struct Ring<T> {
    buf: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    /// Consumer's read index; Release-stored by the consumer,
    /// Acquire-loaded by the producer to detect space.
    head: CachePadded<AtomicUsize>,
    /// Producer's write index; Release-stored by the producer,
    /// Acquire-loaded by the consumer to detect data.
    tail: CachePadded<AtomicUsize>,
}

// SAFETY: the head/tail protocol gives every slot exactly one writer epoch
// followed by one reader epoch; producer and consumer never touch the same
// slot concurrently.
unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    fn capacity(&self) -> usize {
        self.mask + 1
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        let mut idx = head;
        while idx != tail {
            // SAFETY: slots in [head, tail) are initialized.
            unsafe {
                (*self.buf[idx & self.mask].get()).assume_init_drop();
            }
            idx = idx.wrapping_add(1);
        }
    }
}

/// Producer handle. `Send`, single-owner; `&mut self` enforces the
/// one-producer discipline.
pub struct Producer<T: Send> {
    ring: Arc<Ring<T>>,
    cached_head: usize,
}

impl<T: Send> Producer<T> {
    /// Attempts to push, returning the value back when the ring is full.
    /// Never blocks and never retries.
    #[inline]
    pub fn try_push(&mut self, value: T) -> std::result::Result<(), T> {
        let tail = self.ring.tail.load(Ordering::Relaxed);

        if tail.wrapping_sub(self.cached_head) >= self.ring.capacity() {
            self.cached_head = self.ring.head.load(Ordering::Acquire);
            if tail.wrapping_sub(self.cached_head) >= self.ring.capacity() {
                return Err(value);
            }
        }

        // SAFETY: the slot is outside [head, tail), so the consumer will
        // not read it until the tail store below publishes it.
        unsafe {
            (*self.ring.buf[tail & self.ring.mask].get()).write(value);
        }
        self.ring.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }
}

/// Consumer handle. `Send`, single-owner; `&mut self` enforces the
/// one-consumer discipline.
pub struct Consumer<T: Send> {
    ring: Arc<Ring<T>>,
    cached_tail: usize,
}

impl<T: Send> Consumer<T> {
    /// Attempts to pop the next value. Never blocks.
    #[inline]
    pub fn try_pop(&mut self) -> Option<T> {
        let head = self.ring.head.load(Ordering::Relaxed);

        if head == self.cached_tail {
            self.cached_tail = self.ring.tail.load(Ordering::Acquire);
            if head == self.cached_tail {
                return None;
            }
        }

        // SAFETY: the slot is inside [head, tail), so it is initialized and
        // the producer will not overwrite it until the head store below
        // frees it.
        let value = unsafe { (*self.ring.buf[head & self.ring.mask].get()).assume_init_read() };
        self.ring.head.store(head.wrapping_add(1), Ordering::Release);
        Some(value)
    }
}

/// Creates a bounded SPSC channel with a power-of-two capacity.
///
/// # Errors
/// Rejects capacities that are zero or not a power of two.
pub fn channel<T: Send>(capacity: usize) -> Result<(Producer<T>, Consumer<T>)> {
    if capacity == 0 || !capacity.is_power_of_two() {
        return Err(Error::InvalidSlotCount(capacity));
    }
    let buf = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect::<Vec<_>>()
        .into_boxed_slice();
    let ring = Arc::new(Ring {
        buf,
        mask: capacity - 1,
        head: CachePadded::new(AtomicUsize::new(0)),
        tail: CachePadded::new(AtomicUsize::new(0)),
    });
    Ok((
        Producer {
            ring: Arc::clone(&ring),
            cached_head: 0,
        },
        Consumer {
            ring,
            cached_tail: 0,
        },
    ))
}
