//! Fixed-pool packet transport between the input and processing tasks.
//!
//! A fixed number of fixed-size buffers circulate through two SPSC rings: a
//! free ring carrying empty buffers back to the producer and a ready ring
//! carrying filled buffers to the consumer. The buffer itself is the
//! message, so ownership transfers with it and a slot can never be reused
//! before the consumer is done reading it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use evform_core::TransportStats;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::spsc::{self, Consumer, Producer};

/// One reusable packet buffer from the pool.
#[derive(Debug)]
pub struct PacketBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl PacketBuffer {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// The filled portion of the buffer.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Total slot capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}

/// Transport pool sizing.
///
/// There is no flow control beyond the pool: sizing `slot_count` against
/// the worst observed burst rate is the deployment's responsibility.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Number of pooled buffers; must be a power of two.
    pub slot_count: usize,
    /// Size of each buffer in bytes.
    pub slot_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            slot_count: 512,
            // Jumbo-frame sized so one datagram always fits one slot.
            slot_size: 9000,
        }
    }
}

impl TransportConfig {
    /// Checks the sizing for construction-time errors.
    pub fn validate(&self) -> Result<()> {
        if self.slot_count == 0 || !self.slot_count.is_power_of_two() {
            return Err(Error::InvalidSlotCount(self.slot_count));
        }
        if self.slot_size == 0 {
            return Err(Error::InvalidSlotSize);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Shared {
    produced: AtomicU64,
    dropped: AtomicU64,
    consumed: AtomicU64,
}

impl Shared {
    fn snapshot(&self) -> TransportStats {
        TransportStats {
            produced: self.produced.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
        }
    }
}

/// Producer side of the transport, owned by the input task.
pub struct TransportTx {
    free: Consumer<PacketBuffer>,
    ready: Producer<PacketBuffer>,
    slot_size: usize,
    shared: Arc<Shared>,
}

impl TransportTx {
    /// Copies a packet into a pooled buffer and hands it to the consumer.
    ///
    /// Returns false when the packet was dropped: no free buffer (the
    /// consumer is lagging) or an oversized payload. Drops are counted and
    /// non-fatal; this call never blocks.
    pub fn try_send(&mut self, payload: &[u8]) -> bool {
        if payload.len() > self.slot_size {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let Some(mut buffer) = self.free.try_pop() else {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        buffer.data[..payload.len()].copy_from_slice(payload);
        buffer.len = payload.len();
        if self.ready.try_push(buffer).is_err() {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        self.shared.produced.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> TransportStats {
        self.shared.snapshot()
    }
}

/// Consumer side of the transport, owned by the processing task.
pub struct TransportRx {
    ready: Consumer<PacketBuffer>,
    free: Producer<PacketBuffer>,
    shared: Arc<Shared>,
}

impl TransportRx {
    /// Takes the next filled buffer, if any. Never blocks.
    pub fn try_recv(&mut self) -> Option<PacketBuffer> {
        let buffer = self.ready.try_pop()?;
        self.shared.consumed.fetch_add(1, Ordering::Relaxed);
        Some(buffer)
    }

    /// Returns a buffer to the pool once its payload has been consumed.
    pub fn release(&mut self, buffer: PacketBuffer) {
        let _ = self.free.try_push(buffer);
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> TransportStats {
        self.shared.snapshot()
    }
}

/// Builds the transport pair, pre-seeding the pool with `slot_count`
/// buffers.
///
/// # Errors
/// Rejects invalid sizing before any buffer is allocated.
pub fn ring_transport(config: &TransportConfig) -> Result<(TransportTx, TransportRx)> {
    config.validate()?;

    let (mut free_tx, free_rx) = spsc::channel(config.slot_count)?;
    for _ in 0..config.slot_count {
        if free_tx.try_push(PacketBuffer::with_capacity(config.slot_size)).is_err() {
            return Err(Error::Config("slot pool exceeds ring capacity".into()));
        }
    }
    let (ready_tx, ready_rx) = spsc::channel(config.slot_count)?;
    let shared = Arc::new(Shared::default());

    Ok((
        TransportTx {
            free: free_rx,
            ready: ready_tx,
            slot_size: config.slot_size,
            shared: Arc::clone(&shared),
        },
        TransportRx {
            ready: ready_rx,
            free: free_tx,
            shared,
        },
    ))
}
