//! The two-task runtime: input and processing threads around the transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use evform_core::Hit;
use evform_reduction::{MergeItem, Reduction, ReductionStats};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ring::{ring_transport, TransportConfig, TransportRx, TransportTx};

/// Source of raw packets, typically a UDP socket.
///
/// `recv` must bound its wait internally (a receive timeout) so the input
/// task observes the stop flag promptly rather than only on data arrival.
pub trait PacketSource: Send {
    /// Receives the next packet into `buf`, returning its length, or `None`
    /// when the bounded wait elapsed without data.
    fn recv(&mut self, buf: &mut [u8]) -> Option<usize>;
}

/// Protocol decoder turning one packet payload into hits.
///
/// Decode problems are expressed in the hit stream itself (invalid-plane
/// markers), not as errors; the pipeline counts them.
pub trait HitDecoder: Send {
    /// Appends the packet's hits to `out`.
    fn decode(&mut self, payload: &[u8], out: &mut Vec<Hit>);
}

/// Downstream consumer of the merged, time-ordered output stream.
pub trait EventSink: Send {
    /// Publishes one merged item.
    fn publish(&mut self, item: MergeItem);
}

/// Runtime tuning knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Transport pool sizing.
    pub transport: TransportConfig,
    /// Packets between non-flushing queue processing on the hot path.
    pub process_interval: usize,
    /// Processing-task sleep when the transport is empty, in microseconds.
    /// Bounded so the stop flag is observed promptly.
    pub idle_backoff_us: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            process_interval: 64,
            idle_backoff_us: 100,
        }
    }
}

impl RuntimeConfig {
    /// Checks the knobs for construction-time errors.
    pub fn validate(&self) -> Result<()> {
        self.transport.validate()?;
        if self.process_interval == 0 {
            return Err(Error::Config("process_interval must be nonzero".into()));
        }
        Ok(())
    }
}

/// Handle to the two running tasks.
pub struct Runtime {
    stop: Arc<AtomicBool>,
    input: JoinHandle<()>,
    processing: JoinHandle<ReductionStats>,
}

impl Runtime {
    /// Spawns the input and processing tasks.
    ///
    /// # Errors
    /// Fails fast on invalid runtime or transport configuration.
    pub fn spawn<S, D, K>(
        config: RuntimeConfig,
        source: S,
        decoder: D,
        reduction: Reduction,
        sink: K,
    ) -> Result<Self>
    where
        S: PacketSource + 'static,
        D: HitDecoder + 'static,
        K: EventSink + 'static,
    {
        config.validate()?;
        let (tx, rx) = ring_transport(&config.transport)?;
        let stop = Arc::new(AtomicBool::new(false));
        let input_done = Arc::new(AtomicBool::new(false));

        let input_stop = Arc::clone(&stop);
        let input_done_tx = Arc::clone(&input_done);
        let slot_size = config.transport.slot_size;
        let input =
            thread::spawn(move || input_task(&input_stop, &input_done_tx, source, tx, slot_size));

        let processing_stop = Arc::clone(&stop);
        let processing = thread::spawn(move || {
            processing_task(&processing_stop, &input_done, config, rx, decoder, reduction, sink)
        });

        Ok(Self {
            stop,
            input,
            processing,
        })
    }

    /// Signals both tasks to stop without waiting.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Stops both tasks and waits for the final flush to complete.
    ///
    /// The processing task drains the transport and force-flushes every
    /// stage before returning its counters, so no buffered data is lost.
    pub fn shutdown(self) -> ReductionStats {
        self.stop.store(true, Ordering::Relaxed);
        if self.input.join().is_err() {
            log::warn!("input task panicked");
        }
        match self.processing.join() {
            Ok(stats) => stats,
            Err(_) => {
                log::warn!("processing task panicked");
                ReductionStats::default()
            }
        }
    }
}

fn input_task<S: PacketSource>(
    stop: &AtomicBool,
    done: &AtomicBool,
    mut source: S,
    mut tx: TransportTx,
    slot_size: usize,
) {
    let mut scratch = vec![0u8; slot_size];
    while !stop.load(Ordering::Relaxed) {
        if let Some(len) = source.recv(&mut scratch) {
            // A failed send is a counted drop; the producer never blocks.
            tx.try_send(&scratch[..len]);
        }
    }
    let stats = tx.stats();
    log::debug!(
        "input task stopping: {} produced, {} dropped",
        stats.produced,
        stats.dropped
    );
    done.store(true, Ordering::Release);
}

fn processing_task<D: HitDecoder, K: EventSink>(
    stop: &AtomicBool,
    input_done: &AtomicBool,
    config: RuntimeConfig,
    mut rx: TransportRx,
    mut decoder: D,
    mut reduction: Reduction,
    mut sink: K,
) -> ReductionStats {
    let mut hits: Vec<Hit> = Vec::new();
    let mut since_process = 0usize;

    loop {
        if let Some(buffer) = rx.try_recv() {
            decoder.decode(buffer.payload(), &mut hits);
            rx.release(buffer);
            for hit in hits.drain(..) {
                reduction.ingest(hit);
            }
            since_process += 1;
            if since_process >= config.process_interval {
                since_process = 0;
                reduction.process_queues(false);
                for item in reduction.drain() {
                    sink.publish(item);
                }
            }
            continue;
        }

        // Exit only once the input task has stopped pushing and the
        // transport is drained, so nothing in flight is lost.
        if stop.load(Ordering::Relaxed) && input_done.load(Ordering::Acquire) {
            break;
        }

        // Idle: move whatever the latency rules release, then back off
        // briefly.
        reduction.process_queues(false);
        for item in reduction.drain() {
            sink.publish(item);
        }
        for _ in 0..32 {
            std::hint::spin_loop();
        }
        thread::sleep(Duration::from_micros(config.idle_backoff_us));
    }

    // A packet may have landed between the last empty poll and the
    // input-done check; drain it before flushing.
    while let Some(buffer) = rx.try_recv() {
        decoder.decode(buffer.payload(), &mut hits);
        rx.release(buffer);
        for hit in hits.drain(..) {
            reduction.ingest(hit);
        }
    }

    // Forced flush on shutdown: clusterers, matchers and the merger all
    // resolve what they hold.
    reduction.process_queues(true);
    for item in reduction.drain() {
        sink.publish(item);
    }

    let stats = reduction.stats();
    log::info!(
        "processing task stopping: {} hits, {} events out, {} merged",
        stats.pipeline.hits,
        stats.pipeline.events_out,
        stats.merged_out
    );
    stats
}
