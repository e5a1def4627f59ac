//! evform-transport: lock-free transport and the two-task runtime.
//!
//! Exactly two long-running tasks touch the pipeline: the input task fills
//! the [`ring`] transport from a [`runtime::PacketSource`], and the
//! processing task drains it through the reduction stage. The SPSC ring
//! between them is wait-free on both sides; everything downstream is
//! single-owner state driven only by the processing task.

pub mod error;
pub mod ring;
pub mod runtime;
pub mod spsc;

pub use error::{Error, Result};
pub use ring::{ring_transport, PacketBuffer, TransportConfig, TransportRx, TransportTx};
pub use runtime::{EventSink, HitDecoder, PacketSource, Runtime, RuntimeConfig};
