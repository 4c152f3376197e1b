//! External collaborator contracts (§6).
//!
//! The core never talks to a concrete transport, sensor, or clock — it
//! only knows these capability sets. This is the trait-based analogue of
//! the original firmware's function-pointer structs (`ps_transport_adapter_t`,
//! `ps_sensor_adapter_t`): a capability set passed by reference, not a class
//! hierarchy.

/// Packet-oriented byte transport (USB-CDC, UART, ...).
///
/// All methods are non-blocking; a blocking transport is not a valid
/// implementation of this trait (see the crate's concurrency notes).
pub trait Transport {
    /// Attempt to send exactly `buf.len()` bytes.
    ///
    /// Returns `Ok(len)` on success, `Ok(0)` if busy/not ready, or `Err(())`
    /// on a protocol violation (oversize write).
    fn tx_write(&mut self, buf: &[u8]) -> Result<u16, ()>;

    /// True iff the link is ready for a write right now.
    fn link_ready(&self) -> bool;

    /// Maximum safe bytes for a single non-blocking write (>= 64).
    fn best_chunk(&self) -> u16;
}

/// Result of a cooperative sensor operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SensorStatus {
    Ready,
    Busy,
    Error,
}

/// A single sensor's cooperative hardware contract.
///
/// `start`/`poll` never block; `fill` only ever returns a cached sample.
pub trait Sensor {
    /// Size in bytes of one sample record (<= 45).
    const SAMPLE_SIZE: usize;

    /// Static family identifier for this sensor type.
    fn type_id(&self) -> u8;

    /// Begin a sample request; idempotent while already in flight.
    fn start(&mut self) -> SensorStatus;

    /// Advance an in-flight sample request.
    fn poll(&mut self) -> SensorStatus;

    /// Copy the last completed sample into `dst`, returning the number of
    /// bytes written (0 if no sample is cached yet or `dst` is too small).
    fn fill(&mut self, dst: &mut [u8]) -> usize;
}

/// Monotonic millisecond time source. Wrap is permitted; all period gating
/// in this crate uses wrapping arithmetic.
pub trait Clock {
    fn now_ms(&self) -> u32;
}
