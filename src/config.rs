//! Compile-time configuration knobs.
//!
//! Mirrors the original firmware's `ps_config.h`: ring sizes, stream
//! cadence bounds and transport limits are build-time constants, not
//! runtime-loaded values — there is no filesystem on this target.

/// Protocol header size in bytes (see [`crate::protocol`]).
pub const HEADER_LEN: usize = 16;

/// CRC trailer size in bytes.
pub const CRC_LEN: usize = 2;

/// Maximum payload bytes a single frame may carry.
pub const MAX_PAYLOAD: usize = 46;

/// Maximum total frame size (header + payload + CRC).
pub const MAX_FRAME: usize = HEADER_LEN + MAX_PAYLOAD + CRC_LEN;

/// Default TX ring capacity (power of two; usable capacity is `CAP - 1`).
pub const DEFAULT_TX_RING_CAP: usize = 2048;

/// Default RX ring capacity (power of two; usable capacity is `CAP - 1`).
pub const DEFAULT_RX_RING_CAP: usize = 512;

/// Lower bound accepted by SET_PERIOD.
pub const STREAM_PERIOD_MIN_MS: u16 = 1;

/// Upper bound accepted by SET_PERIOD.
pub const STREAM_PERIOD_MAX_MS: u16 = 60_000;

/// Default per-sensor streaming period until SET_PERIOD changes it.
pub const DEFAULT_STREAM_PERIOD_MS: u32 = 100;

/// Maximum number of sensors a single [`crate::engine::Core`] can register.
pub const MAX_SENSORS: usize = 8;

/// Maximum safe bytes per single non-blocking transport write.
/// Matches the USB-CDC full-speed packet size the wire format is sized for.
pub const TRANSPORT_MAX_WRITE_SIZE: u16 = 64;
