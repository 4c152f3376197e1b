//! Compile-time sanity checks (C8).
//!
//! Grounded on the original firmware's `ps_sanity.c`, which runs a battery
//! of `PS_STATIC_ASSERT` (C11 `_Static_assert`) checks at build time. Rust's
//! `const` evaluation gives the same guarantee without a build step: any
//! violation fails the crate's compilation, not a runtime check.

use crate::config::{
    DEFAULT_RX_RING_CAP, DEFAULT_TX_RING_CAP, HEADER_LEN, MAX_FRAME, TRANSPORT_MAX_WRITE_SIZE,
};

const _: () = assert!(HEADER_LEN == 16, "wire header must be exactly 16 bytes");

const _: () = assert!(
    MAX_FRAME <= DEFAULT_TX_RING_CAP - 1,
    "a whole frame must fit in the default TX ring's usable capacity"
);

const _: () = assert!(
    MAX_FRAME <= DEFAULT_RX_RING_CAP - 1,
    "a whole frame must fit in the default RX ring's usable capacity"
);

const _: () = assert!(
    MAX_FRAME <= TRANSPORT_MAX_WRITE_SIZE as usize,
    "a whole frame must fit in one transport write"
);

/// Ring capacities are asserted power-of-two inside [`crate::ring::Ring::new`]
/// itself (it is generic over the const, so the check has to live at
/// instantiation rather than here).
///
/// Stream period bounds are validated at runtime by SET_PERIOD
/// (`config::STREAM_PERIOD_MIN_MS`/`MAX_MS`) since they come from the host,
/// not from a build-time constant.
const _: () = assert!(crate::config::STREAM_PERIOD_MIN_MS > 0, "stream period must be positive");
