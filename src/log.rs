//! Thin logging shims.
//!
//! Core modules call `trace!`/`warn!` unconditionally; under the `defmt`
//! feature these forward to `defmt`'s macros (RTT on target), and otherwise
//! they compile away to nothing so host `std` tests never link `defmt`.
//! Mirrors the original firmware's `LOG_*` macros compiling to no-ops in
//! builds without RTT.

#[cfg(feature = "defmt")]
macro_rules! trace {
    ($($arg:tt)*) => { defmt::trace!($($arg)*) };
}
#[cfg(not(feature = "defmt"))]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "defmt")]
macro_rules! warn {
    ($($arg:tt)*) => { defmt::warn!($($arg)*) };
}
#[cfg(not(feature = "defmt"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}

pub(crate) use trace;
pub(crate) use warn;
