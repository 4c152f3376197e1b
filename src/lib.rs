//! Transport-agnostic core for periodic sensor streaming over a
//! packet-oriented byte link (USB-CDC, UART, ...).
//!
//! This crate is the four tightly coupled subsystems that make up the
//! firmware's "core": a framed wire protocol with CRC and magic-based
//! resync ([`protocol`]), SPSC byte rings for the RX/TX paths ([`ring`]),
//! a cooperative per-sensor streaming state machine ([`stream`]), and an
//! opcode-indexed command dispatcher ([`dispatch`]). [`engine::Core`] wires
//! all of it together behind three external collaborator traits
//! ([`traits::Transport`], [`traits::Sensor`], [`traits::Clock`]) so the
//! concrete transport driver, sensor driver, and board/time source stay
//! out of this crate entirely.
//!
//! Nothing here allocates, blocks on an interrupt path, or touches a
//! process-wide global: every [`engine::Core`] is an explicitly constructed
//! value, and tests instantiate as many as they like.
#![cfg_attr(not(feature = "std"), no_std)]

pub mod config;
pub mod dispatch;
#[path = "core.rs"]
pub mod engine;
pub mod error;
mod log;
pub mod protocol;
pub mod ring;
pub mod rx;
mod sanity;
pub mod sensor;
pub mod stream;
pub mod traits;
pub mod tx;

#[cfg(feature = "demo-usb")]
pub mod serial_usb;
#[cfg(feature = "demo-usb")]
pub mod sys;

pub use config::{MAX_FRAME, MAX_PAYLOAD};
pub use engine::Core;
pub use error::ErrorCode;
pub use protocol::{decode, encode, DecodeOutcome, FrameType};
pub use traits::{Clock, Sensor, SensorStatus, Transport};
