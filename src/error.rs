//! Wire error codes, shared between the dispatcher (NACK payloads) and
//! internal call sites that need to report the same taxonomy.

/// Protocol-level status/error code, carried as the first payload byte of a
/// NACK frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ErrorCode {
    /// Success (ACK).
    Ok = 0,
    /// Unrecognized opcode.
    InvalidCmd = 1,
    /// Payload length mismatch or over max.
    InvalidLen = 2,
    /// In-range field with illegal semantics (unknown sensor id, out-of-range period, ...).
    InvalidValue = 3,
    /// Streaming active where exclusive access was required.
    SensorBusy = 4,
    /// Response buffer too small.
    Overflow = 5,
    /// Sensor or codec failure.
    Internal = 6,
    /// Catch-all.
    Unknown = 255,
}

impl From<ErrorCode> for u8 {
    fn from(e: ErrorCode) -> u8 {
        e as u8
    }
}

impl From<u8> for ErrorCode {
    fn from(v: u8) -> ErrorCode {
        match v {
            0 => ErrorCode::Ok,
            1 => ErrorCode::InvalidCmd,
            2 => ErrorCode::InvalidLen,
            3 => ErrorCode::InvalidValue,
            4 => ErrorCode::SensorBusy,
            5 => ErrorCode::Overflow,
            6 => ErrorCode::Internal,
            _ => ErrorCode::Unknown,
        }
    }
}
