//! Sensor manager (C7): wraps a blocking sensor behind a cooperative
//! start/poll/fill facade with a cached last sample and error code.
//!
//! Grounded on the original firmware's `sensor_mgr_ctx_t` / `ps_sensor_mgr.c`:
//! same four states (`Idle`, `Requested`, `Ready`, `Error`), same
//! `start()`/`poll()`/`fill()` contract, and — per Open Question 2 — no
//! deadline on `Requested`. A stuck sensor persists in `Requested` forever;
//! adding a timeout is left as a hardening pass for a future board
//! integration rather than guessed at here (see DESIGN.md).

use crate::traits::{Sensor, SensorStatus};

/// Diagnostic error code, independent of the wire [`crate::error::ErrorCode`]
/// taxonomy (this one describes *why* the manager entered `Error`).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SensorMgrError {
    None,
    ReadFailed,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum State {
    Idle,
    Requested,
    Ready,
    Error,
}

/// Cooperative wrapper around one [`Sensor`] implementation.
pub struct SensorManager<S: Sensor> {
    sensor: S,
    state: State,
    last_sample: [u8; 45],
    sample_len: usize,
    last_err: SensorMgrError,
    last_sample_ms: u32,
}

impl<S: Sensor> SensorManager<S> {
    pub fn new(sensor: S) -> Self {
        Self {
            sensor,
            state: State::Idle,
            last_sample: [0u8; 45],
            sample_len: 0,
            last_err: SensorMgrError::None,
            last_sample_ms: 0,
        }
    }

    pub fn type_id(&self) -> u8 {
        self.sensor.type_id()
    }

    /// Cooperative start request: returns immediately, never blocks.
    pub fn start(&mut self) -> SensorStatus {
        match self.state {
            State::Ready => SensorStatus::Ready,
            State::Requested => SensorStatus::Busy,
            State::Idle | State::Error => {
                self.state = State::Requested;
                SensorStatus::Busy
            }
        }
    }

    /// Advance an in-flight request; completes synchronously against the
    /// underlying driver (the driver itself is expected to be
    /// non-blocking or bounded by its own conversion time).
    pub fn poll(&mut self, now_ms: u32) -> SensorStatus {
        match self.state {
            State::Idle | State::Ready => SensorStatus::Ready,
            State::Error => SensorStatus::Error,
            State::Requested => match self.sensor.poll() {
                SensorStatus::Ready => {
                    let n = self.sensor.fill(&mut self.last_sample);
                    if n == 0 {
                        self.state = State::Error;
                        self.last_err = SensorMgrError::ReadFailed;
                        SensorStatus::Error
                    } else {
                        self.sample_len = n;
                        self.last_sample_ms = now_ms;
                        self.state = State::Ready;
                        SensorStatus::Ready
                    }
                }
                SensorStatus::Busy => SensorStatus::Busy,
                SensorStatus::Error => {
                    self.state = State::Error;
                    self.last_err = SensorMgrError::ReadFailed;
                    SensorStatus::Error
                }
            },
        }
    }

    /// Non-blocking: returns the cached sample only. `0` if unavailable or
    /// `dst` is smaller than the cached sample.
    pub fn fill(&self, dst: &mut [u8]) -> usize {
        if self.state != State::Ready || dst.len() < self.sample_len {
            return 0;
        }
        dst[..self.sample_len].copy_from_slice(&self.last_sample[..self.sample_len]);
        self.sample_len
    }

    /// Blocking convenience used by READ_SENSOR: drives start -> poll -> fill
    /// synchronously, bounded by the sensor's worst-case conversion time.
    /// This is the only place in the core permitted to busy-wait on a sensor.
    pub fn sample_blocking(&mut self, now_ms: u32, max_spins: u32) -> Result<usize, SensorMgrError> {
        self.start();
        for _ in 0..max_spins {
            match self.poll(now_ms) {
                SensorStatus::Ready => {
                    let mut buf = [0u8; 45];
                    let n = self.fill(&mut buf);
                    return Ok(n);
                }
                SensorStatus::Error => return Err(self.last_err),
                SensorStatus::Busy => continue,
            }
        }
        Err(SensorMgrError::ReadFailed)
    }

    pub fn last_error(&self) -> SensorMgrError {
        self.last_err
    }

    pub fn last_sample_ms(&self) -> u32 {
        self.last_sample_ms
    }
}
