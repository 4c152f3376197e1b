//! Streaming state machine (C6): a per-sensor cooperative machine driving
//! periodic STREAM emission without ever blocking.
//!
//! Grounded on `ps_core_sm_t` / the periodic-streaming half of
//! `ps_core_tick()` in the original firmware: `Idle -> SensorStart ->
//! SensorPoll -> Ready -> Idle`, with an `Error` sink that drops
//! `streaming` back to `false`.

use crate::traits::SensorStatus;

/// Per-sensor cooperative streaming state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StreamState {
    Idle,
    SensorStart,
    SensorPoll,
    Ready,
    Error,
}

/// One sensor's streaming descriptor: period gating, sequence counter, and
/// the machine's current state. Does not own the sensor itself — callers
/// drive `sm_tick` with sensor status results each cycle (see
/// [`crate::engine::Core::tick`]).
pub struct StreamDescriptor {
    pub runtime_id: u8,
    pub type_id: u8,
    pub ready: bool,
    pub streaming: bool,
    pub state: StreamState,
    pub seq: u32,
    pub period_ms: u32,
    pub last_emit_ms: u32,
    pub max_payload: usize,
}

impl StreamDescriptor {
    pub const fn new(runtime_id: u8, type_id: u8, max_payload: usize, period_ms: u32) -> Self {
        Self {
            runtime_id,
            type_id,
            ready: true,
            streaming: false,
            state: StreamState::Idle,
            seq: 0,
            period_ms,
            last_emit_ms: 0,
            max_payload,
        }
    }

    /// Start (or restart) streaming. Per this spec's resolution of the
    /// "redundant START" open question, a START while already streaming
    /// resets `seq` to 0, the same as a fresh start.
    pub fn start_streaming(&mut self) {
        self.streaming = true;
        self.state = StreamState::Idle;
        self.seq = 0;
    }

    pub fn stop_streaming(&mut self) {
        self.streaming = false;
        self.state = StreamState::Idle;
    }

    /// Wrap-safe elapsed time since the last emission.
    fn elapsed_since_emit(&self, now: u32) -> u32 {
        now.wrapping_sub(self.last_emit_ms)
    }
}

/// One tick's action, to be carried out by the caller (which owns the
/// sensor manager and the TX engine): the machine itself never touches
/// either directly, so it stays testable in isolation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TickAction {
    /// Nothing to do this cycle.
    None,
    /// Ask the sensor manager to `start()`.
    SensorStart,
    /// Ask the sensor manager to `poll()`.
    SensorPoll,
    /// Sensor is ready; caller should `fill()` and, if `n > 0`, emit a
    /// STREAM frame with this sequence number, then advance `last_emit_ms`.
    Emit { seq: u32 },
}

/// Advance the machine by one tick. `sensor_status` is only consulted while
/// in `SensorStart`/`SensorPoll` (the caller drives the underlying sensor
/// manager and reports back what it observed).
pub fn sm_tick(
    d: &mut StreamDescriptor,
    now: u32,
    sensor_status: Option<SensorStatus>,
) -> TickAction {
    if !d.ready || !d.streaming {
        return TickAction::None;
    }

    match d.state {
        StreamState::Idle => {
            if d.elapsed_since_emit(now) >= d.period_ms {
                d.state = StreamState::SensorStart;
                TickAction::SensorStart
            } else {
                TickAction::None
            }
        }
        StreamState::SensorStart => match sensor_status {
            Some(SensorStatus::Ready) => {
                d.state = StreamState::Ready;
                TickAction::None
            }
            Some(SensorStatus::Busy) => {
                d.state = StreamState::SensorPoll;
                TickAction::SensorPoll
            }
            Some(SensorStatus::Error) | None => {
                d.state = StreamState::Error;
                TickAction::None
            }
        },
        StreamState::SensorPoll => match sensor_status {
            Some(SensorStatus::Ready) => {
                d.state = StreamState::Ready;
                TickAction::None
            }
            Some(SensorStatus::Busy) => TickAction::SensorPoll,
            Some(SensorStatus::Error) | None => {
                d.state = StreamState::Error;
                TickAction::None
            }
        },
        StreamState::Ready => {
            let seq = d.seq;
            d.seq = d.seq.wrapping_add(1);
            d.last_emit_ms = now;
            d.state = StreamState::Idle;
            TickAction::Emit { seq }
        }
        StreamState::Error => {
            d.streaming = false;
            d.state = StreamState::Idle;
            TickAction::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_waits_for_period() {
        let mut d = StreamDescriptor::new(1, 1, 16, 100);
        d.start_streaming();
        assert_eq!(sm_tick(&mut d, 50, None), TickAction::None);
        assert_eq!(d.state, StreamState::Idle);
    }

    #[test]
    fn full_cycle_ready_immediately() {
        let mut d = StreamDescriptor::new(1, 1, 16, 100);
        d.start_streaming();
        assert_eq!(sm_tick(&mut d, 100, None), TickAction::SensorStart);
        assert_eq!(d.state, StreamState::SensorStart);

        assert_eq!(sm_tick(&mut d, 101, Some(SensorStatus::Ready)), TickAction::None);
        assert_eq!(d.state, StreamState::Ready);

        match sm_tick(&mut d, 102, None) {
            TickAction::Emit { seq } => assert_eq!(seq, 0),
            other => panic!("expected Emit, got {other:?}"),
        }
        assert_eq!(d.state, StreamState::Idle);
        assert_eq!(d.last_emit_ms, 102);
        assert_eq!(d.seq, 1);
    }

    #[test]
    fn busy_sensor_revisits_poll_many_ticks() {
        let mut d = StreamDescriptor::new(1, 1, 16, 10);
        d.start_streaming();
        assert_eq!(sm_tick(&mut d, 10, None), TickAction::SensorStart);
        assert_eq!(sm_tick(&mut d, 11, Some(SensorStatus::Busy)), TickAction::SensorPoll);
        assert_eq!(d.state, StreamState::SensorPoll);
        assert_eq!(sm_tick(&mut d, 12, Some(SensorStatus::Busy)), TickAction::SensorPoll);
        assert_eq!(sm_tick(&mut d, 13, Some(SensorStatus::Ready)), TickAction::None);
        assert_eq!(d.state, StreamState::Ready);
    }

    #[test]
    fn error_drops_streaming_and_returns_to_idle() {
        let mut d = StreamDescriptor::new(1, 1, 16, 10);
        d.start_streaming();
        sm_tick(&mut d, 10, None); // -> SensorStart
        sm_tick(&mut d, 11, Some(SensorStatus::Error)); // -> Error
        assert_eq!(d.state, StreamState::Error);
        assert!(d.streaming);
        sm_tick(&mut d, 12, None); // Error -> Idle, streaming=false
        assert_eq!(d.state, StreamState::Idle);
        assert!(!d.streaming);
    }

    #[test]
    fn wrap_safe_period_gating() {
        let mut d = StreamDescriptor::new(1, 1, 16, 100);
        d.start_streaming();
        d.last_emit_ms = u32::MAX - 10;
        // now wrapped past 0; elapsed should be computed modulo 2^32
        assert_eq!(sm_tick(&mut d, 95, None), TickAction::SensorStart);
    }

    #[test]
    fn restart_resets_sequence() {
        let mut d = StreamDescriptor::new(1, 1, 16, 1);
        d.start_streaming();
        sm_tick(&mut d, 1, None);
        sm_tick(&mut d, 1, Some(SensorStatus::Ready));
        sm_tick(&mut d, 1, None); // emits seq 0, seq becomes 1
        assert_eq!(d.seq, 1);
        d.start_streaming(); // redundant START while conceptually streaming
        assert_eq!(d.seq, 0);
    }

    #[test]
    fn not_ready_or_not_streaming_is_inert() {
        let mut d = StreamDescriptor::new(1, 1, 16, 1);
        d.ready = false;
        d.streaming = true;
        assert_eq!(sm_tick(&mut d, 1000, None), TickAction::None);

        let mut d2 = StreamDescriptor::new(1, 1, 16, 1);
        d2.ready = true;
        d2.streaming = false;
        assert_eq!(sm_tick(&mut d2, 1000, None), TickAction::None);
    }
}
