//! Top-level wiring (`ps_core_t` analogue): owns the TX/RX engines, the
//! command dispatcher, and a fixed set of sensors, each with its own
//! streaming descriptor and sensor manager.
//!
//! Grounded on the original firmware's `ps_core.c` (`ps_core_init`,
//! `ps_core_on_rx`, `ps_core_tick`). Per §9's redesign flag, this is a plain
//! struct with an explicit constructor rather than a process-wide global —
//! tests freely instantiate more than one `Core`.
//!
//! A `Core` is generic over one concrete [`Sensor`] implementation: the
//! `Sensor` trait carries an associated `SAMPLE_SIZE` constant, which makes
//! it impossible to put behind a `dyn` object without heap allocation this
//! crate avoids. A fleet of *identical* sensor instances (the common case:
//! N channels of the same ADC/driver, addressed by `runtime_id`) is
//! supported directly; a board wanting a genuinely heterogeneous sensor
//! fleet composes multiple `Core`s or adds its own type-erasure layer on
//! top (see DESIGN.md).

use heapless::Vec;

use crate::config::{DEFAULT_STREAM_PERIOD_MS, MAX_SENSORS, STREAM_PERIOD_MAX_MS, STREAM_PERIOD_MIN_MS};
use crate::dispatch::{CommandContext, Dispatcher};
use crate::error::ErrorCode;
use crate::rx::RxEngine;
use crate::sensor::SensorManager;
use crate::stream::{sm_tick, StreamDescriptor, StreamState, TickAction};
use crate::traits::{Sensor, Transport};
use crate::tx::TxEngine;

/// Bounded spin budget for [`CommandContext::read_sensor_blocking`]; the
/// sensor's own conversion time bounds real wall-clock latency, this just
/// keeps a permanently wedged driver from looping forever.
const READ_SENSOR_MAX_SPINS: u32 = 10_000;

struct SensorSlot<S: Sensor> {
    desc: StreamDescriptor,
    mgr: SensorManager<S>,
}

/// Owns everything needed to drive one device's worth of sensor streaming
/// and command handling. `TXCAP`/`RXCAP` are the TX/RX ring capacities
/// (power-of-two, see [`crate::ring::Ring`]).
pub struct Core<S: Sensor, const TXCAP: usize, const RXCAP: usize> {
    tx: TxEngine<TXCAP>,
    rx: RxEngine<RXCAP>,
    dispatcher: Dispatcher,
    sensors: Vec<SensorSlot<S>, MAX_SENSORS>,
    now_ms: u32,
}

impl<S: Sensor, const TXCAP: usize, const RXCAP: usize> Core<S, TXCAP, RXCAP> {
    pub fn new() -> Self {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register_standard_commands();
        Self {
            tx: TxEngine::new(),
            rx: RxEngine::new(),
            dispatcher,
            sensors: Vec::new(),
            now_ms: 0,
        }
    }

    /// Register a sensor instance, assigning it the next free `runtime_id`
    /// (1-based). Fails once `MAX_SENSORS` instances are registered.
    pub fn register_sensor(&mut self, sensor: S) -> Result<u8, ()> {
        let runtime_id = self.sensors.len() as u8 + 1;
        let type_id = sensor.type_id();
        let max_payload = crate::config::MAX_PAYLOAD;
        let desc = StreamDescriptor::new(runtime_id, type_id, max_payload, DEFAULT_STREAM_PERIOD_MS);
        self.sensors
            .push(SensorSlot { desc, mgr: SensorManager::new(sensor) })
            .map_err(|_| ())?;
        Ok(runtime_id)
    }

    /// ISR-side byte intake; safe to call from an interrupt handler.
    pub fn on_rx(&self, bytes: &[u8]) {
        self.rx.on_rx(bytes);
    }

    /// Drain at most one whole frame to the transport.
    pub fn pump_tx(&mut self, transport: &mut impl Transport) {
        self.tx.pump(transport);
    }

    pub fn rx_rejected(&self) -> u32 {
        self.rx.rejected()
    }

    /// One main-loop tick: drain and dispatch pending commands, then advance
    /// every sensor's streaming machine by one step.
    pub fn tick(&mut self, now_ms: u32) {
        self.now_ms = now_ms;
        self.drain_commands(now_ms);
        self.advance_streaming(now_ms);
    }

    fn drain_commands(&mut self, now_ms: u32) {
        // `process_rx`'s callback borrows `self.rx` only; collect frames
        // into an owned buffer first so the loop below is free to borrow
        // `self.sensors` (via `CoreCtx`), `self.dispatcher`, and `self.tx`
        // independently without the RX borrow still being live.
        let mut pending: Vec<(u32, [u8; crate::config::MAX_PAYLOAD], u8), 8> = Vec::new();
        self.rx.process_rx(|frame| {
            let _ = pending.push((frame.seq, frame.payload, frame.payload_len));
        });

        for (seq, payload, payload_len) in pending {
            let mut resp = [0u8; crate::config::MAX_PAYLOAD];
            let cmd_id = if payload_len > 0 { payload[0] } else { 0xFF };
            let args = if payload_len > 0 { &payload[1..payload_len as usize] } else { &payload[..0] };

            let outcome = {
                let mut ctx = CoreCtx { sensors: &mut self.sensors, now_ms };
                self.dispatcher.dispatch(cmd_id, args, &mut ctx, &mut resp)
            };

            match outcome {
                Ok(n) => {
                    self.tx.send_response(crate::protocol::FrameType::Ack, seq, now_ms, &resp[..n]);
                }
                Err(code) => {
                    let nack = [code as u8];
                    self.tx.send_response(crate::protocol::FrameType::Nack, seq, now_ms, &nack);
                }
            }
        }
    }

    fn advance_streaming(&mut self, now_ms: u32) {
        for slot in self.sensors.iter_mut() {
            let status = match slot.desc.state {
                StreamState::SensorStart => Some(slot.mgr.start()),
                StreamState::SensorPoll => Some(slot.mgr.poll(now_ms)),
                _ => None,
            };

            let action = sm_tick(&mut slot.desc, now_ms, status);
            if let TickAction::Emit { seq } = action {
                let mut sample = [0u8; 45];
                let n = slot.mgr.fill(&mut sample);
                if n > 0 {
                    let mut payload = [0u8; crate::config::MAX_PAYLOAD];
                    payload[0] = slot.desc.runtime_id;
                    let cap = core::cmp::min(n, payload.len() - 1);
                    payload[1..1 + cap].copy_from_slice(&sample[..cap]);
                    self.tx.send_stream(&payload[..1 + cap], seq, now_ms);
                }
            }
        }
    }
}

impl<S: Sensor, const TXCAP: usize, const RXCAP: usize> Default for Core<S, TXCAP, RXCAP> {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrows only the sensor slots (never `tx`/`dispatcher`) so a dispatcher
/// call can run with `&mut self.sensors` live while `self.tx` and
/// `self.dispatcher` stay independently borrowable in the caller.
struct CoreCtx<'a, S: Sensor> {
    sensors: &'a mut Vec<SensorSlot<S>, MAX_SENSORS>,
    now_ms: u32,
}

impl<'a, S: Sensor> CommandContext for CoreCtx<'a, S> {
    fn now_ms(&self) -> u32 {
        self.now_ms
    }

    fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    fn sensor_runtime_id(&self, idx: usize) -> u8 {
        self.sensors[idx].desc.runtime_id
    }

    fn sensor_type_id(&self, idx: usize) -> u8 {
        self.sensors[idx].desc.type_id
    }

    fn find_sensor(&self, sensor_id: u8) -> Option<usize> {
        self.sensors.iter().position(|s| s.desc.runtime_id == sensor_id)
    }

    fn is_streaming(&self, idx: usize) -> bool {
        self.sensors[idx].desc.streaming
    }

    fn start_streaming(&mut self, idx: usize) -> Result<(), ErrorCode> {
        let slot = &mut self.sensors[idx];
        if !slot.desc.ready {
            return Err(ErrorCode::InvalidValue);
        }
        slot.desc.start_streaming();
        Ok(())
    }

    fn stop_streaming(&mut self, idx: usize) {
        self.sensors[idx].desc.stop_streaming();
    }

    fn set_period_ms(&mut self, idx: usize, period_ms: u16) -> Result<(), ErrorCode> {
        if period_ms < STREAM_PERIOD_MIN_MS || period_ms > STREAM_PERIOD_MAX_MS {
            return Err(ErrorCode::InvalidValue);
        }
        self.sensors[idx].desc.period_ms = period_ms as u32;
        Ok(())
    }

    fn period_ms(&self, idx: usize) -> u32 {
        self.sensors[idx].desc.period_ms
    }

    fn read_sensor_blocking(&mut self, idx: usize, dst: &mut [u8]) -> Result<usize, ErrorCode> {
        let now_ms = self.now_ms;
        let slot = &mut self.sensors[idx];
        let n = slot
            .mgr
            .sample_blocking(now_ms, READ_SENSOR_MAX_SPINS)
            .map_err(|_| ErrorCode::Internal)?;
        if dst.is_empty() {
            return Err(ErrorCode::Overflow);
        }
        dst[0] = slot.desc.runtime_id;
        let mut sample = [0u8; 45];
        let filled = slot.mgr.fill(&mut sample);
        let cap = core::cmp::min(core::cmp::min(n, filled), dst.len().saturating_sub(1));
        dst[1..1 + cap].copy_from_slice(&sample[..cap]);
        Ok(1 + cap)
    }
}
