//! Command dispatcher (C5): opcode-indexed table of (parser, handler)
//! pairs producing exactly one ACK/NACK response per CMD frame.
//!
//! Grounded on the original firmware's `ps_cmd_dispatcher.c`/`ps_cmd_parsers.c`:
//! same raw-payload -> typed-struct -> handler pipeline and the same
//! null-entry/parser-failure/handler-failure NACK paths. `void*` structs and
//! function-pointer handlers become a closed `ParsedArgs` enum and `fn`
//! pointers operating against a `CommandContext` capability trait instead of
//! C statics.

use crate::config::MAX_PAYLOAD;
use crate::error::ErrorCode;
use crate::log::warn;

/// Standard opcodes (§4.5).
pub const OP_START: u8 = 0x01;
pub const OP_STOP: u8 = 0x02;
pub const OP_SET_PERIOD: u8 = 0x03;
pub const OP_GET_PERIOD: u8 = 0x04;
pub const OP_PING: u8 = 0x05;
pub const OP_GET_SENSORS: u8 = 0x06;
pub const OP_READ_SENSOR: u8 = 0x07;
pub const OP_GET_UPTIME: u8 = 0x08;

/// A parsed command argument record. Standard opcodes get a typed variant;
/// any opcode registered with [`parse_raw`] instead gets the raw payload
/// bytes, bounded by `MAX_PAYLOAD` the same way the C side bounds
/// `cmd_struct` by `CMD_MAX_STRUCT`.
#[derive(Copy, Clone)]
pub enum ParsedArgs {
    /// START, STOP, GET_PERIOD, and READ_SENSOR all share this one-byte shape.
    SensorId { sensor_id: u8 },
    SetPeriod { sensor_id: u8, period_ms: u16 },
    NoArg,
    Raw { bytes: [u8; MAX_PAYLOAD], len: u8 },
}

/// State and collaborators a handler may touch. Implemented by
/// [`crate::engine::Core`]; kept narrow so handlers can be unit tested against
/// a fake.
pub trait CommandContext {
    fn now_ms(&self) -> u32;
    fn sensor_count(&self) -> usize;
    fn sensor_runtime_id(&self, idx: usize) -> u8;
    fn sensor_type_id(&self, idx: usize) -> u8;
    fn find_sensor(&self, sensor_id: u8) -> Option<usize>;
    fn is_streaming(&self, idx: usize) -> bool;
    fn start_streaming(&mut self, idx: usize) -> Result<(), ErrorCode>;
    fn stop_streaming(&mut self, idx: usize);
    fn set_period_ms(&mut self, idx: usize, period_ms: u16) -> Result<(), ErrorCode>;
    fn period_ms(&self, idx: usize) -> u32;
    /// Drives the sensor manager start->poll->fill synchronously, bounded by
    /// a fixed spin budget. Returns the bytes written into `dst` (runtime_id
    /// followed by the sample).
    fn read_sensor_blocking(&mut self, idx: usize, dst: &mut [u8]) -> Result<usize, ErrorCode>;
}

type ParserFn = fn(&[u8]) -> Result<ParsedArgs, ErrorCode>;
type HandlerFn = fn(&ParsedArgs, &mut dyn CommandContext, &mut [u8]) -> Result<usize, ErrorCode>;

#[derive(Copy, Clone)]
struct CmdEntry {
    parser: ParserFn,
    handler: HandlerFn,
}

/// 256-entry opcode table; unregistered entries are `None` and NACK with
/// `InvalidCmd`.
pub struct Dispatcher {
    table: [Option<CmdEntry>; 256],
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub const fn new() -> Self {
        Self { table: [None; 256] }
    }

    /// Install a handler for `opcode`, overwriting any prior entry.
    pub fn register(&mut self, opcode: u8, parser: ParserFn, handler: HandlerFn) {
        self.table[opcode as usize] = Some(CmdEntry { parser, handler });
    }

    /// Populate the eight standard opcodes (§4.5).
    pub fn register_standard_commands(&mut self) {
        self.register(OP_START, parse_sensor_id, handle_start);
        self.register(OP_STOP, parse_sensor_id, handle_stop);
        self.register(OP_SET_PERIOD, parse_set_period, handle_set_period);
        self.register(OP_GET_PERIOD, parse_sensor_id, handle_get_period);
        self.register(OP_PING, parse_noarg, handle_ping);
        self.register(OP_GET_SENSORS, parse_noarg, handle_get_sensors);
        self.register(OP_READ_SENSOR, parse_sensor_id, handle_read_sensor);
        self.register(OP_GET_UPTIME, parse_noarg, handle_get_uptime);
    }

    /// Run one CMD payload through its registered (parser, handler) pair.
    /// Returns `Ok(n)` with `n` response bytes written into `resp` on ACK,
    /// or `Err(code)` on NACK.
    pub fn dispatch(
        &self,
        cmd_id: u8,
        payload: &[u8],
        ctx: &mut dyn CommandContext,
        resp: &mut [u8],
    ) -> Result<usize, ErrorCode> {
        if payload.len() > MAX_PAYLOAD {
            warn!("dispatch: oversize payload for cmd {}", cmd_id);
            return Err(ErrorCode::InvalidLen);
        }

        let entry = match self.table[cmd_id as usize] {
            Some(e) => e,
            None => {
                warn!("dispatch: unknown opcode {}", cmd_id);
                return Err(ErrorCode::InvalidCmd);
            }
        };

        let args = (entry.parser)(payload)?;
        (entry.handler)(&args, ctx, resp)
    }
}

// ---------- parsers ----------

fn parse_sensor_id(payload: &[u8]) -> Result<ParsedArgs, ErrorCode> {
    if payload.is_empty() {
        return Err(ErrorCode::InvalidLen);
    }
    Ok(ParsedArgs::SensorId { sensor_id: payload[0] })
}

fn parse_set_period(payload: &[u8]) -> Result<ParsedArgs, ErrorCode> {
    if payload.len() < 3 {
        return Err(ErrorCode::InvalidLen);
    }
    let sensor_id = payload[0];
    let period_ms = u16::from_le_bytes([payload[1], payload[2]]);
    Ok(ParsedArgs::SetPeriod { sensor_id, period_ms })
}

fn parse_noarg(payload: &[u8]) -> Result<ParsedArgs, ErrorCode> {
    if !payload.is_empty() {
        return Err(ErrorCode::InvalidLen);
    }
    Ok(ParsedArgs::NoArg)
}

/// Available for custom opcode registrations outside the standard set.
pub fn parse_raw(payload: &[u8]) -> Result<ParsedArgs, ErrorCode> {
    if payload.len() > MAX_PAYLOAD {
        return Err(ErrorCode::InvalidLen);
    }
    let mut bytes = [0u8; MAX_PAYLOAD];
    bytes[..payload.len()].copy_from_slice(payload);
    Ok(ParsedArgs::Raw { bytes, len: payload.len() as u8 })
}

// ---------- standard handlers ----------

fn sensor_id_of(args: &ParsedArgs) -> u8 {
    match *args {
        ParsedArgs::SensorId { sensor_id } => sensor_id,
        ParsedArgs::SetPeriod { sensor_id, .. } => sensor_id,
        _ => 0,
    }
}

fn handle_start(
    args: &ParsedArgs,
    ctx: &mut dyn CommandContext,
    _resp: &mut [u8],
) -> Result<usize, ErrorCode> {
    let sensor_id = sensor_id_of(args);
    let idx = ctx.find_sensor(sensor_id).ok_or(ErrorCode::InvalidValue)?;
    ctx.start_streaming(idx)?;
    Ok(0)
}

fn handle_stop(
    args: &ParsedArgs,
    ctx: &mut dyn CommandContext,
    _resp: &mut [u8],
) -> Result<usize, ErrorCode> {
    let sensor_id = sensor_id_of(args);
    let idx = ctx.find_sensor(sensor_id).ok_or(ErrorCode::InvalidValue)?;
    ctx.stop_streaming(idx);
    Ok(0)
}

fn handle_set_period(
    args: &ParsedArgs,
    ctx: &mut dyn CommandContext,
    _resp: &mut [u8],
) -> Result<usize, ErrorCode> {
    let (sensor_id, period_ms) = match *args {
        ParsedArgs::SetPeriod { sensor_id, period_ms } => (sensor_id, period_ms),
        _ => return Err(ErrorCode::Internal),
    };
    let idx = ctx.find_sensor(sensor_id).ok_or(ErrorCode::InvalidValue)?;
    ctx.set_period_ms(idx, period_ms)?;
    Ok(0)
}

fn handle_get_period(
    args: &ParsedArgs,
    ctx: &mut dyn CommandContext,
    resp: &mut [u8],
) -> Result<usize, ErrorCode> {
    let sensor_id = sensor_id_of(args);
    let idx = ctx.find_sensor(sensor_id).ok_or(ErrorCode::InvalidValue)?;
    if resp.len() < 4 {
        return Err(ErrorCode::Overflow);
    }
    resp[0..4].copy_from_slice(&ctx.period_ms(idx).to_le_bytes());
    Ok(4)
}

fn handle_ping(
    _args: &ParsedArgs,
    _ctx: &mut dyn CommandContext,
    _resp: &mut [u8],
) -> Result<usize, ErrorCode> {
    Ok(0)
}

fn handle_get_sensors(
    _args: &ParsedArgs,
    ctx: &mut dyn CommandContext,
    resp: &mut [u8],
) -> Result<usize, ErrorCode> {
    let n = ctx.sensor_count();
    if resp.len() < n * 2 {
        return Err(ErrorCode::Overflow);
    }
    for i in 0..n {
        resp[i * 2] = ctx.sensor_runtime_id(i);
        resp[i * 2 + 1] = ctx.sensor_type_id(i);
    }
    Ok(n * 2)
}

fn handle_read_sensor(
    args: &ParsedArgs,
    ctx: &mut dyn CommandContext,
    resp: &mut [u8],
) -> Result<usize, ErrorCode> {
    let sensor_id = sensor_id_of(args);
    let idx = ctx.find_sensor(sensor_id).ok_or(ErrorCode::InvalidValue)?;
    if ctx.is_streaming(idx) {
        return Err(ErrorCode::SensorBusy);
    }
    ctx.read_sensor_blocking(idx, resp)
}

fn handle_get_uptime(
    _args: &ParsedArgs,
    ctx: &mut dyn CommandContext,
    resp: &mut [u8],
) -> Result<usize, ErrorCode> {
    if resp.len() < 4 {
        return Err(ErrorCode::Overflow);
    }
    resp[0..4].copy_from_slice(&ctx.now_ms().to_le_bytes());
    Ok(4)
}
