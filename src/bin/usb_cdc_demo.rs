//! Illustrative board binary: drives [`sensor_stream::Core`] over USB-CDC on
//! an RP235x. Mirrors the original firmware's `main.c` super-loop (read
//! transport, `ps_core_tick`, pump transport) using `embassy_executor`
//! instead of a bare `while(1)`.
#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_time::{Instant, Timer};
use sensor_stream::traits::{Sensor, SensorStatus};
use sensor_stream::Core;

use sensor_stream::serial_usb;
use sensor_stream::sys;

/// Stand-in for a real I2C-attached sensor (the original firmware's INA219
/// power monitor). Always ready, reports a fixed two-byte sample; swap this
/// out for a real `embedded-hal` driver to bring up actual hardware.
struct DemoSensor {
    reading: u16,
}

impl Sensor for DemoSensor {
    const SAMPLE_SIZE: usize = 2;

    fn type_id(&self) -> u8 {
        1
    }

    fn start(&mut self) -> SensorStatus {
        SensorStatus::Ready
    }

    fn poll(&mut self) -> SensorStatus {
        SensorStatus::Ready
    }

    fn fill(&mut self, dst: &mut [u8]) -> usize {
        if dst.len() < 2 {
            return 0;
        }
        self.reading = self.reading.wrapping_add(1);
        dst[..2].copy_from_slice(&self.reading.to_le_bytes());
        2
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    sys::init();

    let p = embassy_rp::init(Default::default());
    let mut usb_port = serial_usb::init(&spawner, p.USB);

    let mut core: Core<DemoSensor, 2048, 512> = Core::new();
    core.register_sensor(DemoSensor { reading: 0 }).expect("sensor slot available");

    let start = Instant::now();
    let mut rx_buf = [0u8; 64];

    loop {
        let n = usb_port.try_read(&mut rx_buf);
        if n > 0 {
            core.on_rx(&rx_buf[..n]);
        }

        let now_ms = Instant::now().duration_since(start).as_millis() as u32;
        core.tick(now_ms);
        core.pump_tx(&mut usb_port);

        Timer::after_millis(1).await;
    }
}
