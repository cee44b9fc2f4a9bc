//! Fuzz target: `SlaveRegistryService::handle_frame`
//!
//! Splits the input into frames and feeds them to a service with one key
//! of every direction bound, asserting that it never panics and never
//! stages more than a payload.
//!
//! cargo fuzz run fuzz_slave_frame

#![no_main]

use i2c_registry::protocol::SwitchProtocol;
use i2c_registry::{DecodeKind, KeyWidth, Reading, RegistryKey, ServiceBuilder, SlaveResponse};
use libfuzzer_sys::fuzz_target;

struct Relay(bool);

impl i2c_registry::app::ports::LocalSwitch for Relay {
    fn state(&self) -> bool {
        self.0
    }
    fn write_state(&mut self, on: bool) {
        self.0 = on;
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let width = if selector & 1 == 0 { KeyWidth::Bits8 } else { KeyWidth::Bits16 };

    let Ok(mut svc) = ServiceBuilder::new(0x42, width)
        .sensor("up", RegistryKey(0x11), DecodeKind::Counter, || Some(Reading::Counter(1)))
        .switch(
            "lamp",
            SwitchProtocol::Toggle { toggle: RegistryKey(0x30), state: RegistryKey(0x31) },
            Relay(false),
        )
        .value("offset", RegistryKey(0x40), DecodeKind::MeasurementI16, None)
        .build()
    else {
        return;
    };
    svc.update();

    // Frames are length-prefixed by one byte, capped at six.
    let mut rest = rest;
    while let Some((&len, tail)) = rest.split_first() {
        let n = usize::from(len % 7).min(tail.len());
        let (frame, next) = tail.split_at(n);
        if let SlaveResponse::Staged(bytes) = svc.handle_frame(frame) {
            assert!(bytes.len() <= 4, "staged more than a payload");
        }
        rest = next;
    }
});
