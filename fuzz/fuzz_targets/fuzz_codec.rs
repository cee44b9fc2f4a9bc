//! Fuzz target: `codec::decode`
//!
//! Decodes arbitrary bytes under every kind and asserts that a decoded
//! measurement is always finite and re-encodes to the same width.
//!
//! cargo fuzz run fuzz_codec

#![no_main]

use i2c_registry::DecodeKind;
use i2c_registry::protocol::Reading;
use i2c_registry::protocol::codec::{decode, encode};
use libfuzzer_sys::fuzz_target;

const KINDS: [DecodeKind; 7] = [
    DecodeKind::Counter,
    DecodeKind::SignalStrength,
    DecodeKind::Measurement,
    DecodeKind::MeasurementI16,
    DecodeKind::MeasurementU16,
    DecodeKind::State,
    DecodeKind::Trigger,
];

fuzz_target!(|data: &[u8]| {
    for kind in KINDS {
        if let Ok(reading) = decode(kind, data) {
            if let Reading::Measurement(v) = reading {
                assert!(v.is_finite());
            }
            let payload = encode(kind, reading).expect("decoded reading re-encodes");
            assert_eq!(payload.len(), kind.width());
        }
    }
});
