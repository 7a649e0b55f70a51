//! Fuzz target for the 2-bit codec round trip.

#![no_main]

use libfuzzer_sys::fuzz_target;
use virascan::codec;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() || data.len() > 32 {
        return;
    }
    if !data
        .iter()
        .all(|b| matches!(b, b'A' | b'C' | b'G' | b'T'))
    {
        // invalid input must be rejected, not mis-encoded
        assert_eq!(codec::encode(data, 0, data.len()), None);
        return;
    }

    let key = codec::encode(data, 0, data.len()).expect("valid DNA must encode");
    let decoded = codec::decode(key, data.len());
    assert_eq!(decoded.as_bytes(), data);
});
