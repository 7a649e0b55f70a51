//! Fuzz target for the sliding key stream.
//!
//! Checks that arbitrary byte input never panics the stream and that every
//! yielded k-mer re-encodes to the same key.

#![no_main]

use libfuzzer_sys::fuzz_target;
use virascan::codec::{self, KeyStream};

fuzz_target!(|data: &[u8]| {
    for k in [1usize, 5, 21, 32] {
        for (pos, key) in KeyStream::new(data, k) {
            let direct = codec::encode(data, pos, k);
            assert_eq!(direct, Some(key));
        }
    }
});
