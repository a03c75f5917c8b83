#![no_main]
use libfuzzer_sys::fuzz_target;
use bagunpack::container::{Arena, decode, scan_blocks};
use bagunpack::extract::{DDS_SIGNATURE, find_signature};

fuzz_target!(|data: &[u8]| {
    // Malformed containers must be rejected with an error, never a panic,
    // and the arena must stay within its capacity.
    let mut arena = Arena::new(1 << 20);
    if decode(data, &mut arena).is_ok() {
        let _ = find_signature(arena.as_slice(), &DDS_SIGNATURE);
    }
    assert!(arena.len() <= arena.capacity());

    let _ = scan_blocks(data);
});
