//! Fuzz target for image normalization of untrusted bytes.
//!
//! Inference requests hand raw request bodies to the normalizer, so it must
//! reject garbage with a client error instead of panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use stig::normalize::normalize_from_bytes;
use stig::FrameSize;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    let size = FrameSize::new(12, 16).expect("valid frame size");
    match normalize_from_bytes(data, size) {
        Ok(image) => assert_eq!(image.pixels().len(), size.pixels()),
        Err(err) => assert!(err.is_bad_input()),
    }
});
