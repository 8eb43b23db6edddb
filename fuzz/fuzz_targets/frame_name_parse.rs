//! Fuzz target for frame file name parsing.
//!
//! Feeds arbitrary UTF-8 names to the parser, checking for panics and that
//! every accepted name round-trips through `FrameRecord::file_name`.

#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use stig::naming::parse_frame_name;

fuzz_target!(|data: &[u8]| {
    if data.len() > 4096 {
        return;
    }

    let Ok(name) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(record) = parse_frame_name(Path::new(name)) {
        let rebuilt = record.file_name("jpg");
        let reparsed = parse_frame_name(Path::new(&rebuilt)).expect("rebuilt name parses");
        assert_eq!(reparsed, record);
    }
});
