// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for storage path parsing and escaping

#![no_main]

use archivum_storage::StoragePath;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    // Parsed paths print back to the same path.
    if let Ok(path) = StoragePath::parse(s) {
        let reparsed = StoragePath::parse(&path.to_string()).expect("printed path must parse");
        assert_eq!(reparsed, path);
    }

    // Any non-empty segments survive escaping, including '/' and '%'.
    let segments: Vec<&str> = s.split('\n').filter(|seg| !seg.is_empty()).collect();
    if let Ok(path) = StoragePath::from_segments(segments.iter().copied()) {
        let reparsed = StoragePath::parse(&path.to_string()).expect("escaped path must parse");
        assert_eq!(reparsed.segments(), path.segments());
    }
});
