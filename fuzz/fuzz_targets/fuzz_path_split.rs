#![no_main]

use libfuzzer_sys::fuzz_target;
use nx_bridge::{split_path, ResolvedPath, ARCHIVE_EXTENSION};

fuzz_target!(|data: &[u8]| {
    let Ok(path) = std::str::from_utf8(data) else {
        return;
    };

    // Splitting must never panic, even on multibyte input
    let (archive, rest) = split_path(path);

    if !archive.is_empty() {
        assert!(archive.ends_with(ARCHIVE_EXTENSION));
        assert!(path.len() >= rest.len());
    } else {
        assert_eq!(rest, path);
    }

    let resolved = ResolvedPath::parse(path);
    assert_eq!(resolved.archive, archive);
    assert!(resolved.segments.iter().all(|s| !s.is_empty() && !s.contains('/')));
});
