//! Fingerprints of the widgets shipped in the bundled root.
//!
//! Keys are paths relative to the bundled root with `/` separators. Any edit
//! to a bundled widget must update its entry here; the validator refuses to
//! launch a bundled script whose fingerprint is missing or stale.

/// `(relative path, lowercase hex SHA-256)` for every bundled widget.
pub const BUNDLED_CHECKSUMS: &[(&str, &str)] = &[
    (
        "cpu.sh",
        "08c66b3af02cb3d3232d8dd480256a6a834a747fcf88ac24db790c0ce81ce6ed",
    ),
    (
        "disk.sh",
        "b6d106147be51fbe99daee506bd9029e61b88c71364abbc9b8d0ac787a6e8574",
    ),
    (
        "memory.sh",
        "47fdd4d5654b1686b17f7e52aafd3b23253701f3303dd56194f9820b696338a6",
    ),
    (
        "uptime.sh",
        "c78bf983f4f7ef5a424c848552c8bfadb50f2c26055199e7e521b4c03564764d",
    ),
];

/// Look up the compiled-in fingerprint for a bundled widget.
pub fn bundled_checksum(relative: &str) -> Option<&'static str> {
    BUNDLED_CHECKSUMS
        .iter()
        .find(|(path, _)| *path == relative)
        .map(|(_, digest)| *digest)
}
