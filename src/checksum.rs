//! Line checksum: XOR over the bytes of the payload.

/// XOR of every byte in `payload`. The empty string yields 0.
#[must_use]
pub fn calculate(payload: &str) -> u8 {
    payload.bytes().fold(0u8, |acc, b| acc ^ b)
}

/// Render a checksum the way it appears on the wire (`$` is not included).
#[must_use]
pub fn to_hex(sum: u8) -> String {
    format!("{sum:02X}")
}

/// Parse two hex digits (either case).
#[must_use]
pub fn parse_hex(s: &str) -> Option<u8> {
    if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(s, 16).ok()
}
