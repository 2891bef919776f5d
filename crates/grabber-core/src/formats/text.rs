//! Plain text.

/// Decode UTF-8 text, replacing invalid sequences.
pub fn extract(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}
