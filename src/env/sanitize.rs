//! Normalization of raw environment-variable values.

/// Trim surrounding whitespace and strip one matching outer quote pair.
///
/// Container runtimes and compose files frequently deliver values like
/// `"0.0.0.0"` or `'/downloads'`; the quotes are wrapper syntax, not data.
/// Only a single, matching pair is removed. Total function: no error cases.
pub fn sanitize(raw: &str) -> String {
    let trimmed = raw.trim();
    let bytes = trimmed.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}
