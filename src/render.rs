//! Text rendering of resource bodies.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value;

const INDENT: &[u8] = b"    ";

/// Render `body` as pretty JSON: four-space indent, keys in insertion order,
/// trailing newline.
///
/// # Errors
///
/// Returns the serializer error; with `Value` input this only happens for
/// non-finite numbers, which `Value` cannot hold.
pub fn to_json_text(body: &Value) -> Result<String, serde_json::Error> {
    let mut out = Vec::with_capacity(128);
    let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(INDENT));
    body.serialize(&mut serializer)?;
    out.push(b'\n');
    // serde_json only writes valid UTF-8
    Ok(String::from_utf8_lossy(&out).into_owned())
}
