//! Reference-handle normalization.
//!
//! Gramps Web encodes the link to another record inconsistently: the handle
//! may sit under `ref`, `handle` or `hlink`, the reference may be a bare
//! string instead of an object (family membership arrives this way), and the
//! value itself is sometimes a path (`"events/abc123/"`) rather than a plain
//! identifier. Every reference goes through [`resolve_handle`] before it is
//! used in a fetch.

use serde_json::Value;

/// Field names that may carry the handle, in probe order.
const HANDLE_KEYS: [&str; 3] = ["ref", "handle", "hlink"];

/// Extract the canonical handle from a reference value.
///
/// Returns `None` when no handle field is present, when the value is not a
/// plain string, or when path trimming leaves nothing.
pub fn resolve_handle(reference: &Value) -> Option<String> {
    let raw = match reference {
        Value::String(s) => s.as_str(),
        // First non-empty candidate wins; a non-string candidate stops the
        // probe rather than falling through to a later key.
        Value::Object(map) => HANDLE_KEYS
            .iter()
            .find_map(|key| map.get(*key).filter(|v| !is_empty(v)))
            .and_then(Value::as_str)?,
        _ => return None,
    };

    if raw.is_empty() {
        return None;
    }

    // Path-shaped values keep only the trailing segment.
    let handle = if raw.contains('/') {
        raw.trim_end_matches('/').rsplit('/').next().unwrap_or("")
    } else {
        raw
    };

    if handle.is_empty() {
        None
    } else {
        Some(handle.to_string())
    }
}

fn is_empty(value: &Value) -> bool {
    matches!(value, Value::Null) || value.as_str() == Some("")
}
