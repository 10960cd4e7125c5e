//! The `dateval` heuristic.
//!
//! Gramps Web serializes a date as a list of 3-4 integers whose field order
//! depends on how the record was entered, sometimes nested under a wrapper
//! key (`dateval`, `val` for plain values, `start` for ranges). The parser
//! tries a fixed list of field-order hypotheses and accepts the first one
//! that is structurally plausible.
//!
//! The hypothesis order is a deliberate disambiguation policy, not a guess;
//! callers must not reorder it.

use chrono::NaiveDate;
use serde_json::Value;

/// Wrapper keys a mapping-shaped payload may carry the list under.
const WRAPPER_KEYS: [&str; 3] = ["dateval", "val", "start"];

/// Field-order hypotheses as (year, month, day) positions into the list,
/// tried in priority order.
const HYPOTHESES: [(usize, usize, usize); 3] = [
    (2, 1, 0), // [day, month, year]
    (0, 1, 2), // [year, month, day]
    (0, 2, 1), // [year, day, month]
];

/// Years below this are assumed to be a swapped day/month field, not a year.
const MIN_PLAUSIBLE_YEAR: i64 = 100;

/// Convert a raw date payload into a calendar date.
///
/// Accepts a list of at least three integer-like values, or a mapping that
/// carries such a list under one of the wrapper keys. Returns `None` when
/// the shape does not match or no hypothesis produces a plausible date.
pub fn parse_dateval(raw: &Value) -> Option<NaiveDate> {
    // First wrapper key actually holding a list wins; a null or scalar
    // under one key falls through to the next.
    let list = match raw {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => WRAPPER_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))?
            .as_slice(),
        _ => return None,
    };

    if list.len() < 3 {
        return None;
    }

    // Only the first three entries carry day/month/year; a fourth entry
    // (calendar flags) is ignored.
    let mut vals = [0i64; 3];
    for (slot, item) in vals.iter_mut().zip(list.iter().take(3)) {
        *slot = coerce_int(item)?;
    }

    for (y_idx, m_idx, d_idx) in HYPOTHESES {
        let (year, month, day) = (vals[y_idx], vals[m_idx], vals[d_idx]);
        if year < MIN_PLAUSIBLE_YEAR {
            continue;
        }
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            continue;
        }
        // First range-plausible hypothesis wins. A combination that is
        // range-valid but not a real calendar date (Feb 30) is unresolvable;
        // it does not fall through to later hypotheses.
        return NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32);
    }

    None
}

/// Integer coercion: integers, integral-valued floats (truncated) and
/// numeric strings are accepted; everything else rejects the payload.
fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
