//! Remote record shapes.
//!
//! Summary and detailed person records, events and families all arrive with
//! missing fields and loosely-typed sub-objects, so the structs default every
//! field and keep the genuinely ambiguous parts (`event_ref_list` entries,
//! event `type` descriptors, date payloads) as raw JSON to be probed by the
//! resolution helpers.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::dateval::parse_dateval;

/// Sentinel for "no birth/death event reference".
fn no_ref_index() -> i64 {
    -1
}

/// A person, in either summary or detailed form.
#[derive(Debug, Clone, Deserialize)]
pub struct PersonRecord {
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub primary_name: PrimaryName,
    /// Index of the birth event within `event_ref_list`; -1 when unset.
    #[serde(default = "no_ref_index")]
    pub birth_ref_index: i64,
    /// Index of the death event within `event_ref_list`; -1 when unset.
    #[serde(default = "no_ref_index")]
    pub death_ref_index: i64,
    /// Event references in one of several encodings; resolve before use.
    #[serde(default)]
    pub event_ref_list: Vec<Value>,
    /// Family memberships: bare handle strings or reference objects.
    #[serde(default)]
    pub family_list: Vec<Value>,
    #[serde(default)]
    pub media_list: Vec<Value>,
}

impl PersonRecord {
    /// Display name: given name plus the first surname, `"Unknown"` when
    /// neither is present.
    pub fn display_name(&self) -> String {
        let first = self.primary_name.first_name.trim();
        let surname = self
            .primary_name
            .surname_list
            .first()
            .map(|s| s.surname.trim())
            .unwrap_or("");

        let full = format!("{first} {surname}");
        let full = full.trim();
        if full.is_empty() {
            "Unknown".to_string()
        } else {
            full.to_string()
        }
    }

    /// True when any of the person's surnames contains `needle`
    /// (case-insensitive).
    pub fn surname_matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.primary_name
            .surname_list
            .iter()
            .any(|s| s.surname.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrimaryName {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub surname_list: Vec<Surname>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Surname {
    #[serde(default)]
    pub surname: String,
}

/// An event record. The `type` descriptor is either a plain string or a
/// `{"string": ...}` wrapper; the date payload shape is the dateval
/// heuristic's problem.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRecord {
    #[serde(default)]
    pub handle: String,
    #[serde(rename = "type", default)]
    pub kind: Value,
    #[serde(default)]
    pub date: Value,
}

impl EventRecord {
    /// The free-text type classification, whichever encoding it arrived in.
    pub fn type_string(&self) -> String {
        match &self.kind {
            Value::String(s) => s.clone(),
            Value::Object(map) => map
                .get("string")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Case-insensitive keyword test against the type classification.
    pub fn is_kind(&self, keyword: &str) -> bool {
        self.type_string().to_lowercase().contains(keyword)
    }

    /// The event's calendar date, when the payload resolves.
    pub fn resolved_date(&self) -> Option<NaiveDate> {
        parse_dateval(&self.date)
    }
}

/// A family record: candidate spouses plus family-scoped events
/// (marriages live here, not on the person). Only the fields the
/// anniversary pass reads are materialized.
#[derive(Debug, Clone, Deserialize)]
pub struct FamilyRecord {
    #[serde(default)]
    pub parent_rel_list: Vec<Value>,
    #[serde(default)]
    pub event_ref_list: Vec<Value>,
}
