//! Test infrastructure: a scripted transport and JSON record builders.
//!
//! `MockTransport` implements the `Transport` trait over a path-to-response
//! map with a shared call log, so engine tests can count remote fetches and
//! script failures without a network. Clones share the log; keep one clone
//! as a probe before handing the transport to the client.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use serde_json::{json, Value};

use crate::records::PersonRecord;
use crate::transport::{Transport, TransportError, TransportErrorKind};

#[derive(Clone, Default)]
pub struct MockTransport {
    responses: HashMap<String, Value>,
    bytes: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    calls: Rc<RefCell<Vec<String>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a JSON response for a path.
    pub fn with(mut self, path: &str, body: Value) -> Self {
        self.responses.insert(path.to_string(), body);
        self
    }

    /// Script a binary response for a path.
    pub fn with_bytes(mut self, path: &str, body: &[u8]) -> Self {
        self.bytes.insert(path.to_string(), body.to_vec());
        self
    }

    /// Make a path fail with a network error.
    pub fn failing(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    pub fn call_count(&self, path: &str) -> usize {
        self.calls.borrow().iter().filter(|p| *p == path).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.borrow().len()
    }

    fn record(&self, path: &str) -> Result<(), TransportError> {
        self.calls.borrow_mut().push(path.to_string());
        if self.failing.contains(path) {
            return Err(TransportError {
                kind: TransportErrorKind::Network,
                status: None,
                message: format!("scripted failure for {path}"),
            });
        }
        Ok(())
    }
}

impl Transport for MockTransport {
    fn get_json(&self, path: &str, _params: &[(&str, &str)]) -> Result<Value, TransportError> {
        self.record(path)?;
        self.responses
            .get(path)
            .cloned()
            .ok_or_else(|| TransportError::from_status(404, "no scripted response"))
    }

    fn get_bytes(&self, path: &str) -> Result<Vec<u8>, TransportError> {
        self.record(path)?;
        self.bytes
            .get(path)
            .cloned()
            .ok_or_else(|| TransportError::from_status(404, "no scripted bytes"))
    }

    fn url_for(&self, path: &str) -> String {
        format!("mock://api/{path}")
    }
}

// ---------------------------------------------------------------------------
// Record builders
// ---------------------------------------------------------------------------

/// Builder for person payloads in the remote wire shape.
pub struct PersonBuilder {
    handle: String,
    first_name: String,
    surname: String,
    birth_ref_index: i64,
    death_ref_index: i64,
    event_handles: Vec<String>,
    family_handles: Vec<String>,
    media_handles: Vec<String>,
}

pub fn person(handle: &str, first_name: &str, surname: &str) -> PersonBuilder {
    PersonBuilder {
        handle: handle.to_string(),
        first_name: first_name.to_string(),
        surname: surname.to_string(),
        birth_ref_index: -1,
        death_ref_index: -1,
        event_handles: Vec::new(),
        family_handles: Vec::new(),
        media_handles: Vec::new(),
    }
}

impl PersonBuilder {
    pub fn events(mut self, handles: &[&str]) -> Self {
        self.event_handles = handles.iter().map(|h| h.to_string()).collect();
        self
    }

    pub fn families(mut self, handles: &[&str]) -> Self {
        self.family_handles = handles.iter().map(|h| h.to_string()).collect();
        self
    }

    pub fn media(mut self, handles: &[&str]) -> Self {
        self.media_handles = handles.iter().map(|h| h.to_string()).collect();
        self
    }

    pub fn birth_index(mut self, index: i64) -> Self {
        self.birth_ref_index = index;
        self
    }

    pub fn death_index(mut self, index: i64) -> Self {
        self.death_ref_index = index;
        self
    }

    pub fn build(&self) -> Value {
        json!({
            "handle": self.handle,
            "primary_name": {
                "first_name": self.first_name,
                "surname_list": [{ "surname": self.surname }],
            },
            "birth_ref_index": self.birth_ref_index,
            "death_ref_index": self.death_ref_index,
            "event_ref_list": self
                .event_handles
                .iter()
                .map(|h| json!({ "ref": h }))
                .collect::<Vec<_>>(),
            // Family memberships arrive as bare handle strings.
            "family_list": self.family_handles,
            "media_list": self
                .media_handles
                .iter()
                .map(|h| json!({ "ref": h }))
                .collect::<Vec<_>>(),
        })
    }

    pub fn build_record(&self) -> PersonRecord {
        serde_json::from_value(self.build()).expect("builder produced an undecodable person")
    }
}

/// Event payload with a `{"string": ...}` type wrapper and a `dateval` list.
pub fn event(handle: &str, kind: &str, dateval: Value) -> Value {
    json!({
        "handle": handle,
        "type": { "string": kind },
        "date": { "dateval": dateval },
    })
}

/// Marriage event payload.
pub fn marriage(handle: &str, dateval: Value) -> Value {
    event(handle, "Marriage", dateval)
}

/// Family payload linking parent handles and family-scoped events.
pub fn family(handle: &str, parent_handles: &[&str], event_handles: &[&str]) -> Value {
    json!({
        "handle": handle,
        "parent_rel_list": parent_handles
            .iter()
            .map(|h| json!({ "ref": h }))
            .collect::<Vec<_>>(),
        "event_ref_list": event_handles
            .iter()
            .map(|h| json!({ "ref": h }))
            .collect::<Vec<_>>(),
    })
}
