//! The resolution engine: turns the remote record graph into the three
//! occurrence feeds.
//!
//! One `GrampsClient` is constructed per polling session and holds all the
//! state there is: the transport (with its token), the TTL cache slots and
//! the image store. Each public operation is a pure function of the remote
//! graph at fetch time, modulo cache staleness.
//!
//! Failure policy: the top-level people fetch propagates so the host can
//! mark the whole poll failed; every other remote or resolution failure
//! degrades to "this record contributes nothing".

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::ResultCache;
use crate::config::AppConfig;
use crate::images::ImageStore;
use crate::occurrence::{next_occurrence, Anniversary, Birthday, Deathday};
use crate::records::{EventRecord, FamilyRecord, PersonRecord};
use crate::refs::resolve_handle;
use crate::transport::{HttpTransport, Transport};

/// Which role-indexed event a lookup is after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRole {
    Birth,
    Death,
}

impl EventRole {
    /// Keyword the event's type classification must contain.
    fn keyword(self) -> &'static str {
        match self {
            EventRole::Birth => "birth",
            EventRole::Death => "death",
        }
    }

    fn ref_index(self, person: &PersonRecord) -> i64 {
        match self {
            EventRole::Birth => person.birth_ref_index,
            EventRole::Death => person.death_ref_index,
        }
    }
}

/// A marriage/engagement event seen from one person's perspective.
struct MarriageHit {
    spouse_name: Option<String>,
    date: NaiveDate,
    event_handle: String,
}

/// Accumulated participants for one (date, event) pair across all people.
#[derive(Default)]
struct PairSeen {
    names: BTreeSet<String>,
    spouse_name: Option<String>,
}

pub struct GrampsClient {
    transport: Box<dyn Transport>,
    cache: ResultCache,
    images: Option<ImageStore>,
    thumbnail_size: u32,
    surname_filters: Vec<String>,
}

impl GrampsClient {
    pub fn new(transport: Box<dyn Transport>, cache_ttl: Duration) -> Self {
        Self {
            transport,
            cache: ResultCache::new(cache_ttl),
            images: None,
            thumbnail_size: 200,
            surname_filters: Vec::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(
            &config.gramps.url,
            Some(config.gramps.username.as_str()),
            Some(config.gramps.password.as_str()),
        )?;

        let mut client = Self::new(
            Box::new(transport),
            Duration::from_secs(config.feeds.cache_ttl_secs),
        )
        .with_surname_filter(&config.gramps.surname_filter);

        if let Some(dir) = &config.images.dir {
            let store = ImageStore::new(dir, &config.images.public_prefix)
                .with_context(|| format!("failed to prepare image directory {dir}"))?;
            client = client.with_images(store, config.images.thumbnail_size);
        }

        Ok(client)
    }

    /// Comma-separated, case-insensitive surname filter; empty disables.
    pub fn with_surname_filter(mut self, filter: &str) -> Self {
        self.surname_filters = filter
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    pub fn with_images(mut self, store: ImageStore, thumbnail_size: u32) -> Self {
        self.images = Some(store);
        self.thumbnail_size = thumbnail_size;
        self
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    // -----------------------------------------------------------------
    // Public feed operations
    // -----------------------------------------------------------------

    /// Upcoming birthdays of living people, ascending by days-until.
    pub fn get_birthdays(&mut self, limit: usize) -> anyhow::Result<Vec<Birthday>> {
        self.birthdays_as_of(Local::now().date_naive(), limit)
    }

    /// Upcoming memorial days, ascending by days-until.
    pub fn get_deathdays(&mut self, limit: usize) -> anyhow::Result<Vec<Deathday>> {
        self.deathdays_as_of(Local::now().date_naive(), limit)
    }

    /// Upcoming wedding anniversaries, one entry per marriage event,
    /// ascending by days-until.
    pub fn get_anniversaries(&mut self, limit: usize) -> anyhow::Result<Vec<Anniversary>> {
        self.anniversaries_as_of(Local::now().date_naive(), limit)
    }

    pub(crate) fn birthdays_as_of(
        &mut self,
        today: NaiveDate,
        limit: usize,
    ) -> anyhow::Result<Vec<Birthday>> {
        if let Some(cached) = self.cache.birthdays() {
            debug!("Serving birthdays from cache");
            return Ok(truncated(cached, limit));
        }

        let mut people = self.people()?;
        let total = people.len();

        let mut feed = Vec::new();
        let mut deceased = 0usize;
        for person in &mut people {
            self.hydrate(person);

            let Some(birth_date) = self.event_date_for(person, EventRole::Birth) else {
                continue;
            };
            if !self.is_alive(person) {
                deceased += 1;
                debug!(name = %person.display_name(), "Skipping deceased person");
                continue;
            }
            let Some(next) = next_occurrence(birth_date, today) else {
                continue;
            };

            feed.push(Birthday {
                person_name: person.display_name(),
                birth_date,
                next_birthday: next.date,
                age: next.years,
                days_until: next.days_until,
                image_url: self.person_image(person),
            });
        }

        feed.sort_by_key(|b| b.days_until);
        info!(
            total,
            birthdays = feed.len(),
            deceased,
            "Computed birthday feed"
        );

        self.cache.store_birthdays(feed.clone());
        Ok(truncated(feed, limit))
    }

    pub(crate) fn deathdays_as_of(
        &mut self,
        today: NaiveDate,
        limit: usize,
    ) -> anyhow::Result<Vec<Deathday>> {
        if let Some(cached) = self.cache.deathdays() {
            debug!("Serving deathdays from cache");
            return Ok(truncated(cached, limit));
        }

        let mut people = self.people()?;
        let total = people.len();

        let mut feed = Vec::new();
        for person in &mut people {
            self.hydrate(person);

            let Some(death_date) = self.event_date_for(person, EventRole::Death) else {
                continue;
            };
            let Some(next) = next_occurrence(death_date, today) else {
                continue;
            };

            feed.push(Deathday {
                person_name: person.display_name(),
                death_date,
                next_deathday: next.date,
                years_ago: next.years,
                days_until: next.days_until,
            });
        }

        feed.sort_by_key(|d| d.days_until);
        info!(total, deathdays = feed.len(), "Computed memorial feed");

        self.cache.store_deathdays(feed.clone());
        Ok(truncated(feed, limit))
    }

    pub(crate) fn anniversaries_as_of(
        &mut self,
        today: NaiveDate,
        limit: usize,
    ) -> anyhow::Result<Vec<Anniversary>> {
        if let Some(cached) = self.cache.anniversaries() {
            debug!("Serving anniversaries from cache");
            return Ok(truncated(cached, limit));
        }

        let mut people = self.people()?;

        // First pass: collect participants per (date, event) pair. A marriage
        // is an event shared by two independent person records; a naive
        // per-person pass would double-count it.
        let mut pairs: BTreeMap<(NaiveDate, String), PairSeen> = BTreeMap::new();
        let mut marriage_events = 0usize;
        for person in &mut people {
            self.hydrate(person);
            let name = person.display_name();

            for hit in self.marriage_events(person) {
                marriage_events += 1;
                let seen = pairs
                    .entry((hit.date, hit.event_handle))
                    .or_default();
                seen.names.insert(name.clone());
                if seen.spouse_name.is_none() {
                    seen.spouse_name = hit.spouse_name;
                }
            }
        }

        // Second pass: one entry per unique event handle.
        let mut emitted: HashSet<String> = HashSet::new();
        let mut feed = Vec::new();
        for ((date, event_handle), seen) in &pairs {
            if !emitted.insert(event_handle.clone()) {
                continue;
            }

            let mut names = seen.names.iter().cloned();
            let first = match names.next() {
                Some(first) => first,
                None => continue,
            };
            let person_name = match names.next() {
                Some(second) => format!("{first} & {second}"),
                None => match &seen.spouse_name {
                    Some(spouse) => format!("{first} & {spouse}"),
                    None => first,
                },
            };

            let Some(next) = next_occurrence(*date, today) else {
                continue;
            };
            feed.push(Anniversary {
                person_name,
                marriage_date: *date,
                next_anniversary: next.date,
                years_together: next.years,
                days_until: next.days_until,
            });
        }

        feed.sort_by_key(|a| a.days_until);
        info!(
            marriage_events,
            anniversaries = feed.len(),
            "Computed anniversary feed after deduplication"
        );

        self.cache.store_anniversaries(feed.clone());
        Ok(truncated(feed, limit))
    }

    // -----------------------------------------------------------------
    // People fetch + hydration
    // -----------------------------------------------------------------

    /// The people list, filtered and cached. This is the one fetch whose
    /// failure propagates.
    fn people(&mut self) -> anyhow::Result<Vec<PersonRecord>> {
        if let Some(cached) = self.cache.people() {
            return Ok(cached);
        }

        let payload = self
            .transport
            .get_json("people/", &[])
            .context("failed to fetch people from Gramps Web")?;
        let Value::Array(entries) = payload else {
            anyhow::bail!("people response was not a list");
        };

        // An undecodable entry drops that one record, not the batch.
        let total = entries.len();
        let mut people = Vec::with_capacity(total);
        for entry in entries {
            match serde_json::from_value::<PersonRecord>(entry) {
                Ok(person) => people.push(person),
                Err(e) => debug!("Skipping undecodable person record: {}", e),
            }
        }
        let people = self.apply_surname_filter(people);
        info!(total, kept = people.len(), "Fetched people");

        self.cache.store_people(people.clone());
        Ok(people)
    }

    fn apply_surname_filter(&self, people: Vec<PersonRecord>) -> Vec<PersonRecord> {
        if self.surname_filters.is_empty() {
            return people;
        }
        people
            .into_iter()
            .filter(|person| {
                self.surname_filters
                    .iter()
                    .any(|needle| person.surname_matches(needle))
            })
            .collect()
    }

    /// Make sure a summary record carries its event references, re-fetching
    /// the detailed record when they are missing. Copies only
    /// `event_ref_list` and the two role indexes; never fails, a fetch
    /// error just leaves the record as it was.
    fn hydrate(&self, person: &mut PersonRecord) {
        if !person.event_ref_list.is_empty() {
            return;
        }
        if person.handle.is_empty() {
            return;
        }

        let path = format!("people/{}", person.handle);
        let detailed: PersonRecord = match self
            .transport
            .get_json(&path, &[])
            .map_err(anyhow::Error::from)
            .and_then(|v| serde_json::from_value(v).map_err(anyhow::Error::from))
        {
            Ok(detailed) => detailed,
            Err(e) => {
                debug!(handle = %person.handle, "Could not fetch detailed person: {}", e);
                return;
            }
        };

        person.event_ref_list = detailed.event_ref_list;
        person.birth_ref_index = detailed.birth_ref_index;
        person.death_ref_index = detailed.death_ref_index;
    }

    // -----------------------------------------------------------------
    // Event resolution
    // -----------------------------------------------------------------

    fn fetch_event(&self, handle: &str) -> Option<EventRecord> {
        let payload = match self.transport.get_json(&format!("events/{handle}"), &[]) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(handle, "Could not fetch event: {}", e);
                return None;
            }
        };
        let event: EventRecord = serde_json::from_value(payload).ok()?;
        debug!(handle = %event.handle, kind = %event.type_string(), "Fetched event");
        Some(event)
    }

    fn fetch_family(&self, handle: &str) -> Option<FamilyRecord> {
        let payload = match self.transport.get_json(&format!("families/{handle}"), &[]) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(handle, "Could not fetch family: {}", e);
                return None;
            }
        };
        serde_json::from_value(payload).ok()
    }

    /// Fetch an event and accept its date only when the type classification
    /// contains `keyword`.
    fn typed_event_date(&self, handle: &str, keyword: &str) -> Option<NaiveDate> {
        let event = self.fetch_event(handle)?;
        if !event.is_kind(keyword) {
            return None;
        }
        event.resolved_date()
    }

    /// Two-tier lookup for a role-typed event date: the role index is
    /// authoritative when it resolves; otherwise every event reference is
    /// scanned for the first type-matching, date-resolvable event. The
    /// fallback exists because the index field is frequently absent or
    /// mis-set in the source data.
    fn event_date_for(&self, person: &PersonRecord, role: EventRole) -> Option<NaiveDate> {
        if let Some(reference) = indexed_ref(person, role.ref_index(person)) {
            if let Some(handle) = resolve_handle(reference) {
                if let Some(date) = self.typed_event_date(&handle, role.keyword()) {
                    return Some(date);
                }
            }
        }

        for reference in &person.event_ref_list {
            let Some(handle) = resolve_handle(reference) else {
                continue;
            };
            if let Some(date) = self.typed_event_date(&handle, role.keyword()) {
                return Some(date);
            }
        }

        None
    }

    /// Alive unless the death index resolves all the way to a death-typed
    /// event with a parseable date. The scan fallback deliberately does not
    /// apply here; an unset index means "no recorded death".
    fn is_alive(&self, person: &PersonRecord) -> bool {
        let Some(reference) = indexed_ref(person, person.death_ref_index) else {
            return true;
        };
        let Some(handle) = resolve_handle(reference) else {
            return true;
        };
        self.typed_event_date(&handle, EventRole::Death.keyword())
            .is_none()
    }

    // -----------------------------------------------------------------
    // Anniversary collection
    // -----------------------------------------------------------------

    /// All marriage/engagement events visible from one person: events on the
    /// families the person belongs to (where marriages actually live) plus
    /// marriage-typed events attached directly to the person. Candidate
    /// spouses are the other parents of those families.
    fn marriage_events(&self, person: &PersonRecord) -> Vec<MarriageHit> {
        let mut hits = Vec::new();
        let mut spouse_handles: BTreeSet<String> = BTreeSet::new();

        for family_ref in &person.family_list {
            let Some(family_handle) = resolve_handle(family_ref) else {
                continue;
            };
            let Some(family) = self.fetch_family(&family_handle) else {
                continue;
            };

            for relation in &family.parent_rel_list {
                if let Some(handle) = resolve_handle(relation) {
                    if handle != person.handle {
                        spouse_handles.insert(handle);
                    }
                }
            }

            for event_ref in &family.event_ref_list {
                let Some(event_handle) = resolve_handle(event_ref) else {
                    continue;
                };
                self.push_marriage_hits(&event_handle, &spouse_handles, &mut hits);
            }
        }

        for event_ref in &person.event_ref_list {
            let Some(event_handle) = resolve_handle(event_ref) else {
                continue;
            };
            self.push_marriage_hits(&event_handle, &spouse_handles, &mut hits);
        }

        hits
    }

    /// If the event is a dated marriage/engagement, record one hit per known
    /// candidate spouse (or a spouse-less hit when no family names one).
    fn push_marriage_hits(
        &self,
        event_handle: &str,
        spouse_handles: &BTreeSet<String>,
        hits: &mut Vec<MarriageHit>,
    ) {
        let Some(event) = self.fetch_event(event_handle) else {
            return;
        };
        if !event.is_kind("marriage") && !event.is_kind("engagement") {
            return;
        }
        let Some(date) = event.resolved_date() else {
            return;
        };

        if spouse_handles.is_empty() {
            hits.push(MarriageHit {
                spouse_name: None,
                date,
                event_handle: event_handle.to_string(),
            });
            return;
        }

        for spouse_handle in spouse_handles {
            hits.push(MarriageHit {
                spouse_name: self.person_name_by_handle(spouse_handle),
                date,
                event_handle: event_handle.to_string(),
            });
        }
    }

    fn person_name_by_handle(&self, handle: &str) -> Option<String> {
        let payload = self.transport.get_json(&format!("people/{handle}"), &[]).ok()?;
        let person: PersonRecord = serde_json::from_value(payload).ok()?;
        Some(person.display_name())
    }

    // -----------------------------------------------------------------
    // Images
    // -----------------------------------------------------------------

    /// Stable reference to the person's profile thumbnail, if they have
    /// media attached.
    fn person_image(&self, person: &PersonRecord) -> Option<String> {
        if person.handle.is_empty() {
            return None;
        }
        let media_ref = person.media_list.first()?;
        let media_handle = resolve_handle(media_ref)?;
        let path = format!("media/{}/thumbnail/{}", media_handle, self.thumbnail_size);

        match &self.images {
            Some(store) => Some(store.fetch(
                self.transport.as_ref(),
                &path,
                &person.handle,
                &media_handle,
            )),
            None => Some(self.transport.url_for(&path)),
        }
    }

    // -----------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------

    /// Connectivity and data-shape probe: fetches the people list and
    /// inspects the first `sample` records the way the feeds would.
    pub fn probe(&mut self, sample: usize) -> anyhow::Result<ProbeReport> {
        let mut people = self.people()?;
        let people_total = people.len();

        let mut sampled = Vec::new();
        for person in people.iter_mut().take(sample) {
            self.hydrate(person);
            sampled.push(ProbePerson {
                name: person.display_name(),
                handle: person.handle.clone(),
                event_refs: person.event_ref_list.len(),
                birth_ref_index: person.birth_ref_index,
                death_ref_index: person.death_ref_index,
                birth_resolves: self.event_date_for(person, EventRole::Birth).is_some(),
                death_resolves: self.event_date_for(person, EventRole::Death).is_some(),
            });
        }

        Ok(ProbeReport {
            people_total,
            sample: sampled,
        })
    }
}

/// Valid index into the person's event references, or `None`.
fn indexed_ref(person: &PersonRecord, index: i64) -> Option<&Value> {
    if index < 0 {
        return None;
    }
    person.event_ref_list.get(index as usize)
}

fn truncated<T>(mut feed: Vec<T>, limit: usize) -> Vec<T> {
    feed.truncate(limit);
    feed
}

/// What `probe` reports, one entry per sampled person.
#[derive(Debug, Serialize)]
pub struct ProbeReport {
    pub people_total: usize,
    pub sample: Vec<ProbePerson>,
}

#[derive(Debug, Serialize)]
pub struct ProbePerson {
    pub name: String,
    pub handle: String,
    pub event_refs: usize,
    pub birth_ref_index: i64,
    pub death_ref_index: i64,
    pub birth_resolves: bool,
    pub death_resolves: bool,
}
