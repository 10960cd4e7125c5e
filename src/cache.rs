//! Short-TTL memoization of fetched and computed feeds.
//!
//! One slot per resource class, stamped with a monotonic instant so TTL
//! windows don't jump with wall-clock changes. Invalidation is time-only;
//! the remote side has no way to push-invalidate us.

use std::time::{Duration, Instant};

use crate::occurrence::{Anniversary, Birthday, Deathday};
use crate::records::PersonRecord;

/// The cacheable resource classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    People,
    Birthdays,
    Deathdays,
    Anniversaries,
}

#[derive(Debug, Default)]
struct Slot<T> {
    entry: Option<(T, Instant)>,
}

impl<T: Clone> Slot<T> {
    fn is_valid(&self, ttl: Duration) -> bool {
        self.entry
            .as_ref()
            .is_some_and(|(_, stamped)| stamped.elapsed() < ttl)
    }

    fn get(&self, ttl: Duration) -> Option<T> {
        self.entry
            .as_ref()
            .filter(|(_, stamped)| stamped.elapsed() < ttl)
            .map(|(payload, _)| payload.clone())
    }

    fn put(&mut self, payload: T) {
        self.entry = Some((payload, Instant::now()));
    }
}

/// Per-resource-class TTL cache. Slots store the *untruncated* computed
/// payloads; callers apply their `limit` on the way out, so differing limits
/// within one TTL window share a single fetch pass.
#[derive(Debug)]
pub struct ResultCache {
    ttl: Duration,
    people: Slot<Vec<PersonRecord>>,
    birthdays: Slot<Vec<Birthday>>,
    deathdays: Slot<Vec<Deathday>>,
    anniversaries: Slot<Vec<Anniversary>>,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            people: Slot::default(),
            birthdays: Slot::default(),
            deathdays: Slot::default(),
            anniversaries: Slot::default(),
        }
    }

    /// Whether a read of `class` right now would be served from the cache.
    pub fn is_valid(&self, class: ResourceClass) -> bool {
        match class {
            ResourceClass::People => self.people.is_valid(self.ttl),
            ResourceClass::Birthdays => self.birthdays.is_valid(self.ttl),
            ResourceClass::Deathdays => self.deathdays.is_valid(self.ttl),
            ResourceClass::Anniversaries => self.anniversaries.is_valid(self.ttl),
        }
    }

    pub fn people(&self) -> Option<Vec<PersonRecord>> {
        self.people.get(self.ttl)
    }

    pub fn store_people(&mut self, people: Vec<PersonRecord>) {
        self.people.put(people);
    }

    pub fn birthdays(&self) -> Option<Vec<Birthday>> {
        self.birthdays.get(self.ttl)
    }

    pub fn store_birthdays(&mut self, feed: Vec<Birthday>) {
        self.birthdays.put(feed);
    }

    pub fn deathdays(&self) -> Option<Vec<Deathday>> {
        self.deathdays.get(self.ttl)
    }

    pub fn store_deathdays(&mut self, feed: Vec<Deathday>) {
        self.deathdays.put(feed);
    }

    pub fn anniversaries(&self) -> Option<Vec<Anniversary>> {
        self.anniversaries.get(self.ttl)
    }

    pub fn store_anniversaries(&mut self, feed: Vec<Anniversary>) {
        self.anniversaries.put(feed);
    }
}
