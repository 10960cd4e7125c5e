//! Next-occurrence calculation and the derived feed records.
//!
//! Everything here is calendar-date arithmetic only; the engine never looks
//! at clock time or timezones.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// The upcoming occurrence of a historical date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextOccurrence {
    /// The next calendar date the event recurs on (today counts).
    pub date: NaiveDate,
    /// `next.year - base.year`: the age reached, or years elapsed, *on* the
    /// next occurrence. Deliberately future-facing rather than the present
    /// count; pending product confirmation (see DESIGN.md) this is kept for
    /// all three feeds.
    pub years: i32,
    /// Whole days from `today` to the next occurrence; 0 means today.
    pub days_until: i64,
}

/// Compute the next occurrence of `base` on or after `today`.
///
/// This year's anniversary is used unless it has already passed, in which
/// case the date advances one year. Returns `None` for a Feb 29 base whose
/// target year has no Feb 29; the record simply contributes nothing that
/// cycle.
pub fn next_occurrence(base: NaiveDate, today: NaiveDate) -> Option<NextOccurrence> {
    let this_year = base.with_year(today.year())?;
    let next = if this_year < today {
        base.with_year(today.year() + 1)?
    } else {
        this_year
    };

    Some(NextOccurrence {
        date: next,
        years: next.year() - base.year(),
        days_until: (next - today).num_days(),
    })
}

/// An upcoming birthday of a living person.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Birthday {
    pub person_name: String,
    pub birth_date: NaiveDate,
    pub next_birthday: NaiveDate,
    pub age: i32,
    pub days_until: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// An upcoming memorial day (death anniversary).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deathday {
    pub person_name: String,
    pub death_date: NaiveDate,
    pub next_deathday: NaiveDate,
    pub years_ago: i32,
    pub days_until: i64,
}

/// An upcoming wedding anniversary, one entry per marriage event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anniversary {
    pub person_name: String,
    pub marriage_date: NaiveDate,
    pub next_anniversary: NaiveDate,
    pub years_together: i32,
    pub days_until: i64,
}
