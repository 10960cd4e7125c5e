//! Engine-level scenarios against the scripted transport: the full
//! fetch -> hydrate -> resolve -> calculate pipeline, the anniversary
//! deduplication, and the cache's fetch-counting behavior.

use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;

use crate::cache::ResourceClass;
use crate::client::GrampsClient;
use crate::testing::{event, family, marriage, person, MockTransport};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn client(transport: MockTransport) -> GrampsClient {
    GrampsClient::new(Box::new(transport), Duration::from_secs(300))
}

#[test]
fn test_birthday_end_to_end() {
    let transport = MockTransport::new()
        .with(
            "people/",
            json!([person("p1", "Erdal", "Akkaya")
                .events(&["e1"])
                .birth_index(0)
                .build()]),
        )
        .with("events/e1", event("e1", "Birth", json!([15, 6, 1990])));
    let mut c = client(transport);

    let feed = c.birthdays_as_of(date(2024, 6, 10), 50).unwrap();
    assert_eq!(feed.len(), 1);

    let birthday = &feed[0];
    assert_eq!(birthday.person_name, "Erdal Akkaya");
    assert_eq!(birthday.birth_date, date(1990, 6, 15));
    assert_eq!(birthday.next_birthday, date(2024, 6, 15));
    assert_eq!(birthday.age, 34);
    assert_eq!(birthday.days_until, 5);
    assert_eq!(birthday.image_url, None);
}

#[test]
fn test_birthdays_skip_deceased_people() {
    let transport = MockTransport::new()
        .with(
            "people/",
            json!([
                person("p1", "Ada", "Lovelace")
                    .events(&["e_b1", "e_d1"])
                    .birth_index(0)
                    .death_index(1)
                    .build(),
                person("p2", "Grace", "Hopper")
                    .events(&["e_b2"])
                    .birth_index(0)
                    .build(),
            ]),
        )
        .with("events/e_b1", event("e_b1", "Birth", json!([10, 12, 1815])))
        .with("events/e_d1", event("e_d1", "Death", json!([27, 11, 1852])))
        .with("events/e_b2", event("e_b2", "Birth", json!([9, 12, 1906])));
    let mut c = client(transport);

    let feed = c.birthdays_as_of(date(2024, 6, 10), 50).unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].person_name, "Grace Hopper");
}

#[test]
fn test_birthdays_sorted_ascending_and_truncated() {
    let transport = MockTransport::new()
        .with(
            "people/",
            json!([
                person("p_far", "Far", "Out").events(&["e_far"]).birth_index(0).build(),
                person("p_near", "Near", "In").events(&["e_near"]).birth_index(0).build(),
            ]),
        )
        .with("events/e_far", event("e_far", "Birth", json!([1, 7, 1985])))
        .with("events/e_near", event("e_near", "Birth", json!([15, 6, 1990])));
    let mut c = client(transport);

    let feed = c.birthdays_as_of(date(2024, 6, 10), 50).unwrap();
    assert_eq!(feed.len(), 2);
    assert!(feed[0].days_until <= feed[1].days_until);
    assert_eq!(feed[0].person_name, "Near In");

    // Limit truncates after ordering; the cached payload is unaffected.
    let top = c.birthdays_as_of(date(2024, 6, 10), 1).unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].person_name, "Near In");
}

#[test]
fn test_summary_records_hydrate_during_feed_computation() {
    // The people list carries no event references; the detailed record does.
    let transport = MockTransport::new()
        .with("people/", json!([person("p1", "Erdal", "Akkaya").build()]))
        .with(
            "people/p1",
            person("p1", "Erdal", "Akkaya")
                .events(&["e1"])
                .birth_index(0)
                .build(),
        )
        .with("events/e1", event("e1", "Birth", json!([15, 6, 1990])));
    let probe = transport.clone();
    let mut c = client(transport);

    let feed = c.birthdays_as_of(date(2024, 6, 10), 50).unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].age, 34);
    assert_eq!(probe.call_count("people/p1"), 1);
}

#[test]
fn test_failed_event_fetch_drops_only_that_person() {
    let transport = MockTransport::new()
        .with(
            "people/",
            json!([
                person("p1", "Ada", "Lovelace").events(&["e_bad"]).birth_index(0).build(),
                person("p2", "Grace", "Hopper").events(&["e_ok"]).birth_index(0).build(),
            ]),
        )
        .failing("events/e_bad")
        .with("events/e_ok", event("e_ok", "Birth", json!([9, 12, 1906])));
    let mut c = client(transport);

    let feed = c.birthdays_as_of(date(2024, 6, 10), 50).unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].person_name, "Grace Hopper");
}

#[test]
fn test_deathday_end_to_end() {
    let transport = MockTransport::new()
        .with(
            "people/",
            json!([person("p1", "Nikola", "Tesla")
                .events(&["e_d"])
                .death_index(0)
                .build()]),
        )
        .with("events/e_d", event("e_d", "Death", json!([7, 1, 1943])));
    let mut c = client(transport);

    let today = date(2024, 6, 10);
    let feed = c.deathdays_as_of(today, 50).unwrap();
    assert_eq!(feed.len(), 1);

    let deathday = &feed[0];
    assert_eq!(deathday.person_name, "Nikola Tesla");
    assert_eq!(deathday.death_date, date(1943, 1, 7));
    assert_eq!(deathday.next_deathday, date(2025, 1, 7));
    assert_eq!(deathday.years_ago, 2025 - 1943);
    assert_eq!(
        deathday.days_until,
        (date(2025, 1, 7) - today).num_days()
    );
}

#[test]
fn test_shared_marriage_event_yields_exactly_one_anniversary() {
    // Two person records, one family, one marriage event: the classic
    // double-count trap.
    let transport = MockTransport::new()
        .with(
            "people/",
            json!([
                person("p1", "Erdal", "Akkaya").families(&["f1"]).events(&["e_x1"]).build(),
                person("p2", "Mina", "Akkaya").families(&["f1"]).events(&["e_x2"]).build(),
            ]),
        )
        .with("families/f1", family("f1", &["p1", "p2"], &["e_marr"]))
        .with("events/e_marr", marriage("e_marr", json!([20, 5, 2010])))
        .with("events/e_x1", event("e_x1", "Residence", json!([1, 1, 2011])))
        .with("events/e_x2", event("e_x2", "Residence", json!([1, 1, 2011])))
        .with("people/p1", person("p1", "Erdal", "Akkaya").build())
        .with("people/p2", person("p2", "Mina", "Akkaya").build());
    let mut c = client(transport);

    let today = date(2024, 6, 10);
    let feed = c.anniversaries_as_of(today, 50).unwrap();
    assert_eq!(feed.len(), 1, "one marriage event must yield one entry");

    let anniversary = &feed[0];
    // Both participants were collected; first two in lexical order.
    assert_eq!(anniversary.person_name, "Erdal Akkaya & Mina Akkaya");
    assert_eq!(anniversary.marriage_date, date(2010, 5, 20));
    assert_eq!(anniversary.next_anniversary, date(2025, 5, 20));
    assert_eq!(anniversary.years_together, 15);
    assert_eq!(
        anniversary.days_until,
        (date(2025, 5, 20) - today).num_days()
    );
}

#[test]
fn test_lone_participant_paired_with_resolved_spouse() {
    // Only one side of the couple is in the people list; the family still
    // names the other parent, whose record resolves the display name.
    let transport = MockTransport::new()
        .with(
            "people/",
            json!([person("p1", "Erdal", "Akkaya").families(&["f1"]).build()]),
        )
        .with("families/f1", family("f1", &["p1", "p2"], &["e_marr"]))
        .with("events/e_marr", marriage("e_marr", json!([20, 5, 2010])))
        .with("people/p1", person("p1", "Erdal", "Akkaya").build())
        .with("people/p2", person("p2", "Mina", "Akkaya").build());
    let mut c = client(transport);

    let feed = c.anniversaries_as_of(date(2024, 6, 10), 50).unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].person_name, "Erdal Akkaya & Mina Akkaya");
}

#[test]
fn test_undated_marriage_contributes_nothing() {
    let transport = MockTransport::new()
        .with(
            "people/",
            json!([person("p1", "Erdal", "Akkaya").families(&["f1"]).build()]),
        )
        .with("families/f1", family("f1", &["p1", "p2"], &["e_marr"]))
        .with("events/e_marr", event("e_marr", "Marriage", json!(null)))
        .with("people/p1", person("p1", "Erdal", "Akkaya").build());
    let mut c = client(transport);

    let feed = c.anniversaries_as_of(date(2024, 6, 10), 50).unwrap();
    assert!(feed.is_empty());
}

#[test]
fn test_cache_hit_within_ttl_single_fetch_sequence() {
    let transport = MockTransport::new()
        .with(
            "people/",
            json!([person("p1", "Erdal", "Akkaya")
                .events(&["e1"])
                .birth_index(0)
                .build()]),
        )
        .with("events/e1", event("e1", "Birth", json!([15, 6, 1990])));
    let probe = transport.clone();
    let mut c = client(transport);

    let first = c.birthdays_as_of(date(2024, 6, 10), 50).unwrap();
    let calls_after_first = probe.total_calls();
    let second = c.birthdays_as_of(date(2024, 6, 10), 50).unwrap();

    assert_eq!(first, second, "cached payload must be identical");
    assert_eq!(
        probe.total_calls(),
        calls_after_first,
        "second read within TTL must not contact the remote service"
    );
    assert!(c.cache().is_valid(ResourceClass::Birthdays));
    assert!(c.cache().is_valid(ResourceClass::People));
}

#[test]
fn test_cache_expiry_triggers_fresh_fetch() {
    let transport = MockTransport::new()
        .with(
            "people/",
            json!([person("p1", "Erdal", "Akkaya")
                .events(&["e1"])
                .birth_index(0)
                .build()]),
        )
        .with("events/e1", event("e1", "Birth", json!([15, 6, 1990])));
    let probe = transport.clone();
    let mut c = GrampsClient::new(Box::new(transport), Duration::ZERO);

    c.birthdays_as_of(date(2024, 6, 10), 50).unwrap();
    let people_fetches = probe.call_count("people/");
    c.birthdays_as_of(date(2024, 6, 10), 50).unwrap();

    assert_eq!(probe.call_count("people/"), people_fetches * 2);
    assert!(!c.cache().is_valid(ResourceClass::Birthdays));
}

#[test]
fn test_feeds_share_the_people_slot() {
    let transport = MockTransport::new()
        .with(
            "people/",
            json!([person("p1", "Erdal", "Akkaya")
                .events(&["e1"])
                .birth_index(0)
                .death_index(-1)
                .build()]),
        )
        .with("events/e1", event("e1", "Birth", json!([15, 6, 1990])));
    let probe = transport.clone();
    let mut c = client(transport);

    c.birthdays_as_of(date(2024, 6, 10), 50).unwrap();
    c.deathdays_as_of(date(2024, 6, 10), 50).unwrap();
    c.anniversaries_as_of(date(2024, 6, 10), 50).unwrap();

    assert_eq!(
        probe.call_count("people/"),
        1,
        "all three feeds within one TTL window share one people fetch"
    );
}

#[test]
fn test_probe_reports_sampled_shapes() {
    let transport = MockTransport::new()
        .with(
            "people/",
            json!([person("p1", "Erdal", "Akkaya")
                .events(&["e1"])
                .birth_index(0)
                .build()]),
        )
        .with("events/e1", event("e1", "Birth", json!([15, 6, 1990])));
    let mut c = client(transport);

    let report = c.probe(5).unwrap();
    assert_eq!(report.people_total, 1);
    assert_eq!(report.sample.len(), 1);
    assert_eq!(report.sample[0].name, "Erdal Akkaya");
    assert!(report.sample[0].birth_resolves);
    assert!(!report.sample[0].death_resolves);
}
