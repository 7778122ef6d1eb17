//! End-to-end booking flow over the in-memory store: draft creation,
//! activation with a weekly schedule, calendar projection, edits that
//! regenerate the horizon, and cascade deletion.

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use bookserver::bookings::lifecycle::{
    create_booking, delete_booking, update_booking,
};
use bookserver::bookings::{BookingItemRequest, CreateBookingRequest, UpdateBookingRequest};
use bookserver::calendar::project;
use bookserver::recurrence::reconcile;
use bookserver::shared::utils::bd_to_f64;
use bookserver::store::{BookingStore, MemoryStore};

fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
}

fn items() -> Vec<BookingItemRequest> {
    vec![
        BookingItemRequest {
            service_id: None,
            service_name: "Standard clean".to_string(),
            quantity: 2,
            unit_price: 45.0,
            minutes_per_unit: 60,
        },
        BookingItemRequest {
            service_id: None,
            service_name: "Inside fridge".to_string(),
            quantity: 1,
            unit_price: 25.0,
            minutes_per_unit: 30,
        },
    ]
}

fn web_request() -> CreateBookingRequest {
    CreateBookingRequest {
        customer_name: Some("Dana Whitfield".to_string()),
        customer_email: Some("dana@example.com".to_string()),
        customer_phone: None,
        address: Some("18 Harbour Road".to_string()),
        city: Some("Bristol".to_string()),
        postcode: Some("BS1 4QA".to_string()),
        frequency: "one_time".to_string(),
        service_date: None,
        arrival_window: "exact".to_string(),
        discount: 0.0,
        discount_code: None,
        notes: Some("Keys under the mat".to_string()),
        items: items(),
    }
}

fn admin_edit(frequency: &str, service_date: Option<DateTime<Utc>>) -> UpdateBookingRequest {
    UpdateBookingRequest {
        status: "active".to_string(),
        payment_status: Some("paid".to_string()),
        customer_name: Some("Dana Whitfield".to_string()),
        customer_email: Some("dana@example.com".to_string()),
        customer_phone: None,
        address: Some("18 Harbour Road".to_string()),
        city: Some("Bristol".to_string()),
        postcode: Some("BS1 4QA".to_string()),
        frequency: frequency.to_string(),
        service_date,
        arrival_window: "morning".to_string(),
        discount: 0.0,
        admin_total_override: None,
        admin_time_override: None,
        discount_code: None,
        notes: Some("Keys under the mat".to_string()),
        items: None,
    }
}

#[test]
fn booking_lifecycle_from_draft_to_weekly_series_and_back() {
    let store = MemoryStore::new();
    let now = utc(2024, 4, 1, 0);

    // Web submission lands as an unscheduled draft with computed totals.
    let (draft, draft_items) = create_booking(&store, web_request(), "web", 0.0, now).unwrap();
    assert_eq!(draft.status, "draft");
    assert_eq!(bd_to_f64(&draft.subtotal), 115.0);
    assert_eq!(draft.total_time_minutes, 150);
    assert_eq!(draft_items.len(), 2);
    assert!(store.rule_for_base(draft.id).unwrap().is_none());

    // Admin activates it as a weekly series anchored on a Monday morning.
    let anchor = utc(2024, 4, 8, 9);
    let (active, _) =
        update_booking(&store, draft.id, admin_edit("weekly", Some(anchor)), now).unwrap();
    assert_eq!(active.status, "active");

    let rule = store.rule_for_base(draft.id).unwrap().unwrap();
    assert!(rule.active);
    assert_eq!(rule.start_at, anchor);

    let occurrences = store.occurrences_of(rule.id).unwrap();
    assert_eq!(occurrences.len(), 6);
    let mut dates: Vec<_> = occurrences.iter().filter_map(|o| o.service_date).collect();
    dates.sort();
    for (i, date) in dates.iter().enumerate() {
        assert_eq!(*date, anchor + Duration::days(7 * (i as i64 + 1)));
    }
    // Occurrences carry the base snapshot.
    for occ in &occurrences {
        assert_eq!(bd_to_f64(&occ.subtotal), 115.0);
        assert_eq!(store.items_for(occ.id).unwrap().len(), 2);
        assert_eq!(occ.recurrence_id, Some(rule.id));
    }

    // Re-running the same edit is a no-op in shape: still exactly six.
    let (active, active_items) =
        update_booking(&store, draft.id, admin_edit("weekly", Some(anchor)), now).unwrap();
    assert_eq!(store.occurrences_of(rule.id).unwrap().len(), 6);
    reconcile(&store, &active, &active_items, now).unwrap();
    assert_eq!(store.occurrences_of(rule.id).unwrap().len(), 6);

    // The calendar projects the series virtually without duplicating the
    // materialized rows: April Mondays from the 8th.
    let events = project(&store, utc(2024, 4, 1, 0), utc(2024, 5, 1, 0)).unwrap();
    assert_eq!(events.len(), 4);
    assert!(events.iter().all(|e| e.booking_id == draft.id));
    assert_eq!(events[0].start, anchor);
    assert_eq!(events[0].end, anchor + Duration::minutes(150));

    // Dropping back to one-time clears the schedule.
    update_booking(&store, draft.id, admin_edit("one_time", Some(anchor)), now).unwrap();
    let rule = store.rule_for_base(draft.id).unwrap().unwrap();
    assert!(!rule.active);
    assert!(store.occurrences_of(rule.id).unwrap().is_empty());

    let events = project(&store, utc(2024, 4, 1, 0), utc(2024, 5, 1, 0)).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].start, anchor);
}

#[test]
fn moving_the_anchor_regenerates_future_occurrences() {
    let store = MemoryStore::new();
    let now = utc(2024, 4, 1, 0);
    let (draft, _) = create_booking(&store, web_request(), "web", 0.0, now).unwrap();

    let first_anchor = utc(2024, 4, 8, 9);
    update_booking(&store, draft.id, admin_edit("weekly", Some(first_anchor)), now).unwrap();
    let rule = store.rule_for_base(draft.id).unwrap().unwrap();
    let before: Vec<Uuid> = store
        .occurrences_of(rule.id)
        .unwrap()
        .iter()
        .map(|b| b.id)
        .collect();

    let new_anchor = utc(2024, 4, 10, 14);
    update_booking(&store, draft.id, admin_edit("weekly", Some(new_anchor)), now).unwrap();

    let after = store.occurrences_of(rule.id).unwrap();
    assert_eq!(after.len(), 6);
    // Old rows are gone, new rows follow the new anchor.
    for occ in &after {
        assert!(!before.contains(&occ.id));
    }
    let mut dates: Vec<_> = after.iter().filter_map(|o| o.service_date).collect();
    dates.sort();
    assert_eq!(dates[0], new_anchor + Duration::days(7));
}

#[test]
fn cascade_delete_removes_series_and_items() {
    let store = MemoryStore::new();
    let now = utc(2024, 4, 1, 0);
    let (draft, _) = create_booking(&store, web_request(), "web", 0.0, now).unwrap();
    update_booking(
        &store,
        draft.id,
        admin_edit("bi_weekly", Some(utc(2024, 4, 8, 9))),
        now,
    )
    .unwrap();
    let rule = store.rule_for_base(draft.id).unwrap().unwrap();
    let occurrence_ids: Vec<Uuid> = store
        .occurrences_of(rule.id)
        .unwrap()
        .iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(occurrence_ids.len(), 6);

    delete_booking(&store, draft.id).unwrap();

    assert!(store.get_booking(draft.id).unwrap().is_none());
    assert!(store.items_for(draft.id).unwrap().is_empty());
    assert!(store.get_rule(rule.id).unwrap().is_none());
    for id in occurrence_ids {
        assert!(store.get_booking(id).unwrap().is_none());
    }

    let events = project(&store, utc(2024, 4, 1, 0), utc(2024, 6, 1, 0)).unwrap();
    assert!(events.is_empty());
}
