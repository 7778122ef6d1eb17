//! Calendar projection for the admin schedule view.
//!
//! Recurring series are expanded on the fly from their rules instead of
//! reading materialized occurrence rows: those rows only cover a six-step
//! horizon and can go stale between edits, while the rule is always current.
//! The cost is recomputation per view, bounded by active rules times range
//! length over step size.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bookings::totals::{compute_totals, line_inputs, resolve_display_total};
use crate::recurrence::{occurrences_in_range, Frequency};
use crate::shared::state::AppState;
use crate::shared::utils::bd_to_f64;
use crate::store::{Booking, BookingStore, StoreError};

const DEFAULT_EVENT_MINUTES: i64 = 60;
const MIN_EVENT_MINUTES: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Base booking id for virtual occurrences, so clicking any instance of
    /// a series opens the same editable booking.
    pub booking_id: Uuid,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: Option<String>,
    pub frequency: String,
}

fn event_minutes(total_time_minutes: i32) -> i64 {
    if total_time_minutes <= 0 {
        DEFAULT_EVENT_MINUTES
    } else {
        (total_time_minutes as i64).max(MIN_EVENT_MINUTES)
    }
}

fn event_title(booking: &Booking) -> String {
    let name = booking.customer_name.as_deref().unwrap_or("Booking");
    let total = resolve_display_total(
        bd_to_f64(&booking.subtotal),
        bd_to_f64(&booking.discount),
        booking.admin_total_override.as_ref().map(bd_to_f64),
    );
    format!("{name} (${total:.2})")
}

fn push_event(
    events: &mut Vec<CalendarEvent>,
    booking: &Booking,
    start: DateTime<Utc>,
    minutes: i32,
    frequency: &str,
) {
    events.push(CalendarEvent {
        booking_id: booking.id,
        title: event_title(booking),
        start,
        end: start + Duration::minutes(event_minutes(minutes)),
        location: booking.address.clone(),
        frequency: frequency.to_string(),
    });
}

/// Everything visible in `[range_start, range_end)`: one-time bookings from
/// storage plus virtual expansion of every active rule.
pub fn project(
    store: &dyn BookingStore,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
) -> Result<Vec<CalendarEvent>, StoreError> {
    let mut events = Vec::new();

    for booking in store.one_time_bookings_in_range(range_start, range_end)? {
        let Some(start) = booking.service_date else {
            continue;
        };
        push_event(
            &mut events,
            &booking,
            start,
            booking.total_time_minutes,
            &booking.frequency,
        );
    }

    for rule in store.active_rules()? {
        if rule.start_at >= range_end {
            continue;
        }
        let Some(base) = store.get_booking(rule.base_booking_id)? else {
            continue;
        };
        if base.status == "cancelled" {
            continue;
        }
        let Some(frequency) = Frequency::parse(&rule.frequency) else {
            continue;
        };

        let mut minutes = base.total_time_minutes;
        if minutes <= 0 {
            minutes = compute_totals(&line_inputs(&store.items_for(base.id)?)).minutes;
        }

        for start in occurrences_in_range(rule.start_at, frequency, range_start, range_end) {
            push_event(&mut events, &base, start, minutes, &rule.frequency);
        }
    }

    events.sort_by_key(|e| e.start);
    Ok(events)
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

pub async fn calendar_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<Vec<CalendarEvent>>, (StatusCode, String)> {
    if query.end <= query.start {
        return Err((
            StatusCode::BAD_REQUEST,
            "end must be after start".to_string(),
        ));
    }
    let events = project(state.store.as_ref(), query.start, query.end)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Query error: {e}")))?;
    Ok(Json(events))
}

pub fn configure_calendar_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/admin/calendar", get(calendar_events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::reconcile;
    use crate::shared::utils::bd;
    use crate::store::{BookingItem, MemoryStore};
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    fn booking(frequency: &str, service_date: Option<DateTime<Utc>>, minutes: i32) -> Booking {
        let now = utc(2024, 1, 1, 0);
        Booking {
            id: Uuid::new_v4(),
            status: "active".to_string(),
            payment_status: "paid".to_string(),
            source: "web".to_string(),
            customer_name: Some("Priya Shah".to_string()),
            customer_email: Some("priya@example.com".to_string()),
            customer_phone: None,
            address: Some("4 Crown Street".to_string()),
            city: None,
            postcode: None,
            frequency: frequency.to_string(),
            service_date,
            arrival_window: "morning".to_string(),
            subtotal: bd(80.0),
            discount: bd(10.0),
            total: bd(70.0),
            admin_total_override: None,
            total_time_minutes: minutes,
            admin_time_override: None,
            discount_code: None,
            notes: None,
            recurrence_id: None,
            occurrence_index: None,
            stripe_session_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn one_time_booking_becomes_single_event() {
        let store = MemoryStore::new();
        let start = utc(2024, 5, 10, 9);
        store
            .insert_booking(&booking("one_time", Some(start), 90))
            .unwrap();

        let events = project(&store, utc(2024, 5, 1, 0), utc(2024, 6, 1, 0)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start, start);
        assert_eq!(events[0].end, start + Duration::minutes(90));
        assert_eq!(events[0].title, "Priya Shah ($70.00)");
    }

    #[test]
    fn zero_duration_defaults_to_sixty_minutes() {
        let store = MemoryStore::new();
        let start = utc(2024, 5, 10, 9);
        store
            .insert_booking(&booking("one_time", Some(start), 0))
            .unwrap();

        let events = project(&store, utc(2024, 5, 1, 0), utc(2024, 6, 1, 0)).unwrap();
        assert_eq!(events[0].end, start + Duration::minutes(60));
    }

    #[test]
    fn short_duration_clamps_to_thirty_minutes() {
        let store = MemoryStore::new();
        let start = utc(2024, 5, 10, 9);
        store
            .insert_booking(&booking("one_time", Some(start), 15))
            .unwrap();

        let events = project(&store, utc(2024, 5, 1, 0), utc(2024, 6, 1, 0)).unwrap();
        assert_eq!(events[0].end, start + Duration::minutes(30));
    }

    #[test]
    fn cancelled_bookings_are_hidden() {
        let store = MemoryStore::new();
        let mut b = booking("one_time", Some(utc(2024, 5, 10, 9)), 60);
        b.status = "cancelled".to_string();
        store.insert_booking(&b).unwrap();

        let events = project(&store, utc(2024, 5, 1, 0), utc(2024, 6, 1, 0)).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn materialized_occurrences_do_not_duplicate_virtual_ones() {
        let store = MemoryStore::new();
        let anchor = utc(2024, 5, 6, 10);
        let base = booking("weekly", Some(anchor), 60);
        let items = vec![BookingItem {
            id: Uuid::new_v4(),
            booking_id: base.id,
            service_id: None,
            service_name: "Standard clean".to_string(),
            quantity: 1,
            unit_price: bd(80.0),
            minutes_per_unit: 60,
            created_at: base.created_at,
        }];
        store.insert_booking(&base).unwrap();
        store.replace_items(base.id, &items).unwrap();
        // Materializes six future occurrence rows alongside the rule.
        reconcile(&store, &base, &items, utc(2024, 5, 1, 0)).unwrap();

        let events = project(&store, utc(2024, 5, 1, 0), utc(2024, 6, 1, 0)).unwrap();
        // May 2024 Mondays from the anchor: 6th, 13th, 20th, 27th.
        assert_eq!(events.len(), 4);
        let mut starts: Vec<_> = events.iter().map(|e| e.start).collect();
        starts.dedup();
        assert_eq!(starts.len(), 4);
        assert!(events.iter().all(|e| e.booking_id == base.id));
    }

    #[test]
    fn rule_duration_backfills_from_items() {
        let store = MemoryStore::new();
        let anchor = utc(2024, 5, 6, 10);
        let base = booking("weekly", Some(anchor), 0);
        let items = vec![BookingItem {
            id: Uuid::new_v4(),
            booking_id: base.id,
            service_id: None,
            service_name: "Standard clean".to_string(),
            quantity: 2,
            unit_price: bd(40.0),
            minutes_per_unit: 45,
            created_at: base.created_at,
        }];
        store.insert_booking(&base).unwrap();
        store.replace_items(base.id, &items).unwrap();
        reconcile(&store, &base, &items, utc(2024, 5, 1, 0)).unwrap();

        let events = project(&store, utc(2024, 5, 6, 0), utc(2024, 5, 7, 0)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].end, anchor + Duration::minutes(90));
    }

    #[test]
    fn events_sorted_by_start() {
        let store = MemoryStore::new();
        store
            .insert_booking(&booking("one_time", Some(utc(2024, 5, 20, 9)), 60))
            .unwrap();
        store
            .insert_booking(&booking("one_time", Some(utc(2024, 5, 10, 9)), 60))
            .unwrap();

        let events = project(&store, utc(2024, 5, 1, 0), utc(2024, 6, 1, 0)).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].start < events[1].start);
    }
}
