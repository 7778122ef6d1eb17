//! Keeps materialized future occurrences in line with a booking's current
//! recurrence settings.
//!
//! Every save of a recurring booking rebuilds the horizon from scratch:
//! future occurrences are deleted and regenerated rather than diffed, so a
//! re-run after a partial failure converges to the same end state. The
//! delete-then-insert sequence is not atomic and concurrent reconciliations
//! of the same booking are last-write-wins.

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::recurrence::{next_occurrences, Frequency};
use crate::store::{Booking, BookingItem, BookingStore, RecurringRule, StoreError};

/// Number of future occurrences materialized per reconciliation pass.
pub const OCCURRENCE_HORIZON: usize = 6;

pub fn reconcile(
    store: &dyn BookingStore,
    booking: &Booking,
    items: &[BookingItem],
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let frequency = Frequency::parse(&booking.frequency).unwrap_or(Frequency::OneTime);

    // The rule may hang off this booking directly (base booking) or be
    // reachable through the occurrence's own recurrence linkage.
    let existing = match store.rule_for_base(booking.id)? {
        Some(rule) => Some(rule),
        None => match booking.recurrence_id {
            Some(rule_id) => store.get_rule(rule_id)?,
            None => None,
        },
    };

    match (frequency.is_recurring(), booking.service_date) {
        (true, Some(anchor)) => {
            let rule = upsert_rule(store, existing, booking, frequency, anchor, now)?;
            delete_future_occurrences(store, &rule, booking.id, now)?;
            materialize_horizon(store, &rule, booking, items, frequency, anchor, now)?;
        }
        _ => {
            // Reverted to one_time or the date was cleared: future
            // occurrences go away, past ones stay as history.
            if let Some(mut rule) = existing {
                delete_future_occurrences(store, &rule, booking.id, now)?;
                if rule.active {
                    rule.active = false;
                    rule.updated_at = now;
                    store.update_rule(&rule)?;
                }
            }
        }
    }

    Ok(())
}

fn upsert_rule(
    store: &dyn BookingStore,
    existing: Option<RecurringRule>,
    booking: &Booking,
    frequency: Frequency,
    anchor: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<RecurringRule, StoreError> {
    match existing {
        Some(mut rule) => {
            rule.frequency = frequency.as_str().to_string();
            rule.start_at = anchor;
            rule.active = true;
            rule.updated_at = now;
            store.update_rule(&rule)?;
            Ok(rule)
        }
        None => {
            let rule = RecurringRule {
                id: Uuid::new_v4(),
                base_booking_id: booking.id,
                frequency: frequency.as_str().to_string(),
                start_at: anchor,
                active: true,
                created_at: now,
                updated_at: now,
            };
            store.insert_rule(&rule)?;
            Ok(rule)
        }
    }
}

/// "Future" is relative to wall-clock time at reconciliation, not the
/// booking's own date: a past-dated edit must not resurrect occurrences
/// that have already elapsed.
fn delete_future_occurrences(
    store: &dyn BookingStore,
    rule: &RecurringRule,
    saved_booking_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let future: Vec<Uuid> = store
        .occurrences_of(rule.id)?
        .into_iter()
        .filter(|b| b.id != saved_booking_id)
        .filter(|b| b.service_date.is_some_and(|d| d > now))
        .map(|b| b.id)
        .collect();
    if !future.is_empty() {
        debug!(rule_id = %rule.id, count = future.len(), "dropping future occurrences");
        store.delete_bookings(&future)?;
    }
    Ok(())
}

fn materialize_horizon(
    store: &dyn BookingStore,
    rule: &RecurringRule,
    booking: &Booking,
    items: &[BookingItem],
    frequency: Frequency,
    anchor: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    for (idx, date) in next_occurrences(anchor, frequency, OCCURRENCE_HORIZON)
        .into_iter()
        .enumerate()
    {
        let occurrence = occurrence_snapshot(booking, rule, idx as i32 + 1, date, now);
        let occurrence_items: Vec<BookingItem> = items
            .iter()
            .map(|item| BookingItem {
                id: Uuid::new_v4(),
                booking_id: occurrence.id,
                created_at: now,
                ..item.clone()
            })
            .collect();
        store.insert_booking(&occurrence)?;
        store.replace_items(occurrence.id, &occurrence_items)?;
    }
    Ok(())
}

/// A full copy of the current booking's customer, contact and money fields,
/// tagged as an occurrence of the rule. Not kept live-synced afterwards;
/// the next reconciliation rebuilds it.
fn occurrence_snapshot(
    booking: &Booking,
    rule: &RecurringRule,
    index: i32,
    date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Booking {
    Booking {
        id: Uuid::new_v4(),
        status: booking.status.clone(),
        payment_status: "pending".to_string(),
        source: booking.source.clone(),
        customer_name: booking.customer_name.clone(),
        customer_email: booking.customer_email.clone(),
        customer_phone: booking.customer_phone.clone(),
        address: booking.address.clone(),
        city: booking.city.clone(),
        postcode: booking.postcode.clone(),
        frequency: booking.frequency.clone(),
        service_date: Some(date),
        arrival_window: booking.arrival_window.clone(),
        subtotal: booking.subtotal.clone(),
        discount: booking.discount.clone(),
        total: booking.total.clone(),
        admin_total_override: booking.admin_total_override.clone(),
        total_time_minutes: booking.total_time_minutes,
        admin_time_override: booking.admin_time_override,
        discount_code: booking.discount_code.clone(),
        notes: booking.notes.clone(),
        recurrence_id: Some(rule.id),
        occurrence_index: Some(index),
        stripe_session_id: None,
        created_at: now,
        updated_at: now,
    }
}
