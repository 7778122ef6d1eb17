//! Create/update/delete orchestration for bookings: item replacement,
//! server-side totals recomputation, and reconciler invocation.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::bookings::totals::{compute_totals, line_inputs};
use crate::bookings::{BookingItemRequest, CreateBookingRequest, UpdateBookingRequest};
use crate::recurrence::{reconcile, Frequency};
use crate::shared::error::ServiceError;
use crate::shared::utils::bd;
use crate::store::{Booking, BookingItem, BookingStore};

const STATUSES: [&str; 4] = ["draft", "active", "cancelled", "completed"];
const PAYMENT_STATUSES: [&str; 4] = ["pending", "paid", "failed", "refunded"];
const ARRIVAL_WINDOWS: [&str; 3] = ["exact", "morning", "afternoon"];

fn validate_contact(email: &Option<String>, phone: &Option<String>) -> Result<(), ServiceError> {
    let has_email = email.as_deref().is_some_and(|v| !v.trim().is_empty());
    let has_phone = phone.as_deref().is_some_and(|v| !v.trim().is_empty());
    if has_email || has_phone {
        Ok(())
    } else {
        Err(ServiceError::validation(
            "at least one contact method (email or phone) is required",
        ))
    }
}

fn validate_frequency(frequency: &str) -> Result<Frequency, ServiceError> {
    Frequency::parse(frequency)
        .ok_or_else(|| ServiceError::validation(format!("unsupported frequency: {frequency}")))
}

fn validate_one_of(value: &str, allowed: &[&str], field: &str) -> Result<(), ServiceError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(ServiceError::validation(format!(
            "unsupported {field}: {value}"
        )))
    }
}

fn validate_items(items: &[BookingItemRequest]) -> Result<(), ServiceError> {
    for item in items {
        if item.quantity < 0 {
            return Err(ServiceError::validation("item quantity must not be negative"));
        }
        if item.unit_price < 0.0 {
            return Err(ServiceError::validation("item unit price must not be negative"));
        }
    }
    Ok(())
}

fn snapshot_items(
    requests: &[BookingItemRequest],
    booking_id: Uuid,
    now: DateTime<Utc>,
) -> Vec<BookingItem> {
    requests
        .iter()
        .map(|item| BookingItem {
            id: Uuid::new_v4(),
            booking_id,
            service_id: item.service_id,
            service_name: item.service_name.clone(),
            quantity: item.quantity,
            unit_price: bd(item.unit_price),
            minutes_per_unit: item.minutes_per_unit,
            created_at: now,
        })
        .collect()
}

/// Persists a new draft booking and its item snapshot. Does not reconcile:
/// drafts are not yet committed to a schedule, and the admin flow that
/// activates them calls `update_booking` right after.
pub fn create_booking(
    store: &dyn BookingStore,
    req: CreateBookingRequest,
    source: &str,
    discount: f64,
    now: DateTime<Utc>,
) -> Result<(Booking, Vec<BookingItem>), ServiceError> {
    validate_frequency(&req.frequency)?;
    validate_one_of(&req.arrival_window, &ARRIVAL_WINDOWS, "arrival window")?;
    validate_contact(&req.customer_email, &req.customer_phone)?;
    validate_items(&req.items)?;

    let id = Uuid::new_v4();
    let items = snapshot_items(&req.items, id, now);
    let totals = compute_totals(&line_inputs(&items));

    let booking = Booking {
        id,
        status: "draft".to_string(),
        payment_status: "pending".to_string(),
        source: source.to_string(),
        customer_name: req.customer_name,
        customer_email: req.customer_email,
        customer_phone: req.customer_phone,
        address: req.address,
        city: req.city,
        postcode: req.postcode,
        frequency: req.frequency,
        service_date: req.service_date,
        arrival_window: req.arrival_window,
        subtotal: bd(totals.subtotal),
        discount: bd(discount),
        total: bd((totals.subtotal - discount).max(0.0)),
        admin_total_override: None,
        total_time_minutes: totals.minutes,
        admin_time_override: None,
        discount_code: req.discount_code,
        notes: req.notes,
        recurrence_id: None,
        occurrence_index: None,
        stripe_session_id: None,
        created_at: now,
        updated_at: now,
    };

    store.insert_booking(&booking)?;
    store.replace_items(booking.id, &items)?;
    info!(booking_id = %booking.id, source, "booking created");
    Ok((booking, items))
}

/// Applies an admin edit: full replacement of the editable surface, optional
/// replace-on-save of the item set, totals recomputed from the persisted
/// items (client-submitted totals are never trusted), then reconciliation of
/// the recurrence state.
pub fn update_booking(
    store: &dyn BookingStore,
    id: Uuid,
    req: UpdateBookingRequest,
    now: DateTime<Utc>,
) -> Result<(Booking, Vec<BookingItem>), ServiceError> {
    let existing = store
        .get_booking(id)?
        .ok_or_else(|| ServiceError::not_found("booking"))?;

    validate_frequency(&req.frequency)?;
    validate_one_of(&req.status, &STATUSES, "status")?;
    // Omitted payment status keeps the stored value; an edit that does not
    // touch payment must not revert a paid booking to pending.
    let payment_status = req
        .payment_status
        .clone()
        .unwrap_or_else(|| existing.payment_status.clone());
    validate_one_of(&payment_status, &PAYMENT_STATUSES, "payment status")?;
    validate_one_of(&req.arrival_window, &ARRIVAL_WINDOWS, "arrival window")?;
    validate_contact(&req.customer_email, &req.customer_phone)?;

    let items = match &req.items {
        Some(item_requests) => {
            validate_items(item_requests)?;
            let items = snapshot_items(item_requests, id, now);
            store.replace_items(id, &items)?;
            items
        }
        None => store.items_for(id)?,
    };

    let totals = compute_totals(&line_inputs(&items));

    let booking = Booking {
        id,
        status: req.status,
        payment_status,
        source: existing.source,
        customer_name: req.customer_name,
        customer_email: req.customer_email,
        customer_phone: req.customer_phone,
        address: req.address,
        city: req.city,
        postcode: req.postcode,
        frequency: req.frequency,
        service_date: req.service_date,
        arrival_window: req.arrival_window,
        subtotal: bd(totals.subtotal),
        discount: bd(req.discount),
        total: bd((totals.subtotal - req.discount).max(0.0)),
        admin_total_override: req.admin_total_override.map(bd),
        total_time_minutes: totals.minutes,
        admin_time_override: req.admin_time_override,
        discount_code: req.discount_code,
        notes: req.notes,
        recurrence_id: existing.recurrence_id,
        occurrence_index: existing.occurrence_index,
        stripe_session_id: existing.stripe_session_id,
        created_at: existing.created_at,
        updated_at: now,
    };

    store.update_booking(&booking)?;
    reconcile(store, &booking, &items, now)?;
    info!(booking_id = %booking.id, "booking updated");
    Ok((booking, items))
}

/// Occurrence rows go alone; base bookings take their rule and every
/// materialized occurrence with them.
pub fn delete_booking(store: &dyn BookingStore, id: Uuid) -> Result<(), ServiceError> {
    let booking = store
        .get_booking(id)?
        .ok_or_else(|| ServiceError::not_found("booking"))?;

    if booking.is_occurrence() {
        store.delete_bookings(&[id])?;
        info!(booking_id = %id, "occurrence deleted");
        return Ok(());
    }

    if let Some(rule) = store.rule_for_base(id)? {
        let occurrence_ids: Vec<Uuid> = store
            .occurrences_of(rule.id)?
            .into_iter()
            .map(|b| b.id)
            .collect();
        store.delete_bookings(&occurrence_ids)?;
        store.delete_rule(rule.id)?;
        info!(booking_id = %id, rule_id = %rule.id, occurrences = occurrence_ids.len(), "recurring series deleted");
    }

    store.delete_booking(id)?;
    Ok(())
}

pub fn booking_detail(
    store: &dyn BookingStore,
    id: Uuid,
) -> Result<(Booking, Vec<BookingItem>), ServiceError> {
    let booking = store
        .get_booking(id)?
        .ok_or_else(|| ServiceError::not_found("booking"))?;
    let items = store.items_for(id)?;
    Ok((booking, items))
}
