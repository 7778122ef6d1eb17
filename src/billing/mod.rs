//! Payment surface: Stripe checkout for bookings, the completion webhook,
//! and discount codes.

pub mod discounts;
pub mod stripe_integration;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::post,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bookings::lifecycle;
use crate::bookings::totals::resolve_display_total;
use crate::recurrence::reconcile;
use crate::shared::state::AppState;
use crate::shared::utils::bd_to_f64;
use crate::store::{Booking, BookingItem, BookingStore, StoreError};
use stripe_integration::{to_cents, CheckoutLine, CreateCheckoutParams};

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub booking_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

/// Line items for the checkout session. Per-item lines match the booking
/// form; once a discount or admin override changes the amount owed, the
/// session collapses to a single line so the charged total stays exact.
fn checkout_lines(booking: &Booking, items: &[BookingItem], display_total: f64) -> Vec<CheckoutLine> {
    let discount = bd_to_f64(&booking.discount);
    if discount > 0.0 || booking.admin_total_override.is_some() || items.is_empty() {
        return vec![CheckoutLine {
            name: "Cleaning service".to_string(),
            quantity: 1,
            unit_amount_cents: to_cents(display_total),
        }];
    }
    items
        .iter()
        .map(|item| CheckoutLine {
            name: item.service_name.clone(),
            quantity: item.quantity.max(1),
            unit_amount_cents: to_cents(bd_to_f64(&item.unit_price)),
        })
        .collect()
}

pub async fn create_checkout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, (StatusCode, String)> {
    let (mut booking, items) = lifecycle::booking_detail(state.store.as_ref(), req.booking_id)
        .map_err(<(StatusCode, String)>::from)?;

    if booking.payment_status == "paid" {
        return Err((
            StatusCode::BAD_REQUEST,
            "booking is already paid".to_string(),
        ));
    }
    if booking.status == "cancelled" {
        return Err((
            StatusCode::BAD_REQUEST,
            "booking is cancelled".to_string(),
        ));
    }

    let display_total = resolve_display_total(
        bd_to_f64(&booking.subtotal),
        bd_to_f64(&booking.discount),
        booking.admin_total_override.as_ref().map(bd_to_f64),
    );
    if to_cents(display_total) <= 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "booking total is zero, nothing to charge".to_string(),
        ));
    }

    let session = state
        .stripe
        .create_checkout_session(CreateCheckoutParams {
            booking_id: booking.id,
            customer_email: booking.customer_email.clone(),
            lines: checkout_lines(&booking, &items, display_total),
            success_url: state.config.stripe.success_url.clone(),
            cancel_url: state.config.stripe.cancel_url.clone(),
        })
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, format!("Stripe error: {e}")))?;

    booking.stripe_session_id = Some(session.id.clone());
    booking.updated_at = Utc::now();
    state
        .store
        .update_booking(&booking)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Update error: {e}")))?;

    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    }))
}

/// Applies a completed checkout to a booking. Safe to re-run: the paid
/// flags settle on the first application, and the schedule is reconciled on
/// every call, so a Stripe redelivery after a failed reconciliation still
/// materializes the occurrences. Returns `None` for an unknown booking,
/// otherwise whether this call transitioned the booking to paid.
fn apply_payment(
    store: &dyn BookingStore,
    booking_id: Uuid,
    session_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<bool>, StoreError> {
    let Some(mut booking) = store.get_booking(booking_id)? else {
        return Ok(None);
    };

    let newly_paid = booking.payment_status != "paid";
    if newly_paid {
        booking.payment_status = "paid".to_string();
        if booking.status == "draft" {
            booking.status = "active".to_string();
        }
        if let Some(session_id) = session_id {
            booking.stripe_session_id = Some(session_id.to_string());
        }
        booking.updated_at = now;
    }

    // Payment is the point where a recurring booking's schedule goes live.
    // Reconcile against the post-payment view before persisting the paid
    // flags: if reconciliation fails, the booking stays unpaid and the
    // Stripe redelivery re-runs the whole sequence instead of hitting a
    // replay short-circuit with no schedule materialized.
    let items = store.items_for(booking.id)?;
    reconcile(store, &booking, &items, now)?;

    if newly_paid {
        store.update_booking(&booking)?;
    }

    Ok(Some(newly_paid))
}

/// Stripe posts back here after checkout. Unhandled event types and unknown
/// bookings acknowledge with 200 so Stripe stops retrying; only signature
/// failures are rejected.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, (StatusCode, String)> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or((
            StatusCode::BAD_REQUEST,
            "missing stripe-signature header".to_string(),
        ))?;

    let event = state
        .stripe
        .verify_webhook_signature(&body, signature)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    if event.event_type != "checkout.session.completed" {
        tracing::debug!(event_type = %event.event_type, "ignoring stripe event");
        return Ok(StatusCode::OK);
    }

    let object = &event.data.object;
    let booking_id = object
        .get("metadata")
        .and_then(|m| m.get("booking_id"))
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok());
    let Some(booking_id) = booking_id else {
        tracing::warn!(event_id = %event.id, "checkout session without booking_id metadata");
        return Ok(StatusCode::OK);
    };

    let session_id = object.get("id").and_then(|v| v.as_str());
    let newly_paid = apply_payment(state.store.as_ref(), booking_id, session_id, Utc::now())
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Payment error: {e}")))?;

    let Some(newly_paid) = newly_paid else {
        tracing::warn!(%booking_id, "paid checkout for unknown booking");
        return Ok(StatusCode::OK);
    };
    if !newly_paid {
        // Stripe redelivery; the state above has already converged.
        return Ok(StatusCode::OK);
    }

    if let Some(booking) = state
        .store
        .get_booking(booking_id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Query error: {e}")))?
    {
        if let Some(code) = &booking.discount_code {
            if let Err(e) = discounts::record_use(&state.conn, code) {
                tracing::warn!(%booking_id, code, "failed to record discount use: {e}");
            }
        }
    }

    tracing::info!(%booking_id, "booking paid via stripe checkout");
    Ok(StatusCode::OK)
}

pub fn configure_public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/checkout", post(create_checkout))
        .route("/api/webhooks/stripe", post(stripe_webhook))
        .route("/api/discounts/validate", post(discounts::validate_discount))
}

pub fn configure_admin_routes() -> Router<Arc<AppState>> {
    discounts::configure_admin_routes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::utils::bd;
    use crate::store::MemoryStore;
    use chrono::{DateTime, TimeZone, Utc};

    fn booking_with(discount: f64, override_total: Option<f64>) -> Booking {
        let now: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Booking {
            id: Uuid::new_v4(),
            status: "draft".to_string(),
            payment_status: "pending".to_string(),
            source: "web".to_string(),
            customer_name: None,
            customer_email: None,
            customer_phone: None,
            address: None,
            city: None,
            postcode: None,
            frequency: "one_time".to_string(),
            service_date: None,
            arrival_window: "exact".to_string(),
            subtotal: bd(100.0),
            discount: bd(discount),
            total: bd(100.0 - discount),
            admin_total_override: override_total.map(bd),
            total_time_minutes: 60,
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

    fn item(name: &str, quantity: i32, unit_price: f64) -> BookingItem {
        BookingItem {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            service_id: None,
            service_name: name.to_string(),
            quantity,
            unit_price: bd(unit_price),
            minutes_per_unit: 60,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn undiscounted_checkout_keeps_per_item_lines() {
        let booking = booking_with(0.0, None);
        let items = vec![item("Standard clean", 2, 40.0), item("Oven clean", 1, 20.0)];
        let lines = checkout_lines(&booking, &items, 100.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].unit_amount_cents, 4000);
        assert_eq!(lines[0].quantity, 2);
    }

    #[test]
    fn discount_collapses_to_single_line() {
        let booking = booking_with(15.0, None);
        let items = vec![item("Standard clean", 2, 40.0)];
        let lines = checkout_lines(&booking, &items, 85.0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].unit_amount_cents, 8500);
    }

    #[test]
    fn admin_override_collapses_to_single_line() {
        let booking = booking_with(0.0, Some(70.0));
        let items = vec![item("Standard clean", 2, 40.0)];
        let lines = checkout_lines(&booking, &items, 70.0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].unit_amount_cents, 7000);
    }

    #[test]
    fn empty_items_still_charge_the_total() {
        let booking = booking_with(0.0, None);
        let lines = checkout_lines(&booking, &[], 100.0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].unit_amount_cents, 10000);
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    fn weekly_booking(store: &MemoryStore, payment_status: &str) -> Booking {
        let mut booking = booking_with(0.0, None);
        booking.frequency = "weekly".to_string();
        booking.service_date = Some(utc(2024, 5, 6, 10));
        booking.payment_status = payment_status.to_string();
        store.insert_booking(&booking).unwrap();
        let mut line = item("Standard clean", 2, 50.0);
        line.booking_id = booking.id;
        store.replace_items(booking.id, &[line]).unwrap();
        booking
    }

    #[test]
    fn payment_activates_and_materializes_the_schedule() {
        let store = MemoryStore::new();
        let booking = weekly_booking(&store, "pending");
        let now = utc(2024, 5, 1, 0);

        let newly_paid = apply_payment(&store, booking.id, Some("cs_test_1"), now).unwrap();
        assert_eq!(newly_paid, Some(true));

        let stored = store.get_booking(booking.id).unwrap().unwrap();
        assert_eq!(stored.payment_status, "paid");
        assert_eq!(stored.status, "active");
        assert_eq!(stored.stripe_session_id.as_deref(), Some("cs_test_1"));

        let rule = store.rule_for_base(booking.id).unwrap().unwrap();
        assert_eq!(store.occurrences_of(rule.id).unwrap().len(), 6);
    }

    #[test]
    fn redelivery_for_paid_booking_still_reconciles() {
        let store = MemoryStore::new();
        // Already marked paid but with no materialized schedule, the state a
        // retried delivery finds after an earlier partial failure.
        let booking = weekly_booking(&store, "paid");
        let now = utc(2024, 5, 1, 0);
        assert!(store.rule_for_base(booking.id).unwrap().is_none());

        let newly_paid = apply_payment(&store, booking.id, None, now).unwrap();
        assert_eq!(newly_paid, Some(false));

        let rule = store.rule_for_base(booking.id).unwrap().unwrap();
        assert_eq!(store.occurrences_of(rule.id).unwrap().len(), 6);
    }

    #[test]
    fn repeated_payment_application_converges() {
        let store = MemoryStore::new();
        let booking = weekly_booking(&store, "pending");
        let now = utc(2024, 5, 1, 0);

        assert_eq!(
            apply_payment(&store, booking.id, Some("cs_test_1"), now).unwrap(),
            Some(true)
        );
        assert_eq!(
            apply_payment(&store, booking.id, Some("cs_test_1"), now).unwrap(),
            Some(false)
        );

        let rule = store.rule_for_base(booking.id).unwrap().unwrap();
        assert_eq!(store.occurrences_of(rule.id).unwrap().len(), 6);
    }

    #[test]
    fn unknown_booking_is_reported_not_failed() {
        let store = MemoryStore::new();
        let result = apply_payment(&store, Uuid::new_v4(), None, utc(2024, 5, 1, 0)).unwrap();
        assert!(result.is_none());
    }
}
