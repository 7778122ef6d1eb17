pub mod lifecycle;
pub mod totals;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::billing::discounts;
use crate::bookings::totals::{
    compute_totals, resolve_display_time, resolve_display_total, LineInput,
};
use crate::shared::state::AppState;
use crate::shared::utils::bd_to_f64;
use crate::store::{Booking, BookingFilter, BookingItem};

fn default_arrival_window() -> String {
    "exact".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingItemRequest {
    pub service_id: Option<Uuid>,
    pub service_name: String,
    pub quantity: i32,
    pub unit_price: f64,
    pub minutes_per_unit: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postcode: Option<String>,
    pub frequency: String,
    pub service_date: Option<DateTime<Utc>>,
    #[serde(default = "default_arrival_window")]
    pub arrival_window: String,
    #[serde(default)]
    pub discount: f64,
    pub discount_code: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<BookingItemRequest>,
}

/// Admin edits post the full editable surface of the booking form; absent
/// optional fields clear their columns. Two exceptions: items are
/// replace-on-save when present and untouched when omitted, and an omitted
/// payment status keeps the stored value (a paid booking must not quietly
/// revert to pending).
#[derive(Debug, Deserialize)]
pub struct UpdateBookingRequest {
    pub status: String,
    #[serde(default)]
    pub payment_status: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postcode: Option<String>,
    pub frequency: String,
    pub service_date: Option<DateTime<Utc>>,
    #[serde(default = "default_arrival_window")]
    pub arrival_window: String,
    #[serde(default)]
    pub discount: f64,
    pub admin_total_override: Option<f64>,
    pub admin_time_override: Option<i32>,
    pub discount_code: Option<String>,
    pub notes: Option<String>,
    pub items: Option<Vec<BookingItemRequest>>,
}

#[derive(Debug, Serialize)]
pub struct BookingItemResponse {
    pub id: Uuid,
    pub service_id: Option<Uuid>,
    pub service_name: String,
    pub quantity: i32,
    pub unit_price: f64,
    pub minutes_per_unit: i32,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub status: String,
    pub payment_status: String,
    pub source: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postcode: Option<String>,
    pub frequency: String,
    pub service_date: Option<DateTime<Utc>>,
    pub arrival_window: String,
    pub subtotal: f64,
    pub discount: f64,
    pub total: f64,
    pub admin_total_override: Option<f64>,
    pub total_time_minutes: i32,
    pub admin_time_override: Option<i32>,
    pub display_total: f64,
    pub display_minutes: i32,
    pub discount_code: Option<String>,
    pub notes: Option<String>,
    pub recurrence_id: Option<Uuid>,
    pub occurrence_index: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<BookingItemResponse>,
}

impl BookingResponse {
    pub fn from_parts(booking: Booking, items: Vec<BookingItem>) -> Self {
        let subtotal = bd_to_f64(&booking.subtotal);
        let discount = bd_to_f64(&booking.discount);
        let admin_total_override = booking.admin_total_override.as_ref().map(bd_to_f64);
        let display_total = resolve_display_total(subtotal, discount, admin_total_override);
        let display_minutes =
            resolve_display_time(booking.total_time_minutes, booking.admin_time_override);
        Self {
            id: booking.id,
            status: booking.status,
            payment_status: booking.payment_status,
            source: booking.source,
            customer_name: booking.customer_name,
            customer_email: booking.customer_email,
            customer_phone: booking.customer_phone,
            address: booking.address,
            city: booking.city,
            postcode: booking.postcode,
            frequency: booking.frequency,
            service_date: booking.service_date,
            arrival_window: booking.arrival_window,
            subtotal,
            discount,
            total: bd_to_f64(&booking.total),
            admin_total_override,
            total_time_minutes: booking.total_time_minutes,
            admin_time_override: booking.admin_time_override,
            display_total,
            display_minutes,
            discount_code: booking.discount_code,
            notes: booking.notes,
            recurrence_id: booking.recurrence_id,
            occurrence_index: booking.occurrence_index,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
            items: items
                .into_iter()
                .map(|item| BookingItemResponse {
                    id: item.id,
                    service_id: item.service_id,
                    service_name: item.service_name,
                    quantity: item.quantity,
                    unit_price: bd_to_f64(&item.unit_price),
                    minutes_per_unit: item.minutes_per_unit,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub frequency: Option<String>,
    pub search: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Resolves the discount amount for a request: a discount code beats a raw
/// amount, and validation runs server-side against the submitted items.
fn resolve_discount(
    state: &AppState,
    code: &Option<String>,
    raw_discount: f64,
    items: &[BookingItemRequest],
) -> Result<f64, (StatusCode, String)> {
    let Some(code) = code.as_deref().filter(|c| !c.trim().is_empty()) else {
        return Ok(raw_discount);
    };
    let order_amount = compute_totals(
        &items
            .iter()
            .map(|i| LineInput {
                quantity: i.quantity,
                unit_price: i.unit_price,
                minutes_per_unit: i.minutes_per_unit,
            })
            .collect::<Vec<_>>(),
    )
    .subtotal;
    let validated = discounts::validate_code(&state.conn, code, order_amount)
        .map_err(<(StatusCode, String)>::from)?;
    Ok(validated.discount_amount)
}

async fn create_booking_with_source(
    state: Arc<AppState>,
    req: CreateBookingRequest,
    source: &str,
) -> Result<Json<BookingResponse>, (StatusCode, String)> {
    let discount = resolve_discount(&state, &req.discount_code, req.discount, &req.items)?;
    let (booking, items) =
        lifecycle::create_booking(state.store.as_ref(), req, source, discount, Utc::now())
            .map_err(<(StatusCode, String)>::from)?;
    Ok(Json(BookingResponse::from_parts(booking, items)))
}

pub async fn submit_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Json<BookingResponse>, (StatusCode, String)> {
    create_booking_with_source(state, req, "web").await
}

pub async fn admin_create_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Json<BookingResponse>, (StatusCode, String)> {
    create_booking_with_source(state, req, "admin").await
}

pub async fn admin_list_bookings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<BookingResponse>>, (StatusCode, String)> {
    let filter = BookingFilter {
        status: query.status,
        frequency: query.frequency,
        search: query.search,
        from_date: query.from,
        to_date: query.to,
        limit: query.limit,
        offset: query.offset,
    };
    let bookings = state
        .store
        .list_bookings(&filter)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Query error: {e}")))?;
    let mut out = Vec::with_capacity(bookings.len());
    for booking in bookings {
        let items = state
            .store
            .items_for(booking.id)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Query error: {e}")))?;
        out.push(BookingResponse::from_parts(booking, items));
    }
    Ok(Json(out))
}

pub async fn admin_get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingResponse>, (StatusCode, String)> {
    let (booking, items) = lifecycle::booking_detail(state.store.as_ref(), id)
        .map_err(<(StatusCode, String)>::from)?;
    Ok(Json(BookingResponse::from_parts(booking, items)))
}

pub async fn admin_update_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBookingRequest>,
) -> Result<Json<BookingResponse>, (StatusCode, String)> {
    let (booking, items) = lifecycle::update_booking(state.store.as_ref(), id, req, Utc::now())
        .map_err(<(StatusCode, String)>::from)?;
    Ok(Json(BookingResponse::from_parts(booking, items)))
}

pub async fn admin_delete_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    lifecycle::delete_booking(state.store.as_ref(), id).map_err(<(StatusCode, String)>::from)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn configure_public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/bookings", axum::routing::post(submit_booking))
}

pub fn configure_admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/admin/bookings",
            get(admin_list_bookings).post(admin_create_booking),
        )
        .route(
            "/api/admin/bookings/{id}",
            get(admin_get_booking)
                .put(admin_update_booking)
                .delete(admin_delete_booking),
        )
}
