//! Discount code management and validation. Codes are percentage-or-fixed
//! with min-order and max-cap constraints; the booking core only ever
//! consumes the flat amount this module computes.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::ServiceError;
use crate::shared::schema::discount_codes;
use crate::shared::state::AppState;
use crate::shared::utils::{bd, bd_to_f64, DbPool};
use crate::store::StoreError;

pub const KIND_PERCENT: &str = "percent";
pub const KIND_FIXED: &str = "fixed";

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = discount_codes, treat_none_as_null = true)]
pub struct DiscountCode {
    pub id: Uuid,
    pub code: String,
    pub kind: String,
    pub value: BigDecimal,
    pub min_order_amount: Option<BigDecimal>,
    pub max_discount_amount: Option<BigDecimal>,
    pub usage_limit: Option<i32>,
    pub times_used: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidatedDiscount {
    pub code: String,
    pub kind: String,
    pub discount_amount: f64,
}

/// Flat discount for an order amount: percent of the order capped by the
/// max-cap, or a fixed amount never exceeding the order itself.
fn discount_amount(kind: &str, value: f64, max_cap: Option<f64>, order_amount: f64) -> f64 {
    let amount = match kind {
        KIND_PERCENT => {
            let raw = order_amount * value / 100.0;
            match max_cap {
                Some(cap) => raw.min(cap),
                None => raw,
            }
        }
        _ => value,
    };
    amount.min(order_amount).max(0.0)
}

/// Pure eligibility + amount computation over a loaded code row.
fn evaluate(
    code: &DiscountCode,
    order_amount: f64,
    now: DateTime<Utc>,
) -> Result<f64, ServiceError> {
    if !code.is_active {
        return Err(ServiceError::validation("discount code is not active"));
    }
    if code.expires_at.is_some_and(|e| e <= now) {
        return Err(ServiceError::validation("discount code has expired"));
    }
    if code.usage_limit.is_some_and(|limit| code.times_used >= limit) {
        return Err(ServiceError::validation("discount code usage limit reached"));
    }
    if let Some(min_order) = &code.min_order_amount {
        if order_amount < bd_to_f64(min_order) {
            return Err(ServiceError::validation(format!(
                "order must be at least {:.2} for this code",
                bd_to_f64(min_order)
            )));
        }
    }
    Ok(discount_amount(
        &code.kind,
        bd_to_f64(&code.value),
        code.max_discount_amount.as_ref().map(bd_to_f64),
        order_amount,
    ))
}

pub fn validate_code(
    pool: &DbPool,
    code: &str,
    order_amount: f64,
) -> Result<ValidatedDiscount, ServiceError> {
    let mut conn = pool.get().map_err(StoreError::from)?;
    let normalized = code.trim().to_uppercase();
    let row: Option<DiscountCode> = discount_codes::table
        .filter(discount_codes::code.eq(&normalized))
        .first(&mut conn)
        .optional()
        .map_err(StoreError::from)?;
    let Some(row) = row else {
        return Err(ServiceError::validation("invalid discount code"));
    };
    let amount = evaluate(&row, order_amount, Utc::now())?;
    Ok(ValidatedDiscount {
        code: row.code,
        kind: row.kind,
        discount_amount: amount,
    })
}

/// Bumps the usage counter once a paying booking actually consumes the code.
pub fn record_use(pool: &DbPool, code: &str) -> Result<(), StoreError> {
    let mut conn = pool.get()?;
    let normalized = code.trim().to_uppercase();
    diesel::update(discount_codes::table.filter(discount_codes::code.eq(normalized)))
        .set(discount_codes::times_used.eq(discount_codes::times_used + 1))
        .execute(&mut conn)?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ValidateDiscountRequest {
    pub code: String,
    pub amount: f64,
}

#[derive(Debug, Serialize)]
pub struct ValidateDiscountResponse {
    pub valid: bool,
    pub code: String,
    pub discount_amount: f64,
}

pub async fn validate_discount(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ValidateDiscountRequest>,
) -> Result<Json<ValidateDiscountResponse>, (StatusCode, String)> {
    let validated = validate_code(&state.conn, &req.code, req.amount)
        .map_err(<(StatusCode, String)>::from)?;
    Ok(Json(ValidateDiscountResponse {
        valid: true,
        code: validated.code,
        discount_amount: validated.discount_amount,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DiscountCodeRequest {
    pub code: String,
    pub kind: String,
    pub value: f64,
    pub min_order_amount: Option<f64>,
    pub max_discount_amount: Option<f64>,
    pub usage_limit: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct DiscountCodeResponse {
    pub id: Uuid,
    pub code: String,
    pub kind: String,
    pub value: f64,
    pub min_order_amount: Option<f64>,
    pub max_discount_amount: Option<f64>,
    pub usage_limit: Option<i32>,
    pub times_used: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<DiscountCode> for DiscountCodeResponse {
    fn from(row: DiscountCode) -> Self {
        Self {
            id: row.id,
            code: row.code,
            kind: row.kind,
            value: bd_to_f64(&row.value),
            min_order_amount: row.min_order_amount.as_ref().map(bd_to_f64),
            max_discount_amount: row.max_discount_amount.as_ref().map(bd_to_f64),
            usage_limit: row.usage_limit,
            times_used: row.times_used,
            expires_at: row.expires_at,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

fn validate_kind(kind: &str) -> Result<(), (StatusCode, String)> {
    if kind == KIND_PERCENT || kind == KIND_FIXED {
        Ok(())
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            format!("unsupported discount kind: {kind}"),
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct DiscountListQuery {
    pub active: Option<bool>,
}

pub async fn list_discount_codes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DiscountListQuery>,
) -> Result<Json<Vec<DiscountCodeResponse>>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;
    let mut q = discount_codes::table.into_boxed();
    if let Some(active) = query.active {
        q = q.filter(discount_codes::is_active.eq(active));
    }
    let rows: Vec<DiscountCode> = q
        .order(discount_codes::created_at.desc())
        .load(&mut conn)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Query error: {e}")))?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

pub async fn create_discount_code(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DiscountCodeRequest>,
) -> Result<Json<DiscountCodeResponse>, (StatusCode, String)> {
    validate_kind(&req.kind)?;
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;
    let row = DiscountCode {
        id: Uuid::new_v4(),
        code: req.code.trim().to_uppercase(),
        kind: req.kind,
        value: bd(req.value),
        min_order_amount: req.min_order_amount.map(bd),
        max_discount_amount: req.max_discount_amount.map(bd),
        usage_limit: req.usage_limit,
        times_used: 0,
        expires_at: req.expires_at,
        is_active: req.is_active,
        created_at: Utc::now(),
    };
    diesel::insert_into(discount_codes::table)
        .values(&row)
        .execute(&mut conn)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Insert error: {e}")))?;
    Ok(Json(row.into()))
}

pub async fn update_discount_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<DiscountCodeRequest>,
) -> Result<Json<DiscountCodeResponse>, (StatusCode, String)> {
    validate_kind(&req.kind)?;
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;
    let existing: Option<DiscountCode> = discount_codes::table
        .find(id)
        .first(&mut conn)
        .optional()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Query error: {e}")))?;
    let Some(existing) = existing else {
        return Err((StatusCode::NOT_FOUND, "discount code not found".to_string()));
    };
    let row = DiscountCode {
        id,
        code: req.code.trim().to_uppercase(),
        kind: req.kind,
        value: bd(req.value),
        min_order_amount: req.min_order_amount.map(bd),
        max_discount_amount: req.max_discount_amount.map(bd),
        usage_limit: req.usage_limit,
        times_used: existing.times_used,
        expires_at: req.expires_at,
        is_active: req.is_active,
        created_at: existing.created_at,
    };
    diesel::update(discount_codes::table.find(id))
        .set(&row)
        .execute(&mut conn)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Update error: {e}")))?;
    Ok(Json(row.into()))
}

pub async fn delete_discount_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;
    let deleted = diesel::delete(discount_codes::table.find(id))
        .execute(&mut conn)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Delete error: {e}")))?;
    if deleted == 0 {
        return Err((StatusCode::NOT_FOUND, "discount code not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub fn configure_admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/admin/discounts",
            get(list_discount_codes).post(create_discount_code),
        )
        .route(
            "/api/admin/discounts/{id}",
            axum::routing::put(update_discount_code).delete(delete_discount_code),
        )
}
