//! Service catalog: the priced offerings the booking form sells. Public
//! clients see active services only; admin manages the full set.

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

use crate::shared::schema::services;
use crate::shared::state::AppState;
use crate::shared::utils::{bd, bd_to_f64};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = services, treat_none_as_null = true)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: BigDecimal,
    pub duration_minutes: i32,
    pub category: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub duration_minutes: i32,
    pub category: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ServiceResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub duration_minutes: i32,
    pub category: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
}

impl From<Service> for ServiceResponse {
    fn from(s: Service) -> Self {
        Self {
            id: s.id,
            name: s.name,
            description: s.description,
            price: bd_to_f64(&s.price),
            duration_minutes: s.duration_minutes,
            category: s.category,
            sort_order: s.sort_order,
            is_active: s.is_active,
        }
    }
}

fn validate_service(req: &ServiceRequest) -> Result<(), (StatusCode, String)> {
    if req.name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "name is required".to_string()));
    }
    if req.price < 0.0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "price must not be negative".to_string(),
        ));
    }
    if req.duration_minutes < 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "duration must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// Public catalog for the booking form: active services in display order.
pub async fn list_active_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ServiceResponse>>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;
    let rows: Vec<Service> = services::table
        .filter(services::is_active.eq(true))
        .order((services::sort_order.asc(), services::name.asc()))
        .load(&mut conn)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Query error: {e}")))?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize)]
pub struct ServiceListQuery {
    pub category: Option<String>,
    pub active: Option<bool>,
}

pub async fn admin_list_services(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ServiceListQuery>,
) -> Result<Json<Vec<ServiceResponse>>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;
    let mut q = services::table.into_boxed();
    if let Some(category) = query.category {
        q = q.filter(services::category.eq(category));
    }
    if let Some(active) = query.active {
        q = q.filter(services::is_active.eq(active));
    }
    let rows: Vec<Service> = q
        .order((services::sort_order.asc(), services::name.asc()))
        .load(&mut conn)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Query error: {e}")))?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

pub async fn admin_create_service(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ServiceRequest>,
) -> Result<Json<ServiceResponse>, (StatusCode, String)> {
    validate_service(&req)?;
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;
    let row = Service {
        id: Uuid::new_v4(),
        name: req.name.trim().to_string(),
        description: req.description,
        price: bd(req.price),
        duration_minutes: req.duration_minutes,
        category: req.category,
        sort_order: req.sort_order,
        is_active: req.is_active,
        created_at: Utc::now(),
    };
    diesel::insert_into(services::table)
        .values(&row)
        .execute(&mut conn)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Insert error: {e}")))?;
    Ok(Json(row.into()))
}

pub async fn admin_update_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ServiceRequest>,
) -> Result<Json<ServiceResponse>, (StatusCode, String)> {
    validate_service(&req)?;
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;
    let existing: Option<Service> = services::table
        .find(id)
        .first(&mut conn)
        .optional()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Query error: {e}")))?;
    let Some(existing) = existing else {
        return Err((StatusCode::NOT_FOUND, "service not found".to_string()));
    };
    let row = Service {
        id,
        name: req.name.trim().to_string(),
        description: req.description,
        price: bd(req.price),
        duration_minutes: req.duration_minutes,
        category: req.category,
        sort_order: req.sort_order,
        is_active: req.is_active,
        created_at: existing.created_at,
    };
    diesel::update(services::table.find(id))
        .set(&row)
        .execute(&mut conn)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Update error: {e}")))?;
    Ok(Json(row.into()))
}

/// Deactivates rather than deletes: booking items snapshot service details,
/// but dangling service_id references are still worth avoiding.
pub async fn admin_delete_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;
    let updated = diesel::update(services::table.find(id))
        .set(services::is_active.eq(false))
        .execute(&mut conn)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Update error: {e}")))?;
    if updated == 0 {
        return Err((StatusCode::NOT_FOUND, "service not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub fn configure_public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/services", get(list_active_services))
}

pub fn configure_admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/admin/services",
            get(admin_list_services).post(admin_create_service),
        )
        .route(
            "/api/admin/services/{id}",
            axum::routing::put(admin_update_service).delete(admin_delete_service),
        )
}
