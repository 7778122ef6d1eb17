pub mod memory;
pub mod pg;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::shared::schema::{booking_items, bookings, recurring_rules};

pub use memory::MemoryStore;
pub use pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("database error: {0}")]
    Query(#[from] diesel::result::Error),
}

/// A scheduled (or draft) service engagement. Rows with `recurrence_id` set
/// are materialized occurrences of a recurring rule; the rule's base booking
/// never carries `recurrence_id`.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = bookings, treat_none_as_null = true)]
pub struct Booking {
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
    pub subtotal: BigDecimal,
    pub discount: BigDecimal,
    pub total: BigDecimal,
    pub admin_total_override: Option<BigDecimal>,
    pub total_time_minutes: i32,
    pub admin_time_override: Option<i32>,
    pub discount_code: Option<String>,
    pub notes: Option<String>,
    pub recurrence_id: Option<Uuid>,
    pub occurrence_index: Option<i32>,
    pub stripe_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_occurrence(&self) -> bool {
        self.recurrence_id.is_some()
    }
}

/// A quantity of one service attached to one booking. Price and duration are
/// snapshots taken when the item was added, not live references to the
/// service catalog.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = booking_items)]
pub struct BookingItem {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub service_id: Option<Uuid>,
    pub service_name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub minutes_per_unit: i32,
    pub created_at: DateTime<Utc>,
}

/// The abstract recurrence pattern driving a family of bookings. At most one
/// active rule exists per base booking.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = recurring_rules)]
pub struct RecurringRule {
    pub id: Uuid,
    pub base_booking_id: Uuid,
    pub frequency: String,
    pub start_at: DateTime<Utc>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub status: Option<String>,
    pub frequency: Option<String>,
    pub search: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Storage port for the booking engine. Every method is a single storage
/// operation; multi-step sequences (the reconciler's delete-then-recreate)
/// are composed by callers and are not atomic.
pub trait BookingStore: Send + Sync {
    fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError>;
    fn update_booking(&self, booking: &Booking) -> Result<(), StoreError>;
    fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;
    fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError>;
    /// Deletes the booking row and its line items. Does not touch rules or
    /// sibling occurrences; cascade ordering is the lifecycle service's job.
    fn delete_booking(&self, id: Uuid) -> Result<(), StoreError>;

    /// Replace-on-save item semantics: drops every existing item for the
    /// booking and inserts the given set.
    fn replace_items(&self, booking_id: Uuid, items: &[BookingItem]) -> Result<(), StoreError>;
    fn items_for(&self, booking_id: Uuid) -> Result<Vec<BookingItem>, StoreError>;

    /// Non-cancelled one-time bookings (no recurrence linkage) whose
    /// service_date falls in `[start, end)`.
    fn one_time_bookings_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError>;

    fn insert_rule(&self, rule: &RecurringRule) -> Result<(), StoreError>;
    fn update_rule(&self, rule: &RecurringRule) -> Result<(), StoreError>;
    fn delete_rule(&self, id: Uuid) -> Result<(), StoreError>;
    fn get_rule(&self, id: Uuid) -> Result<Option<RecurringRule>, StoreError>;
    fn rule_for_base(&self, base_booking_id: Uuid) -> Result<Option<RecurringRule>, StoreError>;
    fn active_rules(&self) -> Result<Vec<RecurringRule>, StoreError>;

    /// Materialized occurrence bookings of a rule, any service_date.
    fn occurrences_of(&self, rule_id: Uuid) -> Result<Vec<Booking>, StoreError>;
    /// Bulk delete of occurrence bookings and their items.
    fn delete_bookings(&self, ids: &[Uuid]) -> Result<(), StoreError>;
}
