use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use uuid::Uuid;

use crate::shared::schema::{booking_items, bookings, recurring_rules};
use crate::shared::utils::DbPool;
use crate::store::{Booking, BookingFilter, BookingItem, BookingStore, RecurringRule, StoreError};

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<PooledConnection<ConnectionManager<PgConnection>>, StoreError> {
        Ok(self.pool.get()?)
    }
}

impl BookingStore for PgStore {
    fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::insert_into(bookings::table)
            .values(booking)
            .execute(&mut conn)?;
        Ok(())
    }

    fn update_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::update(bookings::table.find(booking.id))
            .set(booking)
            .execute(&mut conn)?;
        Ok(())
    }

    fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let mut conn = self.conn()?;
        Ok(bookings::table
            .find(id)
            .first::<Booking>(&mut conn)
            .optional()?)
    }

    fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError> {
        let mut conn = self.conn()?;
        let mut q = bookings::table.into_boxed();

        if let Some(status) = &filter.status {
            if status != "all" {
                q = q.filter(bookings::status.eq(status.clone()));
            }
        }
        if let Some(frequency) = &filter.frequency {
            q = q.filter(bookings::frequency.eq(frequency.clone()));
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{search}%");
            q = q.filter(
                bookings::customer_name
                    .ilike(pattern.clone())
                    .or(bookings::customer_email.ilike(pattern)),
            );
        }
        if let Some(from) = filter.from_date {
            q = q.filter(bookings::service_date.ge(from));
        }
        if let Some(to) = filter.to_date {
            q = q.filter(bookings::service_date.lt(to));
        }

        Ok(q.order(bookings::created_at.desc())
            .limit(filter.limit.unwrap_or(50))
            .offset(filter.offset.unwrap_or(0))
            .load(&mut conn)?)
    }

    fn delete_booking(&self, id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::delete(booking_items::table.filter(booking_items::booking_id.eq(id)))
            .execute(&mut conn)?;
        diesel::delete(bookings::table.find(id)).execute(&mut conn)?;
        Ok(())
    }

    fn replace_items(&self, booking_id: Uuid, items: &[BookingItem]) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::delete(booking_items::table.filter(booking_items::booking_id.eq(booking_id)))
            .execute(&mut conn)?;
        if !items.is_empty() {
            diesel::insert_into(booking_items::table)
                .values(items)
                .execute(&mut conn)?;
        }
        Ok(())
    }

    fn items_for(&self, booking_id: Uuid) -> Result<Vec<BookingItem>, StoreError> {
        let mut conn = self.conn()?;
        Ok(booking_items::table
            .filter(booking_items::booking_id.eq(booking_id))
            .order(booking_items::created_at.asc())
            .load(&mut conn)?)
    }

    fn one_time_bookings_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError> {
        let mut conn = self.conn()?;
        Ok(bookings::table
            .filter(bookings::frequency.eq("one_time"))
            .filter(bookings::recurrence_id.is_null())
            .filter(bookings::status.ne("cancelled"))
            .filter(bookings::service_date.ge(start))
            .filter(bookings::service_date.lt(end))
            .load(&mut conn)?)
    }

    fn insert_rule(&self, rule: &RecurringRule) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::insert_into(recurring_rules::table)
            .values(rule)
            .execute(&mut conn)?;
        Ok(())
    }

    fn update_rule(&self, rule: &RecurringRule) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::update(recurring_rules::table.find(rule.id))
            .set(rule)
            .execute(&mut conn)?;
        Ok(())
    }

    fn delete_rule(&self, id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::delete(recurring_rules::table.find(id)).execute(&mut conn)?;
        Ok(())
    }

    fn get_rule(&self, id: Uuid) -> Result<Option<RecurringRule>, StoreError> {
        let mut conn = self.conn()?;
        Ok(recurring_rules::table
            .find(id)
            .first::<RecurringRule>(&mut conn)
            .optional()?)
    }

    fn rule_for_base(&self, base_booking_id: Uuid) -> Result<Option<RecurringRule>, StoreError> {
        let mut conn = self.conn()?;
        Ok(recurring_rules::table
            .filter(recurring_rules::base_booking_id.eq(base_booking_id))
            .first::<RecurringRule>(&mut conn)
            .optional()?)
    }

    fn active_rules(&self) -> Result<Vec<RecurringRule>, StoreError> {
        let mut conn = self.conn()?;
        Ok(recurring_rules::table
            .filter(recurring_rules::active.eq(true))
            .load(&mut conn)?)
    }

    fn occurrences_of(&self, rule_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let mut conn = self.conn()?;
        Ok(bookings::table
            .filter(bookings::recurrence_id.eq(rule_id))
            .order(bookings::service_date.asc())
            .load(&mut conn)?)
    }

    fn delete_bookings(&self, ids: &[Uuid]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn()?;
        diesel::delete(booking_items::table.filter(booking_items::booking_id.eq_any(ids)))
            .execute(&mut conn)?;
        diesel::delete(bookings::table.filter(bookings::id.eq_any(ids))).execute(&mut conn)?;
        Ok(())
    }
}
