use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::store::{Booking, BookingFilter, BookingItem, BookingStore, RecurringRule, StoreError};

/// In-memory implementation of the storage port. Backs the engine tests and
/// local experiments; mirrors the Postgres store's filter semantics.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    bookings: HashMap<Uuid, Booking>,
    items: HashMap<Uuid, Vec<BookingItem>>,
    rules: HashMap<Uuid, RecurringRule>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(filter: &BookingFilter, b: &Booking) -> bool {
    if let Some(status) = &filter.status {
        if status != "all" && &b.status != status {
            return false;
        }
    }
    if let Some(frequency) = &filter.frequency {
        if &b.frequency != frequency {
            return false;
        }
    }
    if let Some(search) = &filter.search {
        let needle = search.to_lowercase();
        let name_hit = b
            .customer_name
            .as_deref()
            .is_some_and(|n| n.to_lowercase().contains(&needle));
        let email_hit = b
            .customer_email
            .as_deref()
            .is_some_and(|e| e.to_lowercase().contains(&needle));
        if !name_hit && !email_hit {
            return false;
        }
    }
    if let Some(from) = filter.from_date {
        if !b.service_date.is_some_and(|d| d >= from) {
            return false;
        }
    }
    if let Some(to) = filter.to_date {
        if !b.service_date.is_some_and(|d| d < to) {
            return false;
        }
    }
    true
}

impl BookingStore for MemoryStore {
    fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    fn update_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.bookings.get(&id).cloned())
    }

    fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| matches(filter, b))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.unwrap_or(50).max(0) as usize;
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    fn delete_booking(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.bookings.remove(&id);
        inner.items.remove(&id);
        Ok(())
    }

    fn replace_items(&self, booking_id: Uuid, items: &[BookingItem]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.items.insert(booking_id, items.to_vec());
        Ok(())
    }

    fn items_for(&self, booking_id: Uuid) -> Result<Vec<BookingItem>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.items.get(&booking_id).cloned().unwrap_or_default())
    }

    fn one_time_bookings_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .bookings
            .values()
            .filter(|b| b.frequency == "one_time")
            .filter(|b| b.recurrence_id.is_none())
            .filter(|b| b.status != "cancelled")
            .filter(|b| b.service_date.is_some_and(|d| d >= start && d < end))
            .cloned()
            .collect())
    }

    fn insert_rule(&self, rule: &RecurringRule) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.rules.insert(rule.id, rule.clone());
        Ok(())
    }

    fn update_rule(&self, rule: &RecurringRule) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.rules.insert(rule.id, rule.clone());
        Ok(())
    }

    fn delete_rule(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.rules.remove(&id);
        Ok(())
    }

    fn get_rule(&self, id: Uuid) -> Result<Option<RecurringRule>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.rules.get(&id).cloned())
    }

    fn rule_for_base(&self, base_booking_id: Uuid) -> Result<Option<RecurringRule>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .rules
            .values()
            .find(|r| r.base_booking_id == base_booking_id)
            .cloned())
    }

    fn active_rules(&self) -> Result<Vec<RecurringRule>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.rules.values().filter(|r| r.active).cloned().collect())
    }

    fn occurrences_of(&self, rule_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| b.recurrence_id == Some(rule_id))
            .cloned()
            .collect();
        rows.sort_by_key(|b| b.service_date);
        Ok(rows)
    }

    fn delete_bookings(&self, ids: &[Uuid]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for id in ids {
            inner.bookings.remove(id);
            inner.items.remove(id);
        }
        Ok(())
    }
}
