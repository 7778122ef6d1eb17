//! The only place booking money/time fields are derived from line items.
//! Everything else reads the persisted values or these resolvers.

use crate::shared::utils::bd_to_f64;
use crate::store::BookingItem;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineInput {
    pub quantity: i32,
    pub unit_price: f64,
    pub minutes_per_unit: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Totals {
    pub subtotal: f64,
    pub minutes: i32,
}

pub fn compute_totals(items: &[LineInput]) -> Totals {
    let subtotal = items
        .iter()
        .map(|i| i.quantity as f64 * i.unit_price)
        .sum();
    let minutes = items.iter().map(|i| i.quantity * i.minutes_per_unit).sum();
    Totals { subtotal, minutes }
}

/// Admin override wins verbatim; otherwise subtotal minus discount, floored
/// at zero. The computed total is persisted unchanged either way.
pub fn resolve_display_total(subtotal: f64, discount: f64, admin_total_override: Option<f64>) -> f64 {
    match admin_total_override {
        Some(value) => value,
        None => (subtotal - discount).max(0.0),
    }
}

pub fn resolve_display_time(minutes: i32, admin_time_override: Option<i32>) -> i32 {
    admin_time_override.unwrap_or(minutes)
}

pub fn line_inputs(items: &[BookingItem]) -> Vec<LineInput> {
    items
        .iter()
        .map(|item| LineInput {
            quantity: item.quantity,
            unit_price: bd_to_f64(&item.unit_price),
            minutes_per_unit: item.minutes_per_unit,
        })
        .collect()
}
