pub mod api_router;
pub mod auth;
pub mod billing;
pub mod bookings;
pub mod calendar;
pub mod config;
pub mod recurrence;
pub mod services;
pub mod shared;
pub mod store;
