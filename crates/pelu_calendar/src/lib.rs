//! Calendar client for the booking engine.
//!
//! Wraps the Google Calendar API behind `pelu_common::services::CalendarService`:
//! reading busy intervals for a day, publishing reservations as events keyed
//! by an idempotent `gkey` private property, and cancelling them.

pub mod auth;
pub mod logic;
pub mod service;

pub use logic::GcalError;
pub use service::GoogleCalendarService;
