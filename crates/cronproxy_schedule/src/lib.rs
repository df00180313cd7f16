//! Schedule gate.
//!
//! Parses five-field cron expressions and decides whether a request arrives
//! close enough to the next scheduled minute to justify a live fetch.

mod error;
mod gate;
mod schedule;

pub use error::{ParseError, ScheduleError};
pub use gate::{is_admitted, normalize};
