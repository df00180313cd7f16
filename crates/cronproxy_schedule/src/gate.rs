use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

use crate::error::ScheduleError;
use crate::schedule::Schedule;

/// Width of the admission window before each scheduled minute.
const ADMISSION_WINDOW_SECS: i64 = 60;

/// Replaces underscores with spaces so an expression can travel in a URL
/// without escaping (`0_0_*_*_*` == `0 0 * * *`).
pub fn normalize(raw: &str) -> String {
    raw.replace('_', " ")
}

/// Answers whether the next run of `expression` is at most a minute away
/// from `now`. Expects an already normalized expression.
///
/// Exactly one minute boundary falls in `(now, now + 60s]`, so the next run
/// is within the window iff that boundary is a scheduled minute. The
/// boundary is found in absolute time and only then read as wall-clock time
/// in `now`'s zone, which keeps DST transitions out of the search: a
/// skipped wall-clock minute is never seen, and a repeated one is seen on
/// each pass.
pub fn is_admitted<Tz: TimeZone>(
    expression: &str,
    now: &DateTime<Tz>,
) -> Result<bool, ScheduleError> {
    let schedule: Schedule = expression.parse()?;

    let Some(boundary) = next_minute_boundary(now) else {
        debug!(target: "cronproxy::schedule", %expression, "Instant outside the calendar");
        return Ok(false);
    };

    let admitted = schedule.matches(&boundary);
    debug!(
        target: "cronproxy::schedule",
        %expression,
        wait_secs = boundary.clone().signed_duration_since(now.clone()).num_seconds(),
        admitted,
        "Evaluated schedule"
    );
    Ok(admitted)
}

/// The only minute boundary in `(now, now + 60s]`, in `now`'s zone.
fn next_minute_boundary<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let minute = now.timestamp().div_euclid(ADMISSION_WINDOW_SECS) + 1;
    let utc = DateTime::<Utc>::from_timestamp(minute.checked_mul(ADMISSION_WINDOW_SECS)?, 0)?;
    Some(utc.with_timezone(&now.timezone()))
}
