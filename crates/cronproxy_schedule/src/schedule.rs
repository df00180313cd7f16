use std::str::FromStr;

use chrono::{DateTime, TimeZone};
use croner::Cron;

use crate::error::ParseError;

const FIELD_COUNT: usize = 5;

/// A parsed five-field cron expression
/// (minute, hour, day-of-month, month, day-of-week).
///
/// When both day fields are restricted a day matches if either does;
/// when one of them is `*` both must match.
#[derive(Debug)]
pub(crate) struct Schedule {
    cron: Cron,
}

impl FromStr for Schedule {
    type Err = ParseError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        // croner also takes seconds and `@daily`-style nicknames; neither is
        // part of the accepted dialect.
        let found = expr.split_whitespace().count();
        if found != FIELD_COUNT {
            return Err(ParseError::FieldCount {
                found,
                expr: expr.to_string(),
            });
        }

        let cron = Cron::new(expr).parse()?;
        Ok(Self { cron })
    }
}

impl Schedule {
    /// Whether the wall-clock minute of `at` (in its own zone) is scheduled.
    pub(crate) fn matches<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
        // Only fails for components outside the calendar, which a real
        // instant never has.
        self.cron.is_time_matching(at).unwrap_or(false)
    }
}
