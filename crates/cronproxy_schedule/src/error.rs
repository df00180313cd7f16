use croner::errors::CronError;
use thiserror::Error;

/// Why a cron expression was rejected.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("expected exactly 5 fields, found {found}: {expr:?}")]
    FieldCount { found: usize, expr: String },

    #[error("{0}")]
    Pattern(#[from] CronError),
}

/// Error returned by the admission gate.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("failed to parse crontab: {0}")]
    Parse(#[from] ParseError),
}
