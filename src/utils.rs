/// Utility functions for time keeping and value formatting
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

const KMH_TO_MPH: f64 = 0.62137119;

/// Source of "now" in local wall-clock time
///
/// The aggregator and scheduler take a clock instead of calling
/// `OffsetDateTime::now_utc` so tests can pin the time of day.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock shifted to the local offset resolved at startup
///
/// The offset is fixed for the process lifetime; a DST change takes effect
/// on the next restart.
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    offset: UtcOffset,
}

impl LocalClock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }
}

impl Clock for LocalClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }
}

/// Resolve the machine's local UTC offset
///
/// Must run before any other thread is spawned; the `time` crate refuses to
/// read the local offset from a multi-threaded process on Unix.
pub fn resolve_local_offset() -> Result<UtcOffset, time::error::IndeterminateOffset> {
    UtcOffset::current_local_offset()
}

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description!("[day].[month].[year] - [hour]:[minute]:[second]");
    dt.format(format).unwrap_or_else(|_| dt.to_string())
}

/// Format a reading as a decimal with two places, as sinks expect
pub fn format_param(value: f64) -> String {
    format!("{:.2}", value)
}

pub fn kmh_to_mph(kmh: f64) -> f64 {
    kmh * KMH_TO_MPH
}

/// Cut a response body down for logging without splitting a UTF-8 character
pub fn truncate_for_log(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
