//! Calendar helpers. Dates are stored as `YYYY-MM-DD` text, timestamps as
//! ISO 8601 UTC text.

use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};

use crate::error::PipelineError;

/// Today's date in UTC.
pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// Current time as an ISO 8601 UTC timestamp with second precision.
pub fn now_timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{}T{:02}:{:02}:{:02}Z",
        format_date(now.date()),
        now.hour(),
        now.minute(),
        now.second()
    )
}

pub fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Parse a `YYYY-MM-DD` date. `field` names the input in the error message.
pub fn parse_date(field: &str, value: &str) -> Result<Date, PipelineError> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]")).map_err(|e| {
        PipelineError::validation(format!("{field} '{value}' is not a YYYY-MM-DD date: {e}"))
    })
}

pub fn add_days(date: Date, days: i64) -> Result<Date, PipelineError> {
    days.checked_mul(86_400)
        .map(Duration::seconds)
        .and_then(|offset| date.checked_add(offset))
        .ok_or_else(|| PipelineError::validation(format!("date {date} + {days} days overflows")))
}
