pub(crate) mod admin;
pub(crate) mod backup;
pub(crate) mod clients;
pub(crate) mod stages;

use nile_pipeline::{dates, PipelineError};
use serde::Serialize;
use time::Date;

use crate::OutputFormat;

/// Output settings shared by every command.
pub(crate) struct Ctx {
    pub output: OutputFormat,
    pub quiet: bool,
}

impl Ctx {
    /// Print `value` as pretty JSON, or the text produced by `text`.
    pub(crate) fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) {
        if self.quiet {
            return;
        }
        match self.output {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(value)
                    .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
                println!("{}", json);
            }
            OutputFormat::Text => print!("{}", text()),
        }
    }
}

/// `--today` value, or the current date.
pub(crate) fn reference_date(today: Option<&str>) -> Result<Date, PipelineError> {
    match today {
        Some(d) => dates::parse_date("--today", d),
        None => Ok(dates::today()),
    }
}

pub(crate) fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

/// One line per row, or a note when there are none.
pub(crate) fn lines<T>(rows: &[T], empty: &str, line: impl Fn(&T) -> String) -> String {
    if rows.is_empty() {
        return format!("{empty}\n");
    }
    rows.iter().map(|r| line(r) + "\n").collect()
}
