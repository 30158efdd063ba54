//! Tabular summary of registered jobs

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use std::fmt;

use super::state::JobState;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const UNKNOWN_APP: &str = "Unknown App";
const NOT_STARTED: &str = "Not started";
const INCOMPLETE: &str = "Incomplete";

const HEADERS: [&str; 7] = [
    "Id",
    "Name",
    "Submitted",
    "Submitted By",
    "Status",
    "Run Time",
    "Complete Time",
];

/// Raw data for one summary row
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub job_id: String,
    pub app_id: Option<String>,
    pub owner: Option<String>,
    pub job_state: String,
    pub creation_time: Option<i64>,
    pub exec_start_time: Option<i64>,
    pub finish_time: Option<i64>,
    pub complete_time: Option<i64>,
}

impl JobRow {
    pub fn new(job_id: &str, state: &JobState, app_id: Option<String>, owner: Option<&str>) -> Self {
        Self {
            job_id: job_id.to_string(),
            app_id,
            owner: owner.map(String::from),
            job_state: state.job_state.clone(),
            creation_time: state.creation_time,
            exec_start_time: state.exec_start_time,
            finish_time: state.finish_time,
            complete_time: state.complete_time,
        }
    }

    /// Run time as shown in the table
    ///
    /// A completed job without both start and finish times shows nothing.
    fn run_time(&self, now: DateTime<Utc>) -> String {
        if self.complete_time.is_some() {
            return match (self.exec_start_time, self.finish_time) {
                (Some(start), Some(finish)) => format_duration(Duration::milliseconds(finish - start)),
                _ => String::new(),
            };
        }

        match self.exec_start_time {
            Some(start) => format_duration(Duration::milliseconds(now.timestamp_millis() - start)),
            None => NOT_STARTED.to_string(),
        }
    }

    fn cells(&self, now: DateTime<Utc>) -> [String; 7] {
        [
            self.job_id.clone(),
            self.app_id.clone().unwrap_or_else(|| UNKNOWN_APP.to_string()),
            self.creation_time.map(format_timestamp).unwrap_or_default(),
            self.owner.clone().unwrap_or_default(),
            self.job_state.clone(),
            self.run_time(now),
            self.complete_time
                .map(format_timestamp)
                .unwrap_or_else(|| INCOMPLETE.to_string()),
        ]
    }
}

/// Rendered summary, oldest job first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTable {
    rows: Vec<[String; 7]>,
}

impl JobTable {
    /// Sort rows by creation time and format them relative to `now`
    pub fn build(mut rows: Vec<JobRow>, now: DateTime<Utc>) -> Self {
        // Rows without a creation time sort last
        rows.sort_by_key(|row| (row.creation_time.is_none(), row.creation_time));

        Self {
            rows: rows.iter().map(|row| row.cells(now)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Job ids in display order
    pub fn job_ids(&self) -> Vec<&str> {
        self.rows.iter().map(|row| row[0].as_str()).collect()
    }

    /// Formatted cells of one row
    pub fn row(&self, index: usize) -> Option<&[String; 7]> {
        self.rows.get(index)
    }
}

impl fmt::Display for JobTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rows.is_empty() {
            return writeln!(f, "No running jobs!");
        }

        let mut widths = HEADERS.map(str::len);
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        write_row(f, &widths, HEADERS.as_slice())?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        write_row(f, &widths, rule.as_slice())?;
        for row in &self.rows {
            write_row(f, &widths, row.as_slice())?;
        }
        Ok(())
    }
}

fn write_row<S: AsRef<str>>(f: &mut fmt::Formatter<'_>, widths: &[usize; 7], cells: &[S]) -> fmt::Result {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell.as_ref(), width = *width))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(f, "{}", line.trim_end())
}

/// Format epoch milliseconds in local time
pub fn format_timestamp(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}

/// Format a duration as `H:MM:SS`, prefixed with `N day(s), ` past one day
///
/// Sub-second precision is dropped and negative durations show as zero.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let clock = format!("{hours}:{minutes:02}:{seconds:02}");
    match days {
        0 => clock,
        1 => format!("1 day, {clock}"),
        n => format!("{n} days, {clock}"),
    }
}
