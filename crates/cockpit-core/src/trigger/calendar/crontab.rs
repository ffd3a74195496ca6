//! Unix five-field crontab on top of the `cron` crate.
//!
//! The crate wants a leading seconds field, numbers weekdays from 1 (Sunday)
//! and requires both day fields to match. Expressions are rewritten so they
//! keep Unix meaning: weekdays 0-7 with 0 and 7 both Sunday, and when day of
//! month and day of week are both restricted a day matches if either does.

use std::str::FromStr;

use chrono::{DateTime, TimeZone};
use cron::Schedule;

use super::WEEKDAY_NAMES;

/// Field name and largest value, in expression order.
const FIELDS: [(&str, u32); 5] =
    [("minute", 59), ("hour", 23), ("day of month", 31), ("month", 12), ("day of week", 7)];

/// Steps must be positive and fit inside the field.
fn check_steps(field: &str, name: &str, max: u32) -> Result<(), String> {
    for item in field.split(',') {
        if let Some((_, step)) = item.split_once('/') {
            if !step.parse::<u32>().is_ok_and(|s| (1..=max).contains(&s)) {
                return Err(format!("invalid step '{}' in {} field", step, name));
            }
        }
    }
    Ok(())
}

fn weekday(value: &str) -> Result<usize, String> {
    value
        .parse::<usize>()
        .ok()
        .filter(|d| *d <= 7)
        .ok_or_else(|| format!("invalid value '{}' in day of week field", value))
}

/// Rewrite a numeric day-of-week field as a list of day names.
fn weekday_field(field: &str) -> Result<String, String> {
    if field == "*" || field.chars().any(|c| c.is_ascii_alphabetic()) {
        return Ok(field.to_string());
    }

    let mut days = 0_u8;
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, step.parse::<usize>().ok().filter(|s| *s > 0)),
            None => (item, Some(1)),
        };
        let step = step.ok_or_else(|| format!("invalid step in '{}'", item))?;
        let (start, end) = if range == "*" {
            (0, 7)
        } else if let Some((a, b)) = range.split_once('-') {
            (weekday(a)?, weekday(b)?)
        } else {
            let day = weekday(range)?;
            (day, if item.contains('/') { 7 } else { day })
        };
        if start > end {
            return Err(format!("range {}-{} is reversed in day of week field", start, end));
        }
        for day in (start..=end).step_by(step) {
            days |= 1 << (day % 7);
        }
    }

    let names: Vec<&str> = WEEKDAY_NAMES
        .iter()
        .enumerate()
        .filter(|(i, _)| days & (1 << i) != 0)
        .map(|(_, name)| *name)
        .collect();
    Ok(names.join(","))
}

/// One Unix expression as one or two crate schedules.
fn compile(expr: &str) -> Result<Vec<Schedule>, String> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    let [minute, hour, dom, month, dow] = fields.as_slice() else {
        return Err(format!("expected 5 fields, found {}", fields.len()));
    };
    for (field, (name, max)) in fields.iter().zip(FIELDS) {
        check_steps(field, name, max)?;
    }

    let weekdays = weekday_field(dow)?;
    let sources = if *dom != "*" && *dow != "*" {
        vec![
            format!("0 {} {} {} {} *", minute, hour, dom, month),
            format!("0 {} {} * {} {}", minute, hour, month, weekdays),
        ]
    } else {
        vec![format!("0 {} {} {} {} {}", minute, hour, dom, month, weekdays)]
    };

    sources
        .iter()
        .map(|source| {
            Schedule::from_str(source).map_err(|e| format!("invalid expression '{}': {}", expr, e))
        })
        .collect()
}

/// One or more expressions joined by `;`. Fires when any of them matches.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    schedules: Vec<Schedule>,
}

impl CronSchedule {
    pub fn parse(source: &str) -> Result<Self, String> {
        let mut schedules = Vec::new();
        for expr in source.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            schedules.extend(compile(expr)?);
        }
        if schedules.is_empty() {
            return Err("empty expression".to_string());
        }
        Ok(Self { schedules })
    }

    /// First matching minute strictly after `after`, in `after`'s zone.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.schedules.iter().filter_map(|s| s.after(after).next()).min()
    }
}
