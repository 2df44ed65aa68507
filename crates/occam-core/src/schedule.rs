//! # Audit Schedule
//!
//! A five-field cron subset, `"M H * * D"`, evaluated in UTC:
//!
//! | Field | Accepts |
//! |-------|---------|
//! | minute | `0`-`59` or `*` |
//! | hour | `0`-`23` or `*` |
//! | day of month | `*` |
//! | month | `*` |
//! | day of week | `0`-`7` (0 and 7 are Sunday) or `*` |
//!
//! The default weekly audit schedule `"0 0 * * 0"` fires every Sunday at
//! 00:00 UTC.

use std::str::FromStr;

use chrono::{Datelike, Duration, TimeZone, Utc};

use crate::error::OccamError;
use crate::temporal::Timestamp;

/// A parsed cron schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditSchedule {
    minute: Option<u32>,
    hour: Option<u32>,
    weekday: Option<u32>,
}

impl AuditSchedule {
    /// Parse `"M H * * D"`.
    ///
    /// # Errors
    ///
    /// `OccamError::Configuration` for anything outside the subset.
    pub fn parse(expr: &str) -> Result<Self, OccamError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        let [minute, hour, dom, month, dow] = fields.as_slice() else {
            return Err(invalid(expr, "expected five fields"));
        };
        if *dom != "*" || *month != "*" {
            return Err(invalid(expr, "day-of-month and month must be '*'"));
        }
        Ok(Self {
            minute: field(expr, minute, 59)?,
            hour: field(expr, hour, 23)?,
            weekday: field(expr, dow, 7)?.map(|d| d % 7),
        })
    }

    /// The first firing strictly after `t`.
    ///
    /// Every schedule in the subset fires at least once a week, so this
    /// only returns `None` if the calendar runs out.
    pub fn next_after(&self, t: Timestamp) -> Option<Timestamp> {
        let start = *t.as_datetime() + Duration::seconds(60 - t.epoch_secs().rem_euclid(60));
        let hours = self.hour.map_or(0..=23, |h| h..=h);
        let minutes = self.minute.map_or(0..=59, |m| m..=m);

        for offset in 0..=7 {
            let date = start.date_naive().checked_add_signed(Duration::days(offset))?;
            if self
                .weekday
                .is_some_and(|d| date.weekday().num_days_from_sunday() != d)
            {
                continue;
            }
            for h in hours.clone() {
                for m in minutes.clone() {
                    let Some(naive) = date.and_hms_opt(h, m, 0) else {
                        continue;
                    };
                    let candidate = Utc.from_utc_datetime(&naive);
                    if candidate >= start {
                        return Some(Timestamp::from_utc(candidate));
                    }
                }
            }
        }
        None
    }
}

impl Default for AuditSchedule {
    fn default() -> Self {
        Self {
            minute: Some(0),
            hour: Some(0),
            weekday: Some(0),
        }
    }
}

impl FromStr for AuditSchedule {
    type Err = OccamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for AuditSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let show = |v: Option<u32>| v.map_or_else(|| "*".to_string(), |n| n.to_string());
        write!(
            f,
            "{} {} * * {}",
            show(self.minute),
            show(self.hour),
            show(self.weekday)
        )
    }
}

fn field(expr: &str, raw: &str, max: u32) -> Result<Option<u32>, OccamError> {
    if raw == "*" {
        return Ok(None);
    }
    match raw.parse::<u32>() {
        Ok(n) if n <= max => Ok(Some(n)),
        _ => Err(invalid(expr, &format!("field {raw:?} must be '*' or 0-{max}"))),
    }
}

fn invalid(expr: &str, reason: &str) -> OccamError {
    OccamError::Configuration(format!("invalid schedule {expr:?}: {reason}"))
}
