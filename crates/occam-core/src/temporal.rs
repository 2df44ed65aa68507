//! # Timestamps
//!
//! Every instant the engine records (context start time, report generation,
//! drift detection, schedule slots) is a [`Timestamp`]: UTC, whole seconds,
//! rendered `YYYY-MM-DDTHH:MM:SSZ`. The start time is part of the
//! checksummed context body, so sub-second noise is dropped on construction
//! and the parser refuses anything but the `Z` suffix.

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OccamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt.with_nanosecond(0).unwrap_or(dt))
    }

    /// # Errors
    ///
    /// `Validation` unless `s` is RFC 3339 with a `Z` suffix. `+00:00` is
    /// rejected too, so one instant has exactly one accepted spelling.
    pub fn parse(s: &str) -> Result<Self, OccamError> {
        if !s.ends_with('Z') {
            return Err(OccamError::Validation(format!(
                "timestamp {s:?} is not UTC (expected a Z suffix)"
            )));
        }
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self::from_utc(dt.with_timezone(&Utc)))
            .map_err(|e| OccamError::Validation(format!("timestamp {s:?}: {e}")))
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// UTC calendar date; report files are named after it.
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    /// `self - d`, or `self` unchanged if that would leave chrono's range.
    pub fn saturating_sub(&self, d: Duration) -> Self {
        Self(self.0.checked_sub_signed(d).unwrap_or(self.0))
    }

    /// Wall-clock time from `self` to `later`; zero if `later` is not after
    /// `self`.
    pub fn duration_until(&self, later: Timestamp) -> std::time::Duration {
        (later.0 - self.0).to_std().unwrap_or_default()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

impl std::str::FromStr for Timestamp {
    type Err = OccamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Timestamp {
    type Error = OccamError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn context_start_times_drop_subseconds() {
        let a = Utc.with_ymd_and_hms(2026, 3, 8, 0, 0, 7).unwrap();
        let b = a.with_nanosecond(999_000_000).unwrap();
        assert_eq!(Timestamp::from_utc(a), Timestamp::from_utc(b));
        assert_eq!(Timestamp::now().as_datetime().nanosecond(), 0);
    }

    #[test]
    fn only_z_suffix_parses() {
        let ts: Timestamp = "2026-03-08T00:00:00Z".parse().unwrap();
        assert_eq!(ts.to_string(), "2026-03-08T00:00:00Z");
        for bad in ["2026-03-08T00:00:00+00:00", "2026-03-08T05:00:00+05:00", "2026-03-08", ""] {
            assert!(Timestamp::parse(bad).is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn serde_uses_the_display_form() {
        let ts = Timestamp::parse("2026-03-08T18:30:00Z").unwrap();
        assert_eq!(serde_json::to_string(&ts).unwrap(), "\"2026-03-08T18:30:00Z\"");
        assert!(serde_json::from_str::<Timestamp>("\"2026-03-08T18:30:00+01:00\"").is_err());
    }

    #[test]
    fn report_date_and_period_arithmetic() {
        let end = Timestamp::parse("2026-03-08T23:59:59Z").unwrap();
        let start = end.saturating_sub(Duration::days(7));
        assert_eq!(start.date(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(start.duration_until(end).as_secs(), 7 * 86_400);
        assert_eq!(end.duration_until(start), std::time::Duration::ZERO);
    }
}
