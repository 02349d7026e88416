//! Generation clock: owns the "now" of a run and the history window.
//!
//! RULE: Nothing in generation reads the wall clock.
//! Every timestamp is derived from `as_of`, which the caller fixes,
//! so a seed plus an `as_of` fully determine the raw tables.

use crate::{
    error::{SimError, SimResult},
    rng::StreamRng,
    types::TIMESTAMP_FORMAT,
};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Days of history the generated business covers.
pub const HISTORY_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimClock {
    pub as_of: NaiveDateTime,
}

impl SimClock {
    pub fn new(as_of: NaiveDateTime) -> Self {
        Self { as_of }
    }

    /// Midnight at the start of `date`.
    pub fn at_date(date: NaiveDate) -> Self {
        Self::new(date.and_time(chrono::NaiveTime::MIN))
    }

    /// Midnight of today's UTC date. Runs on the same day share it.
    pub fn today() -> Self {
        Self::at_date(chrono::Utc::now().date_naive())
    }

    pub fn history_start(&self) -> NaiveDateTime {
        self.days_before(HISTORY_DAYS)
    }

    pub fn days_before(&self, days: i64) -> NaiveDateTime {
        self.as_of - Duration::days(days)
    }

    /// `days_before` for a drawn day count; fails instead of leaving chrono's range.
    pub fn checked_days_before(&self, days: u64) -> SimResult<NaiveDateTime> {
        i64::try_from(days)
            .ok()
            .and_then(Duration::try_days)
            .and_then(|d| self.as_of.checked_sub_signed(d))
            .ok_or_else(|| out_of_range(format!("{days} days before {}", self.as_of)))
    }

    /// Uniform instant in [from, to], truncated to whole seconds.
    pub fn uniform_between(
        rng: &mut StreamRng,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> NaiveDateTime {
        let span = (to - from).num_seconds().max(0);
        let offset = (rng.next_f64() * span as f64) as i64;
        from + Duration::seconds(offset)
    }
}

pub fn checked_add_days(t: NaiveDateTime, days: u64) -> SimResult<NaiveDateTime> {
    i64::try_from(days)
        .ok()
        .and_then(Duration::try_days)
        .and_then(|d| t.checked_add_signed(d))
        .ok_or_else(|| out_of_range(format!("{days} days after {t}")))
}

pub fn checked_add_secs(t: NaiveDateTime, secs: u64) -> SimResult<NaiveDateTime> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|d| t.checked_add_signed(d))
        .ok_or_else(|| out_of_range(format!("{secs}s after {t}")))
}

fn out_of_range(what: String) -> SimError {
    SimError::InvalidArgument(format!("timestamp {what} is out of range"))
}

pub fn format_ts(t: NaiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_ts(s: &str) -> chrono::ParseResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
}
