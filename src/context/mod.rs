//! Per-request user context: identity, timezone, week-start day, and
//! feature flags, plus the per-user serialization primitive described in
//! spec §5.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::model::UserId;

mod locks;
pub use locks::UserLocks;

/// Everything the engine needs to know about "the user making this request"
/// that isn't itself a store.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: UserId,
    pub timezone: Tz,
    pub first_day_of_week: Weekday,
    pub ignore_short_events: bool,
}

impl UserContext {
    /// Falls back to Monday when the configured weekday can't be resolved
    /// (spec §4.5 step 1).
    pub fn new(user_id: UserId, timezone: Tz, first_day_of_week: Option<Weekday>, ignore_short_events: bool) -> Self {
        Self {
            user_id,
            timezone,
            first_day_of_week: first_day_of_week.unwrap_or(Weekday::Mon),
            ignore_short_events,
        }
    }

    /// The user-local calendar date of an instant.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }

    /// `[start-of-day, end-of-day]` for `date`, both as UTC instants, with
    /// the end bound at `23:59:59.999999999` local time (spec §4.3, §9) so
    /// that half-open non-overlap and single-local-day can coexist.
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start_local = self
            .timezone
            .from_local_datetime(&date.and_time(NaiveTime::MIN))
            .single()
            .unwrap_or_else(|| self.timezone.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
        let end_time = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap();
        let end_local = self
            .timezone
            .from_local_datetime(&date.and_time(end_time))
            .single()
            .unwrap_or_else(|| self.timezone.from_utc_datetime(&date.and_time(end_time)));
        (start_local.with_timezone(&Utc), end_local.with_timezone(&Utc))
    }

    /// The UTC instant for local midnight on `date`.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        self.day_bounds(date).0
    }

    /// Resolve `[week_start, week_end]` for `week_time` per spec §4.5 step 1:
    /// the most recent local midnight whose weekday matches
    /// `first_day_of_week` and is `<= week_time`, through 7 days minus 1ns.
    pub fn week_range(&self, week_time: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let today = self.local_date(week_time);
        let days_since_start: i64 = today
            .weekday()
            .days_since(self.first_day_of_week)
            .into();
        let week_start_date = today - Duration::days(days_since_start);
        let week_start = self.start_of_day(week_start_date);
        let week_end = week_start + Duration::days(7) - Duration::nanoseconds(1);
        (week_start, week_end)
    }
}
