use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use tracing::{debug, info};

pub const DEFAULT_FALLBACK_WINDOW_DAYS: u32 = 14;
pub const MAX_PAST_PROBE_DAYS: i64 = 7;

/// The Saturday currently being collected or monitored. Saturday stays
/// pinned all day, Sunday rolls forward a week, weekdays point at the
/// coming Saturday, so the value only changes at Saturday/Sunday midnight.
pub fn current_prediction_week(now: NaiveDateTime) -> NaiveDate {
    let today = now.date();
    match today.weekday() {
        Weekday::Sat => today,
        Weekday::Sun => today + Duration::days(6),
        weekday => today + Duration::days(5 - i64::from(weekday.num_days_from_monday())),
    }
}

pub fn format_week(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_week(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Counts qualifying (15:00) fixtures on a date.
pub trait FixtureProbe {
    fn qualifying_fixtures(&self, date: NaiveDate) -> usize;
}

/// First date from `start` onwards (at most `window_days` ahead) with at
/// least one qualifying fixture. Dates more than a week before `today` are
/// never probed.
pub fn find_next_fixture_date(
    probe: &dyn FixtureProbe,
    start: NaiveDate,
    today: NaiveDate,
    window_days: u32,
) -> Option<NaiveDate> {
    let earliest = today - Duration::days(MAX_PAST_PROBE_DAYS);
    for offset in 0..=i64::from(window_days) {
        let candidate = start + Duration::days(offset);
        if candidate < earliest {
            continue;
        }
        let found = probe.qualifying_fixtures(candidate);
        debug!(date = %candidate, found, "probed fixture date");
        if found > 0 {
            if offset > 0 {
                info!(target = %start, found_on = %candidate, "using alternative fixture date");
            }
            return Some(candidate);
        }
    }
    info!(target = %start, window_days, "no fixture date found in window");
    None
}
