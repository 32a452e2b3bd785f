use std::sync::Mutex;

use chrono::{Duration, Local, NaiveDateTime};

/// Source of "now" for everything that reasons about expiry or the
/// current prediction week. All times are naive local wall-clock times.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Manually driven clock for tests and replaying cached data.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

pub fn iso_timestamp(time: NaiveDateTime) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

pub fn parse_iso_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim().trim_end_matches('Z');
    trimmed
        .parse::<NaiveDateTime>()
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_timestamps_round_trip() {
        let t = NaiveDateTime::parse_from_str("2024-10-19 14:59:01", "%Y-%m-%d %H:%M:%S")
            .expect("valid timestamp");
        let raw = iso_timestamp(t);
        assert_eq!(raw, "2024-10-19T14:59:01.000000");
        assert_eq!(parse_iso_timestamp(&raw), Some(t));
    }

    #[test]
    fn accepts_python_style_isoformat_without_fraction() {
        let parsed = parse_iso_timestamp("2024-10-19T15:00:00").expect("parses");
        assert_eq!(parsed.format("%H:%M").to_string(), "15:00");
    }

    #[test]
    fn fixed_clock_advances() {
        let start = NaiveDateTime::parse_from_str("2024-10-19 00:00:00", "%Y-%m-%d %H:%M:%S")
            .expect("valid timestamp");
        let clock = FixedClock::new(start);
        clock.advance(Duration::hours(3));
        assert_eq!(clock.now(), start + Duration::hours(3));
    }
}
