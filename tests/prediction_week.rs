mod common;

use std::cell::RefCell;

use chrono::NaiveDate;

use acca_tracker::prediction_week::{
    DEFAULT_FALLBACK_WINDOW_DAYS, FixtureProbe, current_prediction_week, find_next_fixture_date,
};

use common::{at, date};

#[test]
fn saturday_stays_pinned_and_sunday_rolls_forward() {
    assert_eq!(current_prediction_week(at("2024-10-19 10:00")), date("2024-10-19"));
    assert_eq!(current_prediction_week(at("2024-10-19 23:59")), date("2024-10-19"));
    assert_eq!(current_prediction_week(at("2024-10-20 00:00")), date("2024-10-26"));
    assert_eq!(current_prediction_week(at("2024-10-25 15:00")), date("2024-10-26"));
}

/// Pretends fixtures exist only on the listed dates and records each probe.
struct Calendar {
    fixture_days: Vec<NaiveDate>,
    probed: RefCell<Vec<NaiveDate>>,
}

impl Calendar {
    fn new(days: &[&str]) -> Self {
        Self {
            fixture_days: days.iter().map(|d| date(d)).collect(),
            probed: RefCell::new(Vec::new()),
        }
    }
}

impl FixtureProbe for Calendar {
    fn qualifying_fixtures(&self, date: NaiveDate) -> usize {
        self.probed.borrow_mut().push(date);
        usize::from(self.fixture_days.contains(&date))
    }
}

#[test]
fn international_break_moves_to_next_fixture_day() {
    let calendar = Calendar::new(&["2024-10-15", "2024-10-26"]);
    let found = find_next_fixture_date(
        &calendar,
        date("2024-10-19"),
        date("2024-10-16"),
        DEFAULT_FALLBACK_WINDOW_DAYS,
    );
    assert_eq!(found, Some(date("2024-10-26")));
    assert_eq!(calendar.probed.borrow().len(), 8);
}

#[test]
fn nothing_in_window_is_none() {
    let calendar = Calendar::new(&["2024-11-30"]);
    let found = find_next_fixture_date(&calendar, date("2024-10-19"), date("2024-10-16"), 14);
    assert_eq!(found, None);
    assert_eq!(calendar.probed.borrow().len(), 15);
}

#[test]
fn dates_long_past_are_not_probed() {
    let calendar = Calendar::new(&["2024-10-05"]);
    let found = find_next_fixture_date(&calendar, date("2024-10-05"), date("2024-10-16"), 3);
    assert_eq!(found, None);
    assert!(calendar.probed.borrow().is_empty());
}
