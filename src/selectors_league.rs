use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::cache_store::CacheStore;
use crate::clock::iso_timestamp;
use crate::live_results::{LiveResult, LiveResultsLog};
use crate::match_record::MatchStatus;
use crate::prediction_week::format_week;
use crate::selections::SELECTORS;

pub const BTTS_SUCCESS_POINTS: i32 = 3;
pub const SINGLE_GOAL_POINTS: i32 = 0;
pub const NO_GOAL_POINTS: i32 = -3;
pub const RECENT_FORM_LEN: usize = 10;
pub const RECENT_WEEKS: i64 = 10;

/// Points carried over from before results were tracked here.
pub const HISTORICAL_POINTS: [(&str, i32); 8] = [
    ("Eamonn Bone", 27),
    ("Fran Radar", 21),
    ("Glynny", 21),
    ("Mickey D", 21),
    ("Rob Carney", 21),
    ("Steve H", 18),
    ("Danny", 18),
    ("Eddie Lee", 6),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewFilter {
    #[default]
    Overall,
    ThisSeason,
    Recent,
}

impl ViewFilter {
    pub fn parse(raw: &str) -> ViewFilter {
        match raw.trim() {
            "this-season" => ViewFilter::ThisSeason,
            "recent" => ViewFilter::Recent,
            _ => ViewFilter::Overall,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormEntry {
    pub week: String,
    pub match_home: String,
    pub match_away: String,
    pub points: i32,
    pub result_description: &'static str,
    pub final_score: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectorPerformance {
    pub selector_name: String,
    pub total_points: i32,
    pub total_matches: usize,
    pub btts_successes: usize,
    pub single_goal_results: usize,
    pub no_goal_results: usize,
    pub btts_percentage: f64,
    pub recent_form: Vec<FormEntry>,
    pub recent_points: i32,
    pub recent_average: f64,
    pub average_weekly_points: f64,
    pub weekly_points: BTreeMap<String, i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leader {
    pub selector: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct SeasonStats {
    pub total_weeks: usize,
    pub average_btts_rate: f64,
    pub active_selectors: usize,
    pub best_btts: Option<Leader>,
    pub most_active: Option<Leader>,
    pub most_points: Option<Leader>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyStats {
    pub week: String,
    pub most_points: Option<Leader>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeagueTable {
    pub selectors: Vec<SelectorPerformance>,
    pub weekly_stats: WeeklyStats,
    pub season_stats: SeasonStats,
    pub from_history: bool,
    pub last_updated: String,
    pub current_week: u32,
    pub season_year: i32,
}

/// Points for a settled score plus its label.
pub fn match_points(home_score: u32, away_score: u32) -> (i32, &'static str) {
    match (home_score > 0, away_score > 0) {
        (true, true) => (BTTS_SUCCESS_POINTS, "BTTS"),
        (false, false) => (NO_GOAL_POINTS, "No Goals"),
        _ => (SINGLE_GOAL_POINTS, "Single Goal"),
    }
}

/// Season standings built from every stored week and the live results log.
pub struct SelectorsLeague {
    store: Arc<CacheStore>,
    results: LiveResultsLog,
}

impl SelectorsLeague {
    pub fn new(store: Arc<CacheStore>) -> Self {
        let results = LiveResultsLog::new(Arc::clone(&store));
        Self { store, results }
    }

    pub fn calculate(&self, filter: ViewFilter) -> LeagueTable {
        let now = self.store.now();
        let today = now.date();
        let weeks = self.store.list_weeks();
        let results: Vec<LiveResult> = self
            .results
            .load()
            .unwrap_or_default()
            .into_iter()
            .filter(|result| result.status == MatchStatus::Finished)
            .collect();

        let mut performance: Vec<SelectorPerformance> = SELECTORS
            .iter()
            .map(|selector| self.selector_performance(selector, &weeks, &results))
            .collect();
        let from_history = performance.iter().all(|p| p.total_matches == 0);
        if from_history {
            debug!("no settled selections yet, using historical points");
            performance = historical_performance();
        }
        performance.sort_by(|a, b| {
            b.total_points
                .cmp(&a.total_points)
                .then_with(|| a.selector_name.cmp(&b.selector_name))
        });

        let season_stats = season_stats(&performance, weeks.len());
        let this_week = format_week(weeks.last().copied().unwrap_or(today));
        let weekly_stats = WeeklyStats {
            most_points: performance
                .iter()
                .filter_map(|p| p.weekly_points.get(&this_week).map(|pts| (p, *pts)))
                .max_by_key(|(_, pts)| *pts)
                .map(|(p, pts)| Leader {
                    selector: p.selector_name.clone(),
                    value: f64::from(pts),
                }),
            week: this_week,
        };

        LeagueTable {
            selectors: apply_filter(performance, filter, today),
            weekly_stats,
            season_stats,
            from_history,
            last_updated: iso_timestamp(now),
            current_week: today.iso_week().week(),
            season_year: today.year(),
        }
    }

    fn selector_performance(
        &self,
        selector: &str,
        weeks: &[NaiveDate],
        results: &[LiveResult],
    ) -> SelectorPerformance {
        let mut form = Vec::new();
        let mut weekly_points = BTreeMap::new();
        for week in weeks {
            let Some(selections) = self.store.load_selections(*week) else {
                continue;
            };
            let Some(selection) = selections.get(selector) else {
                continue;
            };
            let Some(result) = results
                .iter()
                .find(|r| r.involves(&selection.home_team, &selection.away_team))
            else {
                continue;
            };
            let (points, label) = match_points(result.home_score, result.away_score);
            let week_key = format_week(*week);
            weekly_points.insert(week_key.clone(), points);
            form.push(FormEntry {
                week: week_key,
                match_home: selection.home_team.clone(),
                match_away: selection.away_team.clone(),
                points,
                result_description: label,
                final_score: format!("{}-{}", result.home_score, result.away_score),
            });
        }
        performance_from_form(selector, form, weekly_points)
    }
}

fn performance_from_form(
    selector: &str,
    form: Vec<FormEntry>,
    weekly_points: BTreeMap<String, i32>,
) -> SelectorPerformance {
    let total_matches = form.len();
    let total_points: i32 = form.iter().map(|f| f.points).sum();
    let count = |pts: i32| form.iter().filter(|f| f.points == pts).count();
    let btts_successes = count(BTTS_SUCCESS_POINTS);
    let recent = &form[form.len().saturating_sub(RECENT_FORM_LEN)..];
    let recent_points: i32 = recent.iter().map(|f| f.points).sum();
    SelectorPerformance {
        selector_name: selector.to_string(),
        total_points,
        total_matches,
        btts_successes,
        single_goal_results: count(SINGLE_GOAL_POINTS),
        no_goal_results: count(NO_GOAL_POINTS),
        btts_percentage: percentage(btts_successes, total_matches),
        recent_points,
        recent_average: average(recent_points, recent.len()),
        average_weekly_points: average(total_points, weekly_points.len()),
        recent_form: form,
        weekly_points,
    }
}

/// Seed table from the carried-over points, estimating one match per three
/// points.
fn historical_performance() -> Vec<SelectorPerformance> {
    HISTORICAL_POINTS
        .iter()
        .map(|(selector, points)| {
            let points = *points;
            let matches = usize::try_from((points.abs() / 3).max(1)).unwrap_or(1);
            let btts = usize::try_from((points / 3).max(0)).unwrap_or(0);
            let no_goal = usize::try_from((-points.min(0)) / 3).unwrap_or(0);
            SelectorPerformance {
                selector_name: selector.to_string(),
                total_points: points,
                total_matches: matches,
                btts_successes: btts,
                single_goal_results: matches.saturating_sub(btts + no_goal),
                no_goal_results: no_goal,
                btts_percentage: percentage(btts, matches),
                recent_form: Vec::new(),
                recent_points: points,
                recent_average: 0.0,
                average_weekly_points: average(points, matches),
                weekly_points: BTreeMap::new(),
            }
        })
        .collect()
}

fn season_stats(performance: &[SelectorPerformance], total_weeks: usize) -> SeasonStats {
    let active: Vec<&SelectorPerformance> =
        performance.iter().filter(|p| p.total_matches > 0).collect();
    if active.is_empty() {
        return SeasonStats {
            total_weeks,
            ..SeasonStats::default()
        };
    }
    let leader = |value: fn(&SelectorPerformance) -> f64| {
        active
            .iter()
            .max_by(|a, b| value(a).total_cmp(&value(b)))
            .map(|p| Leader {
                selector: p.selector_name.clone(),
                value: value(p),
            })
    };
    SeasonStats {
        total_weeks,
        average_btts_rate: active.iter().map(|p| p.btts_percentage).sum::<f64>()
            / active.len() as f64,
        active_selectors: active.len(),
        best_btts: leader(|p| p.btts_percentage),
        most_active: leader(|p| p.total_matches as f64),
        most_points: leader(|p| f64::from(p.total_points)),
    }
}

fn apply_filter(
    performance: Vec<SelectorPerformance>,
    filter: ViewFilter,
    today: NaiveDate,
) -> Vec<SelectorPerformance> {
    match filter {
        ViewFilter::Overall => performance,
        ViewFilter::ThisSeason => performance
            .into_iter()
            .filter(|p| p.total_matches > 0)
            .collect(),
        ViewFilter::Recent => {
            let cutoff = format_week(today - Duration::weeks(RECENT_WEEKS));
            performance
                .into_iter()
                .filter(|p| p.recent_form.iter().any(|f| f.week >= cutoff))
                .collect()
        }
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn average(total: i32, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        f64::from(total) / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_table() {
        assert_eq!(match_points(2, 1).0, BTTS_SUCCESS_POINTS);
        assert_eq!(match_points(1, 0).0, SINGLE_GOAL_POINTS);
        assert_eq!(match_points(0, 3).0, SINGLE_GOAL_POINTS);
        assert_eq!(match_points(0, 0).0, NO_GOAL_POINTS);
    }

    #[test]
    fn historical_seed_estimates_matches() {
        let seeded = historical_performance();
        let eamonn = seeded
            .iter()
            .find(|p| p.selector_name == "Eamonn Bone")
            .expect("seeded");
        assert_eq!(eamonn.total_points, 27);
        assert_eq!(eamonn.total_matches, 9);
        assert_eq!(eamonn.btts_successes, 9);
        let eddie = seeded
            .iter()
            .find(|p| p.selector_name == "Eddie Lee")
            .expect("seeded");
        assert_eq!(eddie.total_matches, 2);
    }

    #[test]
    fn view_filter_parse_defaults_to_overall() {
        assert_eq!(ViewFilter::parse("recent"), ViewFilter::Recent);
        assert_eq!(ViewFilter::parse("this-season"), ViewFilter::ThisSeason);
        assert_eq!(ViewFilter::parse("anything"), ViewFilter::Overall);
    }
}
