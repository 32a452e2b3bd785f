use serde::Serialize;

use crate::match_record::{DEFAULT_MATCH_TIME, League, MatchIdentity, MatchRecord, MatchStatus};
use crate::selections::{Prediction, SELECTORS, SelectionMap};

pub const NO_SELECTION_TEXT: &str = "No selection made";

/// Per-slot status; adds `no_selection` to the match statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    NotStarted,
    Live,
    Halftime,
    FirstHalf,
    Finished,
    NoSelection,
}

impl From<MatchStatus> for SlotStatus {
    fn from(status: MatchStatus) -> Self {
        match status {
            MatchStatus::NotStarted => SlotStatus::NotStarted,
            MatchStatus::Live => SlotStatus::Live,
            MatchStatus::Halftime => SlotStatus::Halftime,
            MatchStatus::FirstHalf => SlotStatus::FirstHalf,
            MatchStatus::Finished => SlotStatus::Finished,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectorStatus {
    pub selector: String,
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub league: Option<League>,
    pub prediction: Option<Prediction>,
    pub confidence: Option<u8>,
    pub home_score: u32,
    pub away_score: u32,
    pub status: SlotStatus,
    pub match_time: String,
    pub btts_detected: bool,
    pub placeholder: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder_text: Option<String>,
}

impl SelectorStatus {
    fn placeholder(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            home_team: None,
            away_team: None,
            league: None,
            prediction: None,
            confidence: None,
            home_score: 0,
            away_score: 0,
            status: SlotStatus::NoSelection,
            match_time: String::new(),
            btts_detected: false,
            placeholder: true,
            placeholder_text: Some(NO_SELECTION_TEXT.to_string()),
        }
    }

    pub fn is_assigned(&self) -> bool {
        !self.placeholder
    }
}

/// One row per panel member, in panel order. Assigned matches are looked up
/// in `live` by exact team names; unmatched ones read as not started 0-0.
pub fn selector_statuses(
    selections: &SelectionMap,
    live: &[MatchRecord],
    identity: &dyn MatchIdentity,
) -> Vec<SelectorStatus> {
    SELECTORS
        .iter()
        .map(|selector| {
            let Some(selection) = selections.get(*selector) else {
                return SelectorStatus::placeholder(selector);
            };
            let found = live.iter().find(|record| {
                identity.same_fixture(&selection.home_team, &selection.away_team, record)
            });
            let (home_score, away_score, status, match_time) = match found {
                Some(record) => (
                    record.home_score,
                    record.away_score,
                    record.status,
                    record.match_time.clone(),
                ),
                None => (0, 0, MatchStatus::NotStarted, DEFAULT_MATCH_TIME.to_string()),
            };
            SelectorStatus {
                selector: selector.to_string(),
                home_team: Some(selection.home_team.clone()),
                away_team: Some(selection.away_team.clone()),
                league: selection.league.or(found.map(|record| record.league)),
                prediction: Some(selection.prediction),
                confidence: Some(selection.confidence),
                home_score,
                away_score,
                status: status.into(),
                match_time,
                btts_detected: home_score > 0 && away_score > 0,
                placeholder: false,
                placeholder_text: None,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccumulatorStatus {
    Failed,
    CompleteSuccess,
    PartialSuccess,
    InProgress,
    NotStarted,
}

/// Checked in this order: any failure, all succeeded, some succeeded,
/// some still pending, otherwise not started. An empty slate is not started.
pub fn accumulator_status(
    success: usize,
    pending: usize,
    failed: usize,
    total: usize,
) -> AccumulatorStatus {
    if failed > 0 {
        AccumulatorStatus::Failed
    } else if total > 0 && success == total {
        AccumulatorStatus::CompleteSuccess
    } else if success > 0 {
        AccumulatorStatus::PartialSuccess
    } else if pending > 0 {
        AccumulatorStatus::InProgress
    } else {
        AccumulatorStatus::NotStarted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BttsSummary {
    pub selectors: Vec<SelectorStatus>,
    pub total_matches: usize,
    pub btts_success: usize,
    pub btts_pending: usize,
    pub btts_failed: usize,
    pub accumulator_status: AccumulatorStatus,
}

/// Accumulator view over assigned slots only: BTTS is a success, a finished
/// match without it is a failure, anything else is pending.
pub fn btts_summary(
    selections: &SelectionMap,
    live: &[MatchRecord],
    identity: &dyn MatchIdentity,
) -> BttsSummary {
    let selectors = selector_statuses(selections, live, identity);
    let tracked: Vec<&SelectorStatus> = selectors.iter().filter(|s| s.is_assigned()).collect();
    let success = tracked.iter().filter(|s| s.btts_detected).count();
    let failed = tracked
        .iter()
        .filter(|s| !s.btts_detected && s.status == SlotStatus::Finished)
        .count();
    let pending = tracked.len() - success - failed;
    BttsSummary {
        accumulator_status: accumulator_status(success, pending, failed, tracked.len()),
        total_matches: tracked.len(),
        btts_success: success,
        btts_pending: pending,
        btts_failed: failed,
        selectors,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoardStatus {
    Active,
    NoSelections,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardStatistics {
    pub total_matches_tracked: usize,
    pub btts_detected: usize,
    pub btts_pending: usize,
    pub btts_failed: usize,
    pub completion_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusBoard {
    pub status: BoardStatus,
    pub matches: Vec<SelectorStatus>,
    pub statistics: BoardStatistics,
}

/// Status page payload: every slot plus headline counts.
pub fn status_board(
    selections: &SelectionMap,
    live: &[MatchRecord],
    identity: &dyn MatchIdentity,
) -> StatusBoard {
    let matches = selector_statuses(selections, live, identity);
    let total = matches.len();
    let detected = matches.iter().filter(|m| m.btts_detected).count();
    let pending = matches
        .iter()
        .filter(|m| {
            !m.btts_detected
                && matches!(
                    m.status,
                    SlotStatus::NotStarted
                        | SlotStatus::Live
                        | SlotStatus::Halftime
                        | SlotStatus::FirstHalf
                        | SlotStatus::NoSelection
                )
        })
        .count();
    let failed = total - detected - pending;
    let completion_percentage = if total > 0 {
        ((detected + failed) as f64 / total as f64 * 1000.0).round() / 10.0
    } else {
        0.0
    };
    StatusBoard {
        status: if selections.is_empty() {
            BoardStatus::NoSelections
        } else {
            BoardStatus::Active
        },
        matches,
        statistics: BoardStatistics {
            total_matches_tracked: total,
            btts_detected: detected,
            btts_pending: pending,
            btts_failed: failed,
            completion_percentage,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_precedence() {
        assert_eq!(accumulator_status(3, 2, 1, 6), AccumulatorStatus::Failed);
        assert_eq!(accumulator_status(2, 0, 0, 2), AccumulatorStatus::CompleteSuccess);
        assert_eq!(accumulator_status(1, 1, 0, 2), AccumulatorStatus::PartialSuccess);
        assert_eq!(accumulator_status(0, 2, 0, 2), AccumulatorStatus::InProgress);
        assert_eq!(accumulator_status(0, 0, 0, 0), AccumulatorStatus::NotStarted);
    }

    #[test]
    fn slot_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(SlotStatus::NoSelection).expect("serialize"),
            "no_selection"
        );
        assert_eq!(
            serde_json::to_value(AccumulatorStatus::CompleteSuccess).expect("serialize"),
            "COMPLETE_SUCCESS"
        );
    }
}
