use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache_store::{CacheKey, CacheStore, lock_ignoring_poison};
use crate::clock::iso_timestamp;
use crate::error::SelectionError;
use crate::match_record::{League, MatchIdentity, MatchRecord, NameIdentity};
use crate::prediction_week::current_prediction_week;

/// The fixed panel, in display order.
pub const SELECTORS: [&str; 8] = [
    "Glynny",
    "Eamonn Bone",
    "Mickey D",
    "Rob Carney",
    "Steve H",
    "Danny",
    "Eddie Lee",
    "Fran Radar",
];

pub const OVERRIDE_CONFIRMATION: &str =
    "I confirm that I want to proceed with fewer than 8 selections";
pub const DEFAULT_CONFIDENCE: u8 = 5;
pub const MIN_CONFIDENCE: u8 = 1;
pub const MAX_CONFIDENCE: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Prediction {
    Home,
    Away,
    Draw,
    BttsYes,
    BttsNo,
    Tbd,
}

impl Prediction {
    pub const ALL: [Prediction; 6] = [
        Prediction::Home,
        Prediction::Away,
        Prediction::Draw,
        Prediction::BttsYes,
        Prediction::BttsNo,
        Prediction::Tbd,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Prediction::Home => "HOME",
            Prediction::Away => "AWAY",
            Prediction::Draw => "DRAW",
            Prediction::BttsYes => "BTTS_YES",
            Prediction::BttsNo => "BTTS_NO",
            Prediction::Tbd => "TBD",
        }
    }

    pub fn parse(raw: &str) -> Option<Prediction> {
        let wanted = raw.trim();
        Prediction::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
    }
}

/// One selector's pick for the week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySelection {
    pub home_team: String,
    pub away_team: String,
    pub prediction: Prediction,
    pub confidence: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub league: Option<League>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

pub type SelectionMap = BTreeMap<String, WeeklySelection>;

/// A week's selections plus whether the short-panel override was confirmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekSelections {
    pub selections: SelectionMap,
    pub override_confirmed_at: Option<String>,
}

pub fn is_selector(name: &str) -> bool {
    SELECTORS.contains(&name)
}

pub fn validate_selection(
    selector: &str,
    selection: &WeeklySelection,
) -> Result<(), SelectionError> {
    if !is_selector(selector) {
        return Err(SelectionError::UnknownSelector(selector.to_string()));
    }
    if selection.home_team.trim().is_empty() {
        return Err(SelectionError::MissingField {
            selector: selector.to_string(),
            field: "home_team",
        });
    }
    if selection.away_team.trim().is_empty() {
        return Err(SelectionError::MissingField {
            selector: selector.to_string(),
            field: "away_team",
        });
    }
    if !(MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&selection.confidence) {
        return Err(SelectionError::InvalidConfidence {
            selector: selector.to_string(),
            confidence: selection.confidence,
        });
    }
    Ok(())
}

pub fn validate_selection_map(selections: &SelectionMap) -> Result<(), SelectionError> {
    selections
        .iter()
        .try_for_each(|(selector, selection)| validate_selection(selector, selection))
}

/// Where assignment looks for match details once the cache has nothing.
pub trait FixtureSource: Send + Sync {
    fn fixtures_for(&self, date: NaiveDate) -> Vec<MatchRecord>;
}

/// CRUD over the current prediction week's selector → match map.
pub struct SelectionManager {
    store: Arc<CacheStore>,
    fixtures: Arc<dyn FixtureSource>,
    identity: Arc<dyn MatchIdentity>,
    edit_lock: Mutex<()>,
}

impl SelectionManager {
    pub fn new(store: Arc<CacheStore>, fixtures: Arc<dyn FixtureSource>) -> Self {
        Self {
            store,
            fixtures,
            identity: Arc::new(NameIdentity),
            edit_lock: Mutex::new(()),
        }
    }

    pub fn current_week(&self) -> NaiveDate {
        current_prediction_week(self.store.now())
    }

    pub fn load(&self) -> SelectionMap {
        self.load_for(self.current_week())
    }

    pub fn load_for(&self, week: NaiveDate) -> SelectionMap {
        self.store.load_selections(week).unwrap_or_default()
    }

    pub fn save(&self, selections: &SelectionMap) -> bool {
        self.store.save_selections(self.current_week(), selections)
    }

    /// Gives `selector` the match `match_id`, replacing whatever they had.
    pub fn assign(
        &self,
        selector: &str,
        match_id: &str,
    ) -> Result<WeeklySelection, SelectionError> {
        if !is_selector(selector) {
            return Err(SelectionError::UnknownSelector(selector.to_string()));
        }
        let _edit = lock_ignoring_poison(&self.edit_lock);
        let week = self.current_week();
        let mut selections = self.load_for(week);
        selections.remove(selector);

        if let Some((owner, _)) = selections
            .iter()
            .find(|(_, selection)| self.selection_id(selection) == match_id)
        {
            return Err(SelectionError::MatchAlreadyAssigned {
                match_id: match_id.to_string(),
                selector: owner.clone(),
            });
        }

        let record = self
            .find_match(week, match_id)
            .ok_or_else(|| SelectionError::MatchNotFound(match_id.to_string()))?;
        let selection = WeeklySelection {
            home_team: record.home_team.clone(),
            away_team: record.away_team.clone(),
            prediction: Prediction::Tbd,
            confidence: DEFAULT_CONFIDENCE,
            assigned_at: Some(iso_timestamp(self.store.now())),
            league: Some(record.league),
            id: Some(match_id.to_string()),
        };
        selections.insert(selector.to_string(), selection.clone());
        if !self.store.save_selections(week, &selections) {
            return Err(SelectionError::Storage(week.to_string()));
        }
        info!(selector, match_id, week = %week, "assigned match");
        Ok(selection)
    }

    pub fn unassign(&self, selector: &str) -> Result<WeeklySelection, SelectionError> {
        if !is_selector(selector) {
            return Err(SelectionError::UnknownSelector(selector.to_string()));
        }
        let _edit = lock_ignoring_poison(&self.edit_lock);
        let week = self.current_week();
        let mut selections = self.load_for(week);
        let removed = selections
            .remove(selector)
            .ok_or_else(|| SelectionError::NoAssignment(selector.to_string()))?;
        if !self.store.save_selections(week, &selections) {
            return Err(SelectionError::Storage(week.to_string()));
        }
        info!(selector, week = %week, "unassigned match");
        Ok(removed)
    }

    pub fn update_prediction(
        &self,
        selector: &str,
        prediction: &str,
        confidence: u8,
    ) -> Result<WeeklySelection, SelectionError> {
        let _edit = lock_ignoring_poison(&self.edit_lock);
        let week = self.current_week();
        let mut selections = self.load_for(week);
        let parsed = Prediction::parse(prediction).ok_or_else(|| SelectionError::InvalidPrediction {
            selector: selector.to_string(),
            prediction: prediction.to_string(),
        })?;
        let entry = selections
            .get_mut(selector)
            .ok_or_else(|| SelectionError::NoAssignment(selector.to_string()))?;
        let mut updated = entry.clone();
        updated.prediction = parsed;
        updated.confidence = confidence;
        validate_selection(selector, &updated)?;
        *entry = updated.clone();
        if !self.store.save_selections(week, &selections) {
            return Err(SelectionError::Storage(week.to_string()));
        }
        Ok(updated)
    }

    /// Lets the week proceed with fewer than eight picks. The phrase must
    /// match exactly.
    pub fn confirm_override(&self, phrase: &str) -> Result<(), SelectionError> {
        if phrase != OVERRIDE_CONFIRMATION {
            warn!("override attempted with wrong confirmation phrase");
            return Err(SelectionError::ConfirmationMismatch);
        }
        let _edit = lock_ignoring_poison(&self.edit_lock);
        let week = self.current_week();
        let confirmed_at = iso_timestamp(self.store.now());
        let mut count = 0;
        let saved = self.store.update_week(week, |mut state| {
            state.override_confirmed_at = Some(confirmed_at);
            count = state.selections.len();
            state
        });
        if !saved {
            return Err(SelectionError::Storage(week.to_string()));
        }
        info!(week = %week, count, "short panel override confirmed");
        Ok(())
    }

    /// True once every selector has a pick or the override was confirmed.
    pub fn is_ready(&self) -> bool {
        let week = self.current_week();
        let Some(state) = self.store.load_week(week) else {
            return false;
        };
        state.override_confirmed_at.is_some()
            || SELECTORS
                .iter()
                .all(|selector| state.selections.contains_key(*selector))
    }

    pub fn unassigned_selectors(&self) -> Vec<&'static str> {
        let selections = self.load();
        SELECTORS
            .into_iter()
            .filter(|selector| !selections.contains_key(*selector))
            .collect()
    }

    /// 3pm fixtures for the week that nobody has picked yet, with their ids.
    pub fn available_matches(&self) -> Vec<(String, MatchRecord)> {
        let week = self.current_week();
        let selections = self.load_for(week);
        let taken: Vec<String> = selections
            .values()
            .map(|selection| self.selection_id(selection))
            .collect();
        self.week_fixtures(week)
            .into_iter()
            .map(|record| (self.identity.record_id(&record), record))
            .filter(|(id, _)| !taken.contains(id))
            .collect()
    }

    pub fn find_match(&self, week: NaiveDate, match_id: &str) -> Option<MatchRecord> {
        let cached = [CacheKey::fixtures(week), CacheKey::all_leagues(week)]
            .iter()
            .filter_map(|key| self.store.get(key))
            .flatten()
            .find(|record| self.identity.record_id(record) == match_id);
        if cached.is_some() {
            return cached;
        }
        self.fixtures
            .fixtures_for(week)
            .into_iter()
            .find(|record| self.identity.record_id(record) == match_id)
    }

    fn week_fixtures(&self, week: NaiveDate) -> Vec<MatchRecord> {
        if let Some(records) = self.store.get(&CacheKey::fixtures(week)) {
            return records;
        }
        self.fixtures.fixtures_for(week)
    }

    fn selection_id(&self, selection: &WeeklySelection) -> String {
        selection.id.clone().unwrap_or_else(|| {
            self.identity
                .match_id(selection.league, &selection.home_team, &selection.away_team)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(confidence: u8) -> WeeklySelection {
        WeeklySelection {
            home_team: "Arsenal".to_string(),
            away_team: "Chelsea".to_string(),
            prediction: Prediction::BttsYes,
            confidence,
            assigned_at: None,
            league: Some(League::PremierLeague),
            id: None,
        }
    }

    #[test]
    fn prediction_wire_values() {
        let raw = serde_json::to_string(&Prediction::BttsNo).expect("serialize");
        assert_eq!(raw, "\"BTTS_NO\"");
        assert_eq!(Prediction::parse("tbd"), Some(Prediction::Tbd));
        assert_eq!(Prediction::parse("WIN"), None);
    }

    #[test]
    fn confidence_bounds() {
        assert!(validate_selection("Danny", &selection(1)).is_ok());
        assert!(validate_selection("Danny", &selection(10)).is_ok());
        assert_eq!(
            validate_selection("Danny", &selection(0)),
            Err(SelectionError::InvalidConfidence {
                selector: "Danny".to_string(),
                confidence: 0
            })
        );
        assert!(validate_selection("Danny", &selection(11)).is_err());
    }

    #[test]
    fn unknown_selector_and_blank_team_rejected() {
        assert_eq!(
            validate_selection("Nobody", &selection(5)),
            Err(SelectionError::UnknownSelector("Nobody".to_string()))
        );
        let mut blank = selection(5);
        blank.away_team = " ".to_string();
        assert!(matches!(
            validate_selection("Glynny", &blank),
            Err(SelectionError::MissingField { field: "away_team", .. })
        ));
    }

    #[test]
    fn optional_fields_are_omitted_on_disk() {
        let value = serde_json::to_value(selection(5)).expect("serialize");
        assert!(value.get("id").is_none());
        assert_eq!(value["prediction"], "BTTS_YES");
        assert_eq!(value["league"], "Premier League");
    }
}
