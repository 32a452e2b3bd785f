mod common;

use std::sync::Arc;

use chrono::NaiveDate;

use acca_tracker::cache_store::{CacheSettings, CacheStore};
use acca_tracker::error::SelectionError;
use acca_tracker::match_record::{League, MatchRecord};
use acca_tracker::selections::{
    FixtureSource, OVERRIDE_CONFIRMATION, Prediction, SELECTORS, SelectionManager, SelectionMap,
    WeekSelections, WeeklySelection,
};

use common::{date, store_at};

struct Saturday(Vec<MatchRecord>);

impl FixtureSource for Saturday {
    fn fixtures_for(&self, _date: NaiveDate) -> Vec<MatchRecord> {
        self.0.clone()
    }
}

fn saturday_fixtures() -> Vec<MatchRecord> {
    vec![
        MatchRecord::fixture(League::PremierLeague, "Arsenal", "Chelsea", "15:00"),
        MatchRecord::fixture(League::LeagueOne, "Wigan Athletic", "Bolton Wanderers", "15:00"),
        MatchRecord::fixture(League::ScottishPremiership, "Hearts", "Hibernian", "15:00"),
    ]
}

const ARSENAL: &str = "Premier League_Arsenal_Chelsea";
const WIGAN: &str = "League One_Wigan Athletic_Bolton Wanderers";

fn manager(label: &str, settings: CacheSettings) -> (SelectionManager, Arc<CacheStore>) {
    // Wednesday, so the prediction week is Saturday 2024-10-19.
    let (store, _clock) = store_at(label, "2024-10-16 12:00", settings);
    let source = Arc::new(Saturday(saturday_fixtures()));
    (SelectionManager::new(Arc::clone(&store), source), store)
}

#[test]
fn assign_records_match_details() {
    let (manager, _store) = manager("assign", CacheSettings::default());
    assert_eq!(manager.current_week(), date("2024-10-19"));

    let selection = manager.assign("Glynny", ARSENAL).expect("assign");
    assert_eq!(selection.home_team, "Arsenal");
    assert_eq!(selection.away_team, "Chelsea");
    assert_eq!(selection.prediction, Prediction::Tbd);
    assert_eq!(selection.confidence, 5);
    assert_eq!(selection.league, Some(League::PremierLeague));
    assert_eq!(selection.id.as_deref(), Some(ARSENAL));
    assert_eq!(manager.load().get("Glynny"), Some(&selection));
}

#[test]
fn a_match_belongs_to_one_selector() {
    let (manager, _store) = manager("exclusive", CacheSettings::default());
    manager.assign("Glynny", ARSENAL).expect("assign");
    let err = manager.assign("Danny", ARSENAL).expect_err("already taken");
    assert_eq!(
        err,
        SelectionError::MatchAlreadyAssigned {
            match_id: ARSENAL.to_string(),
            selector: "Glynny".to_string(),
        }
    );
    assert!(!manager.load().contains_key("Danny"));
}

#[test]
fn reassigning_replaces_previous_pick() {
    let (manager, _store) = manager("reassign", CacheSettings::default());
    manager.assign("Glynny", ARSENAL).expect("assign");
    manager.assign("Glynny", WIGAN).expect("reassign");

    let selections = manager.load();
    assert_eq!(selections.len(), 1);
    assert_eq!(selections["Glynny"].home_team, "Wigan Athletic");
    manager.assign("Danny", ARSENAL).expect("freed up");
}

#[test]
fn failed_reassignment_keeps_existing_pick() {
    let (manager, _store) = manager("keep", CacheSettings::default());
    manager.assign("Glynny", ARSENAL).expect("assign");
    manager.assign("Danny", WIGAN).expect("assign");
    assert!(manager.assign("Glynny", WIGAN).is_err());
    assert_eq!(manager.load()["Glynny"].home_team, "Arsenal");
}

#[test]
fn unknown_selectors_and_matches_are_rejected() {
    let (manager, _store) = manager("unknown", CacheSettings::default());
    assert_eq!(
        manager.assign("Somebody Else", ARSENAL),
        Err(SelectionError::UnknownSelector("Somebody Else".to_string()))
    );
    assert_eq!(
        manager.assign("Glynny", "Premier League_Spurs_Everton"),
        Err(SelectionError::MatchNotFound("Premier League_Spurs_Everton".to_string()))
    );
}

#[test]
fn unassign_frees_the_match() {
    let (manager, _store) = manager("unassign", CacheSettings::default());
    manager.assign("Steve H", ARSENAL).expect("assign");
    let removed = manager.unassign("Steve H").expect("unassign");
    assert_eq!(removed.home_team, "Arsenal");
    assert!(manager.load().is_empty());
    assert_eq!(
        manager.unassign("Steve H"),
        Err(SelectionError::NoAssignment("Steve H".to_string()))
    );
    let available: Vec<String> = manager
        .available_matches()
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert!(available.contains(&ARSENAL.to_string()));
}

#[test]
fn available_matches_exclude_assigned_ones() {
    let (manager, _store) = manager("available", CacheSettings::default());
    manager.assign("Mickey D", WIGAN).expect("assign");
    let ids: Vec<String> = manager
        .available_matches()
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(!ids.contains(&WIGAN.to_string()));
}

#[test]
fn predictions_and_confidence_are_validated() {
    let (manager, _store) = manager("predict", CacheSettings::default());
    manager.assign("Fran Radar", ARSENAL).expect("assign");

    let updated = manager
        .update_prediction("Fran Radar", "btts_yes", 8)
        .expect("valid update");
    assert_eq!(updated.prediction, Prediction::BttsYes);
    assert_eq!(updated.confidence, 8);

    assert!(matches!(
        manager.update_prediction("Fran Radar", "maybe", 8),
        Err(SelectionError::InvalidPrediction { .. })
    ));
    assert!(matches!(
        manager.update_prediction("Fran Radar", "HOME", 11),
        Err(SelectionError::InvalidConfidence { confidence: 11, .. })
    ));
    assert_eq!(manager.load()["Fran Radar"].confidence, 8);
}

#[test]
fn override_needs_exact_phrase() {
    let (manager, store) = manager("override", CacheSettings::default());
    manager.assign("Eddie Lee", ARSENAL).expect("assign");
    assert!(!manager.is_ready());
    assert_eq!(manager.unassigned_selectors().len(), SELECTORS.len() - 1);

    assert_eq!(
        manager.confirm_override("i confirm"),
        Err(SelectionError::ConfirmationMismatch)
    );
    assert!(!manager.is_ready());

    manager.confirm_override(OVERRIDE_CONFIRMATION).expect("exact phrase");
    assert!(manager.is_ready());

    // A later edit keeps the confirmation.
    manager.assign("Danny", WIGAN).expect("assign");
    let week = store.load_week(date("2024-10-19")).expect("week saved");
    assert!(week.override_confirmed_at.is_some());
}

#[test]
fn full_panel_is_ready_without_override() {
    let (manager, store) = manager("ready", CacheSettings::default());
    let selections: SelectionMap = SELECTORS
        .iter()
        .enumerate()
        .map(|(i, selector)| {
            (
                selector.to_string(),
                WeeklySelection {
                    home_team: format!("Home {i}"),
                    away_team: format!("Away {i}"),
                    prediction: Prediction::BttsYes,
                    confidence: 5,
                    assigned_at: None,
                    league: Some(League::LeagueTwo),
                    id: None,
                },
            )
        })
        .collect();
    assert!(manager.save(&selections));
    assert!(manager.is_ready());
    assert!(manager.unassigned_selectors().is_empty());
    assert_eq!(store.list_weeks(), vec![date("2024-10-19")]);
}

#[test]
fn selections_round_trip_through_disk() {
    for (label, threshold) in [("plain", usize::MAX), ("compressed", 16)] {
        let settings = CacheSettings {
            compression_threshold: threshold,
            ..CacheSettings::default()
        };
        let (manager, store) = manager(label, settings);
        manager.assign("Rob Carney", ARSENAL).expect("assign");
        manager
            .update_prediction("Rob Carney", "DRAW", 3)
            .expect("update");
        let saved = manager.load();

        let reopened = CacheStore::open(
            store.paths().base.clone(),
            Arc::clone(store.clock()),
            settings,
        );
        let week = reopened
            .load_week(date("2024-10-19"))
            .expect("week on disk");
        assert_eq!(
            week,
            WeekSelections {
                selections: saved,
                override_confirmed_at: None,
            }
        );
    }
}

#[test]
fn invalid_maps_are_not_saved() {
    let (manager, store) = manager("invalid", CacheSettings::default());
    let mut selections = SelectionMap::new();
    selections.insert(
        "Glynny".to_string(),
        WeeklySelection {
            home_team: String::new(),
            away_team: "Chelsea".to_string(),
            prediction: Prediction::Tbd,
            confidence: 5,
            assigned_at: None,
            league: None,
            id: None,
        },
    );
    assert!(!manager.save(&selections));
    assert_eq!(store.load_week(date("2024-10-19")), None);
}

#[test]
fn concurrent_edits_keep_override_and_counts() {
    const THREADS: usize = 4;
    const ROUNDS: usize = 10;
    let (manager, store) = manager("concurrent", CacheSettings::default());
    let week = date("2024-10-19");

    std::thread::scope(|scope| {
        for t in 0..THREADS {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                for round in 0..ROUNDS {
                    let mut selections = SelectionMap::new();
                    selections.insert(
                        SELECTORS[t].to_string(),
                        WeeklySelection {
                            home_team: format!("Home {t} {round}"),
                            away_team: "Away".to_string(),
                            prediction: Prediction::BttsYes,
                            confidence: 5,
                            assigned_at: None,
                            league: Some(League::PremierLeague),
                            id: None,
                        },
                    );
                    assert!(store.save_selections(week, &selections));
                }
            });
        }
        scope.spawn(|| {
            manager
                .confirm_override(OVERRIDE_CONFIRMATION)
                .expect("override");
        });
    });

    let stats = store.performance_stats();
    assert_eq!(stats.reads, (THREADS * ROUNDS + 1) as u64);
    assert_eq!(stats.writes, (THREADS * ROUNDS + 1) as u64);

    let reopened = CacheStore::open(
        store.paths().base.clone(),
        Arc::clone(store.clock()),
        CacheSettings::default(),
    );
    let on_disk = reopened.load_week(week).expect("week file parses");
    assert!(on_disk.override_confirmed_at.is_some());
    assert_eq!(on_disk.selections.len(), 1);
    assert!(manager.is_ready());
}
