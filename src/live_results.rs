use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::cache_store::{CacheStore, read_json_file, write_json_file};
use crate::clock::{iso_timestamp, parse_iso_timestamp};
use crate::match_record::{League, MatchIdentity, MatchRecord, MatchStatus};
use crate::selections::SelectionMap;

const LOCK_KEY: &str = "live_results";
const VERSION: &str = "1.0";

/// A final (or latest) score captured for a tracked match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveResult {
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub home_score: u32,
    #[serde(default)]
    pub away_score: u32,
    #[serde(default)]
    pub status: MatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub league: Option<League>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_at: Option<String>,
}

impl LiveResult {
    pub fn involves(&self, home_team: &str, away_team: &str) -> bool {
        let (home, away) = (self.home_team.trim(), self.away_team.trim());
        let (want_home, want_away) = (home_team.trim(), away_team.trim());
        (home == want_home && away == want_away) || (home == want_away && away == want_home)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LiveResultsMetadata {
    created_at: String,
    version: String,
    total_results: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct LiveResultsFile {
    metadata: LiveResultsMetadata,
    live_results: Vec<LiveResult>,
}

/// `live_results.json` under the data root.
pub struct LiveResultsLog {
    store: Arc<CacheStore>,
}

impl LiveResultsLog {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    pub fn save(&self, results: &[LiveResult]) -> bool {
        self.store.with_key_lock(LOCK_KEY, || self.save_unlocked(results))
    }

    pub fn load(&self) -> Option<Vec<LiveResult>> {
        self.store.with_key_lock(LOCK_KEY, || self.load_unlocked())
    }

    pub fn add(&self, result: LiveResult) -> bool {
        self.store.with_key_lock(LOCK_KEY, || {
            let mut results = self.load_unlocked().unwrap_or_default();
            results.push(result);
            self.save_unlocked(&results)
        })
    }

    pub fn for_match(&self, match_id: &str) -> Vec<LiveResult> {
        self.load()
            .unwrap_or_default()
            .into_iter()
            .filter(|result| result.match_id == match_id)
            .collect()
    }

    /// Drops results detected more than `keep_days` ago. Entries with no or
    /// unparseable `detected_at` are kept.
    pub fn cleanup_older_than(&self, keep_days: i64) -> usize {
        let cutoff = self.store.now() - Duration::days(keep_days);
        self.store.with_key_lock(LOCK_KEY, || {
            let Some(results) = self.load_unlocked() else {
                return 0;
            };
            let before = results.len();
            let kept: Vec<LiveResult> = results
                .into_iter()
                .filter(|result| {
                    result
                        .detected_at
                        .as_deref()
                        .and_then(parse_iso_timestamp)
                        .map_or(true, |detected| detected > cutoff)
                })
                .collect();
            let removed = before - kept.len();
            if removed > 0 && self.save_unlocked(&kept) {
                info!(removed, "cleaned up old live results");
            }
            removed
        })
    }

    /// Logs finished scores for selected matches that are not logged yet.
    pub fn record_finished(
        &self,
        selections: &SelectionMap,
        live: &[MatchRecord],
        identity: &dyn MatchIdentity,
    ) -> usize {
        let now = iso_timestamp(self.store.now());
        self.store.with_key_lock(LOCK_KEY, || {
            let mut results = self.load_unlocked().unwrap_or_default();
            let mut added = 0;
            for selection in selections.values() {
                let Some(record) = live.iter().find(|record| {
                    record.status == MatchStatus::Finished
                        && identity.same_fixture(&selection.home_team, &selection.away_team, record)
                }) else {
                    continue;
                };
                let match_id = identity.record_id(record);
                if results.iter().any(|r| r.match_id == match_id) {
                    continue;
                }
                results.push(LiveResult {
                    match_id,
                    home_team: record.home_team.clone(),
                    away_team: record.away_team.clone(),
                    home_score: record.home_score,
                    away_score: record.away_score,
                    status: record.status,
                    league: Some(record.league),
                    detected_at: Some(now.clone()),
                });
                added += 1;
            }
            if added > 0 && !self.save_unlocked(&results) {
                return 0;
            }
            added
        })
    }

    fn save_unlocked(&self, results: &[LiveResult]) -> bool {
        let file = LiveResultsFile {
            metadata: LiveResultsMetadata {
                created_at: iso_timestamp(self.store.now()),
                version: VERSION.to_string(),
                total_results: results.len(),
            },
            live_results: results.to_vec(),
        };
        let path = self.store.paths().live_results_file();
        match write_json_file(&path, &file, self.store.settings().compression_threshold) {
            Ok(_) => true,
            Err(err) => {
                error!(error = %err, "failed to save live results");
                false
            }
        }
    }

    fn load_unlocked(&self) -> Option<Vec<LiveResult>> {
        let path = self.store.paths().live_results_file();
        let value = match read_json_file(&path) {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(err) => {
                error!(error = %err, "failed to read live results");
                return None;
            }
        };
        let list = value.get("live_results").cloned().unwrap_or(Value::Array(Vec::new()));
        match serde_json::from_value::<Vec<LiveResult>>(list) {
            Ok(results) => Some(results),
            Err(err) => {
                warn!(error = %err, "live results file has unexpected shape");
                None
            }
        }
    }
}
