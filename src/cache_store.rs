use std::collections::{BTreeSet, HashMap};
use std::ffi::OsString;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, iso_timestamp, parse_iso_timestamp};
use crate::config::Config;
use crate::match_record::{League, MatchRecord};
use crate::selections::{SelectionMap, WeekSelections, validate_selection_map};
use crate::validation::{KickoffRule, ValidationGate};

pub const FIXTURE_CACHE_PREFIX: &str = "bbc_cache_";
pub const SELECTIONS_PREFIX: &str = "week_";
pub const SELECTIONS_VERSION: &str = "1.0";
/// Reads for dates further ahead than this are treated as nonsense.
pub const MAX_DAYS_AHEAD: i64 = 14;
/// Reads for dates further back than this are treated as stale.
pub const MAX_DAYS_BEHIND: i64 = 7;
const GZIP_LEVEL: u32 = 6;
/// Tried in order when the configured data root cannot be created.
pub const FALLBACK_DATA_DIRS: [&str; 4] = [
    "/tmp/football_data",
    "/tmp/app_data",
    "./tmp_data",
    "/var/tmp/football_data",
];

/// Directory layout under the data root.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub base: PathBuf,
    pub selections: PathBuf,
    pub fixtures: PathBuf,
    pub backups: PathBuf,
}

impl DataPaths {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            selections: base.join("selections"),
            fixtures: base.join("fixtures"),
            backups: base.join("backups"),
            base,
        }
    }

    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.base, &self.selections, &self.fixtures, &self.backups] {
            fs::create_dir_all(dir)
                .with_context(|| format!("create data directory {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn live_results_file(&self) -> PathBuf {
        self.base.join("live_results.json")
    }

    pub fn week_file(&self, date: NaiveDate) -> PathBuf {
        self.selections
            .join(format!("{SELECTIONS_PREFIX}{}.json", date.format("%Y-%m-%d")))
    }

    pub fn fixture_file(&self, key: &CacheKey) -> PathBuf {
        self.fixtures.join(format!("{}.json", key.file_stem()))
    }
}

/// What a fixture cache entry covers for its date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyScope {
    /// The unified page for the date.
    Date,
    League(League),
    AllLeagues,
    /// Latest live snapshot; any kickoff allowed.
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub date: NaiveDate,
    pub scope: KeyScope,
}

impl CacheKey {
    pub fn fixtures(date: NaiveDate) -> Self {
        Self {
            date,
            scope: KeyScope::Date,
        }
    }

    pub fn league(date: NaiveDate, league: League) -> Self {
        Self {
            date,
            scope: KeyScope::League(league),
        }
    }

    pub fn all_leagues(date: NaiveDate) -> Self {
        Self {
            date,
            scope: KeyScope::AllLeagues,
        }
    }

    pub fn live(date: NaiveDate) -> Self {
        Self {
            date,
            scope: KeyScope::Live,
        }
    }

    pub fn file_stem(&self) -> String {
        let date = self.date.format("%Y-%m-%d");
        match self.scope {
            KeyScope::Date => format!("{FIXTURE_CACHE_PREFIX}{date}"),
            KeyScope::League(league) => {
                format!("{FIXTURE_CACHE_PREFIX}{date}_{}", league.file_suffix())
            }
            KeyScope::AllLeagues => format!("{FIXTURE_CACHE_PREFIX}{date}_all_leagues"),
            KeyScope::Live => format!("{FIXTURE_CACHE_PREFIX}{date}_live"),
        }
    }

    pub fn parse_stem(stem: &str) -> Option<Self> {
        let rest = stem.strip_prefix(FIXTURE_CACHE_PREFIX)?;
        let date_part = rest.get(..10)?;
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
        let suffix = &rest[10..];
        let scope = match suffix {
            "" => KeyScope::Date,
            "_all_leagues" => KeyScope::AllLeagues,
            "_live" => KeyScope::Live,
            other => {
                let name = other.strip_prefix('_')?;
                let league = League::ALL
                    .into_iter()
                    .find(|league| league.file_suffix() == name)?;
                KeyScope::League(league)
            }
        };
        Some(Self { date, scope })
    }

    pub fn kickoff_rule(&self) -> KickoffRule {
        match self.scope {
            KeyScope::Live => KickoffRule::Any,
            _ => KickoffRule::ThreePmOnly,
        }
    }

    fn memory_key(&self) -> String {
        format!("fixtures:{}", self.file_stem())
    }
}

/// Result of a lookup that may fall back to the last good payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Fresh(Vec<MatchRecord>),
    /// Expired or purged data kept from an earlier good read or write.
    Stale(Vec<MatchRecord>),
    Miss,
}

impl CacheLookup {
    pub fn is_stale(&self) -> bool {
        matches!(self, CacheLookup::Stale(_))
    }

    pub fn into_records(self) -> Vec<MatchRecord> {
        match self {
            CacheLookup::Fresh(records) | CacheLookup::Stale(records) => records,
            CacheLookup::Miss => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FixtureMetadata {
    cached_at: String,
    expires_at: String,
    ttl_hours: i64,
    date: String,
}

#[derive(Debug, Serialize)]
struct FixtureFileOut<'a> {
    metadata: FixtureMetadata,
    fixtures: &'a [MatchRecord],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SelectionsMetadata {
    created_at: String,
    version: String,
    date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    override_confirmed_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SelectionsFile {
    metadata: SelectionsMetadata,
    selections: SelectionMap,
}

#[derive(Debug, Clone)]
enum MemoryValue {
    Fixtures(Vec<MatchRecord>),
    Week(WeekSelections),
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: MemoryValue,
    stored_at: NaiveDateTime,
    ttl: Duration,
}

#[derive(Debug, Default, Clone)]
struct OperationStats {
    reads: u64,
    writes: u64,
    cache_hits: u64,
    cache_misses: u64,
    total_read_secs: f64,
    total_write_secs: f64,
}

#[derive(Debug, Default)]
struct HotState {
    memory: HashMap<String, MemoryEntry>,
    last_good: HashMap<String, Vec<MatchRecord>>,
    stats: OperationStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub reads: u64,
    pub writes: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_read_time_secs: f64,
    pub total_write_time_secs: f64,
    pub avg_read_time_secs: f64,
    pub avg_write_time_secs: f64,
    pub cache_hit_rate: f64,
    pub memory_cache_size: usize,
    pub active_key_locks: usize,
}

/// Tunables for [`CacheStore`].
#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    pub fixture_ttl: Duration,
    pub memory_ttl: Duration,
    pub selections_ttl: Duration,
    pub compression_threshold: usize,
    pub gate: ValidationGate,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl CacheSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fixture_ttl: Duration::hours(config.fixture_ttl_hours),
            memory_ttl: Duration::seconds(config.memory_ttl_secs),
            selections_ttl: Duration::hours(config.selections_ttl_hours),
            compression_threshold: config.compression_threshold,
            gate: ValidationGate::from_config(config),
        }
    }
}

/// File-backed store for fixture lists and weekly selections, with a
/// short-lived in-memory tier on top.
///
/// Each on-disk key has its own lock, created on first use. The memory tier,
/// the last-good payloads and the counters sit behind one store-wide lock,
/// always taken after (never before) a key lock.
///
/// Public operations never panic or return I/O errors: writes report `bool`,
/// reads report `Option` / [`CacheLookup`].
pub struct CacheStore {
    paths: DataPaths,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    hot: Mutex<HotState>,
}

impl CacheStore {
    pub fn open(base: impl Into<PathBuf>, clock: Arc<dyn Clock>, settings: CacheSettings) -> Self {
        let fallbacks: Vec<PathBuf> = FALLBACK_DATA_DIRS.into_iter().map(PathBuf::from).collect();
        Self::open_with_fallbacks(base, &fallbacks, clock, settings)
    }

    /// Like [`CacheStore::open`], trying each of `fallbacks` in order when
    /// the data root cannot be created.
    pub fn open_with_fallbacks(
        base: impl Into<PathBuf>,
        fallbacks: &[PathBuf],
        clock: Arc<dyn Clock>,
        settings: CacheSettings,
    ) -> Self {
        let paths = resolve_data_paths(base.into(), fallbacks);
        Self {
            paths,
            clock,
            settings,
            key_locks: Mutex::new(HashMap::new()),
            hot: Mutex::new(HotState::default()),
        }
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    // ---- fixtures ----

    /// Validates and writes a batch. `false` means it was rejected or the
    /// write failed; any earlier entry for the key is left as it was.
    pub fn put(&self, key: &CacheKey, records: &[MatchRecord]) -> bool {
        if let Err(err) = self
            .settings
            .gate
            .validate_records(records, key.kickoff_rule())
        {
            warn!(key = %key.file_stem(), reason = %err, "rejected batch, not caching");
            return false;
        }

        let memory_key = key.memory_key();
        if let Some(MemoryValue::Fixtures(existing)) = self.memory_get(&memory_key) {
            if existing == records {
                debug!(key = %key.file_stem(), "fixtures unchanged, skipping save");
                return true;
            }
        }

        let started = Instant::now();
        let lock = self.key_lock(&key.file_stem());
        let _guard = lock_ignoring_poison(&lock);

        let now = self.clock.now();
        let file = FixtureFileOut {
            metadata: FixtureMetadata {
                cached_at: iso_timestamp(now),
                expires_at: iso_timestamp(now + self.settings.fixture_ttl),
                ttl_hours: self.settings.fixture_ttl.num_hours(),
                date: key.date.format("%Y-%m-%d").to_string(),
            },
            fixtures: records,
        };
        let path = self.paths.fixture_file(key);
        let written = write_json_file(&path, &file, self.settings.compression_threshold);

        let mut hot = self.hot();
        hot.stats.writes += 1;
        hot.stats.total_write_secs += started.elapsed().as_secs_f64();
        match written {
            Ok(compressed) => {
                hot.memory.insert(
                    memory_key.clone(),
                    MemoryEntry {
                        value: MemoryValue::Fixtures(records.to_vec()),
                        stored_at: now,
                        ttl: self.settings.memory_ttl,
                    },
                );
                hot.last_good.insert(memory_key, records.to_vec());
                info!(
                    key = %key.file_stem(),
                    count = records.len(),
                    compressed,
                    "cached fixtures"
                );
                true
            }
            Err(err) => {
                error!(key = %key.file_stem(), error = %err, "failed to cache fixtures");
                false
            }
        }
    }

    /// Fresh, valid fixtures for `key`, or `None`. Anything expired,
    /// out of the date window or structurally invalid is deleted.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<MatchRecord>> {
        let memory_key = key.memory_key();
        if let Some(MemoryValue::Fixtures(records)) = self.memory_get(&memory_key) {
            let mut hot = self.hot();
            hot.stats.reads += 1;
            hot.stats.cache_hits += 1;
            return Some(records);
        }

        let started = Instant::now();
        let lock = self.key_lock(&key.file_stem());
        let _guard = lock_ignoring_poison(&lock);
        let outcome = self.read_fixture_entry(key);

        let now = self.clock.now();
        let mut hot = self.hot();
        hot.stats.reads += 1;
        hot.stats.total_read_secs += started.elapsed().as_secs_f64();
        match outcome {
            EntryRead::Valid(records) => {
                hot.stats.cache_hits += 1;
                hot.memory.insert(
                    memory_key.clone(),
                    MemoryEntry {
                        value: MemoryValue::Fixtures(records.clone()),
                        stored_at: now,
                        ttl: self.settings.memory_ttl,
                    },
                );
                hot.last_good.insert(memory_key, records.clone());
                Some(records)
            }
            EntryRead::Expired(records) => {
                hot.stats.cache_misses += 1;
                hot.last_good.insert(memory_key, records);
                None
            }
            EntryRead::Missing | EntryRead::Corrupt => {
                hot.stats.cache_misses += 1;
                None
            }
        }
    }

    /// Last payload known to have been valid for `key`, ignoring expiry.
    pub fn stale(&self, key: &CacheKey) -> Option<Vec<MatchRecord>> {
        self.hot().last_good.get(&key.memory_key()).cloned()
    }

    pub fn get_or_stale(&self, key: &CacheKey) -> CacheLookup {
        if let Some(records) = self.get(key) {
            return CacheLookup::Fresh(records);
        }
        match self.stale(key) {
            Some(records) => {
                warn!(key = %key.file_stem(), "serving stale fixtures");
                CacheLookup::Stale(records)
            }
            None => CacheLookup::Miss,
        }
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let lock = self.key_lock(&key.file_stem());
        let _guard = lock_ignoring_poison(&lock);
        let removed = remove_entry(&self.paths.fixture_file(key));
        let memory_key = key.memory_key();
        let mut hot = self.hot();
        hot.memory.remove(&memory_key);
        hot.last_good.remove(&memory_key);
        removed
    }

    /// Removes every fixture cache file and empties the memory tier.
    pub fn clear_all(&self) -> usize {
        let mut removed = 0;
        for stem in self.fixture_stems() {
            let lock = self.key_lock(&stem);
            let _guard = lock_ignoring_poison(&lock);
            if remove_entry(&self.paths.fixtures.join(format!("{stem}.json"))) {
                removed += 1;
            }
        }
        let mut hot = self.hot();
        hot.memory.clear();
        hot.last_good.clear();
        info!(removed, "cleared fixture cache");
        removed
    }

    /// Deletes fixture files that cannot be decoded or fail structural
    /// validation. Expiry is left to normal reads.
    pub fn sweep_corrupted(&self) -> usize {
        let stems: Vec<String> = self.fixture_stems().into_iter().collect();
        let removed = stems
            .par_iter()
            .filter(|stem| {
                let lock = self.key_lock(stem);
                let _guard = lock_ignoring_poison(&lock);
                let path = self.paths.fixtures.join(format!("{stem}.json"));
                let rule = CacheKey::parse_stem(stem)
                    .map(|key| key.kickoff_rule())
                    .unwrap_or(KickoffRule::Any);
                let healthy = match read_json_file(&path) {
                    Ok(Some(value)) => self.fixture_file_is_sound(&value, rule),
                    Ok(None) => true,
                    Err(_) => false,
                };
                if !healthy {
                    warn!(file = %path.display(), "removing corrupted cache file");
                    remove_entry(&path);
                }
                !healthy
            })
            .count();
        if removed > 0 {
            info!(removed, "corruption sweep finished");
        }
        removed
    }

    // ---- selections ----

    /// Replaces a week's picks, keeping any override already confirmed.
    pub fn save_selections(&self, date: NaiveDate, selections: &SelectionMap) -> bool {
        self.update_week(date, |current| WeekSelections {
            selections: selections.clone(),
            override_confirmed_at: current.override_confirmed_at,
        })
    }

    pub fn load_selections(&self, date: NaiveDate) -> Option<SelectionMap> {
        self.load_week(date).map(|week| week.selections)
    }

    pub fn save_week(&self, date: NaiveDate, week: &WeekSelections) -> bool {
        let lock = self.key_lock(&week_lock_key(date));
        let _guard = lock_ignoring_poison(&lock);
        self.save_week_locked(date, week)
    }

    pub fn load_week(&self, date: NaiveDate) -> Option<WeekSelections> {
        let lock = self.key_lock(&week_lock_key(date));
        let _guard = lock_ignoring_poison(&lock);
        self.load_week_locked(date)
    }

    /// Read-modify-write of one week while holding its key lock, so
    /// concurrent edits of picks and of the override never overwrite each
    /// other. A missing or unreadable week starts from empty.
    pub fn update_week(
        &self,
        date: NaiveDate,
        update: impl FnOnce(WeekSelections) -> WeekSelections,
    ) -> bool {
        let lock = self.key_lock(&week_lock_key(date));
        let _guard = lock_ignoring_poison(&lock);
        let current = self.load_week_locked(date).unwrap_or_default();
        self.save_week_locked(date, &update(current))
    }

    /// Caller holds the week's key lock.
    fn save_week_locked(&self, date: NaiveDate, week: &WeekSelections) -> bool {
        if let Err(err) = validate_selection_map(&week.selections) {
            warn!(week = %date, reason = %err, "refusing to save invalid selections");
            return false;
        }
        let memory_key = week_memory_key(date);
        if let Some(MemoryValue::Week(existing)) = self.memory_get(&memory_key) {
            if &existing == week {
                debug!(week = %date, "selections unchanged, skipping save");
                return true;
            }
        }

        let started = Instant::now();
        let path = self.paths.week_file(date);
        let now = self.clock.now();
        let file = SelectionsFile {
            metadata: SelectionsMetadata {
                created_at: iso_timestamp(now),
                version: SELECTIONS_VERSION.to_string(),
                date: date.format("%Y-%m-%d").to_string(),
                override_confirmed_at: week.override_confirmed_at.clone(),
            },
            selections: week.selections.clone(),
        };
        let written = write_json_file(&path, &file, self.settings.compression_threshold);

        let mut hot = self.hot();
        hot.stats.writes += 1;
        hot.stats.total_write_secs += started.elapsed().as_secs_f64();
        match written {
            Ok(_) => {
                hot.memory.insert(
                    memory_key,
                    MemoryEntry {
                        value: MemoryValue::Week(week.clone()),
                        stored_at: now,
                        ttl: self.settings.selections_ttl,
                    },
                );
                info!(week = %date, count = week.selections.len(), "saved selections");
                true
            }
            Err(err) => {
                error!(week = %date, error = %err, "failed to save selections");
                false
            }
        }
    }

    /// Caller holds the week's key lock.
    fn load_week_locked(&self, date: NaiveDate) -> Option<WeekSelections> {
        let memory_key = week_memory_key(date);
        if let Some(MemoryValue::Week(week)) = self.memory_get(&memory_key) {
            let mut hot = self.hot();
            hot.stats.reads += 1;
            hot.stats.cache_hits += 1;
            return Some(week);
        }

        let started = Instant::now();
        let path = self.paths.week_file(date);
        let loaded = read_json_file(&path).and_then(|value| match value {
            Some(value) => decode_week(value).map(Some),
            None => Ok(None),
        });

        let now = self.clock.now();
        let mut hot = self.hot();
        hot.stats.reads += 1;
        hot.stats.total_read_secs += started.elapsed().as_secs_f64();
        match loaded {
            Ok(Some(week)) => {
                hot.stats.cache_hits += 1;
                hot.memory.insert(
                    memory_key,
                    MemoryEntry {
                        value: MemoryValue::Week(week.clone()),
                        stored_at: now,
                        ttl: self.settings.selections_ttl,
                    },
                );
                Some(week)
            }
            Ok(None) => {
                hot.stats.cache_misses += 1;
                None
            }
            Err(err) => {
                hot.stats.cache_misses += 1;
                error!(week = %date, error = %err, "unreadable selections file");
                None
            }
        }
    }

    /// Every week that has a selections file, oldest first.
    pub fn list_weeks(&self) -> Vec<NaiveDate> {
        let Ok(entries) = fs::read_dir(&self.paths.selections) else {
            return Vec::new();
        };
        let mut weeks: Vec<NaiveDate> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let date = name
                    .strip_prefix(SELECTIONS_PREFIX)?
                    .trim_end_matches(".gz")
                    .strip_suffix(".json")?
                    .to_string();
                NaiveDate::parse_from_str(&date, "%Y-%m-%d").ok()
            })
            .collect();
        weeks.sort();
        weeks.dedup();
        weeks
    }

    // ---- maintenance ----

    pub fn performance_stats(&self) -> PerformanceStats {
        let active_key_locks = lock_ignoring_poison(&self.key_locks).len();
        let hot = self.hot();
        let s = &hot.stats;
        let lookups = s.cache_hits + s.cache_misses;
        PerformanceStats {
            reads: s.reads,
            writes: s.writes,
            cache_hits: s.cache_hits,
            cache_misses: s.cache_misses,
            total_read_time_secs: s.total_read_secs,
            total_write_time_secs: s.total_write_secs,
            avg_read_time_secs: if s.reads > 0 {
                s.total_read_secs / s.reads as f64
            } else {
                0.0
            },
            avg_write_time_secs: if s.writes > 0 {
                s.total_write_secs / s.writes as f64
            } else {
                0.0
            },
            cache_hit_rate: if lookups > 0 {
                s.cache_hits as f64 / lookups as f64 * 100.0
            } else {
                0.0
            },
            memory_cache_size: hot.memory.len(),
            active_key_locks,
        }
    }

    pub fn clear_memory_cache(&self) {
        let mut hot = self.hot();
        hot.memory.clear();
        hot.last_good.clear();
    }

    /// Drops locks nobody holds whose backing file is gone.
    pub fn cleanup_locks(&self) -> usize {
        let mut locks = lock_ignoring_poison(&self.key_locks);
        let before = locks.len();
        locks.retain(|stem, lock| {
            if Arc::strong_count(lock) > 1 {
                return true;
            }
            let path = if let Some(date) = stem.strip_prefix(SELECTIONS_PREFIX) {
                self.paths.selections.join(format!("{SELECTIONS_PREFIX}{date}.json"))
            } else {
                self.paths.fixtures.join(format!("{stem}.json"))
            };
            path.exists() || gz_path(&path).exists()
        });
        before - locks.len()
    }

    /// Evicts expired memory entries and unused locks.
    pub fn optimize(&self) -> (usize, usize) {
        let now = self.clock.now();
        let evicted = {
            let mut hot = self.hot();
            let before = hot.memory.len();
            hot.memory.retain(|_, entry| now - entry.stored_at < entry.ttl);
            before - hot.memory.len()
        };
        let locks = self.cleanup_locks();
        debug!(evicted, locks, "optimized cache");
        (evicted, locks)
    }

    /// Runs `f` while holding the lock for an arbitrary on-disk key.
    pub(crate) fn with_key_lock<R>(&self, key: &str, f: impl FnOnce() -> R) -> R {
        let lock = self.key_lock(key);
        let _guard = lock_ignoring_poison(&lock);
        f()
    }

    // ---- internals ----

    fn hot(&self) -> MutexGuard<'_, HotState> {
        lock_ignoring_poison(&self.hot)
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = lock_ignoring_poison(&self.key_locks);
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn memory_get(&self, key: &str) -> Option<MemoryValue> {
        let now = self.clock.now();
        let mut hot = self.hot();
        let entry = hot.memory.get(key)?;
        if now - entry.stored_at < entry.ttl {
            return Some(entry.value.clone());
        }
        hot.memory.remove(key);
        None
    }

    fn fixture_file_stems(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.paths.fixtures) else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                if !name.starts_with(FIXTURE_CACHE_PREFIX) {
                    return None;
                }
                name.trim_end_matches(".gz")
                    .strip_suffix(".json")
                    .map(str::to_string)
            })
            .collect()
    }

    fn fixture_stems(&self) -> BTreeSet<String> {
        self.fixture_file_stems().into_iter().collect()
    }

    fn fixture_file_is_sound(&self, value: &Value, rule: KickoffRule) -> bool {
        let Some(fixtures) = value.get("fixtures") else {
            return false;
        };
        if value
            .get("metadata")
            .and_then(|m| serde_json::from_value::<FixtureMetadata>(m.clone()).ok())
            .is_none()
        {
            return false;
        }
        self.settings.gate.validate_value(fixtures, rule).is_ok()
            && serde_json::from_value::<Vec<MatchRecord>>(fixtures.clone()).is_ok()
    }

    /// Caller holds the key lock.
    fn read_fixture_entry(&self, key: &CacheKey) -> EntryRead {
        let path = self.paths.fixture_file(key);
        let value = match read_json_file(&path) {
            Ok(Some(value)) => value,
            Ok(None) => return EntryRead::Missing,
            Err(err) => {
                warn!(key = %key.file_stem(), error = %err, "undecodable cache entry, deleting");
                remove_entry(&path);
                return EntryRead::Corrupt;
            }
        };

        let Some(fixtures) = value.get("fixtures") else {
            warn!(key = %key.file_stem(), "cache entry has no fixtures, deleting");
            remove_entry(&path);
            return EntryRead::Corrupt;
        };
        if let Err(err) = self.settings.gate.validate_value(fixtures, key.kickoff_rule()) {
            warn!(key = %key.file_stem(), reason = %err, "cache entry failed validation, deleting");
            remove_entry(&path);
            return EntryRead::Corrupt;
        }
        let records = match serde_json::from_value::<Vec<MatchRecord>>(fixtures.clone()) {
            Ok(records) => records,
            Err(err) => {
                warn!(key = %key.file_stem(), error = %err, "cache entry not decodable, deleting");
                remove_entry(&path);
                return EntryRead::Corrupt;
            }
        };
        let expires_at = value
            .get("metadata")
            .and_then(|m| m.get("expires_at"))
            .and_then(Value::as_str)
            .and_then(parse_iso_timestamp);
        let Some(expires_at) = expires_at else {
            warn!(key = %key.file_stem(), "cache entry has no expiry, deleting");
            remove_entry(&path);
            return EntryRead::Corrupt;
        };

        let now = self.clock.now();
        if now > expires_at {
            info!(key = %key.file_stem(), "cache entry expired, deleting");
            remove_entry(&path);
            return EntryRead::Expired(records);
        }
        if !date_is_sane(key.date, now.date()) {
            info!(key = %key.file_stem(), "cache date outside sane window, deleting");
            remove_entry(&path);
            return EntryRead::Expired(records);
        }
        EntryRead::Valid(records)
    }
}

enum EntryRead {
    Valid(Vec<MatchRecord>),
    Expired(Vec<MatchRecord>),
    Missing,
    Corrupt,
}

/// First data root whose directories can be created. When none can, the
/// primary is kept and every write will fail and be reported.
fn resolve_data_paths(base: PathBuf, fallbacks: &[PathBuf]) -> DataPaths {
    let primary = DataPaths::new(base);
    match primary.ensure() {
        Ok(()) => return primary,
        Err(err) => {
            error!(base = %primary.base.display(), error = %err, "data directories unavailable")
        }
    }
    for fallback in fallbacks {
        let paths = DataPaths::new(fallback.clone());
        match paths.ensure() {
            Ok(()) => {
                warn!(base = %paths.base.display(), "using fallback data directory");
                return paths;
            }
            Err(err) => {
                warn!(base = %fallback.display(), error = %err, "fallback data directory failed")
            }
        }
    }
    error!("no usable data directory, storage writes will fail");
    primary
}

/// A cached date is only trusted within [-7, +14] days of today.
pub fn date_is_sane(date: NaiveDate, today: NaiveDate) -> bool {
    date <= today + Duration::days(MAX_DAYS_AHEAD)
        && date >= today - Duration::days(MAX_DAYS_BEHIND)
}

fn week_memory_key(date: NaiveDate) -> String {
    format!("selections:{}", date.format("%Y-%m-%d"))
}

fn week_lock_key(date: NaiveDate) -> String {
    format!("{SELECTIONS_PREFIX}{}", date.format("%Y-%m-%d"))
}

fn decode_week(value: Value) -> Result<WeekSelections> {
    let file: SelectionsFile =
        serde_json::from_value(value).context("selections file has unexpected shape")?;
    validate_selection_map(&file.selections).context("stored selections are invalid")?;
    Ok(WeekSelections {
        selections: file.selections,
        override_confirmed_at: file.metadata.override_confirmed_at,
    })
}

pub(crate) fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn gz_path(path: &Path) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(".gz");
    PathBuf::from(raw)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(".tmp");
    PathBuf::from(raw)
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

/// Pretty JSON at `path`, or gzip at `path.gz` when larger than
/// `threshold`. The other form is removed so reads never see both.
/// Returns whether the compressed form was written.
pub(crate) fn write_json_file<T: Serialize>(
    path: &Path,
    value: &T,
    threshold: usize,
) -> Result<bool> {
    let json = serde_json::to_vec_pretty(value).context("serialize json")?;
    let gz = gz_path(path);
    if json.len() > threshold {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(GZIP_LEVEL));
        encoder.write_all(&json).context("gzip json")?;
        let bytes = encoder.finish().context("finish gzip")?;
        atomic_write(&gz, &bytes)?;
        remove_if_exists(path);
        Ok(true)
    } else {
        atomic_write(path, &json)?;
        remove_if_exists(&gz);
        Ok(false)
    }
}

/// Reads `path.gz` if present, else `path`. `Ok(None)` when neither exists.
pub(crate) fn read_json_file(path: &Path) -> Result<Option<Value>> {
    let gz = gz_path(path);
    if gz.exists() {
        let bytes = fs::read(&gz).with_context(|| format!("read {}", gz.display()))?;
        let mut raw = String::new();
        GzDecoder::new(bytes.as_slice())
            .read_to_string(&mut raw)
            .with_context(|| format!("gunzip {}", gz.display()))?;
        let value = serde_json::from_str(&raw).with_context(|| format!("parse {}", gz.display()))?;
        return Ok(Some(value));
    }
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let value = serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(value))
}

/// Deletes both forms of an entry; true if anything was removed.
pub(crate) fn remove_entry(path: &Path) -> bool {
    let plain = remove_if_exists(path);
    let gz = remove_if_exists(&gz_path(path));
    plain || gz
}

fn remove_if_exists(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => false,
        Err(err) => {
            warn!(file = %path.display(), error = %err, "failed to remove file");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn stems_round_trip() {
        let keys = [
            CacheKey::fixtures(date("2024-10-19")),
            CacheKey::league(date("2024-10-19"), League::ScottishLeagueOne),
            CacheKey::all_leagues(date("2024-10-19")),
            CacheKey::live(date("2024-10-19")),
        ];
        for key in keys {
            assert_eq!(CacheKey::parse_stem(&key.file_stem()), Some(key));
        }
        assert_eq!(
            CacheKey::league(date("2024-10-19"), League::PremierLeague).file_stem(),
            "bbc_cache_2024-10-19_premier_league"
        );
        assert_eq!(CacheKey::parse_stem("bbc_cache_garbage"), None);
    }

    #[test]
    fn date_window_is_inclusive() {
        let today = date("2024-10-19");
        assert!(date_is_sane(date("2024-11-02"), today));
        assert!(!date_is_sane(date("2024-11-03"), today));
        assert!(date_is_sane(date("2024-10-12"), today));
        assert!(!date_is_sane(date("2024-10-11"), today));
    }

    #[test]
    fn gz_and_tmp_paths_append_suffix() {
        let path = Path::new("/data/fixtures/bbc_cache_2024-10-19.json");
        assert_eq!(
            gz_path(path),
            PathBuf::from("/data/fixtures/bbc_cache_2024-10-19.json.gz")
        );
        assert_eq!(
            tmp_path(path),
            PathBuf::from("/data/fixtures/bbc_cache_2024-10-19.json.tmp")
        );
    }
}
