use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};

use crate::cache_store::{CacheKey, CacheLookup, CacheStore};
use crate::config::Config;
use crate::error::{ParseError, ScrapeError};
use crate::fetch::{PageSource, UrlBuilder};
use crate::league_classifier::DomWalkClassifier;
use crate::match_record::{League, MatchRecord, ScrapeMode, dedupe};
use crate::prediction_week::{FixtureProbe, current_prediction_week, find_next_fixture_date};
use crate::selections::FixtureSource;
use crate::source_parser::{PageScope, SourceParser};

/// Days ahead for which a league cache entry is trusted without a refetch.
pub const LEAGUE_CACHE_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataOrigin {
    Fresh,
    Cache,
    StaleCache,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeOutcome {
    pub date: NaiveDate,
    pub matches: Vec<MatchRecord>,
    pub origin: DataOrigin,
}

impl ScrapeOutcome {
    fn new(date: NaiveDate, matches: Vec<MatchRecord>, origin: DataOrigin) -> Self {
        Self {
            date,
            matches,
            origin,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.origin, DataOrigin::StaleCache | DataOrigin::Unavailable)
    }

    pub fn three_pm(&self) -> Vec<MatchRecord> {
        self.matches
            .iter()
            .filter(|record| record.is_three_pm())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SaturdayFixtures {
    pub scraping_date: NaiveDate,
    pub next_saturday: NaiveDate,
    pub matches: Vec<MatchRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekFixtures {
    pub target: NaiveDate,
    pub date: Option<NaiveDate>,
    pub using_alternative_date: bool,
    pub matches: Vec<MatchRecord>,
}

/// Fetch → parse → validate → cache, with cache-first reads and stale
/// fallback when the upstream fetch fails.
pub struct BbcScraper {
    source: Arc<dyn PageSource>,
    urls: UrlBuilder,
    parser: SourceParser,
    store: Arc<CacheStore>,
    fallback_window_days: u32,
}

impl BbcScraper {
    pub fn new(source: Arc<dyn PageSource>, store: Arc<CacheStore>, config: &Config) -> Self {
        Self {
            source,
            urls: UrlBuilder::new(&config.base_url),
            parser: SourceParser::new(Box::new(DomWalkClassifier::new(
                config.league_search_depth,
            ))),
            store,
            fallback_window_days: config.fallback_window_days,
        }
    }

    fn today(&self) -> NaiveDate {
        self.store.now().date()
    }

    fn fetch_and_parse(
        &self,
        url: &str,
        date: NaiveDate,
        mode: ScrapeMode,
        scope: PageScope,
    ) -> Result<Vec<MatchRecord>, ScrapeError> {
        let body = self.source.fetch(url)?;
        let records = self.parser.parse(&body, date, mode, scope)?;
        Ok(records)
    }

    /// One request for every competition on `date`.
    pub fn scrape_unified(&self, date: NaiveDate, mode: ScrapeMode) -> ScrapeOutcome {
        let url = self.urls.unified(date, mode);
        let key = match mode {
            ScrapeMode::Fixtures => CacheKey::fixtures(date),
            ScrapeMode::Live => CacheKey::live(date),
        };
        match self.fetch_and_parse(&url, date, mode, PageScope::Unified) {
            Ok(records) => {
                info!(date = %date, count = records.len(), ?mode, "scraped unified page");
                ScrapeOutcome::new(date, records, DataOrigin::Fresh)
            }
            Err(ScrapeError::Parse(err)) => {
                info!(date = %date, ?mode, reason = %err, "no matches on unified page");
                ScrapeOutcome::new(date, Vec::new(), DataOrigin::Fresh)
            }
            Err(ScrapeError::Fetch(err)) => {
                warn!(url, error = %err, "fetch failed, falling back to cache");
                self.fallback(&key, date)
            }
        }
    }

    fn fallback(&self, key: &CacheKey, date: NaiveDate) -> ScrapeOutcome {
        match self.store.get_or_stale(key) {
            CacheLookup::Fresh(records) => ScrapeOutcome::new(date, records, DataOrigin::Cache),
            CacheLookup::Stale(records) => {
                ScrapeOutcome::new(date, records, DataOrigin::StaleCache)
            }
            CacheLookup::Miss => ScrapeOutcome::new(date, Vec::new(), DataOrigin::Unavailable),
        }
    }

    /// 3pm fixtures for `date`: cache first, otherwise the unified page,
    /// caching a non-empty result.
    pub fn get_fixtures(&self, date: NaiveDate) -> ScrapeOutcome {
        let key = CacheKey::fixtures(date);
        if let Some(records) = self.store.get(&key) {
            return ScrapeOutcome::new(date, records, DataOrigin::Cache);
        }
        let mut outcome = self.scrape_unified(date, ScrapeMode::Fixtures);
        outcome.matches.retain(MatchRecord::is_three_pm);
        if outcome.origin == DataOrigin::Fresh && !outcome.matches.is_empty() {
            self.store.put(&key, &outcome.matches);
        }
        outcome
    }

    pub fn cache_fixtures(&self, records: &[MatchRecord], date: NaiveDate) -> bool {
        self.store.put(&CacheKey::fixtures(date), records)
    }

    /// Latest scores for `date`. A fresh snapshot replaces the cached one.
    pub fn scrape_live(&self, date: NaiveDate) -> ScrapeOutcome {
        let outcome = self.scrape_unified(date, ScrapeMode::Live);
        if outcome.origin == DataOrigin::Fresh && !outcome.matches.is_empty() {
            self.store.put(&CacheKey::live(date), &outcome.matches);
        }
        outcome
    }

    /// One league's month page, filtered to `date` where the page allows.
    pub fn scrape_league(&self, league: League, date: NaiveDate) -> ScrapeOutcome {
        let key = CacheKey::league(date, league);
        let cached = self.store.get(&key);
        if let Some(records) = &cached {
            if self.league_cache_usable(date) {
                return ScrapeOutcome::new(date, records.clone(), DataOrigin::Cache);
            }
            info!(%league, date = %date, "cached league data outside window, refetching");
        }

        let url = self.urls.league(league, date, ScrapeMode::Fixtures);
        match self.fetch_and_parse(&url, date, ScrapeMode::Fixtures, PageScope::League(league)) {
            Ok(records) => {
                self.store.put(&key, &records);
                info!(%league, date = %date, count = records.len(), "scraped league page");
                ScrapeOutcome::new(date, records, DataOrigin::Fresh)
            }
            Err(ScrapeError::Parse(ParseError::NoMatches | ParseError::EmptyPage)) => {
                warn!(%league, date = %date, "no matches found, not caching");
                match cached {
                    Some(records) => ScrapeOutcome::new(date, records, DataOrigin::Cache),
                    None => ScrapeOutcome::new(date, Vec::new(), DataOrigin::Fresh),
                }
            }
            Err(err) => {
                warn!(%league, url, error = %err, "league scrape failed");
                match cached {
                    Some(records) => ScrapeOutcome::new(date, records, DataOrigin::Cache),
                    None => self.fallback(&key, date),
                }
            }
        }
    }

    fn league_cache_usable(&self, date: NaiveDate) -> bool {
        let today = self.today();
        date >= today && date <= today + Duration::days(LEAGUE_CACHE_WINDOW_DAYS)
    }

    /// Every league's 3pm fixtures for the current prediction week.
    pub fn scrape_saturday_3pm_fixtures(&self) -> SaturdayFixtures {
        let now = self.store.now();
        let week = current_prediction_week(now);
        let mut matches = Vec::new();
        for league in League::ALL {
            let outcome = self.scrape_league(league, week);
            matches.extend(outcome.three_pm());
        }
        let matches = dedupe(matches);
        if !matches.is_empty() {
            self.store.put(&CacheKey::all_leagues(week), &matches);
        }
        info!(week = %week, count = matches.len(), "collected saturday 3pm fixtures");
        SaturdayFixtures {
            scraping_date: now.date(),
            next_saturday: week,
            matches,
        }
    }

    /// Fixtures for the prediction week, moving forward day by day when the
    /// Saturday itself has none (international breaks).
    pub fn fixtures_for_week(&self) -> WeekFixtures {
        let target = current_prediction_week(self.store.now());
        let found = find_next_fixture_date(self, target, self.today(), self.fallback_window_days);
        let matches = found
            .map(|date| self.get_fixtures(date).matches)
            .unwrap_or_default();
        WeekFixtures {
            target,
            date: found,
            using_alternative_date: found.is_some_and(|date| date != target),
            matches,
        }
    }

    pub fn clear_fixture_cache(&self) -> usize {
        self.store.clear_all()
    }
}

impl FixtureProbe for BbcScraper {
    fn qualifying_fixtures(&self, date: NaiveDate) -> usize {
        self.get_fixtures(date).three_pm().len()
    }
}

impl FixtureSource for BbcScraper {
    fn fixtures_for(&self, date: NaiveDate) -> Vec<MatchRecord> {
        self.get_fixtures(date).matches
    }
}
