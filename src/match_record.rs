use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_VENUE: &str = "TBC";
pub const KICKOFF_TBC: &str = "TBC";
pub const THREE_PM: &str = "15:00";
pub const DEFAULT_MATCH_TIME: &str = "0'";

/// The nine competitions the panel picks from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum League {
    #[serde(rename = "Premier League")]
    PremierLeague,
    #[serde(rename = "Championship")]
    Championship,
    #[serde(rename = "League One")]
    LeagueOne,
    #[serde(rename = "League Two")]
    LeagueTwo,
    #[serde(rename = "National League")]
    NationalLeague,
    #[serde(rename = "Scottish Premiership")]
    ScottishPremiership,
    #[serde(rename = "Scottish Championship")]
    ScottishChampionship,
    #[serde(rename = "Scottish League One")]
    ScottishLeagueOne,
    #[serde(rename = "Scottish League Two")]
    ScottishLeagueTwo,
}

impl League {
    pub const ALL: [League; 9] = [
        League::PremierLeague,
        League::Championship,
        League::LeagueOne,
        League::LeagueTwo,
        League::NationalLeague,
        League::ScottishPremiership,
        League::ScottishChampionship,
        League::ScottishLeagueOne,
        League::ScottishLeagueTwo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            League::PremierLeague => "Premier League",
            League::Championship => "Championship",
            League::LeagueOne => "League One",
            League::LeagueTwo => "League Two",
            League::NationalLeague => "National League",
            League::ScottishPremiership => "Scottish Premiership",
            League::ScottishChampionship => "Scottish Championship",
            League::ScottishLeagueOne => "Scottish League One",
            League::ScottishLeagueTwo => "Scottish League Two",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            League::PremierLeague => "premier-league",
            League::Championship => "championship",
            League::LeagueOne => "league-one",
            League::LeagueTwo => "league-two",
            League::NationalLeague => "national-league",
            League::ScottishPremiership => "scottish-premiership",
            League::ScottishChampionship => "scottish-championship",
            League::ScottishLeagueOne => "scottish-league-one",
            League::ScottishLeagueTwo => "scottish-league-two",
        }
    }

    /// Championship pages render fixtures through embedded JSON; the
    /// "versus ... kick off" text there is not reliable.
    pub fn uses_structured_json(self) -> bool {
        matches!(self, League::Championship | League::ScottishChampionship)
    }

    pub fn is_scottish(self) -> bool {
        matches!(
            self,
            League::ScottishPremiership
                | League::ScottishChampionship
                | League::ScottishLeagueOne
                | League::ScottishLeagueTwo
        )
    }

    /// Suffix used in cache file names: `premier_league`, `scottish_league_one`.
    pub fn file_suffix(self) -> String {
        self.name().to_lowercase().replace(' ', "_")
    }

    pub fn from_name(raw: &str) -> Option<League> {
        let wanted = raw.trim();
        League::ALL
            .into_iter()
            .find(|league| league.name().eq_ignore_ascii_case(wanted) || league.slug() == wanted)
    }

    /// League named in a heading such as "Scottish League One" or
    /// "Sky Bet Championship". When the text mentions several, the last one
    /// wins, since it sits closest to whatever follows. English names right
    /// after "Scottish" are skipped so "Scottish Championship" never reads as
    /// the English tier.
    pub fn from_heading(text: &str) -> Option<League> {
        let lower = text.to_lowercase();
        League::ALL
            .into_iter()
            .flat_map(|league| {
                let needle = league.name().to_lowercase();
                lower
                    .match_indices(&needle)
                    .map(|(pos, _)| pos)
                    .filter(|&pos| {
                        league.is_scottish() || !lower[..pos].trim_end().ends_with("scottish")
                    })
                    .map(|pos| (pos, league))
                    .collect::<Vec<_>>()
            })
            .max_by_key(|(pos, _)| *pos)
            .map(|(_, league)| league)
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    #[default]
    NotStarted,
    Live,
    Halftime,
    FirstHalf,
    Finished,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::NotStarted => "not_started",
            MatchStatus::Live => "live",
            MatchStatus::Halftime => "halftime",
            MatchStatus::FirstHalf => "first_half",
            MatchStatus::Finished => "finished",
        }
    }
}

/// Which page variant is being scraped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrapeMode {
    Fixtures,
    Live,
}

impl ScrapeMode {
    pub fn filter(self) -> &'static str {
        match self {
            ScrapeMode::Fixtures => "fixtures",
            ScrapeMode::Live => "results",
        }
    }
}

fn default_venue() -> String {
    DEFAULT_VENUE.to_string()
}

fn default_match_time() -> String {
    DEFAULT_MATCH_TIME.to_string()
}

/// One fixture or live snapshot as scraped. Records are never edited after
/// a scrape; a newer scrape simply produces new records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub league: League,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: String,
    #[serde(default = "default_venue")]
    pub venue: String,
    #[serde(default)]
    pub home_score: u32,
    #[serde(default)]
    pub away_score: u32,
    #[serde(default)]
    pub status: MatchStatus,
    #[serde(default = "default_match_time")]
    pub match_time: String,
}

impl MatchRecord {
    pub fn fixture(
        league: League,
        home_team: impl Into<String>,
        away_team: impl Into<String>,
        kickoff: impl Into<String>,
    ) -> Self {
        Self {
            league,
            home_team: home_team.into(),
            away_team: away_team.into(),
            kickoff: kickoff.into(),
            venue: default_venue(),
            home_score: 0,
            away_score: 0,
            status: MatchStatus::NotStarted,
            match_time: default_match_time(),
        }
    }

    pub fn with_score(
        mut self,
        home: u32,
        away: u32,
        status: MatchStatus,
        match_time: &str,
    ) -> Self {
        self.home_score = home;
        self.away_score = away;
        self.status = status;
        self.match_time = match_time.to_string();
        self
    }

    pub fn with_venue(mut self, venue: impl Into<String>) -> Self {
        self.venue = venue.into();
        self
    }

    pub fn btts(&self) -> bool {
        self.home_score > 0 && self.away_score > 0
    }

    pub fn is_three_pm(&self) -> bool {
        self.kickoff == THREE_PM
    }

    pub fn dedup_key(&self) -> (String, String, String) {
        (
            self.home_team.clone(),
            self.away_team.clone(),
            self.kickoff.clone(),
        )
    }
}

/// Drops later duplicates of the same (home, away, kickoff), keeping order.
pub fn dedupe(records: Vec<MatchRecord>) -> Vec<MatchRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.dedup_key()))
        .collect()
}

/// Resolves which physical match a record or selection refers to. Names are
/// the only identity the upstream site offers; swapping this trait out is the
/// seam for a stable id if one ever appears.
pub trait MatchIdentity: Send + Sync {
    fn match_id(&self, league: Option<League>, home_team: &str, away_team: &str) -> String;

    fn same_fixture(&self, home_team: &str, away_team: &str, record: &MatchRecord) -> bool;

    fn record_id(&self, record: &MatchRecord) -> String {
        self.match_id(Some(record.league), &record.home_team, &record.away_team)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NameIdentity;

impl MatchIdentity for NameIdentity {
    fn match_id(&self, league: Option<League>, home_team: &str, away_team: &str) -> String {
        let league = league.map(League::name).unwrap_or("Unknown");
        format!("{league}_{home_team}_{away_team}")
    }

    fn same_fixture(&self, home_team: &str, away_team: &str, record: &MatchRecord) -> bool {
        record.home_team == home_team && record.away_team == away_team
    }
}
