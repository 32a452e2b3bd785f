use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::ParseError;
use crate::fixture_parse::parse_versus_fixtures;
use crate::json_blocks::parse_structured_events;
use crate::league_classifier::{DomWalkClassifier, LeagueClassifier};
use crate::live_parse::parse_live_scores;
use crate::match_record::{League, MatchRecord, ScrapeMode, dedupe};

pub const MIN_TEAM_NAME_LEN: usize = 2;
pub const MAX_TEAM_NAME_LEN: usize = 50;
/// How many ancestors above a match's text node may still count as "its"
/// block when looking for the kickoff time, venue or status label.
pub const CONTAINER_LEVELS: usize = 3;

static CLOCK_TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2}):(\d{2})\b").expect("clock time regex"));
static MATCH_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\S\s+(?:\d{1,2}\s*[-–]\s*\d{1,2}|versus|vs\.?|v)\s+\S")
        .expect("match line regex")
});
static TIME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("time").expect("time selector"));

/// What a page covers: every competition on one day, or a single league.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageScope {
    Unified,
    League(League),
}

/// How parsed matches get their league.
pub enum Attribution<'a> {
    Fixed(League),
    Classified(&'a dyn LeagueClassifier),
}

impl Attribution<'_> {
    pub fn resolve(&self, anchor: ElementRef<'_>) -> Option<League> {
        match self {
            Attribution::Fixed(league) => Some(*league),
            Attribution::Classified(classifier) => classifier.classify(anchor),
        }
    }
}

/// Turns one fetched page into match records for a date and mode. Text and
/// JSON strategies are chosen per league; on the unified page both run and
/// the Championship tiers are taken from the JSON side only.
pub struct SourceParser {
    classifier: Box<dyn LeagueClassifier>,
}

impl Default for SourceParser {
    fn default() -> Self {
        Self::new(Box::new(DomWalkClassifier::default()))
    }
}

impl SourceParser {
    pub fn new(classifier: Box<dyn LeagueClassifier>) -> Self {
        Self { classifier }
    }

    pub fn parse(
        &self,
        html: &str,
        date: NaiveDate,
        mode: ScrapeMode,
        scope: PageScope,
    ) -> Result<Vec<MatchRecord>, ParseError> {
        if html.trim().is_empty() {
            return Err(ParseError::EmptyPage);
        }
        let document = Html::parse_document(html);
        let records = match scope {
            PageScope::League(league) if league.uses_structured_json() => {
                parse_structured_events(&document, date, mode, Some(league))?
            }
            PageScope::League(league) => {
                text_strategy(&document, mode, &Attribution::Fixed(league))
            }
            PageScope::Unified => {
                let attribution = Attribution::Classified(self.classifier.as_ref());
                let mut records: Vec<MatchRecord> = text_strategy(&document, mode, &attribution)
                    .into_iter()
                    .filter(|record| !record.league.uses_structured_json())
                    .collect();
                let structured = match parse_structured_events(&document, date, mode, None) {
                    Ok(found) => found,
                    Err(err) => {
                        debug!(error = %err, "no usable json on unified page");
                        Vec::new()
                    }
                };
                records.extend(
                    structured
                        .into_iter()
                        .filter(|record| record.league.uses_structured_json()),
                );
                records
            }
        };
        let records = dedupe(records);
        if records.is_empty() {
            return Err(ParseError::NoMatches);
        }
        Ok(records)
    }
}

fn text_strategy(
    document: &Html,
    mode: ScrapeMode,
    attribution: &Attribution<'_>,
) -> Vec<MatchRecord> {
    match mode {
        ScrapeMode::Fixtures => parse_versus_fixtures(document, mode, attribution),
        ScrapeMode::Live => {
            let mut records = parse_live_scores(document, attribution);
            records.extend(parse_versus_fixtures(document, mode, attribution));
            records
        }
    }
}

/// Trimmed team name, or `None` when it is out of bounds or carries markup.
pub fn clean_team_name(raw: &str) -> Option<String> {
    let name = collapse_whitespace(raw);
    let len = name.chars().count();
    if !(MIN_TEAM_NAME_LEN..=MAX_TEAM_NAME_LEN).contains(&len) {
        return None;
    }
    if name.contains('<') || name.contains('>') {
        return None;
    }
    if name.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(name)
}

pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `"3:00"` → `"03:00"`; anything that is not a valid clock time is `None`.
pub fn normalize_kickoff(raw: &str) -> Option<String> {
    let caps = CLOCK_TIME_RE.captures(raw)?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(2)?.as_str().parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(format!("{hour:02}:{minute:02}"))
}

/// The largest block around a match's text (at most `CONTAINER_LEVELS`
/// above the anchor) that holds no other match line. Sibling fixtures in a
/// shared list therefore never lend each other times or status labels.
pub fn match_container(anchor: ElementRef<'_>) -> ElementRef<'_> {
    let mut container = anchor;
    for _ in 0..CONTAINER_LEVELS {
        let Some(parent) = container.parent().and_then(ElementRef::wrap) else {
            break;
        };
        if match_lines_under(parent) > 1 {
            break;
        }
        container = parent;
    }
    container
}

/// True for text that reads like one fixture or result line.
pub fn is_match_line(text: &str) -> bool {
    MATCH_LINE_RE.is_match(text)
}

fn match_lines_under(element: ElementRef<'_>) -> usize {
    element
        .descendants()
        .filter(|node| {
            node.parent()
                .and_then(ElementRef::wrap)
                .is_some_and(|parent| !is_script_text(parent))
        })
        .filter_map(|node| node.value().as_text())
        .filter(|text| is_match_line(&collapse_whitespace(text)))
        .take(2)
        .count()
}

pub fn container_kickoff(container: ElementRef<'_>) -> Option<String> {
    container
        .select(&TIME_SELECTOR)
        .find_map(|time| normalize_kickoff(&time.text().collect::<String>()))
}

pub fn is_script_text(anchor: ElementRef<'_>) -> bool {
    matches!(anchor.value().name(), "script" | "style" | "noscript" | "template")
}
