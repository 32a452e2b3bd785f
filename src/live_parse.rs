use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::debug;

use crate::match_record::{DEFAULT_MATCH_TIME, KICKOFF_TBC, MatchRecord, MatchStatus, dedupe};
use crate::source_parser::{
    Attribution, clean_team_name, collapse_whitespace, container_kickoff, is_script_text,
    match_container,
};

static SCORE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<home>\D.*?)\s+(?P<hs>\d{1,2})\s*[-–]\s*(?P<as>\d{1,2})\s+(?P<away>\D.*)$")
        .expect("score regex")
});
static VS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?P<home>.+?)\s+(?:vs\.?|v)\s+(?P<away>.+)$").expect("vs regex")
});
static FINISHED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(ft|full[\s-]?time|finished)\b").expect("finished regex"));
static HALFTIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(ht|half[\s-]?time)\b").expect("halftime regex"));
static MINUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,3})(\+\d{1,2})?\s*(?:'|’|mins?\b)").expect("minute regex")
});
static LIVE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\blive\b").expect("live regex"));

const LIVE_MATCH_TIME: &str = "LIVE";

/// Free-text live extractor: "<home> <n>-<n> <away>" or "<home> vs <away>",
/// with status read from the surrounding block's text.
pub fn parse_live_scores(document: &Html, attribution: &Attribution<'_>) -> Vec<MatchRecord> {
    let mut records = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let Some(anchor) = node.parent().and_then(ElementRef::wrap) else {
            continue;
        };
        if is_script_text(anchor) {
            continue;
        }
        let text = collapse_whitespace(text);
        if text.len() < 5 || text.to_lowercase().contains("kick off") {
            continue;
        }
        if let Some(record) = live_record(&text, anchor, attribution) {
            records.push(record);
        }
    }
    dedupe(records)
}

fn live_record(
    text: &str,
    anchor: ElementRef<'_>,
    attribution: &Attribution<'_>,
) -> Option<MatchRecord> {
    let (home, away, score) = if let Some(caps) = SCORE_RE.captures(text) {
        let hs: u32 = caps.name("hs")?.as_str().parse().ok()?;
        let aw: u32 = caps.name("as")?.as_str().parse().ok()?;
        (
            caps.name("home")?.as_str(),
            caps.name("away")?.as_str(),
            Some((hs, aw)),
        )
    } else {
        let caps = VS_RE.captures(text)?;
        (caps.name("home")?.as_str(), caps.name("away")?.as_str(), None)
    };
    let home = clean_team_name(home)?;
    let away = clean_team_name(away)?;

    let container = match_container(anchor);
    let context = collapse_whitespace(&container.text().collect::<Vec<_>>().join(" "))
        .replace(text, " ")
        .to_lowercase();
    let (status, match_time) = infer_status(&context, score.is_some());

    let Some(league) = attribution.resolve(anchor) else {
        debug!(home, away, "could not attribute league");
        return None;
    };
    let kickoff = container_kickoff(container).unwrap_or_else(|| KICKOFF_TBC.to_string());
    let (hs, aw) = score.unwrap_or((0, 0));
    Some(MatchRecord::fixture(league, home, away, kickoff).with_score(hs, aw, status, &match_time))
}

/// Reads a status out of nearby label text. Finished beats half time beats a
/// running minute; a bare score with no label is treated as in play.
pub fn infer_status(context: &str, has_score: bool) -> (MatchStatus, String) {
    let context = context.to_lowercase();
    if FINISHED_RE.is_match(&context) {
        return (MatchStatus::Finished, "FT".to_string());
    }
    if HALFTIME_RE.is_match(&context) {
        return (MatchStatus::Halftime, "HT".to_string());
    }
    if let Some(caps) = MINUTE_RE.captures(&context) {
        let minute: u32 = caps
            .get(1)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        let added = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let status = if minute <= 45 {
            MatchStatus::FirstHalf
        } else {
            MatchStatus::Live
        };
        return (status, format!("{minute}{added}'"));
    }
    if LIVE_RE.is_match(&context) || has_score {
        return (MatchStatus::Live, LIVE_MATCH_TIME.to_string());
    }
    (MatchStatus::NotStarted, DEFAULT_MATCH_TIME.to_string())
}
