use chrono::{DateTime, NaiveDate};
use chrono_tz::Europe::London;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use crate::error::ParseError;
use crate::match_record::{
    DEFAULT_MATCH_TIME, DEFAULT_VENUE, League, MatchRecord, MatchStatus, ScrapeMode, THREE_PM,
    dedupe,
};
use crate::source_parser::clean_team_name;

static SCRIPT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script").expect("script selector"));

/// Decodes every `<script>` body that holds JSON, either raw or assigned to a
/// global (`window.__INITIAL_DATA__ = "...";`), unwrapping a JSON string
/// that itself contains JSON.
pub fn extract_json_blocks(document: &Html) -> Vec<Value> {
    let mut blocks = Vec::new();
    for script in document.select(&SCRIPT_SELECTOR) {
        let body = script.text().collect::<String>();
        let trimmed = body.trim();
        if trimmed.is_empty() {
            continue;
        }
        let candidate = if trimmed.starts_with('{') || trimmed.starts_with('[') {
            trimmed
        } else if let Some((_, rhs)) = trimmed.split_once('=') {
            rhs.trim().trim_end_matches(';').trim()
        } else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<Value>(candidate) else {
            continue;
        };
        match value {
            Value::String(inner) => {
                if let Ok(inner) = serde_json::from_str::<Value>(&inner) {
                    blocks.push(inner);
                }
            }
            other @ (Value::Object(_) | Value::Array(_)) => blocks.push(other),
            _ => {}
        }
    }
    blocks
}

/// The three layouts BBC pages have used for `eventGroups`:
/// top level, under `data.<key>.data`, and under `props.pageProps.data`.
pub fn find_event_groups(root: &Value) -> Vec<&Value> {
    let mut groups = Vec::new();
    if let Some(list) = root.get("eventGroups").and_then(Value::as_array) {
        groups.extend(list.iter());
    }
    if let Some(data) = root.get("data").and_then(Value::as_object) {
        for entry in data.values() {
            if let Some(list) = entry
                .get("data")
                .and_then(|d| d.get("eventGroups"))
                .and_then(Value::as_array)
            {
                groups.extend(list.iter());
            }
        }
    }
    if let Some(list) = root
        .pointer("/props/pageProps/data/eventGroups")
        .and_then(Value::as_array)
    {
        groups.extend(list.iter());
    }
    groups
}

/// Events inside a group, including nested `secondaryGroups`.
fn group_events(group: &Value) -> Vec<&Value> {
    let mut events: Vec<&Value> = group
        .get("events")
        .and_then(Value::as_array)
        .map(|list| list.iter().collect())
        .unwrap_or_default();
    if let Some(secondary) = group.get("secondaryGroups").and_then(Value::as_array) {
        for sub in secondary {
            if let Some(list) = sub.get("events").and_then(Value::as_array) {
                events.extend(list.iter());
            }
        }
    }
    events
}

/// Structured strategy: matches for `date` from embedded `eventGroups`.
/// With a fixed league every event is attributed to it; otherwise the
/// group label or the event's tournament name decides.
pub fn parse_structured_events(
    document: &Html,
    date: NaiveDate,
    mode: ScrapeMode,
    league: Option<League>,
) -> Result<Vec<MatchRecord>, ParseError> {
    let blocks = extract_json_blocks(document);
    let mut saw_groups = false;
    let mut records = Vec::new();
    for block in &blocks {
        for group in find_event_groups(block) {
            saw_groups = true;
            let group_league = pick_string(group, &["displayLabel", "title", "name", "label"])
                .and_then(|label| League::from_heading(&label));
            for event in group_events(group) {
                let event_league = league.or(group_league).or_else(|| {
                    event
                        .get("tournament")
                        .and_then(|t| pick_string(t, &["name", "fullName"]))
                        .and_then(|name| League::from_heading(&name))
                });
                let Some(event_league) = event_league else {
                    continue;
                };
                if let Some(record) = event_record(event, event_league, date, mode) {
                    records.push(record);
                }
            }
        }
    }
    if !saw_groups {
        return Err(ParseError::InvalidJson(format!(
            "no eventGroups in {} json block(s)",
            blocks.len()
        )));
    }
    Ok(dedupe(records))
}

fn event_record(
    event: &Value,
    league: League,
    date: NaiveDate,
    mode: ScrapeMode,
) -> Option<MatchRecord> {
    let home = clean_team_name(&pick_string(event.get("home")?, &["fullName"])?)?;
    let away = clean_team_name(&pick_string(event.get("away")?, &["fullName"])?)?;
    let start = pick_string(event, &["startDateTime"])?;
    let (local_date, kickoff) = london_kickoff(&start)?;
    if local_date != date {
        return None;
    }
    if mode == ScrapeMode::Fixtures && kickoff != THREE_PM {
        return None;
    }
    let venue = event
        .get("venue")
        .and_then(|v| pick_string(v, &["name", "displayName"]))
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_VENUE.to_string());
    let mut record = MatchRecord::fixture(league, home, away, kickoff).with_venue(venue);
    if mode == ScrapeMode::Live {
        let home_score = event.get("home").and_then(|h| pick_u32(h, &["score"]));
        let away_score = event.get("away").and_then(|a| pick_u32(a, &["score"]));
        let (status, match_time) = event_status(event);
        record = record.with_score(
            home_score.unwrap_or(0),
            away_score.unwrap_or(0),
            status,
            &match_time,
        );
    }
    debug!(
        home = %record.home_team,
        away = %record.away_team,
        league = %league,
        "structured event"
    );
    Some(record)
}

/// UTC `startDateTime` to UK local date and "HH:MM".
pub fn london_kickoff(raw: &str) -> Option<(NaiveDate, String)> {
    let parsed = DateTime::parse_from_rfc3339(raw.trim()).ok()?;
    let local = parsed.with_timezone(&London);
    Some((local.date_naive(), local.format("%H:%M").to_string()))
}

fn event_status(event: &Value) -> (MatchStatus, String) {
    let status = pick_string(event, &["status", "eventStatus"]).unwrap_or_default();
    let period = event
        .get("periodLabel")
        .and_then(|p| pick_string(p, &["value"]))
        .unwrap_or_default();
    let minutes = pick_u32(event, &["minutesElapsed"]);
    match status.as_str() {
        "PostEvent" => (MatchStatus::Finished, "FT".to_string()),
        "MidEvent" if period.eq_ignore_ascii_case("HT") => {
            (MatchStatus::Halftime, "HT".to_string())
        }
        "MidEvent" => match minutes {
            Some(m) if m <= 45 => (MatchStatus::FirstHalf, format!("{m}'")),
            Some(m) => (MatchStatus::Live, format!("{m}'")),
            None => (MatchStatus::Live, "LIVE".to_string()),
        },
        _ => (MatchStatus::NotStarted, DEFAULT_MATCH_TIME.to_string()),
    }
}

fn pick_string(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match value.get(*key) {
            Some(Value::String(s)) => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn pick_u32(value: &Value, keys: &[&str]) -> Option<u32> {
    for key in keys {
        if let Some(v) = value.get(*key) {
            if let Some(num) = v.as_u64() {
                return Some(num as u32);
            }
            if let Some(s) = v.as_str() {
                if let Ok(num) = s.trim().parse::<u32>() {
                    return Some(num);
                }
            }
        }
    }
    None
}
