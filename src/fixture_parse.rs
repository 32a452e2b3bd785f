use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::match_record::{DEFAULT_VENUE, MatchRecord, ScrapeMode, THREE_PM, dedupe};
use crate::source_parser::{
    Attribution, clean_team_name, collapse_whitespace, container_kickoff, is_script_text,
    match_container, normalize_kickoff,
};

static VERSUS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(.+?)\s+versus\s+(.+?)\s+kick off\s+(\d{1,2}:\d{2})")
        .expect("versus regex")
});
static VENUE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"span[class*="Venue"], span[class*="venue"], span[class*="stadium"]"#)
        .expect("venue selector")
});

/// Scans every text node for "<home> versus <away> kick off HH:MM".
/// In fixtures mode anything not kicking off at 15:00 is dropped.
pub fn parse_versus_fixtures(
    document: &Html,
    mode: ScrapeMode,
    attribution: &Attribution<'_>,
) -> Vec<MatchRecord> {
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
        if let Some(record) = versus_record(&text, anchor, mode, attribution) {
            records.push(record);
        }
    }
    dedupe(records)
}

fn versus_record(
    text: &str,
    anchor: ElementRef<'_>,
    mode: ScrapeMode,
    attribution: &Attribution<'_>,
) -> Option<MatchRecord> {
    let caps = VERSUS_RE.captures(text)?;
    let home = clean_team_name(caps.get(1)?.as_str());
    let away = clean_team_name(caps.get(2)?.as_str());
    let (Some(home), Some(away)) = (home, away) else {
        debug!(text, "team name out of bounds");
        return None;
    };

    let container = match_container(anchor);
    let kickoff = caps
        .get(3)
        .and_then(|m| normalize_kickoff(m.as_str()))
        .or_else(|| container_kickoff(container))?;
    if mode == ScrapeMode::Fixtures && kickoff != THREE_PM {
        return None;
    }

    let Some(league) = attribution.resolve(anchor) else {
        debug!(home, away, "could not attribute league");
        return None;
    };

    let venue = container
        .select(&VENUE_SELECTOR)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_VENUE.to_string());

    Some(MatchRecord::fixture(league, home, away, kickoff).with_venue(venue))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::league_classifier::DomWalkClassifier;
    use crate::match_record::League;

    const PAGE: &str = r#"<html><body>
        <h2>Premier League</h2>
        <ul>
          <li><div class="ssrcss-fixture"><span class="visually-hidden">Arsenal versus Chelsea kick off 15:00</span><time class="ssrcss-StyledTime">15:00</time><span class="ssrcss-Venue">Emirates Stadium</span></div></li>
          <li><div class="ssrcss-fixture"><span>Everton versus Fulham kick off 17:30</span><time class="ssrcss-StyledTime">17:30</time></div></li>
          <li><div class="ssrcss-fixture"><span>Arsenal versus Chelsea kick off 15:00</span><time>15:00</time></div></li>
        </ul>
        <h2>League Two</h2>
        <ul><li><div><span>Bromley versus Walsall kick off 3:00</span></div></li></ul>
        <script>var x = "Spurs versus Leeds kick off 15:00";</script>
    </body></html>"#;

    #[test]
    fn keeps_only_three_pm_fixtures() {
        let doc = Html::parse_document(PAGE);
        let records = parse_versus_fixtures(
            &doc,
            ScrapeMode::Fixtures,
            &Attribution::Fixed(League::PremierLeague),
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].home_team, "Arsenal");
        assert_eq!(records[0].away_team, "Chelsea");
        assert_eq!(records[0].venue, "Emirates Stadium");
    }

    #[test]
    fn live_mode_keeps_every_kickoff() {
        let doc = Html::parse_document(PAGE);
        let classifier = DomWalkClassifier::default();
        let records =
            parse_versus_fixtures(&doc, ScrapeMode::Live, &Attribution::Classified(&classifier));
        let kickoffs: Vec<_> = records.iter().map(|r| r.kickoff.as_str()).collect();
        assert_eq!(kickoffs, vec!["15:00", "17:30", "03:00"]);
        assert_eq!(records[2].league, League::LeagueTwo);
        assert_eq!(records[1].venue, "TBC");
    }

    #[test]
    fn neighbouring_time_does_not_leak_into_a_fixture() {
        let html = r#"<ul>
            <li>Everton versus Fulham kick off 17:30</li>
            <li>Arsenal versus Chelsea kick off 15:00<time>15:00</time></li>
        </ul>"#;
        let doc = Html::parse_document(html);
        let records = parse_versus_fixtures(
            &doc,
            ScrapeMode::Fixtures,
            &Attribution::Fixed(League::PremierLeague),
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].home_team, "Arsenal");
    }

    #[test]
    fn own_text_kickoff_wins_over_stray_time_element() {
        let html =
            r#"<div><span>Everton versus Fulham kick off 17:30</span><time>15:00</time></div>"#;
        let doc = Html::parse_document(html);
        let records = parse_versus_fixtures(
            &doc,
            ScrapeMode::Live,
            &Attribution::Fixed(League::PremierLeague),
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kickoff, "17:30");
    }

    #[test]
    fn rejects_oversized_team_names() {
        let long = "x".repeat(60);
        let html = format!("<p>{long} versus Chelsea kick off 15:00</p>");
        let doc = Html::parse_document(&html);
        let records = parse_versus_fixtures(
            &doc,
            ScrapeMode::Fixtures,
            &Attribution::Fixed(League::PremierLeague),
        );
        assert!(records.is_empty());
    }
}
