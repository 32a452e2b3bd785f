use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use chrono::NaiveDate;

use acca_tracker::aggregation::status_board;
use acca_tracker::match_record::{League, MatchRecord, MatchStatus, NameIdentity, ScrapeMode};
use acca_tracker::selections::{Prediction, SELECTORS, SelectionMap, WeeklySelection};
use acca_tracker::source_parser::{PageScope, SourceParser};
use acca_tracker::validation::{KickoffRule, ValidationGate};

const UNIFIED_HTML: &str = include_str!("../tests/fixtures/bbc_unified_fixtures.html");
const LIVE_HTML: &str = include_str!("../tests/fixtures/bbc_unified_live.html");

fn saturday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 10, 19).expect("valid date")
}

/// A unified page with `sections` copies of a league block.
fn large_unified_page(sections: usize) -> String {
    let mut html = String::from("<html><body><main>");
    for i in 0..sections {
        let league = League::ALL[i % League::ALL.len()];
        if league.uses_structured_json() {
            continue;
        }
        html.push_str(&format!("<section><h2>{}</h2><ul>", league.name()));
        for j in 0..10 {
            html.push_str(&format!(
                "<li><span>Home {i} {j} versus Away {i} {j} kick off 15:00</span><time>15:00</time></li>"
            ));
        }
        html.push_str("</ul></section>");
    }
    html.push_str("</main></body></html>");
    html
}

fn bench_unified_parse(c: &mut Criterion) {
    let parser = SourceParser::default();
    c.bench_function("unified_fixtures_parse", |b| {
        b.iter(|| {
            let rows = parser
                .parse(
                    black_box(UNIFIED_HTML),
                    saturday(),
                    ScrapeMode::Fixtures,
                    PageScope::Unified,
                )
                .unwrap();
            black_box(rows.len());
        })
    });
}

fn bench_large_unified_parse(c: &mut Criterion) {
    let parser = SourceParser::default();
    let html = large_unified_page(40);
    c.bench_function("large_unified_parse", |b| {
        b.iter(|| {
            let rows = parser
                .parse(black_box(&html), saturday(), ScrapeMode::Fixtures, PageScope::Unified)
                .unwrap();
            black_box(rows.len());
        })
    });
}

fn bench_live_parse(c: &mut Criterion) {
    let parser = SourceParser::default();
    c.bench_function("unified_live_parse", |b| {
        b.iter(|| {
            let rows = parser
                .parse(black_box(LIVE_HTML), saturday(), ScrapeMode::Live, PageScope::Unified)
                .unwrap();
            black_box(rows.len());
        })
    });
}

fn bench_validation_gate(c: &mut Criterion) {
    let gate = ValidationGate::default();
    let records: Vec<MatchRecord> = (0..500)
        .map(|i| {
            MatchRecord::fixture(
                League::LeagueTwo,
                format!("Home {i}"),
                format!("Away {i}"),
                "15:00",
            )
                .with_venue("Somewhere Park")
        })
        .collect();
    c.bench_function("validation_gate", |b| {
        b.iter(|| {
            gate.validate_records(black_box(&records), KickoffRule::ThreePmOnly)
                .unwrap();
        })
    });
}

fn bench_status_board(c: &mut Criterion) {
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
                    league: Some(League::LeagueOne),
                    id: None,
                },
            )
        })
        .collect();
    let live: Vec<MatchRecord> = (0..200)
        .map(|i| {
            MatchRecord::fixture(
                League::LeagueOne,
                format!("Home {i}"),
                format!("Away {i}"),
                "15:00",
            )
                .with_score(i % 3, i % 2, MatchStatus::Live, "60'")
        })
        .collect();
    c.bench_function("status_board", |b| {
        b.iter(|| {
            let board = status_board(black_box(&selections), black_box(&live), &NameIdentity);
            black_box(board.statistics.btts_detected);
        })
    });
}

criterion_group!(
    perf,
    bench_unified_parse,
    bench_large_unified_parse,
    bench_live_parse,
    bench_validation_gate,
    bench_status_board
);
criterion_main!(perf);
