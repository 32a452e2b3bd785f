use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use acca_tracker::aggregation::{btts_summary, status_board};
use acca_tracker::backup::{backup_data, cleanup_old_backups, storage_stats};
use acca_tracker::bbc_scraper::BbcScraper;
use acca_tracker::cache_store::{CacheSettings, CacheStore};
use acca_tracker::clock::SystemClock;
use acca_tracker::config::Config;
use acca_tracker::fetch::HttpPageSource;
use acca_tracker::live_results::LiveResultsLog;
use acca_tracker::logging;
use acca_tracker::match_record::{League, NameIdentity};
use acca_tracker::prediction_week::parse_week;
use acca_tracker::selections::{DEFAULT_CONFIDENCE, SelectionManager};
use acca_tracker::selectors_league::{SelectorsLeague, ViewFilter};

const USAGE: &str = "usage: acca_tracker <command> [args]

commands:
  week                               fixtures for the current prediction week
  fixtures [YYYY-MM-DD]              3pm fixtures for a date
  saturday                           3pm fixtures for the coming Saturday
  league <name> [YYYY-MM-DD]         one league's fixtures
  live [YYYY-MM-DD]                  latest scores
  selections                         this week's selections
  available                          unpicked 3pm matches with their ids
  assign <selector> <match_id>       give a selector a match
  unassign <selector>                remove a selector's match
  predict <selector> <BTTS|...> [n]  set prediction and confidence
  confirm-override <phrase...>       proceed with fewer than 8 selections
  status [YYYY-MM-DD]                status board from live scores
  summary [YYYY-MM-DD]               BTTS accumulator summary
  table [overall|this-season|recent] selectors league table
  backup                             back up data and prune old backups
  cleanup-results [days]             drop old live results
  sweep                              remove corrupted cache files
  clear-cache                        remove every fixture cache file
  optimize                           prune expired memory entries and idle locks
  stats                              cache and storage statistics";

struct App {
    config: Config,
    store: Arc<CacheStore>,
    scraper: Arc<BbcScraper>,
    selections: SelectionManager,
}

impl App {
    fn build(config: Config) -> Result<Self> {
        let store = Arc::new(CacheStore::open(
            config.data_dir.clone(),
            Arc::new(SystemClock),
            CacheSettings::from_config(&config),
        ));
        store
            .paths()
            .ensure()
            .context("unable to create data directories")?;
        let swept = store.sweep_corrupted();
        if swept > 0 {
            warn!(swept, "removed corrupted cache files at startup");
        }
        let source = HttpPageSource::new(&config).context("unable to build http client")?;
        let scraper = Arc::new(BbcScraper::new(Arc::new(source), Arc::clone(&store), &config));
        let selections = SelectionManager::new(Arc::clone(&store), scraper.clone());
        Ok(Self {
            config,
            store,
            scraper,
            selections,
        })
    }

    fn today(&self) -> NaiveDate {
        self.store.now().date()
    }
}

fn main() -> Result<()> {
    Config::load_dotenv();
    let config = Config::from_env();
    logging::init(&config.log_level);

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let Some(command) = args.first() else {
        println!("{USAGE}");
        return Ok(());
    };
    if command == "help" || command == "--help" || command == "-h" {
        println!("{USAGE}");
        return Ok(());
    }
    let rest = &args[1..];

    let app = App::build(config)?;
    info!(command = %command, "running command");
    match command.as_str() {
        "week" => print_json(&app.scraper.fixtures_for_week()),
        "fixtures" => {
            let date = date_arg(rest.first(), app.today())?;
            print_json(&app.scraper.get_fixtures(date))
        }
        "saturday" => print_json(&app.scraper.scrape_saturday_3pm_fixtures()),
        "league" => {
            let name = rest.first().ok_or_else(|| anyhow!("league name required"))?;
            let league =
                League::from_name(name).ok_or_else(|| anyhow!("unknown league: {name}"))?;
            let date = date_arg(rest.get(1), app.today())?;
            print_json(&app.scraper.scrape_league(league, date))
        }
        "live" => {
            let date = date_arg(rest.first(), app.today())?;
            print_json(&app.scraper.scrape_live(date))
        }
        "selections" => {
            let week = app.selections.current_week();
            print_json(&json!({
                "week": week.to_string(),
                "selections": app.selections.load_for(week),
                "unassigned": app.selections.unassigned_selectors(),
                "ready": app.selections.is_ready(),
            }))
        }
        "available" => {
            let matches = app
                .selections
                .available_matches()
                .into_iter()
                .map(|(id, record)| json!({ "id": id, "match": record }))
                .collect::<Vec<_>>();
            print_json(&matches)
        }
        "assign" => {
            let (selector, match_id) = match rest {
                [selector, match_id, ..] => (selector, match_id),
                _ => return Err(anyhow!("usage: assign <selector> <match_id>")),
            };
            let selection = app.selections.assign(selector, match_id)?;
            print_json(&selection)
        }
        "unassign" => {
            let selector = rest
                .first()
                .ok_or_else(|| anyhow!("usage: unassign <selector>"))?;
            print_json(&app.selections.unassign(selector)?)
        }
        "predict" => {
            let (selector, prediction) = match rest {
                [selector, prediction, ..] => (selector, prediction),
                _ => return Err(anyhow!("usage: predict <selector> <prediction> [confidence]")),
            };
            let confidence = match rest.get(2) {
                Some(raw) => raw
                    .parse::<u8>()
                    .with_context(|| format!("invalid confidence: {raw}"))?,
                None => DEFAULT_CONFIDENCE,
            };
            print_json(
                &app.selections
                    .update_prediction(selector, prediction, confidence)?,
            )
        }
        "confirm-override" => {
            app.selections.confirm_override(&rest.join(" "))?;
            println!("override confirmed");
            Ok(())
        }
        "status" => {
            let (selections, live) = live_view(&app, rest.first())?;
            print_json(&status_board(&selections, &live, &NameIdentity))
        }
        "summary" => {
            let (selections, live) = live_view(&app, rest.first())?;
            print_json(&btts_summary(&selections, &live, &NameIdentity))
        }
        "table" => {
            let filter = rest
                .first()
                .map(|raw| ViewFilter::parse(raw))
                .unwrap_or_default();
            let league = SelectorsLeague::new(Arc::clone(&app.store));
            print_json(&league.calculate(filter))
        }
        "backup" => {
            let now = app.store.now();
            let path = backup_data(app.store.paths(), now)?;
            let removed =
                cleanup_old_backups(app.store.paths(), now, app.config.backup_retention_days)?;
            print_json(&json!({ "backup": path.display().to_string(), "removed": removed }))
        }
        "cleanup-results" => {
            let days = match rest.first() {
                Some(raw) => raw
                    .parse::<i64>()
                    .with_context(|| format!("invalid day count: {raw}"))?,
                None => app.config.backup_retention_days,
            };
            let log = LiveResultsLog::new(Arc::clone(&app.store));
            print_json(&json!({ "removed": log.cleanup_older_than(days) }))
        }
        "sweep" => print_json(&json!({ "removed": app.store.sweep_corrupted() })),
        "clear-cache" => print_json(&json!({ "removed": app.scraper.clear_fixture_cache() })),
        "optimize" => {
            let (expired, locks) = app.store.optimize();
            print_json(&json!({ "expired_entries": expired, "released_locks": locks }))
        }
        "stats" => print_json(&json!({
            "cache": app.store.performance_stats(),
            "storage": storage_stats(app.store.paths()),
        })),
        other => Err(anyhow!("unknown command: {other}\n\n{USAGE}")),
    }
}

/// Current week's selections plus live scores for `date` (defaults to the
/// prediction week). Finished selected matches are logged on the way.
fn live_view(
    app: &App,
    date: Option<&String>,
) -> Result<(acca_tracker::selections::SelectionMap, Vec<acca_tracker::match_record::MatchRecord>)>
{
    let week = app.selections.current_week();
    let date = date_arg(date, week)?;
    let selections = app.selections.load_for(week);
    let live = app.scraper.scrape_live(date);
    if live.is_degraded() {
        warn!(date = %date, origin = ?live.origin, "live scores are not fresh");
    }
    let logged = LiveResultsLog::new(Arc::clone(&app.store)).record_finished(
        &selections,
        &live.matches,
        &NameIdentity,
    );
    if logged > 0 {
        info!(logged, "recorded finished results");
    }
    Ok((selections, live.matches))
}

fn date_arg(raw: Option<&String>, default: NaiveDate) -> Result<NaiveDate> {
    match raw {
        Some(raw) => {
            parse_week(raw).ok_or_else(|| anyhow!("invalid date: {raw} (want YYYY-MM-DD)"))
        }
        None => Ok(default),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("unable to serialize output")?;
    println!("{out}");
    Ok(())
}
