pub mod aggregation;
pub mod backup;
pub mod bbc_scraper;
pub mod cache_store;
pub mod clock;
pub mod config;
pub mod error;
pub mod fetch;
pub mod fixture_parse;
pub mod http_client;
pub mod json_blocks;
pub mod league_classifier;
pub mod live_parse;
pub mod live_results;
pub mod logging;
pub mod match_record;
pub mod prediction_week;
pub mod selections;
pub mod selectors_league;
pub mod source_parser;
pub mod validation;
