use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.bbc.co.uk";

/// Runtime knobs, read from the environment after `.env.local` / `.env`
/// have been loaded. Every field has a working default.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub base_url: String,
    pub rate_limit: Duration,
    pub request_timeout: Duration,
    pub fixture_ttl_hours: i64,
    pub memory_ttl_secs: i64,
    pub selections_ttl_hours: i64,
    pub compression_threshold: usize,
    pub max_tag_chars: usize,
    pub max_field_len: usize,
    pub fallback_window_days: u32,
    pub league_search_depth: usize,
    pub backup_retention_days: i64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limit: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            fixture_ttl_hours: 72,
            memory_ttl_secs: 300,
            selections_ttl_hours: 12,
            compression_threshold: 1024 * 1024,
            max_tag_chars: 10,
            max_field_len: 1000,
            fallback_window_days: 14,
            league_search_depth: 15,
            backup_retention_days: 30,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load_dotenv() {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let rate_limit = std::env::var("ACCA_RATE_LIMIT_SECS")
            .ok()
            .and_then(|val| val.parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or(defaults.rate_limit);
        let request_timeout = env_parse::<u64>("ACCA_REQUEST_TIMEOUT_SECS")
            .map(|secs| Duration::from_secs(secs.max(1)))
            .unwrap_or(defaults.request_timeout);
        Self {
            data_dir: std::env::var("ACCA_DATA_DIR")
                .ok()
                .filter(|val| !val.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            base_url: std::env::var("ACCA_BASE_URL")
                .ok()
                .map(|val| val.trim().trim_end_matches('/').to_string())
                .filter(|val| !val.is_empty())
                .unwrap_or(defaults.base_url),
            rate_limit,
            request_timeout,
            fixture_ttl_hours: env_parse("ACCA_FIXTURE_TTL_HOURS")
                .unwrap_or(defaults.fixture_ttl_hours)
                .max(1),
            memory_ttl_secs: env_parse("ACCA_MEMORY_TTL_SECS")
                .unwrap_or(defaults.memory_ttl_secs)
                .max(0),
            selections_ttl_hours: env_parse("ACCA_SELECTIONS_TTL_HOURS")
                .unwrap_or(defaults.selections_ttl_hours)
                .max(0),
            compression_threshold: env_parse("ACCA_COMPRESSION_THRESHOLD")
                .unwrap_or(defaults.compression_threshold),
            max_tag_chars: env_parse("ACCA_MAX_TAG_CHARS").unwrap_or(defaults.max_tag_chars),
            max_field_len: env_parse("ACCA_MAX_FIELD_LEN")
                .unwrap_or(defaults.max_field_len)
                .max(1),
            fallback_window_days: env_parse("ACCA_FALLBACK_WINDOW_DAYS")
                .unwrap_or(defaults.fallback_window_days),
            league_search_depth: env_parse("ACCA_LEAGUE_SEARCH_DEPTH")
                .unwrap_or(defaults.league_search_depth)
                .max(1),
            backup_retention_days: env_parse("ACCA_BACKUP_RETENTION_DAYS")
                .unwrap_or(defaults.backup_retention_days)
                .max(0),
            log_level: std::env::var("ACCA_LOG_LEVEL")
                .ok()
                .filter(|val| !val.trim().is_empty())
                .unwrap_or(defaults.log_level),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<T>().ok())
}
