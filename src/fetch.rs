use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use tracing::{debug, warn};

use crate::config::{Config, DEFAULT_BASE_URL};
use crate::error::FetchError;
use crate::http_client::{REQUEST_TIMEOUT_SECS, build_client, http_client};
use crate::match_record::{League, ScrapeMode};

/// Anything that can hand back the markup behind a URL.
pub trait PageSource: Send + Sync {
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Global minimum spacing between outbound requests. The lock is held while
/// sleeping so concurrent callers queue behind each other.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Blocks until the interval since the previous request has elapsed and
    /// returns how long it slept.
    pub fn wait(&self) -> Duration {
        let mut last = self.last_request.lock().unwrap_or_else(|p| p.into_inner());
        let mut slept = Duration::ZERO;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                slept = self.min_interval - elapsed;
                thread::sleep(slept);
            }
        }
        *last = Some(Instant::now());
        slept
    }
}

/// Real network source: one blocking GET per call, no retries.
pub struct HttpPageSource {
    client: Client,
    limiter: RateLimiter,
}

impl HttpPageSource {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = if config.request_timeout == Duration::from_secs(REQUEST_TIMEOUT_SECS) {
            http_client()?.clone()
        } else {
            build_client(config.request_timeout)?
        };
        Ok(Self {
            client,
            limiter: RateLimiter::new(config.rate_limit),
        })
    }
}

impl PageSource for HttpPageSource {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let slept = self.limiter.wait();
        if !slept.is_zero() {
            debug!(url, slept_ms = slept.as_millis() as u64, "rate limited");
        }
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "en-GB,en;q=0.9")
            .send()
            .map_err(|err| FetchError::Transport {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
        let status = resp.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "upstream returned error status");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().map_err(|err| FetchError::Body {
            url: url.to_string(),
            reason: err.to_string(),
        })
    }
}

/// Builds date- and league-scoped BBC Sport URLs.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    base_url: String,
}

impl Default for UrlBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl UrlBuilder {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// All competitions for one day on a single page.
    pub fn unified(&self, date: NaiveDate, mode: ScrapeMode) -> String {
        let mut url = format!(
            "{}/sport/football/scores-fixtures/{}",
            self.base_url,
            date.format("%Y-%m-%d")
        );
        if mode == ScrapeMode::Live {
            url.push_str("?filter=results");
        }
        url
    }

    /// One competition's month page.
    pub fn league(&self, league: League, date: NaiveDate, mode: ScrapeMode) -> String {
        format!(
            "{}/sport/football/{}/scores-fixtures/{}?filter={}",
            self.base_url,
            league.slug(),
            date.format("%Y-%m"),
            mode.filter()
        )
    }
}
