use std::time::Duration;

use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

use crate::error::FetchError;

pub const REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Shared client with the default timeout.
pub fn http_client() -> Result<&'static Client, FetchError> {
    CLIENT.get_or_try_init(|| build_client(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
}

pub fn build_client(timeout: Duration) -> Result<Client, FetchError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(DESKTOP_USER_AGENT)
        .build()
        .map_err(|err| FetchError::Client(err.to_string()))
}
