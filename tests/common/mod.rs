#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};

use acca_tracker::cache_store::{CacheSettings, CacheStore};
use acca_tracker::clock::FixedClock;
use acca_tracker::error::FetchError;
use acca_tracker::fetch::PageSource;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Fresh empty directory under the system temp dir.
pub fn temp_dir(label: &str) -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    let mut path = std::env::temp_dir();
    path.push(format!("acca_tracker_{label}_{}_{n}", std::process::id()));
    let _ = fs::remove_dir_all(&path);
    fs::create_dir_all(&path).expect("temp dir should be creatable");
    path
}

pub fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
}

pub fn at(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M").expect("valid datetime")
}

pub fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

pub fn store_at(
    label: &str,
    now: &str,
    settings: CacheSettings,
) -> (Arc<CacheStore>, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(at(now)));
    let store = Arc::new(CacheStore::open(temp_dir(label), clock.clone(), settings));
    (store, clock)
}

/// Serves canned bodies by URL; anything unknown is a transport failure.
#[derive(Default)]
pub struct FakePageSource {
    pages: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<String>>,
}

impl FakePageSource {
    pub fn serve(&self, url: &str, body: &str) {
        self.pages
            .lock()
            .expect("pages lock")
            .insert(url.to_string(), body.to_string());
    }

    pub fn go_offline(&self) {
        self.pages.lock().expect("pages lock").clear();
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl PageSource for FakePageSource {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(url.to_string());
        self.pages
            .lock()
            .expect("pages lock")
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Transport {
                url: url.to_string(),
                reason: "offline".to_string(),
            })
    }
}
