use thiserror::Error;

/// Failure to obtain a page from the upstream site.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build http client: {0}")]
    Client(String),
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("http {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("failed reading body from {url}: {reason}")]
    Body { url: String, reason: String },
}

/// Failure to turn a fetched page into match records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("page body was empty")]
    EmptyPage,
    #[error("no matches found on page")]
    NoMatches,
    #[error("embedded json block could not be decoded: {0}")]
    InvalidJson(String),
}

/// A batch of records that must not reach the cache.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("payload is not a list")]
    NotAList,
    #[error("item {index} is not a mapping")]
    NotAMapping { index: usize },
    #[error("item {index} is missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },
    #[error("item {index} field `{field}` is empty or not a string")]
    EmptyField { index: usize, field: &'static str },
    #[error("item {index} field `{field}` carries {count} markup characters")]
    MarkupLeak {
        index: usize,
        field: String,
        count: usize,
    },
    #[error("item {index} field `{field}` is {len} characters long")]
    Oversized {
        index: usize,
        field: String,
        len: usize,
    },
    #[error("item {index} kickoff `{kickoff}` is not allowed here")]
    Kickoff { index: usize, kickoff: String },
}

/// Rejections surfaced to whoever is editing the weekly selections.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("unknown selector: {0}")]
    UnknownSelector(String),
    #[error("match {match_id} already assigned to {selector}")]
    MatchAlreadyAssigned { match_id: String, selector: String },
    #[error("selector {0} has no assigned match")]
    NoAssignment(String),
    #[error("match {0} not found")]
    MatchNotFound(String),
    #[error("selection for {selector} is missing `{field}`")]
    MissingField {
        selector: String,
        field: &'static str,
    },
    #[error("prediction `{prediction}` for {selector} is not recognised")]
    InvalidPrediction {
        selector: String,
        prediction: String,
    },
    #[error("confidence {confidence} for {selector} is outside 1-10")]
    InvalidConfidence { selector: String, confidence: u8 },
    #[error("invalid confirmation message")]
    ConfirmationMismatch,
    #[error("failed to save selections for week {0}")]
    Storage(String),
}

/// Why a scrape produced nothing usable.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}
