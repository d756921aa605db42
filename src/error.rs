use thiserror::Error;

/// Failure while talking to the ranking or detail endpoint.
///
/// Transient failures (network, 5xx) are worth retrying; schema failures
/// (unexpected status, malformed body) mean the upstream contract changed
/// and retrying would only repeat the same answer.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transient network failure: {0}")]
    Transient(String),

    #[error("upstream schema violation: {0}")]
    Schema(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// One or more of the four detail fields could not be located on the
/// detail page. Names in `missing` are record field names (`carModel`,
/// `energyType`, `marketTime`, `insure`), not page anchors.
#[derive(Debug, Error)]
#[error("series {series_id}: missing detail field(s) {missing:?}")]
pub struct PartialExtractionError {
    pub series_id: u64,
    pub missing: Vec<&'static str>,
}

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("cursor store {path} is unreadable: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cursor store {path} is corrupt: last line {line:?} is not an integer")]
    Corrupt { path: String, line: String },

    #[error("cursor store {path} is unwritable: {source}")]
    Unwritable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// The durable sink rejected an append. Fatal for the crawl loop: the
/// cursor must not advance past records that were never persisted.
#[derive(Debug, Error)]
#[error("durable sink {path}: {source}")]
pub struct StorageWriteError {
    pub path: String,
    #[source]
    pub source: csv::Error,
}

/// Top-level crawl loop failure.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Cursor(#[from] CursorError),

    #[error(transparent)]
    Storage(#[from] StorageWriteError),

    #[error("retry budget exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: FetchError },
}
