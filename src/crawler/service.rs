use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::config::Config;
use crate::crawler::cursor::CursorStore;
use crate::crawler::fetcher::CarSource;
use crate::crawler::models::{CarRecord, ListingSummary};
use crate::crawler::parser;
use crate::error::{FetchError, PartialExtractionError, ScrapeError};
use crate::storage::sink::CsvSink;

/// What happened on one page, for the operator's per-page summary.
#[derive(Debug)]
pub struct PageSummary {
    pub offset: u32,
    pub attempted: usize,
    pub persisted: usize,
    pub failed: Vec<PartialExtractionError>,
}

/// How a run ends when it doesn't fail: only by an operator stop,
/// honored between iterations. The upstream API has no end-of-data
/// signal, so the loop itself never concludes on its own.
#[derive(Debug, PartialEq, Eq)]
pub enum CrawlEnd {
    Terminated,
}

enum State {
    Idle,
    FetchingPage {
        offset: u32,
    },
    FetchingDetails {
        offset: u32,
        listings: Vec<ListingSummary>,
    },
    Persisting {
        records: Vec<CarRecord>,
        summary: PageSummary,
    },
    Advancing {
        summary: PageSummary,
    },
}

/// Drives the crawl: read the cursor, fetch a page, fetch details per
/// listing, persist whatever assembled, advance the cursor by the page
/// size, repeat. Per-listing extraction failures are recorded and
/// skipped; fetch and storage failures stop the run before the cursor
/// moves past unpersisted work.
pub struct CrawlService<S: CarSource> {
    cfg: Config,
    source: S,
    cursor: CursorStore,
    sink: CsvSink,
    stop: watch::Receiver<bool>,
    last_summary: Option<PageSummary>,
}

impl<S: CarSource> CrawlService<S> {
    pub fn new(cfg: Config, source: S, stop: watch::Receiver<bool>) -> Self {
        let cursor = CursorStore::new(&cfg.cursor_path);
        let sink = CsvSink::new(&cfg.sink_path);
        Self {
            cfg,
            source,
            cursor,
            sink,
            stop,
            last_summary: None,
        }
    }

    /// Summary of the most recently completed page, if any.
    pub fn last_summary(&self) -> Option<&PageSummary> {
        self.last_summary.as_ref()
    }

    pub async fn run(&mut self) -> Result<CrawlEnd, ScrapeError> {
        let mut state = State::Idle;

        loop {
            state = match state {
                State::Idle => State::FetchingPage {
                    offset: self.cursor.read_cursor()?,
                },

                State::FetchingPage { offset } => {
                    info!(offset, "Fetching ranking page");
                    let listings = self.fetch_page_with_retry(offset).await?;
                    info!(offset, count = listings.len(), "Ranking page decoded");
                    State::FetchingDetails { offset, listings }
                }

                State::FetchingDetails { offset, listings } => {
                    let mut summary = PageSummary {
                        offset,
                        attempted: listings.len(),
                        persisted: 0,
                        failed: Vec::new(),
                    };
                    let mut records = Vec::with_capacity(listings.len());

                    for listing in &listings {
                        match self.fetch_and_assemble(listing).await? {
                            Ok(record) => records.push(record),
                            Err(e) => {
                                warn!(
                                    series_id = e.series_id,
                                    missing = ?e.missing,
                                    "Detail extraction incomplete; skipping listing"
                                );
                                summary.failed.push(e);
                            }
                        }

                        // polite delay between detail requests
                        sleep(Duration::from_millis(self.cfg.delay_ms)).await;
                    }

                    State::Persisting { records, summary }
                }

                State::Persisting {
                    records,
                    mut summary,
                } => {
                    self.sink.append_records(&records)?;
                    summary.persisted = records.len();
                    State::Advancing { summary }
                }

                State::Advancing { summary } => {
                    let next = self.cursor.advance(self.cfg.page_size)?;
                    info!(
                        offset = summary.offset,
                        attempted = summary.attempted,
                        persisted = summary.persisted,
                        failed = summary.failed.len(),
                        next_offset = next,
                        "Page complete"
                    );
                    self.last_summary = Some(summary);

                    if *self.stop.borrow() {
                        info!("Stop signal received; terminating between pages");
                        return Ok(CrawlEnd::Terminated);
                    }

                    // polite delay between pages
                    sleep(Duration::from_millis(self.cfg.delay_ms)).await;
                    State::FetchingPage { offset: next }
                }
            };
        }
    }

    async fn fetch_page_with_retry(
        &self,
        offset: u32,
    ) -> Result<Vec<ListingSummary>, ScrapeError> {
        let mut attempts = 0u32;
        loop {
            match self.source.fetch_page(offset).await {
                Ok(listings) => return Ok(listings),
                Err(e) if e.is_transient() && attempts < self.cfg.max_retries => {
                    attempts += 1;
                    let backoff = self.backoff(attempts);
                    warn!(
                        offset,
                        attempt = attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Transient failure fetching page; backing off"
                    );
                    sleep(backoff).await;
                }
                Err(e) if e.is_transient() => {
                    return Err(ScrapeError::RetriesExhausted {
                        attempts: attempts + 1,
                        last: e,
                    })
                }
                Err(e) => return Err(ScrapeError::Fetch(e)),
            }
        }
    }

    /// Fetch one listing's detail page and assemble the record. The outer
    /// result is loop-fatal (transient budget exhausted, schema break);
    /// the inner one is the per-listing extraction outcome.
    async fn fetch_and_assemble(
        &self,
        listing: &ListingSummary,
    ) -> Result<Result<CarRecord, PartialExtractionError>, ScrapeError> {
        let html = self.fetch_detail_with_retry(listing.series_id).await?;

        Ok(parser::extract_detail_fields(&html, listing.series_id)
            .map(|details| CarRecord::assemble(listing, details)))
    }

    async fn fetch_detail_with_retry(&self, series_id: u64) -> Result<String, ScrapeError> {
        let mut attempts = 0u32;
        loop {
            match self.source.fetch_detail(series_id).await {
                Ok(html) => return Ok(html),
                Err(e) if e.is_transient() && attempts < self.cfg.max_retries => {
                    attempts += 1;
                    let backoff = self.backoff(attempts);
                    warn!(
                        series_id,
                        attempt = attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Transient failure fetching detail page; backing off"
                    );
                    sleep(backoff).await;
                }
                Err(e) if e.is_transient() => {
                    return Err(ScrapeError::RetriesExhausted {
                        attempts: attempts + 1,
                        last: e,
                    })
                }
                Err(e) => return Err(ScrapeError::Fetch(e)),
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.cfg.backoff_base_ms << (attempt - 1).min(6))
    }
}
