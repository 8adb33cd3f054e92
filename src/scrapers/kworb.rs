use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use tracing::{debug, error, info, warn};

use crate::error::ScrapeError;
use crate::models::Track;
use crate::scrapers::browser::ChromeLauncher;
use crate::scrapers::extract::{page_title, parse_stream_table};
use crate::scrapers::http::HttpFetcher;
use crate::scrapers::locators::LocatorChain;
use crate::scrapers::traits::{PageDriver, SessionFactory};
use crate::scrapers::types::{Engine, ScrapeOptions, ScrapeResult, TrackReport};

/// Scrapes per-track streaming history from KWORB with bounded retries
pub struct KworbScraper {
    sessions: Box<dyn SessionFactory>,
    options: ScrapeOptions,
    table_locators: LocatorChain,
    link_locators: LocatorChain,
}

impl KworbScraper {
    /// Create a scraper backed by the engine named in `options`
    pub fn from_options(options: ScrapeOptions) -> Result<Self, ScrapeError> {
        let sessions: Box<dyn SessionFactory> = match options.engine {
            Engine::Browser => Box::new(ChromeLauncher::new(options.headless, options.timeout())),
            Engine::Http => Box::new(HttpFetcher::new(options.timeout())?),
        };
        Ok(Self::new(sessions, options))
    }

    /// Create a scraper over any session factory
    pub fn new(sessions: Box<dyn SessionFactory>, options: ScrapeOptions) -> Self {
        Self {
            sessions,
            options,
            table_locators: LocatorChain::streams_table(),
            link_locators: LocatorChain::streams_link(),
        }
    }

    /// Run the retry loop for one track.
    ///
    /// Makes at most `retry_count + 1` attempts, each in a fresh session, and
    /// stops at the first success.
    pub fn scrape_track(&self, track: &Track) -> TrackReport {
        info!(
            track = %track.id(),
            name = track.name(),
            engine = self.sessions.engine_name(),
            "Processing track"
        );

        let max_attempts = self.options.retry_count.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = self.attempt(track);

            match &result {
                Ok(table) => {
                    info!(
                        track = %track.id(),
                        attempt,
                        rows = table.rows.len(),
                        "✅ attempt succeeded"
                    );
                    let track = match &table.title {
                        Some(title) if track.has_placeholder_name() => track.renamed(title.clone()),
                        _ => track.clone(),
                    };
                    return TrackReport {
                        track,
                        attempts: attempt,
                        result,
                    };
                }
                Err(e) => {
                    warn!(
                        track = %track.id(),
                        attempt,
                        kind = %e.kind(),
                        error = %e,
                        "attempt failed"
                    );
                    if attempt >= max_attempts {
                        error!(
                            track = %track.id(),
                            attempts = attempt,
                            kind = %e.kind(),
                            "❌ giving up on track"
                        );
                        return TrackReport {
                            track: track.clone(),
                            attempts: attempt,
                            result,
                        };
                    }
                    if e.is_session_fatal() {
                        info!(track = %track.id(), "session crashed, next attempt gets a new browser");
                    }
                }
            }

            let delay = self.options.delay_after(attempt - 1);
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
    }

    /// Scrape every track. A failing track never stops the others.
    ///
    /// With `workers > 1` tracks are spread over scoped threads, each opening
    /// its own sessions. Reports come back in input order.
    pub fn scrape_all(&self, tracks: &[Track]) -> Vec<TrackReport> {
        let workers = self.options.workers.clamp(1, tracks.len().max(1));

        let reports: Vec<TrackReport> = if workers == 1 {
            tracks.iter().map(|t| self.scrape_track(t)).collect()
        } else {
            let next = AtomicUsize::new(0);
            let collected: Mutex<Vec<(usize, TrackReport)>> = Mutex::new(Vec::with_capacity(tracks.len()));

            thread::scope(|scope| {
                for _ in 0..workers {
                    scope.spawn(|| loop {
                        let idx = next.fetch_add(1, Ordering::SeqCst);
                        let Some(track) = tracks.get(idx) else {
                            break;
                        };
                        let report = self.scrape_track(track);
                        collected
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner())
                            .push((idx, report));
                    });
                }
            });

            let mut collected = collected
                .into_inner()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            collected.sort_by_key(|(idx, _)| *idx);
            collected.into_iter().map(|(_, report)| report).collect()
        };

        let successful = reports.iter().filter(|r| r.is_success()).count();
        info!(
            "Job completed! Processed {} tracks - Success: {}, Failed: {}",
            tracks.len(),
            successful,
            tracks.len() - successful
        );
        reports
    }

    /// One attempt in its own session; the session is dropped on every path
    fn attempt(&self, track: &Track) -> ScrapeResult {
        let mut page = self.sessions.open()?;
        self.extract(page.as_mut(), track)
    }

    fn extract(&self, page: &mut dyn PageDriver, track: &Track) -> ScrapeResult {
        let timeout = self.options.timeout();
        page.navigate(track.url())?;

        let located = match self.table_locators.locate(page, timeout) {
            Ok(located) => located,
            Err(e @ (ScrapeError::Network(_) | ScrapeError::BrowserCrash(_))) => return Err(e),
            Err(table_error) => {
                info!(track = %track.id(), "Table not found directly, trying Streams link...");
                let link = match self.link_locators.locate(page, timeout) {
                    Ok(link) => link,
                    Err(ScrapeError::ElementNotFound(_)) => return Err(table_error),
                    Err(e) => return Err(e),
                };
                page.click(&link.target, timeout)?;
                self.table_locators.locate(page, timeout)?
            }
        };

        let mut table = parse_stream_table(track.id(), &located.html)?;
        table.title = match page.content() {
            Ok(html) => page_title(&html),
            Err(e) => {
                debug!(track = %track.id(), kind = %e.kind(), error = %e, "could not read page title");
                None
            }
        };
        Ok(table)
    }
}
