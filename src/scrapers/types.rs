use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::ScrapeError;
use crate::models::{RawRow, Region, Track};

/// How the delay between attempts grows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    Fixed,
    Exponential,
}

/// Which page fetcher backs a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Headless Chrome
    Browser,
    /// Plain HTTP GET of the static page
    Http,
}

/// Options for the fetch/extract core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeOptions {
    /// Run Chrome without a window
    pub headless: bool,
    /// Extra attempts after the first one
    pub retry_count: u32,
    /// Seconds to wait for an element
    pub timeout_secs: u64,
    /// Base delay between attempts
    pub retry_delay: Duration,
    pub backoff: Backoff,
    pub engine: Engine,
    /// Concurrent track workers, each with its own session
    pub workers: usize,
}

impl ScrapeOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay before the attempt following `attempt` (0-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.retry_delay,
            Backoff::Exponential => self.retry_delay.saturating_mul(1_u32 << attempt.min(6)),
        }
    }
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            headless: true,
            retry_count: 3,
            timeout_secs: 10,
            retry_delay: Duration::from_secs(2),
            backoff: Backoff::Fixed,
            engine: Engine::Browser,
            workers: 1,
        }
    }
}

/// Streaming table as read off a track page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamTable {
    /// Data rows in document order
    pub rows: Vec<RawRow>,
    /// Values of the "Total" row per region
    pub totals: BTreeMap<Region, String>,
    /// Values of the "Peak" row per region
    pub peaks: BTreeMap<Region, String>,
    /// Page title, if the page had one
    pub title: Option<String>,
}

/// Outcome of one fetch/extract attempt
pub type ScrapeResult = Result<StreamTable, ScrapeError>;

/// Final outcome for one track after all attempts
#[derive(Debug, Clone)]
pub struct TrackReport {
    pub track: Track,
    pub attempts: u32,
    pub result: ScrapeResult,
}

impl TrackReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}
