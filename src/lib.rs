//! Scrape per-track Spotify streaming history from KWORB, clean it, and
//! present it with optional AI commentary.

pub mod cleaner;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod presenter;
pub mod scrapers;
pub mod stats;
pub mod summarizer;

pub use error::{ErrorKind, ScrapeError, SummarizeError};
pub use models::{Region, StreamRecord, Track, TrackId};
