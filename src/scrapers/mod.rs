pub mod browser;
pub mod extract;
pub mod http;
pub mod kworb;
pub mod locators;
pub mod traits;
pub mod types;

pub use browser::ChromeLauncher;
pub use http::HttpFetcher;
pub use kworb::KworbScraper;
pub use traits::{PageDriver, SessionFactory, Target};
pub use types::{Backoff, Engine, ScrapeOptions, ScrapeResult, StreamTable, TrackReport};
