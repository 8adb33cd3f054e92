use std::fmt;
use std::time::Duration;

use crate::error::ScrapeError;

/// How a driver can find an element again
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Css(String),
    XPath(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Css(sel) => write!(f, "css={sel}"),
            Target::XPath(xp) => write!(f, "xpath={xp}"),
        }
    }
}

/// A live page that can be navigated and queried.
/// Implemented by the Chrome session, the HTTP session and test fakes.
pub trait PageDriver {
    /// Load `url` and wait for navigation to settle
    fn navigate(&mut self, url: &str) -> Result<(), ScrapeError>;

    /// Wait up to `timeout` for `target` and return its outer HTML
    fn wait_for(&self, target: &Target, timeout: Duration) -> Result<String, ScrapeError>;

    /// Wait up to `timeout` for `target`, then click it
    fn click(&self, target: &Target, timeout: Duration) -> Result<(), ScrapeError>;

    /// Current document HTML
    fn content(&self) -> Result<String, ScrapeError>;
}

/// Opens a fresh session per attempt.
/// Dropping the returned driver tears the session down.
pub trait SessionFactory: Send + Sync {
    fn open(&self) -> Result<Box<dyn PageDriver>, ScrapeError>;

    /// Name of the engine for logs
    fn engine_name(&self) -> &'static str;
}
