use std::fmt;

use thiserror::Error;

/// Coarse classification of every failure the pipeline can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    ElementNotFound,
    StaleElement,
    ClickRejected,
    BrowserCrash,
    MalformedData,
    RemoteService,
    MissingCredential,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::ElementNotFound => "element_not_found",
            ErrorKind::StaleElement => "stale_element",
            ErrorKind::ClickRejected => "click_rejected",
            ErrorKind::BrowserCrash => "browser_crash",
            ErrorKind::MalformedData => "malformed_data",
            ErrorKind::RemoteService => "remote_service",
            ErrorKind::MissingCredential => "missing_credential",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single fetch/extract attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("network error: {0}")]
    Network(String),
    #[error("element not found: {0}")]
    ElementNotFound(String),
    #[error("stale element: {0}")]
    StaleElement(String),
    #[error("click rejected: {0}")]
    ClickRejected(String),
    #[error("browser crashed: {0}")]
    BrowserCrash(String),
}

impl ScrapeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScrapeError::Network(_) => ErrorKind::Network,
            ScrapeError::ElementNotFound(_) => ErrorKind::ElementNotFound,
            ScrapeError::StaleElement(_) => ErrorKind::StaleElement,
            ScrapeError::ClickRejected(_) => ErrorKind::ClickRejected,
            ScrapeError::BrowserCrash(_) => ErrorKind::BrowserCrash,
        }
    }

    /// Crashes poison the session they happened in.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, ScrapeError::BrowserCrash(_))
    }

    /// Map an automation-layer error onto a scrape error class.
    ///
    /// headless_chrome reports everything as `anyhow::Error`, so the class is
    /// recovered from the message. `fallback` is used when nothing matches.
    pub fn classify(err: &anyhow::Error, fallback: fn(String) -> ScrapeError) -> ScrapeError {
        let msg = format!("{err:#}");
        let lower = msg.to_lowercase();

        if lower.contains("connection is closed")
            || lower.contains("channel closed")
            || lower.contains("target closed")
            || lower.contains("browser process")
            || lower.contains("crash")
        {
            ScrapeError::BrowserCrash(msg)
        } else if lower.contains("net::err") || lower.contains("navigate failed") {
            ScrapeError::Network(msg)
        } else if lower.contains("no node with given id")
            || lower.contains("could not find node")
            || lower.contains("stale")
        {
            ScrapeError::StaleElement(msg)
        } else if lower.contains("couldn't find element")
            || lower.contains("no element")
            || lower.contains("never came")
        {
            ScrapeError::ElementNotFound(msg)
        } else {
            fallback(msg)
        }
    }
}

/// Failure of the language-model commentary step
#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error("missing credential: {0} is not set")]
    MissingCredential(&'static str),
    #[error("rate limited by remote service: {0}")]
    RateLimited(String),
    #[error("remote service error: {0}")]
    Remote(String),
    #[error("network error: {0}")]
    Network(String),
}

impl SummarizeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SummarizeError::MissingCredential(_) => ErrorKind::MissingCredential,
            SummarizeError::RateLimited(_) | SummarizeError::Remote(_) => ErrorKind::RemoteService,
            SummarizeError::Network(_) => ErrorKind::Network,
        }
    }
}

impl From<reqwest::Error> for SummarizeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SummarizeError::Remote(e.to_string())
        } else {
            SummarizeError::Network(e.to_string())
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackIdError {
    #[error("empty track identifier")]
    Empty,
    #[error("not a track URL: {0}")]
    NotATrack(String),
    #[error("invalid track id: {0}")]
    InvalidId(String),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("excel error: {0}")]
    Excel(#[from] rust_xlsxwriter::XlsxError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
