use reqwest::blocking::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ScrapeError;
use crate::scrapers::browser::USER_AGENT;
use crate::scrapers::traits::{PageDriver, SessionFactory, Target};

/// Sessions backed by a plain HTTP GET of the static page.
/// No script runs, so XPath lookups and clicks are not available.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ScrapeError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

impl SessionFactory for HttpFetcher {
    fn open(&self) -> Result<Box<dyn PageDriver>, ScrapeError> {
        Ok(Box::new(HttpSession {
            client: self.client.clone(),
            html: None,
        }))
    }

    fn engine_name(&self) -> &'static str {
        "http"
    }
}

pub struct HttpSession {
    client: Client,
    html: Option<String>,
}

impl HttpSession {
    fn document(&self) -> Result<&str, ScrapeError> {
        self.html
            .as_deref()
            .ok_or_else(|| ScrapeError::ElementNotFound("no page loaded".to_string()))
    }
}

impl PageDriver for HttpSession {
    fn navigate(&mut self, url: &str) -> Result<(), ScrapeError> {
        debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ScrapeError::Network(e.to_string()))?;

        if !response.status().is_success() {
            warn!("KWORB returned status: {}", response.status());
            return Err(ScrapeError::Network(format!("HTTP {}", response.status())));
        }

        let html = response
            .text()
            .map_err(|e| ScrapeError::Network(format!("failed to read response body: {e}")))?;
        debug!("Downloaded {} bytes of HTML", html.len());

        self.html = Some(html);
        Ok(())
    }

    fn wait_for(&self, target: &Target, _timeout: Duration) -> Result<String, ScrapeError> {
        // Static HTML is complete once downloaded, nothing to wait for
        let selector = match target {
            Target::Css(css) => Selector::parse(css)
                .map_err(|e| ScrapeError::ElementNotFound(format!("bad selector {css}: {e}")))?,
            Target::XPath(_) => {
                return Err(ScrapeError::ElementNotFound(format!(
                    "{target} not supported by the http engine"
                )))
            }
        };

        let document = Html::parse_document(self.document()?);
        let html = document.select(&selector).next().map(|el| el.html());
        html.ok_or_else(|| ScrapeError::ElementNotFound(format!("nothing matches {target}")))
    }

    fn click(&self, target: &Target, _timeout: Duration) -> Result<(), ScrapeError> {
        Err(ScrapeError::ClickRejected(format!(
            "cannot click {target} without a browser"
        )))
    }

    fn content(&self) -> Result<String, ScrapeError> {
        self.document().map(str::to_string)
    }
}
