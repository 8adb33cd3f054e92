use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;

use crate::error::ScrapeError;
use crate::scrapers::traits::{PageDriver, Target};

/// Element found by a locator strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub strategy: String,
    pub target: Target,
    pub html: String,
}

/// One rule for finding an element on a rendered page
pub trait LocatorStrategy: Send + Sync {
    fn describe(&self) -> String;

    fn locate(&self, page: &dyn PageDriver, timeout: Duration) -> Result<Located, ScrapeError>;
}

/// Plain CSS selector
pub struct CssLocator(pub String);

impl LocatorStrategy for CssLocator {
    fn describe(&self) -> String {
        format!("css '{}'", self.0)
    }

    fn locate(&self, page: &dyn PageDriver, timeout: Duration) -> Result<Located, ScrapeError> {
        let target = Target::Css(self.0.clone());
        let html = page.wait_for(&target, timeout)?;
        Ok(Located {
            strategy: self.describe(),
            target,
            html,
        })
    }
}

/// XPath expression
pub struct XPathLocator(pub String);

impl LocatorStrategy for XPathLocator {
    fn describe(&self) -> String {
        format!("xpath '{}'", self.0)
    }

    fn locate(&self, page: &dyn PageDriver, timeout: Duration) -> Result<Located, ScrapeError> {
        let target = Target::XPath(self.0.clone());
        let html = page.wait_for(&target, timeout)?;
        Ok(Located {
            strategy: self.describe(),
            target,
            html,
        })
    }
}

/// Anchor matched by its visible text
pub struct LinkTextLocator {
    pub text: String,
    pub partial: bool,
}

impl LinkTextLocator {
    pub fn exact(text: &str) -> Self {
        Self {
            text: text.to_string(),
            partial: false,
        }
    }

    pub fn partial(text: &str) -> Self {
        Self {
            text: text.to_string(),
            partial: true,
        }
    }

    fn xpath(&self) -> String {
        if self.partial {
            format!("//a[contains(normalize-space(), '{}')]", self.text)
        } else {
            format!("//a[normalize-space()='{}']", self.text)
        }
    }
}

impl LocatorStrategy for LinkTextLocator {
    fn describe(&self) -> String {
        if self.partial {
            format!("partial link text '{}'", self.text)
        } else {
            format!("link text '{}'", self.text)
        }
    }

    fn locate(&self, page: &dyn PageDriver, timeout: Duration) -> Result<Located, ScrapeError> {
        let target = Target::XPath(self.xpath());
        let html = page.wait_for(&target, timeout)?;
        Ok(Located {
            strategy: self.describe(),
            target,
            html,
        })
    }
}

/// Scans every table in the document for a header row containing all of
/// the required column names.
pub struct HeaderScanLocator {
    pub required: Vec<String>,
}

impl HeaderScanLocator {
    pub fn new(required: &[&str]) -> Self {
        Self {
            required: required.iter().map(|h| h.to_string()).collect(),
        }
    }
}

impl LocatorStrategy for HeaderScanLocator {
    fn describe(&self) -> String {
        format!("header scan {:?}", self.required)
    }

    fn locate(&self, page: &dyn PageDriver, timeout: Duration) -> Result<Located, ScrapeError> {
        // Make sure some table rendered before reading the document
        page.wait_for(&Target::Css("table".to_string()), timeout)?;
        let content = page.content()?;

        let document = Html::parse_document(&content);
        let table_selector = Selector::parse("table").unwrap();
        let th_selector = Selector::parse("th").unwrap();

        for (idx, table) in document.select(&table_selector).enumerate() {
            let headers: Vec<String> = table
                .select(&th_selector)
                .map(|th| th.text().collect::<String>().trim().to_string())
                .collect();

            if self.required.iter().all(|r| headers.contains(r)) {
                return Ok(Located {
                    strategy: self.describe(),
                    target: Target::XPath(format!("(//table)[{}]", idx + 1)),
                    html: table.html(),
                });
            }
        }

        Err(ScrapeError::ElementNotFound(format!(
            "no table with headers {:?}",
            self.required
        )))
    }
}

/// Ordered list of strategies, tried until one matches
pub struct LocatorChain {
    name: &'static str,
    strategies: Vec<Box<dyn LocatorStrategy>>,
}

impl LocatorChain {
    pub fn new(name: &'static str, strategies: Vec<Box<dyn LocatorStrategy>>) -> Self {
        Self { name, strategies }
    }

    /// Chain for the streaming history table.
    /// Every step checks for the Date and Global headers, so an unrelated
    /// table on the page never counts as a match.
    pub fn streams_table() -> Self {
        Self::new(
            "streams table",
            vec![
                Box::new(XPathLocator(
                    "//table[.//th[normalize-space()='Date'] and .//th[normalize-space()='Global']]"
                        .to_string(),
                )),
                Box::new(HeaderScanLocator::new(&["Date", "Global"])),
            ],
        )
    }

    /// Chain for the "Streams" tab link
    pub fn streams_link() -> Self {
        Self::new(
            "streams link",
            vec![
                Box::new(LinkTextLocator::exact("Streams")),
                Box::new(LinkTextLocator::partial("Stream")),
                Box::new(CssLocator("a[href*='streams']".to_string())),
            ],
        )
    }

    /// Try each strategy in order.
    ///
    /// Session-level failures (network, crash) stop the chain immediately,
    /// since no other locator can succeed on a dead page.
    pub fn locate(&self, page: &dyn PageDriver, timeout: Duration) -> Result<Located, ScrapeError> {
        let mut last_error = None;

        for strategy in &self.strategies {
            match strategy.locate(page, timeout) {
                Ok(located) => {
                    debug!(chain = self.name, strategy = %located.strategy, "locator matched");
                    return Ok(located);
                }
                Err(e @ (ScrapeError::Network(_) | ScrapeError::BrowserCrash(_))) => {
                    return Err(e);
                }
                Err(e) => {
                    debug!(chain = self.name, strategy = %strategy.describe(), error = %e, "locator failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ScrapeError::ElementNotFound(format!("{}: no locator strategies", self.name))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Answers css lookups from a fixed document and counts every wait
    struct StaticPage {
        html: &'static str,
        crash_on_xpath: bool,
        waits: Cell<usize>,
    }

    impl PageDriver for StaticPage {
        fn navigate(&mut self, _url: &str) -> Result<(), ScrapeError> {
            Ok(())
        }

        fn wait_for(&self, target: &Target, _timeout: Duration) -> Result<String, ScrapeError> {
            self.waits.set(self.waits.get() + 1);
            match target {
                Target::XPath(_) if self.crash_on_xpath => Err(ScrapeError::BrowserCrash("gone".to_string())),
                Target::XPath(xp) => Err(ScrapeError::ElementNotFound(xp.clone())),
                Target::Css(css) => {
                    let document = Html::parse_document(self.html);
                    let selector = Selector::parse(css).unwrap();
                    document
                        .select(&selector)
                        .next()
                        .map(|el| el.html())
                        .ok_or_else(|| ScrapeError::ElementNotFound(css.clone()))
                }
            }
        }

        fn click(&self, _target: &Target, _timeout: Duration) -> Result<(), ScrapeError> {
            Ok(())
        }

        fn content(&self) -> Result<String, ScrapeError> {
            Ok(self.html.to_string())
        }
    }

    fn page(html: &'static str, crash_on_xpath: bool) -> StaticPage {
        StaticPage {
            html,
            crash_on_xpath,
            waits: Cell::new(0),
        }
    }

    const TWO_TABLES: &str = "<html><body>\
        <table><tr><th>Pos</th></tr><tr><td>1</td></tr></table>\
        <table><tr><th>Date</th><th>Global</th></tr><tr><td>2024/01/01</td><td>5</td></tr></table>\
        </body></html>";

    #[test]
    fn header_scan_picks_matching_table() {
        let page = page(TWO_TABLES, false);
        let located = LocatorChain::streams_table().locate(&page, Duration::ZERO).unwrap();
        assert_eq!(located.target, Target::XPath("(//table)[2]".to_string()));
        assert!(located.html.contains("Global"));
    }

    #[test]
    fn unrelated_table_is_not_a_match() {
        let page = page(
            "<html><body><table><tr><th>Country</th><th>Pos</th></tr><tr><td>SE</td><td>1</td></tr></table></body></html>",
            false,
        );
        let err = LocatorChain::streams_table().locate(&page, Duration::ZERO).unwrap_err();
        assert!(matches!(err, ScrapeError::ElementNotFound(_)));
    }

    #[test]
    fn crash_stops_the_chain() {
        let page = page(TWO_TABLES, true);
        let err = LocatorChain::streams_table().locate(&page, Duration::ZERO).unwrap_err();
        assert!(matches!(err, ScrapeError::BrowserCrash(_)));
        assert_eq!(page.waits.get(), 1);
    }

    #[test]
    fn link_chain_falls_through_to_css() {
        let page = page(r#"<html><body><a href="/x_streams.html">daily</a></body></html>"#, false);
        let located = LocatorChain::streams_link().locate(&page, Duration::ZERO).unwrap();
        assert_eq!(located.target, Target::Css("a[href*='streams']".to_string()));
    }

    #[test]
    fn exhausted_chain_reports_last_error() {
        let page = page("<html><body></body></html>", false);
        let err = LocatorChain::streams_link().locate(&page, Duration::ZERO).unwrap_err();
        assert_eq!(err, ScrapeError::ElementNotFound("a[href*='streams']".to_string()));
    }
}
