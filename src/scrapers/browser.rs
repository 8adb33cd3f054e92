use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ScrapeError;
use crate::scrapers::traits::{PageDriver, SessionFactory, Target};

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Launches one headless Chrome per session
pub struct ChromeLauncher {
    headless: bool,
    idle_timeout: Duration,
}

impl ChromeLauncher {
    pub fn new(headless: bool, element_timeout: Duration) -> Self {
        // Chrome must outlive the longest element wait
        let idle_timeout = element_timeout.max(Duration::from_secs(30)) * 2;
        Self {
            headless,
            idle_timeout,
        }
    }
}

impl SessionFactory for ChromeLauncher {
    fn open(&self) -> Result<Box<dyn PageDriver>, ScrapeError> {
        Ok(Box::new(ChromeSession::launch(self.headless, self.idle_timeout)?))
    }

    fn engine_name(&self) -> &'static str {
        "browser"
    }
}

/// A Chrome process with a single tab.
/// Dropping it closes the tab and then the browser process.
pub struct ChromeSession {
    tab: Arc<Tab>,
    // Held so the process lives as long as the tab
    _browser: Browser,
}

impl ChromeSession {
    pub fn launch(headless: bool, idle_timeout: Duration) -> Result<Self, ScrapeError> {
        info!(headless, "Launching Chrome...");

        let args = vec![
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-gpu"),
            OsStr::new("--disable-extensions"),
            OsStr::new("--disable-software-rasterizer"),
            OsStr::new("--disable-blink-features=AutomationControlled"),
        ];

        let options = LaunchOptions::default_builder()
            .headless(headless)
            .sandbox(false)
            .window_size(Some((1920, 1080)))
            .idle_browser_timeout(idle_timeout)
            .args(args)
            .build()
            .map_err(|e| ScrapeError::BrowserCrash(format!("launch options: {e}")))?;

        let browser = Browser::new(options)
            .map_err(|e| ScrapeError::BrowserCrash(format!("failed to launch Chrome: {e:#}")))?;

        let tab = browser
            .new_tab()
            .map_err(|e| ScrapeError::classify(&e, ScrapeError::BrowserCrash))?;

        if let Err(e) = tab.set_user_agent(USER_AGENT, Some("en-US,en;q=0.9"), None) {
            warn!("Could not set user agent: {e:#}");
        }

        Ok(Self {
            tab,
            _browser: browser,
        })
    }

    fn find(&self, target: &Target, timeout: Duration) -> Result<Element<'_>, ScrapeError> {
        let found = match target {
            Target::Css(selector) => self.tab.wait_for_element_with_custom_timeout(selector, timeout),
            Target::XPath(xpath) => self.tab.wait_for_xpath_with_custom_timeout(xpath, timeout),
        };
        found.map_err(|e| ScrapeError::classify(&e, ScrapeError::ElementNotFound))
    }
}

impl PageDriver for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<(), ScrapeError> {
        debug!("Navigating to {}", url);
        self.tab
            .navigate_to(url)
            .map_err(|e| ScrapeError::classify(&e, ScrapeError::Network))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| ScrapeError::classify(&e, ScrapeError::Network))?;
        Ok(())
    }

    fn wait_for(&self, target: &Target, timeout: Duration) -> Result<String, ScrapeError> {
        let element = self.find(target, timeout)?;
        element
            .get_content()
            .map_err(|e| ScrapeError::classify(&e, ScrapeError::StaleElement))
    }

    fn click(&self, target: &Target, timeout: Duration) -> Result<(), ScrapeError> {
        let element = self.find(target, timeout)?;

        if let Err(e) = element.scroll_into_view() {
            debug!("scroll_into_view failed for {}: {e:#}", target);
        }

        match element.click() {
            Ok(_) => Ok(()),
            Err(e) => {
                // Overlays can swallow a real click; a JS click usually gets through
                debug!("Native click on {} failed ({e:#}), trying JS click", target);
                element
                    .call_js_fn("function() { this.click(); }", vec![], false)
                    .map(|_| ())
                    .map_err(|e| ScrapeError::classify(&e, ScrapeError::ClickRejected))
            }
        }
    }

    fn content(&self) -> Result<String, ScrapeError> {
        self.tab
            .get_content()
            .map_err(|e| ScrapeError::classify(&e, ScrapeError::BrowserCrash))
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(false) {
            debug!("Tab close failed during teardown: {e:#}");
        }
    }
}
