use scraper::{Html, Selector};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kworb_streams::error::ScrapeError;
use kworb_streams::models::{Region, Track, TrackId};
use kworb_streams::scrapers::{KworbScraper, PageDriver, ScrapeOptions, SessionFactory, Target};

const BASE: &str = "https://kworb.test/spotify";

const STREAMS_PAGE: &str = r#"<html><head><title>Artist - Song</title></head><body>
<table>
  <tr><th>Date</th><th>Global</th><th>US</th></tr>
  <tr><td>Total</td><td>2,100</td><td>500</td></tr>
  <tr><td>2024/01/02</td><td>1,100</td><td>500</td></tr>
  <tr><td>2024/01/01</td><td>1,000</td><td>--</td></tr>
</table></body></html>"#;

const LANDING_PAGE: &str = r#"<html><head><title>Artist - Song</title></head><body>
<a href="/spotify/track/abc123_streams.html">Daily streams</a>
</body></html>"#;

const RANKINGS_PAGE: &str = r#"<html><head><title>Artist - Song</title></head><body>
<table>
  <tr><th>Country</th><th>Pos</th></tr>
  <tr><td>SE</td><td>1</td></tr>
</table>
<a href="/spotify/track/abc123_streams.html">Streams</a>
</body></html>"#;

const EMPTY_PAGE: &str = "<html><body><p>nothing here</p></body></html>";

/// What a navigation to a url yields on a given attempt
#[derive(Clone)]
enum Outcome {
    Page(&'static str),
    /// Landing page whose streams link leads to the second page
    Linked(&'static str, &'static str),
    /// Page with a streams link that refuses clicks
    Unclickable(&'static str),
    /// Page whose document can be read once, then the tab dies
    Fragile(&'static str),
    Network,
    Crash,
}

#[derive(Default)]
struct FakeSite {
    plans: HashMap<String, Vec<Outcome>>,
    visits: Mutex<HashMap<String, usize>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    click_waits: Mutex<Vec<Duration>>,
}

impl FakeSite {
    fn with(mut self, track: &Track, plan: Vec<Outcome>) -> Self {
        self.plans.insert(track.url().to_string(), plan);
        self
    }

    fn visits(&self, track: &Track) -> usize {
        self.visits.lock().unwrap().get(track.url()).copied().unwrap_or(0)
    }

    fn next_outcome(&self, url: &str) -> Outcome {
        let mut visits = self.visits.lock().unwrap();
        let n = visits.entry(url.to_string()).or_insert(0);
        let plan = &self.plans[url];
        let outcome = plan[(*n).min(plan.len() - 1)].clone();
        *n += 1;
        outcome
    }
}

struct FakeSessions(Arc<FakeSite>);

impl SessionFactory for FakeSessions {
    fn open(&self) -> Result<Box<dyn PageDriver>, ScrapeError> {
        self.0.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            site: Arc::clone(&self.0),
            html: RefCell::new(None),
            next: RefCell::new(None),
            reads_left: Cell::new(None),
        }))
    }

    fn engine_name(&self) -> &'static str {
        "fake"
    }
}

struct FakeSession {
    site: Arc<FakeSite>,
    html: RefCell<Option<String>>,
    next: RefCell<Option<String>>,
    reads_left: Cell<Option<usize>>,
}

impl PageDriver for FakeSession {
    fn navigate(&mut self, url: &str) -> Result<(), ScrapeError> {
        match self.site.next_outcome(url) {
            Outcome::Page(html) => *self.html.borrow_mut() = Some(html.to_string()),
            Outcome::Linked(landing, streams) => {
                *self.html.borrow_mut() = Some(landing.to_string());
                *self.next.borrow_mut() = Some(streams.to_string());
            }
            Outcome::Unclickable(page) => *self.html.borrow_mut() = Some(page.to_string()),
            Outcome::Fragile(page) => {
                *self.html.borrow_mut() = Some(page.to_string());
                self.reads_left.set(Some(1));
            }
            Outcome::Network => return Err(ScrapeError::Network("net::ERR_CONNECTION_RESET".to_string())),
            Outcome::Crash => return Err(ScrapeError::BrowserCrash("connection is closed".to_string())),
        }
        Ok(())
    }

    fn wait_for(&self, target: &Target, _timeout: Duration) -> Result<String, ScrapeError> {
        let Target::Css(css) = target else {
            return Err(ScrapeError::ElementNotFound(target.to_string()));
        };
        let html = self.html.borrow();
        let document = Html::parse_document(html.as_deref().unwrap_or_default());
        let selector = Selector::parse(css).unwrap();
        document
            .select(&selector)
            .next()
            .map(|el| el.html())
            .ok_or_else(|| ScrapeError::ElementNotFound(target.to_string()))
    }

    fn click(&self, target: &Target, timeout: Duration) -> Result<(), ScrapeError> {
        self.site.click_waits.lock().unwrap().push(timeout);
        self.wait_for(target, timeout)?;
        match self.next.borrow_mut().take() {
            Some(page) => {
                *self.html.borrow_mut() = Some(page);
                Ok(())
            }
            None => Err(ScrapeError::ClickRejected(target.to_string())),
        }
    }

    fn content(&self) -> Result<String, ScrapeError> {
        match self.reads_left.get() {
            Some(0) => return Err(ScrapeError::BrowserCrash("connection is closed".to_string())),
            Some(n) => self.reads_left.set(Some(n - 1)),
            None => {}
        }
        Ok(self.html.borrow().clone().unwrap_or_default())
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.site.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn track(id: &str) -> Track {
    Track::on_kworb(TrackId::parse(id).unwrap(), None, BASE)
}

fn options(retry_count: u32, workers: usize) -> ScrapeOptions {
    ScrapeOptions {
        retry_count,
        retry_delay: Duration::ZERO,
        timeout_secs: 1,
        workers,
        ..ScrapeOptions::default()
    }
}

fn scraper(site: &Arc<FakeSite>, retry_count: u32, workers: usize) -> KworbScraper {
    KworbScraper::new(Box::new(FakeSessions(Arc::clone(site))), options(retry_count, workers))
}

#[test]
fn zero_retries_means_one_attempt() {
    let t = track("abc123");
    let site = Arc::new(FakeSite::default().with(&t, vec![Outcome::Network]));

    let report = scraper(&site, 0, 1).scrape_track(&t);

    assert_eq!(report.attempts, 1);
    assert_eq!(site.visits(&t), 1);
    assert!(matches!(report.result, Err(ScrapeError::Network(_))));
}

#[test]
fn gives_up_after_retry_count_plus_one() {
    let t = track("abc123");
    let site = Arc::new(FakeSite::default().with(&t, vec![Outcome::Page(EMPTY_PAGE)]));

    let report = scraper(&site, 2, 1).scrape_track(&t);

    assert_eq!(report.attempts, 3);
    assert_eq!(site.visits(&t), 3);
    assert!(matches!(report.result, Err(ScrapeError::ElementNotFound(_))));
}

#[test]
fn stops_at_first_success() {
    let t = track("abc123");
    let site = Arc::new(FakeSite::default().with(
        &t,
        vec![Outcome::Crash, Outcome::Network, Outcome::Page(STREAMS_PAGE)],
    ));

    let report = scraper(&site, 5, 1).scrape_track(&t);

    assert_eq!(report.attempts, 3);
    assert_eq!(site.visits(&t), 3);
    let table = report.result.unwrap();
    assert_eq!(table.rows.len(), 3);
    assert_eq!(table.totals.get(&Region::Global).map(String::as_str), Some("2,100"));
}

#[test]
fn follows_streams_link_when_table_missing() {
    let t = track("abc123");
    let site = Arc::new(FakeSite::default().with(&t, vec![Outcome::Linked(LANDING_PAGE, STREAMS_PAGE)]));

    let report = scraper(&site, 0, 1).scrape_track(&t);

    assert_eq!(report.attempts, 1);
    assert_eq!(report.result.unwrap().rows.len(), 3);
    assert_eq!(*site.click_waits.lock().unwrap(), vec![Duration::from_secs(1)]);
}

#[test]
fn placeholder_name_is_replaced_by_page_title() {
    let t = track("abc123");
    let named = Track::on_kworb(TrackId::parse("def456").unwrap(), Some("My Name".to_string()), BASE);
    let site = Arc::new(
        FakeSite::default()
            .with(&t, vec![Outcome::Page(STREAMS_PAGE)])
            .with(&named, vec![Outcome::Page(STREAMS_PAGE)]),
    );
    let scraper = scraper(&site, 0, 1);

    assert_eq!(scraper.scrape_track(&t).track.name(), "Artist - Song");
    assert_eq!(scraper.scrape_track(&named).track.name(), "My Name");
}

#[test]
fn failing_track_does_not_block_others() {
    let bad = track("bad000");
    let good = track("good111");
    let site = Arc::new(
        FakeSite::default()
            .with(&bad, vec![Outcome::Crash])
            .with(&good, vec![Outcome::Page(STREAMS_PAGE)]),
    );

    let reports = scraper(&site, 1, 1).scrape_all(&[bad.clone(), good.clone()]);

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].track.id(), bad.id());
    assert_eq!(reports[0].attempts, 2);
    assert!(matches!(reports[0].result, Err(ScrapeError::BrowserCrash(_))));
    assert!(reports[1].is_success());
}

#[test]
fn parallel_workers_keep_input_order() {
    let tracks: Vec<Track> = (0..6).map(|i| track(&format!("track{i}"))).collect();
    let site = tracks.iter().enumerate().fold(FakeSite::default(), |site, (i, t)| {
        let plan = if i % 2 == 0 {
            vec![Outcome::Page(STREAMS_PAGE)]
        } else {
            vec![Outcome::Network]
        };
        site.with(t, plan)
    });
    let site = Arc::new(site);

    let reports = scraper(&site, 1, 3).scrape_all(&tracks);

    let ids: Vec<&TrackId> = reports.iter().map(|r| r.track.id()).collect();
    let expected: Vec<&TrackId> = tracks.iter().map(|t| t.id()).collect();
    assert_eq!(ids, expected);
    for (i, report) in reports.iter().enumerate() {
        assert_eq!(report.is_success(), i % 2 == 0);
    }
    assert!(tracks.iter().all(|t| site.visits(t) <= 2));
}

#[test]
fn unrelated_table_falls_back_to_streams_link() {
    let t = track("abc123");
    let site = Arc::new(FakeSite::default().with(&t, vec![Outcome::Linked(RANKINGS_PAGE, STREAMS_PAGE)]));

    let report = scraper(&site, 0, 1).scrape_track(&t);

    assert_eq!(report.attempts, 1);
    let table = report.result.unwrap();
    assert_eq!(table.rows.len(), 3);
    assert_eq!(table.rows[0].date, "2024/01/02");
}

#[test]
fn rejected_click_is_retried_then_reported() {
    let t = track("abc123");
    let site = Arc::new(FakeSite::default().with(&t, vec![Outcome::Unclickable(LANDING_PAGE)]));

    let report = scraper(&site, 2, 1).scrape_track(&t);

    assert_eq!(report.attempts, 3);
    assert!(matches!(report.result, Err(ScrapeError::ClickRejected(_))));
}

#[test]
fn every_session_is_torn_down() {
    let t = track("abc123");
    let site = Arc::new(FakeSite::default().with(
        &t,
        vec![
            Outcome::Crash,
            Outcome::Network,
            Outcome::Page(EMPTY_PAGE),
            Outcome::Page(STREAMS_PAGE),
        ],
    ));

    let report = scraper(&site, 5, 1).scrape_track(&t);

    assert_eq!(report.attempts, 4);
    assert!(report.is_success());
    assert_eq!(site.opened.load(Ordering::SeqCst), 4);
    assert_eq!(site.closed.load(Ordering::SeqCst), 4);
}

#[test]
fn unreadable_title_keeps_the_data() {
    let t = track("abc123");
    let site = Arc::new(FakeSite::default().with(&t, vec![Outcome::Fragile(STREAMS_PAGE)]));

    let report = scraper(&site, 0, 1).scrape_track(&t);

    assert_eq!(report.attempts, 1);
    assert_eq!(report.track.name(), "abc123");
    let table = report.result.unwrap();
    assert_eq!(table.rows.len(), 3);
    assert_eq!(table.title, None);
}
