use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use kworb_streams::config::AppConfig;
use kworb_streams::logging::init_logging;
use kworb_streams::pipeline::{attach_insights, parse_track_list, process_reports, resolve_tracks};
use kworb_streams::presenter::{dashboard, export, render_run};
use kworb_streams::scrapers::{Backoff, Engine, KworbScraper};
use kworb_streams::summarizer::OpenAiSummarizer;

/// Scrape Spotify streaming history from KWORB.net
#[derive(Parser, Debug)]
#[command(name = "kworb-streams", version, about)]
struct Cli {
    /// Track URLs, spotify:track: URIs or bare ids
    tracks: Vec<String>,

    /// File with one track per line: `identifier[,display name]`
    #[arg(long)]
    tracks_file: Option<PathBuf>,

    /// Keep records on or after this date (YYYY-MM-DD)
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Keep records on or before this date (YYYY-MM-DD)
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Export formats
    #[arg(long, value_enum, num_args = 1.., default_values = ["csv"])]
    formats: Vec<export::ExportFormat>,

    /// Directory for exported files
    #[arg(long, default_value = "data")]
    output_dir: PathBuf,

    /// Serve the dashboard after scraping
    #[arg(long)]
    ui: bool,

    /// Dashboard port
    #[arg(long, default_value_t = 8501)]
    port: u16,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Retries per track after the first attempt
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Seconds to wait for page elements
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Base delay between attempts in milliseconds
    #[arg(long, default_value_t = 2000)]
    retry_delay_ms: u64,

    #[arg(long, value_enum, default_value = "fixed")]
    backoff: Backoff,

    #[arg(long, value_enum, default_value = "browser")]
    engine: Engine,

    /// Tracks scraped concurrently, one browser each
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Skip the AI commentary step
    #[arg(long)]
    no_insights: bool,

    /// Rows per track in the terminal table
    #[arg(long, default_value_t = 20)]
    rows: usize,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> AppConfig {
        let mut cfg = AppConfig::from_env();
        cfg.scrape.headless = !self.headed;
        cfg.scrape.retry_count = self.retries;
        cfg.scrape.timeout_secs = self.timeout;
        cfg.scrape.retry_delay = Duration::from_millis(self.retry_delay_ms);
        cfg.scrape.backoff = self.backoff;
        cfg.scrape.engine = self.engine;
        cfg.scrape.workers = self.workers;
        cfg.output_dir = self.output_dir;
        cfg.start_date = self.start_date;
        cfg.end_date = self.end_date;
        cfg.formats = self.formats;
        cfg.insights = !self.no_insights;
        cfg
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine; the environment may already carry everything
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    info!("🎵 Spotify Chart History Scraper");
    info!("================================");

    let mut inputs: Vec<(String, Option<String>)> = cli.tracks.iter().map(|t| (t.clone(), None)).collect();
    if let Some(path) = &cli.tracks_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read tracks file {}", path.display()))?;
        inputs.extend(parse_track_list(&text));
    }

    let (ui, port, rows) = (cli.ui, cli.port, cli.rows);
    let config = cli.into_config();
    config.validate()?;

    let (tracks, rejected) = resolve_tracks(&inputs, &config.kworb_base_url);
    if !rejected.is_empty() {
        warn!("{} track identifiers were rejected", rejected.len());
    }
    if tracks.is_empty() {
        bail!("No valid track identifiers given");
    }

    info!("Starting scrape of {} tracks...", tracks.len());

    // The scraper and its sessions block, keep them off the async workers
    let scrape_options = config.scrape.clone();
    let reports = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let scraper = KworbScraper::from_options(scrape_options).context("Failed to create scraper")?;
        Ok(scraper.scrape_all(&tracks))
    })
    .await
    .context("Scrape worker panicked")??;

    let mut output = process_reports(reports, config.start_date, config.end_date);

    if config.insights {
        match OpenAiSummarizer::new(&config.summarizer) {
            Ok(summarizer) => attach_insights(&mut output, &summarizer).await,
            Err(e) => error!(kind = %e.kind(), "Could not create AI client: {e}"),
        }
    }

    println!("{}", render_run(&output, rows));

    let written = export::export_all(&output, &config.output_dir, &config.formats)
        .context("Failed to export data")?;
    info!("✅ Data saved to {} files in {}", written.len(), config.output_dir.display());

    if !output.failures.is_empty() {
        warn!("⚠️ {} tracks failed to process", output.failures.len());
    }

    if ui {
        dashboard::serve(&output, port)
            .await
            .context("Dashboard server failed")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_onto_scrape_options() {
        let cli = Cli::try_parse_from([
            "kworb-streams",
            "abc123",
            "--backoff",
            "exponential",
            "--engine",
            "http",
            "--retries",
            "0",
            "--formats",
            "csv",
            "json",
        ])
        .unwrap();

        let cfg = cli.into_config();
        assert_eq!(cfg.scrape.backoff, Backoff::Exponential);
        assert_eq!(cfg.scrape.engine, Engine::Http);
        assert_eq!(cfg.scrape.retry_count, 0);
        assert_eq!(cfg.formats, vec![export::ExportFormat::Csv, export::ExportFormat::Json]);
    }
}
