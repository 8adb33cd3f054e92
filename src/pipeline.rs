use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

use crate::cleaner::{clean, filter_range};
use crate::error::{ScrapeError, TrackIdError};
use crate::models::{Region, StreamRecord, Track, TrackId};
use crate::scrapers::TrackReport;
use crate::stats::TrackStats;
use crate::summarizer::Summarizer;

/// A scraped and cleaned track, ready for presentation
#[derive(Debug, Clone, Serialize)]
pub struct TrackData {
    pub track: Track,
    pub attempts: u32,
    pub records: Vec<StreamRecord>,
    pub stats: TrackStats,
    /// Rows dropped by the cleaner
    pub malformed: usize,
    /// "Total" row as printed on the page
    pub page_totals: BTreeMap<Region, String>,
    pub insight: Option<String>,
    pub insight_error: Option<String>,
}

/// A track that could not be scraped
#[derive(Debug, Clone)]
pub struct TrackFailure {
    pub track: Track,
    pub attempts: u32,
    pub error: ScrapeError,
}

#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub tracks: Vec<TrackData>,
    pub failures: Vec<TrackFailure>,
}

impl RunOutput {
    /// Every record of every track, in track order
    pub fn all_records(&self) -> impl Iterator<Item = (&Track, &StreamRecord)> {
        self.tracks
            .iter()
            .flat_map(|t| t.records.iter().map(move |r| (&t.track, r)))
    }

    pub fn find(&self, id: &TrackId) -> Option<&TrackData> {
        self.tracks.iter().find(|t| t.track.id() == id)
    }
}

/// Split a track list file into `(identifier, optional name)` pairs.
///
/// One track per line, `identifier[,display name]`; blank lines and lines
/// starting with `#` are ignored.
pub fn parse_track_list(text: &str) -> Vec<(String, Option<String>)> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| match line.split_once(',') {
            Some((id, name)) => {
                let name = name.trim();
                (id.trim().to_string(), (!name.is_empty()).then(|| name.to_string()))
            }
            None => (line.to_string(), None),
        })
        .collect()
}

/// Normalize identifiers into tracks, deduplicating by id.
/// Inputs that do not parse are returned alongside.
pub fn resolve_tracks(
    inputs: &[(String, Option<String>)],
    kworb_base_url: &str,
) -> (Vec<Track>, Vec<(String, TrackIdError)>) {
    let mut tracks: Vec<Track> = Vec::new();
    let mut rejected = Vec::new();

    for (input, name) in inputs {
        match TrackId::parse(input) {
            Ok(id) if tracks.iter().any(|t| t.id() == &id) => {
                warn!(track = %id, "track listed twice, ignoring repeat");
            }
            Ok(id) => tracks.push(Track::on_kworb(id, name.clone(), kworb_base_url)),
            Err(e) => {
                error!(input = %input, error = %e, "invalid track identifier");
                rejected.push((input.clone(), e));
            }
        }
    }

    (tracks, rejected)
}

/// Clean every successful report and set failures aside
pub fn process_reports(
    reports: Vec<TrackReport>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> RunOutput {
    let mut output = RunOutput::default();

    for report in reports {
        match report.result {
            Ok(table) => {
                let cleaned = clean(&table.rows);
                let records = filter_range(cleaned.records, start, end);
                let stats = TrackStats::from_records(&records);
                info!(
                    track = %report.track.id(),
                    records = records.len(),
                    malformed = cleaned.malformed,
                    "track ready"
                );
                output.tracks.push(TrackData {
                    track: report.track,
                    attempts: report.attempts,
                    records,
                    stats,
                    malformed: cleaned.malformed,
                    page_totals: table.totals,
                    insight: None,
                    insight_error: None,
                });
            }
            Err(error) => {
                error!(
                    track = %report.track.id(),
                    kind = %error.kind(),
                    attempts = report.attempts,
                    "Failed to process track: {} - {}",
                    report.track.name(),
                    error
                );
                output.failures.push(TrackFailure {
                    track: report.track,
                    attempts: report.attempts,
                    error,
                });
            }
        }
    }

    output
}

/// Ask the summarizer about each track with data.
/// A failure only affects that track's insight; scraped data stays intact.
pub async fn attach_insights(output: &mut RunOutput, summarizer: &dyn Summarizer) {
    for data in output.tracks.iter_mut().filter(|t| !t.records.is_empty()) {
        match summarizer.summarize(&data.track, &data.records).await {
            Ok(text) => data.insight = Some(text),
            Err(e) => {
                warn!(
                    track = %data.track.id(),
                    kind = %e.kind(),
                    provider = summarizer.provider_name(),
                    "AI insight unavailable: {e}"
                );
                data.insight_error = Some(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_list_lines() {
        let text = "# my tracks\nabc123, Song One\n\nspotify:track:def456\n  ghi789 ,  \n";
        let parsed = parse_track_list(text);
        assert_eq!(
            parsed,
            vec![
                ("abc123".to_string(), Some("Song One".to_string())),
                ("spotify:track:def456".to_string(), None),
                ("ghi789".to_string(), None),
            ]
        );
    }

    #[test]
    fn resolve_dedupes_and_rejects() {
        let inputs = vec![
            ("abc123".to_string(), None),
            ("spotify:track:abc123".to_string(), Some("dup".to_string())),
            ("not a track!".to_string(), None),
        ];
        let (tracks, rejected) = resolve_tracks(&inputs, "https://kworb.net/spotify");
        assert_eq!(tracks.len(), 1);
        assert_eq!(rejected.len(), 1);
        assert_eq!(tracks[0].url(), "https://kworb.net/spotify/track/abc123.html");
    }
}
