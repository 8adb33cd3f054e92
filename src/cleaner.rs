use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::error::ErrorKind;
use crate::models::{RawRow, Region, StreamRecord, TrackId};

const DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%Y-%m-%d", "%Y.%m.%d", "%Y%m%d", "%d %b %Y", "%b %d, %Y"];

/// Characters used as digit-group separators across locales
const GROUP_SEPARATORS: &[char] = &[',', '.', '\'', '_', ' ', '\u{a0}', '\u{202f}'];

/// Output of a cleaning pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Sorted by track, date, then region
    pub records: Vec<StreamRecord>,
    /// Rows dropped because the date or count could not be parsed
    pub malformed: usize,
    /// Rows replaced by a later row for the same (track, date, region)
    pub duplicates: usize,
}

/// Parse a stream count written with any common digit grouping
pub fn parse_streams(value: &str) -> Option<u64> {
    let digits: String = value.trim().chars().filter(|c| !GROUP_SEPARATORS.contains(c)).collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Parse a date in any of the formats KWORB and its exports have used
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// Normalize raw rows into canonical records.
///
/// Output is sorted ascending by date within each track and holds a single
/// record per (date, region); on duplicates the last row seen wins.
/// Rows whose date or count do not parse are dropped and counted.
pub fn clean(rows: &[RawRow]) -> CleanReport {
    let mut by_key: BTreeMap<(TrackId, NaiveDate, Region), u64> = BTreeMap::new();
    let mut report = CleanReport::default();

    for row in rows {
        let Some(date) = parse_date(&row.date) else {
            warn!(track = %row.track_id, kind = %ErrorKind::MalformedData, date = %row.date, "dropping row with bad date");
            report.malformed += 1;
            continue;
        };
        let Some(streams) = parse_streams(&row.streams) else {
            warn!(track = %row.track_id, kind = %ErrorKind::MalformedData, streams = %row.streams, "dropping row with bad stream count");
            report.malformed += 1;
            continue;
        };

        if by_key
            .insert((row.track_id.clone(), date, row.region), streams)
            .is_some()
        {
            debug!(track = %row.track_id, %date, region = %row.region, "duplicate row, keeping the later one");
            report.duplicates += 1;
        }
    }

    report.records = by_key
        .into_iter()
        .map(|((track_id, date, region), streams)| StreamRecord {
            track_id,
            date,
            streams,
            region,
        })
        .collect();

    info!(
        "Cleaned {} rows into {} records ({} malformed, {} duplicates)",
        rows.len(),
        report.records.len(),
        report.malformed,
        report.duplicates
    );
    report
}

/// Keep records whose date lies in `[start, end]`; a missing bound is open
pub fn filter_range(
    records: Vec<StreamRecord>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<StreamRecord> {
    records
        .into_iter()
        .filter(|r| start.map_or(true, |s| r.date >= s) && end.map_or(true, |e| r.date <= e))
        .collect()
}
