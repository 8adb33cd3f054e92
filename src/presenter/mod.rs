pub mod dashboard;
pub mod export;

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::models::{Region, StreamRecord};
use crate::pipeline::{RunOutput, TrackData};

/// `1234567` -> `1,234,567`
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Records pivoted to one row per date, newest first, as on KWORB
pub fn pivot_by_date(records: &[StreamRecord]) -> Vec<(NaiveDate, BTreeMap<Region, u64>)> {
    let mut by_date: BTreeMap<NaiveDate, BTreeMap<Region, u64>> = BTreeMap::new();
    for r in records {
        by_date.entry(r.date).or_default().insert(r.region, r.streams);
    }
    by_date.into_iter().rev().collect()
}

/// KWORB's own "Total" row, e.g. `KWORB total: Global 6,000, US 1,200`
pub fn page_totals_line(data: &TrackData) -> Option<String> {
    if data.page_totals.is_empty() {
        return None;
    }
    let parts: Vec<String> = data
        .page_totals
        .iter()
        .map(|(region, total)| format!("{} {}", region.column_header(), total))
        .collect();
    Some(format!("KWORB total: {}", parts.join(", ")))
}

/// Plain-text report for one track
pub fn render_track(data: &TrackData, max_rows: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "🎵 {} ({})", data.track.name(), data.track.id());
    let _ = writeln!(out, "   {}", data.track.url());

    if let (Some(first), Some(last)) = (data.stats.first_date, data.stats.last_date) {
        let _ = writeln!(out, "   {} to {}, {} records", first, last, data.records.len());
    }
    for (region, rs) in &data.stats.regions {
        let _ = writeln!(
            out,
            "   {:<6} total {:>15}  peak {:>12} on {}",
            region.column_header(),
            group_thousands(rs.total),
            group_thousands(rs.peak_streams),
            rs.peak_date
        );
    }
    if let Some(line) = page_totals_line(data) {
        let _ = writeln!(out, "   {line}");
    }
    if data.malformed > 0 {
        let _ = writeln!(out, "   ⚠️  {} malformed rows dropped", data.malformed);
    }

    let rows = pivot_by_date(&data.records);
    if rows.is_empty() {
        let _ = writeln!(out, "   No streaming history data available.");
    } else {
        let _ = writeln!(out);
        let _ = writeln!(out, "   {:<12} {:>14} {:>14}", "Date", "Global", "US");
        for (date, values) in rows.iter().take(max_rows) {
            let cell = |region: Region| {
                values
                    .get(&region)
                    .map(|v| group_thousands(*v))
                    .unwrap_or_else(|| "--".to_string())
            };
            let _ = writeln!(
                out,
                "   {:<12} {:>14} {:>14}",
                date.to_string(),
                cell(Region::Global),
                cell(Region::Us)
            );
        }
        if rows.len() > max_rows {
            let _ = writeln!(out, "   ... {} more days", rows.len() - max_rows);
        }
    }

    if let Some(insight) = &data.insight {
        let _ = writeln!(out, "\n   🤖 {}", insight);
    } else if let Some(err) = &data.insight_error {
        let _ = writeln!(out, "\n   AI insight unavailable: {}", err);
    }

    out
}

/// Plain-text report for a whole run
pub fn render_run(output: &RunOutput, max_rows: usize) -> String {
    let mut out = String::new();
    for data in &output.tracks {
        out.push_str(&render_track(data, max_rows));
        out.push('\n');
    }
    if !output.failures.is_empty() {
        let _ = writeln!(out, "⚠️ {} tracks failed to process", output.failures.len());
        for f in &output.failures {
            let _ = writeln!(
                out,
                "   {} ({}) after {} attempts: {} [{}]",
                f.track.name(),
                f.track.id(),
                f.attempts,
                f.error,
                f.error.kind()
            );
        }
    }
    out
}
