use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::ExportError;
use crate::models::Region;
use crate::pipeline::RunOutput;

const FILE_STEM: &str = "spotify_streams";
const COLUMNS: [&str; 5] = ["track_id", "track_name", "date", "streams", "region"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Excel,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "xlsx",
            ExportFormat::Json => "json",
        }
    }
}

/// One exported line, shared by every format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub track_id: String,
    pub track_name: String,
    pub date: NaiveDate,
    pub streams: u64,
    pub region: Region,
}

pub fn export_rows(output: &RunOutput) -> Vec<ExportRow> {
    output
        .all_records()
        .map(|(track, r)| ExportRow {
            track_id: track.id().to_string(),
            track_name: track.name().to_string(),
            date: r.date,
            streams: r.streams,
            region: r.region,
        })
        .collect()
}

pub fn write_csv<W: std::io::Write>(writer: W, rows: &[ExportRow]) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        wtr.write_record(COLUMNS)?;
    }
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json(path: &Path, rows: &[ExportRow]) -> Result<(), ExportError> {
    let json = serde_json::to_string_pretty(rows)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn write_excel(path: &Path, rows: &[ExportRow]) -> Result<(), ExportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name("streams")?;

    for (col, name) in COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, &bold)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        sheet.write_string(r, 0, row.track_id.as_str())?;
        sheet.write_string(r, 1, row.track_name.as_str())?;
        sheet.write_string(r, 2, row.date.to_string())?;
        sheet.write_number(r, 3, row.streams as f64)?;
        sheet.write_string(r, 4, row.region.as_str())?;
    }

    workbook.save(path)?;
    Ok(())
}

/// Write the run in every requested format under `dir`.
/// Returns the paths written.
pub fn export_all(output: &RunOutput, dir: &Path, formats: &[ExportFormat]) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(dir)?;
    let rows = export_rows(output);
    let mut written = Vec::new();

    for format in formats {
        let path = dir.join(format!("{FILE_STEM}.{}", format.extension()));
        match format {
            ExportFormat::Csv => write_csv(fs::File::create(&path)?, &rows)?,
            ExportFormat::Excel => write_excel(&path, &rows)?,
            ExportFormat::Json => write_json(&path, &rows)?,
        }
        info!("💾 Exported {} rows to {}", rows.len(), path.display());
        written.push(path);
    }

    if let Some(path) = write_insights(output, dir)? {
        written.push(path);
    }

    Ok(written)
}

/// Save AI commentary, one block per track, if any track has some
pub fn write_insights(output: &RunOutput, dir: &Path) -> Result<Option<PathBuf>, ExportError> {
    let blocks: Vec<String> = output
        .tracks
        .iter()
        .filter_map(|t| {
            t.insight
                .as_ref()
                .map(|text| format!("{} ({})\n{}\n", t.track.name(), t.track.id(), text))
        })
        .collect();

    if blocks.is_empty() {
        return Ok(None);
    }

    let path = dir.join("insights.txt");
    fs::write(&path, blocks.join("\n"))?;
    info!("💾 Saved AI insights to {}", path.display());
    Ok(Some(path))
}
