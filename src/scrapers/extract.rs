use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::error::ScrapeError;
use crate::models::{RawRow, Region, TrackId};
use crate::scrapers::types::StreamTable;

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Read a KWORB streaming table into raw rows, keeping document order.
///
/// Column positions come from the header row. "Total" and "Peak" rows are
/// kept apart from the data rows, and `--` or empty cells are skipped.
pub fn parse_stream_table(track_id: &TrackId, table_html: &str) -> Result<StreamTable, ScrapeError> {
    let fragment = Html::parse_fragment(table_html);
    let tr_selector = Selector::parse("tr").unwrap();
    let th_selector = Selector::parse("th").unwrap();
    let td_selector = Selector::parse("td").unwrap();

    let rows: Vec<ElementRef> = fragment.select(&tr_selector).collect();
    if rows.is_empty() {
        return Err(ScrapeError::ElementNotFound("table has no rows".to_string()));
    }

    let headers: Vec<String> = rows
        .iter()
        .map(|row| row.select(&th_selector).map(|th| cell_text(&th)).collect::<Vec<_>>())
        .find(|cells| !cells.is_empty())
        .ok_or_else(|| ScrapeError::ElementNotFound("table has no header row".to_string()))?;

    let date_idx = headers
        .iter()
        .position(|h| h == "Date")
        .ok_or_else(|| ScrapeError::ElementNotFound("no 'Date' column".to_string()))?;

    let columns: Vec<(Region, usize)> = Region::all()
        .into_iter()
        .filter_map(|region| {
            headers
                .iter()
                .position(|h| h == region.column_header())
                .map(|idx| (region, idx))
        })
        .collect();

    if !columns.iter().any(|(region, _)| *region == Region::Global) {
        return Err(ScrapeError::ElementNotFound("no 'Global' column".to_string()));
    }

    let mut table = StreamTable::default();

    for (row_idx, row) in rows.iter().enumerate() {
        let cells: Vec<String> = row.select(&td_selector).map(|td| cell_text(&td)).collect();
        if cells.is_empty() {
            continue;
        }

        let Some(date) = cells.get(date_idx) else {
            warn!(track = %track_id, row = row_idx, "row has no date cell, skipping");
            continue;
        };

        let summary = match date.to_lowercase().as_str() {
            "total" => Some(&mut table.totals),
            "peak" => Some(&mut table.peaks),
            _ => None,
        };

        if let Some(summary) = summary {
            for (region, idx) in &columns {
                if let Some(value) = cells.get(*idx).filter(|v| !is_absent(v)) {
                    summary.insert(*region, value.clone());
                }
            }
            continue;
        }

        for (region, idx) in &columns {
            match cells.get(*idx) {
                Some(value) if is_absent(value) => {}
                Some(value) => table.rows.push(RawRow::new(track_id, date, *region, value)),
                None => {
                    warn!(track = %track_id, row = row_idx, region = %region, "row is missing a cell");
                }
            }
        }
    }

    if table.rows.is_empty() {
        return Err(ScrapeError::ElementNotFound("table has no data rows".to_string()));
    }

    debug!(track = %track_id, rows = table.rows.len(), "parsed stream table");
    Ok(table)
}

fn is_absent(value: &str) -> bool {
    value.is_empty() || value == "--"
}

/// Document `<title>`, trimmed
pub fn page_title(document_html: &str) -> Option<String> {
    let document = Html::parse_document(document_html);
    let selector = Selector::parse("title").unwrap();
    document
        .select(&selector)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
        <table>
          <tr><th>Date</th><th>Global</th><th>US</th></tr>
          <tr><td>Total</td><td>5,000</td><td>1,200</td></tr>
          <tr><td>Peak</td><td>1,000</td><td>--</td></tr>
          <tr><td>2024/01/02</td><td>1,000</td><td>400</td></tr>
          <tr><td>2024/01/01</td><td>900</td><td>--</td></tr>
        </table>
    "#;

    fn id() -> TrackId {
        TrackId::parse("abc123").unwrap()
    }

    #[test]
    fn keeps_document_order_and_splits_regions() {
        let table = parse_stream_table(&id(), TABLE).unwrap();
        let got: Vec<(&str, Region, &str)> = table
            .rows
            .iter()
            .map(|r| (r.date.as_str(), r.region, r.streams.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("2024/01/02", Region::Global, "1,000"),
                ("2024/01/02", Region::Us, "400"),
                ("2024/01/01", Region::Global, "900"),
            ]
        );
        assert_eq!(table.totals.get(&Region::Global).map(String::as_str), Some("5,000"));
        assert_eq!(table.peaks.get(&Region::Us), None);
    }

    #[test]
    fn global_only_table_is_accepted() {
        let html = "<table><tr><th>Date</th><th>Global</th></tr><tr><td>2024/01/01</td><td>10</td></tr></table>";
        let table = parse_stream_table(&id(), html).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].region, Region::Global);
    }

    #[test]
    fn missing_columns_are_element_errors() {
        let html = "<table><tr><th>Pos</th><th>Artist</th></tr><tr><td>1</td><td>x</td></tr></table>";
        assert!(matches!(
            parse_stream_table(&id(), html),
            Err(ScrapeError::ElementNotFound(_))
        ));
    }

    #[test]
    fn header_only_table_has_no_data() {
        let html = "<table><tr><th>Date</th><th>Global</th></tr></table>";
        assert!(matches!(
            parse_stream_table(&id(), html),
            Err(ScrapeError::ElementNotFound(_))
        ));
    }

    #[test]
    fn reads_title() {
        let html = "<html><head><title> Artist - Song </title></head><body></body></html>";
        assert_eq!(page_title(html).as_deref(), Some("Artist - Song"));
        assert_eq!(page_title("<html><body></body></html>"), None);
    }
}
