use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use html_escape::encode_text;
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use crate::models::Region;
use crate::pipeline::{RunOutput, TrackData};
use crate::presenter::export::{export_rows, write_csv, ExportRow};
use crate::presenter::{group_thousands, page_totals_line, pivot_by_date};

const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 240.0;
const CHART_PAD: f64 = 30.0;

fn region_color(region: Region) -> &'static str {
    match region {
        Region::Global => "#1db954",
        Region::Us => "#3b82f6",
    }
}

/// Inline SVG line chart of daily streams, one line per region
pub fn render_chart(data: &TrackData) -> String {
    let (Some(first), Some(last)) = (data.stats.first_date, data.stats.last_date) else {
        return "<p>No streaming history data available.</p>".to_string();
    };

    let span_days = (last - first).num_days().max(1) as f64;
    let max_streams = data.records.iter().map(|r| r.streams).max().unwrap_or(0).max(1) as f64;
    let plot_w = CHART_WIDTH - 2.0 * CHART_PAD;
    let plot_h = CHART_HEIGHT - 2.0 * CHART_PAD;

    let mut svg = format!(
        r##"<svg viewBox="0 0 {w} {h}" width="{w}" height="{h}" role="img"><rect width="100%" height="100%" fill="#fafafa"/>"##,
        w = CHART_WIDTH,
        h = CHART_HEIGHT
    );

    for region in Region::all() {
        let points: Vec<String> = data
            .records
            .iter()
            .filter(|r| r.region == region)
            .map(|r| {
                let x = CHART_PAD + (r.date - first).num_days() as f64 / span_days * plot_w;
                let y = CHART_PAD + plot_h - r.streams as f64 / max_streams * plot_h;
                format!("{x:.1},{y:.1}")
            })
            .collect();
        if points.is_empty() {
            continue;
        }
        let _ = write!(
            svg,
            r#"<polyline fill="none" stroke="{}" stroke-width="2" points="{}"><title>{}</title></polyline>"#,
            region_color(region),
            points.join(" "),
            region.column_header()
        );
    }

    let _ = write!(
        svg,
        r#"<text x="{pad}" y="{bottom}" font-size="11">{first}</text><text x="{right}" y="{bottom}" font-size="11" text-anchor="end">{last}</text><text x="{pad}" y="18" font-size="11">max {max}</text></svg>"#,
        pad = CHART_PAD,
        right = CHART_WIDTH - CHART_PAD,
        bottom = CHART_HEIGHT - 8.0,
        max = group_thousands(max_streams as u64),
    );
    svg
}

fn render_track_section(out: &mut String, data: &TrackData) {
    let _ = write!(
        out,
        r#"<section><h2>🎵 {}</h2><p><a href="{}">{}</a></p>"#,
        encode_text(data.track.name()),
        encode_text(data.track.url()),
        encode_text(data.track.id().as_str())
    );

    out.push_str(r#"<div class="metrics">"#);
    for (region, rs) in &data.stats.regions {
        let _ = write!(
            out,
            r#"<div class="metric"><span>Total {} Streams</span><b>{}</b><small>peak {} on {}</small></div>"#,
            region.column_header(),
            group_thousands(rs.total),
            group_thousands(rs.peak_streams),
            rs.peak_date
        );
    }
    out.push_str("</div>");

    if let Some(line) = page_totals_line(data) {
        let _ = write!(out, r#"<p class="muted">{}</p>"#, encode_text(&line));
    }

    out.push_str(&render_chart(data));

    if let Some(insight) = &data.insight {
        let _ = write!(out, r#"<blockquote>🤖 {}</blockquote>"#, encode_text(insight));
    } else if let Some(err) = &data.insight_error {
        let _ = write!(out, r#"<p class="muted">AI insight unavailable: {}</p>"#, encode_text(err));
    }

    out.push_str("<table><thead><tr><th>Date</th><th>Global</th><th>US</th></tr></thead><tbody>");
    for (date, values) in pivot_by_date(&data.records) {
        let cell = |region: Region| values.get(&region).map(|v| group_thousands(*v)).unwrap_or_else(|| "--".to_string());
        let _ = write!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            date,
            cell(Region::Global),
            cell(Region::Us)
        );
    }
    out.push_str("</tbody></table></section>");
}

/// Full dashboard page for a run
pub fn render_html(output: &RunOutput) -> String {
    let mut out = String::from(
        r#"<!doctype html><html><head><meta charset="utf-8"><title>Spotify Chart History</title><style>
body{font-family:system-ui,sans-serif;margin:2rem;max-width:900px}
.metrics{display:flex;gap:2rem;margin:1rem 0}.metric span{display:block;color:#555}.metric b{font-size:1.6rem}
.metric small{display:block;color:#777}table{border-collapse:collapse;width:100%}td,th{padding:.25rem .5rem;text-align:right}
td:first-child,th:first-child{text-align:left}tr:nth-child(even){background:#f4f4f4}.muted{color:#777}
blockquote{border-left:4px solid #1db954;margin:1rem 0;padding:.5rem 1rem;background:#f6fff9}
</style></head><body><h1>Spotify Chart History</h1><p><a href="/download.csv">📥 Download CSV</a></p>"#,
    );

    for data in &output.tracks {
        render_track_section(&mut out, data);
    }

    if !output.failures.is_empty() {
        out.push_str("<section><h2>Failed tracks</h2><ul>");
        for f in &output.failures {
            let _ = write!(
                out,
                "<li>{} ({}): {} after {} attempts</li>",
                encode_text(f.track.name()),
                encode_text(f.track.id().as_str()),
                encode_text(&f.error.to_string()),
                f.attempts
            );
        }
        out.push_str("</ul></section>");
    }

    out.push_str("</body></html>");
    out
}

struct DashboardState {
    html: String,
    rows: Vec<ExportRow>,
}

pub fn router(output: &RunOutput) -> Router {
    let state = Arc::new(DashboardState {
        html: render_html(output),
        rows: export_rows(output),
    });

    Router::new()
        .route("/", get(index))
        .route("/api/records", get(records))
        .route("/download.csv", get(download_csv))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

async fn index(State(state): State<Arc<DashboardState>>) -> Html<String> {
    Html(state.html.clone())
}

async fn records(State(state): State<Arc<DashboardState>>) -> Json<Vec<ExportRow>> {
    Json(state.rows.clone())
}

async fn download_csv(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    let mut body = Vec::new();
    if let Err(e) = write_csv(&mut body, &state.rows) {
        error!("CSV download failed: {e}");
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"spotify_streams.csv\""),
        ],
        body,
    ))
}

/// Serve the dashboard until the process is stopped
pub async fn serve(output: &RunOutput, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("📊 Dashboard running at http://{}", addr);
    axum::serve(listener, router(output)).await
}
