use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::SummarizerConfig;
use crate::error::SummarizeError;
use crate::models::{StreamRecord, Track};
use crate::stats::TrackStats;

/// Most recent records included verbatim in the prompt
const PROMPT_SAMPLE: usize = 30;

const SYSTEM_PROMPT: &str = "You are a music industry analyst. Given daily Spotify streaming \
figures for one track, describe the trend, notable peaks or drops, and how the US market \
compares to the global total when both are present. Be concise: at most five sentences, \
plain text, no markdown.";

/// Produces free-text commentary for a track's streaming history
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, track: &Track, records: &[StreamRecord]) -> Result<String, SummarizeError>;

    fn provider_name(&self) -> &'static str;
}

/// Build the user prompt for one track
pub fn build_prompt(track: &Track, records: &[StreamRecord]) -> String {
    let stats = TrackStats::from_records(records);
    let mut prompt = String::new();

    let _ = writeln!(prompt, "Track: {} (Spotify id {})", track.name(), track.id());
    if let (Some(first), Some(last)) = (stats.first_date, stats.last_date) {
        let _ = writeln!(prompt, "Period: {first} to {last}");
    }
    for (region, rs) in &stats.regions {
        let _ = writeln!(
            prompt,
            "{}: total {} streams over {} days, daily average {:.0}, peak {} on {}",
            region.column_header(),
            rs.total,
            rs.days,
            rs.daily_average,
            rs.peak_streams,
            rs.peak_date
        );
    }

    let mut dates: Vec<_> = records.iter().map(|r| r.date).collect();
    dates.dedup();
    let cutoff = dates.len().saturating_sub(PROMPT_SAMPLE);
    let recent_from = dates.get(cutoff).copied();

    let _ = writeln!(prompt, "\nRecent daily figures (date,region,streams):");
    for record in records.iter().filter(|r| recent_from.map_or(false, |d| r.date >= d)) {
        let _ = writeln!(prompt, "{},{},{}", record.date, record.region, record.streams);
    }

    prompt
}

/// OpenAI-compatible chat completions client
pub struct OpenAiSummarizer {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl OpenAiSummarizer {
    pub fn new(cfg: &SummarizerConfig) -> Result<Self, SummarizeError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| SummarizeError::Network(format!("build client: {e}")))?;

        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, track: &Track, records: &[StreamRecord]) -> Result<String, SummarizeError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(SummarizeError::MissingCredential("OPENAI_API_KEY"))?;

        let prompt = build_prompt(track, records);
        debug!(track = %track.id(), chars = prompt.len(), "Sending summary request");

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.3,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            let text = response.text().await.unwrap_or_default();
            return Err(SummarizeError::RateLimited(text));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SummarizeError::Remote(format!("HTTP {status}: {text}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SummarizeError::Remote(format!("unexpected response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| SummarizeError::Remote("empty completion".to_string()))?;

        info!(track = %track.id(), "🤖 Received AI insight ({} chars)", text.len());
        Ok(text)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}
