use chrono::NaiveDate;
use std::path::PathBuf;
use url::Url;

use crate::error::ConfigError;
use crate::presenter::export::ExportFormat;
use crate::scrapers::ScrapeOptions;

pub const DEFAULT_KWORB_BASE_URL: &str = "https://kworb.net/spotify";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OUTPUT_DIR: &str = "data";

/// Non-empty environment variable, if set
fn env_var(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Settings for the remote commentary call
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Read once from `OPENAI_API_KEY`
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl SummarizerConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env_var("OPENAI_API_KEY"),
            model: env_var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            base_url: env_var("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            timeout_secs: 30,
        }
    }
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Everything a run needs, assembled once at start-up and passed down
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub scrape: ScrapeOptions,
    pub summarizer: SummarizerConfig,
    pub kworb_base_url: String,
    pub output_dir: PathBuf,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub formats: Vec<ExportFormat>,
    pub insights: bool,
}

impl AppConfig {
    /// Defaults overlaid with environment variables
    pub fn from_env() -> Self {
        Self {
            summarizer: SummarizerConfig::from_env(),
            kworb_base_url: env_var("KWORB_BASE_URL").unwrap_or_else(|| DEFAULT_KWORB_BASE_URL.to_string()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(ConfigError::Invalid {
                    key: "start-date",
                    reason: format!("{start} is after end date {end}"),
                });
            }
        }

        if self.scrape.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "timeout",
                reason: "must be at least one second".to_string(),
            });
        }

        if self.scrape.workers == 0 {
            return Err(ConfigError::Invalid {
                key: "workers",
                reason: "must be at least 1".to_string(),
            });
        }

        for (key, value) in [
            ("KWORB_BASE_URL", &self.kworb_base_url),
            ("OPENAI_BASE_URL", &self.summarizer.base_url),
        ] {
            let url = Url::parse(value).map_err(|e| ConfigError::Invalid {
                key,
                reason: format!("{value}: {e}"),
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!("{value}: scheme must be http or https"),
                });
            }
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scrape: ScrapeOptions::default(),
            summarizer: SummarizerConfig::default(),
            kworb_base_url: DEFAULT_KWORB_BASE_URL.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            start_date: None,
            end_date: None,
            formats: vec![ExportFormat::Csv],
            insights: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.scrape.retry_count, 3);
        assert_eq!(cfg.scrape.timeout_secs, 10);
        assert!(cfg.scrape.headless);
    }

    #[test]
    fn rejects_inverted_range() {
        let cfg = AppConfig {
            start_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { key: "start-date", .. })));
    }

    #[test]
    fn rejects_non_http_base() {
        let cfg = AppConfig {
            kworb_base_url: "ftp://kworb.net/spotify".to_string(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
