use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::error::TrackIdError;

/// Canonical Spotify track id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    /// Normalize a track reference into its canonical id.
    ///
    /// Accepts an open.spotify.com URL, a `spotify:track:` URI, a kworb.net
    /// track page URL or a bare id.
    pub fn parse(input: &str) -> Result<Self, TrackIdError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(TrackIdError::Empty);
        }

        if let Some(rest) = input.strip_prefix("spotify:") {
            return match rest.split_once(':') {
                Some(("track", id)) => Self::from_bare(id),
                _ => Err(TrackIdError::NotATrack(input.to_string())),
            };
        }

        let looks_like_url = input.contains("://")
            || input.starts_with("open.spotify.com")
            || input.starts_with("kworb.net")
            || input.starts_with("www.kworb.net");

        if looks_like_url {
            let with_scheme = if input.contains("://") {
                input.to_string()
            } else {
                format!("https://{input}")
            };
            let url = Url::parse(&with_scheme)
                .map_err(|_| TrackIdError::NotATrack(input.to_string()))?;
            return Self::from_url(&url, input);
        }

        Self::from_bare(input)
    }

    fn from_url(url: &Url, original: &str) -> Result<Self, TrackIdError> {
        let host = url.host_str().unwrap_or("");
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        // Both sites put the id right after a "track" segment
        let after_track = segments
            .iter()
            .position(|seg| *seg == "track")
            .and_then(|idx| segments.get(idx + 1));

        match (host, after_track) {
            (h, Some(id)) if h.ends_with("open.spotify.com") => Self::from_bare(id),
            (h, Some(id)) if h.ends_with("kworb.net") => {
                Self::from_bare(id.strip_suffix(".html").unwrap_or(id))
            }
            _ => Err(TrackIdError::NotATrack(original.to_string())),
        }
    }

    fn from_bare(id: &str) -> Result<Self, TrackIdError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(TrackIdError::Empty);
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(TrackIdError::InvalidId(id.to_string()));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A track to scrape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    id: TrackId,
    name: String,
    url: String,
}

impl Track {
    pub fn new(id: TrackId, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            url: url.into(),
        }
    }

    /// Track whose page lives under the given KWORB base,
    /// e.g. `https://kworb.net/spotify`. Falls back to the id for the name.
    pub fn on_kworb(id: TrackId, name: Option<String>, base_url: &str) -> Self {
        let url = format!("{}/track/{}.html", base_url.trim_end_matches('/'), id);
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| id.to_string());
        Self::new(id, name, url)
    }

    /// Copy of this track with a different display name
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self::new(self.id.clone(), name, self.url.clone())
    }

    pub fn id(&self) -> &TrackId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the display name is still just the id
    pub fn has_placeholder_name(&self) -> bool {
        self.name == self.id.as_str()
    }
}
