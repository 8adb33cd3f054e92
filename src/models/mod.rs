mod track;

pub use track::{Track, TrackId};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Market a stream count belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Global,
    Us,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Global => "global",
            Region::Us => "us",
        }
    }

    /// Column header used by KWORB for this region
    pub fn column_header(&self) -> &'static str {
        match self {
            Region::Global => "Global",
            Region::Us => "US",
        }
    }

    pub fn all() -> [Region; 2] {
        [Region::Global, Region::Us]
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cell pair read off the page, unparsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    pub track_id: TrackId,
    pub date: String,
    pub region: Region,
    pub streams: String,
}

impl RawRow {
    pub fn new(track_id: &TrackId, date: &str, region: Region, streams: &str) -> Self {
        Self {
            track_id: track_id.clone(),
            date: date.to_string(),
            region,
            streams: streams.to_string(),
        }
    }
}

/// Normalized streaming observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub track_id: TrackId,
    pub date: NaiveDate,
    pub streams: u64,
    pub region: Region,
}
