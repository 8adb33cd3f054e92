use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Region, StreamRecord};

/// Totals and peak for one region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionStats {
    pub total: u64,
    pub days: usize,
    pub peak_date: NaiveDate,
    pub peak_streams: u64,
    pub daily_average: f64,
}

/// Summary of one track's cleaned records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackStats {
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub regions: BTreeMap<Region, RegionStats>,
}

impl TrackStats {
    pub fn from_records(records: &[StreamRecord]) -> Self {
        let mut stats = TrackStats {
            first_date: records.iter().map(|r| r.date).min(),
            last_date: records.iter().map(|r| r.date).max(),
            regions: BTreeMap::new(),
        };

        for record in records {
            let entry = stats.regions.entry(record.region).or_insert(RegionStats {
                total: 0,
                days: 0,
                peak_date: record.date,
                peak_streams: record.streams,
                daily_average: 0.0,
            });
            entry.total = entry.total.saturating_add(record.streams);
            entry.days += 1;
            // Earliest date wins ties
            if record.streams > entry.peak_streams
                || (record.streams == entry.peak_streams && record.date < entry.peak_date)
            {
                entry.peak_streams = record.streams;
                entry.peak_date = record.date;
            }
        }

        for region in stats.regions.values_mut() {
            region.daily_average = region.total as f64 / region.days as f64;
        }

        stats
    }

    pub fn region(&self, region: Region) -> Option<&RegionStats> {
        self.regions.get(&region)
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
