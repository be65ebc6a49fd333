//! Epi-week aggregation of readings.
//!
//! Only weeks that contain at least one reading are emitted. A metric with
//! no samples reports `None` ("unavailable") rather than zero, since zero is
//! a legitimate sensor value.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::epi_week::{epi_week_of, EpiWeek};
use crate::models::Reading;

// ---

/// Average, minimum and maximum of one metric over a week.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSummary {
    // ---
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

/// Aggregate over every reading that falls in one epi week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekSummary {
    // ---
    /// `"{year}-EW{week:02}"`
    pub key: String,
    /// `"SE {week}/{year}"`
    pub name: String,
    pub year: i32,
    pub week: u32,
    pub count: usize,
    pub temperature: Option<MetricSummary>,
    pub humidity: Option<MetricSummary>,
    pub co2: Option<MetricSummary>,
    pub acoustic: Option<MetricSummary>,
}

#[derive(Debug, Clone, Copy)]
struct Accumulator {
    sum: f64,
    count: usize,
    min: f64,
    max: f64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            sum: 0.0,
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl Accumulator {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn finish(&self) -> Option<MetricSummary> {
        (self.count > 0).then(|| MetricSummary {
            avg: self.sum / self.count as f64,
            min: self.min,
            max: self.max,
        })
    }
}

#[derive(Debug, Default)]
struct WeekBucket {
    count: usize,
    temperature: Accumulator,
    humidity: Accumulator,
    co2: Accumulator,
    acoustic: Accumulator,
}

/// Bucket readings by epi week, ordered by (year, week) ascending.
///
/// Input order does not matter. Readings are keyed by the epi year, so a
/// reading from Jan 1 can land in the previous year's last week.
pub fn aggregate_by_epi_week(readings: &[Reading]) -> Vec<WeekSummary> {
    // ---
    let mut buckets: BTreeMap<EpiWeek, WeekBucket> = BTreeMap::new();

    for reading in readings {
        let bucket = buckets.entry(epi_week_of(reading.timestamp)).or_default();
        bucket.count += 1;
        bucket.temperature.push(reading.temperature);
        bucket.humidity.push(reading.humidity);
        bucket.co2.push(reading.co2);
        bucket.acoustic.push(reading.acoustic);
    }

    buckets
        .into_iter()
        .map(|(week, bucket)| WeekSummary {
            key: week.key(),
            name: week.label(),
            year: week.year,
            week: week.week,
            count: bucket.count,
            temperature: bucket.temperature.finish(),
            humidity: bucket.humidity.finish(),
            co2: bucket.co2.finish(),
            acoustic: bucket.acoustic.finish(),
        })
        .collect()
}
