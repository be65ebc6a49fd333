//! Favorable-condition window scanner.
//!
//! Looks for runs of [`WINDOW_SIZE`] consecutive readings in which every
//! reading satisfies every [`RangePredicate`]. A matched window is consumed
//! whole: scanning resumes right after it, so a qualifying run of `N`
//! readings yields `N / 9` disjoint windows instead of `N - 8` overlapping
//! ones.
//!
//! The input must already be sorted by timestamp ascending.

use serde::{Deserialize, Serialize};

use crate::models::Reading;

// ---

/// Number of consecutive qualifying readings that make a sustained condition.
pub const WINDOW_SIZE: usize = 9;

/// Numeric reading field a predicate applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Temperature,
    Humidity,
    Co2,
    Acoustic,
}

impl Field {
    pub fn value(&self, reading: &Reading) -> f64 {
        match self {
            Field::Temperature => reading.temperature,
            Field::Humidity => reading.humidity,
            Field::Co2 => reading.co2,
            Field::Acoustic => reading.acoustic,
        }
    }
}

/// Comparison applied to a field value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Comparator {
    Gt { threshold: f64 },
    Lt { threshold: f64 },
    Ge { threshold: f64 },
    Le { threshold: f64 },
    Eq { threshold: f64 },
    /// Inclusive on both ends.
    Between { lo: f64, hi: f64 },
}

impl Comparator {
    pub fn test(&self, value: f64) -> bool {
        match *self {
            Comparator::Gt { threshold } => value > threshold,
            Comparator::Lt { threshold } => value < threshold,
            Comparator::Ge { threshold } => value >= threshold,
            Comparator::Le { threshold } => value <= threshold,
            Comparator::Eq { threshold } => value == threshold,
            Comparator::Between { lo, hi } => value >= lo && value <= hi,
        }
    }
}

/// One criterion: `field <comparator>`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangePredicate {
    // ---
    pub field: Field,
    #[serde(flatten)]
    pub comparator: Comparator,
}

impl RangePredicate {
    pub fn new(field: Field, comparator: Comparator) -> Self {
        Self { field, comparator }
    }

    pub fn between(field: Field, lo: f64, hi: f64) -> Self {
        Self::new(field, Comparator::Between { lo, hi })
    }

    pub fn at_least(field: Field, threshold: f64) -> Self {
        Self::new(field, Comparator::Ge { threshold })
    }

    pub fn matches(&self, reading: &Reading) -> bool {
        self.comparator.test(self.field.value(reading))
    }
}

/// Conditions favorable to mosquito proliferation: 26–30 °C, humidity of at
/// least 65 %, CO2 between 50 and 200 ppm.
pub fn favorable_conditions() -> Vec<RangePredicate> {
    vec![
        RangePredicate::between(Field::Temperature, 26.0, 30.0),
        RangePredicate::at_least(Field::Humidity, 65.0),
        RangePredicate::between(Field::Co2, 50.0, 200.0),
    ]
}

/// True when the reading satisfies every criterion.
pub fn qualifies(reading: &Reading, criteria: &[RangePredicate]) -> bool {
    criteria.iter().all(|c| c.matches(reading))
}

/// A run of exactly [`WINDOW_SIZE`] qualifying readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertWindow<'a> {
    // ---
    /// Index of the first reading in the scanned slice.
    pub start: usize,
    pub readings: &'a [Reading],
}

impl<'a> AlertWindow<'a> {
    /// Index one past the last reading.
    pub fn end(&self) -> usize {
        self.start + self.readings.len()
    }

    /// Most recent reading of the window.
    pub fn last(&self) -> &'a Reading {
        &self.readings[self.readings.len() - 1]
    }

    pub fn average(&self, field: Field) -> f64 {
        let sum: f64 = self.readings.iter().map(|r| field.value(r)).sum();
        sum / self.readings.len() as f64
    }
}

/// Scan readings (sorted by timestamp ascending) for qualifying windows.
///
/// Returns an empty vector when fewer than [`WINDOW_SIZE`] readings are
/// given. The slice is never reordered.
pub fn scan_for_alerts<'a>(
    readings: &'a [Reading],
    criteria: &[RangePredicate],
) -> Vec<AlertWindow<'a>> {
    // ---
    let mut windows = Vec::new();
    if readings.len() < WINDOW_SIZE {
        return windows;
    }

    let mut i = 0;
    while i <= readings.len() - WINDOW_SIZE {
        let window = &readings[i..i + WINDOW_SIZE];

        if window.iter().all(|r| qualifies(r, criteria)) {
            windows.push(AlertWindow {
                start: i,
                readings: window,
            });
            i += WINDOW_SIZE;
        } else {
            i += 1;
        }
    }

    windows
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn reading(i: i64, temperature: f64, humidity: f64, co2: f64) -> Reading {
        Reading {
            id: i,
            node_id: "node-01".into(),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap() + Duration::minutes(i),
            temperature,
            humidity,
            co2,
            acoustic: 450.0,
            latitude: None,
            longitude: None,
        }
    }

    fn good(i: i64) -> Reading {
        reading(i, 28.0, 70.0, 100.0)
    }

    fn bad(i: i64) -> Reading {
        reading(i, 18.0, 40.0, 800.0)
    }

    fn run(n: i64) -> Vec<Reading> {
        (0..n).map(good).collect()
    }

    #[test]
    fn test_empty_and_short_input() {
        // ---
        let criteria = favorable_conditions();
        assert!(scan_for_alerts(&[], &criteria).is_empty());
        assert!(scan_for_alerts(&run(8), &criteria).is_empty());
    }

    #[test]
    fn test_exactly_nine_yields_one_window() {
        // ---
        let readings = run(9);
        let windows = scan_for_alerts(&readings, &favorable_conditions());

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start, 0);
        assert_eq!(windows[0].readings.len(), WINDOW_SIZE);
        assert_eq!(windows[0].average(Field::Temperature), 28.0);
        assert_eq!(windows[0].last().id, 8);
    }

    #[test]
    fn test_eighteen_yields_two_disjoint_windows() {
        // ---
        let readings = run(18);
        let windows = scan_for_alerts(&readings, &favorable_conditions());

        assert_eq!(windows.len(), 2);
        assert_eq!((windows[0].start, windows[0].end()), (0, 9));
        assert_eq!((windows[1].start, windows[1].end()), (9, 18));

        let first: Vec<i64> = windows[0].readings.iter().map(|r| r.id).collect();
        let second: Vec<i64> = windows[1].readings.iter().map(|r| r.id).collect();
        assert!(first.iter().all(|id| !second.contains(id)));
    }

    #[test]
    fn test_long_run_emits_floor_n_over_nine() {
        // ---
        let criteria = favorable_conditions();
        assert_eq!(scan_for_alerts(&run(17), &criteria).len(), 1);
        assert_eq!(scan_for_alerts(&run(26), &criteria).len(), 2);
        assert_eq!(scan_for_alerts(&run(27), &criteria).len(), 3);
    }

    #[test]
    fn test_slides_to_qualifying_block() {
        // ---
        // Only indices 2..=10 qualify among 12 readings
        let readings: Vec<Reading> = (0..12)
            .map(|i| if (2..=10).contains(&i) { good(i) } else { bad(i) })
            .collect();
        let windows = scan_for_alerts(&readings, &favorable_conditions());

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start, 2);
        assert_eq!(windows[0].end(), 11);
        assert_eq!(windows[0].readings.first().unwrap().id, 2);
        assert_eq!(windows[0].last().id, 10);
    }

    #[test]
    fn test_single_violation_breaks_window() {
        // ---
        let mut readings = run(9);
        readings[4].co2 = 300.0;
        assert!(scan_for_alerts(&readings, &favorable_conditions()).is_empty());
    }

    #[test]
    fn test_violation_splits_long_run() {
        // ---
        // 9 good, 1 bad, 9 good
        let readings: Vec<Reading> = (0..19)
            .map(|i| if i == 9 { bad(i) } else { good(i) })
            .collect();
        let windows = scan_for_alerts(&readings, &favorable_conditions());

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].start, 0);
        assert_eq!(windows[1].start, 10);
    }

    #[test]
    fn test_between_is_inclusive() {
        // ---
        let lo = reading(0, 26.0, 65.0, 50.0);
        let hi = reading(1, 30.0, 100.0, 200.0);
        let above = reading(2, 30.01, 70.0, 100.0);
        let criteria = favorable_conditions();

        assert!(qualifies(&lo, &criteria));
        assert!(qualifies(&hi, &criteria));
        assert!(!qualifies(&above, &criteria));
    }

    #[test]
    fn test_comparators() {
        // ---
        assert!(Comparator::Gt { threshold: 1.0 }.test(1.5));
        assert!(!Comparator::Gt { threshold: 1.0 }.test(1.0));
        assert!(Comparator::Lt { threshold: 1.0 }.test(0.5));
        assert!(!Comparator::Lt { threshold: 1.0 }.test(1.0));
        assert!(Comparator::Ge { threshold: 1.0 }.test(1.0));
        assert!(Comparator::Le { threshold: 1.0 }.test(1.0));
        assert!(Comparator::Eq { threshold: 1.0 }.test(1.0));
        assert!(!Comparator::Eq { threshold: 1.0 }.test(1.1));
    }

    #[test]
    fn test_acoustic_criterion() {
        // ---
        let criteria = [RangePredicate::new(
            Field::Acoustic,
            Comparator::Lt { threshold: 500.0 },
        )];
        assert_eq!(scan_for_alerts(&run(9), &criteria).len(), 1);

        let strict = [RangePredicate::new(
            Field::Acoustic,
            Comparator::Gt { threshold: 500.0 },
        )];
        assert!(scan_for_alerts(&run(9), &strict).is_empty());
    }

    #[test]
    fn test_input_is_not_reordered() {
        // ---
        let readings = run(10);
        let before = readings.clone();
        let _ = scan_for_alerts(&readings, &favorable_conditions());
        assert_eq!(readings, before);
    }

    #[test]
    fn test_criteria_json_shape() {
        // ---
        let json = r#"[
            {"field":"temperature","op":"between","lo":26,"hi":30},
            {"field":"humidity","op":"ge","threshold":65},
            {"field":"co2","op":"between","lo":50,"hi":200}
        ]"#;
        let parsed: Vec<RangePredicate> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, favorable_conditions());
    }
}
