//! Running min/max/average accumulator for a named series of data points.
//!
//! Each sampled quantity (PSS of one process, free pages of one buddy order,
//! bytes used in one CMA region, ...) gets its own [`Measurement`] that data
//! points are folded into one at a time, so nothing grows with the number of
//! samples taken over the capture window.

use serde_json::{json, Value};

/// Folds a stream of data points into running min/max/average values.
///
/// The running total is a plain `f64`; precision degrades on very long
/// capture sessions with large values. This is an accepted limitation.
#[derive(Debug, Clone)]
pub struct Measurement {
    name: String,
    count: u64,
    min: f64,
    max: f64,
    total: f64,
    average: f64,
}

impl Measurement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: 0,
            min: f64::MAX,
            max: f64::MIN,
            total: 0.0,
            average: 0.0,
        }
    }

    /// Add a new data point and update the min/max/average values.
    ///
    /// Values are taken as-is; domain validity (non-negative sizes etc) is
    /// the caller's responsibility.
    pub fn add_data_point(&mut self, value: f64) {
        if value < self.min {
            self.min = value;
        }

        if value > self.max {
            self.max = value;
        }

        self.total += value;
        self.count += 1;

        self.average = self.total / self.count as f64;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn min_rounded(&self) -> i64 {
        self.min.round() as i64
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn max_rounded(&self) -> i64 {
        self.max.round() as i64
    }

    pub fn average(&self) -> f64 {
        self.average
    }

    pub fn average_rounded(&self) -> i64 {
        self.average.round() as i64
    }

    /// Render as a `{min, max, average}` object with rounded values.
    pub fn to_json(&self) -> Value {
        json!({
            "min": self.min_rounded(),
            "max": self.max_rounded(),
            "average": self.average_rounded(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_data_point() {
        let mut m = Measurement::new("Value KB");
        m.add_data_point(42.0);

        assert_eq!(m.count(), 1);
        assert_eq!(m.min(), 42.0);
        assert_eq!(m.max(), 42.0);
        assert_eq!(m.average(), 42.0);
    }

    #[test]
    fn test_min_average_max_ordering() {
        // For any sequence with at least one point, min <= average <= max
        // and average == total / count.
        let values = [10.0, 12.0, 9.0, 11.0, 10.0, 300.5, 0.25];

        let mut m = Measurement::new("Pss");
        let mut total = 0.0;
        for v in values {
            m.add_data_point(v);
            total += v;
        }

        assert!(m.min() <= m.average());
        assert!(m.average() <= m.max());
        assert_eq!(m.min(), 0.25);
        assert_eq!(m.max(), 300.5);
        assert!((m.average() - total / values.len() as f64).abs() < 1e-9);
    }

    #[test]
    fn test_negative_and_zero_values_accepted() {
        // The accumulator is purely numeric - negative deltas are valid input.
        let mut m = Measurement::new("Delta");
        m.add_data_point(-5.0);
        m.add_data_point(0.0);
        m.add_data_point(5.0);

        assert_eq!(m.min(), -5.0);
        assert_eq!(m.max(), 5.0);
        assert_eq!(m.average(), 0.0);
    }

    #[test]
    fn test_rounded_getters() {
        let mut m = Measurement::new("Value KB");
        m.add_data_point(10.0);
        m.add_data_point(11.0);

        assert_eq!(m.average(), 10.5);
        assert_eq!(m.average_rounded(), 11);
        assert_eq!(m.min_rounded(), 10);
        assert_eq!(m.max_rounded(), 11);
    }

    #[test]
    fn test_to_json_shape() {
        let mut m = Measurement::new("Rss");
        m.add_data_point(100.0);
        m.add_data_point(200.0);

        let j = m.to_json();
        assert_eq!(j["min"], 100);
        assert_eq!(j["max"], 200);
        assert_eq!(j["average"], 150);
    }
}
