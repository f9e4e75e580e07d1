//! Report formatting.
//!
//! Renders the global table as `{name=min/mean/max, ...}` with stations in
//! byte-wise key order and every figure rounded to one decimal place.

use crate::constants::ROUNDING_BIAS;
use crate::models::{StationSummary, SummaryTable};
use std::fmt;

/// `floor((x + 0.06) * 10) / 10`
///
/// This is not round-half-up. Consumers compare reports byte for byte
/// against output produced with exactly this bias, so it must stay as is.
pub fn round_to_tenth(x: f64) -> f64 {
    ((x + ROUNDING_BIAS) * 10.0).floor() / 10.0
}

/// One rendered station entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StationLine<'a> {
    pub station: &'a str,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

impl<'a> StationLine<'a> {
    /// Round a summary for display. The mean is clamped to `[min, max]`
    /// first so summation error can never push it outside the range.
    pub fn new(station: &'a str, summary: &StationSummary) -> Self {
        let mean = summary.mean().clamp(summary.min, summary.max);
        Self {
            station,
            min: round_to_tenth(summary.min),
            mean: round_to_tenth(mean),
            max: round_to_tenth(summary.max),
        }
    }
}

impl fmt::Display for StationLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={:.1}/{:.1}/{:.1}",
            self.station, self.min, self.mean, self.max
        )
    }
}

/// Sorted view over the global table, ready for display
#[derive(Debug, Clone)]
pub struct Report<'a> {
    lines: Vec<StationLine<'a>>,
}

impl<'a> Report<'a> {
    pub fn new(table: &'a SummaryTable) -> Self {
        let mut lines: Vec<StationLine<'a>> = table
            .iter()
            .map(|(station, summary)| StationLine::new(station, summary))
            .collect();
        lines.sort_unstable_by(|a, b| a.station.cmp(b.station));
        Self { lines }
    }

    pub fn lines(&self) -> &[StationLine<'a>] {
        &self.lines
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", line)?;
        }
        f.write_str("}")
    }
}

/// Render the full report line, without a trailing newline
pub fn format_report(table: &SummaryTable) -> String {
    Report::new(table).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Record, fold_record};

    fn table(values: &[(&str, f64)]) -> SummaryTable {
        let mut table = SummaryTable::new();
        for &(station, value) in values {
            fold_record(&mut table, Record { station, value });
        }
        table
    }

    #[test]
    fn test_rounding_table() {
        assert_eq!(round_to_tenth(2.0), 2.0);
        assert_eq!(round_to_tenth(2.04), 2.1);
        assert_eq!(round_to_tenth(2.03), 2.0);
        assert_eq!(round_to_tenth(9.0), 9.0);
        assert_eq!(round_to_tenth(-0.1), -0.1);
        assert_eq!(round_to_tenth(-3.0), -3.0);
    }

    #[test]
    fn test_empty_table_renders_braces() {
        assert_eq!(format_report(&SummaryTable::new()), "{}");
    }

    #[test]
    fn test_single_station() {
        let table = table(&[("Hamburg", 12.0), ("Hamburg", 6.0), ("Hamburg", 9.0)]);
        assert_eq!(format_report(&table), "{Hamburg=6.0/9.0/12.0}");
    }

    #[test]
    fn test_stations_sorted_by_key() {
        let table = table(&[
            ("Oslo", 1.0),
            ("A B", 2.0),
            ("A", 3.0),
            ("Abéché", 4.0),
            ("Zagreb", 5.0),
        ]);

        let report = Report::new(&table);
        let order: Vec<&str> = report.lines().iter().map(|line| line.station).collect();
        assert_eq!(order, vec!["A", "A B", "Abéché", "Oslo", "Zagreb"]);
        assert_eq!(
            report.to_string(),
            "{A=3.0/3.0/3.0, A B=2.0/2.0/2.0, Abéché=4.0/4.0/4.0, Oslo=1.0/1.0/1.0, Zagreb=5.0/5.0/5.0}"
        );
    }

    #[test]
    fn test_mean_stays_within_min_max() {
        // 0.1 * 3 sums to slightly more than 0.3
        let table = table(&[("x", 0.1), ("x", 0.1), ("x", 0.1)]);
        let line = StationLine::new("x", &table["x"]);
        assert!(line.min <= line.mean && line.mean <= line.max);
        assert_eq!(line.to_string(), "x=0.1/0.1/0.1");
    }

    #[test]
    fn test_negative_values_format() {
        let table = table(&[("Vostok", -89.2), ("Vostok", -30.0)]);
        assert_eq!(format_report(&table), "{Vostok=-89.2/-59.6/-30.0}");
    }
}
