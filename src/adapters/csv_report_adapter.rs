//! CSV report adapter implementing ReportPort.
//!
//! Writes the performance series, one row per investment event. Amounts and
//! returns are rounded to 4 decimals; the JSON report keeps full precision.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::NavsimError;
use crate::domain::simulation::PerformancePoint;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Serialize)]
struct PerformanceRow {
    date: NaiveDate,
    contribution: f64,
    invested_amount: f64,
    portfolio_value: f64,
    cumulative_return: f64,
    benchmark_value: Option<f64>,
    unmet_contribution: f64,
    data_stale: bool,
}

impl From<&PerformancePoint> for PerformanceRow {
    fn from(p: &PerformancePoint) -> Self {
        Self {
            date: p.date,
            contribution: round4(p.contribution),
            invested_amount: round4(p.invested_amount),
            portfolio_value: round4(p.portfolio_value),
            cumulative_return: round4(p.cumulative_return),
            benchmark_value: p.benchmark_value.map(round4),
            unmet_contribution: round4(p.unmet_contribution),
            data_stale: p.data_stale,
        }
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn csv_error(e: csv::Error) -> NavsimError {
    NavsimError::Report {
        reason: format!("CSV write error: {}", e),
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), NavsimError> {
        let path = Path::new(output_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(NavsimError::Io)?;
        }

        let mut wtr = csv::Writer::from_path(path).map_err(csv_error)?;
        for point in &result.performance {
            wtr.serialize(PerformanceRow::from(point)).map_err(csv_error)?;
        }
        wtr.flush().map_err(NavsimError::Io)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sample_result;
    use tempfile::tempdir;

    #[test]
    fn round4_rounds_half_away() {
        assert_eq!(round4(1.23456), 1.2346);
        assert_eq!(round4(-0.00004), -0.0);
        assert_eq!(round4(1000.0), 1000.0);
    }

    #[test]
    fn csv_report_has_header_and_one_row_per_point() {
        let dir = tempdir().unwrap();
        let output_path = dir.path().join("perf.csv");
        let result = sample_result();

        CsvReportAdapter::new()
            .write(&result, output_path.to_str().unwrap())
            .unwrap();

        let contents = fs::read_to_string(&output_path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "date,contribution,invested_amount,portfolio_value,cumulative_return,\
             benchmark_value,unmet_contribution,data_stale"
        );
        assert_eq!(lines.count(), result.performance.len());
    }

    #[test]
    fn csv_report_first_row_values() {
        let dir = tempdir().unwrap();
        let output_path = dir.path().join("perf.csv");

        CsvReportAdapter::new()
            .write(&sample_result(), output_path.to_str().unwrap())
            .unwrap();

        let contents = fs::read_to_string(&output_path).unwrap();
        let row = contents.lines().nth(1).unwrap();
        assert!(row.starts_with("2023-01-02,"), "{row}");
        assert!(row.ends_with(",false"), "{row}");
    }
}
