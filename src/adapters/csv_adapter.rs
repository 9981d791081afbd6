//! CSV file NAV data adapter.
//!
//! One file per fund, `<base_path>/<fund_id>.csv`, with a header row naming
//! `date`, `unit_nav` and optionally `accumulated_nav`. Without an
//! accumulated column the unit NAV is used for both.

use crate::domain::error::NavsimError;
use crate::domain::nav::{NavPoint, NavSeries};
use crate::ports::data_port::NavDataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvNavAdapter {
    base_path: PathBuf,
}

impl CsvNavAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, fund_id: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", fund_id))
    }

    fn read_points(&self, fund_id: &str) -> Result<Vec<NavPoint>, NavsimError> {
        let path = self.csv_path(fund_id);
        let content = fs::read_to_string(&path).map_err(|e| NavsimError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers = rdr.headers().map_err(|e| NavsimError::Data {
            reason: format!("CSV header error in {}: {}", path.display(), e),
        })?;
        let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let date_col = column("date").ok_or_else(|| NavsimError::Data {
            reason: format!("{}: missing date column", path.display()),
        })?;
        let unit_col = column("unit_nav").ok_or_else(|| NavsimError::Data {
            reason: format!("{}: missing unit_nav column", path.display()),
        })?;
        let acc_col = column("accumulated_nav");

        let mut points = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| NavsimError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;
            let row = line + 2;

            let date_str = record.get(date_col).unwrap_or_default();
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                NavsimError::Data {
                    reason: format!("{} row {}: invalid date {:?}: {}", fund_id, row, date_str, e),
                }
            })?;
            let unit_nav = parse_nav(record.get(unit_col), fund_id, row, "unit_nav")?;
            let accumulated_nav = match acc_col.and_then(|c| record.get(c)) {
                Some(v) if !v.is_empty() => parse_nav(Some(v), fund_id, row, "accumulated_nav")?,
                _ => unit_nav,
            };

            points.push(NavPoint {
                date,
                unit_nav,
                accumulated_nav,
            });
        }
        Ok(points)
    }
}

fn parse_nav(value: Option<&str>, fund_id: &str, row: usize, column: &str) -> Result<f64, NavsimError> {
    let raw = value.ok_or_else(|| NavsimError::Data {
        reason: format!("{} row {}: missing {} value", fund_id, row, column),
    })?;
    raw.parse().map_err(|e| NavsimError::Data {
        reason: format!("{} row {}: invalid {} value {:?}: {}", fund_id, row, column, raw, e),
    })
}

impl NavDataPort for CsvNavAdapter {
    fn fetch_nav(
        &self,
        fund_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<NavSeries, NavsimError> {
        let points = self
            .read_points(fund_id)?
            .into_iter()
            .filter(|p| p.date >= start_date && p.date <= end_date)
            .collect();
        Ok(NavSeries::new(fund_id, points))
    }

    fn list_funds(&self) -> Result<Vec<String>, NavsimError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| NavsimError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut funds = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| NavsimError::Data {
                reason: format!("directory entry error: {}", e),
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem() {
                    funds.push(stem.to_string_lossy().into_owned());
                }
            }
        }

        funds.sort();
        Ok(funds)
    }

    fn get_data_range(
        &self,
        fund_id: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, NavsimError> {
        let series = NavSeries::new(fund_id, self.read_points(fund_id)?);
        Ok(match (series.first_date(), series.last_date()) {
            (Some(first), Some(last)) => Some((first, last, series.len())),
            _ => None,
        })
    }
}
