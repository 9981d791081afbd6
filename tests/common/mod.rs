#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use navsim::domain::allocation::FundAllocation;
use navsim::domain::backtest::BacktestConfig;
use navsim::domain::error::NavsimError;
pub use navsim::domain::nav::{NavPoint, NavSeries, PriceBasis};
use navsim::domain::schedule::{DateRange, Frequency};
use navsim::domain::strategy::{InvestmentPolicy, StrategyDescriptor};
use navsim::ports::data_port::NavDataPort;
use std::cell::RefCell;
use std::collections::HashMap;
use std::process::ExitCode;

pub struct MockNavPort {
    pub data: HashMap<String, Vec<NavPoint>>,
    pub errors: HashMap<String, String>,
    /// (fund_id, start, end) of every fetch, in call order.
    pub fetches: RefCell<Vec<(String, NaiveDate, NaiveDate)>>,
}

impl MockNavPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            fetches: RefCell::new(Vec::new()),
        }
    }

    pub fn with_points(mut self, fund_id: &str, points: Vec<NavPoint>) -> Self {
        self.data.insert(fund_id.to_string(), points);
        self
    }

    pub fn with_error(mut self, fund_id: &str, reason: &str) -> Self {
        self.errors.insert(fund_id.to_string(), reason.to_string());
        self
    }
}

impl NavDataPort for MockNavPort {
    fn fetch_nav(
        &self,
        fund_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<NavSeries, NavsimError> {
        self.fetches
            .borrow_mut()
            .push((fund_id.to_string(), start_date, end_date));
        if let Some(reason) = self.errors.get(fund_id) {
            return Err(NavsimError::Data {
                reason: reason.clone(),
            });
        }
        let points = self
            .data
            .get(fund_id)
            .map(|pts| {
                pts.iter()
                    .filter(|p| p.date >= start_date && p.date <= end_date)
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        Ok(NavSeries::new(fund_id, points))
    }

    fn list_funds(&self) -> Result<Vec<String>, NavsimError> {
        let mut funds: Vec<String> = self.data.keys().cloned().collect();
        funds.sort();
        Ok(funds)
    }

    fn get_data_range(
        &self,
        fund_id: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, NavsimError> {
        if let Some(reason) = self.errors.get(fund_id) {
            return Err(NavsimError::Data {
                reason: reason.clone(),
            });
        }
        match self.data.get(fund_id) {
            Some(points) if !points.is_empty() => {
                let min = points.iter().map(|p| p.date).min().unwrap();
                let max = points.iter().map(|p| p.date).max().unwrap();
                Ok(Some((min, max, points.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One NAV per calendar day starting at `start`.
pub fn daily_points(start: NaiveDate, navs: &[f64]) -> Vec<NavPoint> {
    navs.iter()
        .enumerate()
        .map(|(i, &nav)| NavPoint {
            date: start + Duration::days(i as i64),
            unit_nav: nav,
            accumulated_nav: nav,
        })
        .collect()
}

pub fn flat_points(start: NaiveDate, days: usize, nav: f64) -> Vec<NavPoint> {
    daily_points(start, &vec![nav; days])
}

/// Piecewise-constant NAVs: `nav` holds from its date until the next one.
pub fn step_points(steps: &[(NaiveDate, f64)], end: NaiveDate) -> Vec<NavPoint> {
    let mut points = Vec::new();
    for (i, &(from, nav)) in steps.iter().enumerate() {
        let until = steps.get(i + 1).map(|s| s.0).unwrap_or(end + Duration::days(1));
        let mut d = from;
        while d < until {
            points.push(NavPoint {
                date: d,
                unit_nav: nav,
                accumulated_nav: nav,
            });
            d += Duration::days(1);
        }
    }
    points
}

pub fn series(fund_id: &str, points: Vec<NavPoint>) -> NavSeries {
    NavSeries::new(fund_id, points)
}

pub fn nav_map(all: Vec<NavSeries>) -> HashMap<String, NavSeries> {
    all.into_iter().map(|s| (s.fund_id.clone(), s)).collect()
}

pub fn monthly_config(fund_id: &str, start: NaiveDate, end: NaiveDate, amount: f64) -> BacktestConfig {
    BacktestConfig {
        name: "test plan".into(),
        strategy: StrategyDescriptor::FixedScheduled,
        allocations: vec![FundAllocation::new(fund_id, 100.0)],
        date_range: DateRange::new(start, end),
        investment_policy: InvestmentPolicy::new(amount, Frequency::Monthly),
        benchmark: None,
        risk_free_rate: 0.0,
        price_basis: PriceBasis::Unit,
    }
}

pub fn exit_debug(code: ExitCode) -> String {
    format!("{code:?}")
}

pub fn exit_is(code: ExitCode, expected: u8) -> bool {
    exit_debug(code) == exit_debug(ExitCode::from(expected))
}
