//! Fund NAV history and point-in-time lookup.
//!
//! A [`NavSeries`] only ever answers questions "as of" a date: every lookup
//! sees points dated on or before that date, except the explicit back-fill
//! used before a fund's first published NAV, which never reaches past a
//! caller-supplied horizon.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One published NAV for a fund.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavPoint {
    pub date: NaiveDate,
    pub unit_nav: f64,
    pub accumulated_nav: f64,
}

/// Which NAV column prices the portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceBasis {
    /// Unit NAV (price per share).
    #[default]
    Unit,
    /// Accumulated NAV, which adds back distributed dividends.
    Accumulated,
}

impl PriceBasis {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "unit" => Some(Self::Unit),
            "accumulated" => Some(Self::Accumulated),
            _ => None,
        }
    }

    pub fn price(self, point: &NavPoint) -> f64 {
        match self {
            Self::Unit => point.unit_nav,
            Self::Accumulated => point.accumulated_nav,
        }
    }
}

/// Result of a point-in-time price lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLookup {
    pub price: f64,
    /// Date of the NAV actually used.
    pub nav_date: NaiveDate,
}

impl PriceLookup {
    /// True when the NAV used was not published on `date`.
    pub fn is_stale(&self, date: NaiveDate) -> bool {
        self.nav_date != date
    }
}

/// Ordered NAV history for one fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavSeries {
    pub fund_id: String,
    points: Vec<NavPoint>,
}

impl NavSeries {
    /// Builds a series, sorting by date. Points with non-positive or
    /// non-finite prices are dropped; for duplicate dates the last one wins.
    pub fn new(fund_id: impl Into<String>, mut points: Vec<NavPoint>) -> Self {
        points.retain(|p| {
            p.unit_nav.is_finite()
                && p.unit_nav > 0.0
                && p.accumulated_nav.is_finite()
                && p.accumulated_nav > 0.0
        });
        points.sort_by_key(|p| p.date);

        let mut deduped: Vec<NavPoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }

        Self {
            fund_id: fund_id.into(),
            points: deduped,
        }
    }

    pub fn points(&self) -> &[NavPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// True if at least one NAV falls inside `[start, end]`.
    pub fn has_data_between(&self, start: NaiveDate, end: NaiveDate) -> bool {
        let idx = self.points.partition_point(|p| p.date < start);
        self.points.get(idx).is_some_and(|p| p.date <= end)
    }

    /// Points dated on or before `date`.
    pub fn history_until(&self, date: NaiveDate) -> &[NavPoint] {
        let idx = self.points.partition_point(|p| p.date <= date);
        &self.points[..idx]
    }

    /// Price on `date`, carried forward from the latest earlier NAV when
    /// `date` has none. Before the first NAV the first later NAV is
    /// back-filled, but only if it is dated on or before `horizon`.
    pub fn price_at(
        &self,
        date: NaiveDate,
        basis: PriceBasis,
        horizon: NaiveDate,
    ) -> Option<PriceLookup> {
        let history = self.history_until(date);
        let point = history
            .last()
            .or_else(|| self.points.first().filter(|p| p.date <= horizon))?;
        Some(PriceLookup {
            price: basis.price(point),
            nav_date: point.date,
        })
    }
}
