//! Monthly and yearly return buckets.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::returns::adjusted_return;
use super::simulation::PerformancePoint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodReturn {
    /// `YYYY-MM` for months, `YYYY` for years.
    pub period_label: String,
    #[serde(rename = "return")]
    pub period_return: f64,
    /// Net cash added during the period.
    pub net_contribution: f64,
    pub portfolio_value_at_period_end: f64,
}

pub fn aggregate_monthly(series: &[PerformancePoint]) -> Vec<PeriodReturn> {
    aggregate(series, |d| (d.year(), d.month()), |d| {
        format!("{:04}-{:02}", d.year(), d.month())
    })
}

pub fn aggregate_yearly(series: &[PerformancePoint]) -> Vec<PeriodReturn> {
    aggregate(series, |d| (d.year(), 0), |d| format!("{:04}", d.year()))
}

/// Bucket consecutive points by `key`. Each bucket's return is measured from
/// the previous bucket's closing point, so the first bucket has no start
/// value and is left out.
fn aggregate<K, L>(series: &[PerformancePoint], key: K, label: L) -> Vec<PeriodReturn>
where
    K: Fn(NaiveDate) -> (i32, u32),
    L: Fn(NaiveDate) -> String,
{
    // Last point of every bucket, in order.
    let mut closes: Vec<&PerformancePoint> = Vec::new();
    for point in series {
        match closes.last_mut() {
            Some(last) if key(last.date) == key(point.date) => *last = point,
            _ => closes.push(point),
        }
    }

    closes
        .windows(2)
        .map(|w| {
            let (start, end) = (w[0], w[1]);
            let net_contribution = end.invested_amount - start.invested_amount;
            PeriodReturn {
                period_label: label(end.date),
                period_return: adjusted_return(
                    start.portfolio_value,
                    end.portfolio_value,
                    net_contribution,
                ),
                net_contribution,
                portfolio_value_at_period_end: end.portfolio_value,
            }
        })
        .collect()
}
