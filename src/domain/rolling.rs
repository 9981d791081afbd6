//! Rolling-window return, Sharpe ratio and drawdown.
//!
//! Windows are counted in investment events and measured on the growth
//! index, so contributions inside a window are never counted as gains.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::drawdown;
use super::metrics::{self, TRADING_DAYS_PER_YEAR};
use super::returns::{self, finite_or_zero};
use super::simulation::PerformancePoint;

/// Twelve events: one year of a monthly plan.
pub const DEFAULT_WINDOW: usize = 12;

/// Metrics of the `window` events ending at `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingMetric {
    pub date: NaiveDate,
    /// Growth of the index over the window.
    pub rolling_return: f64,
    /// Annualized mean excess return over its sample deviation.
    pub rolling_sharpe: f64,
    /// Deepest decline inside the window (0-1).
    pub rolling_max_drawdown: f64,
}

/// One metric per point that has `window` earlier points. Empty when the
/// series is not longer than the window or `window` is 0.
pub fn rolling_metrics(
    series: &[PerformancePoint],
    window: usize,
    risk_free_rate: f64,
) -> Vec<RollingMetric> {
    let index = returns::growth_index(series);
    if window == 0 || index.len() <= window {
        return Vec::new();
    }

    let period_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = index
        .windows(2)
        .map(|w| growth(w[0].1, w[1].1) - period_rf)
        .collect();

    (window..index.len())
        .map(|end| {
            let start = end - window;
            let (date, level) = index[end];
            RollingMetric {
                date,
                rolling_return: growth(index[start].1, level),
                rolling_sharpe: sharpe(&excess[start..end]),
                rolling_max_drawdown: drawdown::detect(&index[start..=end], 0.0)
                    .iter()
                    .map(|e| e.depth)
                    .fold(0.0, f64::max),
            }
        })
        .collect()
}

fn growth(from: f64, to: f64) -> f64 {
    if from > 0.0 {
        finite_or_zero(to / from - 1.0)
    } else {
        0.0
    }
}

fn sharpe(excess: &[f64]) -> f64 {
    let deviation = metrics::sample_stddev(excess);
    metrics::ratio(metrics::mean(excess), deviation) * TRADING_DAYS_PER_YEAR.sqrt()
}
