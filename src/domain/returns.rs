//! Contribution-adjusted returns shared by the analysis stages.
//!
//! New capital is never counted as investment gain: the net contribution
//! between two points is subtracted before the relative change is taken.

use chrono::NaiveDate;

use super::simulation::PerformancePoint;

/// Return from `start_value` to `end_value` net of `net_contribution`.
/// 0 when `start_value` is not positive.
pub fn adjusted_return(start_value: f64, end_value: f64, net_contribution: f64) -> f64 {
    if start_value > 0.0 {
        finite_or_zero((end_value - net_contribution - start_value) / start_value)
    } else {
        0.0
    }
}

/// Periodic returns between consecutive points. Periods starting from a
/// non-positive value have no defined return and are skipped.
pub fn periodic_returns(series: &[PerformancePoint]) -> Vec<f64> {
    series
        .windows(2)
        .filter(|w| w[0].portfolio_value > 0.0)
        .map(|w| {
            let flow = w[1].invested_amount - w[0].invested_amount;
            adjusted_return(w[0].portfolio_value, w[1].portfolio_value, flow)
        })
        .collect()
}

/// Pairs of (portfolio, benchmark) periodic returns. Each side is adjusted
/// by the flow it actually received.
pub fn benchmark_periodic_returns(series: &[PerformancePoint]) -> Vec<(f64, f64)> {
    series
        .windows(2)
        .filter_map(|w| {
            let (b0, b1) = (w[0].benchmark_value?, w[1].benchmark_value?);
            if w[0].portfolio_value <= 0.0 || b0 <= 0.0 {
                return None;
            }
            let flow = w[1].benchmark_contribution.unwrap_or(w[1].contribution);
            let portfolio_flow = w[1].invested_amount - w[0].invested_amount;
            Some((
                adjusted_return(w[0].portfolio_value, w[1].portfolio_value, portfolio_flow),
                adjusted_return(b0, b1, flow),
            ))
        })
        .collect()
}

/// Time-weighted growth index: starts at 1 and compounds the
/// contribution-adjusted periodic returns. Between points without new
/// capital it moves exactly like the portfolio value.
pub fn growth_index(series: &[PerformancePoint]) -> Vec<(NaiveDate, f64)> {
    let Some(first) = series.first() else {
        return Vec::new();
    };
    let mut index = Vec::with_capacity(series.len());
    let mut level = 1.0_f64;
    index.push((first.date, level));
    for w in series.windows(2) {
        let flow = w[1].invested_amount - w[0].invested_amount;
        level *= 1.0 + adjusted_return(w[0].portfolio_value, w[1].portfolio_value, flow);
        index.push((w[1].date, level));
    }
    index
}

/// Maps NaN and infinities to 0.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
