//! Return and risk statistics.
//!
//! Every statistic is a total function of the series: whenever a ratio's
//! denominator is zero (flat portfolio, no downside, no drawdown, single
//! point) the ratio is defined as 0. No NaN or infinity is ever returned.

use serde::{Deserialize, Serialize};

use super::drawdown;
use super::returns::{self, finite_or_zero};
use super::simulation::PerformancePoint;

pub(crate) const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const DAYS_PER_YEAR: f64 = 365.0;
const VAR_CONFIDENCE: f64 = 0.95;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_invested: f64,
    pub final_value: f64,
    /// (final_value - total_invested) / total_invested. Reported as 0 when
    /// total_invested is zero or negative, which withdrawals can cause.
    pub total_return: f64,
    pub annualized_return: f64,
    pub volatility: f64,
    pub downside_deviation: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub positive_periods: usize,
    pub negative_periods: usize,
    pub best_period_return: f64,
    pub worst_period_return: f64,
    /// Mean gain of the positive periods over the absolute mean loss of the
    /// negative ones. 0 when there are no losing periods.
    #[serde(default)]
    pub profit_loss_ratio: f64,
    /// Historical 95% value at risk of one period (a negative return).
    pub var_95: f64,
    /// Mean return of the periods at or below `var_95`.
    pub cvar_95: f64,
    pub skewness: f64,
    /// Excess kurtosis (0 for a normal distribution).
    pub kurtosis: f64,
    pub benchmark: Option<BenchmarkStatistics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkStatistics {
    pub benchmark_return: f64,
    pub excess_return: f64,
    pub alpha: f64,
    pub beta: f64,
    pub tracking_error: f64,
    pub information_ratio: f64,
    pub correlation: f64,
}

/// Compute statistics for a simulated series. `risk_free_rate` is annual and
/// fractional.
pub fn analyze(series: &[PerformancePoint], risk_free_rate: f64) -> Statistics {
    let (total_invested, final_value) = series
        .last()
        .map(|p| (p.invested_amount, p.portfolio_value))
        .unwrap_or((0.0, 0.0));

    let total_return = if total_invested > 0.0 {
        finite_or_zero((final_value - total_invested) / total_invested)
    } else {
        0.0
    };

    let days = match (series.first(), series.last()) {
        (Some(first), Some(last)) => (last.date - first.date).num_days(),
        _ => 0,
    };
    let annualized_return = annualize(total_return, days);

    let periodic = returns::periodic_returns(series);
    let volatility = sample_stddev(&periodic) * TRADING_DAYS_PER_YEAR.sqrt();
    let downside_deviation = downside_deviation(&periodic) * TRADING_DAYS_PER_YEAR.sqrt();
    let max_drawdown = drawdown::max_drawdown(series);

    let excess = annualized_return - risk_free_rate;
    let sharpe_ratio = ratio(excess, volatility);
    let sortino_ratio = ratio(excess, downside_deviation);
    let calmar_ratio = ratio(annualized_return, max_drawdown.abs());

    let positive_periods = periodic.iter().filter(|&&r| r > 0.0).count();
    let negative_periods = periodic.iter().filter(|&&r| r < 0.0).count();
    let win_rate = if periodic.is_empty() {
        0.0
    } else {
        positive_periods as f64 / periodic.len() as f64
    };

    let best_period_return = periodic.iter().copied().fold(None, max_opt).unwrap_or(0.0);
    let worst_period_return = periodic.iter().copied().fold(None, min_opt).unwrap_or(0.0);
    let profit_loss_ratio = profit_loss_ratio(&periodic);
    let (var_95, cvar_95) = value_at_risk(&periodic, VAR_CONFIDENCE);
    let (skewness, kurtosis) = moments(&periodic);

    let benchmark = benchmark_statistics(series, total_return, risk_free_rate, days);

    Statistics {
        total_invested,
        final_value,
        total_return,
        annualized_return,
        volatility: finite_or_zero(volatility),
        downside_deviation: finite_or_zero(downside_deviation),
        sharpe_ratio,
        sortino_ratio,
        calmar_ratio,
        max_drawdown,
        win_rate,
        positive_periods,
        negative_periods,
        best_period_return,
        worst_period_return,
        profit_loss_ratio,
        var_95,
        cvar_95,
        skewness,
        kurtosis,
        benchmark,
    }
}

/// `numerator / denominator`, or 0 when the denominator is 0.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        finite_or_zero(numerator / denominator)
    } else {
        0.0
    }
}

/// (1 + total)^(365 / days) - 1, 0 for a zero-length span and -1 once the
/// whole capital is lost.
pub fn annualize(total_return: f64, days: i64) -> f64 {
    if days <= 0 {
        return 0.0;
    }
    if total_return <= -1.0 {
        return -1.0;
    }
    finite_or_zero((1.0 + total_return).powf(DAYS_PER_YEAR / days as f64) - 1.0)
}

fn max_opt(acc: Option<f64>, x: f64) -> Option<f64> {
    Some(acc.map_or(x, |a| a.max(x)))
}

fn min_opt(acc: Option<f64>, x: f64) -> Option<f64> {
    Some(acc.map_or(x, |a| a.min(x)))
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

pub(crate) fn sample_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|r| (r - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    finite_or_zero(variance.sqrt())
}

/// Root mean square of negative returns over all periods.
fn downside_deviation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let squared: f64 = values.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    finite_or_zero((squared / values.len() as f64).sqrt())
}

/// Historical VaR (lower-tail percentile with linear interpolation) and CVaR.
fn value_at_risk(values: &[f64], confidence: f64) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (1.0 - confidence) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let var = sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64);

    let tail: Vec<f64> = sorted.iter().copied().filter(|&r| r <= var).collect();
    let cvar = if tail.is_empty() { var } else { mean(&tail).min(var) };
    (finite_or_zero(var), finite_or_zero(cvar))
}

/// Population skewness and excess kurtosis; 0 for fewer than 3 values or no
/// dispersion.
fn moments(values: &[f64]) -> (f64, f64) {
    if values.len() < 3 {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let m = mean(values);
    let m2 = values.iter().map(|r| (r - m).powi(2)).sum::<f64>() / n;
    if m2 <= 0.0 {
        return (0.0, 0.0);
    }
    let m3 = values.iter().map(|r| (r - m).powi(3)).sum::<f64>() / n;
    let m4 = values.iter().map(|r| (r - m).powi(4)).sum::<f64>() / n;
    (
        finite_or_zero(m3 / m2.powf(1.5)),
        finite_or_zero(m4 / (m2 * m2) - 3.0),
    )
}

/// Average winning period over the absolute average losing period.
pub fn profit_loss_ratio(returns: &[f64]) -> f64 {
    let gains: Vec<f64> = returns.iter().copied().filter(|&r| r > 0.0).collect();
    let losses: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    if gains.is_empty() || losses.is_empty() {
        return 0.0;
    }
    ratio(mean(&gains), mean(&losses).abs())
}

fn benchmark_statistics(
    series: &[PerformancePoint],
    portfolio_return: f64,
    risk_free_rate: f64,
    days: i64,
) -> Option<BenchmarkStatistics> {
    let last = series.last()?;
    let benchmark_final = last.benchmark_value?;
    let pairs = returns::benchmark_periodic_returns(series);

    let benchmark_invested: f64 = series
        .iter()
        .map(|p| p.benchmark_contribution.unwrap_or(p.contribution))
        .sum();
    let benchmark_return = if benchmark_invested > 0.0 {
        finite_or_zero((benchmark_final - benchmark_invested) / benchmark_invested)
    } else {
        0.0
    };
    let excess_return = portfolio_return - benchmark_return;

    let (portfolio, bench): (Vec<f64>, Vec<f64>) = pairs.iter().copied().unzip();
    let (beta, correlation) = if pairs.len() >= 2 {
        let pm = mean(&portfolio);
        let bm = mean(&bench);
        let n = (pairs.len() - 1) as f64;
        let cov = pairs.iter().map(|(p, b)| (p - pm) * (b - bm)).sum::<f64>() / n;
        let bvar = bench.iter().map(|b| (b - bm).powi(2)).sum::<f64>() / n;
        let pstd = sample_stddev(&portfolio);
        let bstd = sample_stddev(&bench);
        (ratio(cov, bvar), ratio(cov, pstd * bstd))
    } else {
        (0.0, 0.0)
    };

    let years = days as f64 / DAYS_PER_YEAR;
    let period_rf = risk_free_rate * years;
    let alpha = finite_or_zero(excess_return - beta * (benchmark_return - period_rf));

    let active: Vec<f64> = pairs.iter().map(|(p, b)| p - b).collect();
    let tracking_error = sample_stddev(&active) * TRADING_DAYS_PER_YEAR.sqrt();
    let information_ratio = ratio(excess_return, tracking_error);

    Some(BenchmarkStatistics {
        benchmark_return,
        excess_return,
        alpha,
        beta,
        tracking_error: finite_or_zero(tracking_error),
        information_ratio,
        correlation,
    })
}
