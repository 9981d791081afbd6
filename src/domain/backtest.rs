//! Backtest orchestration.
//!
//! [`BacktestConfig`] is validated up front, simulated once, and the resulting
//! series is handed to each analysis stage independently.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use super::allocation::{self, FundAllocation};
use super::drawdown::{self, DrawdownEpisode};
use super::error::{NavsimError, StaleDataWarning};
use super::metrics::{self, Statistics};
use super::nav::{NavSeries, PriceBasis};
use super::period::{self, PeriodReturn};
use super::rolling::{self, RollingMetric};
use super::schedule::DateRange;
use super::simulation::{self, PerformancePoint, Simulation};
use super::strategy::{InvestmentPolicy, StrategyDescriptor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub name: String,
    pub strategy: StrategyDescriptor,
    pub allocations: Vec<FundAllocation>,
    pub date_range: DateRange,
    pub investment_policy: InvestmentPolicy,
    /// Fund id of a benchmark that receives the same cash flows.
    #[serde(default)]
    pub benchmark: Option<String>,
    /// Annual, fractional.
    #[serde(default)]
    pub risk_free_rate: f64,
    #[serde(default)]
    pub price_basis: PriceBasis,
}

impl BacktestConfig {
    /// Reject structurally invalid configs before any simulation work.
    pub fn validate(&self) -> Result<(), NavsimError> {
        let range = self.date_range;
        if range.start >= range.end {
            return Err(NavsimError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }
        allocation::normalize(&self.allocations)?;
        self.investment_policy.validate()?;
        self.strategy.validate()?;
        if !self.risk_free_rate.is_finite() {
            return Err(NavsimError::InvalidPolicy {
                reason: "risk_free_rate must be finite".into(),
            });
        }
        Ok(())
    }

    /// Same config under another strategy, named after it.
    pub fn with_strategy(&self, strategy: StrategyDescriptor) -> Self {
        Self {
            name: format!("{} ({})", self.name, strategy.label()),
            strategy,
            ..self.clone()
        }
    }

    /// Same config with another contribution amount.
    pub fn with_amount(&self, amount: f64) -> Self {
        let mut config = self.clone();
        config.name = format!("{} (amount {amount})", self.name);
        config.investment_policy.amount = amount;
        config
    }

    /// Value averaging at `growth_rate`. A value-averaging config keeps its
    /// other parameters; any other strategy is replaced by a plain target
    /// path with no withdrawals or limits.
    pub fn with_growth_rate(&self, growth_rate: f64) -> Self {
        let strategy = match &self.strategy {
            StrategyDescriptor::ValueAveraging {
                allow_withdrawals,
                max_contribution_multiplier,
                min_contribution_multiplier,
                ..
            } => StrategyDescriptor::ValueAveraging {
                target_growth_rate: growth_rate,
                allow_withdrawals: *allow_withdrawals,
                max_contribution_multiplier: *max_contribution_multiplier,
                min_contribution_multiplier: *min_contribution_multiplier,
            },
            _ => StrategyDescriptor::ValueAveraging {
                target_growth_rate: growth_rate,
                allow_withdrawals: false,
                max_contribution_multiplier: None,
                min_contribution_multiplier: None,
            },
        };
        Self {
            name: format!("{} (growth {:.2}%)", self.name, growth_rate * 100.0),
            strategy,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub name: String,
    pub strategy: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Events with a positive contribution.
    pub investments: usize,
    pub total_invested: f64,
    pub final_value: f64,
    pub total_profit: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub unmet_contribution: f64,
    pub stale_points: usize,
}

impl BacktestSummary {
    fn new(config: &BacktestConfig, sim: &Simulation, stats: &Statistics) -> Self {
        let points = &sim.points;
        Self {
            name: config.name.clone(),
            strategy: config.strategy.label().to_string(),
            start_date: config.date_range.start,
            end_date: config.date_range.end,
            investments: points.iter().filter(|p| p.contribution > 0.0).count(),
            total_invested: stats.total_invested,
            final_value: stats.final_value,
            total_profit: stats.final_value - stats.total_invested,
            total_return: stats.total_return,
            annualized_return: stats.annualized_return,
            max_drawdown: stats.max_drawdown,
            unmet_contribution: points.iter().map(|p| p.unmet_contribution).sum(),
            stale_points: points.iter().filter(|p| p.data_stale).count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub summary: BacktestSummary,
    pub performance: Vec<PerformancePoint>,
    pub statistics: Statistics,
    pub drawdowns: Vec<DrawdownEpisode>,
    pub monthly_returns: Vec<PeriodReturn>,
    pub yearly_returns: Vec<PeriodReturn>,
    /// Trailing metrics over [`rolling::DEFAULT_WINDOW`] events.
    #[serde(default)]
    pub rolling: Vec<RollingMetric>,
    pub warnings: Vec<StaleDataWarning>,
}

/// Validate, simulate and analyze one configuration.
pub fn run_backtest(
    config: &BacktestConfig,
    navs: &HashMap<String, NavSeries>,
) -> Result<BacktestResult, NavsimError> {
    config.validate()?;
    debug!(name = %config.name, strategy = config.strategy.label(), "config validated");

    let sim = simulation::simulate(config, navs)?;
    debug!(name = %config.name, points = sim.points.len(), "simulation complete");

    let statistics = metrics::analyze(&sim.points, config.risk_free_rate);
    let drawdowns = drawdown::analyze(&sim.points);
    let monthly_returns = period::aggregate_monthly(&sim.points);
    let yearly_returns = period::aggregate_yearly(&sim.points);
    let rolling =
        rolling::rolling_metrics(&sim.points, rolling::DEFAULT_WINDOW, config.risk_free_rate);
    let summary = BacktestSummary::new(config, &sim, &statistics);

    info!(
        name = %summary.name,
        strategy = %summary.strategy,
        total_return = summary.total_return,
        max_drawdown = summary.max_drawdown,
        episodes = drawdowns.len(),
        "backtest finished"
    );

    Ok(BacktestResult {
        summary,
        performance: sim.points,
        statistics,
        drawdowns,
        monthly_returns,
        yearly_returns,
        rolling,
        warnings: sim.warnings,
    })
}

/// Run independent backtests in parallel. Results keep the input order.
pub fn run_batch(
    configs: &[BacktestConfig],
    navs: &HashMap<String, NavSeries>,
) -> Vec<Result<BacktestResult, NavsimError>> {
    configs
        .par_iter()
        .map(|config| run_backtest(config, navs))
        .collect()
}

/// Run `base` once per contribution amount.
pub fn sweep_amounts(
    base: &BacktestConfig,
    amounts: &[f64],
    navs: &HashMap<String, NavSeries>,
) -> Vec<Result<BacktestResult, NavsimError>> {
    let configs: Vec<BacktestConfig> = amounts.iter().map(|&a| base.with_amount(a)).collect();
    debug!(name = %base.name, runs = configs.len(), "sweeping contribution amounts");
    run_batch(&configs, navs)
}

/// Run `base` as value averaging once per target growth rate.
pub fn sweep_growth_rates(
    base: &BacktestConfig,
    growth_rates: &[f64],
    navs: &HashMap<String, NavSeries>,
) -> Vec<Result<BacktestResult, NavsimError>> {
    let configs: Vec<BacktestConfig> = growth_rates
        .iter()
        .map(|&g| base.with_growth_rate(g))
        .collect();
    debug!(name = %base.name, runs = configs.len(), "sweeping target growth rates");
    run_batch(&configs, navs)
}
