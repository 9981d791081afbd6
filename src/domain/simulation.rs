//! Portfolio simulation over the investment schedule.
//!
//! The simulation is a fold over scheduled dates. Each step moves the
//! previous value by the allocation-weighted NAV return since the previous
//! event, asks the strategy for a contribution, then adds it at the event's
//! price. Points are only ever appended.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::allocation::{self, NormalizedAllocation};
use super::backtest::BacktestConfig;
use super::error::{NavsimError, StaleDataWarning};
use super::nav::{NavSeries, PriceBasis, PriceLookup};
use super::schedule;
use super::strategy::{self, MarketState};

/// Portfolio state after one investment event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformancePoint {
    pub date: NaiveDate,
    /// Net cash flow of this event (negative for a withdrawal).
    pub contribution: f64,
    /// Cumulative net amount invested. Purchases add their gross amount,
    /// withdrawals subtract what the investor receives after fees, so a run
    /// with withdrawals can take this to zero or below.
    pub invested_amount: f64,
    pub portfolio_value: f64,
    /// (portfolio_value - invested_amount) / invested_amount. Reported as 0
    /// whenever invested_amount is zero or negative, including after
    /// withdrawals have returned more than was paid in.
    pub cumulative_return: f64,
    pub benchmark_value: Option<f64>,
    /// Change in the benchmark's invested amount at this event. Differs from
    /// `contribution` when a withdrawal is capped at the benchmark's value
    /// or is reduced by the fee.
    #[serde(default)]
    pub benchmark_contribution: Option<f64>,
    /// Part of the strategy's solved contribution that was not applied.
    pub unmet_contribution: f64,
    /// At least one fund was priced from a NAV not published on `date`.
    pub data_stale: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    pub points: Vec<PerformancePoint>,
    pub warnings: Vec<StaleDataWarning>,
}

pub fn cumulative_return(portfolio_value: f64, invested_amount: f64) -> f64 {
    if invested_amount > 0.0 {
        (portfolio_value - invested_amount) / invested_amount
    } else {
        0.0
    }
}

/// Run the portfolio simulation for `config` against `navs` (keyed by fund
/// id).
pub fn simulate(
    config: &BacktestConfig,
    navs: &HashMap<String, NavSeries>,
) -> Result<Simulation, NavsimError> {
    let allocations = allocation::normalize(&config.allocations)?;

    let mut series = Vec::with_capacity(allocations.len());
    for alloc in &allocations {
        match navs.get(&alloc.fund_id) {
            Some(s) if !s.is_empty() => series.push(s),
            _ => {
                return Err(NavsimError::InsufficientData {
                    reason: format!("no NAV history for fund {}", alloc.fund_id),
                });
            }
        }
    }

    let range = config.date_range;
    if let Some(late) = series
        .iter()
        .find(|s| s.first_date().is_some_and(|first| first > range.end))
    {
        return Err(NavsimError::InsufficientData {
            reason: format!("no NAV on or before {} for fund {}", range.end, late.fund_id),
        });
    }
    if !series.iter().any(|s| s.has_data_between(range.start, range.end)) {
        return Err(NavsimError::InsufficientData {
            reason: format!("no fund has NAV data between {} and {}", range.start, range.end),
        });
    }

    let dates = schedule::generate(
        range,
        config.investment_policy.frequency,
        config.investment_policy.day_of_month,
    )?;
    if dates.is_empty() {
        return Err(NavsimError::InsufficientData {
            reason: format!(
                "{} schedule has no investment dates between {} and {}",
                config.investment_policy.frequency, range.start, range.end
            ),
        });
    }

    let benchmark = match config.benchmark.as_deref() {
        Some(id) => match navs.get(id) {
            Some(s) if s.first_date().is_some_and(|first| first <= range.end) => Some(s),
            _ => {
                warn!(
                    fund_id = %id,
                    end = %range.end,
                    "benchmark has no NAV on or before end date, skipping benchmark"
                );
                None
            }
        },
        None => None,
    };

    debug!(
        strategy = config.strategy.label(),
        funds = allocations.len(),
        events = dates.len(),
        "simulating portfolio"
    );

    let ctx = StepContext {
        config,
        allocations: &allocations,
        series: &series,
        benchmark,
        horizon: range.end,
    };

    let state = dates
        .iter()
        .enumerate()
        .try_fold(SimState::with_capacity(dates.len()), |state, (index, &date)| {
            state.step(&ctx, index, date)
        })?;

    if !state.warnings.is_empty() {
        warn!(
            count = state.warnings.len(),
            "carried forward NAVs for dates without published data"
        );
    }

    Ok(Simulation {
        points: state.points,
        warnings: state.warnings,
    })
}

struct StepContext<'a> {
    config: &'a BacktestConfig,
    allocations: &'a [NormalizedAllocation],
    series: &'a [&'a NavSeries],
    benchmark: Option<&'a NavSeries>,
    /// Latest NAV date a back-fill may use.
    horizon: NaiveDate,
}

#[derive(Default)]
struct SimState {
    points: Vec<PerformancePoint>,
    warnings: Vec<StaleDataWarning>,
    value: f64,
    invested: f64,
    prev_prices: Vec<f64>,
    benchmark_value: f64,
    prev_benchmark_price: Option<f64>,
}

impl SimState {
    fn with_capacity(events: usize) -> Self {
        Self {
            points: Vec::with_capacity(events),
            ..Self::default()
        }
    }

    fn step(
        mut self,
        ctx: &StepContext<'_>,
        index: usize,
        date: NaiveDate,
    ) -> Result<Self, NavsimError> {
        let basis = ctx.config.price_basis;
        let policy = &ctx.config.investment_policy;

        let lookups = lookup_all(ctx.series, date, basis, ctx.horizon)?;
        let mut data_stale = false;
        for ((alloc, lookup), s) in ctx.allocations.iter().zip(&lookups).zip(ctx.series) {
            if alloc.fraction > 0.0 && lookup.is_stale(date) {
                data_stale = true;
                debug!(fund_id = %s.fund_id, %date, nav_date = %lookup.nav_date, "stale NAV");
                self.warnings.push(StaleDataWarning {
                    fund_id: s.fund_id.clone(),
                    date,
                    nav_date: lookup.nav_date,
                });
            }
        }

        let prices: Vec<f64> = lookups.iter().map(|l| l.price).collect();
        let market_return = if self.prev_prices.is_empty() {
            0.0
        } else {
            ctx.allocations
                .iter()
                .zip(prices.iter().zip(&self.prev_prices))
                .map(|(alloc, (&now, &prev))| alloc.fraction * (now / prev - 1.0))
                .sum()
        };

        let market = MarketState::new(
            date,
            basis,
            self.value * (1.0 + market_return),
            self.invested,
            ctx.allocations,
            ctx.series,
        );
        let decision = strategy::contribution(&ctx.config.strategy, date, index, policy, &market);

        self.value *= 1.0 + market_return + decision.return_adjustment;
        self.value = self.value.max(0.0);
        let (value, invested) =
            apply_cash_flow(self.value, self.invested, decision.amount, policy.fee_rate);
        self.value = value;
        self.invested = invested;
        self.prev_prices = prices;

        let (benchmark_value, benchmark_contribution) = match ctx.benchmark {
            Some(bench) => {
                let (value, flow) =
                    self.step_benchmark(ctx, bench, date, decision.amount, policy.fee_rate)?;
                (Some(value), Some(flow))
            }
            None => (None, None),
        };

        self.points.push(PerformancePoint {
            date,
            contribution: decision.amount,
            invested_amount: self.invested,
            portfolio_value: self.value,
            cumulative_return: cumulative_return(self.value, self.invested),
            benchmark_value,
            benchmark_contribution,
            unmet_contribution: decision.unmet,
            data_stale,
        });
        Ok(self)
    }

    /// Moves the benchmark to `date` and applies the same cash flow as the
    /// portfolio. Returns the new value and the net flow actually applied.
    fn step_benchmark(
        &mut self,
        ctx: &StepContext<'_>,
        bench: &NavSeries,
        date: NaiveDate,
        amount: f64,
        fee_rate: f64,
    ) -> Result<(f64, f64), NavsimError> {
        let lookup = price(bench, date, ctx.config.price_basis, ctx.horizon)?;
        if lookup.is_stale(date) {
            self.warnings.push(StaleDataWarning {
                fund_id: bench.fund_id.clone(),
                date,
                nav_date: lookup.nav_date,
            });
        }
        if let Some(prev) = self.prev_benchmark_price {
            self.benchmark_value *= lookup.price / prev;
        }
        self.prev_benchmark_price = Some(lookup.price);
        // starting from nothing invested, the second element is the flow itself
        let (value, flow) = apply_cash_flow(self.benchmark_value, 0.0, amount, fee_rate);
        self.benchmark_value = value;
        Ok((value, flow))
    }
}

/// Add a purchase (fee deducted from what reaches the portfolio) or take a
/// withdrawal (fee deducted from what the investor receives). Withdrawals
/// are capped at `value`; the returned invested amount reflects the cap.
fn apply_cash_flow(value: f64, invested: f64, amount: f64, fee_rate: f64) -> (f64, f64) {
    if amount >= 0.0 {
        (value + amount * (1.0 - fee_rate), invested + amount)
    } else {
        let withdrawn = (-amount).min(value);
        (value - withdrawn, invested - withdrawn * (1.0 - fee_rate))
    }
}

fn lookup_all(
    series: &[&NavSeries],
    date: NaiveDate,
    basis: PriceBasis,
    horizon: NaiveDate,
) -> Result<Vec<PriceLookup>, NavsimError> {
    series.iter().map(|s| price(s, date, basis, horizon)).collect()
}

fn price(
    series: &NavSeries,
    date: NaiveDate,
    basis: PriceBasis,
    horizon: NaiveDate,
) -> Result<PriceLookup, NavsimError> {
    series
        .price_at(date, basis, horizon)
        .ok_or_else(|| NavsimError::InsufficientData {
            reason: format!("no NAV for fund {} on or around {}", series.fund_id, date),
        })
}
