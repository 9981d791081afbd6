//! Investment strategies and per-event contribution decisions.
//!
//! Strategies are a closed set of variants evaluated by an exhaustive match.
//! Each decision sees only a [`MarketState`], which is built from NAV points
//! dated on or before the event date and from simulator state accumulated
//! before the event.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::allocation::NormalizedAllocation;
use super::error::NavsimError;
use super::nav::{NavPoint, NavSeries, PriceBasis};
use super::schedule::Frequency;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Trailing NAV observations considered by the smart strategy.
pub const SMART_WINDOW: usize = 20;
/// Annualized volatility at which the smart signal is unscaled.
const SMART_REFERENCE_VOLATILITY: f64 = 0.20;
const SMART_MAX_VOLATILITY_SCALE: f64 = 2.0;
const SMART_SENSITIVITY: f64 = 0.1;
/// Bound on the per-event return adjustment (0.5%).
pub const SMART_MAX_ADJUSTMENT: f64 = 0.005;

/// Base contribution policy shared by every strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentPolicy {
    pub amount: f64,
    pub frequency: Frequency,
    /// Day of month for monthly schedules (1-28).
    pub day_of_month: Option<u32>,
    /// Purchase/redemption fee as a fraction (0.001 = 0.1%).
    #[serde(default)]
    pub fee_rate: f64,
}

impl InvestmentPolicy {
    pub fn new(amount: f64, frequency: Frequency) -> Self {
        Self {
            amount,
            frequency,
            day_of_month: None,
            fee_rate: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), NavsimError> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(NavsimError::InvalidPolicy {
                reason: "amount must be positive".into(),
            });
        }
        if !self.fee_rate.is_finite() || !(0.0..1.0).contains(&self.fee_rate) {
            return Err(NavsimError::InvalidPolicy {
                reason: "fee_rate must be in [0, 1)".into(),
            });
        }
        if let Some(day) = self.day_of_month {
            if !(1..=28).contains(&day) {
                return Err(NavsimError::InvalidPolicy {
                    reason: format!("day_of_month must be between 1 and 28, got {day}"),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyDescriptor {
    /// Invest the policy amount on every scheduled date.
    FixedScheduled,
    /// Fixed amount plus a bounded return adjustment from trailing prices.
    Smart { volatility_adjustment: bool },
    /// Contribute whatever keeps the portfolio on a growing target path.
    ValueAveraging {
        target_growth_rate: f64,
        #[serde(default)]
        allow_withdrawals: bool,
        #[serde(default)]
        max_contribution_multiplier: Option<f64>,
        /// Floor on a positive purchase, as a multiple of the policy amount.
        #[serde(default)]
        min_contribution_multiplier: Option<f64>,
    },
}

impl StrategyDescriptor {
    pub fn label(&self) -> &'static str {
        match self {
            Self::FixedScheduled => "fixed",
            Self::Smart { .. } => "smart",
            Self::ValueAveraging { .. } => "value_averaging",
        }
    }

    pub fn validate(&self) -> Result<(), NavsimError> {
        match self {
            Self::FixedScheduled | Self::Smart { .. } => Ok(()),
            Self::ValueAveraging {
                target_growth_rate,
                max_contribution_multiplier,
                min_contribution_multiplier,
                ..
            } => {
                if !target_growth_rate.is_finite() || !(-0.5..=0.5).contains(target_growth_rate) {
                    return Err(NavsimError::InvalidStrategy {
                        reason: "target_growth_rate must be between -0.5 and 0.5".into(),
                    });
                }
                if let Some(m) = max_contribution_multiplier {
                    if !m.is_finite() || *m <= 0.0 {
                        return Err(NavsimError::InvalidStrategy {
                            reason: "max_contribution_multiplier must be positive".into(),
                        });
                    }
                }
                if let Some(m) = min_contribution_multiplier {
                    if !m.is_finite() || *m < 0.0 {
                        return Err(NavsimError::InvalidStrategy {
                            reason: "min_contribution_multiplier must not be negative".into(),
                        });
                    }
                    if max_contribution_multiplier.is_some_and(|max| *m > max) {
                        return Err(NavsimError::InvalidStrategy {
                            reason: "min_contribution_multiplier exceeds max_contribution_multiplier"
                                .into(),
                        });
                    }
                }
                Ok(())
            }
        }
    }
}

impl std::fmt::Display for StrategyDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FixedScheduled => write!(f, "Fixed scheduled"),
            Self::Smart {
                volatility_adjustment,
            } => write!(
                f,
                "Smart (volatility adjustment {})",
                if *volatility_adjustment { "on" } else { "off" }
            ),
            Self::ValueAveraging {
                target_growth_rate, ..
            } => write!(
                f,
                "Value averaging ({:.2}% target growth)",
                target_growth_rate * 100.0
            ),
        }
    }
}

/// One fund's NAV history visible at the event date.
#[derive(Debug, Clone)]
pub struct FundWindow<'a> {
    pub fraction: f64,
    pub history: &'a [NavPoint],
}

/// Everything a strategy may look at when deciding a contribution.
#[derive(Debug, Clone)]
pub struct MarketState<'a> {
    pub date: NaiveDate,
    pub basis: PriceBasis,
    /// Portfolio value after this period's market move, before contributing.
    pub value_before_contribution: f64,
    /// Cumulative net amount invested before this event.
    pub invested: f64,
    pub funds: Vec<FundWindow<'a>>,
}

impl<'a> MarketState<'a> {
    /// Build the state for `date`, truncating every series at `date`.
    pub fn new(
        date: NaiveDate,
        basis: PriceBasis,
        value_before_contribution: f64,
        invested: f64,
        allocations: &[NormalizedAllocation],
        series: &[&'a NavSeries],
    ) -> Self {
        let funds = allocations
            .iter()
            .zip(series)
            .map(|(alloc, s)| FundWindow {
                fraction: alloc.fraction,
                history: s.history_until(date),
            })
            .collect();
        Self {
            date,
            basis,
            value_before_contribution,
            invested,
            funds,
        }
    }
}

/// Outcome of a strategy decision for one scheduled date.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Contribution {
    /// Cash added (negative for a withdrawal).
    pub amount: f64,
    /// Added to the period's market return.
    pub return_adjustment: f64,
    /// Solved amount that was not applied because of a clamp or cap.
    /// Negative when a floor raised the purchase above the solved amount.
    pub unmet: f64,
}

/// Decide the contribution for scheduled event `index` on `date`.
pub fn contribution(
    strategy: &StrategyDescriptor,
    date: NaiveDate,
    index: usize,
    policy: &InvestmentPolicy,
    market: &MarketState<'_>,
) -> Contribution {
    debug_assert!(market.date == date);
    match strategy {
        StrategyDescriptor::FixedScheduled => Contribution {
            amount: policy.amount,
            ..Contribution::default()
        },
        StrategyDescriptor::Smart {
            volatility_adjustment,
        } => Contribution {
            amount: policy.amount,
            return_adjustment: smart_adjustment(market, *volatility_adjustment),
            unmet: 0.0,
        },
        StrategyDescriptor::ValueAveraging {
            target_growth_rate,
            allow_withdrawals,
            max_contribution_multiplier,
            min_contribution_multiplier,
        } => value_averaging(
            index,
            policy,
            market,
            *target_growth_rate,
            *allow_withdrawals,
            (*min_contribution_multiplier, *max_contribution_multiplier),
        ),
    }
}

/// Target portfolio value after event `index` (0-based).
pub fn value_averaging_target(amount: f64, growth_rate: f64, index: usize) -> f64 {
    amount * (index as f64 + 1.0) * (1.0 + growth_rate).powi(index as i32)
}

fn value_averaging(
    index: usize,
    policy: &InvestmentPolicy,
    market: &MarketState<'_>,
    growth_rate: f64,
    allow_withdrawals: bool,
    (min_multiplier, max_multiplier): (Option<f64>, Option<f64>),
) -> Contribution {
    let target = value_averaging_target(policy.amount, growth_rate, index);
    let gap = target - market.value_before_contribution;

    // Purchases lose the fee before reaching the portfolio; withdrawals don't.
    let solved = if gap > 0.0 {
        gap / (1.0 - policy.fee_rate)
    } else {
        gap
    };

    let mut applied = solved;
    if let Some(m) = min_multiplier.filter(|_| solved > 0.0) {
        applied = applied.max(policy.amount * m);
    }
    if let Some(m) = max_multiplier {
        applied = applied.min(policy.amount * m);
    }
    if applied < 0.0 {
        applied = if allow_withdrawals {
            applied.max(-market.value_before_contribution.max(0.0))
        } else {
            0.0
        };
    }

    Contribution {
        amount: applied,
        return_adjustment: 0.0,
        unmet: solved - applied,
    }
}

fn smart_adjustment(market: &MarketState<'_>, volatility_adjustment: bool) -> f64 {
    let signal: f64 = market
        .funds
        .iter()
        .map(|fund| {
            let window = trailing_window(fund.history);
            let prices: Vec<f64> = window.iter().map(|p| market.basis.price(p)).collect();
            let discount = price_discount(&prices);
            let scale = if volatility_adjustment {
                (annualized_volatility(&prices) / SMART_REFERENCE_VOLATILITY)
                    .min(SMART_MAX_VOLATILITY_SCALE)
            } else {
                1.0
            };
            fund.fraction * discount * scale
        })
        .sum();

    let adjustment = (SMART_SENSITIVITY * signal).clamp(-SMART_MAX_ADJUSTMENT, SMART_MAX_ADJUSTMENT);
    if adjustment.is_finite() { adjustment } else { 0.0 }
}

fn trailing_window(history: &[NavPoint]) -> &[NavPoint] {
    let start = history.len().saturating_sub(SMART_WINDOW);
    &history[start..]
}

/// How far the latest price sits below the window mean, as a fraction.
fn price_discount(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return 0.0;
    }
    let mean = prices.iter().sum::<f64>() / prices.len() as f64;
    match prices.last() {
        Some(&current) if mean > 0.0 => (mean - current) / mean,
        _ => 0.0,
    }
}

fn annualized_volatility(prices: &[f64]) -> f64 {
    let returns: Vec<f64> = prices
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt()
}
