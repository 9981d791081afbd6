//! Configuration validation.
//!
//! Checks every INI field before any NAV data is read. Field-level problems
//! (missing keys, unparsable values, out-of-range numbers) are config errors;
//! cross-field invariants such as the allocation sum are left to
//! [`BacktestConfig::validate`](crate::domain::backtest::BacktestConfig::validate).

use crate::domain::error::NavsimError;
use crate::domain::nav::PriceBasis;
use crate::domain::schedule::Frequency;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const BACKTEST: &str = "backtest";
pub const STRATEGY: &str = "strategy";
pub const ALLOCATION: &str = "allocation";
pub const DATA: &str = "data";

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), NavsimError> {
    validate_dates(config)?;
    validate_amount(config)?;
    validate_frequency(config)?;
    validate_day_of_month(config)?;
    validate_fee_rate(config)?;
    validate_risk_free_rate(config)?;
    validate_price_basis(config)?;
    validate_benchmark(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), NavsimError> {
    let kind = read_strategy_type(config)?;
    if kind == StrategyKind::Smart {
        read_bool(config, STRATEGY, "volatility_adjustment")?;
    }
    if kind == StrategyKind::ValueAveraging {
        validate_target_growth_rate(config)?;
        read_bool(config, STRATEGY, "allow_withdrawals")?;
        let max = read_number(config, STRATEGY, "max_contribution_multiplier")?;
        if let Some(m) = max {
            if m <= 0.0 {
                return Err(invalid(
                    STRATEGY,
                    "max_contribution_multiplier",
                    "max_contribution_multiplier must be positive",
                ));
            }
        }
        if let Some(m) = read_number(config, STRATEGY, "min_contribution_multiplier")? {
            if m < 0.0 {
                return Err(invalid(
                    STRATEGY,
                    "min_contribution_multiplier",
                    "min_contribution_multiplier must not be negative",
                ));
            }
            if max.is_some_and(|max| m > max) {
                return Err(invalid(
                    STRATEGY,
                    "min_contribution_multiplier",
                    "min_contribution_multiplier must not exceed max_contribution_multiplier",
                ));
            }
        }
    }
    Ok(())
}

pub fn validate_allocation_config(config: &dyn ConfigPort) -> Result<(), NavsimError> {
    let entries = config.get_section(ALLOCATION);
    if entries.is_empty() {
        return Err(NavsimError::ConfigMissing {
            section: ALLOCATION.into(),
            key: "<fund_id>".into(),
        });
    }
    for (fund_id, _) in &entries {
        let weight = read_number(config, ALLOCATION, fund_id)?.unwrap_or(0.0);
        if weight < 0.0 {
            return Err(invalid(ALLOCATION, fund_id, "weight must be non-negative"));
        }
    }
    Ok(())
}

/// Run every section's validation.
pub fn validate_all(config: &dyn ConfigPort) -> Result<(), NavsimError> {
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;
    validate_allocation_config(config)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Fixed,
    Smart,
    ValueAveraging,
}

/// `[strategy] type`, defaulting to fixed.
pub fn read_strategy_type(config: &dyn ConfigPort) -> Result<StrategyKind, NavsimError> {
    let Some(raw) = config.get_string(STRATEGY, "type") else {
        return Ok(StrategyKind::Fixed);
    };
    match raw.trim().to_lowercase().as_str() {
        "" | "fixed" | "fixed_scheduled" => Ok(StrategyKind::Fixed),
        "smart" => Ok(StrategyKind::Smart),
        "value_averaging" | "va" => Ok(StrategyKind::ValueAveraging),
        other => Err(invalid(
            STRATEGY,
            "type",
            &format!("unknown strategy type {other:?} (expected fixed, smart or value_averaging)"),
        )),
    }
}

/// A finite number, `None` when the key is absent or blank.
pub fn read_number(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, NavsimError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(invalid(section, key, &format!("{key} must be a number, got {s:?}"))),
        },
    }
}

pub fn read_bool(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<bool>, NavsimError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) => parse_bool(&s)
            .map(Some)
            .ok_or_else(|| invalid(section, key, &format!("{key} must be true or false, got {s:?}"))),
    }
}

pub fn read_date(config: &dyn ConfigPort, key: &str) -> Result<NaiveDate, NavsimError> {
    match config.get_string(BACKTEST, key) {
        None => Err(NavsimError::ConfigMissing {
            section: BACKTEST.to_string(),
            key: key.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            invalid(
                BACKTEST,
                key,
                &format!("invalid {} format, expected YYYY-MM-DD", key),
            )
        }),
    }
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> NavsimError {
    NavsimError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), NavsimError> {
    let start_date = read_date(config, "start_date")?;
    let end_date = read_date(config, "end_date")?;
    if start_date >= end_date {
        return Err(invalid(
            BACKTEST,
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

fn validate_amount(config: &dyn ConfigPort) -> Result<(), NavsimError> {
    match read_number(config, BACKTEST, "amount")? {
        None => Err(NavsimError::ConfigMissing {
            section: BACKTEST.into(),
            key: "amount".into(),
        }),
        Some(v) if v <= 0.0 => Err(invalid(BACKTEST, "amount", "amount must be positive")),
        Some(_) => Ok(()),
    }
}

fn validate_frequency(config: &dyn ConfigPort) -> Result<(), NavsimError> {
    match config.get_string(BACKTEST, "frequency") {
        None => Err(NavsimError::ConfigMissing {
            section: BACKTEST.into(),
            key: "frequency".into(),
        }),
        Some(s) if Frequency::parse(&s).is_none() => Err(invalid(
            BACKTEST,
            "frequency",
            "frequency must be daily, weekly, monthly or quarterly",
        )),
        Some(_) => Ok(()),
    }
}

fn validate_day_of_month(config: &dyn ConfigPort) -> Result<(), NavsimError> {
    let Some(s) = config.get_string(BACKTEST, "day_of_month") else {
        return Ok(());
    };
    match s.trim().parse::<u32>() {
        Ok(day) if (1..=28).contains(&day) => Ok(()),
        _ => Err(invalid(
            BACKTEST,
            "day_of_month",
            "day_of_month must be an integer between 1 and 28",
        )),
    }
}

fn validate_fee_rate(config: &dyn ConfigPort) -> Result<(), NavsimError> {
    if let Some(v) = read_number(config, BACKTEST, "fee_rate")? {
        if !(0.0..1.0).contains(&v) {
            return Err(invalid(BACKTEST, "fee_rate", "fee_rate must be in [0, 1)"));
        }
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), NavsimError> {
    if let Some(v) = read_number(config, BACKTEST, "risk_free_rate")? {
        if v <= -1.0 || v >= 1.0 {
            return Err(invalid(
                BACKTEST,
                "risk_free_rate",
                "risk_free_rate must be between -1 and 1",
            ));
        }
    }
    Ok(())
}

fn validate_price_basis(config: &dyn ConfigPort) -> Result<(), NavsimError> {
    match config.get_string(BACKTEST, "price_basis") {
        Some(s) if PriceBasis::parse(&s).is_none() => Err(invalid(
            BACKTEST,
            "price_basis",
            "price_basis must be unit or accumulated",
        )),
        _ => Ok(()),
    }
}

fn validate_benchmark(config: &dyn ConfigPort) -> Result<(), NavsimError> {
    match config.get_string(BACKTEST, "benchmark") {
        Some(s) if s.trim().is_empty() => {
            Err(invalid(BACKTEST, "benchmark", "benchmark must not be blank"))
        }
        _ => Ok(()),
    }
}

fn validate_target_growth_rate(config: &dyn ConfigPort) -> Result<(), NavsimError> {
    match read_number(config, STRATEGY, "target_growth_rate")? {
        None => Err(NavsimError::ConfigMissing {
            section: STRATEGY.into(),
            key: "target_growth_rate".into(),
        }),
        Some(v) if !(-0.5..=0.5).contains(&v) => Err(invalid(
            STRATEGY,
            "target_growth_rate",
            "target_growth_rate must be between -0.5 and 0.5",
        )),
        Some(_) => Ok(()),
    }
}
