//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod csv_report_adapter;
pub mod file_config_adapter;
pub mod json_report_adapter;

#[cfg(test)]
pub(crate) fn sample_result() -> crate::domain::backtest::BacktestResult {
    use crate::domain::allocation::FundAllocation;
    use crate::domain::backtest::{BacktestConfig, run_backtest};
    use crate::domain::nav::{NavPoint, NavSeries, PriceBasis};
    use crate::domain::schedule::{DateRange, Frequency};
    use crate::domain::strategy::{InvestmentPolicy, StrategyDescriptor};
    use chrono::{Duration, NaiveDate};
    use std::collections::HashMap;

    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let points = (0..120)
        .map(|i| {
            let nav = 1.0 + 0.1 * (i as f64 / 10.0).sin();
            NavPoint {
                date: start + Duration::days(i),
                unit_nav: nav,
                accumulated_nav: nav + 0.2,
            }
        })
        .collect();
    let navs = HashMap::from([("F1".to_string(), NavSeries::new("F1", points))]);
    let config = BacktestConfig {
        name: "sample".into(),
        strategy: StrategyDescriptor::FixedScheduled,
        allocations: vec![FundAllocation::new("F1", 100.0)],
        date_range: DateRange::new(start, NaiveDate::from_ymd_opt(2023, 3, 31).unwrap()),
        investment_policy: InvestmentPolicy::new(500.0, Frequency::Weekly),
        benchmark: None,
        risk_free_rate: 0.02,
        price_basis: PriceBasis::Unit,
    };
    run_backtest(&config, &navs).unwrap()
}
