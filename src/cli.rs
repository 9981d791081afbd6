//! CLI definition and dispatch.

use chrono::{Duration, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, warn};

use crate::adapters::csv_adapter::CsvNavAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::allocation::FundAllocation;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{
    self, ALLOCATION, BACKTEST, DATA, STRATEGY, StrategyKind, read_bool, read_date, read_number,
    read_strategy_type,
};
use crate::domain::error::NavsimError;
use crate::domain::nav::{NavSeries, PriceBasis};
use crate::domain::schedule::{DateRange, Frequency};
use crate::domain::strategy::{InvestmentPolicy, StrategyDescriptor};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::NavDataPort;
use crate::ports::report_port::ReportPort;

/// NAV history requested before `start_date` so the first events have prices
/// to carry forward and the smart strategy has a trailing window.
pub const LOOKBACK_DAYS: i64 = 90;
const DEFAULT_NAV_DIR: &str = "data";

#[derive(Parser, Debug)]
#[command(name = "navsim", about = "Fund dollar-cost averaging backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory of `<fund_id>.csv` NAV files (overrides [data] nav_dir)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Json)]
        format: ReportFormat,
    },
    /// Run fixed, smart and value-averaging variants of one config
    Compare {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
    /// Rerun one config across contribution amounts or target growth rates
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        /// Comma-separated contribution amounts
        #[arg(long, value_delimiter = ',', required_unless_present = "growth_rates")]
        amounts: Vec<f64>,
        /// Comma-separated value-averaging target growth rates (fractional)
        #[arg(long, value_delimiter = ',')]
        growth_rates: Vec<f64>,
    },
    /// Validate a configuration without running it
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show NAV coverage of one fund, or of every fund in the data directory
    Info {
        #[arg(long)]
        fund: Option<String>,
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Json,
    Csv,
}

impl ReportFormat {
    fn default_path(self) -> PathBuf {
        match self {
            Self::Json => PathBuf::from("report.json"),
            Self::Csv => PathBuf::from("report.csv"),
        }
    }

    fn adapter(self) -> Box<dyn ReportPort> {
        match self {
            Self::Json => Box::new(JsonReportAdapter::new()),
            Self::Csv => Box::new(CsvReportAdapter::new()),
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data_dir,
            output,
            format,
        } => run_backtest(&config, data_dir.as_ref(), output.as_ref(), format),
        Command::Compare { config, data_dir } => run_compare(&config, data_dir.as_ref()),
        Command::Sweep {
            config,
            data_dir,
            amounts,
            growth_rates,
        } => run_sweep(&config, data_dir.as_ref(), &amounts, &growth_rates),
        Command::Validate { config } => run_validate(&config),
        Command::Info {
            fund,
            data_dir,
            config,
        } => run_info(fund.as_deref(), data_dir.as_ref(), config.as_ref()),
    }
}

fn fail(err: &NavsimError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = NavsimError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        fail(&err)
    })
}

/// Load, validate and build the backtest config in `path`.
fn load_backtest_config(path: &PathBuf) -> Result<(FileConfigAdapter, BacktestConfig), ExitCode> {
    eprintln!("Loading config from {}", path.display());
    let adapter = load_config(path)?;
    config_validation::validate_all(&adapter).map_err(|e| fail(&e))?;
    let config = build_backtest_config(&adapter).map_err(|e| fail(&e))?;
    config.validate().map_err(|e| fail(&e))?;
    Ok((adapter, config))
}

fn run_backtest(
    config_path: &PathBuf,
    data_dir: Option<&PathBuf>,
    output_path: Option<&PathBuf>,
    format: ReportFormat,
) -> ExitCode {
    let (adapter, config) = match load_backtest_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let nav_dir = resolve_data_dir(data_dir, Some(&adapter as &dyn ConfigPort));
    eprintln!("Reading NAV data from {}", nav_dir.display());
    let data_port = CsvNavAdapter::new(nav_dir);

    run_backtest_pipeline(&data_port, &config, output_path.map(PathBuf::as_path), format)
}

fn run_compare(config_path: &PathBuf, data_dir: Option<&PathBuf>) -> ExitCode {
    let (adapter, config) = match load_backtest_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let data_port = CsvNavAdapter::new(resolve_data_dir(data_dir, Some(&adapter as &dyn ConfigPort)));
    run_compare_pipeline(&data_port, &config)
}

fn run_sweep(
    config_path: &PathBuf,
    data_dir: Option<&PathBuf>,
    amounts: &[f64],
    growth_rates: &[f64],
) -> ExitCode {
    let (adapter, config) = match load_backtest_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let data_port = CsvNavAdapter::new(resolve_data_dir(data_dir, Some(&adapter as &dyn ConfigPort)));
    run_sweep_pipeline(&data_port, &config, amounts, growth_rates)
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, NavsimError> {
    let start_date = read_date(adapter, "start_date")?;
    let end_date = read_date(adapter, "end_date")?;

    let amount = read_number(adapter, BACKTEST, "amount")?.ok_or_else(|| {
        NavsimError::ConfigMissing {
            section: BACKTEST.into(),
            key: "amount".into(),
        }
    })?;
    let frequency_str =
        adapter
            .get_string(BACKTEST, "frequency")
            .ok_or_else(|| NavsimError::ConfigMissing {
                section: BACKTEST.into(),
                key: "frequency".into(),
            })?;
    let frequency = Frequency::parse(&frequency_str).ok_or_else(|| NavsimError::ConfigInvalid {
        section: BACKTEST.into(),
        key: "frequency".into(),
        reason: format!("unknown frequency {frequency_str:?}"),
    })?;
    let day_of_month = match adapter.get_string(BACKTEST, "day_of_month") {
        Some(s) => Some(s.trim().parse::<u32>().map_err(|_| NavsimError::ConfigInvalid {
            section: BACKTEST.into(),
            key: "day_of_month".into(),
            reason: "day_of_month must be an integer".into(),
        })?),
        None => None,
    };

    let price_basis = match adapter.get_string(BACKTEST, "price_basis") {
        Some(s) => PriceBasis::parse(&s).ok_or_else(|| NavsimError::ConfigInvalid {
            section: BACKTEST.into(),
            key: "price_basis".into(),
            reason: format!("unknown price basis {s:?}"),
        })?,
        None => PriceBasis::default(),
    };

    let allocations = adapter
        .get_section(ALLOCATION)
        .into_iter()
        .map(|(fund_id, _)| {
            let weight = read_number(adapter, ALLOCATION, &fund_id)?.unwrap_or(0.0);
            Ok(FundAllocation::new(fund_id, weight))
        })
        .collect::<Result<Vec<_>, NavsimError>>()?;

    Ok(BacktestConfig {
        name: adapter
            .get_string(BACKTEST, "name")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "backtest".to_string()),
        strategy: build_strategy(adapter)?,
        allocations,
        date_range: DateRange::new(start_date, end_date),
        investment_policy: InvestmentPolicy {
            amount,
            frequency,
            day_of_month,
            fee_rate: read_number(adapter, BACKTEST, "fee_rate")?.unwrap_or(0.0),
        },
        benchmark: adapter
            .get_string(BACKTEST, "benchmark")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        risk_free_rate: read_number(adapter, BACKTEST, "risk_free_rate")?.unwrap_or(0.0),
        price_basis,
    })
}

pub fn build_strategy(adapter: &dyn ConfigPort) -> Result<StrategyDescriptor, NavsimError> {
    Ok(match read_strategy_type(adapter)? {
        StrategyKind::Fixed => StrategyDescriptor::FixedScheduled,
        StrategyKind::Smart => StrategyDescriptor::Smart {
            volatility_adjustment: read_bool(adapter, STRATEGY, "volatility_adjustment")?
                .unwrap_or(false),
        },
        StrategyKind::ValueAveraging => StrategyDescriptor::ValueAveraging {
            target_growth_rate: read_number(adapter, STRATEGY, "target_growth_rate")?.ok_or_else(
                || NavsimError::ConfigMissing {
                    section: STRATEGY.into(),
                    key: "target_growth_rate".into(),
                },
            )?,
            allow_withdrawals: read_bool(adapter, STRATEGY, "allow_withdrawals")?.unwrap_or(false),
            max_contribution_multiplier: read_number(
                adapter,
                STRATEGY,
                "max_contribution_multiplier",
            )?,
            min_contribution_multiplier: read_number(
                adapter,
                STRATEGY,
                "min_contribution_multiplier",
            )?,
        },
    })
}

/// `--data-dir`, else `[data] nav_dir`, else `./data`.
pub fn resolve_data_dir(data_dir: Option<&PathBuf>, config: Option<&dyn ConfigPort>) -> PathBuf {
    if let Some(dir) = data_dir {
        return dir.clone();
    }
    config
        .and_then(|c| c.get_string(DATA, "nav_dir"))
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_NAV_DIR))
}

/// Fetch NAV history for every allocated fund and the benchmark. A fund that
/// cannot be read is an error; an unreadable benchmark is only skipped.
pub fn load_navs(
    data_port: &dyn NavDataPort,
    config: &BacktestConfig,
) -> Result<HashMap<String, NavSeries>, NavsimError> {
    let start = config.date_range.start - Duration::days(LOOKBACK_DAYS);
    let end = config.date_range.end;

    let mut navs = HashMap::new();
    for alloc in &config.allocations {
        let series = data_port.fetch_nav(&alloc.fund_id, start, end)?;
        debug!(fund_id = %alloc.fund_id, points = series.len(), "loaded NAV history");
        navs.insert(alloc.fund_id.clone(), series);
    }
    if let Some(id) = &config.benchmark {
        match data_port.fetch_nav(id, start, end) {
            Ok(series) => {
                navs.insert(id.clone(), series);
            }
            Err(e) => warn!(fund_id = %id, error = %e, "benchmark data unavailable"),
        }
    }
    Ok(navs)
}

pub fn run_backtest_pipeline(
    data_port: &dyn NavDataPort,
    config: &BacktestConfig,
    output_path: Option<&Path>,
    format: ReportFormat,
) -> ExitCode {
    let navs = match load_navs(data_port, config) {
        Ok(n) => n,
        Err(e) => return fail(&e),
    };

    eprintln!(
        "Running backtest: {} ({}), {} to {}",
        config.name,
        config.strategy,
        config.date_range.start,
        config.date_range.end,
    );
    let result = match backtest_engine::run_backtest(config, &navs) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    print_summary(&result);

    let output = output_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| format.default_path());
    let Some(output_str) = output.to_str() else {
        eprintln!("error: output path is not valid UTF-8");
        return ExitCode::from(1);
    };
    match format.adapter().write(&result, output_str) {
        Ok(()) => {
            eprintln!("\nReport written to: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

/// Fixed, smart and value-averaging variants of `base`. A value-averaging
/// base keeps its own parameters; otherwise the target path does not grow.
pub fn comparison_configs(base: &BacktestConfig) -> Vec<BacktestConfig> {
    let value_averaging = match &base.strategy {
        s @ StrategyDescriptor::ValueAveraging { .. } => s.clone(),
        _ => StrategyDescriptor::ValueAveraging {
            target_growth_rate: 0.0,
            allow_withdrawals: false,
            max_contribution_multiplier: None,
            min_contribution_multiplier: None,
        },
    };
    let smart = match &base.strategy {
        s @ StrategyDescriptor::Smart { .. } => s.clone(),
        _ => StrategyDescriptor::Smart {
            volatility_adjustment: true,
        },
    };
    [StrategyDescriptor::FixedScheduled, smart, value_averaging]
        .into_iter()
        .map(|s| base.with_strategy(s))
        .collect()
}

pub fn run_compare_pipeline(data_port: &dyn NavDataPort, base: &BacktestConfig) -> ExitCode {
    let navs = match load_navs(data_port, base) {
        Ok(n) => n,
        Err(e) => return fail(&e),
    };

    let configs = comparison_configs(base);
    eprintln!("Comparing {} strategies for {}", configs.len(), base.name);
    let results = backtest_engine::run_batch(&configs, &navs);

    let labels: Vec<String> = configs
        .iter()
        .map(|c| c.strategy.label().to_string())
        .collect();
    print_table("Strategy", &labels, &results).unwrap_or(ExitCode::SUCCESS)
}

/// Amount and growth-rate sweeps of `base`, one table each.
pub fn run_sweep_pipeline(
    data_port: &dyn NavDataPort,
    base: &BacktestConfig,
    amounts: &[f64],
    growth_rates: &[f64],
) -> ExitCode {
    let navs = match load_navs(data_port, base) {
        Ok(n) => n,
        Err(e) => return fail(&e),
    };

    let mut first_error = None;
    if !amounts.is_empty() {
        eprintln!("Sweeping {} amounts for {}", amounts.len(), base.name);
        let results = backtest_engine::sweep_amounts(base, amounts, &navs);
        let labels: Vec<String> = amounts.iter().map(|a| format!("{a:.2}")).collect();
        first_error = print_table("Amount", &labels, &results);
    }
    if !growth_rates.is_empty() {
        if !amounts.is_empty() {
            println!();
        }
        eprintln!("Sweeping {} growth rates for {}", growth_rates.len(), base.name);
        let results = backtest_engine::sweep_growth_rates(base, growth_rates, &navs);
        let labels: Vec<String> = growth_rates
            .iter()
            .map(|g| format!("{:.2}%", g * 100.0))
            .collect();
        let error = print_table("Growth", &labels, &results);
        first_error = first_error.or(error);
    }

    first_error.unwrap_or(ExitCode::SUCCESS)
}

/// One row per run; failed runs are reported on stderr. Returns the exit
/// code of the first failure.
fn print_table(
    first_column: &str,
    labels: &[String],
    results: &[Result<BacktestResult, NavsimError>],
) -> Option<ExitCode> {
    println!(
        "{:<16} {:>14} {:>14} {:>10} {:>10} {:>8} {:>10}",
        first_column, "Invested", "Final Value", "Return", "Annual", "Sharpe", "Max DD"
    );
    let mut first_error = None;
    for (label, result) in labels.iter().zip(results) {
        match result {
            Ok(r) => println!(
                "{:<16} {:>14.2} {:>14.2} {:>9.2}% {:>9.2}% {:>8.2} {:>9.1}%",
                label,
                r.summary.total_invested,
                r.summary.final_value,
                r.summary.total_return * 100.0,
                r.summary.annualized_return * 100.0,
                r.statistics.sharpe_ratio,
                r.summary.max_drawdown * 100.0,
            ),
            Err(e) => {
                eprintln!("error: {label} failed: {e}");
                first_error.get_or_insert(ExitCode::from(e));
            }
        }
    }
    first_error
}

fn print_summary(result: &BacktestResult) {
    let s = &result.summary;
    let stats = &result.statistics;
    eprintln!("\n=== Results: {} ===", s.name);
    eprintln!("Investments:      {}", s.investments);
    eprintln!("Total Invested:   {:.2}", s.total_invested);
    eprintln!("Final Value:      {:.2}", s.final_value);
    eprintln!("Profit:           {:.2}", s.total_profit);
    eprintln!("Total Return:     {:.2}%", s.total_return * 100.0);
    eprintln!("Annualized:       {:.2}%", s.annualized_return * 100.0);
    eprintln!("Volatility:       {:.2}%", stats.volatility * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", stats.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", stats.sortino_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", s.max_drawdown * 100.0);
    eprintln!("Win Rate:         {:.1}%", stats.win_rate * 100.0);
    eprintln!("Profit/Loss:      {:.2}", stats.profit_loss_ratio);
    if let Some(b) = &stats.benchmark {
        eprintln!("Benchmark Return: {:.2}%", b.benchmark_return * 100.0);
        eprintln!("Excess Return:    {:.2}%", b.excess_return * 100.0);
    }
    if s.unmet_contribution != 0.0 {
        eprintln!("Unmet Contrib.:   {:.2}", s.unmet_contribution);
    }
    if !result.warnings.is_empty() {
        eprintln!(
            "\n{} stale NAV lookups ({} events)",
            result.warnings.len(),
            s.stale_points
        );
    }
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    let (_, config) = match load_backtest_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    eprintln!("\nBacktest: {}", config.name);
    eprintln!("  strategy:  {}", config.strategy);
    eprintln!(
        "  range:     {} to {}",
        config.date_range.start, config.date_range.end
    );
    eprintln!(
        "  policy:    {:.2} {}",
        config.investment_policy.amount, config.investment_policy.frequency
    );
    eprintln!("  allocation:");
    for alloc in &config.allocations {
        eprintln!("    {}: {}%", alloc.fund_id, alloc.weight);
    }
    if let Some(b) = &config.benchmark {
        eprintln!("  benchmark: {}", b);
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_info(fund: Option<&str>, data_dir: Option<&PathBuf>, config_path: Option<&PathBuf>) -> ExitCode {
    let config = match config_path.map(load_config).transpose() {
        Ok(c) => c,
        Err(code) => return code,
    };
    let nav_dir = resolve_data_dir(data_dir, config.as_ref().map(|c| c as &dyn ConfigPort));
    let data_port = CsvNavAdapter::new(nav_dir);
    run_info_pipeline(&data_port, fund)
}

pub fn run_info_pipeline(data_port: &dyn NavDataPort, fund: Option<&str>) -> ExitCode {
    let funds = match fund {
        Some(f) => vec![f.to_string()],
        None => match data_port.list_funds() {
            Ok(f) => f,
            Err(e) => return fail(&e),
        },
    };

    if funds.is_empty() {
        eprintln!("No NAV files found");
        return ExitCode::SUCCESS;
    }

    let mut failed = None;
    for f in &funds {
        match data_port.get_data_range(f) {
            Ok(Some((first, last, count))) => println!("{}", coverage_line(f, first, last, count)),
            Ok(None) => eprintln!("{}: no data found", f),
            Err(e) => {
                eprintln!("error querying {}: {}", f, e);
                failed.get_or_insert(e);
            }
        }
    }
    match (fund, failed) {
        (Some(_), Some(e)) => (&e).into(),
        _ => ExitCode::SUCCESS,
    }
}

pub fn coverage_line(fund: &str, first: NaiveDate, last: NaiveDate, count: usize) -> String {
    format!("{}: {} points, {} to {}", fund, count, first, last)
}
