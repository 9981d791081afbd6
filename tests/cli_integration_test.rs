//! CLI integration tests for config loading and command orchestration.
//!
//! Tests cover:
//! - Config parsing (build_backtest_config, build_strategy)
//! - Data directory resolution
//! - NAV loading with lookback and benchmark handling
//! - Backtest, compare, sweep and info pipelines with MockNavPort
//! - End-to-end commands with real INI and CSV files on disk

mod common;

use common::*;
use navsim::adapters::file_config_adapter::FileConfigAdapter;
use clap::Parser;
use navsim::cli::{self, Cli, Command, ReportFormat};
use navsim::domain::backtest::BacktestResult;
use navsim::domain::error::NavsimError;
use navsim::domain::schedule::Frequency;
use navsim::domain::strategy::StrategyDescriptor;
use navsim::ports::config_port::ConfigPort;
use std::io::Write;
use std::path::PathBuf;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const VALID_INI: &str = r#"
[backtest]
name = Balanced plan
start_date = 2023-01-01
end_date = 2023-12-31
amount = 1000
frequency = monthly
day_of_month = 15
fee_rate = 0.0015
risk_free_rate = 0.02
benchmark = IDX
price_basis = accumulated

[strategy]
type = smart
volatility_adjustment = yes

[allocation]
F001 = 60
B002 = 40

[data]
nav_dir = /var/lib/navs
"#;

const MINIMAL_INI: &str = r#"
[backtest]
start_date = 2023-01-01
end_date = 2023-12-31
amount = 500
frequency = weekly

[allocation]
F001 = 100
"#;

mod config_loading {
    use super::*;
    use navsim::domain::nav::PriceBasis;

    #[test]
    fn build_backtest_config_valid_full() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();

        assert_eq!(config.name, "Balanced plan");
        assert_eq!(config.date_range.start, date(2023, 1, 1));
        assert_eq!(config.date_range.end, date(2023, 12, 31));
        assert_eq!(config.investment_policy.amount, 1000.0);
        assert_eq!(config.investment_policy.frequency, Frequency::Monthly);
        assert_eq!(config.investment_policy.day_of_month, Some(15));
        assert_eq!(config.investment_policy.fee_rate, 0.0015);
        assert_eq!(config.risk_free_rate, 0.02);
        assert_eq!(config.benchmark.as_deref(), Some("IDX"));
        assert_eq!(config.price_basis, PriceBasis::Accumulated);
        assert_eq!(
            config.strategy,
            StrategyDescriptor::Smart {
                volatility_adjustment: true
            }
        );
        // Section entries come back sorted by fund id.
        let funds: Vec<(&str, f64)> = config
            .allocations
            .iter()
            .map(|a| (a.fund_id.as_str(), a.weight))
            .collect();
        assert_eq!(funds, vec![("B002", 40.0), ("F001", 60.0)]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn build_backtest_config_uses_defaults() {
        let adapter = FileConfigAdapter::from_string(MINIMAL_INI).unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();

        assert_eq!(config.name, "backtest");
        assert_eq!(config.strategy, StrategyDescriptor::FixedScheduled);
        assert_eq!(config.investment_policy.day_of_month, None);
        assert_eq!(config.investment_policy.fee_rate, 0.0);
        assert_eq!(config.risk_free_rate, 0.0);
        assert_eq!(config.benchmark, None);
        assert_eq!(config.price_basis, PriceBasis::Unit);
    }

    #[test]
    fn build_backtest_config_missing_start_date() {
        let ini = MINIMAL_INI.replace("start_date = 2023-01-01\n", "");
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        let err = cli::build_backtest_config(&adapter).unwrap_err();
        assert!(matches!(err, NavsimError::ConfigMissing { key, .. } if key == "start_date"));
    }

    #[test]
    fn build_backtest_config_invalid_date_format() {
        let ini = MINIMAL_INI.replace("2023-12-31", "31/12/2023");
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        let err = cli::build_backtest_config(&adapter).unwrap_err();
        assert!(matches!(err, NavsimError::ConfigInvalid { key, .. } if key == "end_date"));
    }

    #[test]
    fn build_backtest_config_unknown_frequency() {
        let ini = MINIMAL_INI.replace("weekly", "fortnightly");
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        let err = cli::build_backtest_config(&adapter).unwrap_err();
        assert!(matches!(err, NavsimError::ConfigInvalid { key, .. } if key == "frequency"));
    }

    #[test]
    fn build_strategy_value_averaging() {
        let adapter = FileConfigAdapter::from_string(
            "[strategy]\ntype = va\ntarget_growth_rate = 0.01\nallow_withdrawals = true\nmax_contribution_multiplier = 3\nmin_contribution_multiplier = 0.1\n",
        )
        .unwrap();
        assert_eq!(
            cli::build_strategy(&adapter).unwrap(),
            StrategyDescriptor::ValueAveraging {
                target_growth_rate: 0.01,
                allow_withdrawals: true,
                max_contribution_multiplier: Some(3.0),
                min_contribution_multiplier: Some(0.1),
            }
        );
    }

    #[test]
    fn build_strategy_value_averaging_requires_growth_rate() {
        let adapter = FileConfigAdapter::from_string("[strategy]\ntype = value_averaging\n").unwrap();
        let err = cli::build_strategy(&adapter).unwrap_err();
        assert!(
            matches!(err, NavsimError::ConfigMissing { key, .. } if key == "target_growth_rate")
        );
    }

    #[test]
    fn build_strategy_defaults_and_aliases() {
        let empty = FileConfigAdapter::from_string("[backtest]\nname = x\n").unwrap();
        assert_eq!(
            cli::build_strategy(&empty).unwrap(),
            StrategyDescriptor::FixedScheduled
        );

        let alias = FileConfigAdapter::from_string("[strategy]\ntype = Fixed_Scheduled\n").unwrap();
        assert_eq!(
            cli::build_strategy(&alias).unwrap(),
            StrategyDescriptor::FixedScheduled
        );

        let smart = FileConfigAdapter::from_string("[strategy]\ntype = smart\n").unwrap();
        assert_eq!(
            cli::build_strategy(&smart).unwrap(),
            StrategyDescriptor::Smart {
                volatility_adjustment: false
            }
        );
    }

    #[test]
    fn build_strategy_unknown_type() {
        let adapter = FileConfigAdapter::from_string("[strategy]\ntype = martingale\n").unwrap();
        let err = cli::build_strategy(&adapter).unwrap_err();
        assert!(matches!(err, NavsimError::ConfigInvalid { key, .. } if key == "type"));
    }
}

mod data_dir {
    use super::*;

    #[test]
    fn flag_wins_over_config() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let flag = PathBuf::from("/tmp/navs");
        let dir = cli::resolve_data_dir(Some(&flag), Some(&adapter as &dyn ConfigPort));
        assert_eq!(dir, flag);
    }

    #[test]
    fn config_used_without_flag() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let dir = cli::resolve_data_dir(None, Some(&adapter as &dyn ConfigPort));
        assert_eq!(dir, PathBuf::from("/var/lib/navs"));
    }

    #[test]
    fn falls_back_to_data() {
        let adapter = FileConfigAdapter::from_string(MINIMAL_INI).unwrap();
        assert_eq!(
            cli::resolve_data_dir(None, Some(&adapter as &dyn ConfigPort)),
            PathBuf::from("data")
        );
        assert_eq!(cli::resolve_data_dir(None, None), PathBuf::from("data"));
    }
}

mod nav_loading {
    use super::*;

    #[test]
    fn fetches_with_lookback() {
        let port = MockNavPort::new().with_points("F1", flat_points(date(2022, 9, 1), 500, 1.0));
        let config = monthly_config("F1", date(2023, 1, 1), date(2023, 12, 31), 100.0);

        let navs = cli::load_navs(&port, &config).unwrap();
        assert!(navs.contains_key("F1"));
        let fetches = port.fetches.borrow();
        assert_eq!(fetches.len(), 1);
        assert_eq!(
            fetches[0],
            ("F1".to_string(), date(2022, 10, 3), date(2023, 12, 31))
        );
        assert_eq!(navs["F1"].first_date(), Some(date(2022, 10, 3)));
    }

    #[test]
    fn fund_error_is_fatal() {
        let port = MockNavPort::new().with_error("F1", "disk on fire");
        let config = monthly_config("F1", date(2023, 1, 1), date(2023, 12, 31), 100.0);
        let err = cli::load_navs(&port, &config).unwrap_err();
        assert!(matches!(err, NavsimError::Data { .. }));
    }

    #[test]
    fn benchmark_error_is_skipped() {
        let port = MockNavPort::new()
            .with_points("F1", flat_points(date(2022, 9, 1), 500, 1.0))
            .with_error("IDX", "not found");
        let mut config = monthly_config("F1", date(2023, 1, 1), date(2023, 12, 31), 100.0);
        config.benchmark = Some("IDX".into());

        let navs = cli::load_navs(&port, &config).unwrap();
        assert_eq!(navs.len(), 1);
        assert_eq!(port.fetches.borrow().len(), 2);
    }
}

mod pipelines {
    use super::*;

    fn flat_port() -> MockNavPort {
        MockNavPort::new()
            .with_points("F1", flat_points(date(2022, 9, 1), 500, 1.0))
            .with_points("IDX", flat_points(date(2022, 9, 1), 500, 2.0))
    }

    #[test]
    fn backtest_writes_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("result.json");
        let config = monthly_config("F1", date(2023, 1, 1), date(2023, 12, 31), 1000.0);

        let code = cli::run_backtest_pipeline(&flat_port(), &config, Some(out.as_path()), ReportFormat::Json);
        assert!(exit_is(code, 0));

        let json = std::fs::read_to_string(&out).unwrap();
        let result: BacktestResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result.summary.investments, 12);
        assert_eq!(result.summary.total_invested, 12_000.0);
        assert_eq!(result.summary.final_value, 12_000.0);
    }

    #[test]
    fn backtest_writes_csv_report() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("result.csv");
        let mut config = monthly_config("F1", date(2023, 1, 1), date(2023, 6, 30), 1000.0);
        config.benchmark = Some("IDX".into());

        let code = cli::run_backtest_pipeline(&flat_port(), &config, Some(out.as_path()), ReportFormat::Csv);
        assert!(exit_is(code, 0));

        let content = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 7);
        assert!(lines[0].starts_with("date,"));
        assert!(lines[1].starts_with("2023-01-01,"));
    }

    #[test]
    fn missing_fund_exits_with_data_code() {
        let config = monthly_config("NOPE", date(2023, 1, 1), date(2023, 12, 31), 1000.0);
        let port = MockNavPort::new().with_error("NOPE", "no such file");
        let code = cli::run_backtest_pipeline(&port, &config, None, ReportFormat::Json);
        assert!(exit_is(code, 3));
    }

    #[test]
    fn empty_history_exits_with_insufficient_data_code() {
        let config = monthly_config("F1", date(2023, 1, 1), date(2023, 12, 31), 1000.0);
        let port = MockNavPort::new().with_points("F1", flat_points(date(2019, 1, 1), 30, 1.0));
        let code = cli::run_backtest_pipeline(&port, &config, None, ReportFormat::Json);
        assert!(exit_is(code, 5));
    }

    #[test]
    fn unwritable_report_exits_with_io_code() {
        let dir = tempfile::tempdir().unwrap();
        // The output path is an existing directory.
        let out = dir.path().to_path_buf();
        let config = monthly_config("F1", date(2023, 1, 1), date(2023, 3, 31), 1000.0);
        let code = cli::run_backtest_pipeline(&flat_port(), &config, Some(out.as_path()), ReportFormat::Json);
        assert!(exit_is(code, 1));
    }

    #[test]
    fn comparison_covers_three_strategies() {
        let base = monthly_config("F1", date(2023, 1, 1), date(2023, 12, 31), 1000.0);
        let configs = cli::comparison_configs(&base);
        let labels: Vec<&str> = configs.iter().map(|c| c.strategy.label()).collect();
        assert_eq!(labels, vec!["fixed", "smart", "value_averaging"]);
        assert_eq!(configs[1].name, "test plan (smart)");
        assert_eq!(
            configs[1].strategy,
            StrategyDescriptor::Smart {
                volatility_adjustment: true
            }
        );
    }

    #[test]
    fn comparison_keeps_base_parameters() {
        let va = StrategyDescriptor::ValueAveraging {
            target_growth_rate: 0.02,
            allow_withdrawals: true,
            max_contribution_multiplier: Some(2.0),
            min_contribution_multiplier: None,
        };
        let mut base = monthly_config("F1", date(2023, 1, 1), date(2023, 12, 31), 1000.0);
        base.strategy = va.clone();
        let configs = cli::comparison_configs(&base);
        assert_eq!(configs[2].strategy, va);
        assert!(configs.iter().all(|c| c.allocations == base.allocations));
    }

    #[test]
    fn compare_succeeds_on_flat_data() {
        let base = monthly_config("F1", date(2023, 1, 1), date(2023, 12, 31), 1000.0);
        let code = cli::run_compare_pipeline(&flat_port(), &base);
        assert!(exit_is(code, 0));
    }

    #[test]
    fn compare_reports_invalid_config() {
        let mut base = monthly_config("F1", date(2023, 1, 1), date(2023, 12, 31), 1000.0);
        base.allocations[0].weight = 50.0;
        let code = cli::run_compare_pipeline(&flat_port(), &base);
        assert!(exit_is(code, 4));
    }

    #[test]
    fn sweep_succeeds_on_flat_data() {
        let base = monthly_config("F1", date(2023, 1, 1), date(2023, 12, 31), 1000.0);
        let code = cli::run_sweep_pipeline(&flat_port(), &base, &[500.0, 1000.0], &[0.0, 0.01]);
        assert!(exit_is(code, 0));
    }

    #[test]
    fn sweep_reports_invalid_amount() {
        let base = monthly_config("F1", date(2023, 1, 1), date(2023, 12, 31), 1000.0);
        let code = cli::run_sweep_pipeline(&flat_port(), &base, &[500.0, 0.0], &[]);
        assert!(exit_is(code, 4));
    }

    #[test]
    fn sweep_arguments_are_comma_separated() {
        let cli = Cli::try_parse_from([
            "navsim",
            "sweep",
            "--config",
            "plan.ini",
            "--amounts",
            "500,1000",
            "--growth-rates",
            "0.01",
        ])
        .unwrap();
        match cli.command {
            Command::Sweep {
                amounts,
                growth_rates,
                ..
            } => {
                assert_eq!(amounts, vec![500.0, 1000.0]);
                assert_eq!(growth_rates, vec![0.01]);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["navsim", "sweep", "--config", "plan.ini"]).is_err());
    }

    #[test]
    fn info_lists_every_fund() {
        assert!(exit_is(cli::run_info_pipeline(&flat_port(), None), 0));
        assert!(exit_is(cli::run_info_pipeline(&MockNavPort::new(), None), 0));
    }

    #[test]
    fn info_single_fund_error() {
        let port = MockNavPort::new().with_error("BAD", "unreadable");
        assert!(exit_is(cli::run_info_pipeline(&port, Some("BAD")), 3));
        assert!(exit_is(cli::run_info_pipeline(&port, Some("OTHER")), 0));
    }

    #[test]
    fn coverage_line_format() {
        assert_eq!(
            cli::coverage_line("F1", date(2020, 1, 2), date(2024, 12, 31), 1234),
            "F1: 1234 points, 2020-01-02 to 2024-12-31"
        );
    }
}

mod commands {
    use super::*;

    fn validate(content: &str) -> std::process::ExitCode {
        let file = write_temp_ini(content);
        cli::run(Cli {
            command: Command::Validate {
                config: file.path().to_path_buf(),
            },
        })
    }

    #[test]
    fn validate_accepts_valid_config() {
        assert!(exit_is(validate(VALID_INI), 0));
        assert!(exit_is(validate(MINIMAL_INI), 0));
    }

    #[test]
    fn validate_rejects_config_errors() {
        assert!(exit_is(validate(&MINIMAL_INI.replace("500", "-500")), 2));
        assert!(exit_is(validate(&MINIMAL_INI.replace("2023-12-31", "2022-12-31")), 2));
        assert!(exit_is(validate("[backtest]\nname = empty\n"), 2));
    }

    #[test]
    fn validate_rejects_bad_weights() {
        let ini = MINIMAL_INI.replace("F001 = 100", "F001 = 60\nF002 = 30");
        assert!(exit_is(validate(&ini), 4));
    }

    #[test]
    fn validate_missing_file() {
        let code = cli::run(Cli {
            command: Command::Validate {
                config: PathBuf::from("/nonexistent/navsim.ini"),
            },
        });
        assert!(exit_is(code, 2));
    }

    #[test]
    fn backtest_end_to_end_with_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut csv = String::from("date,unit_nav,accumulated_nav\n");
        for p in flat_points(date(2022, 12, 1), 60, 1.25) {
            csv.push_str(&format!("{},{},{}\n", p.date, p.unit_nav, p.accumulated_nav));
        }
        std::fs::write(dir.path().join("F001.csv"), csv).unwrap();

        let ini = write_temp_ini(
            "[backtest]\nstart_date = 2023-01-02\nend_date = 2023-01-27\namount = 100\nfrequency = weekly\n\n[allocation]\nF001 = 100\n",
        );
        let out = dir.path().join("report.json");
        let code = cli::run(Cli {
            command: Command::Backtest {
                config: ini.path().to_path_buf(),
                data_dir: Some(dir.path().to_path_buf()),
                output: Some(out.clone()),
                format: ReportFormat::Json,
            },
        });
        assert!(exit_is(code, 0));

        let result: BacktestResult =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(result.performance.len(), 4);
        assert_eq!(result.summary.total_invested, 400.0);
        assert_eq!(result.summary.final_value, 400.0);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn info_reads_data_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("F001.csv"),
            "date,unit_nav\n2024-01-02,1.0\n2024-01-03,1.1\n",
        )
        .unwrap();
        let code = cli::run(Cli {
            command: Command::Info {
                fund: None,
                data_dir: Some(dir.path().to_path_buf()),
                config: None,
            },
        });
        assert!(exit_is(code, 0));
    }
}
