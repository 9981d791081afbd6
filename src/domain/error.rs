//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for navsim.
///
/// Structural configuration errors (range, allocation, policy, strategy) are
/// raised before a simulation starts. Data gaps found while simulating are
/// recovered by carry-forward and reported as [`StaleDataWarning`]s instead.
#[derive(Debug, thiserror::Error)]
pub enum NavsimError {
    #[error("invalid date range: start {start} is not before end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid allocation: {reason}")]
    InvalidAllocation { reason: String },

    #[error("invalid investment policy: {reason}")]
    InvalidPolicy { reason: String },

    #[error("invalid strategy: {reason}")]
    InvalidStrategy { reason: String },

    #[error("insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&NavsimError> for std::process::ExitCode {
    fn from(err: &NavsimError) -> Self {
        let code: u8 = match err {
            NavsimError::Io(_) | NavsimError::Report { .. } => 1,
            NavsimError::ConfigParse { .. }
            | NavsimError::ConfigMissing { .. }
            | NavsimError::ConfigInvalid { .. } => 2,
            NavsimError::Data { .. } => 3,
            NavsimError::InvalidRange { .. }
            | NavsimError::InvalidAllocation { .. }
            | NavsimError::InvalidPolicy { .. }
            | NavsimError::InvalidStrategy { .. } => 4,
            NavsimError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

/// Non-fatal notice that a NAV older (or newer) than the scheduled date was
/// used for a fund.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StaleDataWarning {
    pub fund_id: String,
    pub date: NaiveDate,
    pub nav_date: NaiveDate,
}

impl std::fmt::Display for StaleDataWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "stale NAV for {} on {}: used value from {}",
            self.fund_id, self.date, self.nav_date
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::ExitCode;

    #[test]
    fn invalid_range_message() {
        let err = NavsimError::InvalidRange {
            start: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "invalid date range: start 2024-02-01 is not before end 2024-01-01"
        );
    }

    // ExitCode has no PartialEq, so compare the Debug rendering.
    fn exit_debug(err: &NavsimError) -> String {
        format!("{:?}", ExitCode::from(err))
    }

    #[test]
    fn exit_codes_by_kind() {
        let config = NavsimError::ConfigMissing {
            section: "backtest".into(),
            key: "amount".into(),
        };
        assert_eq!(exit_debug(&config), format!("{:?}", ExitCode::from(2u8)));

        let alloc = NavsimError::InvalidAllocation {
            reason: "sum 90".into(),
        };
        assert_eq!(exit_debug(&alloc), format!("{:?}", ExitCode::from(4u8)));

        let data = NavsimError::InsufficientData {
            reason: "none".into(),
        };
        assert_eq!(exit_debug(&data), format!("{:?}", ExitCode::from(5u8)));
    }

    #[test]
    fn stale_warning_display() {
        let w = StaleDataWarning {
            fund_id: "110022".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 6).unwrap(),
            nav_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
        };
        assert_eq!(
            w.to_string(),
            "stale NAV for 110022 on 2024-01-06: used value from 2024-01-05"
        );
    }
}
