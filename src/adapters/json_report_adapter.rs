//! JSON report adapter implementing ReportPort.
//!
//! Writes the whole [`BacktestResult`] as pretty-printed JSON. Floats are
//! written with full round-trip precision.

use std::fs;
use std::path::Path;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::NavsimError;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), NavsimError> {
        let json = serde_json::to_string_pretty(result).map_err(|e| NavsimError::Report {
            reason: format!("failed to serialize result: {}", e),
        })?;

        let path = Path::new(output_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(NavsimError::Io)?;
        }
        fs::write(path, json).map_err(NavsimError::Io)?;

        Ok(())
    }
}
