//! Drawdown episode detection.
//!
//! Episodes are measured on the contribution-adjusted growth index (see
//! [`returns::growth_index`]), so a deposit can never hide a loss and a
//! withdrawal can never look like one.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::returns;
use super::simulation::PerformancePoint;

/// Episodes shallower than this are treated as noise.
pub const MIN_EPISODE_DEPTH: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownEpisode {
    /// Date of the peak the decline started from.
    pub start_date: NaiveDate,
    pub trough_date: NaiveDate,
    /// First date above the previous peak; `None` while unresolved.
    pub end_date: Option<NaiveDate>,
    /// Fraction lost from peak to trough (0-1).
    pub depth: f64,
    /// Growth-index level at the peak (1.0 at the first event), not a
    /// currency amount.
    pub peak_index: f64,
    /// Growth-index level at the trough.
    pub trough_index: f64,
    /// Peak to recovery, or peak to the last point when unresolved.
    pub duration_days: i64,
    /// Trough to recovery.
    pub recovery_duration_days: Option<i64>,
}

impl DrawdownEpisode {
    pub fn is_recovered(&self) -> bool {
        self.end_date.is_some()
    }
}

pub fn analyze(series: &[PerformancePoint]) -> Vec<DrawdownEpisode> {
    analyze_with_threshold(series, MIN_EPISODE_DEPTH)
}

pub fn analyze_with_threshold(series: &[PerformancePoint], min_depth: f64) -> Vec<DrawdownEpisode> {
    detect(&returns::growth_index(series), min_depth)
}

/// Deepest peak-to-trough decline of the growth index, with no noise filter.
pub fn max_drawdown(series: &[PerformancePoint]) -> f64 {
    detect(&returns::growth_index(series), 0.0)
        .iter()
        .map(|e| e.depth)
        .fold(0.0, f64::max)
}

struct OpenEpisode {
    start_date: NaiveDate,
    peak: f64,
    trough: f64,
    trough_date: NaiveDate,
}

impl OpenEpisode {
    fn depth(&self) -> f64 {
        if self.peak > 0.0 {
            returns::finite_or_zero((self.peak - self.trough) / self.peak)
        } else {
            0.0
        }
    }

    fn close(self, end_date: Option<NaiveDate>, last_date: NaiveDate) -> DrawdownEpisode {
        let depth = self.depth();
        let until = end_date.unwrap_or(last_date);
        DrawdownEpisode {
            start_date: self.start_date,
            trough_date: self.trough_date,
            end_date,
            depth,
            peak_index: self.peak,
            trough_index: self.trough,
            duration_days: (until - self.start_date).num_days(),
            recovery_duration_days: end_date.map(|end| (end - self.trough_date).num_days()),
        }
    }
}

/// Run the peak/trough state machine over `(date, value)` pairs.
pub fn detect(values: &[(NaiveDate, f64)], min_depth: f64) -> Vec<DrawdownEpisode> {
    let Some(&(first_date, first_value)) = values.first() else {
        return Vec::new();
    };

    let mut episodes = Vec::new();
    let mut peak = first_value;
    let mut peak_date = first_date;
    let mut open: Option<OpenEpisode> = None;

    for &(date, value) in &values[1..] {
        if value > peak {
            if let Some(ep) = open.take() {
                let closed = ep.close(Some(date), date);
                if closed.depth >= min_depth {
                    episodes.push(closed);
                }
            }
            peak = value;
            peak_date = date;
        } else if value < peak {
            let ep = open.get_or_insert(OpenEpisode {
                start_date: peak_date,
                peak,
                trough: value,
                trough_date: date,
            });
            if value < ep.trough {
                ep.trough = value;
                ep.trough_date = date;
            }
        }
    }

    if let Some(ep) = open {
        let last_date = values[values.len() - 1].0;
        let closed = ep.close(None, last_date);
        if closed.depth >= min_depth {
            episodes.push(closed);
        }
    }

    episodes
}
