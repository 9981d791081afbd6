//! NAV data access port trait.

use crate::domain::error::NavsimError;
use crate::domain::nav::NavSeries;
use chrono::NaiveDate;

pub trait NavDataPort {
    /// NAV history of `fund_id` dated within `[start_date, end_date]`.
    fn fetch_nav(
        &self,
        fund_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<NavSeries, NavsimError>;

    fn list_funds(&self) -> Result<Vec<String>, NavsimError>;

    /// First date, last date and number of points, or `None` when the fund
    /// has no data.
    fn get_data_range(
        &self,
        fund_id: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, NavsimError>;
}
