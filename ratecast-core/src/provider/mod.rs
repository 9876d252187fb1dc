//! Market data provider trait and provider-side types.
//!
//! The [`MarketDataProvider`] trait abstracts over the upstream data
//! source so extractors can be exercised against in-memory stubs in
//! tests. The shipped implementation is [`yahoo::YahooClient`].

pub mod yahoo;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::convert::InfoBlob;
use crate::error::{Error, Result};
use crate::records::PriceBar;

pub use yahoo::YahooClient;

/// Relative lookback window accepted by the chart endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    OneDay,
    FiveDays,
    OneYear,
    FiveYears,
    TenYears,
    FifteenYears,
    TwentyYears,
    Max,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::OneDay => "1d",
            Period::FiveDays => "5d",
            Period::OneYear => "1y",
            Period::FiveYears => "5y",
            Period::TenYears => "10y",
            Period::FifteenYears => "15y",
            Period::TwentyYears => "20y",
            Period::Max => "max",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1d" => Ok(Period::OneDay),
            "5d" => Ok(Period::FiveDays),
            "1y" => Ok(Period::OneYear),
            "5y" => Ok(Period::FiveYears),
            "10y" => Ok(Period::TenYears),
            "15y" => Ok(Period::FifteenYears),
            "20y" => Ok(Period::TwentyYears),
            "max" => Ok(Period::Max),
            other => Err(Error::InvalidArgument(format!(
                "unsupported period '{other}' (expected 1d, 5d, 1y, 5y, 10y, 15y, 20y, or max)"
            ))),
        }
    }
}

/// Bar spacing accepted by the chart endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interval {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Daily => "1d",
            Interval::Weekly => "1wk",
            Interval::Monthly => "1mo",
        }
    }
}

/// Either a relative lookback or an explicit date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRange {
    Period(Period),
    Between { start: NaiveDate, end: NaiveDate },
}

impl From<Period> for HistoryRange {
    fn from(period: Period) -> Self {
        HistoryRange::Period(period)
    }
}

/// One financial statement as reported: a list of period end dates
/// (ascending) and named line-item rows aligned to those dates.
#[derive(Debug, Clone, Default)]
pub struct StatementTable {
    pub periods: Vec<NaiveDate>,
    pub rows: BTreeMap<String, Vec<Option<f64>>>,
}

impl StatementTable {
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty() || self.rows.is_empty()
    }

    /// Most recent non-null value for the first alias that has one.
    ///
    /// Providers rename line items over time, so lookups carry the
    /// known aliases in preference order.
    pub fn latest(&self, aliases: &[&str]) -> Option<f64> {
        for alias in aliases {
            if let Some(values) = self.rows.get(*alias) {
                if let Some(v) = values.iter().rev().flatten().next() {
                    return Some(*v);
                }
            }
        }
        None
    }
}

/// Upstream market data source.
///
/// `history` returns an empty vec when the provider has no rows for
/// the requested window; callers decide whether that is an error.
pub trait MarketDataProvider {
    /// Human-readable source name, recorded in export metadata.
    fn name(&self) -> &str;

    /// OHLCV bars for a symbol over a range.
    fn history(
        &self,
        symbol: &str,
        range: HistoryRange,
        interval: Interval,
    ) -> Result<Vec<PriceBar>>;

    /// Full quote summary for a symbol.
    fn info(&self, symbol: &str) -> Result<InfoBlob>;

    /// Reduced quote lookup used when the full summary is unavailable.
    fn info_fallback(&self, symbol: &str) -> Result<InfoBlob>;

    /// Cash dividends per ex-dividend date over a range.
    fn dividends(&self, symbol: &str, range: HistoryRange) -> Result<BTreeMap<NaiveDate, f64>>;

    /// Annual income statement.
    fn income_statement(&self, symbol: &str) -> Result<StatementTable>;

    /// Annual balance sheet.
    fn balance_sheet(&self, symbol: &str) -> Result<StatementTable>;

    /// Annual cash flow statement.
    fn cash_flow(&self, symbol: &str) -> Result<StatementTable>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_round_trips_through_str() {
        for token in ["1d", "5d", "1y", "5y", "10y", "15y", "20y", "max"] {
            let period: Period = token.parse().unwrap();
            assert_eq!(period.as_str(), token);
        }
    }

    #[test]
    fn unknown_period_is_invalid_argument() {
        let err = "3mo".parse::<Period>().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn statement_latest_prefers_newest_and_first_alias() {
        let mut table = StatementTable {
            periods: vec![date(2021, 12, 31), date(2022, 12, 31), date(2023, 12, 31)],
            rows: BTreeMap::new(),
        };
        table.rows.insert(
            "Total Revenue".into(),
            vec![Some(100.0), Some(110.0), None],
        );
        table
            .rows
            .insert("Operating Revenue".into(), vec![None, None, Some(120.0)]);

        // Newest non-null within the first alias wins, even when a later
        // alias has a fresher value.
        assert_eq!(
            table.latest(&["Total Revenue", "Operating Revenue"]),
            Some(110.0)
        );
        assert_eq!(table.latest(&["Operating Revenue"]), Some(120.0));
        assert_eq!(table.latest(&["EBITDA"]), None);
    }

    #[test]
    fn statement_empty_without_rows() {
        assert!(StatementTable::default().is_empty());
    }
}
