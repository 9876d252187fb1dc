//! Equity records: price series, dividends, company profile, and
//! fundamentals.
//!
//! Parquet layout mirrors the currency-pair records: `symbol={T}/` for
//! single-row records, `symbol={T}/year={Y}/` for date-indexed series.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::frame::{date_column, flatten_record, single_row_dataframe, write_parquet_file};
use super::{Exportable, Metadata, PriceBar};
use crate::error::{Error, Result};
use crate::metrics::round6;

fn parse_iso_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| Error::InvalidArgument(format!("date must be YYYY-MM-DD, got '{date}'")))
}

/// Write one Parquet file per calendar year under
/// `{base}/symbol={T}/year={Y}/{filename}`.
fn write_dated_partitions(
    symbol: &str,
    rows: &BTreeMap<NaiveDate, f64>,
    df_for_year: impl Fn(&[(NaiveDate, f64)]) -> Result<DataFrame>,
    base_folder: &Path,
    filename: &str,
) -> Result<()> {
    let mut by_year: BTreeMap<i32, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for (&date, &value) in rows {
        by_year.entry(date.year()).or_default().push((date, value));
    }
    for (year, year_rows) in &by_year {
        let df = df_for_year(year_rows)?;
        let path = base_folder
            .join(format!("symbol={symbol}"))
            .join(format!("year={year}"))
            .join(filename);
        write_parquet_file(&df, &path)?;
    }
    Ok(())
}

// ─── Price series ───────────────────────────────────────────────────

/// Date-keyed closing prices for one symbol.
///
/// Adjusted close is preferred upstream, so the values here already
/// account for splits and dividends when the provider reports them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub prices: BTreeMap<NaiveDate, f64>,
    pub currency: Option<String>,
    pub metadata: Metadata,
}

impl PriceSeries {
    pub fn new(symbol: &str, metadata: Metadata) -> Self {
        Self {
            symbol: symbol.to_string(),
            prices: BTreeMap::new(),
            currency: None,
            metadata,
        }
    }

    /// Add or update the price for an ISO `YYYY-MM-DD` date.
    pub fn add_price(&mut self, date: &str, price: f64) -> Result<()> {
        let date = parse_iso_date(date)?;
        self.insert(date, price);
        Ok(())
    }

    pub fn insert(&mut self, date: NaiveDate, price: f64) {
        self.prices.insert(date, price);
        self.metadata.touch();
    }

    fn rows_dataframe(&self, rows: &[(NaiveDate, f64)]) -> Result<DataFrame> {
        let n = rows.len();
        DataFrame::new(vec![
            Column::new("symbol".into(), vec![self.symbol.clone(); n]),
            date_column("date", rows.iter().map(|(d, _)| Some(*d)).collect())?,
            Column::new(
                "price".into(),
                rows.iter().map(|(_, p)| round6(*p)).collect::<Vec<f64>>(),
            ),
            Column::new("currency".into(), vec![self.currency.clone(); n]),
            Column::new("lastUpdated".into(), vec![self.metadata.last_updated_str(); n]),
            Column::new("source".into(), vec![self.metadata.source.clone(); n]),
        ])
        .map_err(|e| Error::Parquet(format!("dataframe creation: {e}")))
    }

    /// Partitioned by symbol and by the calendar year of each row.
    pub fn write_parquet(&self, base_folder: &Path, filename: &str) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        write_dated_partitions(
            &self.symbol,
            &self.prices,
            |rows| self.rows_dataframe(rows),
            base_folder,
            filename,
        )
    }
}

impl Exportable for PriceSeries {
    fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    fn to_dataframe(&self) -> Result<DataFrame> {
        let rows: Vec<(NaiveDate, f64)> = self.prices.iter().map(|(&d, &p)| (d, p)).collect();
        self.rows_dataframe(&rows)
    }
}

// ─── Dividends ──────────────────────────────────────────────────────

/// Cash dividend amounts per ex-dividend date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DividendRecord {
    pub symbol: String,
    pub amounts: BTreeMap<NaiveDate, f64>,
    pub currency: Option<String>,
    pub metadata: Metadata,
}

impl DividendRecord {
    pub fn new(symbol: &str, metadata: Metadata) -> Self {
        Self {
            symbol: symbol.to_string(),
            amounts: BTreeMap::new(),
            currency: None,
            metadata,
        }
    }

    pub fn insert(&mut self, date: NaiveDate, amount: f64) {
        self.amounts.insert(date, amount);
        self.metadata.touch();
    }

    fn rows_dataframe(&self, rows: &[(NaiveDate, f64)]) -> Result<DataFrame> {
        let n = rows.len();
        DataFrame::new(vec![
            Column::new("symbol".into(), vec![self.symbol.clone(); n]),
            date_column("date", rows.iter().map(|(d, _)| Some(*d)).collect())?,
            Column::new(
                "dividend".into(),
                rows.iter().map(|(_, a)| round6(*a)).collect::<Vec<f64>>(),
            ),
            Column::new("currency".into(), vec![self.currency.clone(); n]),
            Column::new("lastUpdated".into(), vec![self.metadata.last_updated_str(); n]),
            Column::new("source".into(), vec![self.metadata.source.clone(); n]),
        ])
        .map_err(|e| Error::Parquet(format!("dataframe creation: {e}")))
    }

    /// Partitioned by symbol and by the calendar year of each row.
    pub fn write_parquet(&self, base_folder: &Path, filename: &str) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        write_dated_partitions(
            &self.symbol,
            &self.amounts,
            |rows| self.rows_dataframe(rows),
            base_folder,
            filename,
        )
    }
}

impl Exportable for DividendRecord {
    fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    fn to_dataframe(&self) -> Result<DataFrame> {
        let rows: Vec<(NaiveDate, f64)> = self.amounts.iter().map(|(&d, &a)| (d, a)).collect();
        self.rows_dataframe(&rows)
    }
}

// ─── Profile ────────────────────────────────────────────────────────

/// Registered address of the issuer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyAddress {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
}

impl CompanyAddress {
    /// An address without a country is treated as absent.
    pub fn is_empty(&self) -> bool {
        self.country.is_none()
    }
}

/// A named executive, usually the CEO.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyOfficer {
    pub name: Option<String>,
    pub title: Option<String>,
    pub year_born: Option<i64>,
}

impl CompanyOfficer {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
    }
}

/// Descriptive company attributes for one symbol. ETFs and funds fill
/// a subset of these; `fund_family` is fund-only, `ceos` is stock-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyProfileRecord {
    pub ticker: String,
    pub name: Option<String>,
    pub quote_type: Option<String>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub beta: Option<f64>,
    pub payout_ratio: Option<f64>,
    pub dividend_rate: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume: Option<u64>,
    pub address: CompanyAddress,
    pub full_time_employees: Option<i64>,
    pub ceos: Vec<CompanyOfficer>,
    pub ipo_date: Option<NaiveDate>,
    pub fund_family: Option<String>,
    pub metadata: Metadata,
}

impl CompanyProfileRecord {
    pub fn new(ticker: &str, metadata: Metadata) -> Self {
        Self {
            ticker: ticker.to_string(),
            metadata,
            ..Default::default()
        }
    }

    /// Single file under `symbol={T}/`.
    pub fn write_parquet(&self, base_folder: &Path, filename: &str) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let df = self.to_dataframe()?;
        let path = base_folder
            .join(format!("symbol={}", self.ticker))
            .join(filename);
        write_parquet_file(&df, &path)
    }
}

impl Exportable for CompanyProfileRecord {
    fn is_empty(&self) -> bool {
        self.exchange.is_none()
    }

    fn to_dataframe(&self) -> Result<DataFrame> {
        let value = serde_json::to_value(self)
            .map_err(|e| Error::Export(format!("profile serialization: {e}")))?;
        single_row_dataframe(flatten_record(&value))
    }
}

// ─── Fundamentals ───────────────────────────────────────────────────

/// Valuation and profitability metrics for one symbol.
///
/// Ratio fields stay `None` for asset classes that do not report them;
/// `nav_price`, `dist_yield`, and `expense_ratio` are fund-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundamentalsRecord {
    pub ticker: String,
    pub currency: Option<String>,
    pub day: PriceBar,
    pub one_year: PriceBar,
    pub trailing_pe: Option<f64>,
    pub forward_pe: Option<f64>,
    pub trailing_eps: Option<f64>,
    pub forward_eps: Option<f64>,
    pub nav_price: Option<f64>,
    pub dist_yield: Option<f64>,
    pub expense_ratio: Option<f64>,
    pub peg: Option<f64>,
    pub price_to_book: Option<f64>,
    pub price_to_sales: Option<f64>,
    pub ev_ebitda: Option<f64>,
    pub gross_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub profit_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub free_cash_flow_per_share: Option<f64>,
    pub metadata: Metadata,
}

impl FundamentalsRecord {
    pub fn new(ticker: &str, metadata: Metadata) -> Self {
        Self {
            ticker: ticker.to_string(),
            metadata,
            ..Default::default()
        }
    }

    /// Single file under `symbol={T}/`.
    pub fn write_parquet(&self, base_folder: &Path, filename: &str) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let df = self.to_dataframe()?;
        let path = base_folder
            .join(format!("symbol={}", self.ticker))
            .join(filename);
        write_parquet_file(&df, &path)
    }
}

impl Exportable for FundamentalsRecord {
    fn is_empty(&self) -> bool {
        self.currency.is_none()
    }

    fn to_dataframe(&self) -> Result<DataFrame> {
        let value = serde_json::to_value(self)
            .map_err(|e| Error::Export(format!("fundamentals serialization: {e}")))?;
        single_row_dataframe(flatten_record(&value))
    }
}
