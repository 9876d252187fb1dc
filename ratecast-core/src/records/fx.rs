//! Currency-pair records: price bars, conversion rates, profile,
//! fundamentals, derived calculations, and the forward forecast.
//!
//! Parquet partition layout is Hive-style: `fx={PAIR}/` for single-row
//! records, `fx={PAIR}/year={Y}/` for date-indexed series.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::frame::{date_column, write_parquet_file};
use super::{Exportable, Metadata, PriceBar};
use crate::error::{Error, Result};
use crate::metrics::round6;

fn parse_iso_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| Error::InvalidArgument(format!("date must be YYYY-MM-DD, got '{date}'")))
}

fn round_opt(v: Option<f64>) -> Option<f64> {
    v.map(round6)
}

/// Build the shared bar-table columns for pair series records.
fn pair_bars_dataframe(
    from: &str,
    to: &str,
    bars: &[PriceBar],
    metadata: &Metadata,
) -> Result<DataFrame> {
    let n = bars.len();
    let dates: Vec<Option<NaiveDate>> = bars.iter().map(|b| b.date).collect();
    let opens: Vec<Option<f64>> = bars.iter().map(|b| round_opt(b.open)).collect();
    let highs: Vec<Option<f64>> = bars.iter().map(|b| round_opt(b.high)).collect();
    let lows: Vec<Option<f64>> = bars.iter().map(|b| round_opt(b.low)).collect();
    let closes: Vec<Option<f64>> = bars.iter().map(|b| round_opt(b.close)).collect();
    let averages: Vec<Option<f64>> = bars.iter().map(|b| b.average()).collect();

    DataFrame::new(vec![
        Column::new("from".into(), vec![from.to_string(); n]),
        Column::new("to".into(), vec![to.to_string(); n]),
        date_column("date", dates)?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("average".into(), averages),
        Column::new("lastUpdated".into(), vec![metadata.last_updated_str(); n]),
        Column::new("source".into(), vec![metadata.source.clone(); n]),
    ])
    .map_err(|e| Error::Parquet(format!("dataframe creation: {e}")))
}

/// Write one Parquet file per calendar year under
/// `{base}/fx={PAIR}/year={Y}/{filename}`. Bars without a date are skipped.
fn write_year_partitions(
    pair: &str,
    bars: &[PriceBar],
    df_for_year: impl Fn(&[PriceBar]) -> Result<DataFrame>,
    base_folder: &Path,
    filename: &str,
) -> Result<()> {
    let mut by_year: BTreeMap<i32, Vec<PriceBar>> = BTreeMap::new();
    for bar in bars {
        if let Some(date) = bar.date {
            by_year.entry(date.year()).or_default().push(bar.clone());
        }
    }

    for (year, year_bars) in &by_year {
        let df = df_for_year(year_bars)?;
        let path = base_folder
            .join(format!("fx={pair}"))
            .join(format!("year={year}"))
            .join(filename);
        write_parquet_file(&df, &path)?;
    }
    Ok(())
}

// ─── Price bars ─────────────────────────────────────────────────────

/// Historical OHLC bars for a currency pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FxPriceRecord {
    pub from_currency: String,
    pub to_currency: String,
    pub prices: Vec<PriceBar>,
    pub metadata: Metadata,
}

impl FxPriceRecord {
    pub fn pair(&self) -> String {
        format!("{}{}", self.from_currency, self.to_currency)
    }

    /// Partitioned by pair and by the calendar year of each bar.
    pub fn write_parquet(&self, base_folder: &Path, filename: &str) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        write_year_partitions(
            &self.pair(),
            &self.prices,
            |bars| pair_bars_dataframe(&self.from_currency, &self.to_currency, bars, &self.metadata),
            base_folder,
            filename,
        )
    }
}

impl Exportable for FxPriceRecord {
    fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    fn to_dataframe(&self) -> Result<DataFrame> {
        pair_bars_dataframe(&self.from_currency, &self.to_currency, &self.prices, &self.metadata)
    }
}

// ─── Conversion rates ───────────────────────────────────────────────

/// Date-keyed conversion rates for a currency pair.
///
/// One entry per trading day; dates are valid ISO calendar dates by
/// construction. Mutation goes through [`ConversionRateSeries::add_rate`],
/// which also refreshes `last_updated`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRateSeries {
    pub from_currency: String,
    pub to_currency: String,
    pub rates: BTreeMap<NaiveDate, f64>,
    pub metadata: Metadata,
}

impl ConversionRateSeries {
    pub fn new(from_currency: &str, to_currency: &str, metadata: Metadata) -> Self {
        Self {
            from_currency: from_currency.to_string(),
            to_currency: to_currency.to_string(),
            rates: BTreeMap::new(),
            metadata,
        }
    }

    pub fn pair(&self) -> String {
        format!("{}{}", self.from_currency, self.to_currency)
    }

    /// Add or update the rate for an ISO `YYYY-MM-DD` date.
    pub fn add_rate(&mut self, date: &str, rate: f64) -> Result<()> {
        let date = parse_iso_date(date)?;
        self.insert(date, rate);
        Ok(())
    }

    pub fn insert(&mut self, date: NaiveDate, rate: f64) {
        self.rates.insert(date, rate);
        self.metadata.touch();
    }

    fn rows_dataframe(&self, rows: &[(NaiveDate, f64)]) -> Result<DataFrame> {
        let n = rows.len();
        let pair = self.pair();
        DataFrame::new(vec![
            Column::new("pair".into(), vec![pair; n]),
            Column::new("from".into(), vec![self.from_currency.clone(); n]),
            Column::new("to".into(), vec![self.to_currency.clone(); n]),
            date_column("date", rows.iter().map(|(d, _)| Some(*d)).collect())?,
            Column::new("rate".into(), rows.iter().map(|(_, r)| *r).collect::<Vec<f64>>()),
        ])
        .map_err(|e| Error::Parquet(format!("dataframe creation: {e}")))
    }

    /// Partitioned by pair and by the calendar year of each row.
    pub fn write_parquet(&self, base_folder: &Path, filename: &str) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let mut by_year: BTreeMap<i32, Vec<(NaiveDate, f64)>> = BTreeMap::new();
        for (&date, &rate) in &self.rates {
            by_year.entry(date.year()).or_default().push((date, rate));
        }
        for (year, rows) in &by_year {
            let df = self.rows_dataframe(rows)?;
            let path = base_folder
                .join(format!("fx={}", self.pair()))
                .join(format!("year={year}"))
                .join(filename);
            write_parquet_file(&df, &path)?;
        }
        Ok(())
    }
}

impl Exportable for ConversionRateSeries {
    fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    fn to_dataframe(&self) -> Result<DataFrame> {
        let rows: Vec<(NaiveDate, f64)> = self.rates.iter().map(|(&d, &r)| (d, r)).collect();
        self.rows_dataframe(&rows)
    }
}

// ─── Profile ────────────────────────────────────────────────────────

/// Descriptive attributes of a currency pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FxProfileRecord {
    pub from_currency: String,
    pub to_currency: String,
    pub exchange: Option<String>,
    pub region: Option<String>,
    pub quote_type: Option<String>,
    pub description: Option<String>,
    pub metadata: Metadata,
}

impl FxProfileRecord {
    pub fn pair(&self) -> String {
        format!("{}{}", self.from_currency, self.to_currency)
    }

    /// Single file under `fx={PAIR}/`.
    pub fn write_parquet(&self, base_folder: &Path, filename: &str) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let df = self.to_dataframe()?;
        let path = base_folder.join(format!("fx={}", self.pair())).join(filename);
        write_parquet_file(&df, &path)
    }
}

impl Exportable for FxProfileRecord {
    fn is_empty(&self) -> bool {
        self.exchange.is_none() || self.region.is_none()
    }

    fn to_dataframe(&self) -> Result<DataFrame> {
        DataFrame::new(vec![
            Column::new("from".into(), vec![self.from_currency.clone()]),
            Column::new("to".into(), vec![self.to_currency.clone()]),
            Column::new("exchange".into(), vec![self.exchange.clone()]),
            Column::new("region".into(), vec![self.region.clone()]),
            Column::new("quoteType".into(), vec![self.quote_type.clone()]),
            Column::new("description".into(), vec![self.description.clone()]),
            Column::new("lastUpdated".into(), vec![self.metadata.last_updated_str()]),
            Column::new("source".into(), vec![self.metadata.source.clone()]),
        ])
        .map_err(|e| Error::Parquet(format!("dataframe creation: {e}")))
    }
}

// ─── Fundamentals ───────────────────────────────────────────────────

/// Moving averages plus day and trailing-year OHLC summaries for a pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FxFundamentalsRecord {
    pub from_currency: String,
    pub to_currency: String,
    pub ma50: Option<f64>,
    pub ma200: Option<f64>,
    pub day: PriceBar,
    pub year: PriceBar,
    pub metadata: Metadata,
}

impl FxFundamentalsRecord {
    pub fn pair(&self) -> String {
        format!("{}{}", self.from_currency, self.to_currency)
    }

    /// Single file under `fx={PAIR}/`.
    pub fn write_parquet(&self, base_folder: &Path, filename: &str) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let df = self.to_dataframe()?;
        let path = base_folder.join(format!("fx={}", self.pair())).join(filename);
        write_parquet_file(&df, &path)
    }
}

impl Exportable for FxFundamentalsRecord {
    fn is_empty(&self) -> bool {
        self.day.close.is_none() && self.year.close.is_none()
    }

    fn to_dataframe(&self) -> Result<DataFrame> {
        DataFrame::new(vec![
            Column::new("from".into(), vec![self.from_currency.clone()]),
            Column::new("to".into(), vec![self.to_currency.clone()]),
            Column::new("dayOpen".into(), vec![round_opt(self.day.open)]),
            Column::new("dayHigh".into(), vec![round_opt(self.day.high)]),
            Column::new("dayLow".into(), vec![round_opt(self.day.low)]),
            Column::new("dayClose".into(), vec![round_opt(self.day.close)]),
            Column::new("dayAverage".into(), vec![self.day.average()]),
            Column::new("yearOpen".into(), vec![round_opt(self.year.open)]),
            Column::new("yearHigh".into(), vec![round_opt(self.year.high)]),
            Column::new("yearLow".into(), vec![round_opt(self.year.low)]),
            Column::new("yearClose".into(), vec![round_opt(self.year.close)]),
            Column::new("yearAverage".into(), vec![self.year.average()]),
            Column::new("movingAverage50Days".into(), vec![round_opt(self.ma50)]),
            Column::new("movingAverage200Days".into(), vec![round_opt(self.ma200)]),
            Column::new("lastUpdated".into(), vec![self.metadata.last_updated_str()]),
            Column::new("source".into(), vec![self.metadata.source.clone()]),
        ])
        .map_err(|e| Error::Parquet(format!("dataframe creation: {e}")))
    }
}

// ─── Calculations ───────────────────────────────────────────────────

/// Derived statistics for a pair over a fixed lookback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationRecord {
    pub from_currency: String,
    pub to_currency: String,
    pub volatility: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub cagr_1y: Option<f64>,
    pub cagr_5y: Option<f64>,
    pub metadata: Metadata,
}

impl CalculationRecord {
    pub fn pair(&self) -> String {
        format!("{}{}", self.from_currency, self.to_currency)
    }

    /// Single file under `fx={PAIR}/`.
    pub fn write_parquet(&self, base_folder: &Path, filename: &str) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let df = self.to_dataframe()?;
        let path = base_folder.join(format!("fx={}", self.pair())).join(filename);
        write_parquet_file(&df, &path)
    }
}

impl Exportable for CalculationRecord {
    fn is_empty(&self) -> bool {
        self.volatility.is_none() && self.sharpe_ratio.is_none() && self.max_drawdown.is_none()
    }

    fn to_dataframe(&self) -> Result<DataFrame> {
        DataFrame::new(vec![
            Column::new("from".into(), vec![self.from_currency.clone()]),
            Column::new("to".into(), vec![self.to_currency.clone()]),
            Column::new("volatility".into(), vec![round_opt(self.volatility)]),
            Column::new("sharpeRatio".into(), vec![round_opt(self.sharpe_ratio)]),
            Column::new("maxDrawdown".into(), vec![round_opt(self.max_drawdown)]),
            Column::new("cagr1Y".into(), vec![round_opt(self.cagr_1y)]),
            Column::new("cagr5Y".into(), vec![round_opt(self.cagr_5y)]),
            Column::new("lastUpdated".into(), vec![self.metadata.last_updated_str()]),
            Column::new("source".into(), vec![self.metadata.source.clone()]),
        ])
        .map_err(|e| Error::Parquet(format!("dataframe creation: {e}")))
    }
}

// ─── Forecast ───────────────────────────────────────────────────────

/// Synthetic forward bars plus the name of the generating model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub from_currency: String,
    pub to_currency: String,
    pub prices: Vec<PriceBar>,
    pub model: String,
    pub metadata: Metadata,
}

impl ForecastRecord {
    pub fn pair(&self) -> String {
        format!("{}{}", self.from_currency, self.to_currency)
    }

    fn bars_with_model(&self, bars: &[PriceBar]) -> Result<DataFrame> {
        let mut df =
            pair_bars_dataframe(&self.from_currency, &self.to_currency, bars, &self.metadata)?;
        df.with_column(Column::new("model".into(), vec![self.model.clone(); bars.len()]))
            .map_err(|e| Error::Parquet(format!("model column: {e}")))?;
        Ok(df)
    }

    /// Partitioned by pair and by the calendar year of each bar.
    pub fn write_parquet(&self, base_folder: &Path, filename: &str) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        write_year_partitions(
            &self.pair(),
            &self.prices,
            |bars| self.bars_with_model(bars),
            base_folder,
            filename,
        )
    }
}

impl Exportable for ForecastRecord {
    fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    fn to_dataframe(&self) -> Result<DataFrame> {
        self.bars_with_model(&self.prices)
    }
}
