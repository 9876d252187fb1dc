//! Yahoo Finance client.
//!
//! Talks to the v8 chart API for bars and dividends, the quoteSummary
//! and v7 quote APIs for descriptive info, and the fundamentals
//! timeseries API for annual statements. Yahoo has no official API and
//! is subject to unannounced format changes; parse failures surface as
//! [`Error::ResponseFormat`] so callers can tell them apart from
//! transport errors.
//!
//! Requests here are single-shot. Retry and pacing live in the
//! extraction layer.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use super::{HistoryRange, Interval, MarketDataProvider, StatementTable};
use crate::convert::InfoBlob;
use crate::error::{Error, Result};
use crate::records::PriceBar;

const CHART_BASE: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const QUOTE_SUMMARY_BASE: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const QUOTE_BASE: &str = "https://query1.finance.yahoo.com/v7/finance/quote";
const TIMESERIES_BASE: &str =
    "https://query2.finance.yahoo.com/ws/fundamentals-timeseries/v1/finance/timeseries";

const QUOTE_SUMMARY_MODULES: &str =
    "assetProfile,summaryProfile,summaryDetail,price,quoteType,defaultKeyStatistics,financialData";

/// Annual statement line items, as (timeseries type, reported row name).
const INCOME_ROWS: &[(&str, &str)] = &[
    ("annualTotalRevenue", "Total Revenue"),
    ("annualOperatingRevenue", "Operating Revenue"),
    ("annualEBITDA", "EBITDA"),
    ("annualNormalizedEBITDA", "Normalized EBITDA"),
    ("annualGrossProfit", "Gross Profit"),
    ("annualOperatingIncome", "Operating Income"),
    ("annualNetIncome", "Net Income"),
    (
        "annualNetIncomeCommonStockholders",
        "Net Income Common Stockholders",
    ),
];

const BALANCE_ROWS: &[(&str, &str)] = &[
    ("annualStockholdersEquity", "Stockholders Equity"),
    ("annualCommonStockEquity", "Common Stock Equity"),
    ("annualTotalAssets", "Total Assets"),
    ("annualTotalDebt", "Total Debt"),
];

const CASH_FLOW_ROWS: &[(&str, &str)] = &[
    ("annualOperatingCashFlow", "Operating Cash Flow"),
    ("annualCapitalExpenditure", "Capital Expenditure"),
    ("annualFreeCashFlow", "Free Cash Flow"),
];

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
    events: Option<ChartEvents>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize, Default)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ChartEvents {
    dividends: Option<BTreeMap<String, DividendEvent>>,
}

#[derive(Debug, Deserialize)]
struct DividendEvent {
    amount: f64,
    date: i64,
}

/// Blocking Yahoo Finance client.
pub struct YahooClient {
    client: reqwest::blocking::Client,
}

impl YahooClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| Error::Network(format!("http client: {e}")))?;
        Ok(Self { client })
    }

    fn range_query(range: HistoryRange) -> String {
        match range {
            HistoryRange::Period(period) => format!("range={period}"),
            HistoryRange::Between { start, end } => {
                let start_ts = start.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp();
                let end_ts = end.and_hms_opt(23, 59, 59).unwrap().and_utc().timestamp();
                format!("period1={start_ts}&period2={end_ts}")
            }
        }
    }

    fn fetch_chart(
        &self,
        symbol: &str,
        range: HistoryRange,
        interval: Interval,
        with_dividends: bool,
    ) -> Result<Option<ChartData>> {
        let mut url = format!(
            "{CHART_BASE}/{symbol}?{}&interval={}&includeAdjustedClose=true",
            Self::range_query(range),
            interval.as_str()
        );
        if with_dividends {
            url.push_str("&events=div");
        }

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| Error::Network(format!("chart request for {symbol}: {e}")))?;
        let status = resp.status();
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(Error::Network(format!("HTTP {status} for {symbol}")));
        }

        let chart: ChartResponse = resp
            .json()
            .map_err(|e| Error::ResponseFormat(format!("chart response for {symbol}: {e}")))?;

        match (chart.chart.result, chart.chart.error) {
            (Some(mut results), _) => Ok(results.drain(..).next()),
            // Unknown symbols come back as an error payload, not a
            // transport failure. Treat them as "no data".
            (None, Some(err)) if err.code == "Not Found" => Ok(None),
            (None, Some(err)) => Err(Error::ResponseFormat(format!(
                "chart error for {symbol}: {}: {}",
                err.code, err.description
            ))),
            (None, None) => Err(Error::ResponseFormat(format!(
                "empty chart result for {symbol} with no error"
            ))),
        }
    }

    fn bars_from_chart(data: ChartData) -> Vec<PriceBar> {
        let Some(timestamps) = data.timestamp else {
            return Vec::new();
        };
        let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let Some(date) = chrono::DateTime::from_timestamp(ts, 0).map(|dt| dt.naive_utc().date())
            else {
                continue;
            };
            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();
            let adj_close = adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten());

            // Holidays and half-days come back as all-None rows.
            if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
                continue;
            }

            bars.push(PriceBar {
                date: Some(date),
                open,
                high,
                low,
                close,
                adj_close,
                volume,
            });
        }
        bars
    }

    fn fetch_json(&self, url: &str, what: &str) -> Result<Value> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::Network(format!("{what}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Network(format!("HTTP {status} for {what}")));
        }
        resp.json()
            .map_err(|e| Error::ResponseFormat(format!("{what}: {e}")))
    }

    /// Collapse Yahoo's `{"raw": x, "fmt": "..."}` wrappers to the raw value.
    fn unwrap_raw(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                if map.contains_key("raw") && map.contains_key("fmt") {
                    return map.get("raw").cloned().unwrap_or(Value::Null);
                }
                Value::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, Self::unwrap_raw(v)))
                        .collect(),
                )
            }
            Value::Array(items) => {
                Value::Array(items.into_iter().map(Self::unwrap_raw).collect())
            }
            other => other,
        }
    }

    fn statement(&self, symbol: &str, rows: &[(&str, &str)]) -> Result<StatementTable> {
        let types: Vec<&str> = rows.iter().map(|(t, _)| *t).collect();
        let now_ts = chrono::Utc::now().timestamp();
        let url = format!(
            "{TIMESERIES_BASE}/{symbol}?type={}&period1=493590046&period2={now_ts}",
            types.join(",")
        );
        let body = self.fetch_json(&url, &format!("timeseries for {symbol}"))?;

        let results = body
            .pointer("/timeseries/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        // Collect every reported value keyed by (row name, as-of date),
        // then align rows onto the union of dates.
        let mut cells: BTreeMap<(String, NaiveDate), f64> = BTreeMap::new();
        let mut dates: Vec<NaiveDate> = Vec::new();

        for result in &results {
            for (ts_type, row_name) in rows {
                let Some(entries) = result.get(*ts_type).and_then(Value::as_array) else {
                    continue;
                };
                for entry in entries {
                    let Some(date) = entry
                        .get("asOfDate")
                        .and_then(Value::as_str)
                        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                    else {
                        continue;
                    };
                    let Some(raw) = entry.pointer("/reportedValue/raw").and_then(Value::as_f64)
                    else {
                        continue;
                    };
                    cells.insert((row_name.to_string(), date), raw);
                    if !dates.contains(&date) {
                        dates.push(date);
                    }
                }
            }
        }

        dates.sort_unstable();
        let mut table = StatementTable {
            periods: dates.clone(),
            rows: BTreeMap::new(),
        };
        for (_, row_name) in rows {
            let values: Vec<Option<f64>> = dates
                .iter()
                .map(|d| cells.get(&(row_name.to_string(), *d)).copied())
                .collect();
            if values.iter().any(Option::is_some) {
                table.rows.insert(row_name.to_string(), values);
            }
        }
        Ok(table)
    }
}

impl MarketDataProvider for YahooClient {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn history(
        &self,
        symbol: &str,
        range: HistoryRange,
        interval: Interval,
    ) -> Result<Vec<PriceBar>> {
        match self.fetch_chart(symbol, range, interval, false)? {
            Some(data) => Ok(Self::bars_from_chart(data)),
            None => Ok(Vec::new()),
        }
    }

    fn info(&self, symbol: &str) -> Result<InfoBlob> {
        let url = format!("{QUOTE_SUMMARY_BASE}/{symbol}?modules={QUOTE_SUMMARY_MODULES}");
        let body = self.fetch_json(&url, &format!("quoteSummary for {symbol}"))?;

        let Some(result) = body
            .pointer("/quoteSummary/result/0")
            .and_then(Value::as_object)
        else {
            return Ok(InfoBlob::default());
        };

        // Merge the per-module objects into one flat blob, the way
        // downstream consumers expect to read it.
        let mut merged = serde_json::Map::new();
        for module in result.values() {
            if let Value::Object(fields) = Self::unwrap_raw(module.clone()) {
                merged.extend(fields);
            }
        }
        Ok(InfoBlob::new(merged))
    }

    fn info_fallback(&self, symbol: &str) -> Result<InfoBlob> {
        let url = format!("{QUOTE_BASE}?symbols={symbol}");
        let body = self.fetch_json(&url, &format!("quote for {symbol}"))?;
        match body.pointer("/quoteResponse/result/0") {
            Some(Value::Object(fields)) => Ok(InfoBlob::new(fields.clone())),
            _ => Ok(InfoBlob::default()),
        }
    }

    fn dividends(&self, symbol: &str, range: HistoryRange) -> Result<BTreeMap<NaiveDate, f64>> {
        let Some(data) = self.fetch_chart(symbol, range, Interval::Daily, true)? else {
            return Ok(BTreeMap::new());
        };
        let mut out = BTreeMap::new();
        if let Some(dividends) = data.events.and_then(|e| e.dividends) {
            for event in dividends.values() {
                if let Some(date) =
                    chrono::DateTime::from_timestamp(event.date, 0).map(|dt| dt.naive_utc().date())
                {
                    out.insert(date, event.amount);
                }
            }
        }
        Ok(out)
    }

    fn income_statement(&self, symbol: &str) -> Result<StatementTable> {
        self.statement(symbol, INCOME_ROWS)
    }

    fn balance_sheet(&self, symbol: &str) -> Result<StatementTable> {
        self.statement(symbol, BALANCE_ROWS)
    }

    fn cash_flow(&self, symbol: &str) -> Result<StatementTable> {
        self.statement(symbol, CASH_FLOW_ROWS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwrap_raw_collapses_fmt_wrappers() {
        let value = json!({
            "beta": {"raw": 1.01, "fmt": "1.01"},
            "sector": "Technology",
            "nested": {"marketCap": {"raw": 3.1e12, "fmt": "3.1T"}},
        });
        let flat = YahooClient::unwrap_raw(value);
        assert_eq!(flat["beta"], json!(1.01));
        assert_eq!(flat["sector"], json!("Technology"));
        assert_eq!(flat["nested"]["marketCap"], json!(3.1e12));
    }

    #[test]
    fn bars_skip_all_none_rows() {
        let data = ChartData {
            timestamp: Some(vec![1_700_000_000, 1_700_086_400]),
            indicators: Indicators {
                quote: vec![QuoteData {
                    open: vec![Some(1.0), None],
                    high: vec![Some(1.1), None],
                    low: vec![Some(0.9), None],
                    close: vec![Some(1.05), None],
                    volume: vec![Some(100), None],
                }],
                adjclose: None,
            },
            events: None,
        };
        let bars = YahooClient::bars_from_chart(data);
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, Some(1.05));
    }

    #[test]
    fn bars_empty_without_timestamps() {
        let data = ChartData {
            timestamp: None,
            indicators: Indicators {
                quote: vec![],
                adjclose: None,
            },
            events: None,
        };
        assert!(YahooClient::bars_from_chart(data).is_empty());
    }

    #[test]
    fn range_query_formats_both_shapes() {
        assert_eq!(
            YahooClient::range_query(HistoryRange::Period(super::super::Period::OneYear)),
            "range=1y"
        );
        let between = HistoryRange::Between {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        };
        let q = YahooClient::range_query(between);
        assert!(q.starts_with("period1=") && q.contains("&period2="));
    }
}
