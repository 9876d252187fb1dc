//! Currency-pair extraction.
//!
//! Maps a currency pair onto the provider's FX symbol convention,
//! pulls history and quote info through the shared [`Fetcher`], and
//! assembles the pair records.

use chrono::NaiveDate;

use super::{aggregate_bars, Fetcher};
use crate::error::{Error, Result};
use crate::metrics::{self, PricePoint, ReturnKind};
use crate::provider::{HistoryRange, Interval, MarketDataProvider, Period};
use crate::records::{
    CalculationRecord, ConversionRateSeries, ForecastRecord, FxFundamentalsRecord, FxPriceRecord,
    FxProfileRecord, Metadata, PriceBar,
};
use crate::settings::Settings;

/// Model tag stored alongside forecast exports.
pub const FORECAST_MODEL: &str = "GBM (Geometric Brownian Motion)";

/// Lookback tokens accepted for pair history.
const FX_PERIODS: [Period; 6] = [
    Period::OneYear,
    Period::FiveYears,
    Period::TenYears,
    Period::FifteenYears,
    Period::TwentyYears,
    Period::Max,
];

/// CAGR windows exported for pairs, in years.
const FX_CAGR_LOOKBACKS: [u32; 2] = [1, 5];

/// Forecast horizon requested for pairs, capped by available history.
const FORECAST_DAYS: usize = 20 * 365;

fn validate_currency(code: &str) -> Result<String> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(Error::InvalidArgument(format!(
            "currency code must be 3 letters, got '{code}'"
        )))
    }
}

/// Provider symbol for a pair: USD-based pairs use the short form.
pub fn fx_symbol(from_currency: &str, to_currency: &str) -> String {
    if from_currency == "USD" {
        format!("{to_currency}=X")
    } else {
        format!("{from_currency}{to_currency}=X")
    }
}

/// Extractor for one currency pair.
pub struct FxExtractor<'a, P: MarketDataProvider> {
    fetcher: Fetcher<'a, P>,
    from_currency: String,
    to_currency: String,
    symbol: String,
    risk_free_rate: f64,
}

impl<'a, P: MarketDataProvider> FxExtractor<'a, P> {
    pub fn new(
        provider: &'a P,
        settings: &Settings,
        from_currency: &str,
        to_currency: &str,
    ) -> Result<Self> {
        let from_currency = validate_currency(from_currency)?;
        let to_currency = validate_currency(to_currency)?;
        if from_currency == to_currency {
            return Err(Error::InvalidArgument(format!(
                "pair must use two distinct currencies, got {from_currency}{to_currency}"
            )));
        }
        let symbol = fx_symbol(&from_currency, &to_currency);
        Ok(Self {
            fetcher: Fetcher::new(provider, settings),
            from_currency,
            to_currency,
            symbol,
            risk_free_rate: settings.risk_free_rate,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Resolve a lookback token or an explicit date window. A period
    /// and dates are mutually exclusive; a lone start runs to today, a
    /// lone end covers the preceding 365 days, and neither means `max`.
    pub fn resolve_range(
        period: Option<&str>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<HistoryRange> {
        match (period, start, end) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(Error::InvalidArgument(
                "give either a period or a start/end window, not both".into(),
            )),
            (Some(token), None, None) => {
                let parsed: Period = token.parse()?;
                if !FX_PERIODS.contains(&parsed) {
                    return Err(Error::InvalidArgument(format!(
                        "unsupported pair period '{token}' (expected 1y, 5y, 10y, 15y, 20y, or max)"
                    )));
                }
                Ok(HistoryRange::Period(parsed))
            }
            (None, None, None) => Ok(HistoryRange::Period(Period::Max)),
            (None, start, end) => {
                let end = end.unwrap_or_else(|| chrono::Local::now().date_naive());
                let start = start.unwrap_or(end - chrono::Duration::days(365));
                if start >= end {
                    return Err(Error::InvalidArgument(format!(
                        "start {start} must precede end {end}"
                    )));
                }
                Ok(HistoryRange::Between { start, end })
            }
        }
    }

    fn metadata(&self) -> Metadata {
        Metadata::now(self.fetcher.provider_name())
    }

    /// Historical OHLC bars over a range.
    pub fn extract_prices(&self, range: HistoryRange) -> Result<FxPriceRecord> {
        let prices = self.fetcher.history(&self.symbol, range, Interval::Daily)?;
        Ok(FxPriceRecord {
            from_currency: self.from_currency.clone(),
            to_currency: self.to_currency.clone(),
            prices,
            metadata: self.metadata(),
        })
    }

    /// Date-keyed conversion rates (closes) over a range.
    pub fn extract_rates(&self, range: HistoryRange) -> Result<ConversionRateSeries> {
        let bars = self.fetcher.history(&self.symbol, range, Interval::Daily)?;
        let mut series =
            ConversionRateSeries::new(&self.from_currency, &self.to_currency, self.metadata());
        for bar in &bars {
            if let (Some(date), Some(rate)) = (bar.date, bar.effective_close()) {
                series.insert(date, rate);
            }
        }
        Ok(series)
    }

    /// Descriptive pair attributes from quote info.
    pub fn extract_profile(&self) -> Result<FxProfileRecord> {
        let info = self.fetcher.info(&self.symbol)?;
        Ok(FxProfileRecord {
            from_currency: self.from_currency.clone(),
            to_currency: self.to_currency.clone(),
            exchange: info.str_field("exchange"),
            region: info.str_field("region"),
            quote_type: info.str_field("quoteType"),
            description: info
                .str_field("description")
                .or_else(|| info.str_field("longName"))
                .or_else(|| info.str_field("shortName")),
            metadata: self.metadata(),
        })
    }

    /// Moving averages and day / trailing-year summaries. Quote info
    /// is the primary source; gaps fall back to recent history.
    pub fn extract_fundamentals(&self) -> Result<FxFundamentalsRecord> {
        let info = self.fetcher.info(&self.symbol)?;

        let week = self.fetcher.history(
            &self.symbol,
            HistoryRange::Period(Period::FiveDays),
            Interval::Daily,
        )?;
        let latest = week.last().cloned().unwrap_or_default();
        let day = PriceBar {
            open: info.f64_field("open").or(latest.open),
            high: info.f64_field("dayHigh").or(latest.high),
            low: info.f64_field("dayLow").or(latest.low),
            close: info
                .f64_field("regularMarketPrice")
                .or_else(|| info.f64_field("previousClose"))
                .or_else(|| latest.effective_close()),
            ..Default::default()
        };

        let trailing_year = self.fetcher.history(
            &self.symbol,
            HistoryRange::Period(Period::OneYear),
            Interval::Daily,
        )?;
        let summary = aggregate_bars(&trailing_year);
        let year = PriceBar {
            open: summary.open,
            high: info.f64_field("fiftyTwoWeekHigh").or(summary.high),
            low: info.f64_field("fiftyTwoWeekLow").or(summary.low),
            close: summary.close,
            ..Default::default()
        };

        Ok(FxFundamentalsRecord {
            from_currency: self.from_currency.clone(),
            to_currency: self.to_currency.clone(),
            ma50: info.f64_field("fiftyDayAverage"),
            ma200: info.f64_field("twoHundredDayAverage"),
            day,
            year,
            metadata: self.metadata(),
        })
    }

    /// Volatility, Sharpe, and drawdown over the trailing year plus
    /// CAGR over the longest available history. Statistics that cannot
    /// be computed for this pair stay `None` rather than failing the
    /// whole record.
    pub fn extract_calculations(&self) -> Result<CalculationRecord> {
        let trailing_year = self.fetcher.history(
            &self.symbol,
            HistoryRange::Period(Period::OneYear),
            Interval::Daily,
        )?;
        let points = close_points(&trailing_year);

        let volatility = self.stat("volatility", || {
            metrics::volatility(&points, None, ReturnKind::Log, 1, false)
        });
        let sharpe_ratio = self.stat("sharpe ratio", || {
            metrics::sharpe_ratio(&points, self.risk_free_rate, None, ReturnKind::Log, 1, false)
        });
        let max_drawdown = self.stat("max drawdown", || metrics::max_drawdown(&points, false));

        let full = self.fetcher.history(
            &self.symbol,
            HistoryRange::Period(Period::Max),
            Interval::Daily,
        )?;
        let full_points = close_points(&full);
        let mut cagr_1y = None;
        let mut cagr_5y = None;
        match metrics::cagr(&full_points, &FX_CAGR_LOOKBACKS, false, None) {
            Ok(growth) => {
                cagr_1y = growth.get("1y").copied().flatten();
                cagr_5y = growth.get("5y").copied().flatten();
            }
            Err(e) => eprintln!("cagr unavailable for {}: {e}", self.symbol),
        }

        Ok(CalculationRecord {
            from_currency: self.from_currency.clone(),
            to_currency: self.to_currency.clone(),
            volatility,
            sharpe_ratio,
            max_drawdown,
            cagr_1y,
            cagr_5y,
            metadata: self.metadata(),
        })
    }

    fn stat(&self, name: &str, compute: impl FnOnce() -> Result<f64>) -> Option<f64> {
        match compute() {
            Ok(v) => Some(v),
            Err(e) => {
                eprintln!("{name} unavailable for {}: {e}", self.symbol);
                None
            }
        }
    }

    /// Deterministic forward bars from the longest available history.
    pub fn extract_forecast(&self) -> Result<ForecastRecord> {
        let history = self.fetcher.history(
            &self.symbol,
            HistoryRange::Period(Period::Max),
            Interval::Daily,
        )?;
        let prices = metrics::forecast_prices(&history, FORECAST_DAYS)?;
        Ok(ForecastRecord {
            from_currency: self.from_currency.clone(),
            to_currency: self.to_currency.clone(),
            prices,
            model: FORECAST_MODEL.to_string(),
            metadata: self.metadata(),
        })
    }
}

fn close_points(bars: &[PriceBar]) -> Vec<PricePoint> {
    bars.iter()
        .filter_map(|b| match (b.date, b.effective_close()) {
            (Some(date), Some(price)) => Some(PricePoint::new(date, price)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::testing::{bar, quiet_settings, StubProvider};
    use super::*;
    use crate::records::Exportable;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn symbol_mapping_special_cases_usd_base() {
        assert_eq!(fx_symbol("USD", "GBP"), "GBP=X");
        assert_eq!(fx_symbol("EUR", "USD"), "EURUSD=X");
        assert_eq!(fx_symbol("EUR", "JPY"), "EURJPY=X");
    }

    #[test]
    fn currencies_are_validated_and_uppercased() {
        let provider = StubProvider::default();
        let settings = quiet_settings();
        let extractor = FxExtractor::new(&provider, &settings, "eur", "usd").unwrap();
        assert_eq!(extractor.symbol(), "EURUSD=X");

        assert!(FxExtractor::new(&provider, &settings, "EURO", "USD").is_err());
        assert!(FxExtractor::new(&provider, &settings, "E1R", "USD").is_err());
        assert!(FxExtractor::new(&provider, &settings, "USD", "usd").is_err());
    }

    #[test]
    fn range_rejects_period_and_dates_together() {
        let err = FxExtractor::<StubProvider>::resolve_range(
            Some("1y"),
            Some(date(2024, 1, 1)),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn range_rejects_backwards_dates() {
        assert!(FxExtractor::<StubProvider>::resolve_range(
            None,
            Some(date(2024, 2, 1)),
            Some(date(2024, 1, 1))
        )
        .is_err());
    }

    #[test]
    fn half_open_windows_get_default_edges() {
        let range =
            FxExtractor::<StubProvider>::resolve_range(None, Some(date(2024, 1, 1)), None).unwrap();
        match range {
            HistoryRange::Between { start, end } => {
                assert_eq!(start, date(2024, 1, 1));
                assert_eq!(end, chrono::Local::now().date_naive());
            }
            other => panic!("expected a date window, got {other:?}"),
        }

        let range =
            FxExtractor::<StubProvider>::resolve_range(None, None, Some(date(2024, 6, 1))).unwrap();
        assert_eq!(
            range,
            HistoryRange::Between {
                start: date(2024, 6, 1) - chrono::Duration::days(365),
                end: date(2024, 6, 1),
            }
        );
    }

    #[test]
    fn range_rejects_intraday_periods() {
        assert!(FxExtractor::<StubProvider>::resolve_range(Some("1d"), None, None).is_err());
        assert!(FxExtractor::<StubProvider>::resolve_range(Some("5d"), None, None).is_err());
    }

    #[test]
    fn range_defaults_to_max() {
        let range = FxExtractor::<StubProvider>::resolve_range(None, None, None).unwrap();
        assert_eq!(range, HistoryRange::Period(Period::Max));
    }

    #[test]
    fn rates_are_keyed_by_date_and_skip_incomplete_bars() {
        let mut provider = StubProvider::default();
        let mut dateless = bar(2024, 1, 4, 1.1);
        dateless.date = None;
        provider.history_by_period.insert(
            "max".into(),
            vec![bar(2024, 1, 2, 1.09), bar(2024, 1, 3, 1.10), dateless],
        );
        let settings = quiet_settings();
        let extractor = FxExtractor::new(&provider, &settings, "EUR", "USD").unwrap();

        let series = extractor
            .extract_rates(HistoryRange::Period(Period::Max))
            .unwrap();
        assert_eq!(series.rates.len(), 2);
        assert_eq!(series.rates.get(&date(2024, 1, 3)), Some(&1.10));
    }

    #[test]
    fn fundamentals_summarize_day_and_year_windows() {
        let mut provider = StubProvider::default();
        provider.info = crate::convert::InfoBlob::from_value(serde_json::json!({
            "exchange": "CCY", "region": "US", "quoteType": "CURRENCY",
            "fiftyDayAverage": 1.084, "twoHundredDayAverage": 1.072,
            "fiftyTwoWeekHigh": 1.15,
        }));
        provider.history_by_period.insert(
            "5d".into(),
            vec![bar(2025, 8, 18, 1.08), bar(2025, 8, 22, 1.09)],
        );
        provider.history_by_period.insert(
            "1y".into(),
            vec![bar(2024, 8, 22, 1.05), bar(2025, 8, 22, 1.09)],
        );
        let settings = quiet_settings();
        let extractor = FxExtractor::new(&provider, &settings, "EUR", "USD").unwrap();

        let record = extractor.extract_fundamentals().unwrap();
        assert_eq!(record.ma50, Some(1.084));
        assert_eq!(record.day.close, Some(1.09));
        assert_eq!(record.year.open, Some(1.05 - 1.0));
        assert_eq!(record.year.close, Some(1.09));
        // Info wins over the history aggregate when present.
        assert_eq!(record.year.high, Some(1.15));
        assert!(!record.is_empty());
    }

    #[test]
    fn calculations_leave_uncomputable_stats_none() {
        // A single bar cannot produce returns; CAGR over one day is
        // equally hopeless. The record must still come back.
        let mut provider = StubProvider::default();
        provider
            .history_by_period
            .insert("1y".into(), vec![bar(2025, 8, 22, 1.09)]);
        provider
            .history_by_period
            .insert("20y".into(), vec![bar(2025, 8, 22, 1.09)]);
        let settings = quiet_settings();
        let extractor = FxExtractor::new(&provider, &settings, "EUR", "USD").unwrap();

        let record = extractor.extract_calculations().unwrap();
        assert_eq!(record.volatility, None);
        assert_eq!(record.sharpe_ratio, None);
        assert!(record.is_empty());
    }

    #[test]
    fn calculations_fill_stats_from_history() {
        let mut provider = StubProvider::default();
        let bars: Vec<_> = (0u32..30)
            .map(|i| bar(2025, 7, 1 + i % 28, 1.05 + 0.001 * f64::from(i)))
            .collect();
        // Keep dates strictly ascending for inference.
        let bars: Vec<_> = bars
            .into_iter()
            .enumerate()
            .map(|(i, mut b)| {
                b.date = Some(date(2025, 6, 1) + chrono::Days::new(i as u64));
                b
            })
            .collect();
        provider.history_by_period.insert("1y".into(), bars.clone());
        provider.history_by_period.insert("20y".into(), bars);
        let settings = quiet_settings();
        let extractor = FxExtractor::new(&provider, &settings, "EUR", "USD").unwrap();

        let record = extractor.extract_calculations().unwrap();
        assert!(record.volatility.unwrap() > 0.0);
        assert!(record.max_drawdown.unwrap() <= 0.0);
        assert!(!record.is_empty());
    }

    #[test]
    fn forecast_uses_widened_history_and_tags_the_model() {
        let mut provider = StubProvider::default();
        let bars: Vec<_> = (0u32..10)
            .map(|i| {
                let mut b = bar(2025, 1, 1, 1.05 + 0.002 * f64::from(i));
                b.date = Some(date(2025, 1, 1) + chrono::Days::new(u64::from(i)));
                b
            })
            .collect();
        // Nothing at 20y or 15y; the widening lands on 10y.
        provider.history_by_period.insert("10y".into(), bars);
        let settings = quiet_settings();
        let extractor = FxExtractor::new(&provider, &settings, "EUR", "USD").unwrap();

        let record = extractor.extract_forecast().unwrap();
        assert_eq!(record.model, FORECAST_MODEL);
        // Horizon is capped by available history.
        assert_eq!(record.prices.len(), 10);
    }

    #[test]
    fn forecast_requests_the_full_listing_first() {
        let mut provider = StubProvider::default();
        let bars: Vec<_> = (0u32..10)
            .map(|i| {
                let mut b = bar(2025, 1, 1, 1.05 + 0.002 * f64::from(i));
                b.date = Some(date(2025, 1, 1) + chrono::Days::new(u64::from(i)));
                b
            })
            .collect();
        provider.history_by_period.insert("max".into(), bars);
        let settings = quiet_settings();
        let extractor = FxExtractor::new(&provider, &settings, "EUR", "USD").unwrap();

        let record = extractor.extract_forecast().unwrap();
        assert_eq!(record.prices.len(), 10);
        // The full listing is asked for directly, not capped at 20y.
        assert_eq!(*provider.history_calls.borrow(), vec!["max".to_string()]);
    }

    #[test]
    fn prices_error_when_every_window_is_empty() {
        let provider = StubProvider::default();
        let settings = quiet_settings();
        let extractor = FxExtractor::new(&provider, &settings, "EUR", "USD").unwrap();

        let err = extractor
            .extract_prices(HistoryRange::Period(Period::OneYear))
            .unwrap_err();
        // The retry wrapper decorates the NoData from the widening pass.
        assert!(matches!(err, Error::RetriesExhausted { .. }));
        assert!(extractor.fetcher.is_delisted());
    }
}
