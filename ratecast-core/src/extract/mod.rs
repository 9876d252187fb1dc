//! Extraction layer: provider access with retries, pacing, window
//! fallback, and the delisting heuristic.
//!
//! Extractors never talk to a [`MarketDataProvider`] directly; every
//! call goes through [`Fetcher`], which applies the retry policy and
//! an optional courtesy pause between requests.

pub mod fx;
pub mod stock;

use std::cell::Cell;
use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use rand::Rng;

use crate::convert::InfoBlob;
use crate::error::{Error, Result};
use crate::provider::{HistoryRange, Interval, MarketDataProvider, Period, StatementTable};
use crate::records::PriceBar;
use crate::retry::RetryPolicy;
use crate::settings::Settings;

pub use fx::FxExtractor;
pub use stock::StockExtractor;

/// Windows tried in order when a symbol has less history than asked
/// for. Widest first; the provider returns nothing at all for windows
/// that predate the listing, so narrowing is the recovery.
pub const FALLBACK_PERIODS: [Period; 5] = [
    Period::TwentyYears,
    Period::FifteenYears,
    Period::TenYears,
    Period::FiveYears,
    Period::OneYear,
];

/// Which side of a bar a price lookup wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricePart {
    Open,
    High,
    Low,
    /// Adjusted close when available, raw close otherwise.
    Close,
}

impl PricePart {
    fn from_bar(self, bar: &PriceBar) -> Option<f64> {
        match self {
            PricePart::Open => bar.open,
            PricePart::High => bar.high,
            PricePart::Low => bar.low,
            PricePart::Close => bar.effective_close(),
        }
    }
}

/// Provider access shared by the FX and stock extractors.
pub struct Fetcher<'a, P: MarketDataProvider> {
    provider: &'a P,
    retry: RetryPolicy,
    courtesy_delay: bool,
    delisted: Cell<bool>,
}

impl<'a, P: MarketDataProvider> Fetcher<'a, P> {
    pub fn new(provider: &'a P, settings: &Settings) -> Self {
        Self {
            provider,
            retry: settings.retry.clone(),
            courtesy_delay: settings.courtesy_delay,
            delisted: Cell::new(false),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Whether a delisting check has flagged this session's symbol.
    pub fn is_delisted(&self) -> bool {
        self.delisted.get()
    }

    /// Short random pause between requests, to stay polite upstream.
    fn pause(&self) {
        if self.courtesy_delay {
            let secs: f64 = rand::thread_rng().gen_range(0.1..0.5);
            std::thread::sleep(Duration::from_secs_f64(secs));
        }
    }

    /// History fetch with the retry policy around the whole fallback
    /// pass, so a transient outage does not get mistaken for a short
    /// listing.
    pub fn history(
        &self,
        symbol: &str,
        range: HistoryRange,
        interval: Interval,
    ) -> Result<Vec<PriceBar>> {
        self.retry.run(&format!("history {symbol}"), || {
            self.fetch_history_once(symbol, range, interval)
        })
    }

    /// One pass: the requested window first, then the fallback windows
    /// widest first. Returns the first non-empty window or
    /// [`Error::NoData`] when every window comes back empty.
    pub fn fetch_history_once(
        &self,
        symbol: &str,
        range: HistoryRange,
        interval: Interval,
    ) -> Result<Vec<PriceBar>> {
        self.pause();
        let bars = self.provider.history(symbol, range, interval)?;
        if !bars.is_empty() {
            return Ok(bars);
        }
        for period in FALLBACK_PERIODS {
            // The requested window already came back empty.
            if range == HistoryRange::Period(period) {
                continue;
            }
            eprintln!("no rows for {symbol}, retrying over {period}");
            self.pause();
            let bars = self
                .provider
                .history(symbol, HistoryRange::Period(period), interval)?;
            if !bars.is_empty() {
                return Ok(bars);
            }
        }
        // Nothing in any window: record whether the symbol looks dead
        // before reporting the miss.
        self.check_delisted(symbol);
        Err(Error::NoData {
            symbol: symbol.to_string(),
        })
    }

    /// Quote info with the reduced endpoint as a second chance.
    /// Implausibly small blobs (under 5 keys) count as missing.
    pub fn info(&self, symbol: &str) -> Result<InfoBlob> {
        self.pause();
        let primary = self
            .retry
            .run(&format!("info {symbol}"), || self.provider.info(symbol));
        if let Ok(blob) = &primary {
            if blob.is_plausible() {
                return primary;
            }
        }

        self.pause();
        let fallback = self.retry.run(&format!("quote {symbol}"), || {
            self.provider.info_fallback(symbol)
        })?;
        if !fallback.is_plausible() {
            return Err(Error::NoInfo {
                symbol: symbol.to_string(),
            });
        }
        Ok(fallback)
    }

    /// Retry-wrapped dividend fetch.
    pub fn dividends(&self, symbol: &str, range: HistoryRange) -> Result<BTreeMap<NaiveDate, f64>> {
        self.pause();
        self.retry.run(&format!("dividends {symbol}"), || {
            self.provider.dividends(symbol, range)
        })
    }

    pub fn income_statement(&self, symbol: &str) -> Result<StatementTable> {
        self.pause();
        self.retry.run(&format!("income statement {symbol}"), || {
            self.provider.income_statement(symbol)
        })
    }

    pub fn balance_sheet(&self, symbol: &str) -> Result<StatementTable> {
        self.pause();
        self.retry.run(&format!("balance sheet {symbol}"), || {
            self.provider.balance_sheet(symbol)
        })
    }

    pub fn cash_flow(&self, symbol: &str) -> Result<StatementTable> {
        self.pause();
        self.retry.run(&format!("cash flow {symbol}"), || {
            self.provider.cash_flow(symbol)
        })
    }

    /// Heuristic delisting check. Fails safe: any provider error counts
    /// as delisted, because treating a dead symbol as live corrupts
    /// downstream datasets while the reverse only delays an update.
    pub fn check_delisted(&self, symbol: &str) -> bool {
        let delisted = self.delisting_signals(symbol).unwrap_or(true);
        self.delisted.set(delisted);
        delisted
    }

    fn delisting_signals(&self, symbol: &str) -> Result<bool> {
        let info = self.retry.run(&format!("info {symbol}"), || {
            self.provider.info(symbol)
        })?;
        if !info.is_plausible() {
            return Ok(true);
        }

        self.pause();
        let recent = self.provider.history(
            symbol,
            HistoryRange::Period(Period::FiveDays),
            Interval::Daily,
        )?;
        if recent.is_empty() {
            return Ok(true);
        }

        if let Some(quote_type) = info.str_field("quoteType") {
            if quote_type.eq_ignore_ascii_case("none") {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Reference price for a lookback: the most recent bar for `1d`
    /// (read off a 5-day window so holidays do not blank it), otherwise
    /// the oldest bar of the window.
    pub fn price_at_period(
        &self,
        symbol: &str,
        period: Period,
        part: PricePart,
    ) -> Result<Option<f64>> {
        let (window, newest) = match period {
            Period::OneDay => (Period::FiveDays, true),
            other => (other, false),
        };
        let bars = self.history(symbol, HistoryRange::Period(window), Interval::Daily)?;
        let bar = if newest { bars.last() } else { bars.first() };
        Ok(bar.and_then(|b| part.from_bar(b)))
    }
}

/// Collapse a window of bars into one summary bar: first open, highest
/// high, lowest low, last close, dated at the window's end.
pub(crate) fn aggregate_bars(bars: &[PriceBar]) -> PriceBar {
    let mut out = PriceBar::default();
    out.open = bars.iter().find_map(|b| b.open);
    out.high = bars.iter().filter_map(|b| b.high).fold(None, |acc: Option<f64>, h| {
        Some(acc.map_or(h, |a| a.max(h)))
    });
    out.low = bars.iter().filter_map(|b| b.low).fold(None, |acc: Option<f64>, l| {
        Some(acc.map_or(l, |a| a.min(l)))
    });
    out.close = bars.iter().rev().find_map(|b| b.close);
    out.adj_close = bars.iter().rev().find_map(|b| b.adj_close);
    out.date = bars.iter().rev().find_map(|b| b.date);
    out
}
