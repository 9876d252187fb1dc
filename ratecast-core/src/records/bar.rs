//! OHLC price bar — the fundamental market data unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::metrics::round6;

/// One OHLC bar, per historical trading day or per derived day/year
/// summary. Every field is independently optional; absence means "not
/// reported", not zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: Option<NaiveDate>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<u64>,
}

impl PriceBar {
    /// A bar is empty when it is not anchored to a date.
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
    }

    /// Midpoint of low and high, rounded to 6 decimals; undefined when
    /// either side is missing.
    pub fn average(&self) -> Option<f64> {
        match (self.low, self.high) {
            (Some(low), Some(high)) => Some(round6((low + high) / 2.0)),
            _ => None,
        }
    }

    /// Adjusted close when present, otherwise raw close.
    pub fn effective_close(&self) -> Option<f64> {
        self.adj_close.or(self.close)
    }
}
