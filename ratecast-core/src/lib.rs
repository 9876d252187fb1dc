//! Ratecast Core — market data extraction, financial metrics, exportable records.
//!
//! This crate contains the whole pipeline:
//! - Error taxonomy shared by every layer
//! - Retry policy for flaky network calls
//! - Typed accessors over loosely-typed provider payloads
//! - Financial metrics engine (volatility, Sharpe, drawdown, CAGR, GBM forecast)
//! - Data-provider contract plus the Yahoo Finance client
//! - FX and stock extractors with fallback-window and delisting logic
//! - Record model with JSON and partitioned Parquet export

pub mod convert;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod provider;
pub mod records;
pub mod retry;
pub mod settings;

pub use error::Error;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: the types that cross the extractor boundary
    /// are Send + Sync, so callers can run independent extractors on
    /// their own threads without a retrofit.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<error::Error>();
        require_sync::<error::Error>();

        require_send::<retry::RetryPolicy>();
        require_sync::<retry::RetryPolicy>();

        require_send::<records::PriceBar>();
        require_sync::<records::PriceBar>();
        require_send::<records::PriceSeries>();
        require_sync::<records::PriceSeries>();
        require_send::<records::ConversionRateSeries>();
        require_sync::<records::ConversionRateSeries>();
        require_send::<records::FxPriceRecord>();
        require_sync::<records::FxPriceRecord>();
        require_send::<records::CalculationRecord>();
        require_sync::<records::CalculationRecord>();
        require_send::<records::ForecastRecord>();
        require_sync::<records::ForecastRecord>();
        require_send::<records::CompanyProfileRecord>();
        require_sync::<records::CompanyProfileRecord>();
        require_send::<records::FundamentalsRecord>();
        require_sync::<records::FundamentalsRecord>();

        require_send::<settings::Settings>();
        require_sync::<settings::Settings>();
    }
}
