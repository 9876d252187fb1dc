//! Property tests for metric invariants.
//!
//! Uses proptest to verify:
//! 1. Volatility is never negative, for log and simple returns
//! 2. Max drawdown stays within [-1, 0] for positive price series
//! 3. CAGR returns exactly the requested lookback keys
//! 4. Forecast bars bracket open/close and respect the horizon cap

use chrono::NaiveDate;
use proptest::prelude::*;

use ratecast_core::metrics::{self, PricePoint, ReturnKind};
use ratecast_core::records::PriceBar;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_prices() -> impl Strategy<Value = Vec<f64>> {
    proptest::collection::vec(1.0..1000.0_f64, 10..120)
}

fn sequential_points(prices: &[f64]) -> Vec<PricePoint> {
    let base = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    prices
        .iter()
        .enumerate()
        .map(|(i, &p)| PricePoint::new(base + chrono::Duration::days(i as i64), p))
        .collect()
}

fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
    let base = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| PriceBar {
            date: Some(base + chrono::Duration::days(i as i64)),
            open: Some(c),
            high: Some(c * 1.01),
            low: Some(c * 0.99),
            close: Some(c),
            adj_close: None,
            volume: None,
        })
        .collect()
}

// ── 1. Volatility ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn volatility_is_non_negative_log(prices in arb_prices()) {
        let points = sequential_points(&prices);
        let vol = metrics::volatility(&points, None, ReturnKind::Log, 1, false).unwrap();
        prop_assert!(vol >= 0.0);
        prop_assert!(vol.is_finite());
    }

    #[test]
    fn volatility_is_non_negative_simple(prices in arb_prices()) {
        let points = sequential_points(&prices);
        let vol = metrics::volatility(&points, None, ReturnKind::Simple, 1, false).unwrap();
        prop_assert!(vol >= 0.0);
    }

    #[test]
    fn percent_volatility_is_a_hundredfold(prices in arb_prices()) {
        let points = sequential_points(&prices);
        let raw = metrics::volatility(&points, Some(252), ReturnKind::Log, 1, false).unwrap();
        let pct = metrics::volatility(&points, Some(252), ReturnKind::Log, 1, true).unwrap();
        prop_assert!((pct - raw * 100.0).abs() <= 1e-9 * raw.abs().max(1.0));
    }
}

// ── 2. Max drawdown ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn drawdown_is_bounded(prices in arb_prices()) {
        let points = sequential_points(&prices);
        let mdd = metrics::max_drawdown(&points, false).unwrap();
        prop_assert!(mdd <= 0.0);
        prop_assert!(mdd > -1.0);
    }

    #[test]
    fn monotone_rising_series_never_draws_down(
        start in 1.0..100.0_f64,
        steps in proptest::collection::vec(0.0..5.0_f64, 5..50),
    ) {
        let mut price = start;
        let mut prices = vec![start];
        for step in steps {
            price += step;
            prices.push(price);
        }
        let points = sequential_points(&prices);
        let mdd = metrics::max_drawdown(&points, false).unwrap();
        prop_assert_eq!(mdd, 0.0);
    }
}

// ── 3. CAGR keys ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn cagr_returns_exactly_the_requested_keys(prices in arb_prices()) {
        let points = sequential_points(&prices);
        let growth = metrics::cagr(&points, &[1, 5, 20], false, None).unwrap();
        let keys: Vec<&str> = growth.keys().map(String::as_str).collect();
        prop_assert_eq!(keys, vec!["1y", "20y", "5y"]);
        // Windows longer than the series cannot produce a value.
        prop_assert_eq!(growth.get("20y").copied().flatten(), None);
    }
}

// ── 4. Forecast shape ────────────────────────────────────────────────

proptest! {
    #[test]
    fn forecast_brackets_open_and_close(
        closes in proptest::collection::vec(10.0..500.0_f64, 5..60),
        requested in 1usize..200,
    ) {
        let history = bars_from_closes(&closes);
        let forecast = metrics::forecast_prices(&history, requested).unwrap();
        prop_assert_eq!(forecast.len(), requested.min(closes.len()));

        for row in &forecast {
            let (o, h, l, c) = (
                row.open.unwrap(),
                row.high.unwrap(),
                row.low.unwrap(),
                row.close.unwrap(),
            );
            // Stored values are rounded to 6 decimals, so allow one ulp
            // of that rounding.
            prop_assert!(h >= o.max(c) - 1e-6);
            prop_assert!(l <= o.min(c) + 1e-6);
            prop_assert!(l > 0.0);
        }
    }

    #[test]
    fn forecast_dates_are_consecutive(
        closes in proptest::collection::vec(10.0..500.0_f64, 5..40),
    ) {
        let history = bars_from_closes(&closes);
        let forecast = metrics::forecast_prices(&history, closes.len()).unwrap();
        let mut expected = history.last().unwrap().date.unwrap();
        for row in &forecast {
            expected += chrono::Duration::days(1);
            prop_assert_eq!(row.date, Some(expected));
        }
    }
}
