//! Stochastic price forecast — a geometric Brownian motion walk seeded
//! for bit-for-bit reproducibility.
//!
//! Drift and volatility come from historical log close returns; daily
//! high/low shapes are sampled from the empirical distribution of
//! historical `(high - open) / open` and `(low - open) / open` ratios.
//! The RNG is an explicit parameter so tests control determinism
//! without global state; the convenience entry point seeds ChaCha8
//! with [`FORECAST_SEED`].

use chrono::{Duration, NaiveDate};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{Error, Result};
use crate::metrics::{mean_f64, round6};
use crate::records::PriceBar;

/// Fixed seed for the default forecast RNG.
pub const FORECAST_SEED: u64 = 42;

/// Forecast forward OHLC bars with the default seeded RNG.
pub fn forecast_prices(history: &[PriceBar], requested_days: usize) -> Result<Vec<PriceBar>> {
    let mut rng = ChaCha8Rng::seed_from_u64(FORECAST_SEED);
    forecast_prices_with_rng(history, requested_days, &mut rng)
}

/// Forecast forward OHLC bars using a caller-supplied RNG.
///
/// Rows missing a date or any of open/high/low/close are dropped; at
/// least 2 complete rows must remain. The horizon is
/// `min(requested_days, complete history length)`. Per forecast day the
/// draw order is fixed: one standard-normal innovation (Box–Muller, two
/// uniform draws), one uniform index into the high-offset pool, one
/// uniform index into the low-offset pool. Stored values are rounded to
/// 6 decimals; the unrounded close carries forward.
pub fn forecast_prices_with_rng<R: Rng>(
    history: &[PriceBar],
    requested_days: usize,
    rng: &mut R,
) -> Result<Vec<PriceBar>> {
    let rows = complete_rows(history);
    if rows.len() < 2 {
        return Err(Error::InsufficientData(
            "at least 2 complete OHLC rows are required for a forecast".into(),
        ));
    }

    let horizon = requested_days.min(rows.len());

    let closes: Vec<f64> = rows.iter().map(|r| r.close).collect();
    let returns: Vec<f64> = closes.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    let mu = mean_f64(&returns);
    let sigma = if returns.len() >= 2 {
        let mean = mu;
        let sum_sq: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum();
        (sum_sq / (returns.len() - 1) as f64).sqrt()
    } else {
        0.0
    };

    let high_offsets: Vec<f64> = rows.iter().map(|r| (r.high - r.open) / r.open).collect();
    let low_offsets: Vec<f64> = rows.iter().map(|r| (r.low - r.open) / r.open).collect();

    let start_date = rows[rows.len() - 1].date;
    let mut last_close = closes[closes.len() - 1];
    let mut forecast = Vec::with_capacity(horizon);

    for day in 0..horizon {
        let z = standard_normal(rng);
        let close = last_close * ((mu - 0.5 * sigma * sigma) + sigma * z).exp();
        let open = last_close;

        let high_candidate = open * (1.0 + high_offsets[rng.gen_range(0..high_offsets.len())]);
        let low_candidate = open * (1.0 + low_offsets[rng.gen_range(0..low_offsets.len())]);
        let high = high_candidate.max(open).max(close);
        let low = low_candidate.min(open).min(close);

        forecast.push(PriceBar {
            date: Some(start_date + Duration::days(day as i64 + 1)),
            open: Some(round6(open)),
            high: Some(round6(high)),
            low: Some(round6(low)),
            close: Some(round6(close)),
            adj_close: None,
            volume: None,
        });

        last_close = close;
    }

    Ok(forecast)
}

/// Standard-normal draw via the Box–Muller transform (two uniforms).
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

struct CompleteRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

fn complete_rows(history: &[PriceBar]) -> Vec<CompleteRow> {
    history
        .iter()
        .filter_map(|bar| {
            let date = bar.date?;
            let open = finite(bar.open)?;
            let high = finite(bar.high)?;
            let low = finite(bar.low)?;
            let close = finite(bar.close)?;
            Some(CompleteRow {
                date,
                open,
                high,
                low,
                close,
            })
        })
        .collect()
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bar(y: i32, m: u32, d: u32, o: f64, h: f64, l: f64, c: f64) -> PriceBar {
        PriceBar {
            date: Some(date(y, m, d)),
            open: Some(o),
            high: Some(h),
            low: Some(l),
            close: Some(c),
            adj_close: None,
            volume: None,
        }
    }

    fn sample_history() -> Vec<PriceBar> {
        vec![
            bar(2024, 1, 1, 1.10, 1.12, 1.09, 1.11),
            bar(2024, 1, 2, 1.11, 1.13, 1.10, 1.12),
            bar(2024, 1, 3, 1.12, 1.14, 1.11, 1.10),
            bar(2024, 1, 4, 1.10, 1.11, 1.08, 1.09),
            bar(2024, 1, 5, 1.09, 1.12, 1.09, 1.11),
        ]
    }

    #[test]
    fn forecast_is_reproducible_bit_for_bit() {
        let history = sample_history();
        let a = forecast_prices(&history, 5).unwrap();
        let b = forecast_prices(&history, 5).unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.date, y.date);
            assert_eq!(x.open, y.open);
            assert_eq!(x.high, y.high);
            assert_eq!(x.low, y.low);
            assert_eq!(x.close, y.close);
        }
    }

    #[test]
    fn horizon_is_min_of_requested_and_history() {
        let history = sample_history();
        assert_eq!(forecast_prices(&history, 3).unwrap().len(), 3);
        assert_eq!(forecast_prices(&history, 50).unwrap().len(), 5);
    }

    #[test]
    fn high_and_low_bracket_open_and_close() {
        let history = sample_history();
        let forecast = forecast_prices(&history, 5).unwrap();
        for row in &forecast {
            let (o, h, l, c) = (
                row.open.unwrap(),
                row.high.unwrap(),
                row.low.unwrap(),
                row.close.unwrap(),
            );
            assert!(h >= o.max(c), "high {h} < max(open {o}, close {c})");
            assert!(l <= o.min(c), "low {l} > min(open {o}, close {c})");
        }
    }

    #[test]
    fn dates_advance_one_calendar_day_from_last_bar() {
        let history = sample_history();
        let forecast = forecast_prices(&history, 3).unwrap();
        assert_eq!(forecast[0].date, Some(date(2024, 1, 6)));
        assert_eq!(forecast[1].date, Some(date(2024, 1, 7)));
        assert_eq!(forecast[2].date, Some(date(2024, 1, 8)));
    }

    #[test]
    fn incomplete_rows_are_dropped_before_the_minimum_check() {
        let mut history = sample_history();
        for b in history.iter_mut().take(4) {
            b.low = None;
        }
        // one complete row left
        assert!(matches!(
            forecast_prices(&history, 5),
            Err(Error::InsufficientData(_))
        ));
    }

    #[test]
    fn empty_history_is_insufficient() {
        assert!(matches!(
            forecast_prices(&[], 5),
            Err(Error::InsufficientData(_))
        ));
    }

    #[test]
    fn injected_rng_controls_the_walk() {
        let history = sample_history();
        let mut rng_a = ChaCha8Rng::seed_from_u64(7);
        let mut rng_b = ChaCha8Rng::seed_from_u64(7);
        let a = forecast_prices_with_rng(&history, 5, &mut rng_a).unwrap();
        let b = forecast_prices_with_rng(&history, 5, &mut rng_b).unwrap();
        assert_eq!(
            a.iter().map(|r| r.close).collect::<Vec<_>>(),
            b.iter().map(|r| r.close).collect::<Vec<_>>()
        );

        let mut rng_c = ChaCha8Rng::seed_from_u64(8);
        let c = forecast_prices_with_rng(&history, 5, &mut rng_c).unwrap();
        assert_ne!(
            a.iter().map(|r| r.close).collect::<Vec<_>>(),
            c.iter().map(|r| r.close).collect::<Vec<_>>()
        );
    }

    #[test]
    fn values_are_rounded_to_six_decimals() {
        let history = sample_history();
        let forecast = forecast_prices(&history, 5).unwrap();
        for row in &forecast {
            for v in [row.open, row.high, row.low, row.close] {
                let v = v.unwrap();
                assert_eq!(v, round6(v));
            }
        }
    }
}
