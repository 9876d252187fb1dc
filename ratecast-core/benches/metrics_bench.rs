//! Criterion benchmarks for the metrics hot paths.
//!
//! Benchmarks:
//! 1. Volatility and Sharpe over a daily multi-year series
//! 2. Max drawdown scan
//! 3. CAGR over the default lookback set
//! 4. GBM forecast generation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chrono::NaiveDate;
use ratecast_core::metrics::{self, PricePoint, ReturnKind, DEFAULT_CAGR_LOOKBACKS};
use ratecast_core::records::PriceBar;

fn make_points(n: usize) -> Vec<PricePoint> {
    let base = NaiveDate::from_ymd_opt(2005, 1, 3).unwrap();
    (0..n)
        .map(|i| {
            let price = 100.0 + (i as f64 * 0.05).sin() * 10.0 + i as f64 * 0.01;
            PricePoint::new(base + chrono::Duration::days(i as i64), price)
        })
        .collect()
}

fn make_bars(n: usize) -> Vec<PriceBar> {
    make_points(n)
        .into_iter()
        .map(|p| PriceBar {
            date: Some(p.date),
            open: Some(p.price),
            high: Some(p.price * 1.01),
            low: Some(p.price * 0.99),
            close: Some(p.price),
            adj_close: None,
            volume: None,
        })
        .collect()
}

fn bench_volatility(c: &mut Criterion) {
    let mut group = c.benchmark_group("volatility");
    for n in [252usize, 1260, 5040] {
        let points = make_points(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &points, |b, points| {
            b.iter(|| {
                metrics::volatility(black_box(points), Some(252), ReturnKind::Log, 1, false)
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_sharpe(c: &mut Criterion) {
    let points = make_points(1260);
    c.bench_function("sharpe_1260", |b| {
        b.iter(|| {
            metrics::sharpe_ratio(black_box(&points), 0.02, Some(252), ReturnKind::Log, 1, false)
                .unwrap()
        })
    });
}

fn bench_drawdown(c: &mut Criterion) {
    let points = make_points(5040);
    c.bench_function("max_drawdown_5040", |b| {
        b.iter(|| metrics::max_drawdown(black_box(&points), false).unwrap())
    });
}

fn bench_cagr(c: &mut Criterion) {
    let points = make_points(5040);
    c.bench_function("cagr_default_lookbacks", |b| {
        b.iter(|| {
            metrics::cagr(black_box(&points), &DEFAULT_CAGR_LOOKBACKS, false, None).unwrap()
        })
    });
}

fn bench_forecast(c: &mut Criterion) {
    let bars = make_bars(5040);
    c.bench_function("forecast_5040x1000", |b| {
        b.iter(|| metrics::forecast_prices(black_box(&bars), 1000).unwrap())
    });
}

criterion_group!(
    benches,
    bench_volatility,
    bench_sharpe,
    bench_drawdown,
    bench_cagr,
    bench_forecast
);
criterion_main!(benches);
