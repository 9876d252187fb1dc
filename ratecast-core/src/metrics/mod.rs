//! Financial metrics engine — pure functions over a date-indexed price series.
//!
//! Every metric takes prices in ascending date order, drops non-finite
//! observations, and fails loudly on malformed or insufficient input:
//! [`Error::InsufficientData`] when there are too few observations,
//! [`Error::InvalidArgument`] for unsupported enumerated parameters.
//! No metric ever returns a silent zero or NaN in place of an error.

pub mod forecast;

pub use forecast::{forecast_prices, forecast_prices_with_rng, FORECAST_SEED};

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Trading periods per year assumed when the sampling frequency cannot
/// be inferred from the date index.
pub const DEFAULT_PERIODS_PER_YEAR: u32 = 252;

/// Default CAGR trailing windows, in years.
pub const DEFAULT_CAGR_LOOKBACKS: [u32; 6] = [1, 2, 5, 10, 15, 20];

/// One observation of a date-indexed price series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self { date, price }
    }
}

/// How per-step returns are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnKind {
    /// `ln(p_t / p_{t-1})`
    Log,
    /// `(p_t / p_{t-1}) - 1`
    Simple,
}

impl FromStr for ReturnKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "log" => Ok(Self::Log),
            "simple" => Ok(Self::Simple),
            other => Err(Error::InvalidArgument(format!(
                "return kind must be 'log' or 'simple', got '{other}'"
            ))),
        }
    }
}

/// Infer trading periods per year from the spacing of a date index.
///
/// Maps the median gap between consecutive dates: daily/business-day
/// spacing to 252, weekly to 52, monthly to 12, quarterly to 4, annual
/// to 1. Returns `None` when the index is too short, not strictly
/// ascending, or the spacing fits no known frequency.
pub fn infer_periods_per_year(dates: &[NaiveDate]) -> Option<u32> {
    if dates.len() < 3 {
        return None;
    }
    let mut gaps: Vec<i64> = Vec::with_capacity(dates.len() - 1);
    for pair in dates.windows(2) {
        let gap = (pair[1] - pair[0]).num_days();
        if gap <= 0 {
            return None;
        }
        gaps.push(gap);
    }
    gaps.sort_unstable();
    let median = gaps[gaps.len() / 2];
    match median {
        1..=4 => Some(252),
        5..=10 => Some(52),
        11..=45 => Some(12),
        46..=183 => Some(4),
        184..=400 => Some(1),
        _ => None,
    }
}

/// Annualized volatility of a price series.
///
/// Per-step returns (log or simple), sample standard deviation with the
/// given degrees-of-freedom adjustment, annualized by `sqrt(periods per
/// year)`. `periods_per_year = None` infers the frequency from the date
/// index, defaulting to 252.
pub fn volatility(
    points: &[PricePoint],
    periods_per_year: Option<u32>,
    return_kind: ReturnKind,
    ddof: usize,
    as_percent: bool,
) -> Result<f64> {
    let clean = drop_non_finite(points)?;
    let ppy = resolve_periods_per_year(&clean, periods_per_year);
    let returns = per_step_returns(&clean, return_kind);
    let sigma = sample_std(&returns, ddof)?;
    let annualized = sigma * (ppy as f64).sqrt();
    Ok(if as_percent { annualized * 100.0 } else { annualized })
}

/// Annualized Sharpe ratio of a price series.
///
/// The annual risk-free rate is converted to a per-period rate via
/// `(1 + rf)^(1/ppy) - 1` and subtracted from each period return;
/// the ratio is `mean(excess) / std(excess) * sqrt(ppy)`. A
/// zero-variance excess-return series is reported as insufficient data
/// rather than an infinite ratio.
pub fn sharpe_ratio(
    points: &[PricePoint],
    risk_free_rate: f64,
    periods_per_year: Option<u32>,
    return_kind: ReturnKind,
    ddof: usize,
    as_percent: bool,
) -> Result<f64> {
    let clean = drop_non_finite(points)?;
    let ppy = resolve_periods_per_year(&clean, periods_per_year);
    let returns = per_step_returns(&clean, return_kind);

    let rf_periodic = (1.0 + risk_free_rate).powf(1.0 / ppy as f64) - 1.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - rf_periodic).collect();

    let sigma = sample_std(&excess, ddof)?;
    if sigma < 1e-15 {
        return Err(Error::InsufficientData(
            "zero variance in excess returns".into(),
        ));
    }
    let sharpe = mean_f64(&excess) / sigma * (ppy as f64).sqrt();
    Ok(if as_percent { sharpe * 100.0 } else { sharpe })
}

/// Maximum drawdown of a price series.
///
/// Running maximum of price, then the most negative value of
/// `(price - running_max) / running_max`. Always `<= 0`; with
/// `as_percent` the absolute value scaled to percent is returned.
pub fn max_drawdown(points: &[PricePoint], as_percent: bool) -> Result<f64> {
    let clean = drop_non_finite(points)?;

    let mut running_max = f64::MIN;
    let mut worst = 0.0_f64;
    for p in &clean {
        running_max = running_max.max(p.price);
        let drawdown = (p.price - running_max) / running_max;
        worst = worst.min(drawdown);
    }

    Ok(if as_percent { worst.abs() * 100.0 } else { worst })
}

/// Compound annual growth rate over multiple trailing windows.
///
/// For each lookback `N`, anchors at `end_date - N years` (Feb 29
/// clamps to Feb 28), takes the latest observation at or before the
/// anchor, and compounds over the actual elapsed time in years
/// (`days / 365.25`). Lookbacks with no observation old enough, or a
/// non-positive elapsed time, yield `None` — "not available", never an
/// error. Results are rounded to 6 decimals after optional percent
/// scaling, keyed `"{N}y"`.
pub fn cagr(
    points: &[PricePoint],
    lookbacks: &[u32],
    as_percent: bool,
    end_date: Option<NaiveDate>,
) -> Result<BTreeMap<String, Option<f64>>> {
    let mut clean = drop_non_finite(points)?;
    clean.sort_by_key(|p| p.date);
    clean.dedup_by_key(|p| p.date);
    if clean.len() < 2 {
        return Err(Error::InsufficientData(
            "need at least two price observations".into(),
        ));
    }

    let end_date = end_date.unwrap_or_else(|| clean[clean.len() - 1].date);

    let mut table = BTreeMap::new();
    for &years in lookbacks {
        let key = format!("{years}y");
        let anchor = years_before(end_date, years);

        let start = clean.iter().rev().find(|p| p.date <= anchor);
        let end = clean.iter().rev().find(|p| p.date <= end_date);
        let (start, end) = match (start, end) {
            (Some(s), Some(e)) => (s, e),
            _ => {
                table.insert(key, None);
                continue;
            }
        };

        let elapsed_years = (end_date - start.date).num_days() as f64 / 365.25;
        if elapsed_years <= 0.0 {
            table.insert(key, None);
            continue;
        }

        let mut rate = (end.price / start.price).powf(1.0 / elapsed_years) - 1.0;
        if as_percent {
            rate *= 100.0;
        }
        table.insert(key, Some(round6(rate)));
    }

    Ok(table)
}

/// The calendar date `years` years before `date`, clamping Feb 29 to Feb 28.
fn years_before(date: NaiveDate, years: u32) -> NaiveDate {
    let year = date.year() - years as i32;
    NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, 2, 28).unwrap())
}

/// Round to 6 decimal places.
pub(crate) fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

fn drop_non_finite(points: &[PricePoint]) -> Result<Vec<PricePoint>> {
    if points.len() < 2 {
        return Err(Error::InsufficientData(
            "need at least two price observations".into(),
        ));
    }
    let clean: Vec<PricePoint> = points.iter().copied().filter(|p| p.price.is_finite()).collect();
    if clean.len() < 2 {
        return Err(Error::InsufficientData(
            "fewer than two finite observations after dropping gaps".into(),
        ));
    }
    Ok(clean)
}

fn resolve_periods_per_year(points: &[PricePoint], explicit: Option<u32>) -> u32 {
    explicit.unwrap_or_else(|| {
        let dates: Vec<NaiveDate> = points.iter().map(|p| p.date).collect();
        infer_periods_per_year(&dates).unwrap_or(DEFAULT_PERIODS_PER_YEAR)
    })
}

fn per_step_returns(points: &[PricePoint], kind: ReturnKind) -> Vec<f64> {
    points
        .windows(2)
        .map(|w| match kind {
            ReturnKind::Log => (w[1].price / w[0].price).ln(),
            ReturnKind::Simple => w[1].price / w[0].price - 1.0,
        })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation with a degrees-of-freedom adjustment.
///
/// Fails when there are not strictly more values than `ddof`, which is
/// the only way the estimator would be undefined.
pub(crate) fn sample_std(values: &[f64], ddof: usize) -> Result<f64> {
    if values.len() <= ddof {
        return Err(Error::InsufficientData(format!(
            "need more than {ddof} returns for a ddof={ddof} standard deviation"
        )));
    }
    let mean = mean_f64(values);
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Ok((sum_sq / (values.len() - ddof) as f64).sqrt())
}
