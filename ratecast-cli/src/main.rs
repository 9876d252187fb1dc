//! Ratecast CLI — currency-pair and stock extraction commands.
//!
//! Commands:
//! - `fx prices|rates|profile|fundamentals|calculations|forecast` — pair records
//! - `stock prices|dividends|profile|fundamentals` — equity records
//! - `storage-cost` — estimate monthly storage cost of an output tree

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use ratecast_core::extract::{FxExtractor, StockExtractor};
use ratecast_core::provider::{HistoryRange, YahooClient};
use ratecast_core::records::Exportable;
use ratecast_core::settings::Settings;

#[derive(Parser)]
#[command(name = "ratecast", about = "Ratecast CLI — market data extraction and metrics")]
struct Cli {
    /// Path to a TOML settings file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Currency-pair records.
    Fx {
        #[command(subcommand)]
        action: FxAction,
    },
    /// Equity, ETF, and fund records.
    Stock {
        #[command(subcommand)]
        action: StockAction,
    },
    /// Estimate the monthly storage cost of an output directory.
    StorageCost {
        /// Directory to measure.
        #[arg(long)]
        dir: PathBuf,

        /// Price per gigabyte-month in dollars.
        #[arg(long, default_value_t = 0.05)]
        price_per_gb_month: f64,
    },
}

#[derive(Args)]
struct PairArgs {
    /// Base currency (3 letters, e.g. EUR).
    #[arg(long)]
    from: String,

    /// Quote currency (3 letters, e.g. USD).
    #[arg(long)]
    to: String,
}

#[derive(Args)]
struct RangeArgs {
    /// Lookback period: 1y, 5y, 10y, 15y, 20y, or max.
    #[arg(long)]
    period: Option<String>,

    /// Window start (YYYY-MM-DD). Requires --end.
    #[arg(long)]
    start: Option<String>,

    /// Window end (YYYY-MM-DD). Requires --start.
    #[arg(long)]
    end: Option<String>,
}

impl RangeArgs {
    fn parse_dates(&self) -> Result<(Option<NaiveDate>, Option<NaiveDate>)> {
        let start = self
            .start
            .as_deref()
            .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            .transpose()
            .context("--start must be YYYY-MM-DD")?;
        let end = self
            .end
            .as_deref()
            .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            .transpose()
            .context("--end must be YYYY-MM-DD")?;
        Ok((start, end))
    }
}

#[derive(Args)]
struct OutputArgs {
    /// Export format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Output directory. Defaults to the settings' output_dir.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Parquet,
}

#[derive(Subcommand)]
enum FxAction {
    /// Historical OHLC bars for a pair.
    Prices {
        #[command(flatten)]
        pair: PairArgs,
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Date-keyed conversion rates for a pair.
    Rates {
        #[command(flatten)]
        pair: PairArgs,
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Descriptive pair attributes.
    Profile {
        #[command(flatten)]
        pair: PairArgs,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Moving averages and day / trailing-year summaries.
    Fundamentals {
        #[command(flatten)]
        pair: PairArgs,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Volatility, Sharpe ratio, max drawdown, and CAGR.
    Calculations {
        #[command(flatten)]
        pair: PairArgs,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Deterministic GBM price forecast.
    Forecast {
        #[command(flatten)]
        pair: PairArgs,
        #[command(flatten)]
        out: OutputArgs,
    },
}

#[derive(Subcommand)]
enum StockAction {
    /// Date-keyed closing prices (adjusted when available).
    Prices {
        /// Symbol, e.g. VOO.
        #[arg(long)]
        ticker: String,
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Cash dividends over the full listing.
    Dividends {
        #[arg(long)]
        ticker: String,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Company profile.
    Profile {
        #[arg(long)]
        ticker: String,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Valuation and profitability metrics.
    Fundamentals {
        #[arg(long)]
        ticker: String,
        #[command(flatten)]
        out: OutputArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_toml_file(path)?,
        None => Settings::default(),
    };

    match cli.command {
        Commands::Fx { action } => run_fx(action, &settings),
        Commands::Stock { action } => run_stock(action, &settings),
        Commands::StorageCost {
            dir,
            price_per_gb_month,
        } => run_storage_cost(&dir, price_per_gb_month),
    }
}

fn run_fx(action: FxAction, settings: &Settings) -> Result<()> {
    let provider = YahooClient::new()?;

    match action {
        FxAction::Prices { pair, range, out } => {
            let extractor = FxExtractor::new(&provider, settings, &pair.from, &pair.to)?;
            let range = resolve_range_args(&range)?;
            let record = extractor.extract_prices(range)?;
            let stem = format!("{}_prices", record.pair().to_lowercase());
            export(&record, &stem, &out, settings, |dir, file| {
                record.write_parquet(dir, file)
            })
        }
        FxAction::Rates { pair, range, out } => {
            let extractor = FxExtractor::new(&provider, settings, &pair.from, &pair.to)?;
            let range = resolve_range_args(&range)?;
            let record = extractor.extract_rates(range)?;
            let stem = format!("{}_rates", record.pair().to_lowercase());
            export(&record, &stem, &out, settings, |dir, file| {
                record.write_parquet(dir, file)
            })
        }
        FxAction::Profile { pair, out } => {
            let extractor = FxExtractor::new(&provider, settings, &pair.from, &pair.to)?;
            let record = extractor.extract_profile()?;
            let stem = format!("{}_profile", record.pair().to_lowercase());
            export(&record, &stem, &out, settings, |dir, file| {
                record.write_parquet(dir, file)
            })
        }
        FxAction::Fundamentals { pair, out } => {
            let extractor = FxExtractor::new(&provider, settings, &pair.from, &pair.to)?;
            let record = extractor.extract_fundamentals()?;
            let stem = format!("{}_fundamentals", record.pair().to_lowercase());
            export(&record, &stem, &out, settings, |dir, file| {
                record.write_parquet(dir, file)
            })
        }
        FxAction::Calculations { pair, out } => {
            let extractor = FxExtractor::new(&provider, settings, &pair.from, &pair.to)?;
            let record = extractor.extract_calculations()?;
            let stem = format!("{}_calculations", record.pair().to_lowercase());
            export(&record, &stem, &out, settings, |dir, file| {
                record.write_parquet(dir, file)
            })
        }
        FxAction::Forecast { pair, out } => {
            let extractor = FxExtractor::new(&provider, settings, &pair.from, &pair.to)?;
            let record = extractor.extract_forecast()?;
            let stem = format!("{}_forecast", record.pair().to_lowercase());
            export(&record, &stem, &out, settings, |dir, file| {
                record.write_parquet(dir, file)
            })
        }
    }
}

fn run_stock(action: StockAction, settings: &Settings) -> Result<()> {
    let provider = YahooClient::new()?;

    match action {
        StockAction::Prices { ticker, range, out } => {
            let extractor = StockExtractor::new(&provider, settings, &ticker)?;
            let range = resolve_range_args(&range)?;
            let record = extractor.extract_prices(range)?;
            let stem = format!("{}_prices", extractor.ticker().to_lowercase());
            export(&record, &stem, &out, settings, |dir, file| {
                record.write_parquet(dir, file)
            })
        }
        StockAction::Dividends { ticker, out } => {
            let extractor = StockExtractor::new(&provider, settings, &ticker)?;
            let record = extractor.extract_dividends()?;
            let stem = format!("{}_dividends", extractor.ticker().to_lowercase());
            export(&record, &stem, &out, settings, |dir, file| {
                record.write_parquet(dir, file)
            })
        }
        StockAction::Profile { ticker, out } => {
            let extractor = StockExtractor::new(&provider, settings, &ticker)?;
            let record = extractor.extract_profile()?;
            let stem = format!("{}_profile", extractor.ticker().to_lowercase());
            export(&record, &stem, &out, settings, |dir, file| {
                record.write_parquet(dir, file)
            })
        }
        StockAction::Fundamentals { ticker, out } => {
            let extractor = StockExtractor::new(&provider, settings, &ticker)?;
            let record = extractor.extract_fundamentals()?;
            let stem = format!("{}_fundamentals", extractor.ticker().to_lowercase());
            export(&record, &stem, &out, settings, |dir, file| {
                record.write_parquet(dir, file)
            })
        }
    }
}

fn resolve_range_args(range: &RangeArgs) -> Result<HistoryRange> {
    let (start, end) = range.parse_dates()?;
    Ok(FxExtractor::<YahooClient>::resolve_range(
        range.period.as_deref(),
        start,
        end,
    )?)
}

/// Write a record as JSON or partitioned Parquet. Empty records are
/// reported and skipped rather than materialized as empty files.
fn export<R: Exportable>(
    record: &R,
    stem: &str,
    out: &OutputArgs,
    settings: &Settings,
    write_parquet: impl FnOnce(&Path, &str) -> ratecast_core::error::Result<()>,
) -> Result<()> {
    if record.is_empty() {
        println!("No data for {stem}; nothing exported");
        return Ok(());
    }

    let out_dir = out.output.clone().unwrap_or_else(|| settings.output_dir.clone());
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("create {}", out_dir.display()))?;

    match out.format {
        OutputFormat::Json => {
            let path = out_dir.join(format!("{stem}.json"));
            record.write_json(&path)?;
            println!("Wrote {}", path.display());
        }
        OutputFormat::Parquet => {
            write_parquet(&out_dir, &format!("{stem}.parquet"))?;
            println!("Wrote Parquet partitions under {}", out_dir.display());
        }
    }
    Ok(())
}

fn run_storage_cost(dir: &Path, price_per_gb_month: f64) -> Result<()> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    if price_per_gb_month < 0.0 {
        bail!("--price-per-gb-month must be non-negative");
    }

    let bytes = dir_size(dir)?;
    let gigabytes = bytes as f64 / 1e9;
    let monthly = gigabytes * price_per_gb_month;
    println!("{}: {bytes} bytes ({gigabytes:.3} GB)", dir.display());
    println!("Estimated cost at ${price_per_gb_month:.4}/GB-month: ${monthly:.4}/month");
    Ok(())
}

fn dir_size(dir: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in std::fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_dir() {
            total += dir_size(&entry.path())?;
        } else {
            total += meta.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn dir_size_sums_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("a/b");
        std::fs::create_dir_all(&sub).unwrap();
        let mut f1 = std::fs::File::create(dir.path().join("x.bin")).unwrap();
        f1.write_all(&[0u8; 100]).unwrap();
        let mut f2 = std::fs::File::create(sub.join("y.bin")).unwrap();
        f2.write_all(&[0u8; 250]).unwrap();
        assert_eq!(dir_size(dir.path()).unwrap(), 350);
    }

    #[test]
    fn cli_parses_fx_calculations() {
        let cli = Cli::try_parse_from([
            "ratecast",
            "fx",
            "calculations",
            "--from",
            "EUR",
            "--to",
            "USD",
            "--format",
            "parquet",
        ])
        .unwrap();
        match cli.command {
            Commands::Fx {
                action: FxAction::Calculations { pair, out },
            } => {
                assert_eq!(pair.from, "EUR");
                assert_eq!(pair.to, "USD");
                assert!(matches!(out.format, OutputFormat::Parquet));
            }
            _ => panic!("parsed into the wrong command"),
        }
    }

    #[test]
    fn cli_parses_storage_cost_default_price() {
        let cli = Cli::try_parse_from(["ratecast", "storage-cost", "--dir", "/tmp/out"]).unwrap();
        match cli.command {
            Commands::StorageCost {
                price_per_gb_month, ..
            } => assert_eq!(price_per_gb_month, 0.05),
            _ => panic!("parsed into the wrong command"),
        }
    }
}
