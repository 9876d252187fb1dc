//! Equity extraction: price series, dividends, company profile, and
//! fundamentals with statement-based fallbacks.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::Fetcher;
use crate::convert::InfoBlob;
use crate::error::{Error, Result};
use crate::provider::{HistoryRange, Interval, MarketDataProvider, Period, StatementTable};
use crate::records::{
    CompanyAddress, CompanyOfficer, CompanyProfileRecord, DividendRecord, FundamentalsRecord,
    Metadata, PriceBar, PriceSeries,
};
use crate::settings::Settings;

/// Statement line-item aliases, in preference order. Providers rename
/// these across report vintages.
const REVENUE_ROWS: [&str; 2] = ["Total Revenue", "Operating Revenue"];
const EQUITY_ROWS: [&str; 3] = [
    "Stockholders Equity",
    "Total Stockholder Equity",
    "Common Stock Equity",
];
const NET_INCOME_ROWS: [&str; 2] = ["Net Income", "Net Income Common Stockholders"];
const EBITDA_ROWS: [&str; 2] = ["EBITDA", "Normalized EBITDA"];
const OCF_ROWS: [&str; 2] = ["Operating Cash Flow", "Total Cash From Operating Activities"];

/// Extractor for one equity, ETF, or fund symbol.
pub struct StockExtractor<'a, P: MarketDataProvider> {
    fetcher: Fetcher<'a, P>,
    ticker: String,
}

impl<'a, P: MarketDataProvider> StockExtractor<'a, P> {
    pub fn new(provider: &'a P, settings: &Settings, ticker: &str) -> Result<Self> {
        let ticker = ticker.trim();
        if ticker.is_empty() {
            return Err(Error::InvalidArgument("ticker must not be empty".into()));
        }
        Ok(Self {
            fetcher: Fetcher::new(provider, settings),
            ticker: ticker.to_ascii_uppercase(),
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// Heuristic delisting check for this symbol. Fails safe.
    pub fn check_delisted(&self) -> bool {
        self.fetcher.check_delisted(&self.ticker)
    }

    fn metadata(&self) -> Metadata {
        Metadata::now(self.fetcher.provider_name())
    }

    /// Date-keyed closing prices. Adjusted close preferred.
    pub fn extract_prices(&self, range: HistoryRange) -> Result<PriceSeries> {
        let bars = self.fetcher.history(&self.ticker, range, Interval::Daily)?;
        let mut series = PriceSeries::new(&self.ticker, self.metadata());
        for bar in &bars {
            if let (Some(date), Some(price)) = (bar.date, bar.effective_close()) {
                series.insert(date, price);
            }
        }
        series.currency = self
            .fetcher
            .info(&self.ticker)
            .ok()
            .and_then(|info| currency_of(&info));
        Ok(series)
    }

    /// Cash dividends over the full listing.
    pub fn extract_dividends(&self) -> Result<DividendRecord> {
        let amounts = self
            .fetcher
            .dividends(&self.ticker, HistoryRange::Period(Period::Max))?;
        let mut record = DividendRecord::new(&self.ticker, self.metadata());
        record.amounts = amounts;
        record.currency = self
            .fetcher
            .info(&self.ticker)
            .ok()
            .and_then(|info| currency_of(&info));
        Ok(record)
    }

    /// Descriptive company attributes.
    pub fn extract_profile(&self) -> Result<CompanyProfileRecord> {
        let info = self.fetcher.info(&self.ticker)?;
        let quote_type = info
            .str_field("quoteType")
            .map(|q| q.to_ascii_uppercase());
        let is_fund = matches!(quote_type.as_deref(), Some("ETF") | Some("MUTUALFUND"));

        let mut profile = CompanyProfileRecord::new(&self.ticker, self.metadata());
        profile.name = info
            .str_field("longName")
            .or_else(|| info.str_field("shortName"));
        profile.quote_type = quote_type;
        profile.exchange = info.str_field("exchange");
        profile.currency = currency_of(&info);
        profile.description = info.str_field("longBusinessSummary");
        // Funds have no sector taxonomy; carry the instrument kind so
        // the column is still meaningful downstream.
        profile.sector = info
            .str_field("sector")
            .or_else(|| is_fund.then(|| profile.quote_type.clone()).flatten());
        profile.industry = info
            .str_field("industry")
            .or_else(|| is_fund.then(|| profile.quote_type.clone()).flatten());
        profile.website = info.str_field("website");
        profile.beta = info.f64_field("beta").or_else(|| info.f64_field("beta3Year"));
        profile.payout_ratio = info.f64_field("payoutRatio");
        profile.dividend_rate = info.f64_field("dividendRate");
        profile.dividend_yield = info
            .f64_field("dividendYield")
            .or_else(|| info.f64_field("yield"));
        // Funds report their size as total assets, not market cap.
        profile.market_cap = if is_fund {
            info.f64_field("totalAssets")
                .or_else(|| info.f64_field("marketCap"))
        } else {
            info.f64_field("marketCap")
        };
        profile.volume = info
            .u64_field("volume")
            .or_else(|| info.u64_field("regularMarketVolume"));
        profile.address = CompanyAddress {
            street: info.str_field("address1"),
            city: info.str_field("city"),
            state: info.str_field("state"),
            zip: info.str_field("zip"),
            country: info.str_field("country"),
        };
        profile.full_time_employees = info.i64_field("fullTimeEmployees");
        profile.ceos = extract_ceos(&info);
        profile.ipo_date = ipo_date(&info);
        profile.fund_family = info.str_field("fundFamily");
        Ok(profile)
    }

    /// Valuation and profitability metrics, info-first with statement
    /// fallbacks. Funds only carry price summaries and fund fields.
    pub fn extract_fundamentals(&self) -> Result<FundamentalsRecord> {
        let info = self.fetcher.info(&self.ticker)?;
        let quote_type = info
            .str_field("quoteType")
            .unwrap_or_default()
            .to_ascii_uppercase();
        let is_fund = matches!(quote_type.as_str(), "ETF" | "MUTUALFUND");

        let mut record = FundamentalsRecord::new(&self.ticker, self.metadata());
        record.currency = currency_of(&info);

        record.day = PriceBar {
            open: info
                .f64_field("open")
                .or_else(|| info.f64_field("regularMarketOpen")),
            high: info
                .f64_field("dayHigh")
                .or_else(|| info.f64_field("regularMarketDayHigh")),
            low: info
                .f64_field("dayLow")
                .or_else(|| info.f64_field("regularMarketDayLow")),
            close: info
                .f64_field("currentPrice")
                .or_else(|| info.f64_field("regularMarketPrice"))
                .or_else(|| info.f64_field("previousClose")),
            ..Default::default()
        };
        record.one_year = PriceBar {
            high: info.f64_field("fiftyTwoWeekHigh"),
            low: info.f64_field("fiftyTwoWeekLow"),
            ..Default::default()
        };

        record.trailing_pe = info.f64_field("trailingPE");
        record.forward_pe = info.f64_field("forwardPE");
        record.trailing_eps = info.f64_field("trailingEps");
        record.forward_eps = info.f64_field("forwardEps");
        record.nav_price = info.f64_field("navPrice");
        record.dist_yield = info.f64_field("yield");
        record.expense_ratio = info
            .f64_field("annualReportExpenseRatio")
            .or_else(|| info.f64_field("netExpenseRatio"));

        if is_fund {
            return Ok(record);
        }

        record.peg = info
            .f64_field("trailingPegRatio")
            .or_else(|| info.f64_field("pegRatio"))
            .or_else(|| implied_peg(&info));
        record.price_to_book = info.f64_field("priceToBook").or_else(|| {
            ratio(record.day.close, info.f64_field("bookValue"))
        });
        record.gross_margin = info.f64_field("grossMargins");
        record.operating_margin = info.f64_field("operatingMargins");
        record.profit_margin = info.f64_field("profitMargins");
        record.return_on_equity = info.f64_field("returnOnEquity");
        record.return_on_assets = info.f64_field("returnOnAssets");
        record.debt_to_equity = info.f64_field("debtToEquity");
        record.price_to_sales = info.f64_field("priceToSalesTrailing12Months");
        record.ev_ebitda = info.f64_field("enterpriseToEbitda");
        record.free_cash_flow_per_share = ratio(
            info.f64_field("freeCashflow"),
            info.f64_field("sharesOutstanding"),
        );

        let needs_statements = record.price_to_sales.is_none()
            || record.ev_ebitda.is_none()
            || record.gross_margin.is_none()
            || record.operating_margin.is_none()
            || record.profit_margin.is_none()
            || record.return_on_equity.is_none()
            || record.return_on_assets.is_none()
            || record.debt_to_equity.is_none()
            || record.free_cash_flow_per_share.is_none();
        if needs_statements {
            self.fill_from_statements(&info, &mut record);
        }

        Ok(record)
    }

    fn fill_from_statements(&self, info: &InfoBlob, record: &mut FundamentalsRecord) {
        let income = self.statement_or_empty(Fetcher::income_statement, "income statement");
        let balance = self.statement_or_empty(Fetcher::balance_sheet, "balance sheet");
        let cash = self.statement_or_empty(Fetcher::cash_flow, "cash flow");

        let revenue = income.latest(&REVENUE_ROWS);
        let net_income = income.latest(&NET_INCOME_ROWS);
        let equity = balance.latest(&EQUITY_ROWS);

        if record.price_to_sales.is_none() {
            record.price_to_sales = ratio(info.f64_field("marketCap"), revenue);
        }
        if record.ev_ebitda.is_none() {
            record.ev_ebitda = ratio(info.f64_field("enterpriseValue"), income.latest(&EBITDA_ROWS));
        }
        if record.gross_margin.is_none() {
            record.gross_margin = ratio(income.latest(&["Gross Profit"]), revenue);
        }
        if record.operating_margin.is_none() {
            record.operating_margin = ratio(income.latest(&["Operating Income"]), revenue);
        }
        if record.profit_margin.is_none() {
            record.profit_margin = ratio(net_income, revenue);
        }
        if record.return_on_equity.is_none() {
            record.return_on_equity = ratio(net_income, equity);
        }
        if record.return_on_assets.is_none() {
            record.return_on_assets = ratio(net_income, balance.latest(&["Total Assets"]));
        }
        if record.debt_to_equity.is_none() {
            record.debt_to_equity = ratio(balance.latest(&["Total Debt"]), equity);
        }
        if record.free_cash_flow_per_share.is_none() {
            // Capital expenditure is reported negative; adding it to
            // operating cash flow yields free cash flow.
            let fcf = match (cash.latest(&OCF_ROWS), cash.latest(&["Capital Expenditure"])) {
                (Some(ocf), Some(capex)) => Some(ocf + capex),
                (Some(ocf), None) => Some(ocf),
                _ => None,
            };
            record.free_cash_flow_per_share =
                ratio(fcf, info.f64_field("sharesOutstanding"));
        }
    }

    fn statement_or_empty(
        &self,
        fetch: fn(&Fetcher<'a, P>, &str) -> Result<StatementTable>,
        what: &str,
    ) -> StatementTable {
        match fetch(&self.fetcher, &self.ticker) {
            Ok(table) => table,
            Err(e) => {
                eprintln!("{what} unavailable for {}: {e}", self.ticker);
                StatementTable::default()
            }
        }
    }
}

fn currency_of(info: &InfoBlob) -> Option<String> {
    info.str_field("currency")
        .or_else(|| info.str_field("financialCurrency"))
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

/// PEG from trailing P/E and a growth estimate when the provider does
/// not report one. Candidates must be positive; quarterly earnings
/// growth is preferred, revenue growth is the backup, and both are
/// annualized the same way.
fn implied_peg(info: &InfoBlob) -> Option<f64> {
    let pe = info.f64_field("trailingPE")?;
    let growth = info
        .f64_field("earningsQuarterlyGrowth")
        .filter(|g| *g > 0.0)
        .or_else(|| info.f64_field("revenueGrowth").filter(|g| *g > 0.0))
        .map(annualize_growth)?;
    Some(pe / (growth * 100.0))
}

/// Compound a quarterly rate to annual. Rates of 100% or more are
/// taken to be annual already.
fn annualize_growth(g: f64) -> f64 {
    if g < 1.0 {
        (1.0 + g).powi(4) - 1.0
    } else {
        g
    }
}

fn ipo_date(info: &InfoBlob) -> Option<chrono::NaiveDate> {
    let epoch_secs = info
        .i64_field("firstTradeDateEpochUtc")
        .or_else(|| info.i64_field("firstTradeDateMilliseconds").map(|ms| ms / 1000))?;
    chrono::DateTime::from_timestamp(epoch_secs, 0).map(|dt| dt.naive_utc().date())
}

fn extract_ceos(info: &InfoBlob) -> Vec<CompanyOfficer> {
    let mut ceos: Vec<CompanyOfficer> = Vec::new();

    for list_key in ["companyOfficers", "executiveTeam"] {
        if !ceos.is_empty() {
            break;
        }
        let Some(officers) = info.list_field(list_key) else {
            continue;
        };
        for officer in officers {
            let Some(obj) = officer.as_object() else {
                continue;
            };
            let title = obj
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let lower = title.to_ascii_lowercase();
            if !lower.contains("ceo") && !lower.contains("chief executive officer") {
                continue;
            }
            let name = obj
                .get("name")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            if name.is_some() {
                ceos.push(CompanyOfficer {
                    name,
                    title: Some(title.to_string()),
                    year_born: obj.get("yearBorn").and_then(Value::as_i64),
                });
            }
        }
    }

    // Last resort: scrape the business summary.
    if ceos.is_empty() {
        if let Some(summary) = info.str_field("longBusinessSummary") {
            for caps in ceo_pattern().captures_iter(&summary) {
                if let Some(name) = caps.get(1) {
                    ceos.push(CompanyOfficer {
                        name: Some(name.as_str().trim().to_string()),
                        title: Some("CEO".to_string()),
                        year_born: None,
                    });
                }
            }
        }
    }

    dedup_by_name(ceos)
}

fn ceo_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:CEO|[Cc]hief [Ee]xecutive [Oo]fficer)[,:\s]+([A-Z][\w.'-]+(?:\s+[A-Z][\w.'-]+){0,3})",
        )
        .unwrap()
    })
}

fn dedup_by_name(officers: Vec<CompanyOfficer>) -> Vec<CompanyOfficer> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for officer in officers {
        let Some(name) = officer.name.clone() else {
            continue;
        };
        let key = name.to_ascii_lowercase();
        if !seen.contains(&key) {
            seen.push(key);
            out.push(officer);
        }
    }
    out
}
