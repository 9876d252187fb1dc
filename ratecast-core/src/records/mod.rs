//! Exportable record model.
//!
//! Every record exposes the same capability contract: an emptiness
//! predicate, a flatten-to-tabular operation (a polars `DataFrame`),
//! and serialization to human-readable JSON. Parquet export is
//! per-type because the partition layout varies — plain file,
//! partitioned by pair, or partitioned by pair and year.

mod bar;
mod frame;
mod fx;
mod metadata;
mod stock;

pub use bar::PriceBar;
pub use fx::{
    CalculationRecord, ConversionRateSeries, ForecastRecord, FxFundamentalsRecord, FxPriceRecord,
    FxProfileRecord,
};
pub use metadata::Metadata;
pub use stock::{
    CompanyAddress, CompanyOfficer, CompanyProfileRecord, DividendRecord, FundamentalsRecord,
    PriceSeries,
};

use std::fs;
use std::path::Path;

use polars::prelude::DataFrame;
use serde::Serialize;

use crate::error::{Error, Result};

/// Shared export contract implemented by every record type.
///
/// Static polymorphism only — callers always know the concrete type.
pub trait Exportable: Serialize {
    /// True when the record carries no meaningful payload. Empty
    /// records are skipped by the Parquet writers.
    fn is_empty(&self) -> bool;

    /// Flatten the record into tabular rows.
    fn to_dataframe(&self) -> Result<DataFrame>;

    /// Pretty JSON with 4-space indentation and declaration-order fields.
    fn to_json(&self) -> Result<String> {
        to_pretty_json(self)
    }

    /// Write the JSON rendering to `path`.
    fn write_json(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| Error::Export(format!("write {}: {e}", path.display())))
    }
}

/// Serialize any value as pretty JSON with a 4-space indent.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut ser)
        .map_err(|e| Error::Export(format!("json serialization: {e}")))?;
    String::from_utf8(buf).map_err(|e| Error::Export(format!("json encoding: {e}")))
}
