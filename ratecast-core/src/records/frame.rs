//! DataFrame and Parquet helpers shared by the record types.
//!
//! Parquet writes are atomic: write to a `.tmp` sibling, then rename
//! into place.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use serde_json::Value;

use crate::error::{Error, Result};

/// Days since the Unix epoch, for polars `Date` columns.
pub(crate) fn date_to_days(date: NaiveDate) -> i32 {
    (date - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days() as i32
}

/// Build a `Date`-typed column from optional dates.
pub(crate) fn date_column(name: &str, dates: Vec<Option<NaiveDate>>) -> Result<Column> {
    let days: Vec<Option<i32>> = dates.into_iter().map(|d| d.map(date_to_days)).collect();
    Column::new(name.into(), days)
        .cast(&DataType::Date)
        .map_err(|e| Error::Parquet(format!("date cast: {e}")))
}

/// Write a DataFrame to a Parquet file, creating parent directories.
pub(crate) fn write_parquet_file(df: &DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Parquet(format!("create {}: {e}", parent.display())))?;
    }

    let tmp_path = path.with_extension("parquet.tmp");
    let file = fs::File::create(&tmp_path)
        .map_err(|e| Error::Parquet(format!("create {}: {e}", tmp_path.display())))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| Error::Parquet(format!("write parquet: {e}")))?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        Error::Parquet(format!("atomic rename failed: {e}"))
    })
}

/// Flatten a serialized record into `(column, value)` pairs.
///
/// Nested objects are inlined with `_`-joined keys, arrays are embedded
/// as JSON strings, and nulls and empty strings are skipped so absent
/// fields never materialize as columns.
pub(crate) fn flatten_record(value: &Value) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    if let Value::Object(map) = value {
        for (key, v) in map {
            flatten_into(key, v, &mut out);
        }
    }
    out
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Null => {}
        Value::String(s) if s.is_empty() => {}
        Value::Object(map) => {
            for (key, v) in map {
                flatten_into(&format!("{prefix}_{key}"), v, out);
            }
        }
        Value::Array(items) => {
            if !items.is_empty() {
                let embedded = serde_json::to_string(items).unwrap_or_default();
                out.push((prefix.to_string(), Value::String(embedded)));
            }
        }
        other => out.push((prefix.to_string(), other.clone())),
    }
}

/// Build a single-row DataFrame from flattened `(column, value)` pairs.
pub(crate) fn single_row_dataframe(columns: Vec<(String, Value)>) -> Result<DataFrame> {
    let mut cols = Vec::with_capacity(columns.len());
    for (name, value) in columns {
        let col = match value {
            Value::String(s) => Column::new(name.into(), vec![s]),
            Value::Bool(b) => Column::new(name.into(), vec![b]),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Column::new(name.into(), vec![i])
                } else {
                    Column::new(name.into(), vec![n.as_f64().unwrap_or(f64::NAN)])
                }
            }
            other => Column::new(name.into(), vec![other.to_string()]),
        };
        cols.push(col);
    }
    DataFrame::new(cols).map_err(|e| Error::Parquet(format!("dataframe creation: {e}")))
}
