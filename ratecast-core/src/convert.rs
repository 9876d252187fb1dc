//! Typed accessors over loosely-typed provider payloads.
//!
//! The provider's "info" blob is a flat JSON object whose values arrive
//! as numbers, numeric strings, nulls, or garbage depending on the
//! instrument. These accessors preserve the "missing is not zero"
//! contract: a field that cannot be coerced is `None`, never a default
//! smuggled in as data.

use serde_json::{Map, Value};

/// Flat key-value description blob returned by the data provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoBlob(Map<String, Value>);

impl InfoBlob {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// An info blob with fewer than 5 keys is treated as no info at all.
    pub fn is_plausible(&self) -> bool {
        self.0.len() >= 5
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<String> {
        match self.0.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    /// Numeric field; accepts a JSON number or a numeric string.
    /// NaN and infinities are treated as missing.
    pub fn f64_field(&self, key: &str) -> Option<f64> {
        coerce_f64(self.0.get(key)?)
    }

    pub fn i64_field(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s
                .parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64)),
            _ => None,
        }
    }

    pub fn u64_field(&self, key: &str) -> Option<u64> {
        self.i64_field(key).and_then(|v| u64::try_from(v).ok())
    }

    pub fn list_field(&self, key: &str) -> Option<&Vec<Value>> {
        match self.0.get(key) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        }
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Best-effort float coercion with a caller-supplied default.
pub fn safe_f64(value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => default,
    }
}

/// Best-effort integer coercion with a caller-supplied default.
pub fn safe_i64(value: Option<i64>, default: i64) -> i64 {
    value.unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn blob(value: Value) -> InfoBlob {
        InfoBlob::from_value(value).unwrap()
    }

    #[test]
    fn str_field_skips_empty_strings() {
        let info = blob(json!({"exchange": "CCY", "sector": ""}));
        assert_eq!(info.str_field("exchange").as_deref(), Some("CCY"));
        assert_eq!(info.str_field("sector"), None);
        assert_eq!(info.str_field("missing"), None);
    }

    #[test]
    fn f64_field_accepts_numeric_strings() {
        let info = blob(json!({"beta": "1.23", "pe": 18.5, "junk": [1]}));
        assert_eq!(info.f64_field("beta"), Some(1.23));
        assert_eq!(info.f64_field("pe"), Some(18.5));
        assert_eq!(info.f64_field("junk"), None);
    }

    #[test]
    fn f64_field_rejects_non_finite() {
        let info = blob(json!({"x": "NaN", "y": "inf"}));
        assert_eq!(info.f64_field("x"), None);
        assert_eq!(info.f64_field("y"), None);
    }

    #[test]
    fn i64_field_truncates_floats() {
        let info = blob(json!({"employees": 1523.0, "volume": "88000"}));
        assert_eq!(info.i64_field("employees"), Some(1523));
        assert_eq!(info.u64_field("volume"), Some(88_000));
    }

    #[test]
    fn plausibility_threshold_is_five_keys() {
        let small = blob(json!({"a": 1, "b": 2, "c": 3, "d": 4}));
        assert!(!small.is_plausible());
        let ok = blob(json!({"a": 1, "b": 2, "c": 3, "d": 4, "e": 5}));
        assert!(ok.is_plausible());
    }

    #[test]
    fn safe_defaults_apply_only_when_missing() {
        assert_eq!(safe_f64(Some(2.5), 0.0), 2.5);
        assert_eq!(safe_f64(Some(f64::NAN), 0.0), 0.0);
        assert_eq!(safe_f64(None, 0.0), 0.0);
        assert_eq!(safe_i64(None, 7), 7);
    }
}
