//! The value and header model queries are built from.
//!
//! A `Header` is the unordered mapping from uppercase observation parameter
//! names (`INSTRUME`, `DATE-OBS`, ...) to `Value`s that `choose()` is driven
//! by. String comparisons are case-insensitive except where a component
//! documents otherwise (matcher compilation lower-cases both sides; a
//! `UseAfter` timestamp is never case-folded because it isn't a string key).

use fnv::FnvHashMap;
use std::fmt;

/// The sentinel substituted for a parameter absent from the header during
/// winnowing (see §4.4 of the governing design).
pub const NOT_PRESENT: &str = "NOT PRESENT";

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Num(f64),
}

impl Value {
    pub fn as_str(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Num(n) => format_num(*n),
        }
    }

    /// Parses the value as a float, the way a numeric-parameter header value
    /// ("a string parseable as a number") is coerced for inequality matchers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Str(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Case-insensitive string equality, the default comparison for header
    /// values.
    pub fn eq_ignore_case(&self, other: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

fn format_num(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// The header supplied to `best_references`/`choose`: an unordered map from
/// uppercase parameter name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    fields: FnvHashMap<String, Value>,
}

impl Header {
    pub fn new() -> Self {
        Header { fields: FnvHashMap::default() }
    }

    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) -> &mut Self {
        self.fields.insert(key.into().to_uppercase(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(&key.to_uppercase())
    }

    /// Returns the header's string form of `key`, or the `NOT_PRESENT`
    /// sentinel if the key is absent — the lookup winnowing always uses.
    pub fn get_or_not_present(&self, key: &str) -> String {
        self.get(key).map(Value::as_str).unwrap_or_else(|| NOT_PRESENT.to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(&key.to_uppercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

impl FromIterator<(String, Value)> for Header {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut h = Header::new();
        for (k, v) in iter {
            h.insert(k, v);
        }
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_case_insensitive_on_keys() {
        let mut h = Header::new();
        h.insert("instrume", "ACS");
        assert_eq!(h.get("INSTRUME").unwrap().as_str(), "ACS");
    }

    #[test]
    fn missing_key_is_not_present_sentinel() {
        let h = Header::new();
        assert_eq!(h.get_or_not_present("FOO"), NOT_PRESENT);
    }

    #[test]
    fn numeric_value_parses_as_f64() {
        let v = Value::from("1.25");
        assert_eq!(v.as_f64(), Some(1.25));
    }
}
