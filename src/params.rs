//! Read-only views over path, query, and form parameters.
//!
//! Path parameters are single-valued; query and form parameters may repeat.
//! The typed accessors parse on demand and wrap a parse failure together with
//! the offending raw value, so the caller can decide which status it maps to.

use std::collections::HashMap;

use crate::error::Error;

fn parse_int(raw: &str) -> Result<i64, Error> {
    raw.parse::<i64>()
        .map_err(|e| Error::internal(format!("failed to parse '{raw}' to int: {e}")))
}

// Accepts the usual truthy/falsy spellings, not just `true`/`false`.
fn parse_bool(raw: &str) -> Result<bool, Error> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Ok(true),
        "0" | "f" | "false" => Ok(false),
        _ => Err(Error::internal(format!("failed to parse '{raw}' to bool"))),
    }
}

// ── PathParams ────────────────────────────────────────────────────────────────

/// Parameters matched out of the request path, e.g. `{id}` in `/users/{id}`.
#[derive(Debug, Default)]
pub struct PathParams(HashMap<String, String>);

impl PathParams {
    pub(crate) fn new(params: HashMap<String, String>) -> Self {
        Self(params)
    }

    /// The raw value for `key`, or the empty string when absent.
    pub fn string(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or("")
    }

    /// The value for `key` parsed as an integer.
    pub fn int(&self, key: &str) -> Result<i64, Error> {
        parse_int(self.string(key))
    }

    /// The value for `key` parsed as a bool.
    pub fn bool(&self, key: &str) -> Result<bool, Error> {
        parse_bool(self.string(key))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ── ValueParams ───────────────────────────────────────────────────────────────

/// Multi-valued parameters, as found in query strings and form bodies.
#[derive(Debug, Default)]
pub struct ValueParams {
    vals: HashMap<String, Vec<String>>,
}

impl ValueParams {
    pub(crate) fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut vals: HashMap<String, Vec<String>> = HashMap::new();
        for (k, v) in pairs {
            vals.entry(k).or_default().push(v);
        }
        Self { vals }
    }

    pub(crate) fn push(&mut self, key: String, val: String) {
        self.vals.entry(key).or_default().push(val);
    }

    /// The first value for `key`, or the empty string when absent.
    pub fn string(&self, key: &str) -> &str {
        self.vals
            .get(key)
            .and_then(|v| v.first())
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Every value for `key`, in the order they appeared.
    pub fn strings(&self, key: &str) -> &[String] {
        self.vals.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The first value for `key` parsed as an integer.
    pub fn int(&self, key: &str) -> Result<i64, Error> {
        parse_int(self.string(key))
    }

    /// Every value for `key` parsed as an integer.
    pub fn ints(&self, key: &str) -> Result<Vec<i64>, Error> {
        self.strings(key).iter().map(|s| parse_int(s)).collect()
    }

    /// The first value for `key` parsed as a bool.
    pub fn bool(&self, key: &str) -> Result<bool, Error> {
        parse_bool(self.string(key))
    }

    /// Every value for `key` parsed as a bool.
    pub fn bools(&self, key: &str) -> Result<Vec<bool>, Error> {
        self.strings(key).iter().map(|s| parse_bool(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_params(pairs: &[(&str, &str)]) -> PathParams {
        PathParams::new(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        )
    }

    #[test]
    fn path_params_typed_access() {
        let p = path_params(&[("id", "42"), ("active", "true")]);
        assert_eq!(p.string("id"), "42");
        assert_eq!(p.int("id").unwrap(), 42);
        assert!(p.bool("active").unwrap());
    }

    #[test]
    fn path_params_absent_key_is_empty_string() {
        let p = path_params(&[]);
        assert_eq!(p.string("missing"), "");
    }

    #[test]
    fn path_params_parse_failure_names_raw_value() {
        let p = path_params(&[("id", "abc")]);
        let err = p.int("id").unwrap_err();
        assert!(err.to_string().contains("'abc'"), "got: {err}");
    }

    #[test]
    fn value_params_multi_valued() {
        let p = ValueParams::from_pairs([
            ("a".to_owned(), "1".to_owned()),
            ("a".to_owned(), "2".to_owned()),
            ("b".to_owned(), "t".to_owned()),
        ]);
        assert_eq!(p.string("a"), "1");
        assert_eq!(p.strings("a"), &["1".to_owned(), "2".to_owned()]);
        assert_eq!(p.ints("a").unwrap(), vec![1, 2]);
        assert!(p.bool("b").unwrap());
        assert!(p.bools("a").is_err());
    }

    #[test]
    fn value_params_absent_key() {
        let p = ValueParams::default();
        assert_eq!(p.string("x"), "");
        assert!(p.strings("x").is_empty());
        assert_eq!(p.ints("x").unwrap(), Vec::<i64>::new());
    }
}
