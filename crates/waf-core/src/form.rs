//! Builder for form bodies and query strings.
//!
//! Legacy endpoints take every business field as a form value; optional
//! inputs are simply left out rather than sent empty.

use std::fmt::Display;

/// Ordered collection of form or query pairs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormParams {
    pairs: Vec<(&'static str, String)>,
}

impl FormParams {
    /// Create a new, empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Append a required key/value pair.
    pub fn push<T>(&mut self, key: &'static str, value: T)
    where
        T: Display,
    {
        self.pairs.push((key, value.to_string()));
    }

    /// Append a key/value pair when the value is present.
    pub fn push_opt<T>(&mut self, key: &'static str, value: Option<T>)
    where
        T: Display,
    {
        if let Some(value) = value {
            self.pairs.push((key, value.to_string()));
        }
    }

    /// Append using a mapping function when the value is present.
    pub fn push_opt_with<T, F>(&mut self, key: &'static str, value: Option<T>, mut map: F)
    where
        F: FnMut(T) -> String,
    {
        if let Some(value) = value {
            self.pairs.push((key, map(value)));
        }
    }

    /// Append a boolean in the `true`/`false` spelling the legacy API expects.
    pub fn push_bool(&mut self, key: &'static str, value: Option<bool>) {
        self.push_opt_with(key, value, |flag| flag.to_string());
    }

    /// Borrow the collected pairs.
    #[must_use]
    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.pairs
    }

    /// Look up the first value recorded for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Return the collected key/value pairs.
    #[must_use]
    pub fn into_pairs(self) -> Vec<(&'static str, String)> {
        self.pairs
    }

    /// Returns true if no parameters have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
