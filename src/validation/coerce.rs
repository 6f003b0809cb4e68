//! Type coercion of raw, untrusted parameters.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use serde_json::Value;

use super::{FieldError, ValidationError};

/// Untyped parameters as they arrive: every key maps to one or more strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawParams {
    values: BTreeMap<String, Vec<String>>,
    /// Keys that carried an array or object in a JSON body.
    nested: BTreeSet<String>,
}

impl RawParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect query-string pairs; repeated keys accumulate.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::new();
        for (key, value) in pairs {
            params.push(key, value);
        }
        params
    }

    /// Parse a raw `a=1&b=2` query string.
    pub fn from_query(query: &str) -> Self {
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()).into_owned())
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_default().push(value.into());
    }

    /// Add a JSON body value. Scalars are stored in their string form so the
    /// same coercion applies as for query strings; `null` counts as absent.
    pub fn push_json(&mut self, key: &str, value: &Value) {
        match value {
            Value::Null => {}
            Value::String(s) => self.push(key, s.clone()),
            Value::Bool(b) => self.push(key, b.to_string()),
            Value::Number(n) => self.push(key, n.to_string()),
            Value::Array(_) | Value::Object(_) => {
                self.nested.insert(key.to_string());
            }
        }
    }

    /// Copy the keys of `other` that are not already present here.
    pub fn merge_missing(&mut self, other: RawParams) {
        for (key, values) in other.values {
            if !self.contains(&key) {
                self.values.insert(key, values);
            }
        }
        for key in other.nested {
            if !self.contains(&key) {
                self.nested.insert(key);
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key) || self.nested.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.nested.is_empty()
    }
}

/// Reads typed values out of [`RawParams`], accumulating every failure.
#[derive(Debug)]
pub struct Coercer<'a> {
    object_name: &'static str,
    params: &'a RawParams,
    errors: Vec<FieldError>,
}

impl<'a> Coercer<'a> {
    pub fn new(object_name: &'static str, params: &'a RawParams) -> Self {
        Self {
            object_name,
            params,
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// The single raw value under `key`, or a type error for arrays and objects.
    fn scalar(&mut self, key: &str) -> Option<&'a str> {
        let params = self.params;
        if params.nested.contains(key) {
            self.fail(key, "must be a scalar value");
            return None;
        }
        match params.values.get(key).map(Vec::as_slice) {
            None | Some([]) => None,
            Some([value]) => Some(value.as_str()),
            Some(_) => {
                self.fail(key, "must be a single value");
                None
            }
        }
    }

    pub fn string(&mut self, key: &str) -> Option<String> {
        self.scalar(key).map(str::to_string)
    }

    pub fn required_string(&mut self, key: &str) -> Option<String> {
        let value = self.string(key);
        if value.is_none() && !self.params.contains(key) {
            self.fail(key, "is required");
        }
        value
    }

    /// An integer within `[min, max]` (inclusive), converted into `T`.
    pub fn integer<T>(&mut self, key: &str, min: i64, max: Option<i64>) -> Option<T>
    where
        T: TryFrom<i64>,
    {
        let raw = self.scalar(key)?;
        let Some(value) = parse_integer(raw) else {
            self.fail(key, "must be integer");
            return None;
        };

        let out_of_range = value < min || max.is_some_and(|max| value > max);
        if out_of_range {
            let message = match max {
                Some(max) => format!("must be >= {} and <= {}", min, max),
                None => format!("must be >= {}", min),
            };
            self.fail(key, message);
            return None;
        }

        match T::try_from(value) {
            Ok(v) => Some(v),
            Err(_) => {
                self.fail(key, "is out of range");
                None
            }
        }
    }

    pub fn boolean(&mut self, key: &str) -> Option<bool> {
        match self.scalar(key)? {
            "true" => Some(true),
            "false" => Some(false),
            _ => {
                self.fail(key, "must be boolean");
                None
            }
        }
    }

    /// One of the listed enum names, parsed into `T`.
    pub fn one_of<T>(&mut self, key: &str, allowed: &[&str]) -> Option<T>
    where
        T: FromStr,
    {
        let raw = self.scalar(key)?;
        match raw.parse::<T>() {
            Ok(v) if allowed.contains(&raw) => Some(v),
            _ => {
                self.fail(key, format!("must be equal to one of the allowed values: {}", allowed.join(", ")));
                None
            }
        }
    }

    /// Record a failure found by the caller's own checks.
    pub fn reject(&mut self, key: &str, message: impl Into<String>) {
        self.fail(key, message);
    }

    pub fn finish(self) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                object_name: self.object_name,
                errors: self.errors,
            })
        }
    }
}

/// Integral numbers written in float form (`404.0`, `4e2`) count as integers.
fn parse_integer(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().or_else(|| {
        let value = raw.parse::<f64>().ok()?;
        let integral = value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64;
        integral.then_some(value as i64)
    })
}
