use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Scalar values usable to bind SQL placeholders, keyed case-insensitively.
///
/// Keys are stored lowercased. Only scalars (strings, numbers, booleans, null) are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    values: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a caller-supplied JSON object, dropping non-scalar values
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut context = Self::new();
        for (key, value) in map {
            context.insert(key, value);
        }
        context
    }

    /// Insert a scalar value. Returns false (and stores nothing) for arrays and objects.
    pub fn insert<K: AsRef<str>>(&mut self, key: K, value: Value) -> bool {
        if value.is_array() || value.is_object() {
            tracing::debug!(key = key.as_ref(), "ignoring non-scalar context value");
            return false;
        }
        self.values.insert(key.as_ref().to_lowercase(), value);
        true
    }

    pub fn with<K: AsRef<str>>(mut self, key: K, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    /// Case-insensitive lookup
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(&key.to_lowercase())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// The effective context of an interaction: these values plus temporal defaults for `today`.
    /// Caller-supplied keys win over the defaults.
    pub fn effective(&self, today: NaiveDate) -> Self {
        let mut effective = Self::new()
            .with("today", Value::from(today.format("%Y-%m-%d").to_string()))
            .with("current_year", Value::from(today.year()))
            .with("current_quarter", Value::from(today.month0() / 3 + 1))
            .with("current_month", Value::from(today.month()));
        for (key, value) in &self.values {
            effective.values.insert(key.clone(), value.clone());
        }
        effective
    }

    /// `effective` for the local calendar date
    pub fn effective_now(&self) -> Self {
        self.effective(Local::now().date_naive())
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}
