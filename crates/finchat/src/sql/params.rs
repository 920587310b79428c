use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use crate::context::Context;

lazy_static! {
    /// A colon followed by a word, not part of a `::` cast
    pub(crate) static ref PLACEHOLDER: Regex =
        Regex::new(r"(?P<lead>^|[^:\w]):(?P<name>[A-Za-z_]\w*)").unwrap();
}

/// Binding names models commonly use instead of the context key
const ALIASES: &[(&str, &str)] = &[
    ("yr", "year"),
    ("yy", "year"),
    ("yyyy", "year"),
    ("q", "quarter"),
    ("qtr", "quarter"),
    ("mon", "month"),
    ("mm", "month"),
];

fn canonical_name(name: &str) -> Option<&'static str> {
    let lowered = name.to_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, canonical)| *canonical)
}

/// Named placeholders referenced by `sql`, in order of first appearance, without the colon
pub fn placeholders(sql: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for captures in PLACEHOLDER.captures_iter(sql) {
        let name = &captures["name"];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

fn lookup_ci<'a>(map: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

/// Fill in the placeholders of `sql` the model did not bind itself.
///
/// Supplied parameters always win and are never changed (a leading `:`, `@` or `$` on a
/// supplied key is dropped). For each remaining placeholder the lookup order is: a supplied key
/// differing only in case, the context key of the same name, then the alias table against the
/// supplied parameters and the context. Anything still missing is left out of the result so the
/// gateway rejects it at bind time. Resolved values are keyed by the placeholder as written.
pub fn resolve(sql: &str, supplied: &Map<String, Value>, context: &Context) -> Map<String, Value> {
    let supplied: Map<String, Value> = supplied
        .iter()
        .map(|(key, value)| {
            (
                key.trim_start_matches([':', '@', '$']).to_string(),
                value.clone(),
            )
        })
        .collect();
    let mut resolved = supplied.clone();

    for name in placeholders(sql) {
        if resolved.contains_key(&name) {
            continue;
        }

        let value = lookup_ci(&supplied, &name)
            .or_else(|| context.get(&name))
            .or_else(|| {
                let canonical = canonical_name(&name)?;
                lookup_ci(&supplied, canonical).or_else(|| context.get(canonical))
            });

        match value {
            Some(value) => {
                resolved.insert(name, value.clone());
            }
            None => tracing::debug!(placeholder = %name, "placeholder left unresolved"),
        }
    }

    resolved
}
