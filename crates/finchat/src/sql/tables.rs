use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

lazy_static! {
    static ref TABLE_REF: Regex = Regex::new(
        r#"(?i)\b(?:from|join)\s+("[^"]+"|`[^`]+`|\[[^\]]+\]|[A-Za-z_][\w.]*)"#
    )
    .unwrap();
}

/// Table names following `FROM` / `JOIN`, for telemetry only.
///
/// Heuristic: subqueries, CTE names and keywords inside quoted identifiers are not understood.
pub fn referenced_tables(sql: &str) -> BTreeSet<String> {
    TABLE_REF
        .captures_iter(sql)
        .map(|captures| {
            captures[1]
                .trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'))
                .to_string()
        })
        .collect()
}
