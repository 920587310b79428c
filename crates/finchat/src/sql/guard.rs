use lazy_static::lazy_static;
use regex::Regex;
use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

use super::params::PLACEHOLDER;
use crate::errors::{ToolError, ToolResult};

lazy_static! {
    static ref DENYLIST: Regex = Regex::new(
        r"(?i)\b(insert|update|delete|drop|alter|truncate|replace|attach|detach|vacuum|pragma)\b"
    )
    .unwrap();
    // sqlparser has no GLOB operator; LIKE has the same shape for the statement-type check
    static ref GLOB_OPERATOR: Regex = Regex::new(r"(?i)\bglob\b").unwrap();
}

const MULTIPLE_STATEMENTS: &str = "Multiple SQL statements are not allowed.";
const READ_ONLY: &str = "Only read-only SELECT queries are allowed.";
const SELECT_ONLY: &str = "Only SELECT queries are allowed.";

/// Check that `sql` is a single read-only SELECT statement.
///
/// Returns the input unchanged on success. Checks run cheapest first: statement separators,
/// then the keyword denylist, then a full parse of the statement type.
pub fn validate(sql: &str) -> ToolResult<&str> {
    if sql.trim().trim_end_matches(';').contains(';') {
        return Err(ToolError::UnsafeQuery(MULTIPLE_STATEMENTS.to_string()));
    }

    if DENYLIST.is_match(sql) {
        return Err(ToolError::UnsafeQuery(READ_ONLY.to_string()));
    }

    // Named placeholders are swapped for `?` so the parser sees a plain parameter
    let parseable = PLACEHOLDER.replace_all(sql, "${lead}?");
    let parseable = GLOB_OPERATOR.replace_all(&parseable, "LIKE");
    let statements = Parser::parse_sql(&SQLiteDialect {}, &parseable)
        .map_err(|e| ToolError::UnsafeQuery(format!("{} ({})", SELECT_ONLY, e)))?;

    match statements.as_slice() {
        [Statement::Query(query)] if is_select(&query.body) => Ok(sql),
        [_] | [] => Err(ToolError::UnsafeQuery(SELECT_ONLY.to_string())),
        _ => Err(ToolError::UnsafeQuery(MULTIPLE_STATEMENTS.to_string())),
    }
}

fn is_select(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(_) => true,
        SetExpr::Query(query) => is_select(&query.body),
        SetExpr::SetOperation { left, right, .. } => is_select(left) && is_select(right),
        _ => false,
    }
}
