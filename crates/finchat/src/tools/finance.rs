use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::ToolRegistry;
use crate::db::{quote_identifier, ReadGateway, TableFilter};
use crate::errors::{ToolError, ToolResult};
use crate::models::tool::Tool;
use crate::sql;

pub const LIST_TABLES: &str = "tool_list_tables";
pub const DESCRIBE_TABLE: &str = "tool_describe_table";
pub const RUN_SQL: &str = "tool_run_sql";
pub const SAMPLE_ROWS: &str = "tool_sample_rows";
pub const DISTINCT_VALUES: &str = "tool_distinct_values";

const DEFAULT_SAMPLE_ROWS: usize = 5;
const DEFAULT_DISTINCT_VALUES: usize = 100;

/// The read-only database tools, backed by `gateway`
pub fn registry(gateway: Arc<ReadGateway>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    let db = gateway.clone();
    registry.register(
        Tool::new(
            LIST_TABLES,
            "List all available tables and views in the SQLite database.",
            json!({"type": "object", "properties": {}}),
        ),
        move |_| list_tables(&db),
    );

    let db = gateway.clone();
    registry.register(
        Tool::new(
            DESCRIBE_TABLE,
            "Get column names and types for a table or view.",
            json!({
                "type": "object",
                "required": ["table_name"],
                "properties": {"table_name": {"type": "string"}}
            }),
        ),
        move |args| describe_table(&db, &args),
    );

    let db = gateway.clone();
    registry.register(
        Tool::new(
            RUN_SQL,
            "Execute a read-only SELECT query with optional named parameters. Returns columns and rows.",
            json!({
                "type": "object",
                "required": ["sql"],
                "properties": {
                    "sql": {"type": "string"},
                    "named_params": {"type": "object", "additionalProperties": true}
                }
            }),
        ),
        move |args| run_sql(&db, &args),
    );

    let db = gateway.clone();
    registry.register(
        Tool::new(
            SAMPLE_ROWS,
            "Return a few example rows from a table or view.",
            json!({
                "type": "object",
                "required": ["table_name"],
                "properties": {
                    "table_name": {"type": "string"},
                    "limit": {"type": "integer", "default": DEFAULT_SAMPLE_ROWS}
                }
            }),
        ),
        move |args| sample_rows(&db, &args),
    );

    let db = gateway;
    registry.register(
        Tool::new(
            DISTINCT_VALUES,
            "List the distinct values of one column, e.g. the categories used in filters.",
            json!({
                "type": "object",
                "required": ["table_name", "column"],
                "properties": {
                    "table_name": {"type": "string"},
                    "column": {"type": "string"},
                    "limit": {"type": "integer", "default": DEFAULT_DISTINCT_VALUES}
                }
            }),
        ),
        move |args| distinct_values(&db, &args),
    );

    registry
}

fn list_tables(db: &ReadGateway) -> ToolResult<Value> {
    let tables = db.list_tables(&TableFilter::all())?;
    Ok(json!({ "tables": tables }))
}

fn describe_table(db: &ReadGateway, args: &Map<String, Value>) -> ToolResult<Value> {
    let table = required_str(args, "table_name")?;
    let columns = db.describe_table(table)?;
    Ok(json!({ "table": table, "columns": columns }))
}

fn run_sql(db: &ReadGateway, args: &Map<String, Value>) -> ToolResult<Value> {
    let sql = required_str(args, "sql")?;
    let params = named_params(args)?;

    let safe = sql::validate(sql)?;
    Ok(db.execute(safe, &params)?.to_json())
}

fn sample_rows(db: &ReadGateway, args: &Map<String, Value>) -> ToolResult<Value> {
    let table = required_str(args, "table_name")?;
    let limit = limit_arg(args, DEFAULT_SAMPLE_ROWS, db.max_rows())?;

    let query = format!("SELECT * FROM {} LIMIT {}", quote_identifier(table), limit);
    let result = db.execute(sql::validate(&query)?, &Map::new())?;
    Ok(json!({
        "table": table,
        "columns": result.columns,
        "row_count": result.row_count(),
        "rows": result.rows,
    }))
}

fn distinct_values(db: &ReadGateway, args: &Map<String, Value>) -> ToolResult<Value> {
    let table = required_str(args, "table_name")?;
    let column = required_str(args, "column")?;
    let limit = limit_arg(args, DEFAULT_DISTINCT_VALUES, db.max_rows())?;

    let query = format!(
        "SELECT DISTINCT {} FROM {} ORDER BY 1 LIMIT {}",
        quote_identifier(column),
        quote_identifier(table),
        limit
    );
    let result = db.execute(sql::validate(&query)?, &Map::new())?;
    let values: Vec<Value> = result
        .rows
        .into_iter()
        .filter_map(|row| row.into_iter().next().map(|(_, value)| value))
        .collect();
    Ok(json!({ "table": table, "column": column, "values": values }))
}

/// The `named_params` argument of a `run_sql` call. Models sometimes send the object
/// JSON-encoded as a string; that form is decoded too.
pub fn named_params(args: &Map<String, Value>) -> ToolResult<Map<String, Value>> {
    match args.get("named_params") {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(params)) => Ok(params.clone()),
        Some(Value::String(encoded)) if encoded.trim().is_empty() => Ok(Map::new()),
        Some(Value::String(encoded)) => match serde_json::from_str(encoded) {
            Ok(Value::Object(params)) => Ok(params),
            _ => Err(ToolError::InvalidParameters(format!(
                "named_params must be an object, got {:?}",
                encoded
            ))),
        },
        Some(other) => Err(ToolError::InvalidParameters(format!(
            "named_params must be an object, got {}",
            other
        ))),
    }
}

fn required_str<'a>(args: &'a Map<String, Value>, key: &str) -> ToolResult<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidParameters(format!("'{}' is required", key)))
}

/// `limit` argument, defaulting to `default` and clamped to `1..=cap`
fn limit_arg(args: &Map<String, Value>, default: usize, cap: usize) -> ToolResult<usize> {
    let requested = match args.get("limit") {
        None | Some(Value::Null) => default as i64,
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| {
            ToolError::InvalidParameters(format!("'limit' must be an integer, got {}", n))
        })?,
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| {
            ToolError::InvalidParameters(format!("'limit' must be an integer, got {:?}", s))
        })?,
        Some(other) => {
            return Err(ToolError::InvalidParameters(format!(
                "'limit' must be an integer, got {}",
                other
            )))
        }
    };
    Ok((requested.max(1) as usize).min(cap.max(1)))
}
