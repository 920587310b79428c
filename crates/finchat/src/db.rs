use base64::{engine::general_purpose::STANDARD, Engine as _};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Number, Value};
use std::path::{Path, PathBuf};

use crate::errors::{ToolError, ToolResult};

pub const DEFAULT_MAX_ROWS: usize = 1000;

/// Columns and rows returned by a statement, capped at the gateway's row limit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn to_json(&self) -> Value {
        json!({
            "columns": self.columns,
            "rows": self.rows,
            "row_count": self.row_count(),
        })
    }
}

/// One column of a table or view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub cid: i64,
    pub name: String,
    /// Declared type; empty when it could not be introspected
    #[serde(rename = "type")]
    pub column_type: String,
    pub notnull: bool,
    pub dflt_value: Option<String>,
    /// 1-based position in the primary key, 0 when not part of it
    pub pk: i64,
}

/// Which kinds of schema objects `list_tables` reports
#[derive(Debug, Clone, Default)]
pub struct TableFilter {
    pub include_tables: bool,
    pub include_views: bool,
    /// When set, only these names are reported
    pub only: Option<Vec<String>>,
}

impl TableFilter {
    pub fn all() -> Self {
        Self {
            include_tables: true,
            include_views: true,
            only: None,
        }
    }
}

/// Executes vetted statements against a SQLite file opened read-only.
///
/// A connection is opened per call and dropped before returning. The gateway trusts its caller
/// to have passed the SQL through [`crate::sql::validate`]; it only enforces the row cap.
#[derive(Debug, Clone)]
pub struct ReadGateway {
    path: PathBuf,
    max_rows: usize,
}

impl ReadGateway {
    pub fn new<P: Into<PathBuf>>(path: P, max_rows: usize) -> Self {
        Self {
            path: path.into(),
            max_rows,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    fn connect(&self) -> ToolResult<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Connection::open_with_flags(&self.path, flags).map_err(|e| {
            ToolError::ExecutionError(format!(
                "could not open {} read-only: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Run one statement, binding `params` to its named placeholders.
    ///
    /// Every placeholder must have a value: a missing one fails with [`ToolError::Binding`]
    /// before anything executes. Rows beyond the cap are silently dropped.
    pub fn execute(&self, sql: &str, params: &Map<String, Value>) -> ToolResult<QueryResult> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        for index in 1..=stmt.parameter_count() {
            // `?` and `?NNN` are positional; only `:name`, `@name` and `$name` can be resolved
            let name = match stmt.parameter_name(index) {
                Some(name) if !name.starts_with('?') => {
                    name.trim_start_matches([':', '@', '$']).to_string()
                }
                _ => {
                    return Err(ToolError::Binding(format!(
                        "positional parameter {} is not supported, use named parameters like :year",
                        index
                    )))
                }
            };
            let value = params.get(&name).ok_or_else(|| {
                ToolError::Binding(format!("unresolved SQL parameter ':{}'", name))
            })?;
            stmt.raw_bind_parameter(index, to_sql_value(&name, value)?)?;
        }

        let mut rows = Vec::new();
        let mut cursor = stmt.raw_query();
        while rows.len() < self.max_rows {
            let Some(row) = cursor.next()? else {
                break;
            };
            let mut record = Map::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                record.insert(column.clone(), to_json_value(row.get_ref(i)?));
            }
            rows.push(record);
        }

        tracing::debug!(rows = rows.len(), cap = self.max_rows, "statement executed");
        Ok(QueryResult { columns, rows })
    }

    /// Names of tables and views, views first, then by name. Internal `sqlite_` objects are skipped.
    pub fn list_tables(&self, filter: &TableFilter) -> ToolResult<Vec<String>> {
        let mut kinds = Vec::new();
        if filter.include_tables {
            kinds.push("table");
        }
        if filter.include_views {
            kinds.push("view");
        }
        if kinds.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; kinds.len()].join(",");
        let sql = format!(
            "SELECT name FROM sqlite_master \
             WHERE type IN ({}) AND name NOT LIKE 'sqlite_%' \
             ORDER BY CASE type WHEN 'view' THEN 0 ELSE 1 END, name",
            placeholders
        );

        let conn = self.connect()?;
        let mut stmt = conn.prepare(&sql)?;
        let names = stmt
            .query_map(rusqlite::params_from_iter(kinds.iter()), |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(match &filter.only {
            Some(only) => names.into_iter().filter(|n| only.contains(n)).collect(),
            None => names,
        })
    }

    /// Columns of a table or view.
    ///
    /// Uses `PRAGMA table_xinfo`; when that reports nothing (some views), column names are read
    /// from an empty select and the types are left blank.
    pub fn describe_table(&self, table: &str) -> ToolResult<Vec<ColumnInfo>> {
        let conn = self.connect()?;
        let quoted = quote_identifier(table);

        let mut stmt = conn.prepare(&format!("PRAGMA table_xinfo({})", quoted))?;
        let columns = stmt
            .query_map([], |row| {
                Ok(ColumnInfo {
                    cid: row.get("cid")?,
                    name: row.get("name")?,
                    column_type: row.get::<_, Option<String>>("type")?.unwrap_or_default(),
                    notnull: row.get::<_, i64>("notnull")? != 0,
                    dflt_value: row.get("dflt_value")?,
                    pk: row.get("pk")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        if !columns.is_empty() {
            return Ok(columns);
        }

        selected_columns(&conn, &quoted)
    }
}

/// Column names of an empty select over `quoted`, with no type information
fn selected_columns(conn: &Connection, quoted: &str) -> ToolResult<Vec<ColumnInfo>> {
    let stmt = conn.prepare(&format!("SELECT * FROM {} LIMIT 0", quoted))?;
    Ok(stmt
        .column_names()
        .into_iter()
        .enumerate()
        .map(|(cid, name)| ColumnInfo {
            cid: cid as i64,
            name: name.to_string(),
            column_type: String::new(),
            notnull: false,
            dflt_value: None,
            pk: 0,
        })
        .collect())
}

/// Double-quote an identifier, escaping embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql_value(name: &str, value: &Value) -> ToolResult<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real))
            .ok_or_else(|| ToolError::Binding(format!("parameter ':{}' is not a valid number", name))),
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(ToolError::Binding(format!(
            "parameter ':{}' must be a scalar, got {}",
            name, value
        ))),
    }
}

fn to_json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(STANDARD.encode(bytes)),
    }
}
