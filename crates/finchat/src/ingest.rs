//! Loader for financial JSON exports (QuickBooks reports and Rootfi records) into the `data`
//! table the agent queries. This is the only code that opens a writable connection.
use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unrecognized financial data format")]
    UnrecognizedFormat,

    #[error("Invalid category map: {0}")]
    InvalidCategories(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type IngestResult<T> = Result<T, IngestError>;

/// Rootfi statement sections, each used as the category of its line items
const ROOTFI_SECTIONS: &[&str] = &[
    "revenue",
    "cost_of_goods_sold",
    "operating_expenses",
    "non_operating_revenue",
    "non_operating_expenses",
    "taxes",
];

lazy_static! {
    static ref ACCOUNT_SUFFIX: Regex = Regex::new(r"_\d+$").unwrap();
    static ref PLATFORM_PERIOD: Regex =
        Regex::new(r"^(\d{4}-\d{2}-\d{2})_(\d{4}-\d{2}-\d{2})$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    QuickBooks,
    Rootfi,
}

/// Which export a document is, judged by the shape of its `data` member
pub fn detect_format(document: &Value) -> Option<SourceFormat> {
    match document.get("data") {
        Some(Value::Object(report)) if report.contains_key("Header") => {
            Some(SourceFormat::QuickBooks)
        }
        Some(Value::Array(_)) => Some(SourceFormat::Rootfi),
        _ => None,
    }
}

/// Category assignment for QuickBooks accounts: `{category: [account prefix, ...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryMap {
    prefixes: BTreeMap<String, Vec<String>>,
}

impl CategoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> IngestResult<Self> {
        serde_json::from_str(json).map_err(|e| IngestError::InvalidCategories(e.to_string()))
    }

    pub fn with<S: Into<String>>(mut self, category: S, prefixes: &[&str]) -> Self {
        self.prefixes
            .entry(category.into())
            .or_default()
            .extend(prefixes.iter().map(|p| p.to_string()));
        self
    }

    /// The category of an account name: the first category with a matching `<prefix>_`, else
    /// `operating_expenses` for `*_expense*` accounts, else `unknown`
    pub fn categorize(&self, account: &str) -> String {
        let lowered = account.to_lowercase();
        for (category, prefixes) in &self.prefixes {
            if prefixes
                .iter()
                .any(|prefix| lowered.starts_with(&format!("{}_", prefix.to_lowercase())))
            {
                return category.clone();
            }
        }
        if lowered.contains("_expense") {
            "operating_expenses".to_string()
        } else {
            "unknown".to_string()
        }
    }
}

/// One normalized value of one account over one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub account: String,
    pub account_id: Option<String>,
    pub category: String,
    pub subcategories: Option<String>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub value: f64,
}

impl Entry {
    fn reference_date(&self) -> Option<NaiveDate> {
        self.period_start.or(self.period_end)
    }

    pub fn period_month(&self) -> Option<String> {
        self.reference_date().map(|d| d.format("%Y-%m").to_string())
    }

    pub fn year(&self) -> Option<i32> {
        self.reference_date().map(|d| d.year())
    }

    pub fn month(&self) -> Option<u32> {
        self.reference_date().map(|d| d.month())
    }

    pub fn quarter(&self) -> Option<u32> {
        self.reference_date().map(|d| d.month0() / 3 + 1)
    }
}

/// Parse and normalize a loaded export
pub fn parse_document(document: &Value, categories: &CategoryMap) -> IngestResult<Vec<Entry>> {
    let entries = match (detect_format(document), document.get("data")) {
        (Some(SourceFormat::QuickBooks), Some(report)) => parse_quickbooks(report, categories),
        (Some(SourceFormat::Rootfi), Some(Value::Array(records))) => parse_rootfi(records),
        _ => return Err(IngestError::UnrecognizedFormat),
    };
    Ok(normalize(entries))
}

pub fn parse_file<P: AsRef<Path>>(path: P, categories: &CategoryMap) -> IngestResult<Vec<Entry>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let document: Value = serde_json::from_str(&content)?;
    let entries = parse_document(&document, categories)?;
    tracing::info!(
        file = %path.as_ref().display(),
        entries = entries.len(),
        "parsed financial export"
    );
    Ok(entries)
}

/// Absolute values; entries without a period end are dropped
fn normalize(entries: Vec<Entry>) -> Vec<Entry> {
    entries
        .into_iter()
        .filter(|entry| entry.period_end.is_some())
        .map(|mut entry| {
            entry.value = entry.value.abs();
            entry
        })
        .collect()
}

struct Period {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

fn parse_date(value: Option<&Value>) -> Option<NaiveDate> {
    let text = value?.as_str()?.trim();
    let day = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn parse_amount(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_quickbooks(report: &Value, categories: &CategoryMap) -> Vec<Entry> {
    let periods: Vec<Period> = report
        .pointer("/Columns/Column")
        .and_then(Value::as_array)
        .map(|columns| {
            columns
                .iter()
                .map(|column| {
                    let metadata = column.get("MetaData").and_then(Value::as_array);
                    let lookup = |name: &str| {
                        metadata?
                            .iter()
                            .find(|m| m.get("Name").and_then(Value::as_str) == Some(name))
                            .and_then(|m| m.get("Value"))
                    };
                    Period {
                        start: parse_date(lookup("StartDate")),
                        end: parse_date(lookup("EndDate")),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let mut entries = Vec::new();
    walk_quickbooks_rows(report, &periods, categories, &mut entries);
    entries
}

fn walk_quickbooks_rows(
    section: &Value,
    periods: &[Period],
    categories: &CategoryMap,
    entries: &mut Vec<Entry>,
) {
    let Some(rows) = section.pointer("/Rows/Row").and_then(Value::as_array) else {
        return;
    };

    for row in rows {
        match row.get("type").and_then(Value::as_str) {
            Some("Data") => {
                let Some(cells) = row.get("ColData").and_then(Value::as_array) else {
                    continue;
                };
                let Some(name_cell) = cells.first() else {
                    continue;
                };
                let raw_name = name_cell
                    .get("value")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let account = ACCOUNT_SUFFIX.replace(raw_name, "").to_string();
                let category = categories.categorize(&account);
                let account_id = id_string(name_cell.get("id"));

                // The first column holds the account name; value columns line up with periods
                for (period, cell) in periods.iter().skip(1).zip(cells.iter().skip(1)) {
                    let Some(value) = parse_amount(cell.get("value")) else {
                        continue;
                    };
                    entries.push(Entry {
                        account: account.clone(),
                        account_id: account_id.clone(),
                        category: category.clone(),
                        subcategories: None,
                        period_start: period.start,
                        period_end: period.end,
                        value,
                    });
                }
            }
            Some("Section") => walk_quickbooks_rows(row, periods, categories, entries),
            _ => {}
        }
    }
}

fn parse_rootfi(records: &[Value]) -> Vec<Entry> {
    let mut entries = Vec::new();
    for record in records {
        let mut period = Period {
            start: parse_date(record.get("period_start")),
            end: parse_date(record.get("period_end")),
        };
        if period.start.is_none() || period.end.is_none() {
            if let Some(captures) = record
                .get("platform_id")
                .and_then(Value::as_str)
                .and_then(|id| PLATFORM_PERIOD.captures(id))
            {
                period.start = period
                    .start
                    .or_else(|| NaiveDate::parse_from_str(&captures[1], "%Y-%m-%d").ok());
                period.end = period
                    .end
                    .or_else(|| NaiveDate::parse_from_str(&captures[2], "%Y-%m-%d").ok());
            }
        }

        for section in ROOTFI_SECTIONS {
            if let Some(items) = record.get(*section).and_then(Value::as_array) {
                walk_rootfi_items(items, section, &period, &mut Vec::new(), &mut entries);
            }
        }
    }
    entries
}

/// Only leaf line items carry values; parents are aggregates of their children
fn walk_rootfi_items(
    items: &[Value],
    category: &str,
    period: &Period,
    path: &mut Vec<String>,
    entries: &mut Vec<Entry>,
) {
    for item in items {
        let name = item
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match item.get("line_items").and_then(Value::as_array) {
            Some(children) if !children.is_empty() => {
                path.push(name);
                walk_rootfi_items(children, category, period, path, entries);
                path.pop();
            }
            _ => {
                let Some(value) = parse_amount(item.get("value")) else {
                    continue;
                };
                entries.push(Entry {
                    account: name,
                    account_id: id_string(item.get("account_id")),
                    category: category.to_string(),
                    subcategories: if path.is_empty() {
                        None
                    } else {
                        Some(path.join(" > "))
                    },
                    period_start: period.start,
                    period_end: period.end,
                    value,
                });
            }
        }
    }
}

/// Replace the `data` table of the database at `path` with `entries`, in one transaction
pub fn write_entries<P: AsRef<Path>>(path: P, entries: &[Entry]) -> IngestResult<usize> {
    let mut conn = Connection::open(path.as_ref())?;
    let tx = conn.transaction()?;
    tx.execute_batch(
        "DROP TABLE IF EXISTS data;
         CREATE TABLE data (
             account TEXT NOT NULL,
             account_id TEXT,
             category TEXT NOT NULL,
             subcategories TEXT,
             period_start TEXT,
             period_end TEXT,
             period_month TEXT,
             year INTEGER,
             month INTEGER,
             quarter INTEGER,
             value REAL NOT NULL
         );",
    )?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO data (account, account_id, category, subcategories, period_start, \
             period_end, period_month, year, month, quarter, value) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;
        for entry in entries {
            stmt.execute(params![
                entry.account,
                entry.account_id,
                entry.category,
                entry.subcategories,
                entry.period_start.map(|d| d.to_string()),
                entry.period_end.map(|d| d.to_string()),
                entry.period_month(),
                entry.year(),
                entry.month(),
                entry.quarter(),
                entry.value,
            ])?;
        }
    }
    tx.commit()?;

    tracing::info!(
        db = %path.as_ref().display(),
        rows = entries.len(),
        "wrote data table"
    );
    Ok(entries.len())
}
