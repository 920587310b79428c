use anyhow::{Context as _, Result};
use console::style;
use finchat::ingest::{parse_file, write_entries, CategoryMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Accepts either an inline JSON object or the path of a file holding one
fn load_categories(categories: Option<&str>) -> Result<CategoryMap> {
    let Some(raw) = categories else {
        return Ok(CategoryMap::new());
    };
    let path = Path::new(raw);
    let json = if path.is_file() {
        fs::read_to_string(path)
            .with_context(|| format!("failed to read categories from {}", path.display()))?
    } else {
        raw.to_string()
    };
    Ok(CategoryMap::from_json(&json)?)
}

pub fn execute(files: Vec<PathBuf>, db: PathBuf, categories: Option<String>) -> Result<()> {
    let categories = load_categories(categories.as_deref())?;

    let mut entries = Vec::new();
    for file in &files {
        let parsed = parse_file(file, &categories)
            .with_context(|| format!("failed to ingest {}", file.display()))?;
        println!(
            "{} {} entries from {}",
            style("parsed").dim(),
            style(parsed.len()).bold(),
            file.display()
        );
        entries.extend(parsed);
    }

    let written = write_entries(&db, &entries)?;
    println!(
        "{} {} rows to {}",
        style("wrote").green().bold(),
        style(written).bold(),
        db.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use finchat::db::ReadGateway;
    use serde_json::{json, Map};

    #[test]
    fn test_load_categories_inline_and_file() {
        let inline = load_categories(Some(r#"{"revenue": ["income"]}"#)).unwrap();
        assert_eq!(inline.categorize("income_sales"), "revenue");

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("categories.json");
        fs::write(&file, r#"{"cost_of_goods_sold": ["cogs"]}"#).unwrap();
        let from_file = load_categories(file.to_str()).unwrap();
        assert_eq!(from_file.categorize("cogs_materials"), "cost_of_goods_sold");

        assert_eq!(load_categories(None).unwrap().categorize("rent_expense"), "operating_expenses");
        assert!(load_categories(Some("not json")).is_err());
    }

    #[test]
    fn test_ingest_writes_rootfi_export() {
        let dir = tempfile::tempdir().unwrap();
        let export = dir.path().join("rootfi.json");
        fs::write(
            &export,
            r#"{"data": [{
                "period_start": "2024-01-01",
                "period_end": "2024-03-31",
                "revenue": [{"name": "Sales", "value": 1200}]
            }]}"#,
        )
        .unwrap();
        let db = dir.path().join("finance.db");

        execute(vec![export], db.clone(), None).unwrap();

        let gateway = ReadGateway::new(&db, 10);
        let result = gateway
            .execute("SELECT account, category, quarter, value FROM data", &Map::new())
            .unwrap();
        assert_eq!(result.row_count(), 1);
        let rows = result.to_json();
        assert_eq!(rows["rows"][0]["category"], json!("revenue"));
        assert_eq!(rows["rows"][0]["quarter"], json!(1));
    }
}
