//! CSV loading.
//!
//! Every cell is read as a string. Records with fewer fields than the
//! header are accepted; missing cells normalize to empty text.

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

use csv_rag_core::models::Table;

pub fn load_csv(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
    read_csv(file).with_context(|| format!("Failed to parse CSV file: {}", path.display()))
}

pub fn read_csv<R: Read>(reader: R) -> Result<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();

    let mut records = Vec::new();
    for record in rdr.records() {
        let record = record?;
        records.push(record.iter().map(|f| f.to_string()).collect());
    }

    Ok(Table::new(headers, records))
}

/// Parse a `--columns a,b,c` argument. `None` or blank selects every column.
pub fn resolve_columns(table: &Table, columns: Option<&str>) -> Vec<String> {
    match columns.map(str::trim) {
        Some(list) if !list.is_empty() => list
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
        _ => table.headers.clone(),
    }
}
