//! Row flattening.
//!
//! Turns the selected cells of a table row into one indexable string by
//! joining them with [`FIELD_SEPARATOR`]. Normalization is total: cells
//! missing from a short record render as empty text.

use crate::error::{RagError, Result};
use crate::models::{Document, Table};

/// Separator placed between field values in normalized text.
pub const FIELD_SEPARATOR: &str = " | ";

/// Join field values with [`FIELD_SEPARATOR`], preserving order.
pub fn normalize_fields<S: AsRef<str>>(fields: &[S]) -> String {
    let mut out = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push_str(FIELD_SEPARATOR);
        }
        out.push_str(field.as_ref());
    }
    out
}

/// Resolve selected column names to header positions.
///
/// Fails with [`RagError::NoColumnsSelected`] for an empty selection and
/// [`RagError::UnknownColumn`] for a name not present in the header.
pub fn select_columns(headers: &[String], selected: &[String]) -> Result<Vec<usize>> {
    if selected.is_empty() {
        return Err(RagError::NoColumnsSelected);
    }
    selected
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| RagError::UnknownColumn(name.clone()))
        })
        .collect()
}

/// Build one [`Document`] per record, using the given column positions.
pub fn to_documents(table: &Table, positions: &[usize]) -> Vec<Document> {
    table
        .records
        .iter()
        .enumerate()
        .map(|(id, record)| {
            let fields: Vec<String> = positions
                .iter()
                .map(|&p| record.get(p).cloned().unwrap_or_default())
                .collect();
            let text = normalize_fields(&fields);
            Document { id, fields, text }
        })
        .collect()
}
