//! Sheet layouts: wide table and transposed key/value pairs

use std::collections::HashMap;

use super::{normalize_key, normalize_value, ExtractError, Record, Result};

/// A record picked from a wide table
#[derive(Debug, Clone)]
pub struct WideRecord {
    pub record: Record,
    pub columns: Vec<String>,
    /// 0-based grid row the record came from
    pub row_index: usize,
}

/// Read the grid as a wide table with its header at `header_index`.
///
/// Returns `Ok(None)` when there are no data rows below the header, so the
/// caller can fall back to the key/value layout. Data rows that exist but are
/// all blank are an error.
pub fn wide_record(grid: &[Vec<String>], header_index: usize) -> Result<Option<WideRecord>> {
    let Some(header) = grid.get(header_index) else {
        return Ok(None);
    };
    let data_rows = &grid[header_index + 1..];
    if data_rows.is_empty() {
        return Ok(None);
    }

    let width = data_rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0);
    let columns = column_names(header, width);

    let (offset, row) = data_rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.iter().any(|cell| !cell.trim().is_empty()))
        .ok_or(ExtractError::NoPopulatedRow)?;

    let record = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let value = row.get(i).map(|v| normalize_value(v)).unwrap_or_default();
            (column.clone(), value)
        })
        .collect();

    Ok(Some(WideRecord {
        record,
        columns,
        row_index: header_index + 1 + offset,
    }))
}

/// Read `key_row` as keys and `val_row` as values. Columns with an empty key
/// are dropped.
pub fn key_value_record(grid: &[Vec<String>], key_row: usize, val_row: usize) -> Result<Record> {
    let (Some(keys), Some(values)) = (grid.get(key_row), grid.get(val_row)) else {
        return Err(ExtractError::NoPopulatedRow);
    };

    let record: Record = keys
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let value = values.get(i).map(|v| normalize_value(v)).unwrap_or_default();
            (normalize_key(key), value.replace('\u{a0}', " "))
        })
        .filter(|(key, _)| !key.is_empty())
        .collect();

    if record.iter().all(|(_, value)| value.is_empty()) {
        return Err(ExtractError::NoPopulatedRow);
    }
    Ok(record)
}

/// Header names: empty cells become `Unnamed: N`, repeats get a `.N` suffix
fn column_names(header: &[String], width: usize) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    (0..width)
        .map(|i| {
            let raw = header.get(i).map(|h| normalize_key(h)).unwrap_or_default();
            let base = if raw.is_empty() {
                format!("Unnamed: {}", i)
            } else {
                raw
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            name
        })
        .collect()
}
