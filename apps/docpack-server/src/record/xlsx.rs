//! Minimal XLSX reader
//!
//! An `.xlsx` workbook is an OOXML zip package. Only what is needed to read
//! cell text from the first sheet is parsed: the workbook sheet list, its
//! relationships, the shared string table and the sheet data itself.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use super::{ExtractError, Result};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const FALLBACK_SHEET_PART: &str = "xl/worksheets/sheet1.xml";

/// Sheet size limits of the format (row 1048576, column XFD)
const MAX_ROWS: usize = 1_048_576;
const MAX_COLS: usize = 16_384;

/// Read the first worksheet as a dense grid. Rows absent from the sheet XML
/// come back as empty rows so row positions are preserved.
pub fn read_first_sheet(data: &[u8]) -> Result<Vec<Vec<String>>> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;

    let shared = match read_part(&mut archive, SHARED_STRINGS_PART)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet_part = first_sheet_part(&mut archive)?;
    let sheet_xml = read_part(&mut archive, &sheet_part)?
        .ok_or_else(|| ExtractError::Workbook(format!("missing worksheet part {}", sheet_part)))?;

    parse_sheet(&sheet_xml, &shared)
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut xml = String::new();
    file.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

/// Resolve the part name of the first `<sheet>` listed in the workbook
fn first_sheet_part<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let Some(workbook) = read_part(archive, WORKBOOK_PART)? else {
        return Ok(FALLBACK_SHEET_PART.to_string());
    };

    let mut reader = Reader::from_str(&workbook);
    let mut rel_id = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                rel_id = attribute(&reader, &e, b"id")?;
                break;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let Some(rel_id) = rel_id else {
        return Ok(FALLBACK_SHEET_PART.to_string());
    };
    let Some(rels) = read_part(archive, WORKBOOK_RELS_PART)? else {
        return Ok(FALLBACK_SHEET_PART.to_string());
    };

    let mut reader = Reader::from_str(&rels);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if attribute(&reader, &e, b"Id")?.as_deref() == Some(rel_id.as_str()) {
                    let target = attribute(&reader, &e, b"Target")?.unwrap_or_default();
                    return Ok(resolve_target(&target));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(FALLBACK_SHEET_PART.to_string())
}

/// Relationship targets are relative to `xl/` unless absolute
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}

/// Look up an attribute by local name (ignores namespace prefixes like `r:`)
fn attribute(reader: &Reader<&[u8]>, e: &BytesStart, local: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == local {
            return Ok(Some(attr.decode_and_unescape_value(reader)?.into_owned()));
        }
    }
    Ok(None)
}

/// Shared strings: each `<si>` is plain `<t>` text or rich text runs.
/// Phonetic hints (`<rPh>`) are not part of the value.
fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"rPh" => phonetic_depth += 1,
                b"t" => in_text = phonetic_depth == 0,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"t" => in_text = false,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(t) if in_text => current.push_str(&t.unescape()?),
            Event::CData(t) if in_text => current.push_str(&String::from_utf8_lossy(&t)),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

#[derive(Default)]
struct CellState {
    row: usize,
    col: usize,
    kind: Option<String>,
    value: String,
    capture: bool,
}

fn parse_sheet(xml: &str, shared: &[String]) -> Result<Vec<Vec<String>>> {
    let mut reader = Reader::from_str(xml);
    let mut grid: Vec<Vec<String>> = Vec::new();
    let mut next_row = 0usize;
    let mut next_col = 0usize;
    let mut cell: Option<CellState> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"row" => {
                next_row = row_index(&reader, &e, next_row)?;
                next_col = 0;
            }
            Event::End(e) if e.local_name().as_ref() == b"row" => {
                next_row += 1;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                next_row = row_index(&reader, &e, next_row)? + 1;
            }
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let (row, col) = match attribute(&reader, &e, b"r")? {
                    Some(r) => parse_cell_ref(&r)?.unwrap_or((next_row, next_col)),
                    None => (next_row, next_col),
                };
                next_col = col + 1;
                cell = Some(CellState {
                    row,
                    col,
                    kind: attribute(&reader, &e, b"t")?,
                    ..CellState::default()
                });
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                if let Some(r) = attribute(&reader, &e, b"r")? {
                    if let Some((_, col)) = parse_cell_ref(&r)? {
                        next_col = col;
                    }
                }
                next_col += 1;
            }
            Event::Start(e) => {
                if let Some(state) = cell.as_mut() {
                    if matches!(e.local_name().as_ref(), b"v" | b"t") {
                        state.capture = true;
                    }
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"c" => {
                if let Some(state) = cell.take() {
                    let value = cell_value(&state, shared);
                    put(&mut grid, state.row, state.col, value)?;
                }
            }
            Event::End(e) => {
                if let Some(state) = cell.as_mut() {
                    if matches!(e.local_name().as_ref(), b"v" | b"t") {
                        state.capture = false;
                    }
                }
            }
            Event::Text(t) => {
                if let Some(state) = cell.as_mut().filter(|s| s.capture) {
                    state.value.push_str(&t.unescape()?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(grid)
}

fn cell_value(state: &CellState, shared: &[String]) -> String {
    match state.kind.as_deref() {
        Some("s") => state
            .value
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i).cloned())
            .unwrap_or_default(),
        Some("b") => match state.value.trim() {
            "1" => "TRUE".to_string(),
            "0" => "FALSE".to_string(),
            other => other.to_string(),
        },
        _ => state.value.clone(),
    }
}

fn put(grid: &mut Vec<Vec<String>>, row: usize, col: usize, value: String) -> Result<()> {
    if row >= MAX_ROWS || col >= MAX_COLS {
        return Err(ExtractError::Workbook(format!(
            "cell at row {}, column {} is outside the sheet",
            row + 1,
            col + 1
        )));
    }
    if grid.len() <= row {
        grid.resize_with(row + 1, Vec::new);
    }
    let cells = &mut grid[row];
    if cells.len() <= col {
        cells.resize(col + 1, String::new());
    }
    cells[col] = value;
    Ok(())
}

/// 0-based index from a `<row r="N">` attribute, `current` when absent or unreadable
fn row_index(reader: &Reader<&[u8]>, e: &BytesStart, current: usize) -> Result<usize> {
    let Some(r) = attribute(reader, e, b"r")? else {
        return Ok(current);
    };
    match r.trim().parse::<usize>() {
        Ok(0) => Ok(current),
        Ok(n) if n <= MAX_ROWS => Ok(n - 1),
        _ if r.trim().bytes().all(|b| b.is_ascii_digit()) && !r.trim().is_empty() => {
            Err(ExtractError::Workbook(format!("row {} is outside the sheet", r.trim())))
        }
        _ => Ok(current),
    }
}

/// `"AB12"` -> `(11, 27)` as 0-based (row, column).
///
/// Malformed references yield `None`; well-formed ones past the sheet limits
/// are an error.
fn parse_cell_ref(reference: &str) -> Result<Option<(usize, usize)>> {
    let Some(split) = reference.find(|c: char| c.is_ascii_digit()) else {
        return Ok(None);
    };
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty()
        || !letters.bytes().all(|b| b.is_ascii_alphabetic())
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return Ok(None);
    }

    let out_of_range = || ExtractError::Workbook(format!("cell reference {} is outside the sheet", reference));

    let mut col = 0usize;
    for b in letters.bytes() {
        let digit = usize::from(b.to_ascii_uppercase() - b'A' + 1);
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add(digit))
            .filter(|c| *c <= MAX_COLS)
            .ok_or_else(out_of_range)?;
    }
    let row = match digits.parse::<usize>() {
        Ok(0) => return Ok(None),
        Ok(row) if row <= MAX_ROWS => row,
        _ => return Err(out_of_range()),
    };
    Ok(Some((row - 1, col - 1)))
}
