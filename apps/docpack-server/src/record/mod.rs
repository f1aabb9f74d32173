//! Record extraction
//!
//! Turns an uploaded `.xlsx`/`.csv` file (or a Google Sheet CSV export) into
//! a single flat [`Record`]. Two sheet layouts are understood:
//!
//! - wide: a header row followed by data rows, the first populated data row wins
//! - kv: row 1 holds the keys, row 2 the values (used when the wide parse
//!   finds no data rows at all)

mod delimited;
mod gsheet;
mod layout;
mod xlsx;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

pub use delimited::sniff_delimiter;
pub use gsheet::{export_url, extract_from_export, SheetClient, SheetRef};
pub use layout::{key_value_record, wide_record, WideRecord};

/// Errors raised while extracting a record. All of them are caused by the
/// uploaded data, so they surface as 400 responses.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Only .xlsx or .csv files are supported (got {0:?})")]
    UnsupportedFileType(String),

    #[error("No non-empty data row found")]
    NoPopulatedRow,

    #[error("Could not extract a spreadsheet id from the URL")]
    InvalidSheetUrl,

    #[error("Google Sheets is unavailable (HTTP {0})")]
    SheetStatus(u16),

    #[error("Google Sheets request failed: {0}")]
    SheetFetch(String),

    #[error("Invalid workbook: {0}")]
    Workbook(String),

    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid workbook archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid workbook XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExtractError>;

/// One extracted row: normalized column name -> trimmed value, in sheet order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value. A repeated key keeps its first position and takes the
    /// latest value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Lookup that treats a missing column as an empty value
    pub fn value(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Xlsx,
    Csv,
    Gsheet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    Wide,
    Kv,
}

/// How the record was found. Row numbers are 0-based.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractMeta {
    pub source: SourceKind,
    pub mode: LayoutMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub val_row: Option<usize>,
    pub score: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gid: Option<u64>,
}

/// Result of a successful extraction
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: Record,
    pub meta: ExtractMeta,
    /// Header columns, only known in wide mode
    pub columns: Option<Vec<String>>,
}

/// Supported upload formats, detected by file extension only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Xlsx,
    Csv,
}

impl UploadFormat {
    pub fn from_filename(filename: &str) -> Result<Self> {
        let lower = filename.trim().to_lowercase();
        if lower.ends_with(".xlsx") {
            Ok(UploadFormat::Xlsx)
        } else if lower.ends_with(".csv") {
            Ok(UploadFormat::Csv)
        } else {
            Err(ExtractError::UnsupportedFileType(filename.to_string()))
        }
    }

    fn source(self) -> SourceKind {
        match self {
            UploadFormat::Xlsx => SourceKind::Xlsx,
            UploadFormat::Csv => SourceKind::Csv,
        }
    }
}

/// Read the raw cell grid of an upload
pub fn read_grid(data: &[u8], format: UploadFormat) -> Result<Vec<Vec<String>>> {
    match format {
        UploadFormat::Xlsx => xlsx::read_first_sheet(data),
        UploadFormat::Csv => delimited::read_delimited(data),
    }
}

/// Extract the record from an uploaded file.
///
/// `header_row` is 1-based; values below 1 are treated as 1.
pub fn extract_from_upload(data: &[u8], filename: &str, header_row: usize) -> Result<Extraction> {
    let format = UploadFormat::from_filename(filename)?;
    let grid = read_grid(data, format)?;
    let header_index = header_row.max(1) - 1;

    if let Some(wide) = wide_record(&grid, header_index)? {
        tracing::debug!(
            columns = wide.columns.len(),
            row = wide.row_index,
            "Extracted record in wide layout"
        );
        return Ok(Extraction {
            record: wide.record,
            meta: ExtractMeta {
                source: format.source(),
                mode: LayoutMode::Wide,
                header_row: Some(header_index),
                key_row: None,
                val_row: None,
                score: 0,
                gid: None,
            },
            columns: Some(wide.columns),
        });
    }

    let record = key_value_record(&grid, 0, 1)?;
    tracing::debug!(keys = record.len(), "Extracted record in key/value layout");
    Ok(Extraction {
        record,
        meta: ExtractMeta {
            source: format.source(),
            mode: LayoutMode::Kv,
            header_row: None,
            key_row: Some(0),
            val_row: Some(1),
            score: 0,
            gid: None,
        },
        columns: None,
    })
}

/// Normalize a header or key cell: trims and drops BOM / non-breaking spaces
pub fn normalize_key(raw: &str) -> String {
    raw.replace('\u{feff}', "")
        .replace('\u{a0}', " ")
        .trim()
        .to_string()
}

/// Normalize a value cell
pub fn normalize_value(raw: &str) -> String {
    raw.replace('\u{feff}', "").trim().to_string()
}

#[cfg(test)]
pub(crate) use gsheet::tests::spawn_export_server;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::{write::SimpleFileOptions, ZipWriter};

    /// Build a minimal single-sheet workbook using inline strings.
    /// `None` rows are left out of the sheet XML entirely.
    pub(crate) fn build_xlsx(rows: &[Option<Vec<&str>>]) -> Vec<u8> {
        let mut sheet = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
        );
        for (r, row) in rows.iter().enumerate() {
            let Some(cells) = row else { continue };
            sheet.push_str(&format!(r#"<row r="{}">"#, r + 1));
            for (c, value) in cells.iter().enumerate() {
                let col = (b'A' + c as u8) as char;
                sheet.push_str(&format!(
                    r#"<c r="{}{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    col,
                    r + 1,
                    value
                ));
            }
            sheet.push_str("</row>");
        }
        sheet.push_str("</sheetData></worksheet>");

        let mut buffer = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
            let options = SimpleFileOptions::default();
            zip.start_file("xl/workbook.xml", options).unwrap();
            zip.write_all(br#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Data" sheetId="1" r:id="rId1"/></sheets></workbook>"#).unwrap();
            zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
            zip.write_all(br#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#).unwrap();
            zip.start_file("xl/worksheets/sheet1.xml", options).unwrap();
            zip.write_all(sheet.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buffer
    }

    #[test]
    fn test_wide_csv_skips_blank_first_row() {
        let csv = "ФИО,Группа\n,\nИванов Иван Иванович,Изу-101\n";
        let extraction = extract_from_upload(csv.as_bytes(), "student.csv", 1).unwrap();

        assert_eq!(extraction.meta.mode, LayoutMode::Wide);
        assert_eq!(extraction.record.value("ФИО"), "Иванов Иван Иванович");
        assert_eq!(extraction.record.value("Группа"), "Изу-101");
        assert_eq!(
            extraction.columns.unwrap(),
            vec!["ФИО".to_string(), "Группа".to_string()]
        );
    }

    #[test]
    fn test_wide_xlsx_skips_blank_first_row() {
        let xlsx = build_xlsx(&[
            Some(vec!["ФИО", "Группа"]),
            None,
            Some(vec!["", ""]),
            Some(vec!["Петров Пётр", "Эк-202"]),
        ]);
        let extraction = extract_from_upload(&xlsx, "Student.XLSX", 1).unwrap();

        assert_eq!(extraction.meta.source, SourceKind::Xlsx);
        assert_eq!(extraction.meta.mode, LayoutMode::Wide);
        assert_eq!(extraction.record.value("ФИО"), "Петров Пётр");
    }

    #[test]
    fn test_zero_populated_rows_is_an_error() {
        let csv = "ФИО,Группа\n,\n , \n";
        let err = extract_from_upload(csv.as_bytes(), "empty.csv", 1).unwrap_err();
        assert!(matches!(err, ExtractError::NoPopulatedRow));

        let xlsx = build_xlsx(&[Some(vec!["ФИО", "Группа"]), Some(vec!["", " "])]);
        let err = extract_from_upload(&xlsx, "empty.xlsx", 1).unwrap_err();
        assert!(matches!(err, ExtractError::NoPopulatedRow));
    }

    #[test]
    fn test_header_only_sheet_is_an_error() {
        let csv = "ФИО,Группа\n";
        let err = extract_from_upload(csv.as_bytes(), "header.csv", 1).unwrap_err();
        assert!(matches!(err, ExtractError::NoPopulatedRow));
    }

    #[test]
    fn test_key_value_fallback() {
        // Header row 3 does not exist, so the two rows are read as key/value pairs
        let xlsx = build_xlsx(&[
            Some(vec!["ФИО", "", "Группа"]),
            Some(vec!["Сидорова Анна", "ignored", "Жур-303"]),
        ]);
        let extraction = extract_from_upload(&xlsx, "kv.xlsx", 3).unwrap();

        assert_eq!(extraction.meta.mode, LayoutMode::Kv);
        assert_eq!(extraction.meta.key_row, Some(0));
        assert!(extraction.columns.is_none());
        assert_eq!(extraction.record.len(), 2);
        assert_eq!(extraction.record.value("Группа"), "Жур-303");
    }

    #[test]
    fn test_header_row_selects_later_header() {
        let csv = "Заявка на практику\nФИО,Группа\nИванов Иван,Изу-101\n";
        let extraction = extract_from_upload(csv.as_bytes(), "data.csv", 2).unwrap();
        assert_eq!(extraction.meta.header_row, Some(1));
        assert_eq!(extraction.record.value("ФИО"), "Иванов Иван");
    }

    #[test]
    fn test_unsupported_extension() {
        let err = extract_from_upload(b"whatever", "notes.txt", 1).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFileType(_)));
    }

    #[test]
    fn test_record_keeps_order_and_last_value() {
        let mut record = Record::new();
        record.insert("b", "1");
        record.insert("a", "2");
        record.insert("b", "3");

        let pairs: Vec<_> = record.iter().collect();
        assert_eq!(pairs, vec![("b", "3"), ("a", "2")]);
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"b":"3","a":"2"}"#
        );
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("\u{feff}ФИО "), "ФИО");
        assert_eq!(normalize_key("Адрес\u{a0}организации"), "Адрес организации");
    }
}
