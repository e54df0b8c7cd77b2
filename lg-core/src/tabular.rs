//! Reads uploaded spreadsheets into rows of string cells.

use crate::error::{LeadError, Result};
use crate::lead::{Lead, Template, rows_to_leads};
use calamine::Reader;
use std::io::Cursor;

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Rows of the first sheet (or the CSV body). Fully blank rows are skipped.
#[tracing::instrument(level = "debug", skip(bytes), fields(size = bytes.len()))]
pub fn read_table(file_name: &str, bytes: &[u8]) -> Result<Vec<Vec<String>>> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let rows = match extension.as_str() {
        "csv" => read_csv(bytes),
        ext if WORKBOOK_EXTENSIONS.contains(&ext) => read_workbook(bytes),
        _ => Err(format!("unsupported file type {file_name:?}")),
    }
    .map_err(|detail| {
        tracing::warn!(file_name, %detail, "spreadsheet parsing failed");
        LeadError::Spreadsheet(detail)
    })?;

    Ok(rows
        .into_iter()
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .collect())
}

fn read_csv(bytes: &[u8]) -> std::result::Result<Vec<Vec<String>>, String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| e.to_string())
        })
        .collect()
}

fn read_workbook(bytes: &[u8]) -> std::result::Result<Vec<Vec<String>>, String> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| format!("failed to open workbook: {e}"))?;
    let Some(first) = workbook.sheet_names().first().cloned() else {
        return Err("workbook has no sheets".to_string());
    };
    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| format!("failed to read sheet {first:?}: {e}"))?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect())
}

/// The header row of a template file. Trailing empty header cells are ignored.
pub fn template_from_rows(rows: &[Vec<String>]) -> Result<Template> {
    let Some(header) = rows.first() else {
        return Err(LeadError::MissingHeader);
    };
    let width = header
        .iter()
        .rposition(|cell| !cell.trim().is_empty())
        .map_or(0, |last| last + 1);
    Template::new(header[..width].iter().cloned())
}

/// Every row after the header becomes a lead.
pub fn leads_from_rows(template: &Template, rows: &[Vec<String>]) -> Vec<Lead> {
    rows_to_leads(template, rows.get(1..).unwrap_or_default())
}
