//! CSV and spreadsheet decoding into normalized rows.

use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;

use calamine::{Data, ExcelDateTime, Reader};
use chrono::NaiveTime;
use tracing::{debug, info};

use crate::error::ParseError;

/// Source file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Xlsx,
}

impl FileKind {
    /// Guess the kind from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, ParseError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        ext.parse()
    }
}

impl FromStr for FileKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" | "txt" => Ok(Self::Csv),
            "xlsx" | "xls" | "xlsb" | "ods" => Ok(Self::Xlsx),
            other => Err(ParseError::UnsupportedKind(other.to_string())),
        }
    }
}

/// One data row keyed by normalized header, in source column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    index: usize,
    cells: Vec<(String, String)>,
}

impl RawRow {
    /// 1-based position among the data rows (the header row is not counted).
    pub fn index(&self) -> usize {
        self.index
    }

    /// Cell text for a normalized header.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(h, v)| (h.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Decoded file: normalized headers plus data rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTable {
    headers: Vec<String>,
    rows: Vec<RawRow>,
}

impl ParsedTable {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<RawRow> {
        self.rows
    }

    /// First `n` rows, for showing the user what was read.
    pub fn preview(&self, n: usize) -> &[RawRow] {
        &self.rows[..n.min(self.rows.len())]
    }
}

/// Lower-case and trim a header cell.
pub fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// Decoder for CSV and single-sheet spreadsheet files.
#[derive(Debug, Clone, Copy, Default)]
pub struct TabularParser;

impl TabularParser {
    pub fn new() -> Self {
        Self
    }

    /// Decode file contents of the given kind.
    pub fn parse(&self, data: &[u8], kind: FileKind) -> Result<ParsedTable, ParseError> {
        let grid = match kind {
            FileKind::Csv => read_csv_grid(data)?,
            FileKind::Xlsx => read_sheet_grid(data)?,
        };
        let table = build_table(grid)?;

        info!(
            "Parsed {} rows with {} columns",
            table.rows.len(),
            table.headers.len()
        );
        Ok(table)
    }

    /// Read and decode a file, inferring its kind from the extension.
    pub fn parse_path(&self, path: &Path) -> crate::Result<ParsedTable> {
        let kind = FileKind::from_path(path)?;
        let data = std::fs::read(path)?;
        Ok(self.parse(&data, kind)?)
    }
}

fn read_csv_grid(data: &[u8]) -> Result<Vec<Vec<String>>, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record?;
        grid.push(record.iter().map(str::to_string).collect());
    }
    Ok(grid)
}

fn read_sheet_grid(data: &[u8]) -> Result<Vec<Vec<String>>, ParseError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(data.to_vec()))
        .map_err(|e| ParseError::Spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ParseError::Malformed("workbook has no sheets".to_string()))?
        .map_err(|e| ParseError::Spreadsheet(e.to_string()))?;

    debug!("Reading first sheet, {} rows", range.height());

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

/// Coerce a spreadsheet cell to text. Empty cells become `""`.
pub(crate) fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_datetime_to_iso(dt),
        Data::Error(e) => format!("{e:?}"),
    }
}

/// Latest date Excel can represent, 9999-12-31.
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Date cell to `YYYY-MM-DD`, or `YYYY-MM-DDTHH:MM:SS` when a time part is present.
/// Serials Excel itself cannot display are kept as plain numbers.
fn excel_datetime_to_iso(dt: &ExcelDateTime) -> String {
    let serial = dt.as_f64();
    if dt.is_duration() || !serial.is_finite() || serial.abs() > MAX_EXCEL_SERIAL {
        return serial.to_string();
    }
    // as_datetime honours the workbook's 1900/1904 epoch
    match dt.as_datetime() {
        Some(at) if at.time() == NaiveTime::MIN => at.format("%Y-%m-%d").to_string(),
        Some(at) => at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        None => serial.to_string(),
    }
}

fn build_table(grid: Vec<Vec<String>>) -> Result<ParsedTable, ParseError> {
    let mut lines = grid
        .into_iter()
        .filter(|cells| cells.iter().any(|c| !c.trim().is_empty()));

    let header_cells = lines
        .next()
        .ok_or_else(|| ParseError::Malformed("missing header row".to_string()))?;
    let headers = dedupe_headers(header_cells.iter().map(|h| normalize_header(h)));

    let rows: Vec<RawRow> = lines
        .enumerate()
        .map(|(i, cells)| RawRow {
            index: i + 1,
            cells: headers
                .iter()
                .enumerate()
                .map(|(col, h)| (h.clone(), cells.get(col).cloned().unwrap_or_default()))
                .collect(),
        })
        .collect();

    if rows.is_empty() {
        return Err(ParseError::Malformed("file contains no data rows".to_string()));
    }

    Ok(ParsedTable { headers, rows })
}

/// Give repeated headers a numeric suffix so every key in a row is distinct.
/// A suffix that collides with a later real header is skipped.
fn dedupe_headers(headers: impl Iterator<Item = String>) -> Vec<String> {
    let headers: Vec<String> = headers.collect();
    let mut taken: HashSet<String> = HashSet::with_capacity(headers.len());
    let mut result = Vec::with_capacity(headers.len());

    for (i, h) in headers.iter().enumerate() {
        let unique = if taken.contains(h) {
            (2..)
                .map(|n| format!("{h}_{n}"))
                .find(|c| !taken.contains(c) && !headers[i + 1..].contains(c))
                .unwrap_or_default()
        } else {
            h.clone()
        };
        taken.insert(unique.clone());
        result.push(unique);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::ExcelDateTimeType;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_csv_normalizes_headers() {
        let csv = " Amount ,Description,CATEGORY\n12.50,Lunch,Food\n3,Bus,Travel\n";
        let table = TabularParser::new().parse(csv.as_bytes(), FileKind::Csv).unwrap();

        assert_eq!(table.headers(), &["amount", "description", "category"]);
        assert_eq!(table.rows().len(), 2);
        assert_eq!(table.rows()[0].get("amount"), Some("12.50"));
        assert_eq!(table.rows()[1].get("category"), Some("Travel"));
        assert_eq!(table.rows()[1].index(), 2);
    }

    #[test]
    fn test_parse_csv_every_row_has_every_header() {
        let csv = "amount,description,date\n10,Coffee\n\n20,Tea,2024-01-01,extra\n";
        let table = TabularParser::new().parse(csv.as_bytes(), FileKind::Csv).unwrap();

        assert_eq!(table.rows().len(), 2);
        for row in table.rows() {
            assert_eq!(row.len(), 3);
        }
        assert_eq!(table.rows()[0].get("date"), Some(""));
    }

    #[test]
    fn test_parse_csv_quoted_fields() {
        let csv = "amount,description\n\"1,200.00\",\"Desk, \"\"oak\"\"\nline two\"\n";
        let table = TabularParser::new().parse(csv.as_bytes(), FileKind::Csv).unwrap();

        assert_eq!(table.rows().len(), 1);
        assert_eq!(table.rows()[0].get("amount"), Some("1,200.00"));
        assert_eq!(
            table.rows()[0].get("description"),
            Some("Desk, \"oak\"\nline two")
        );
    }

    #[test]
    fn test_parse_is_repeatable() {
        let csv = "amount,description\n1,a\n2,b\n";
        let parser = TabularParser::new();
        let first = parser.parse(csv.as_bytes(), FileKind::Csv).unwrap();
        let second = parser.parse(csv.as_bytes(), FileKind::Csv).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_header_only_is_malformed() {
        let err = TabularParser::new()
            .parse(b"amount,description\n", FileKind::Csv)
            .unwrap_err();
        assert_eq!(err.kind(), "malformed");
    }

    #[test]
    fn test_empty_file_is_malformed() {
        let err = TabularParser::new().parse(b"\n\n", FileKind::Csv).unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn test_duplicate_headers_are_suffixed() {
        let csv = "amount,Amount,note\n1,2,x\n";
        let table = TabularParser::new().parse(csv.as_bytes(), FileKind::Csv).unwrap();
        assert_eq!(table.headers(), &["amount", "amount_2", "note"]);
        assert_eq!(table.rows()[0].get("amount_2"), Some("2"));
    }

    #[test]
    fn test_bom_is_stripped() {
        let csv = "\u{feff}Amount,Description\n1,a\n";
        let table = TabularParser::new().parse(csv.as_bytes(), FileKind::Csv).unwrap();
        assert_eq!(table.headers()[0], "amount");
    }

    #[test]
    fn test_garbage_spreadsheet_is_rejected() {
        let err = TabularParser::new()
            .parse(b"definitely not a workbook", FileKind::Xlsx)
            .unwrap_err();
        assert!(matches!(err, ParseError::Spreadsheet(_)));
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::Float(12.0)), "12");
        assert_eq!(cell_to_string(&Data::Float(12.5)), "12.5");
        assert_eq!(cell_to_string(&Data::Int(7)), "7");
        assert_eq!(cell_to_string(&Data::String("Lunch".into())), "Lunch");
        assert_eq!(cell_to_string(&Data::Bool(true)), "true");
    }

    fn date_cell(serial: f64, is_1904: bool) -> Data {
        Data::DateTime(ExcelDateTime::new(serial, ExcelDateTimeType::DateTime, is_1904))
    }

    #[test]
    fn test_excel_dates_to_iso() {
        assert_eq!(cell_to_string(&date_cell(45667.0, false)), "2025-01-10");
        assert_eq!(cell_to_string(&date_cell(45667.5, false)), "2025-01-10T12:00:00");
    }

    #[test]
    fn test_excel_dates_1904_epoch() {
        assert_eq!(cell_to_string(&date_cell(0.0, true)), "1904-01-01");
        assert_eq!(cell_to_string(&date_cell(44205.0, true)), "2025-01-10");
    }

    #[test]
    fn test_out_of_range_excel_dates_stay_numeric() {
        assert_eq!(cell_to_string(&date_cell(1.0e12, false)), "1000000000000");
        assert_eq!(cell_to_string(&date_cell(-1.0e12, true)), "-1000000000000");
        assert_eq!(cell_to_string(&date_cell(f64::INFINITY, false)), "inf");
    }

    #[test]
    fn test_duplicate_header_suffix_skips_real_headers() {
        let csv = "amount,Amount,amount_2,description\n1,2,3,x\n";
        let table = TabularParser::new().parse(csv.as_bytes(), FileKind::Csv).unwrap();

        assert_eq!(
            table.headers(),
            &["amount", "amount_3", "amount_2", "description"]
        );
        let distinct: HashSet<&String> = table.headers().iter().collect();
        assert_eq!(distinct.len(), table.headers().len());
        assert_eq!(table.rows()[0].get("amount_3"), Some("2"));
        assert_eq!(table.rows()[0].get("amount_2"), Some("3"));
    }

    #[test]
    fn test_parse_xlsx_reads_first_sheet() {
        let data = include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/expenses.xlsx"
        ));
        let table = TabularParser::new().parse(data, FileKind::Xlsx).unwrap();

        assert_eq!(table.headers(), &["date", "description", "amount", "category"]);
        assert_eq!(table.rows().len(), 2);

        let first = &table.rows()[0];
        assert_eq!(first.get("date"), Some("2024-03-01"));
        assert_eq!(first.get("description"), Some("Coffee"));
        assert_eq!(first.get("amount"), Some("4.5"));
        assert_eq!(first.get("category"), Some("Food"));

        let second = &table.rows()[1];
        assert_eq!(second.index(), 2);
        assert_eq!(second.get("date"), Some("2024-03-02"));
        assert_eq!(second.get("amount"), Some("2"));
        assert_eq!(second.get("category"), Some(""));
    }

    #[test]
    fn test_file_kind_from_path() {
        assert_eq!(FileKind::from_path(Path::new("x.CSV")).unwrap(), FileKind::Csv);
        assert_eq!(FileKind::from_path(Path::new("x.xlsx")).unwrap(), FileKind::Xlsx);
        assert!(FileKind::from_path(Path::new("x.pdf")).is_err());
    }
}
