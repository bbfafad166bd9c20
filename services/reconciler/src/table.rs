//! Sheet snapshots and the typed-conversion boundary
//!
//! Every cell arrives as text. Quantities and flags only enter the typed
//! model through `parse_qty` and `parse_flag`; dates go through `signals`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::columns::normalize_label;

/// Rows inspected when the header row is `Auto`.
pub const HEADER_PROBE_ROWS: usize = 10;

/// Header labels that mark the header row of a style sheet. A cell must equal
/// one of these after normalization; title rows merely mentioning a keyword
/// do not count.
pub const HEADER_KEYWORDS: &[&str] = &[
    "스타일코드",
    "스타일",
    "품번",
    "상품코드",
    "품목코드",
    "style",
    "stylecode",
    "style_code",
    "sku",
];

// =============================================================================
// Header row selection
// =============================================================================

/// Which grid row holds the column headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderRow {
    /// Probe the first rows for a header keyword
    #[default]
    Auto,
    /// Fixed 0-based row index
    Index(usize),
}

impl FromStr for HeaderRow {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("auto") {
            return Ok(HeaderRow::Auto);
        }
        value
            .parse::<usize>()
            .map(HeaderRow::Index)
            .map_err(|_| format!("invalid header row '{}': expected 'auto' or a row index", value))
    }
}

impl fmt::Display for HeaderRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderRow::Auto => write!(f, "auto"),
            HeaderRow::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Index of the first probed row with a cell whose whole label is one of
/// `keywords`, or 0.
pub fn detect_header_row(grid: &[Vec<String>], keywords: &[&str]) -> usize {
    let keywords: Vec<String> = keywords.iter().map(|k| normalize_label(k)).collect();
    grid.iter()
        .take(HEADER_PROBE_ROWS)
        .position(|row| {
            row.iter().any(|cell| {
                let label = normalize_label(cell);
                !label.is_empty() && keywords.iter().any(|k| *k == label)
            })
        })
        .unwrap_or(0)
}

// =============================================================================
// Sheet
// =============================================================================

/// One snapshot of a source sheet: trimmed headers plus text rows.
///
/// Rows may be ragged; a missing cell reads as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            headers: headers.into_iter().map(|h| h.trim().to_string()).collect(),
            rows,
        }
    }

    /// Build a sheet from a raw grid, picking the header row and dropping
    /// blank rows below it.
    pub fn from_grid(grid: Vec<Vec<String>>, header_row: HeaderRow) -> Self {
        let index = match header_row {
            HeaderRow::Auto => detect_header_row(&grid, HEADER_KEYWORDS),
            HeaderRow::Index(i) => i,
        };
        let mut rows = grid.into_iter().skip(index);
        let headers = rows.next().unwrap_or_default();
        let rows = rows
            .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
            .collect();
        Self::new(headers, rows)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first column named exactly `name`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn records(&self) -> impl Iterator<Item = RawRecord<'_>> {
        self.rows.iter().map(move |row| RawRecord { sheet: self, row })
    }

    /// Values of one column, one per row.
    pub fn column_values(&self, index: usize) -> Vec<&str> {
        self.rows
            .iter()
            .map(|row| row.get(index).map(String::as_str).unwrap_or(""))
            .collect()
    }

    pub fn rename_column(&mut self, index: usize, name: &str) {
        if let Some(header) = self.headers.get_mut(index) {
            *header = name.to_string();
        }
    }

    /// Append a column; `values` is aligned with the existing rows.
    pub fn push_column(&mut self, name: &str, values: Vec<String>) {
        let width = self.headers.len();
        self.headers.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.resize(width, String::new());
            row.push(value);
        }
    }
}

/// Borrowed view of one sheet row addressed by column name.
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    sheet: &'a Sheet,
    row: &'a [String],
}

impl<'a> RawRecord<'a> {
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let index = self.sheet.column(column)?;
        Some(self.row.get(index).map(String::as_str).unwrap_or(""))
    }

    /// Trimmed cell text, empty when the column is absent.
    pub fn text(&self, column: &str) -> String {
        self.get(column).unwrap_or("").trim().to_string()
    }

    pub fn qty(&self, column: &str) -> u64 {
        self.get(column).map(parse_qty).unwrap_or(0)
    }

    pub fn flag(&self, column: &str) -> bool {
        self.get(column).map(parse_flag).unwrap_or(false)
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// What a source produced for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Loaded {
        sheet: Sheet,
        /// Content fingerprint, e.g. `sha256:<hex>`
        fingerprint: Option<String>,
    },
    Unavailable {
        reason: String,
    },
}

impl Snapshot {
    pub fn loaded(sheet: Sheet) -> Self {
        Snapshot::Loaded {
            sheet,
            fingerprint: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Snapshot::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn fingerprint(&self) -> Option<&str> {
        match self {
            Snapshot::Loaded { fingerprint, .. } => fingerprint.as_deref(),
            Snapshot::Unavailable { .. } => None,
        }
    }
}

// =============================================================================
// Tolerant scalar parsers
// =============================================================================

/// Non-negative quantity; anything unparseable or negative is 0.
pub fn parse_qty(raw: &str) -> u64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return 0;
    }
    if let Ok(n) = cleaned.parse::<i64>() {
        return n.max(0) as u64;
    }
    match cleaned.parse::<f64>() {
        Ok(f) if f.is_finite() && f > 0.0 => f.trunc() as u64,
        _ => 0,
    }
}

/// 0/1 style flag. Accepts the spellings people type into sheets.
pub fn parse_flag(raw: &str) -> bool {
    let value = raw.trim().to_lowercase();
    match value.as_str() {
        "" | "0" | "n" | "no" | "false" | "x" | "미완료" => false,
        "1" | "y" | "yes" | "true" | "o" | "v" | "완료" | "✓" | "✔" => true,
        other => other.parse::<f64>().map(|f| f > 0.0).unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    // -------------------------------------------------------------------------
    // HEADER ROW TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_header_row_parse() {
        assert_eq!("auto".parse::<HeaderRow>().unwrap(), HeaderRow::Auto);
        assert_eq!("".parse::<HeaderRow>().unwrap(), HeaderRow::Auto);
        assert_eq!(" 2 ".parse::<HeaderRow>().unwrap(), HeaderRow::Index(2));
        assert!("second".parse::<HeaderRow>().is_err());
    }

    #[test]
    fn test_detect_header_row_skips_title_rows() {
        let g = grid(&[
            &["2026 SS 촬영 현황", ""],
            &["", ""],
            &["스타일코드", "리터칭 완료일"],
            &["CV0000F2", "2026-03-01"],
        ]);
        assert_eq!(detect_header_row(&g, HEADER_KEYWORDS), 2);
    }

    #[test]
    fn test_title_row_mentioning_keyword_is_not_header() {
        let g = grid(&[
            &["26SS 스타일 촬영 현황", ""],
            &["품번", "리터칭 완료일"],
            &["CV0000F2", "2026-03-01"],
        ]);
        let sheet = Sheet::from_grid(g, HeaderRow::Auto);
        assert_eq!(sheet.headers(), &["품번".to_string(), "리터칭 완료일".to_string()]);
        assert_eq!(sheet.len(), 1);
    }

    #[test]
    fn test_detect_header_row_matches_spaced_labels() {
        let g = grid(&[&["현황", ""], &["Style Code", "등록일"]]);
        assert_eq!(detect_header_row(&g, HEADER_KEYWORDS), 1);
    }

    #[test]
    fn test_detect_header_row_defaults_to_first() {
        let g = grid(&[&["a", "b"], &["1", "2"]]);
        assert_eq!(detect_header_row(&g, HEADER_KEYWORDS), 0);
    }

    #[test]
    fn test_from_grid_drops_blank_rows() {
        let g = grid(&[
            &["title"],
            &[" 스타일코드 ", "입고수량"],
            &["SP00001G1", "10"],
            &["", " "],
            &["SP00002G1", "3"],
        ]);
        let sheet = Sheet::from_grid(g, HeaderRow::Auto);
        assert_eq!(sheet.headers(), &["스타일코드".to_string(), "입고수량".to_string()]);
        assert_eq!(sheet.len(), 2);
    }

    #[test]
    fn test_from_grid_fixed_index() {
        let g = grid(&[&["x", "y"], &["style", "qty"], &["A", "1"]]);
        let sheet = Sheet::from_grid(g, HeaderRow::Index(1));
        assert_eq!(sheet.column("qty"), Some(1));
        assert_eq!(sheet.len(), 1);
    }

    // -------------------------------------------------------------------------
    // RECORD ACCESS TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_ragged_rows_read_as_empty() {
        let sheet = Sheet::new(
            vec!["a".into(), "b".into()],
            vec![vec!["1".into()]],
        );
        let record = sheet.records().next().unwrap();
        assert_eq!(record.get("b"), Some(""));
        assert_eq!(record.get("missing"), None);
        assert_eq!(record.text("missing"), "");
    }

    #[test]
    fn test_push_column_pads_short_rows() {
        let mut sheet = Sheet::new(
            vec!["a".into(), "b".into()],
            vec![vec!["1".into()], vec!["2".into(), "3".into()]],
        );
        sheet.push_column("c", vec!["x".into(), "y".into()]);
        let values = sheet.column_values(2);
        assert_eq!(values, vec!["x", "y"]);
    }

    // -------------------------------------------------------------------------
    // SCALAR PARSER TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_qty_tolerant() {
        assert_eq!(parse_qty("10"), 10);
        assert_eq!(parse_qty(" 1,250 "), 1250);
        assert_eq!(parse_qty("3.0"), 3);
        assert_eq!(parse_qty("-4"), 0);
        assert_eq!(parse_qty("abc"), 0);
        assert_eq!(parse_qty(""), 0);
        assert_eq!(parse_qty("NaN"), 0);
    }

    #[test]
    fn test_parse_flag_spellings() {
        for yes in ["1", "Y", "yes", "TRUE", "O", "완료", "1.0"] {
            assert!(parse_flag(yes), "{} should be set", yes);
        }
        for no in ["", "0", "N", "false", "x", "미완료", "maybe"] {
            assert!(!parse_flag(no), "{} should be unset", no);
        }
    }
}
