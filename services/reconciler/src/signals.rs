//! Date-signal interpreter
//!
//! Brand sheets record "this happened" by typing a date into a column. The
//! dates are hand-typed, locale-inconsistent, sometimes spreadsheet serials,
//! sometimes placeholders. A cell counts as done when it parses as a date
//! under any strategy, or still looks like one after every parse failed and
//! is not a known placeholder. Ambiguous date-like text is counted as done.

use chrono::{Days, NaiveDate, NaiveDateTime};

use crate::columns::{normalize_label, Field};
use crate::table::{parse_flag, Sheet};

/// How to locate one done-signal column in a brand sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalColumn {
    /// Substring marking the column, compared on normalized labels
    pub keyword: &'static str,
    /// Fixed label matched exactly after normalization
    pub label: &'static str,
    /// Explicit 0/1 field used when no date column exists
    pub fallback: Field,
}

/// Photography / retouch completion.
pub const RETOUCH_DONE: SignalColumn = SignalColumn {
    keyword: "리터칭완료",
    label: "촬영완료일",
    fallback: Field::IsShot,
};

/// Official-site registration.
pub const REGISTRATION_DONE: SignalColumn = SignalColumn {
    keyword: "공홈등록",
    label: "등록일",
    fallback: Field::IsRegistered,
};

/// Cell values that mean "not yet", never done.
pub const PLACEHOLDERS: &[&str] = &["-", ".", "미정", "n/a", "—"];

/// Spreadsheet serial day numbers considered plausible (1982-02-18 .. 2064-04-08).
pub const SERIAL_MIN: f64 = 30_000.0;
pub const SERIAL_MAX: f64 = 60_000.0;

const DATE_SEPARATORS: &[char] = &['-', '/', '.'];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%Y%m%d",
    "%m/%d/%Y",
    "%y-%m-%d",
    "%y/%m/%d",
    "%y.%m.%d",
    "%Y년 %m월 %d일",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y. %m. %d %H:%M:%S",
];

// =============================================================================
// Column selection
// =============================================================================

/// Locate a done-signal column. First hit wins:
/// exact preferred name, normalized preferred name, keyword substring,
/// normalized fixed label.
pub fn find_signal_column(
    columns: &[String],
    preferred: Option<&str>,
    signal: &SignalColumn,
) -> Option<usize> {
    let preferred = preferred.map(str::trim).filter(|p| !p.is_empty());

    if let Some(name) = preferred {
        if let Some(i) = columns.iter().position(|c| c == name) {
            return Some(i);
        }
        let wanted = normalize_label(name);
        if let Some(i) = columns.iter().position(|c| normalize_label(c) == wanted) {
            return Some(i);
        }
    }

    let keyword = normalize_label(signal.keyword);
    if let Some(i) = columns
        .iter()
        .position(|c| normalize_label(c).contains(keyword.as_str()))
    {
        return Some(i);
    }

    let label = normalize_label(signal.label);
    columns.iter().position(|c| normalize_label(c) == label)
}

/// Column carrying photography / retouch completion dates.
pub fn column_for_done_signal(columns: &[String], preferred: Option<&str>) -> Option<usize> {
    find_signal_column(columns, preferred, &RETOUCH_DONE)
}

/// Column carrying official-site registration dates.
pub fn column_for_registration(columns: &[String], preferred: Option<&str>) -> Option<usize> {
    find_signal_column(columns, preferred, &REGISTRATION_DONE)
}

// =============================================================================
// Cell interpretation
// =============================================================================

/// Whether a cell signals that the event occurred. Total over all input.
pub fn cell_looks_done(raw: &str) -> bool {
    let value = raw.trim();
    if value.is_empty() {
        return false;
    }
    if parse_cell_date(value).is_some() {
        return true;
    }
    !is_placeholder(value) && looks_like_date(value)
}

/// Parse a cell as a date: direct, separator-collapsed, then serial number.
pub fn parse_cell_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    parse_date_text(value)
        .or_else(|| {
            let collapsed = collapse_separators(value);
            if collapsed == value {
                None
            } else {
                parse_date_text(&collapsed)
            }
        })
        .or_else(|| serial_to_date(value))
}

fn parse_date_text(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Drop whitespace touching a date separator and any trailing separator,
/// so `2025. 3. 14.` becomes `2025.3.14`.
fn collapse_separators(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());
    for (i, c) in chars.iter().enumerate() {
        if c.is_whitespace() {
            let prev = out.chars().last();
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            let touches_separator = prev.is_some_and(|p| DATE_SEPARATORS.contains(&p))
                || next.is_some_and(|n| DATE_SEPARATORS.contains(n));
            if touches_separator {
                continue;
            }
        }
        out.push(*c);
    }
    out.trim_end_matches(DATE_SEPARATORS).to_string()
}

/// Spreadsheet serial day number, anchored at 1899-12-30.
pub fn serial_to_date(value: &str) -> Option<NaiveDate> {
    let serial: f64 = value.trim().parse().ok()?;
    if !serial.is_finite() || !(SERIAL_MIN..=SERIAL_MAX).contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.trunc() as u64))
}

fn is_placeholder(value: &str) -> bool {
    let lowered = value.to_lowercase();
    PLACEHOLDERS.iter().any(|p| *p == lowered)
}

/// A digit plus a date separator, or a bare integer in serial range.
fn looks_like_date(value: &str) -> bool {
    let has_digit = value.chars().any(|c| c.is_ascii_digit());
    let has_separator = value.contains(DATE_SEPARATORS);
    if has_digit && has_separator {
        return true;
    }
    value
        .parse::<i64>()
        .map(|n| (SERIAL_MIN..=SERIAL_MAX).contains(&(n as f64)))
        .unwrap_or(false)
}

// =============================================================================
// Series
// =============================================================================

/// Done-signal per row for `column`; without a column, fall back to the
/// signal's explicit flag field, else every row is not done.
pub fn done_series_for_column(sheet: &Sheet, column: Option<usize>, signal: &SignalColumn) -> Vec<bool> {
    if let Some(index) = column {
        return sheet
            .column_values(index)
            .into_iter()
            .map(cell_looks_done)
            .collect();
    }
    match sheet.column(signal.fallback.as_str()) {
        Some(index) => sheet
            .column_values(index)
            .into_iter()
            .map(parse_flag)
            .collect(),
        None => vec![false; sheet.len()],
    }
}
