//! Pipe-delimited statement tables.
//!
//! Every table is laid out as blocks separated by dash-only divider lines:
//!
//! ```text
//!                 成交记录 Transaction Record      <- None
//! ---------------------------------------------
//! |成交日期|交易所|...|                          <- Header
//! ---------------------------------------------
//! | 20230215 | SHFE | ... |                     <- Details
//! ---------------------------------------------
//! |共   1条| ... |                              <- Total
//! ---------------------------------------------
//! 能源中心—INE ...                              <- Comment
//! ```
//!
//! Only the details block carries records.

use tracing::{debug, warn};

use super::SectionKind;
use crate::error::ParseError;

/// Position of the cursor within a table, advanced by divider lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LineStatus {
    #[default]
    None,
    Header,
    Details,
    Total,
    Comment,
}

impl LineStatus {
    /// Status after the next divider. `Comment` is final.
    pub const fn next(self) -> Self {
        match self {
            LineStatus::None => LineStatus::Header,
            LineStatus::Header => LineStatus::Details,
            LineStatus::Details => LineStatus::Total,
            LineStatus::Total | LineStatus::Comment => LineStatus::Comment,
        }
    }
}

/// What to do with a row or section that fails to parse.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RowErrorPolicy {
    /// Abort the parse with the error.
    #[default]
    Raise,

    /// Record the error as a diagnostic and go on.
    Skip,
}

/// Record type parsed from one details row.
pub trait TableRecord: Sized {
    /// Section the table lives in.
    const SECTION: SectionKind;

    /// Field names, in cell order.
    const FIELDS: &'static [&'static str];

    fn from_cells(cells: &Cells<'_>) -> Result<Self, ParseError>;
}

/// Cells of a details row, with typed positional accessors.
#[derive(Clone, Debug)]
pub struct Cells<'a> {
    section: SectionKind,
    fields: &'static [&'static str],
    line: &'a str,
    cells: Vec<&'a str>,
}

impl<'a> Cells<'a> {
    pub fn new(
        section: SectionKind,
        fields: &'static [&'static str],
        line: &'a str,
        cells: Vec<&'a str>,
    ) -> Self {
        Self {
            section,
            fields,
            line,
            cells,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn line(&self) -> &'a str {
        self.line
    }

    fn cell(&self, idx: usize) -> Result<&'a str, ParseError> {
        self.cells
            .get(idx)
            .copied()
            .ok_or_else(|| ParseError::MalformedRow {
                section: self.section,
                line: self.line.to_string(),
                reason: format!("missing cell {idx}"),
            })
    }

    fn field(&self, idx: usize) -> &'static str {
        self.fields.get(idx).copied().unwrap_or("?")
    }

    pub fn text(&self, idx: usize) -> Result<String, ParseError> {
        Ok(self.cell(idx)?.to_string())
    }

    pub fn float(&self, idx: usize) -> Result<f64, ParseError> {
        parse_float(self.section, self.field(idx), self.cell(idx)?, self.line)
    }

    pub fn int(&self, idx: usize) -> Result<i64, ParseError> {
        let value = self.cell(idx)?;
        value.parse().map_err(|_| ParseError::InvalidNumber {
            section: self.section,
            field: self.field(idx),
            value: value.to_string(),
            line: self.line.to_string(),
        })
    }
}

/// Parses a decimal value. A trailing percent sign is dropped, thousands
/// separators and non-finite values (`NaN`, `inf`) are rejected.
pub(crate) fn parse_float(
    section: SectionKind,
    field: &'static str,
    value: &str,
    line: &str,
) -> Result<f64, ParseError> {
    let invalid = || ParseError::InvalidNumber {
        section,
        field,
        value: value.to_string(),
        line: line.to_string(),
    };
    if value.contains(',') {
        return Err(invalid());
    }
    let digits = value.strip_suffix('%').unwrap_or(value);
    match digits.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(invalid()),
    }
}

/// Whether the line is a table divider: dashes only, surrounding whitespace
/// aside.
pub fn is_divider(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && line.chars().all(|c| c == '-')
}

/// Splits a row into cells: whitespace removed, border glyphs dropped, rest
/// split on `|`.
pub fn extract_cells(line: &str) -> Vec<String> {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    let mut chars = compact.chars();
    chars.next();
    chars.next_back();
    let inner = chars.as_str();
    if inner.is_empty() {
        return vec![];
    }
    inner.split('|').map(str::to_string).collect()
}

/// Parses the details block of a table section into records.
///
/// Rows with fewer cells than [`TableRecord::FIELDS`] are malformed, extra
/// cells are ignored.
pub fn parse_table<T: TableRecord, S: AsRef<str>>(
    lines: &[S],
    policy: RowErrorPolicy,
    diagnostics: &mut Vec<ParseError>,
) -> Result<Vec<T>, ParseError> {
    let mut status = LineStatus::None;
    let mut records = vec![];

    for line in lines {
        let line = line.as_ref();
        if is_divider(line) {
            status = status.next();
            continue;
        }
        // Header, total and comment blocks carry nothing to extract
        if status != LineStatus::Details || line.trim().is_empty() {
            continue;
        }

        match parse_row::<T>(line) {
            Ok(record) => records.push(record),
            Err(err) => match policy {
                RowErrorPolicy::Raise => return Err(err),
                RowErrorPolicy::Skip => {
                    warn!(section = %T::SECTION, %err, "row skipped");
                    diagnostics.push(err);
                }
            },
        }
    }

    debug!(section = %T::SECTION, rows = records.len(), "table parsed");
    Ok(records)
}

fn parse_row<T: TableRecord>(line: &str) -> Result<T, ParseError> {
    let owned = extract_cells(line);
    if owned.len() < T::FIELDS.len() {
        return Err(ParseError::MalformedRow {
            section: T::SECTION,
            line: line.to_string(),
            reason: format!("expected {} cells, found {}", T::FIELDS.len(), owned.len()),
        });
    }
    let cells = Cells::new(
        T::SECTION,
        T::FIELDS,
        line,
        owned.iter().map(String::as_str).collect(),
    );
    T::from_cells(&cells)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Pair {
        name: String,
        qty: i64,
        price: f64,
    }

    impl TableRecord for Pair {
        const SECTION: SectionKind = SectionKind::Transactions;
        const FIELDS: &'static [&'static str] = &["name", "qty", "price"];

        fn from_cells(cells: &Cells<'_>) -> Result<Self, ParseError> {
            Ok(Self {
                name: cells.text(0)?,
                qty: cells.int(1)?,
                price: cells.float(2)?,
            })
        }
    }

    fn pair(name: &str, qty: i64, price: f64) -> Pair {
        Pair {
            name: name.to_string(),
            qty,
            price,
        }
    }

    #[rstest]
    #[case::plain("12.5", Some(12.5))]
    #[case::negative("-3", Some(-3.0))]
    #[case::percent("95.20%", Some(95.2))]
    #[case::comma("1,234", None)]
    #[case::empty("", None)]
    #[case::text("abc", None)]
    #[case::nan("NaN", None)]
    #[case::inf("inf", None)]
    #[case::infinity("-infinity", None)]
    fn test_parse_float(#[case] value: &str, #[case] expected: Option<f64>) {
        let parsed = parse_float(SectionKind::Statement, "v", value, "line").ok();
        assert_eq!(parsed, expected);
    }

    #[rstest]
    #[case::dashes("-----", true)]
    #[case::padded("   ----- \r", true)]
    #[case::single("-", true)]
    #[case::empty("", false)]
    #[case::row("|--|", false)]
    #[case::negative("-1", false)]
    fn test_is_divider(#[case] line: &str, #[case] expected: bool) {
        assert_eq!(is_divider(line), expected);
    }

    #[test]
    fn test_extract_cells() {
        assert_eq!(extract_cells("| a b | 1 |  2.0 |"), vec!["ab", "1", "2.0"]);
        assert_eq!(extract_cells("|成交|手数|"), vec!["成交", "手数"]);
        assert!(extract_cells("||").is_empty());
        assert!(extract_cells("  ").is_empty());
    }

    #[test]
    fn test_line_status_sequence() {
        let mut status = LineStatus::default();
        let mut seen = vec![status];
        for _ in 0..5 {
            status = status.next();
            seen.push(status);
        }
        assert_eq!(
            seen,
            vec![
                LineStatus::None,
                LineStatus::Header,
                LineStatus::Details,
                LineStatus::Total,
                LineStatus::Comment,
                LineStatus::Comment,
            ]
        );
    }

    #[test]
    fn test_only_details_block_parsed() {
        let lines = [
            "| x | 9 | 9.0 |",
            "-----",
            "| name | qty | price |",
            "-----",
            "| a | 1 | 1.5 |",
            "",
            "| b | 2 | 2.5 |",
            "-----",
            "| total | 3 | 4.0 |",
            "-----",
            "| comment | 0 | 0 |",
        ];
        let rows: Vec<Pair> = parse_table(&lines, RowErrorPolicy::Raise, &mut vec![]).unwrap();
        assert_eq!(rows, vec![pair("a", 1, 1.5), pair("b", 2, 2.5)]);
    }

    #[test]
    fn test_short_row_raises() {
        let lines = ["-", "-", "| a | 1 |"];
        let err = parse_table::<Pair, _>(&lines, RowErrorPolicy::Raise, &mut vec![]).unwrap_err();
        assert_eq!(
            err,
            ParseError::MalformedRow {
                section: SectionKind::Transactions,
                line: "| a | 1 |".to_string(),
                reason: "expected 3 cells, found 2".to_string(),
            }
        );
    }

    #[test]
    fn test_skip_policy_collects_diagnostics() {
        let lines = ["-", "-", "| a | 1 |", "| b | x | 1 |", "| c | 3 | 3 | extra |"];
        let mut diagnostics = vec![];
        let rows: Vec<Pair> = parse_table(&lines, RowErrorPolicy::Skip, &mut diagnostics).unwrap();
        assert_eq!(rows, vec![pair("c", 3, 3.0)]);
        assert_eq!(diagnostics.len(), 2);
        assert!(matches!(diagnostics[0], ParseError::MalformedRow { .. }));
        assert!(matches!(
            diagnostics[1],
            ParseError::InvalidNumber { field: "qty", .. }
        ));
    }
}
