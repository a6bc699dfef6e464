//! Settlement statement parsing.
//!
//! A statement is a fixed-layout text document made of titled sections:
//! a key-value account header followed by pipe-delimited tables. Parsing
//! happens in two passes, [`SectionSplitter`] first partitions the lines by
//! section title, then each present section is handed to its parser
//! ([`parse_header`] or [`parse_table`]).
//!
//! ```ignore
//! let report = ReportParser::new()
//!     .with_row_error_policy(RowErrorPolicy::Skip)
//!     .parse(&text)?;
//! for tx in &report.transactions {
//!     println!("{} {} {} @ {}", tx.instrument, tx.buy_sell, tx.lots, tx.price);
//! }
//! ```

mod header;
mod records;
mod splitter;
mod table;

use std::fmt::{self, Display};

use serde::Serialize;
use tracing::{debug, warn};

pub use header::{StatementHeader, parse_header};
pub use records::{ClosedPosition, PositionDetail, PositionSummary, Transaction};
pub use splitter::{Section, SectionSplitter, Sections};
pub use table::{Cells, LineStatus, RowErrorPolicy, TableRecord, extract_cells, is_divider, parse_table};

use crate::error::ParseError;

/// Statement section, identified by its title.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    /// Lines before the first recognized title.
    Preamble,

    /// Account header and summary (交易结算单).
    Statement,

    /// Trades of the day (成交记录).
    Transactions,

    /// Positions closed during the day (平仓明细).
    ClosedPositions,

    /// Open positions, one row per opening trade (持仓明细).
    PositionDetails,

    /// Open positions aggregated per instrument (持仓汇总).
    PositionSummary,
}

impl SectionKind {
    /// Titled sections, in the order titles are tried against a line.
    pub const TITLED: [SectionKind; 5] = [
        SectionKind::Statement,
        SectionKind::Transactions,
        SectionKind::ClosedPositions,
        SectionKind::PositionDetails,
        SectionKind::PositionSummary,
    ];

    /// Title text identifying the section, `None` for the preamble.
    pub const fn title(&self) -> Option<&'static str> {
        match self {
            SectionKind::Preamble => None,
            SectionKind::Statement => Some("交易结算单"),
            SectionKind::Transactions => Some("成交记录"),
            SectionKind::ClosedPositions => Some("平仓明细"),
            SectionKind::PositionDetails => Some("持仓明细"),
            SectionKind::PositionSummary => Some("持仓汇总"),
        }
    }
}

impl Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title().unwrap_or("preamble"))
    }
}

/// Structured settlement statement.
///
/// Sections absent from the document leave their field empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SettlementReport {
    pub header: Option<StatementHeader>,
    pub transactions: Vec<Transaction>,
    pub closed_positions: Vec<ClosedPosition>,
    pub position_details: Vec<PositionDetail>,
    pub position_summaries: Vec<PositionSummary>,

    /// Errors skipped under [`RowErrorPolicy::Skip`].
    #[serde(serialize_with = "serialize_diagnostics")]
    pub diagnostics: Vec<ParseError>,
}

fn serialize_diagnostics<S: serde::Serializer>(
    diagnostics: &[ParseError],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(diagnostics.iter().map(ToString::to_string))
}

/// Whole-document statement parser.
#[derive(Clone, Debug, Default)]
pub struct ReportParser {
    splitter: SectionSplitter,
    row_error_policy: RowErrorPolicy,
}

impl ReportParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only recognize section titles at the start of a line, see
    /// [`SectionSplitter::anchored`].
    pub fn with_anchored_titles(mut self, anchored: bool) -> Self {
        self.splitter = self.splitter.anchored(anchored);
        self
    }

    /// Sets what happens to malformed rows and header errors (default: raise).
    pub fn with_row_error_policy(mut self, policy: RowErrorPolicy) -> Self {
        self.row_error_policy = policy;
        self
    }

    pub fn splitter(&self) -> &SectionSplitter {
        &self.splitter
    }

    pub fn row_error_policy(&self) -> RowErrorPolicy {
        self.row_error_policy
    }

    /// Splits the text into lines and sections without parsing the sections.
    pub fn split<'a>(&self, text: &'a str) -> (Vec<&'a str>, Sections) {
        let lines: Vec<&str> = text.lines().collect();
        let sections = self.splitter.split(&lines);
        (lines, sections)
    }

    /// Parses a complete statement.
    ///
    /// Under [`RowErrorPolicy::Raise`] the first error aborts the parse.
    /// Under [`RowErrorPolicy::Skip`] errors are collected into
    /// [`SettlementReport::diagnostics`] and parsing goes on with the next row
    /// or section.
    pub fn parse(&self, text: &str) -> Result<SettlementReport, ParseError> {
        let (lines, sections) = self.split(text);
        let mut report = SettlementReport::default();

        for section in sections.iter() {
            let lines = section.lines(&lines);
            debug!(section = %section.kind, start = section.start, end = section.end, "parsing section");
            match section.kind {
                SectionKind::Preamble => {}
                SectionKind::Statement => match parse_header(lines) {
                    Ok(header) => report.header = Some(header),
                    Err(err) => self.skip_or_raise(err, &mut report.diagnostics)?,
                },
                SectionKind::Transactions => {
                    report.transactions = self.table(lines, &mut report.diagnostics)?
                }
                SectionKind::ClosedPositions => {
                    report.closed_positions = self.table(lines, &mut report.diagnostics)?
                }
                SectionKind::PositionDetails => {
                    report.position_details = self.table(lines, &mut report.diagnostics)?
                }
                SectionKind::PositionSummary => {
                    report.position_summaries = self.table(lines, &mut report.diagnostics)?
                }
            }
        }

        if !report.diagnostics.is_empty() {
            warn!(count = report.diagnostics.len(), "statement parsed with skipped errors");
        }
        Ok(report)
    }

    fn table<T: TableRecord>(
        &self,
        lines: &[&str],
        diagnostics: &mut Vec<ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        parse_table(lines, self.row_error_policy, diagnostics)
    }

    fn skip_or_raise(&self, err: ParseError, diagnostics: &mut Vec<ParseError>) -> Result<(), ParseError> {
        match self.row_error_policy {
            RowErrorPolicy::Raise => Err(err),
            RowErrorPolicy::Skip => {
                warn!(%err, "section skipped");
                diagnostics.push(err);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_titles() {
        assert_eq!(SectionKind::Preamble.title(), None);
        assert_eq!(SectionKind::PositionSummary.to_string(), "持仓汇总");
        assert_eq!(SectionKind::Preamble.to_string(), "preamble");
        assert!(SectionKind::TITLED.iter().all(|k| k.title().is_some()));
    }

    #[test]
    fn test_empty_document() {
        let report = ReportParser::new().parse("").unwrap();
        assert_eq!(report, SettlementReport::default());
    }

    #[test]
    fn test_header_error_skipped() {
        let text = "交易结算单\r\nno client id here\r\n";
        assert!(matches!(
            ReportParser::new().parse(text),
            Err(ParseError::PatternNotFound { section: SectionKind::Statement, .. })
        ));

        let report = ReportParser::new()
            .with_row_error_policy(RowErrorPolicy::Skip)
            .parse(text)
            .unwrap();
        assert!(report.header.is_none());
        assert_eq!(report.diagnostics.len(), 1);
    }
}
