//! Key-value account header of the statement section.

use std::{collections::BTreeMap, sync::OnceLock};

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use super::{SectionKind, table::parse_float};
use crate::error::ParseError;

/// Client, date and account summary values of the statement.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StatementHeader {
    pub client_id: String,
    pub date: String,

    /// Summary values keyed by their label with whitespace removed,
    /// e.g. `期初结存Balanceb/f`. Percentages are stored without the sign,
    /// so `95.20%` becomes `95.2`.
    pub details: BTreeMap<String, f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    ClientId,
    Date,
    Details,
}

#[allow(clippy::expect_used)] // Patterns are constant
fn client_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Client ID：\s*(\d+)").expect("client id regex is valid"))
}

#[allow(clippy::expect_used)]
fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Date：\s*(\d+)").expect("date regex is valid"))
}

/// `label：number` pair. Labels may hold digits and single spaces, a run of
/// two or more spaces separates pairs on the same line.
#[allow(clippy::expect_used)]
fn detail_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([^：\s](?:\s?[^：\s])*)\s*：+\s*(-?\d[\d.,]*%?)")
            .expect("detail regex is valid")
    })
}

/// Parses the statement section.
///
/// Lines are consumed in three phases: up to the client id, then up to the
/// date, then every remaining line is scanned for `label：number` pairs. A
/// repeated label overwrites the earlier value.
pub fn parse_header<S: AsRef<str>>(lines: &[S]) -> Result<StatementHeader, ParseError> {
    let mut phase = Phase::ClientId;
    let mut header = StatementHeader::default();

    for line in lines {
        let line = line.as_ref();
        match phase {
            Phase::ClientId => {
                if let Some(caps) = client_id_regex().captures(line) {
                    header.client_id = caps[1].to_string();
                    phase = Phase::Date;
                }
            }
            Phase::Date => {
                if let Some(caps) = date_regex().captures(line) {
                    header.date = caps[1].to_string();
                    phase = Phase::Details;
                }
            }
            Phase::Details => {
                for caps in detail_regex().captures_iter(line) {
                    let label: String = caps[1].chars().filter(|c| !c.is_whitespace()).collect();
                    if label.is_empty() {
                        continue;
                    }
                    let value = parse_float(SectionKind::Statement, "details", &caps[2], line)?;
                    header.details.insert(label, value);
                }
            }
        }
    }

    match phase {
        Phase::ClientId => Err(ParseError::PatternNotFound {
            section: SectionKind::Statement,
            pattern: "client id",
        }),
        Phase::Date => Err(ParseError::PatternNotFound {
            section: SectionKind::Statement,
            pattern: "date",
        }),
        Phase::Details => {
            debug!(client_id = %header.client_id, date = %header.date, details = header.details.len(), "statement header");
            Ok(header)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_then_date() {
        let lines = [
            "交易结算单(盯市)",
            "Date：19700101 appears before the client id and is ignored",
            "unrelated",
            "客户号 Client ID：  203199          客户名称 Client Name：某某",
            "unrelated",
            "日期 Date：20230215",
        ];
        let header = parse_header(&lines).unwrap();
        assert_eq!(header.client_id, "203199");
        assert_eq!(header.date, "20230215");
        assert!(header.details.is_empty());
    }

    #[test]
    fn test_details() {
        let lines = [
            "Client ID：1",
            "Date：20230215",
            "期初结存 Balance b/f：          1000000.00  基础保证金 Initial Margin：          0.00",
            "币种：人民币  Currency：CNY",
            "平仓盈亏 Realized P/L：   -200.50",
            "风险度 Risk Degree：    95.20%",
            "平仓盈亏 Realized P/L：   100.00",
        ];
        let header = parse_header(&lines).unwrap();
        assert_eq!(header.details["期初结存Balanceb/f"], 1000000.0);
        assert_eq!(header.details["基础保证金InitialMargin"], 0.0);
        assert_eq!(header.details["风险度RiskDegree"], 95.2);
        // Last write wins
        assert_eq!(header.details["平仓盈亏RealizedP/L"], 100.0);
        assert_eq!(header.details.len(), 4);
    }

    #[test]
    fn test_detail_labels_stay_apart() {
        let lines = [
            "Client ID：1",
            "Date：20230215",
            "保证金 Margin：7.00",
            "币种：人民币  可用资金 Fund Avail.：100.00",
            "T+1 Margin：5.00",
        ];
        let header = parse_header(&lines).unwrap();
        assert_eq!(
            header.details.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["T+1Margin", "保证金Margin", "可用资金FundAvail."]
        );
        assert_eq!(header.details["保证金Margin"], 7.0);
        assert_eq!(header.details["T+1Margin"], 5.0);
        assert_eq!(header.details["可用资金FundAvail."], 100.0);
    }

    #[test]
    fn test_missing_patterns() {
        let err = parse_header(&["nothing", "here"]).unwrap_err();
        assert_eq!(
            err,
            ParseError::PatternNotFound {
                section: SectionKind::Statement,
                pattern: "client id"
            }
        );

        let err = parse_header(&["Client ID：203199"]).unwrap_err();
        assert!(matches!(err, ParseError::PatternNotFound { pattern: "date", .. }));
    }

    #[test]
    fn test_comma_in_value_rejected() {
        let lines = ["Client ID：1", "Date：2", "期初结存 Balance b/f：1,000,000.00"];
        assert!(matches!(
            parse_header(&lines),
            Err(ParseError::InvalidNumber { section: SectionKind::Statement, ref value, .. }) if value == "1,000,000.00"
        ));
    }
}
