//! Records of the statement tables, one type per table.

use serde::Serialize;

use super::{
    SectionKind,
    table::{Cells, TableRecord},
};
use crate::error::ParseError;

/// Trade of the day (成交记录).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Transaction {
    pub date: String,
    pub investment_unit: String,
    pub exchange: String,
    pub trading_code: String,
    pub product: String,
    pub instrument: String,
    pub buy_sell: String,
    pub speculation_hedge: String,
    pub open_close: String,
    pub price: f64,
    pub lots: i64,
    pub turnover: f64,
    pub fee: f64,
    pub realized_pnl: f64,
    pub premium: f64,
    pub trans_no: String,
    pub account_id: String,
}

impl TableRecord for Transaction {
    const SECTION: SectionKind = SectionKind::Transactions;
    const FIELDS: &'static [&'static str] = &[
        "date",
        "investment_unit",
        "exchange",
        "trading_code",
        "product",
        "instrument",
        "buy_sell",
        "speculation_hedge",
        "open_close",
        "price",
        "lots",
        "turnover",
        "fee",
        "realized_pnl",
        "premium",
        "trans_no",
        "account_id",
    ];

    fn from_cells(c: &Cells<'_>) -> Result<Self, ParseError> {
        Ok(Self {
            date: c.text(0)?,
            investment_unit: c.text(1)?,
            exchange: c.text(2)?,
            trading_code: c.text(3)?,
            product: c.text(4)?,
            instrument: c.text(5)?,
            buy_sell: c.text(6)?,
            speculation_hedge: c.text(7)?,
            open_close: c.text(8)?,
            price: c.float(9)?,
            lots: c.int(10)?,
            turnover: c.float(11)?,
            fee: c.float(12)?,
            realized_pnl: c.float(13)?,
            premium: c.float(14)?,
            trans_no: c.text(15)?,
            account_id: c.text(16)?,
        })
    }
}

/// Position closed during the day (平仓明细).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClosedPosition {
    pub close_date: String,
    pub investment_unit: String,
    pub exchange: String,
    pub trading_code: String,
    pub product: String,
    pub instrument: String,
    pub open_date: String,
    pub buy_sell: String,
    pub speculation_hedge: String,
    pub lots: i64,
    pub open_price: f64,
    pub prev_settle: f64,
    pub trans_price: f64,
    pub realized_pnl: f64,
    pub premium: f64,
    pub account_id: String,
}

impl TableRecord for ClosedPosition {
    const SECTION: SectionKind = SectionKind::ClosedPositions;
    const FIELDS: &'static [&'static str] = &[
        "close_date",
        "investment_unit",
        "exchange",
        "trading_code",
        "product",
        "instrument",
        "open_date",
        "buy_sell",
        "speculation_hedge",
        "lots",
        "open_price",
        "prev_settle",
        "trans_price",
        "realized_pnl",
        "premium",
        "account_id",
    ];

    fn from_cells(c: &Cells<'_>) -> Result<Self, ParseError> {
        Ok(Self {
            close_date: c.text(0)?,
            investment_unit: c.text(1)?,
            exchange: c.text(2)?,
            trading_code: c.text(3)?,
            product: c.text(4)?,
            instrument: c.text(5)?,
            open_date: c.text(6)?,
            buy_sell: c.text(7)?,
            speculation_hedge: c.text(8)?,
            lots: c.int(9)?,
            open_price: c.float(10)?,
            prev_settle: c.float(11)?,
            trans_price: c.float(12)?,
            realized_pnl: c.float(13)?,
            premium: c.float(14)?,
            account_id: c.text(15)?,
        })
    }
}

/// Open position, one per opening trade (持仓明细).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PositionDetail {
    pub investment_unit: String,
    pub exchange: String,
    pub trading_code: String,
    pub product: String,
    pub instrument: String,
    pub open_date: String,
    pub speculation_hedge: String,
    pub buy_sell: String,
    pub position: i64,
    pub open_price: f64,
    pub prev_settle: f64,
    pub settle: f64,
    pub accum_pnl: f64,
    pub mtm_pnl: f64,
    pub margin: f64,
    /// Option market value.
    pub market_value: f64,
    pub account_id: String,
}

impl TableRecord for PositionDetail {
    const SECTION: SectionKind = SectionKind::PositionDetails;
    const FIELDS: &'static [&'static str] = &[
        "investment_unit",
        "exchange",
        "trading_code",
        "product",
        "instrument",
        "open_date",
        "speculation_hedge",
        "buy_sell",
        "position",
        "open_price",
        "prev_settle",
        "settle",
        "accum_pnl",
        "mtm_pnl",
        "margin",
        "market_value",
        "account_id",
    ];

    fn from_cells(c: &Cells<'_>) -> Result<Self, ParseError> {
        Ok(Self {
            investment_unit: c.text(0)?,
            exchange: c.text(1)?,
            trading_code: c.text(2)?,
            product: c.text(3)?,
            instrument: c.text(4)?,
            open_date: c.text(5)?,
            speculation_hedge: c.text(6)?,
            buy_sell: c.text(7)?,
            position: c.int(8)?,
            open_price: c.float(9)?,
            prev_settle: c.float(10)?,
            settle: c.float(11)?,
            accum_pnl: c.float(12)?,
            mtm_pnl: c.float(13)?,
            margin: c.float(14)?,
            market_value: c.float(15)?,
            account_id: c.text(16)?,
        })
    }
}

/// Open positions aggregated per instrument (持仓汇总).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PositionSummary {
    pub investment_unit: String,
    pub exchange: String,
    pub trading_code: String,
    pub product: String,
    pub instrument: String,
    pub long_position: i64,
    pub avg_buy_price: f64,
    pub short_position: i64,
    pub avg_sell_price: f64,
    pub prev_settle: f64,
    pub settle: f64,
    pub mtm_pnl: f64,
    pub margin_occupied: f64,
    pub speculation_hedge: String,
    pub market_value_long: f64,
    pub market_value_short: f64,
}

impl TableRecord for PositionSummary {
    const SECTION: SectionKind = SectionKind::PositionSummary;
    const FIELDS: &'static [&'static str] = &[
        "investment_unit",
        "exchange",
        "trading_code",
        "product",
        "instrument",
        "long_position",
        "avg_buy_price",
        "short_position",
        "avg_sell_price",
        "prev_settle",
        "settle",
        "mtm_pnl",
        "margin_occupied",
        "speculation_hedge",
        "market_value_long",
        "market_value_short",
    ];

    fn from_cells(c: &Cells<'_>) -> Result<Self, ParseError> {
        Ok(Self {
            investment_unit: c.text(0)?,
            exchange: c.text(1)?,
            trading_code: c.text(2)?,
            product: c.text(3)?,
            instrument: c.text(4)?,
            long_position: c.int(5)?,
            avg_buy_price: c.float(6)?,
            short_position: c.int(7)?,
            avg_sell_price: c.float(8)?,
            prev_settle: c.float(9)?,
            settle: c.float(10)?,
            mtm_pnl: c.float(11)?,
            margin_occupied: c.float(12)?,
            speculation_hedge: c.text(13)?,
            market_value_long: c.float(14)?,
            market_value_short: c.float(15)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells<T: TableRecord>(line: &str) -> Result<T, ParseError> {
        let owned = crate::report::extract_cells(line);
        let cells = Cells::new(T::SECTION, T::FIELDS, line, owned.iter().map(String::as_str).collect());
        T::from_cells(&cells)
    }

    #[test]
    fn test_field_counts() {
        assert_eq!(Transaction::FIELDS.len(), 17);
        assert_eq!(ClosedPosition::FIELDS.len(), 16);
        assert_eq!(PositionDetail::FIELDS.len(), 17);
        assert_eq!(PositionSummary::FIELDS.len(), 16);
    }

    #[test]
    fn test_closed_position() {
        let row = "|20230215|U1|SHFE|T01|cu|cu2305|20230210|卖|投|2|69000.0|69500.0|70000.0|10000.0|0.0|A001|";
        let closed: ClosedPosition = cells(row).unwrap();
        assert_eq!(closed.open_date, "20230210");
        assert_eq!(closed.lots, 2);
        assert_eq!(closed.trans_price, 70000.0);
        assert_eq!(closed.account_id, "A001");
    }

    #[test]
    fn test_position_summary_bad_int() {
        let row = "|U1|SHFE|T01|cu|cu2305|1.5|70000|0|0|69500|70100|600|5000|投|0|0|";
        let err = cells::<PositionSummary>(row).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidNumber { section: SectionKind::PositionSummary, field: "long_position", .. }
        ));
    }
}
