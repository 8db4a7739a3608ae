//! Trading dates and object key conventions.
//!
//! Input DT files live at `done-summary/{YYYYMMDD}/DT{YYMMDD}.csv`. Every
//! report family derives its output keys from the same trading date, so
//! all key construction is concentrated here.

use std::fmt::{Display, Formatter};

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::Date;

use crate::error::PathError;

const YYYYMMDD: &[BorrowedFormatItem<'static>] = format_description!("[year][month][day]");
const YYMMDD: &[BorrowedFormatItem<'static>] =
    format_description!("[year repr:last_two][month][day]");

/// Prefix under which all DT input files are stored.
pub const DT_PREFIX: &str = "done-summary/";

/// One exchange trading date, the unit of cache activation and report
/// production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TradingDate(Date);

impl TradingDate {
    pub fn new(date: Date) -> Self {
        Self(date)
    }

    /// Parse a `YYYYMMDD` string.
    pub fn parse(value: &str) -> Result<Self, PathError> {
        Date::parse(value, YYYYMMDD)
            .map(Self)
            .map_err(|_| PathError::InvalidDate(value.to_string()))
    }

    pub fn yyyymmdd(&self) -> String {
        self.0
            .format(YYYYMMDD)
            .unwrap_or_else(|_| String::from("00000000"))
    }

    pub fn yymmdd(&self) -> String {
        self.0
            .format(YYMMDD)
            .unwrap_or_else(|_| String::from("000000"))
    }

    pub fn date(&self) -> Date {
        self.0
    }
}

impl Display for TradingDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.yyyymmdd())
    }
}

/// Build the DT input key for a date: `done-summary/{YYYYMMDD}/DT{YYMMDD}.csv`.
pub fn dt_file_key(date: TradingDate) -> String {
    format!("{}{}/DT{}.csv", DT_PREFIX, date.yyyymmdd(), date.yymmdd())
}

/// Extract the trading date embedded in a DT input key. The filename
/// must be the exact inverse of [`dt_file_key`] for the directory date,
/// so stray objects under a dated directory are not mistaken for dumps.
pub fn date_from_dt_key(key: &str) -> Result<TradingDate, PathError> {
    let rest = key
        .strip_prefix(DT_PREFIX)
        .ok_or_else(|| PathError::NotADtPath(key.to_string()))?;
    let (segment, file) = rest
        .split_once('/')
        .ok_or_else(|| PathError::NotADtPath(key.to_string()))?;
    let date = TradingDate::parse(segment)?;
    if file != format!("DT{}.csv", date.yymmdd()) {
        return Err(PathError::NotADtPath(key.to_string()));
    }
    Ok(date)
}

/// Output keys for the bid/ask footprint family.
pub fn bid_ask_key(date: TradingDate, stock: &str) -> String {
    format!("bid_ask/bid_ask_{}/{}.csv", date.yyyymmdd(), stock)
}

pub fn bid_ask_rollup_key(date: TradingDate) -> String {
    format!("bid_ask/bid_ask_{}/ALL_STOCK.csv", date.yyyymmdd())
}

/// Output keys for the broker breakdown family. `scope_suffix` is empty
/// for the All/All combination, otherwise `_{invtype}_{boardtype}`.
pub fn breakdown_key(date: TradingDate, stock: &str, broker: &str, scope_suffix: &str) -> String {
    format!(
        "done_summary_broker_breakdown/{}/{}/{}{}.csv",
        date.yyyymmdd(),
        stock,
        broker,
        scope_suffix
    )
}

pub fn broker_summary_key(date: TradingDate, stock: &str) -> String {
    format!(
        "broker_summary/broker_summary_{}/{}.csv",
        date.yyyymmdd(),
        stock
    )
}

pub fn broker_summary_rollup_key(date: TradingDate) -> String {
    format!(
        "broker_summary/broker_summary_{}/ALLSUM-broker_summary.csv",
        date.yyyymmdd()
    )
}

/// `side` is `d` for domestic or `f` for foreign.
pub fn broker_transaction_key(date: TradingDate, side: char, broker: &str) -> String {
    format!(
        "broker_transaction/broker_transaction_{}_{}/{}.csv",
        side,
        date.yyyymmdd(),
        broker
    )
}

pub fn broker_transaction_stock_key(date: TradingDate, side: char, stock: &str) -> String {
    format!(
        "broker_transaction_stock/broker_transaction_stock_{}_{}/{}.csv",
        side,
        date.yyyymmdd(),
        stock
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dt_key_embeds_both_date_forms() {
        let date = TradingDate::parse("20260102").expect("valid date");
        assert_eq!(dt_file_key(date), "done-summary/20260102/DT260102.csv");
    }

    #[test]
    fn date_round_trips_through_dt_key() {
        let date = TradingDate::parse("20251231").expect("valid date");
        let key = dt_file_key(date);
        assert_eq!(date_from_dt_key(&key).expect("parse back"), date);
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert!(date_from_dt_key("bid_ask/bid_ask_20260102/ALL_STOCK.csv").is_err());
        assert!(date_from_dt_key("done-summary/2026-01-02/DT260102.csv").is_err());
        assert!(TradingDate::parse("20261402").is_err());
    }

    #[test]
    fn stray_files_under_a_dated_directory_are_rejected() {
        // A valid date segment is not enough; the filename must be the
        // matching DT dump.
        assert!(date_from_dt_key("done-summary/20260102/notes.csv").is_err());
        assert!(date_from_dt_key("done-summary/20260102/DT260103.csv").is_err());
        assert!(date_from_dt_key("done-summary/20260102/dt260102.csv").is_err());
        assert!(date_from_dt_key("done-summary/20260102/DT260102.csv").is_ok());
    }

    #[test]
    fn output_keys_follow_family_conventions() {
        let date = TradingDate::parse("20260102").expect("valid date");
        assert_eq!(
            bid_ask_key(date, "BBCA"),
            "bid_ask/bid_ask_20260102/BBCA.csv"
        );
        assert_eq!(
            breakdown_key(date, "BBCA", "CC", "_domestic_rg"),
            "done_summary_broker_breakdown/20260102/BBCA/CC_domestic_rg.csv"
        );
        assert_eq!(
            broker_transaction_key(date, 'f', "ZP"),
            "broker_transaction/broker_transaction_f_20260102/ZP.csv"
        );
    }
}
