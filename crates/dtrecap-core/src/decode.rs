//! DT file decoding.
//!
//! A DT file is semicolon-delimited text with a header row naming its
//! columns. Column order varies between dumps, so the header is resolved
//! to positions before any row is read. A file missing any required
//! column decodes to zero records (hard validation failure); a malformed
//! numeric cell decodes to zero so one bad cell does not discard the row.

use std::fmt::{Display, Formatter};

/// Shares per exchange lot; `STK_VOLM` is denominated in lots.
pub const SHARES_PER_LOT: i64 = 100;

/// Instrument codes on the regular equity tape are exactly four
/// characters; anything else is a derivative or corporate-action line.
const STOCK_CODE_LEN: usize = 4;

/// Trading board parsed from `TRX_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoardType {
    Regular,
    Cash,
    Negotiated,
    Unknown,
}

impl BoardType {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "RG" => Self::Regular,
            "TN" => Self::Cash,
            "NG" => Self::Negotiated,
            _ => Self::Unknown,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "rg",
            Self::Cash => "tn",
            Self::Negotiated => "ng",
            Self::Unknown => "unknown",
        }
    }
}

impl Display for BoardType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Investor nationality parsed from `INV_TYP1`/`INV_TYP2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvestorType {
    Domestic,
    Foreign,
    Unknown,
}

impl InvestorType {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "I" => Self::Domestic,
            "A" => Self::Foreign,
            _ => Self::Unknown,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Domestic => "domestic",
            Self::Foreign => "foreign",
            Self::Unknown => "unknown",
        }
    }
}

impl Display for InvestorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One trade print from a DT file.
///
/// Column sides: `BRK_COD1` is the selling broker and `BRK_COD2` the
/// buying broker, while `INV_TYP1`/`TRX_ORD1` belong to the buyer and
/// `INV_TYP2`/`TRX_ORD2` to the seller.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub stock_code: String,
    pub sell_broker: String,
    pub buy_broker: String,
    /// Shares traded (`STK_VOLM` lots x 100).
    pub volume: i64,
    pub price: f64,
    /// Trade reference code, distinct per print.
    pub trx_code: String,
    /// Raw trade time, `HHMMSS` or `HH:MM:SS`.
    pub trx_time: String,
    pub board: BoardType,
    pub buy_investor: InvestorType,
    pub sell_investor: InvestorType,
    pub buy_order_ref: i64,
    pub sell_order_ref: i64,
}

impl TransactionRecord {
    /// Bid/ask side is derived, not stored: a print is a bid when the
    /// buyer's order reference is the more recent (larger) one.
    pub fn is_bid(&self) -> bool {
        self.buy_order_ref > self.sell_order_ref
    }

    pub fn value(&self) -> f64 {
        self.volume as f64 * self.price
    }
}

/// Which column set a report family requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnSet {
    /// `STK_CODE, BRK_COD1, BRK_COD2, STK_VOLM, STK_PRIC, TRX_CODE`
    Base,
    /// Base plus `TRX_TIME, INV_TYP1, INV_TYP2, TRX_ORD1, TRX_ORD2`
    Broker,
    /// Broker plus `TRX_TYPE`
    BrokerWithBoard,
}

const BASE_COLUMNS: [&str; 6] = [
    "STK_CODE", "BRK_COD1", "BRK_COD2", "STK_VOLM", "STK_PRIC", "TRX_CODE",
];
const BROKER_COLUMNS: [&str; 5] = ["TRX_TIME", "INV_TYP1", "INV_TYP2", "TRX_ORD1", "TRX_ORD2"];
const BOARD_COLUMN: &str = "TRX_TYPE";

impl ColumnSet {
    fn required(self) -> Vec<&'static str> {
        let mut columns: Vec<&'static str> = BASE_COLUMNS.to_vec();
        if matches!(self, Self::Broker | Self::BrokerWithBoard) {
            columns.extend_from_slice(&BROKER_COLUMNS);
        }
        if self == Self::BrokerWithBoard {
            columns.push(BOARD_COLUMN);
        }
        columns
    }
}

struct HeaderIndex {
    stk_code: usize,
    brk_cod1: usize,
    brk_cod2: usize,
    stk_volm: usize,
    stk_pric: usize,
    trx_code: usize,
    trx_time: Option<usize>,
    inv_typ1: Option<usize>,
    inv_typ2: Option<usize>,
    trx_ord1: Option<usize>,
    trx_ord2: Option<usize>,
    trx_type: Option<usize>,
    width: usize,
}

impl HeaderIndex {
    fn resolve(header: &str, columns: ColumnSet) -> Option<Self> {
        let names: Vec<&str> = header.split(';').map(str::trim).collect();
        let find = |name: &str| names.iter().position(|n| *n == name);

        for required in columns.required() {
            find(required)?;
        }

        Some(Self {
            stk_code: find("STK_CODE")?,
            brk_cod1: find("BRK_COD1")?,
            brk_cod2: find("BRK_COD2")?,
            stk_volm: find("STK_VOLM")?,
            stk_pric: find("STK_PRIC")?,
            trx_code: find("TRX_CODE")?,
            trx_time: find("TRX_TIME"),
            inv_typ1: find("INV_TYP1"),
            inv_typ2: find("INV_TYP2"),
            trx_ord1: find("TRX_ORD1"),
            trx_ord2: find("TRX_ORD2"),
            trx_type: find("TRX_TYPE"),
            width: names.len(),
        })
    }
}

fn int_or_zero(cell: Option<&str>) -> i64 {
    cell.map(str::trim)
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0)
}

fn float_or_zero(cell: Option<&str>) -> f64 {
    cell.map(str::trim)
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn text(cell: Option<&str>) -> String {
    cell.map(str::trim).unwrap_or_default().to_string()
}

/// Decode a DT file body.
///
/// Returns an empty vec when the header is missing any column required
/// by `columns`; individual short rows and non-4-char instruments are
/// silently dropped.
pub fn decode_transactions(content: &str, columns: ColumnSet) -> Vec<TransactionRecord> {
    let mut lines = content.lines();
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let Some(index) = HeaderIndex::resolve(header, columns) else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split(';').collect();
        if cells.len() < index.width {
            continue;
        }

        let stock_code = text(cells.get(index.stk_code).copied());
        if stock_code.len() != STOCK_CODE_LEN {
            continue;
        }

        let lots = int_or_zero(cells.get(index.stk_volm).copied());
        let cell_at = |slot: Option<usize>| slot.and_then(|i| cells.get(i).copied());

        records.push(TransactionRecord {
            stock_code,
            sell_broker: text(cells.get(index.brk_cod1).copied()),
            buy_broker: text(cells.get(index.brk_cod2).copied()),
            volume: lots * SHARES_PER_LOT,
            price: float_or_zero(cells.get(index.stk_pric).copied()),
            trx_code: text(cells.get(index.trx_code).copied()),
            trx_time: text(cell_at(index.trx_time)),
            board: BoardType::from_raw(&text(cell_at(index.trx_type))),
            buy_investor: InvestorType::from_raw(&text(cell_at(index.inv_typ1))),
            sell_investor: InvestorType::from_raw(&text(cell_at(index.inv_typ2))),
            buy_order_ref: int_or_zero(cell_at(index.trx_ord1)),
            sell_order_ref: int_or_zero(cell_at(index.trx_ord2)),
        });
    }
    records
}
