//! Price-level bid/ask footprint.

use std::collections::{BTreeMap, HashSet};

use dtrecap_core::decode::TransactionRecord;
use serde::Serialize;

/// One (stock, price) level of the footprint.
///
/// Broker counts use the counterpart side's code: bid activity is
/// attributed to the selling broker, ask activity to the buying broker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FootprintRow {
    pub stock_code: String,
    pub price: f64,
    pub bid_volume: i64,
    pub bid_count: u64,
    pub bid_broker_count: u64,
    pub ask_volume: i64,
    pub ask_count: u64,
    pub ask_broker_count: u64,
}

#[derive(Default)]
struct Level {
    bid_volume: i64,
    bid_count: u64,
    bid_brokers: HashSet<String>,
    ask_volume: i64,
    ask_count: u64,
    ask_brokers: HashSet<String>,
}

/// Group by (stock, price), accumulating each side from the derived
/// bid/ask classification. Rows come out sorted by stock then price.
pub fn footprint_rows(records: &[TransactionRecord]) -> Vec<FootprintRow> {
    // Prices on the tape are integer ticks; the bit key keeps the map
    // ordered without an f64 Ord impl.
    let mut levels: BTreeMap<(String, u64), Level> = BTreeMap::new();

    for record in records {
        let key = (record.stock_code.clone(), record.price.to_bits());
        let level = levels.entry(key).or_default();
        if record.is_bid() {
            level.bid_volume += record.volume;
            level.bid_count += 1;
            level.bid_brokers.insert(record.sell_broker.clone());
        } else {
            level.ask_volume += record.volume;
            level.ask_count += 1;
            level.ask_brokers.insert(record.buy_broker.clone());
        }
    }

    let mut rows: Vec<FootprintRow> = levels
        .into_iter()
        .map(|((stock_code, price_bits), level)| FootprintRow {
            stock_code,
            price: f64::from_bits(price_bits),
            bid_volume: level.bid_volume,
            bid_count: level.bid_count,
            bid_broker_count: level.bid_brokers.len() as u64,
            ask_volume: level.ask_volume,
            ask_count: level.ask_count,
            ask_broker_count: level.ask_brokers.len() as u64,
        })
        .collect();
    rows.sort_by(|a, b| {
        a.stock_code
            .cmp(&b.stock_code)
            .then(a.price.total_cmp(&b.price))
    });
    rows
}
