//! Broker-by-stock aggregates shared by the broker summary and broker
//! transaction families.
//!
//! Buyer-side figures use the buying broker and buyer investor type;
//! seller-side figures use the selling broker and seller investor type.
//! Frequency is the distinct trade-reference count per side, and order
//! counts carry both the naive and corrected figures from the
//! time-bucket correction.

use std::collections::{BTreeMap, HashSet};

use dtrecap_core::decode::TransactionRecord;
use dtrecap_core::orders::corrected_order_count;
use serde::Serialize;

use crate::net::{collapse_net, safe_ratio, NetBasis};
use crate::scope::InvestorScope;

/// One (broker, stock) aggregate row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokerStockRow {
    pub stock_code: String,
    pub broker_code: String,
    pub buy_volume: i64,
    pub buy_value: f64,
    pub buy_frequency: u64,
    pub buy_order_count: u64,
    pub buy_order_count_corrected: u64,
    pub buy_value_per_trade: f64,
    pub buy_value_per_order: f64,
    pub sell_volume: i64,
    pub sell_value: f64,
    pub sell_frequency: u64,
    pub sell_order_count: u64,
    pub sell_order_count_corrected: u64,
    pub sell_value_per_trade: f64,
    pub sell_value_per_order: f64,
    pub net_buy_volume: i64,
    pub net_buy_value: f64,
    pub net_sell_volume: i64,
    pub net_sell_value: f64,
}

#[derive(Default)]
struct SideAcc {
    volume: i64,
    value: f64,
    trades: HashSet<String>,
    orders: Vec<(String, i64)>,
}

impl SideAcc {
    fn push(&mut self, record: &TransactionRecord, order_ref: i64) {
        self.volume += record.volume;
        self.value += record.value();
        self.trades.insert(record.trx_code.clone());
        self.orders.push((record.trx_time.clone(), order_ref));
    }
}

#[derive(Default)]
struct PairAcc {
    buy: SideAcc,
    sell: SideAcc,
}

/// Build (broker, stock) rows from a record set, with each side filtered
/// to `scope` independently.
///
/// Rows come out sorted by broker then stock; net figures are collapsed
/// on the volume basis.
pub fn broker_stock_rows(
    records: &[TransactionRecord],
    scope: InvestorScope,
) -> Vec<BrokerStockRow> {
    let mut pairs: BTreeMap<(String, String), PairAcc> = BTreeMap::new();

    for record in records {
        if scope.matches_buy(record) {
            pairs
                .entry((record.buy_broker.clone(), record.stock_code.clone()))
                .or_default()
                .buy
                .push(record, record.buy_order_ref);
        }
        if scope.matches_sell(record) {
            pairs
                .entry((record.sell_broker.clone(), record.stock_code.clone()))
                .or_default()
                .sell
                .push(record, record.sell_order_ref);
        }
    }

    pairs
        .into_iter()
        .map(|((broker_code, stock_code), acc)| {
            let buy_orders = corrected_order_count(acc.buy.orders);
            let sell_orders = corrected_order_count(acc.sell.orders);
            let buy_frequency = acc.buy.trades.len() as u64;
            let sell_frequency = acc.sell.trades.len() as u64;
            let net = collapse_net(
                acc.buy.volume,
                acc.buy.value,
                acc.sell.volume,
                acc.sell.value,
                NetBasis::Volume,
            );

            BrokerStockRow {
                stock_code,
                broker_code,
                buy_volume: acc.buy.volume,
                buy_value: acc.buy.value,
                buy_frequency,
                buy_order_count: buy_orders.raw as u64,
                buy_order_count_corrected: buy_orders.corrected as u64,
                buy_value_per_trade: safe_ratio(acc.buy.value, buy_frequency),
                buy_value_per_order: safe_ratio(acc.buy.value, buy_orders.corrected as u64),
                sell_volume: acc.sell.volume,
                sell_value: acc.sell.value,
                sell_frequency,
                sell_order_count: sell_orders.raw as u64,
                sell_order_count_corrected: sell_orders.corrected as u64,
                sell_value_per_trade: safe_ratio(acc.sell.value, sell_frequency),
                sell_value_per_order: safe_ratio(acc.sell.value, sell_orders.corrected as u64),
                net_buy_volume: net.net_buy_volume,
                net_buy_value: net.net_buy_value,
                net_sell_volume: net.net_sell_volume,
                net_sell_value: net.net_sell_value,
            }
        })
        .collect()
}

/// Group rows per stock (broker summary, broker transaction per stock).
pub fn group_by_stock(rows: Vec<BrokerStockRow>) -> BTreeMap<String, Vec<BrokerStockRow>> {
    let mut groups: BTreeMap<String, Vec<BrokerStockRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.stock_code.clone()).or_default().push(row);
    }
    groups
}

/// Group rows per broker (broker transaction).
pub fn group_by_broker(rows: Vec<BrokerStockRow>) -> BTreeMap<String, Vec<BrokerStockRow>> {
    let mut groups: BTreeMap<String, Vec<BrokerStockRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.broker_code.clone()).or_default().push(row);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtrecap_core::decode::{decode_transactions, ColumnSet};

    const HEADER: &str = "STK_CODE;BRK_COD1;BRK_COD2;STK_VOLM;STK_PRIC;TRX_CODE;TRX_TIME;INV_TYP1;INV_TYP2;TRX_ORD1;TRX_ORD2";

    fn records(rows: &str) -> Vec<TransactionRecord> {
        decode_transactions(&format!("{HEADER}\n{rows}"), ColumnSet::Broker)
    }

    #[test]
    fn buyer_and_seller_sides_use_their_own_broker() {
        let records = records("BBCA;CC;ZP;10;1000;T1;090000;I;I;5;1");
        let rows = broker_stock_rows(&records, InvestorScope::All);

        assert_eq!(rows.len(), 2);
        // Sorted by broker: CC (seller) then ZP (buyer).
        assert_eq!(rows[0].broker_code, "CC");
        assert_eq!(rows[0].sell_volume, 1_000);
        assert_eq!(rows[0].buy_volume, 0);
        assert_eq!(rows[1].broker_code, "ZP");
        assert_eq!(rows[1].buy_volume, 1_000);
        assert_eq!(rows[1].buy_value, 1_000_000.0);
        assert_eq!(rows[1].sell_volume, 0);
    }

    #[test]
    fn frequency_counts_distinct_trade_references() {
        let records = records(
            "BBCA;CC;ZP;10;1000;T1;090000;I;I;5;1\n\
             BBCA;CC;ZP;10;1000;T1;090000;I;I;5;1\n\
             BBCA;CC;ZP;10;1000;T2;090001;I;I;6;2",
        );
        let rows = broker_stock_rows(&records, InvestorScope::All);
        let zp = rows.iter().find(|r| r.broker_code == "ZP").unwrap();
        assert_eq!(zp.buy_frequency, 2);
        assert_eq!(zp.buy_volume, 3_000);
    }

    #[test]
    fn order_counts_carry_raw_and_corrected() {
        // Three buy prints in one post-cutoff second sharing no raw ref:
        // naive count 3, corrected 1.
        let records = records(
            "BBCA;CC;ZP;10;1000;T1;090000;I;I;11;1\n\
             BBCA;CC;ZP;10;1000;T2;090000;I;I;12;2\n\
             BBCA;CC;ZP;10;1000;T3;090000;I;I;13;3",
        );
        let rows = broker_stock_rows(&records, InvestorScope::All);
        let zp = rows.iter().find(|r| r.broker_code == "ZP").unwrap();
        assert_eq!(zp.buy_order_count, 3);
        assert_eq!(zp.buy_order_count_corrected, 1);
        assert_eq!(zp.buy_value_per_order, 3_000_000.0);
    }

    #[test]
    fn investor_scope_filters_each_side_independently() {
        // Buyer domestic, seller foreign.
        let records = records("BBCA;CC;ZP;10;1000;T1;090000;I;A;5;1");

        let domestic = broker_stock_rows(&records, InvestorScope::Domestic);
        assert_eq!(domestic.len(), 1);
        assert_eq!(domestic[0].broker_code, "ZP");
        assert_eq!(domestic[0].buy_volume, 1_000);

        let foreign = broker_stock_rows(&records, InvestorScope::Foreign);
        assert_eq!(foreign.len(), 1);
        assert_eq!(foreign[0].broker_code, "CC");
        assert_eq!(foreign[0].sell_volume, 1_000);
    }

    #[test]
    fn net_sides_are_mutually_exclusive() {
        let records = records(
            "BBCA;CC;ZP;30;1000;T1;090000;I;I;5;1\n\
             BBCA;ZP;CC;10;1000;T2;090001;I;I;6;2",
        );
        for row in broker_stock_rows(&records, InvestorScope::All) {
            assert!(
                row.net_buy_volume == 0 || row.net_sell_volume == 0,
                "net sides both non-zero for {}",
                row.broker_code
            );
            assert!(row.net_buy_value == 0.0 || row.net_sell_value == 0.0);
        }
    }

    #[test]
    fn ratios_are_zero_for_empty_sides() {
        let records = records("BBCA;CC;ZP;10;1000;T1;090000;I;I;5;1");
        let cc = broker_stock_rows(&records, InvestorScope::All)
            .into_iter()
            .find(|r| r.broker_code == "CC")
            .unwrap();
        assert_eq!(cc.buy_value_per_trade, 0.0);
        assert_eq!(cc.buy_value_per_order, 0.0);
    }
}
