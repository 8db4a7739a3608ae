//! Per-price broker breakdown.
//!
//! One output file per (stock, broker) within each scope combination,
//! rows at price level. The caller supplies a scope partition from
//! [`crate::scope::partition_scopes`]; per-side sums re-check the
//! investor scope on the matching side.

use std::collections::BTreeMap;

use dtrecap_core::decode::TransactionRecord;
use serde::Serialize;

use crate::net::{collapse_net, NetBasis};
use crate::scope::InvestorScope;

/// One price level of a (stock, broker) breakdown file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow {
    pub price: f64,
    pub buy_volume: i64,
    pub buy_frequency: u64,
    pub buy_value: f64,
    pub sell_volume: i64,
    pub sell_frequency: u64,
    pub sell_value: f64,
    pub net_buy_volume: i64,
    pub net_buy_value: f64,
    pub net_sell_volume: i64,
    pub net_sell_value: f64,
}

#[derive(Default)]
struct PriceAcc {
    buy_volume: i64,
    buy_frequency: u64,
    buy_value: f64,
    sell_volume: i64,
    sell_frequency: u64,
    sell_value: f64,
}

/// Group a scope partition into per-(stock, broker) price rows.
pub fn breakdown_rows(
    partition: &[&TransactionRecord],
    scope: InvestorScope,
) -> BTreeMap<(String, String), Vec<BreakdownRow>> {
    let mut levels: BTreeMap<(String, String, u64), PriceAcc> = BTreeMap::new();

    for record in partition {
        let price_bits = record.price.to_bits();
        if scope.matches_buy(record) {
            let acc = levels
                .entry((
                    record.stock_code.clone(),
                    record.buy_broker.clone(),
                    price_bits,
                ))
                .or_default();
            acc.buy_volume += record.volume;
            acc.buy_frequency += 1;
            acc.buy_value += record.value();
        }
        if scope.matches_sell(record) {
            let acc = levels
                .entry((
                    record.stock_code.clone(),
                    record.sell_broker.clone(),
                    price_bits,
                ))
                .or_default();
            acc.sell_volume += record.volume;
            acc.sell_frequency += 1;
            acc.sell_value += record.value();
        }
    }

    let mut files: BTreeMap<(String, String), Vec<BreakdownRow>> = BTreeMap::new();
    for ((stock, broker, price_bits), acc) in levels {
        let net = collapse_net(
            acc.buy_volume,
            acc.buy_value,
            acc.sell_volume,
            acc.sell_value,
            NetBasis::Volume,
        );
        files.entry((stock, broker)).or_default().push(BreakdownRow {
            price: f64::from_bits(price_bits),
            buy_volume: acc.buy_volume,
            buy_frequency: acc.buy_frequency,
            buy_value: acc.buy_value,
            sell_volume: acc.sell_volume,
            sell_frequency: acc.sell_frequency,
            sell_value: acc.sell_value,
            net_buy_volume: net.net_buy_volume,
            net_buy_value: net.net_buy_value,
            net_sell_volume: net.net_sell_volume,
            net_sell_value: net.net_sell_value,
        });
    }
    for rows in files.values_mut() {
        rows.sort_by(|a, b| a.price.total_cmp(&b.price));
    }
    files
}
