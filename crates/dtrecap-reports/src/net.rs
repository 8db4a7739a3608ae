//! Net-position collapsing and zero-safe ratios.

/// Which side of a buy/sell pair decides the net sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetBasis {
    Volume,
    Value,
}

/// Collapsed net position. Invariant: at most one of the buy/sell pairs
/// is non-zero; the sign is decided once and both volume and value
/// follow it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetPosition {
    pub net_buy_volume: i64,
    pub net_buy_value: f64,
    pub net_sell_volume: i64,
    pub net_sell_value: f64,
}

/// Collapse buy/sell totals into a one-sided net position.
///
/// Computing net volume and net value independently can leave them with
/// opposite signs; instead the side is decided once (by `basis`) and
/// both figures are assigned to that side as absolute values.
pub fn collapse_net(
    buy_volume: i64,
    buy_value: f64,
    sell_volume: i64,
    sell_value: f64,
    basis: NetBasis,
) -> NetPosition {
    let net_volume = buy_volume - sell_volume;
    let net_value = buy_value - sell_value;
    let is_net_buy = match basis {
        NetBasis::Volume => net_volume >= 0,
        NetBasis::Value => net_value >= 0.0,
    };

    if is_net_buy {
        NetPosition {
            net_buy_volume: net_volume.abs(),
            net_buy_value: net_value.abs(),
            ..NetPosition::default()
        }
    } else {
        NetPosition {
            net_sell_volume: net_volume.abs(),
            net_sell_value: net_value.abs(),
            ..NetPosition::default()
        }
    }
}

/// `value / count`, defined as 0 when the count is 0 so no NaN or
/// infinity ever reaches an output row.
pub fn safe_ratio(value: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        value / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_buy_side_takes_both_figures() {
        let net = collapse_net(1_000, 500_000.0, 400, 180_000.0, NetBasis::Volume);
        assert_eq!(net.net_buy_volume, 600);
        assert_eq!(net.net_buy_value, 320_000.0);
        assert_eq!(net.net_sell_volume, 0);
        assert_eq!(net.net_sell_value, 0.0);
    }

    #[test]
    fn net_sell_side_takes_absolute_values() {
        let net = collapse_net(400, 180_000.0, 1_000, 500_000.0, NetBasis::Volume);
        assert_eq!(net.net_sell_volume, 600);
        assert_eq!(net.net_sell_value, 320_000.0);
        assert_eq!(net.net_buy_volume, 0);
        assert_eq!(net.net_buy_value, 0.0);
    }

    #[test]
    fn sign_never_splits_across_sides() {
        // Volume says net buy, value alone would say net sell; the
        // volume basis wins and the value follows it.
        let net = collapse_net(1_000, 100_000.0, 900, 150_000.0, NetBasis::Volume);
        assert_eq!(net.net_buy_volume, 100);
        assert_eq!(net.net_buy_value, 50_000.0);
        assert_eq!(net.net_sell_volume, 0);
        assert_eq!(net.net_sell_value, 0.0);
        assert!(net.net_buy_volume * net.net_sell_volume == 0);
    }

    #[test]
    fn value_basis_decides_by_value() {
        let net = collapse_net(1_000, 100_000.0, 900, 150_000.0, NetBasis::Value);
        assert_eq!(net.net_buy_volume, 0);
        assert_eq!(net.net_sell_volume, 100);
        assert_eq!(net.net_sell_value, 50_000.0);
    }

    #[test]
    fn ratios_never_divide_by_zero() {
        assert_eq!(safe_ratio(100.0, 0), 0.0);
        assert_eq!(safe_ratio(100.0, 4), 25.0);
    }
}
