//! Investor-type and board-type scoping.
//!
//! Broker breakdown reports run over the 3x4 grid of investor scope
//! (All/Domestic/Foreign) by board scope (All/Regular/Cash/Negotiated).
//! The full record set is partitioned into that grid in a single pass so
//! downstream grouping never re-scans the whole set per combination.

use std::collections::HashMap;

use dtrecap_core::decode::{BoardType, InvestorType, TransactionRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvestorScope {
    All,
    Domestic,
    Foreign,
}

impl InvestorScope {
    pub const ALL: [Self; 3] = [Self::All, Self::Domestic, Self::Foreign];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Domestic => "domestic",
            Self::Foreign => "foreign",
        }
    }

    fn investor(self) -> Option<InvestorType> {
        match self {
            Self::All => None,
            Self::Domestic => Some(InvestorType::Domestic),
            Self::Foreign => Some(InvestorType::Foreign),
        }
    }

    /// Whether the buy side of `record` falls in this scope.
    pub fn matches_buy(self, record: &TransactionRecord) -> bool {
        self.investor().is_none_or(|t| record.buy_investor == t)
    }

    /// Whether the sell side of `record` falls in this scope.
    pub fn matches_sell(self, record: &TransactionRecord) -> bool {
        self.investor().is_none_or(|t| record.sell_investor == t)
    }

    /// Whether either side of `record` falls in this scope.
    pub fn matches_either(self, record: &TransactionRecord) -> bool {
        self.matches_buy(record) || self.matches_sell(record)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoardScope {
    All,
    Regular,
    Cash,
    Negotiated,
}

impl BoardScope {
    pub const ALL: [Self; 4] = [Self::All, Self::Regular, Self::Cash, Self::Negotiated];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Regular => "rg",
            Self::Cash => "tn",
            Self::Negotiated => "ng",
        }
    }

    pub fn matches(self, board: BoardType) -> bool {
        match self {
            Self::All => true,
            Self::Regular => board == BoardType::Regular,
            Self::Cash => board == BoardType::Cash,
            Self::Negotiated => board == BoardType::Negotiated,
        }
    }

    fn from_board(board: BoardType) -> Option<Self> {
        match board {
            BoardType::Regular => Some(Self::Regular),
            BoardType::Cash => Some(Self::Cash),
            BoardType::Negotiated => Some(Self::Negotiated),
            BoardType::Unknown => None,
        }
    }
}

/// Output key suffix for a scope pair: empty for All/All, otherwise
/// `_{invtype}_{boardtype}`.
pub fn scope_suffix(investor: InvestorScope, board: BoardScope) -> String {
    if investor == InvestorScope::All && board == BoardScope::All {
        String::new()
    } else {
        format!("_{}_{}", investor.as_str(), board.as_str())
    }
}

/// The 3x4 partition grid over one decoded record set.
pub struct ScopeGrid<'a> {
    partitions: HashMap<(InvestorScope, BoardScope), Vec<&'a TransactionRecord>>,
}

impl<'a> ScopeGrid<'a> {
    pub fn partitions(
        &self,
    ) -> impl Iterator<Item = (InvestorScope, BoardScope, &[&'a TransactionRecord])> + '_ {
        InvestorScope::ALL.into_iter().flat_map(move |inv| {
            BoardScope::ALL
                .into_iter()
                .map(move |board| (inv, board, self.records(inv, board)))
        })
    }

    pub fn records(&self, investor: InvestorScope, board: BoardScope) -> &[&'a TransactionRecord] {
        self.partitions
            .get(&(investor, board))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Partition `records` into the scope grid in one pass.
///
/// A record lands in an investor partition when either of its sides
/// matches (per-side sums re-check the matching side downstream), and in
/// a board partition only when its board is known.
pub fn partition_scopes(records: &[TransactionRecord]) -> ScopeGrid<'_> {
    let mut partitions: HashMap<(InvestorScope, BoardScope), Vec<&TransactionRecord>> =
        HashMap::new();

    for record in records {
        let mut investor_scopes = vec![InvestorScope::All];
        for scope in [InvestorScope::Domestic, InvestorScope::Foreign] {
            if scope.matches_either(record) {
                investor_scopes.push(scope);
            }
        }
        let mut board_scopes = vec![BoardScope::All];
        if let Some(board) = BoardScope::from_board(record.board) {
            board_scopes.push(board);
        }

        for &inv in &investor_scopes {
            for &board in &board_scopes {
                partitions.entry((inv, board)).or_default().push(record);
            }
        }
    }

    ScopeGrid { partitions }
}
