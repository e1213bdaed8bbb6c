use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Position of the market hash name inside an export row.
pub const ITEM_NAME_FIELD: usize = 2;

/// One export file listed by the catalog manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogShard(pub String);

impl fmt::Display for CatalogShard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw export row. Only the item name column is interpreted.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingRow(pub Vec<serde_json::Value>);

impl ListingRow {
    pub fn item_name(&self) -> Option<&str> {
        self.0.get(ITEM_NAME_FIELD)?.as_str()
    }
}

/// Dedup identity of an item. `phase` selects a variant on the bid-ask
/// endpoint and is empty for every item the catalog yields today.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    pub name: String,
    pub phase: String,
}

impl ItemKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase: String::new(),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.phase.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{} ({})", self.name, self.phase)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaleRecord {
    pub at: DateTime<Utc>,
    pub price: Decimal,
}

/// Best prices on both sides of the live book. Either side may be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBookSnapshot {
    pub highest_bid: Option<Decimal>,
    pub lowest_ask: Option<Decimal>,
}

impl OrderBookSnapshot {
    pub fn is_empty(&self) -> bool {
        self.highest_bid.is_none() && self.lowest_ask.is_none()
    }
}

/// Why an item was left out of the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    InsufficientHistory { sales: usize },
    Stale { max_gap_days: Decimal },
    OutOfRange { price: Decimal },
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::InsufficientHistory { .. } => "INSUFFICIENT_HISTORY",
            Rejection::Stale { .. } => "STALE",
            Rejection::OutOfRange { .. } => "OUT_OF_RANGE",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::InsufficientHistory { sales } => {
                write!(f, "{}: only {} sales", self.code(), sales)
            }
            Rejection::Stale { max_gap_days } => {
                write!(f, "{}: max gap {:.1} days between sales", self.code(), max_gap_days)
            }
            Rejection::OutOfRange { price } => {
                write!(f, "{}: price {:.2} outside configured range", self.code(), price)
            }
        }
    }
}

/// Terminal outcome of resolving one item.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceDecision {
    Accepted { item: ItemKey, price: Decimal },
    Rejected { item: ItemKey, reason: Rejection },
}

#[cfg(test)]
impl PriceDecision {
    pub fn accepted_price(&self) -> Option<Decimal> {
        match self {
            PriceDecision::Accepted { price, .. } => Some(*price),
            PriceDecision::Rejected { .. } => None,
        }
    }
}
