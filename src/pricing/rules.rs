use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::SaleRecord;

const SECS_PER_DAY: i64 = 86_400;

/// Thresholds and ratios applied to every item.
#[derive(Debug, Clone)]
pub struct PricingRules {
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub min_sales: usize,
    pub max_gap_days: Decimal,

    /// Median above `highest_bid * bid_trigger` is pulled down to `highest_bid * bid_ratio`.
    pub bid_trigger: Decimal,
    pub bid_ratio: Decimal,

    /// Median within `lowest_ask * ask_margin` of the ask is set to `lowest_ask * ask_ratio`.
    pub ask_margin: Decimal,
    pub ask_ratio: Decimal,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self {
            min_price: dec!(700),
            max_price: dec!(10000),
            min_sales: 5,
            max_gap_days: dec!(30),
            bid_trigger: dec!(1.10),
            bid_ratio: dec!(1.05),
            ask_margin: dec!(0.10),
            ask_ratio: dec!(0.90),
        }
    }
}

impl PricingRules {
    /// Adjust the median against the live book. The ask rule runs second and
    /// overwrites the bid rule when both fire. `None` when a book price is too
    /// large to scale.
    pub fn reconcile(
        &self,
        median: Decimal,
        highest_bid: Option<Decimal>,
        lowest_ask: Option<Decimal>,
    ) -> Option<Decimal> {
        let mut price = median;

        if let Some(bid) = highest_bid {
            if median > bid.checked_mul(self.bid_trigger)? {
                price = bid.checked_mul(self.bid_ratio)?;
                tracing::debug!(median = %median, bid = %bid, price = %price, "median far above best bid");
            }
        }

        if let Some(ask) = lowest_ask {
            if ask.checked_sub(median)? < ask.checked_mul(self.ask_margin)? {
                price = ask.checked_mul(self.ask_ratio)?;
                tracing::debug!(median = %median, ask = %ask, price = %price, "median too close to best ask");
            }
        }

        Some(price)
    }

    /// Closed interval `[min_price, max_price]`.
    pub fn accepts(&self, price: Decimal) -> bool {
        price >= self.min_price && price <= self.max_price
    }

    pub fn is_stale(&self, max_gap_days: Decimal) -> bool {
        max_gap_days > self.max_gap_days
    }
}

/// Largest gap between consecutive sales, in days. Input order does not matter.
pub fn max_gap_days(sales: &[SaleRecord]) -> Decimal {
    let mut secs: Vec<i64> = sales.iter().map(|s| s.at.timestamp()).collect();
    secs.sort_unstable();
    let widest = secs.windows(2).map(|w| w[1] - w[0]).max().unwrap_or(0);
    Decimal::from(widest) / Decimal::from(SECS_PER_DAY)
}
