use std::sync::Arc;

use rust_decimal::Decimal;

use super::median::median;
use super::rules::{max_gap_days, PricingRules};
use crate::market::MarketApi;
use crate::stats::Stats;
use crate::store::{round_cents, ResultStore};
use crate::types::{ItemKey, PriceDecision, Rejection, SaleRecord};

/// Turns one item into a price decision: history -> median -> book -> adjusted price.
pub struct ItemPriceResolver {
    api: Arc<dyn MarketApi>,
    rules: PricingRules,
    store: Arc<ResultStore>,
    stats: Arc<Stats>,
}

impl ItemPriceResolver {
    pub fn new(
        api: Arc<dyn MarketApi>,
        rules: PricingRules,
        store: Arc<ResultStore>,
        stats: Arc<Stats>,
    ) -> Self {
        Self {
            api,
            rules,
            store,
            stats,
        }
    }

    /// Resolve the item and record the outcome: accepted prices go into the
    /// store, rejections are only logged.
    pub async fn process(&self, item: &ItemKey) -> PriceDecision {
        let decision = self.resolve(item).await;
        match &decision {
            PriceDecision::Accepted { item, price } => {
                self.store.record(item.clone(), *price);
                self.stats.inc_accepted();
                let cents = round_cents(*price);
                tracing::info!(item = %item, price = %cents, "{}^{:.2}", item, cents);
            }
            PriceDecision::Rejected { item, reason } => {
                self.stats.inc_rejected(reason);
                tracing::info!(item = %item, reason = reason.code(), "skipped: {}", reason);
            }
        }
        decision
    }

    pub async fn resolve(&self, item: &ItemKey) -> PriceDecision {
        let sales = self.api.fetch_history(item).await.unwrap_or_default();
        let median = match self.assess_history(&sales) {
            Ok(m) => m,
            Err(reason) => return reject(item, reason),
        };

        // A failed book request counts as an empty book.
        let book = self.api.fetch_order_book(item).await.unwrap_or_default();
        let price = if book.is_empty() {
            tracing::debug!(item = %item, median = %median, "no orders on either side, using median");
            median
        } else {
            match self.rules.reconcile(median, book.highest_bid, book.lowest_ask) {
                Some(p) => p,
                None => {
                    let price = book.highest_bid.max(book.lowest_ask).unwrap_or(median);
                    tracing::warn!(
                        item = %item,
                        median = %median,
                        book = ?book,
                        "book price overflows adjustment"
                    );
                    return reject(item, Rejection::OutOfRange { price });
                }
            }
        };

        if !self.rules.accepts(price) {
            return reject(item, Rejection::OutOfRange { price });
        }
        PriceDecision::Accepted {
            item: item.clone(),
            price,
        }
    }

    /// Sample-size and liquidity gates; yields the median on success.
    pub fn assess_history(&self, sales: &[SaleRecord]) -> Result<Decimal, Rejection> {
        if sales.is_empty() || sales.len() < self.rules.min_sales {
            return Err(Rejection::InsufficientHistory { sales: sales.len() });
        }

        let gap = max_gap_days(sales);
        if self.rules.is_stale(gap) {
            return Err(Rejection::Stale { max_gap_days: gap });
        }

        let prices: Vec<Decimal> = sales.iter().map(|s| s.price).collect();
        median(&prices).ok_or_else(|| {
            let price = prices.iter().copied().max().unwrap_or_default();
            tracing::warn!(sales = prices.len(), max_price = %price, "median of sale prices overflows");
            Rejection::OutOfRange { price }
        })
    }
}

fn reject(item: &ItemKey, reason: Rejection) -> PriceDecision {
    PriceDecision::Rejected {
        item: item.clone(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::fake::{daily_sales, sales_with_gaps, FakeMarket};
    use rust_decimal_macros::dec;

    fn resolver(market: FakeMarket) -> (ItemPriceResolver, Arc<ResultStore>, Arc<Stats>) {
        let store = Arc::new(ResultStore::new());
        let stats = Stats::new(0);
        let r = ItemPriceResolver::new(
            Arc::new(market),
            PricingRules::default(),
            store.clone(),
            stats.clone(),
        );
        (r, store, stats)
    }

    #[tokio::test]
    async fn test_no_history_is_insufficient() {
        let (r, store, _) = resolver(FakeMarket::new());
        let d = r.process(&ItemKey::new("MP9 | Sand Dashed")).await;
        assert_eq!(
            d,
            PriceDecision::Rejected {
                item: ItemKey::new("MP9 | Sand Dashed"),
                reason: Rejection::InsufficientHistory { sales: 0 },
            }
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_four_sales_is_insufficient() {
        let m = FakeMarket::new().with_history("x", daily_sales(4, dec!(1000)));
        let (r, _, stats) = resolver(m);
        let d = r.process(&ItemKey::new("x")).await;
        assert!(matches!(
            d,
            PriceDecision::Rejected { reason: Rejection::InsufficientHistory { sales: 4 }, .. }
        ));
        assert_eq!(stats.snapshot(0).rejected_insufficient, 1);
    }

    #[tokio::test]
    async fn test_stale_history_rejected_regardless_of_price() {
        let m = FakeMarket::new()
            .with_history("x", sales_with_gaps(&[1, 1, 45, 1], dec!(1500)))
            .with_book("x", Some(dec!(1490)), Some(dec!(2000)));
        let (r, store, _) = resolver(m);
        let d = r.process(&ItemKey::new("x")).await;
        assert_eq!(
            d,
            PriceDecision::Rejected {
                item: ItemKey::new("x"),
                reason: Rejection::Stale { max_gap_days: dec!(45) },
            }
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_empty_book_accepts_median() {
        let mut sales = daily_sales(5, dec!(800));
        sales[0].price = dec!(900);
        sales[1].price = dec!(750);
        let m = FakeMarket::new().with_history("x", sales);
        let (r, store, _) = resolver(m);
        let d = r.process(&ItemKey::new("x")).await;
        assert_eq!(d.accepted_price(), Some(dec!(800)));
        assert_eq!(store.get(&ItemKey::new("x")), Some(dec!(800)));
    }

    #[tokio::test]
    async fn test_bid_adjustment_then_range_check() {
        // median 1000 > 800 * 1.10 -> 840
        let m = FakeMarket::new()
            .with_history("x", daily_sales(6, dec!(1000)))
            .with_book("x", Some(dec!(800)), None);
        let (r, _, _) = resolver(m);
        assert_eq!(r.resolve(&ItemKey::new("x")).await.accepted_price(), Some(dec!(840)));
    }

    #[tokio::test]
    async fn test_adjusted_price_below_min_is_out_of_range() {
        // ask 720 sits below the 1000 median -> 720 * 0.90 = 648
        let m = FakeMarket::new()
            .with_history("x", daily_sales(5, dec!(1000)))
            .with_book("x", None, Some(dec!(720)));
        let (r, store, stats) = resolver(m);
        let d = r.process(&ItemKey::new("x")).await;
        assert_eq!(
            d,
            PriceDecision::Rejected {
                item: ItemKey::new("x"),
                reason: Rejection::OutOfRange { price: dec!(648) },
            }
        );
        assert!(store.is_empty());
        assert_eq!(stats.snapshot(0).rejected_out_of_range, 1);
    }

    #[tokio::test]
    async fn test_min_price_boundary_is_accepted() {
        let m = FakeMarket::new().with_history("x", daily_sales(5, dec!(700)));
        let (r, _, _) = resolver(m);
        assert_eq!(r.resolve(&ItemKey::new("x")).await.accepted_price(), Some(dec!(700)));
    }

    #[tokio::test]
    async fn test_huge_sale_prices_are_rejected_not_fatal() {
        let m = FakeMarket::new().with_history("x", daily_sales(6, Decimal::MAX));
        let (r, store, stats) = resolver(m);
        let d = r.process(&ItemKey::new("x")).await;
        assert_eq!(
            d,
            PriceDecision::Rejected {
                item: ItemKey::new("x"),
                reason: Rejection::OutOfRange { price: Decimal::MAX },
            }
        );
        assert!(store.is_empty());
        assert_eq!(stats.snapshot(0).rejected_out_of_range, 1);
    }

    #[tokio::test]
    async fn test_huge_book_price_is_rejected_not_fatal() {
        let m = FakeMarket::new()
            .with_history("x", daily_sales(6, dec!(1000)))
            .with_book("x", Some(Decimal::MAX), Some(dec!(1200)));
        let (r, store, _) = resolver(m);
        let d = r.process(&ItemKey::new("x")).await;
        assert_eq!(
            d,
            PriceDecision::Rejected {
                item: ItemKey::new("x"),
                reason: Rejection::OutOfRange { price: Decimal::MAX },
            }
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_accepted_price_keeps_full_precision_in_store() {
        // 1000.25 * 0.90 = 900.225; rendered and logged as 900.23
        let m = FakeMarket::new()
            .with_history("x", daily_sales(5, dec!(1000)))
            .with_book("x", None, Some(dec!(1000.25)));
        let (r, store, _) = resolver(m);
        r.process(&ItemKey::new("x")).await;
        assert_eq!(store.get(&ItemKey::new("x")), Some(dec!(900.225)));
        assert_eq!(store.render(), "x^900.23\n");
    }

    #[test]
    fn test_custom_min_sales() {
        let r = ItemPriceResolver::new(
            Arc::new(FakeMarket::new()),
            PricingRules {
                min_sales: 2,
                ..PricingRules::default()
            },
            Arc::new(ResultStore::new()),
            Stats::new(0),
        );
        assert_eq!(r.assess_history(&daily_sales(2, dec!(5))), Ok(dec!(5)));
        assert!(r.assess_history(&daily_sales(1, dec!(5))).is_err());
    }
}
