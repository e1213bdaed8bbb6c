pub mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;

use crate::types::{CatalogShard, ItemKey, ListingRow, OrderBookSnapshot, SaleRecord};

pub use client::{ClientConfig, MarketClient};
pub use error::FetchError;

/// Remote marketplace endpoints the pricing pipeline depends on.
///
/// Catalog calls surface errors so the caller can decide how fatal they are.
/// Item calls swallow everything but throttling into `None` ("no data").
#[async_trait]
pub trait MarketApi: Send + Sync {
    /// Shard list from the export manifest.
    async fn fetch_manifest(&self) -> Result<Vec<CatalogShard>, FetchError>;

    /// Listing rows of one export shard.
    async fn fetch_shard(&self, shard: &CatalogShard) -> Result<Vec<ListingRow>, FetchError>;

    /// Sales history of one item, `None` if the service had nothing usable.
    async fn fetch_history(&self, item: &ItemKey) -> Option<Vec<SaleRecord>>;

    /// Live bid/ask summary, `None` if the request failed.
    async fn fetch_order_book(&self, item: &ItemKey) -> Option<OrderBookSnapshot>;
}
