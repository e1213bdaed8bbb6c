use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;

use crate::market::{FetchError, MarketApi};
use crate::stats::Stats;
use crate::types::{CatalogShard, ItemKey, ListingRow};

/// Walks the full export: manifest -> shards -> unique, non-excluded items.
pub struct CatalogWalker {
    api: Arc<dyn MarketApi>,
    excluded_prefixes: Vec<String>,
    seen: Mutex<HashSet<ItemKey>>,
    stats: Arc<Stats>,
}

impl CatalogWalker {
    pub fn new(api: Arc<dyn MarketApi>, excluded_prefixes: Vec<String>, stats: Arc<Stats>) -> Self {
        Self {
            api,
            excluded_prefixes,
            seen: Mutex::new(HashSet::new()),
            stats,
        }
    }

    pub async fn shards(&self) -> Result<Vec<CatalogShard>, FetchError> {
        self.api.fetch_manifest().await
    }

    /// Items of `shard` that have not been seen in any shard before.
    pub async fn items(&self, shard: &CatalogShard) -> anyhow::Result<Vec<ItemKey>> {
        let rows = self
            .api
            .fetch_shard(shard)
            .await
            .with_context(|| format!("fetch shard {shard}"))?;
        let items = self.admit_rows(&rows);
        tracing::debug!(shard = %shard, rows = rows.len(), admitted = items.len(), "shard listed");
        Ok(items)
    }

    pub fn admit_rows(&self, rows: &[ListingRow]) -> Vec<ItemKey> {
        rows.iter()
            .filter_map(|row| {
                let Some(name) = row.item_name() else {
                    tracing::debug!(fields = row.0.len(), "row without item name skipped");
                    return None;
                };
                self.stats.inc_item_seen();
                if self.is_excluded(name) {
                    self.stats.inc_filtered();
                    tracing::debug!(item = %name, "excluded category");
                    return None;
                }
                let key = ItemKey::new(name);
                if !self.admit(&key) {
                    self.stats.inc_duplicate();
                    return None;
                }
                Some(key)
            })
            .collect()
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded_prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }

    /// Check-then-insert under one lock. `true` only for the first caller per key.
    pub fn admit(&self, key: &ItemKey) -> bool {
        let mut seen = self.seen.lock();
        if seen.contains(key) {
            return false;
        }
        seen.insert(key.clone())
    }

    pub fn unique_items(&self) -> usize {
        self.seen.lock().len()
    }
}
