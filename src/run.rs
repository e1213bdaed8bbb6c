use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use parking_lot::Mutex;

use crate::catalog::CatalogWalker;
use crate::market::MarketApi;
use crate::pricing::{ItemPriceResolver, PricingRules};
use crate::queue::WorkQueue;
use crate::stats::Stats;
use crate::store::{ResultStore, SnapshotWriter};
use crate::types::{CatalogShard, ItemKey};

/// What a queue slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// K shards in flight; the items of one shard are priced concurrently.
    Shard,
    /// All shards listed up front, then K items in flight.
    Item,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub rules: PricingRules,
    pub excluded_prefixes: Vec<String>,
    pub concurrency: usize,
    pub item_delay: Duration,
    pub granularity: Granularity,
    pub output_path: PathBuf,
}

/// Everything one pricing run shares between its workers.
pub struct PriceRun {
    walker: CatalogWalker,
    resolver: ItemPriceResolver,
    queue: WorkQueue,
    store: Arc<ResultStore>,
    writer: SnapshotWriter,
    granularity: Granularity,
    stats: Arc<Stats>,
}

impl PriceRun {
    pub fn new(api: Arc<dyn MarketApi>, opts: RunOptions, stats: Arc<Stats>) -> Self {
        let store = Arc::new(ResultStore::new());
        Self {
            walker: CatalogWalker::new(api.clone(), opts.excluded_prefixes, stats.clone()),
            resolver: ItemPriceResolver::new(api, opts.rules, store.clone(), stats.clone()),
            queue: WorkQueue::new(opts.concurrency, opts.item_delay),
            store,
            writer: SnapshotWriter::new(opts.output_path),
            granularity: opts.granularity,
            stats,
        }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Walk the catalog and price every unique item. Only a manifest failure
    /// is returned as an error; shard and item failures are logged and skipped.
    pub async fn execute(&self) -> anyhow::Result<()> {
        let shards = self
            .walker
            .shards()
            .await
            .context("failed to retrieve price list manifest")?;
        self.stats.set_shards_total(shards.len() as u64);
        tracing::info!(
            shards = shards.len(),
            concurrency = self.queue.concurrency(),
            granularity = ?self.granularity,
            "manifest loaded"
        );

        match self.granularity {
            Granularity::Shard => {
                let report = self.queue.drain(shards, |shard| self.price_shard(shard)).await;
                tracing::info!(
                    done = report.completed,
                    failed = report.failed,
                    unique_items = self.walker.unique_items(),
                    "all shards drained"
                );
            }
            Granularity::Item => {
                let items = self.list_all(shards).await;
                tracing::info!(items = items.len(), "catalog listed");
                let report = self
                    .queue
                    .drain(items, |item| async move {
                        self.queue.throttled(self.resolver.process(&item)).await;
                        Ok::<(), anyhow::Error>(())
                    })
                    .await;
                tracing::info!(done = report.completed, "all items drained");
            }
        }
        Ok(())
    }

    /// Write whatever has been accepted so far. Safe to call repeatedly.
    pub async fn flush(&self) -> anyhow::Result<usize> {
        self.writer.flush(&self.store).await
    }

    async fn price_shard(&self, shard: CatalogShard) -> anyhow::Result<()> {
        let items = match self.walker.items(&shard).await {
            Ok(items) => items,
            Err(e) => {
                self.stats.inc_shard_failed();
                return Err(e);
            }
        };
        tracing::info!(shard = %shard, items = items.len(), "pricing shard");

        futures::future::join_all(
            items
                .iter()
                .map(|item| self.queue.throttled(self.resolver.process(item))),
        )
        .await;

        self.stats.inc_shard_done();
        Ok(())
    }

    async fn list_all(&self, shards: Vec<CatalogShard>) -> Vec<ItemKey> {
        let items = Mutex::new(Vec::new());
        let report = self
            .queue
            .drain(shards, |shard| {
                let items = &items;
                async move {
                    let listed = match self.walker.items(&shard).await {
                        Ok(listed) => listed,
                        Err(e) => {
                            self.stats.inc_shard_failed();
                            return Err(e);
                        }
                    };
                    items.lock().extend(listed);
                    self.stats.inc_shard_done();
                    Ok(())
                }
            })
            .await;
        tracing::debug!(listed = report.completed, failed = report.failed, "shards listed");
        items.into_inner()
    }
}
