use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Context;
use parking_lot::Mutex;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::types::ItemKey;

/// Cents, half away from zero. Shared by the snapshot file and the accept log.
pub fn round_cents(price: Decimal) -> Decimal {
    price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Accepted prices for the whole run. Last write for a key wins.
#[derive(Default)]
pub struct ResultStore {
    prices: Mutex<BTreeMap<ItemKey, Decimal>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, item: ItemKey, price: Decimal) -> Option<Decimal> {
        self.prices.lock().insert(item, price)
    }

    #[cfg(test)]
    pub fn get(&self, item: &ItemKey) -> Option<Decimal> {
        self.prices.lock().get(item).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.prices.lock().is_empty()
    }

    /// `<name>^<price>` per line, price rounded half away from zero to cents.
    pub fn render(&self) -> String {
        let prices = self.prices.lock();
        let mut out = String::with_capacity(prices.len() * 48);
        for (item, price) in prices.iter() {
            let _ = writeln!(out, "{}^{:.2}", item, round_cents(*price));
        }
        out
    }
}

/// Overwrites the output file with the current store contents.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn flush(&self, store: &ResultStore) -> anyhow::Result<usize> {
        let body = store.render();
        let count = body.lines().count();
        tokio::fs::write(&self.path, body.as_bytes())
            .await
            .with_context(|| format!("write snapshot to {}", self.path.display()))?;
        tracing::info!(path = %self.path.display(), items = count, "snapshot written");
        Ok(count)
    }
}
