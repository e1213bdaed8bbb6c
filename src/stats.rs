use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::Rejection;

#[derive(Default)]
pub struct Stats {
    start_ms: AtomicU64,

    shards_total: AtomicU64,
    shards_done: AtomicU64,
    shards_failed: AtomicU64,

    items_seen: AtomicU64,
    duplicates: AtomicU64,
    filtered: AtomicU64,

    accepted: AtomicU64,
    rejected_insufficient: AtomicU64,
    rejected_stale: AtomicU64,
    rejected_out_of_range: AtomicU64,

    rate_limited: AtomicU64,
    http_failures: AtomicU64,
}

impl Stats {
    pub fn new(now_ms: u64) -> Arc<Self> {
        let s = Arc::new(Self::default());
        s.start_ms.store(now_ms, Ordering::Relaxed);
        s
    }

    pub fn set_shards_total(&self, n: u64) {
        self.shards_total.store(n, Ordering::Relaxed);
    }

    pub fn inc_shard_done(&self) {
        self.shards_done.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_shard_failed(&self) {
        self.shards_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_item_seen(&self) {
        self.items_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected(&self, reason: &Rejection) {
        let counter = match reason {
            Rejection::InsufficientHistory { .. } => &self.rejected_insufficient,
            Rejection::Stale { .. } => &self.rejected_stale,
            Rejection::OutOfRange { .. } => &self.rejected_out_of_range,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_http_failure(&self) {
        self.http_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, now_ms: u64) -> StatsSnapshot {
        let start = self.start_ms.load(Ordering::Relaxed);
        StatsSnapshot {
            now_ms,
            up_sec: now_ms.saturating_sub(start) / 1000,
            shards_total: self.shards_total.load(Ordering::Relaxed),
            shards_done: self.shards_done.load(Ordering::Relaxed),
            shards_failed: self.shards_failed.load(Ordering::Relaxed),
            items_seen: self.items_seen.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected_insufficient: self.rejected_insufficient.load(Ordering::Relaxed),
            rejected_stale: self.rejected_stale.load(Ordering::Relaxed),
            rejected_out_of_range: self.rejected_out_of_range.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            http_failures: self.http_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub now_ms: u64,
    pub up_sec: u64,
    pub shards_total: u64,
    pub shards_done: u64,
    pub shards_failed: u64,
    pub items_seen: u64,
    pub duplicates: u64,
    pub filtered: u64,
    pub accepted: u64,
    pub rejected_insufficient: u64,
    pub rejected_stale: u64,
    pub rejected_out_of_range: u64,
    pub rate_limited: u64,
    pub http_failures: u64,
}

impl StatsSnapshot {
    pub fn log(&self, msg: &'static str) {
        tracing::info!(
            up_sec = self.up_sec,
            shards_total = self.shards_total,
            shards_done = self.shards_done,
            shards_failed = self.shards_failed,
            items_seen = self.items_seen,
            duplicates = self.duplicates,
            filtered = self.filtered,
            accepted = self.accepted,
            rejected_insufficient = self.rejected_insufficient,
            rejected_stale = self.rejected_stale,
            rejected_out_of_range = self.rejected_out_of_range,
            rate_limited = self.rate_limited,
            http_failures = self.http_failures,
            "{}",
            msg
        );
    }
}

pub async fn append_jsonl(path: &Option<String>, snap: &StatsSnapshot) -> anyhow::Result<()> {
    let Some(p) = path.as_ref().map(|x| x.trim().to_string()).filter(|x| !x.is_empty()) else {
        return Ok(());
    };
    use tokio::io::AsyncWriteExt;
    let mut line = serde_json::to_string(snap)?;
    line.push('\n');
    let mut f = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&p)
        .await?;
    f.write_all(line.as_bytes()).await?;
    Ok(())
}
