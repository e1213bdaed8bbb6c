use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures::{stream, StreamExt};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub completed: usize,
    pub failed: usize,
}

/// Fixed-width pool over a FIFO of work units.
///
/// At most `concurrency` units run at once. `throttled` holds the caller's
/// slot for `hold` after the wrapped work finishes, which is what keeps the
/// aggregate request rate down.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    concurrency: usize,
    hold: Duration,
}

impl WorkQueue {
    pub fn new(concurrency: usize, hold: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            hold,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run `work` over every unit and wait for all of them. Unit errors are
    /// logged and counted, never propagated.
    pub async fn drain<T, F, Fut>(&self, units: impl IntoIterator<Item = T>, work: F) -> DrainReport
    where
        T: fmt::Display,
        F: Fn(T) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let mut report = DrainReport::default();

        let mut stream = stream::iter(units.into_iter().map(|unit| {
            let label = unit.to_string();
            let fut = work(unit);
            async move { (label, fut.await) }
        }))
        .buffer_unordered(self.concurrency);

        while let Some((label, res)) = stream.next().await {
            match res {
                Ok(()) => report.completed += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(unit = %label, error = %format!("{e:#}"), "work unit failed");
                }
            }
        }

        report
    }

    /// Await `work`, then sleep for the post-call hold.
    pub async fn throttled<Fut: Future>(&self, work: Fut) -> Fut::Output {
        let out = work.await;
        if !self.hold.is_zero() {
            tokio::time::sleep(self.hold).await;
        }
        out
    }
}
