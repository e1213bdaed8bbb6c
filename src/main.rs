mod catalog;
mod config;
mod keys;
mod market;
mod pricing;
mod queue;
mod run;
mod stats;
mod store;
mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::keys::KeyRotator;
use crate::market::MarketClient;
use crate::run::PriceRun;
use crate::stats::Stats;

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}

fn spawn_stats_logger(stats: Arc<Stats>, every_sec: u64) -> Option<tokio::task::JoinHandle<()>> {
    if every_sec == 0 {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(every_sec));
        tick.tick().await;
        loop {
            tick.tick().await;
            stats.snapshot(now_ms()).log("progress");
        }
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let s = Settings::from_env()?;
    let stats = Stats::new(now_ms());

    let keys = KeyRotator::new(s.api_key_list())?;
    let client = MarketClient::new(s.client_config(), keys, stats.clone())?;
    let run = PriceRun::new(Arc::new(client), s.run_options()?, stats.clone());

    let logger = spawn_stats_logger(stats.clone(), s.stats_log_sec);
    let span = tracing::info_span!("run", run_id = %uuid::Uuid::new_v4());

    // Every terminal path goes through the same flush.
    let outcome = tokio::select! {
        res = run.execute().instrument(span.clone()) => res,
        () = shutdown_signal() => {
            tracing::info!(accepted = run.store().len(), "terminating, saving snapshot");
            Ok(())
        }
    };

    if let Err(e) = &outcome {
        tracing::error!(error = %format!("{e:#}"), "run aborted, saving partial results");
    }
    run.flush().instrument(span.clone()).await?;

    if let Some(h) = logger {
        h.abort();
    }
    let snap = stats.snapshot(now_ms());
    snap.log("final stats");
    if let Err(e) = stats::append_jsonl(&s.stats_jsonl_path, &snap).await {
        tracing::warn!(error = %e, "failed to append stats jsonl");
    }

    outcome
}
