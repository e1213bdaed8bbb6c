use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::error::FetchError;
use super::types::{BidAskResponse, ItemsInfoResponse, ManifestResponse};
use super::MarketApi;
use crate::keys::KeyRotator;
use crate::stats::Stats;
use crate::types::{CatalogShard, ItemKey, ListingRow, OrderBookSnapshot, SaleRecord};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub export_url: String,
    pub shard_url_prefix: String,
    pub api_base_url: String,
    pub rate_limit_cooldown: Duration,
    pub http_timeout: Duration,
}

/// HTTP client for the marketplace. Every call goes through the same
/// throttle loop: 429 sleeps for the cooldown and re-sends, anything else
/// non-2xx is returned as an error.
pub struct MarketClient {
    http: reqwest::Client,
    cfg: ClientConfig,
    keys: KeyRotator,
    stats: Arc<Stats>,
}

impl MarketClient {
    pub fn new(cfg: ClientConfig, keys: KeyRotator, stats: Arc<Stats>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.http_timeout)
            .build()?;
        tracing::debug!(keys = keys.len(), api = %cfg.api_base_url, "MarketClient initialized");
        Ok(Self {
            http,
            cfg,
            keys,
            stats,
        })
    }

    /// GET `<api_base_url>/<endpoint>` with `params`, drawing a fresh key for
    /// every attempt.
    pub async fn request(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<Response, FetchError> {
        let url = format!("{}/{}", self.cfg.api_base_url.trim_end_matches('/'), endpoint);
        self.send_throttled(endpoint, || {
            self.http
                .get(&url)
                .query(&[("key", self.keys.next())])
                .query(params)
        })
        .await
    }

    async fn send_throttled<F>(&self, endpoint: &str, build: F) -> Result<Response, FetchError>
    where
        F: Fn() -> RequestBuilder + Send,
    {
        loop {
            let resp = build().send().await.map_err(|source| FetchError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                self.stats.inc_rate_limited();
                tracing::warn!(
                    endpoint = %endpoint,
                    cooldown_ms = self.cfg.rate_limit_cooldown.as_millis() as u64,
                    "rate limited, cooling down before retry"
                );
                tokio::time::sleep(self.cfg.rate_limit_cooldown).await;
                continue;
            }
            if !status.is_success() {
                return Err(FetchError::Status {
                    endpoint: endpoint.to_string(),
                    status: status.as_u16(),
                });
            }
            return Ok(resp);
        }
    }

    async fn decode<T: DeserializeOwned>(endpoint: &str, resp: Response) -> Result<T, FetchError> {
        let body = resp.text().await.map_err(|source| FetchError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;
        serde_json::from_str(&body).map_err(|source| FetchError::Decode {
            endpoint: endpoint.to_string(),
            snippet: body.chars().take(256).collect(),
            source,
        })
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let resp = self.request(endpoint, params).await?;
        Self::decode(endpoint, resp).await
    }

    fn no_data(&self, item: &ItemKey, endpoint: &str, err: FetchError) {
        self.stats.inc_http_failure();
        tracing::warn!(
            item = %item,
            endpoint = %endpoint,
            error = %err,
            "request failed, treating as no data"
        );
    }
}

#[async_trait]
impl MarketApi for MarketClient {
    async fn fetch_manifest(&self) -> Result<Vec<CatalogShard>, FetchError> {
        let url = self.cfg.export_url.as_str();
        let resp = self.send_throttled(url, || self.http.get(url)).await?;
        let manifest: ManifestResponse = Self::decode(url, resp).await?;
        if !manifest.success {
            return Err(FetchError::ManifestRejected);
        }
        Ok(manifest.items.into_iter().map(CatalogShard).collect())
    }

    async fn fetch_shard(&self, shard: &CatalogShard) -> Result<Vec<ListingRow>, FetchError> {
        let url = format!("{}{}", self.cfg.shard_url_prefix, shard.0);
        let resp = self.send_throttled(&url, || self.http.get(&url)).await?;
        Self::decode(&url, resp).await
    }

    async fn fetch_history(&self, item: &ItemKey) -> Option<Vec<SaleRecord>> {
        const ENDPOINT: &str = "get-list-items-info";
        match self
            .request_json::<ItemsInfoResponse>(
                ENDPOINT,
                &[("list_hash_name[]", item.name.as_str())],
            )
            .await
        {
            Ok(resp) => match resp.into_item(&item.name) {
                Ok(info) => info?.sales(),
                Err(source) => {
                    let err = FetchError::Decode {
                        endpoint: ENDPOINT.to_string(),
                        snippet: format!("data[{}]", item.name),
                        source,
                    };
                    self.no_data(item, ENDPOINT, err);
                    None
                }
            },
            Err(e) => {
                self.no_data(item, ENDPOINT, e);
                None
            }
        }
    }

    async fn fetch_order_book(&self, item: &ItemKey) -> Option<OrderBookSnapshot> {
        const ENDPOINT: &str = "bid-ask";
        match self
            .request_json::<BidAskResponse>(
                ENDPOINT,
                &[("hash_name", item.name.as_str()), ("phase", item.phase.as_str())],
            )
            .await
        {
            Ok(resp) => Some(resp.into_snapshot()),
            Err(e) => {
                self.no_data(item, ENDPOINT, e);
                None
            }
        }
    }
}
