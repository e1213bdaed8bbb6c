use thiserror::Error;

/// Failures of a single outbound call after 429 retries are exhausted
/// (they never are: throttling is retried until it clears).
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("GET {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GET {endpoint} non-200: status={status}")]
    Status { endpoint: String, status: u16 },

    #[error("decode {endpoint} json failed: {source} body_snippet={snippet}")]
    Decode {
        endpoint: String,
        snippet: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest reported success=false")]
    ManifestRejected,
}
