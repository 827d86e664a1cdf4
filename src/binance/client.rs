//! Binance HTTP Client
//!
//! Thin `reqwest` wrapper for the REST snapshot fetch. No request signing:
//! the depth endpoint is public, and order routing / authenticated
//! endpoints are out of scope for this crate.

use crate::binance::types::{ApiErrorResponse, DepthSnapshotResponse};
use crate::error::FetchError;
use reqwest::Client;
use std::time::Duration;

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Binance REST API HTTP client, scoped to the single endpoint this crate
/// needs.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl BinanceClient {
    /// Creates a client against the default production base URL.
    pub fn new() -> Self {
        Self::with_base_url("https://api.binance.com".to_string())
    }

    /// Creates a client against an arbitrary base URL (used in tests, and by
    /// [`crate::config::SyncConfig::rest_base_url`]).
    pub fn with_base_url(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent("orderbook-sync/0.1.0")
            .build()
            .expect("failed to build reqwest client");

        Self { client, base_url }
    }

    /// `GET /api/v3/depth?symbol=<symbol>&limit=<limit>`.
    pub async fn get_depth(
        &self,
        symbol: &str,
        limit: u32,
    ) -> Result<DepthSnapshotResponse, FetchError> {
        let url = format!(
            "{}/api/v3/depth?symbol={}&limit={}",
            self.base_url,
            symbol.to_uppercase(),
            limit
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        if !response.status().is_success() {
            if let Ok(body) = response.json::<ApiErrorResponse>().await {
                return Err(FetchError::Api {
                    code: body.code,
                    msg: body.msg,
                });
            }
            return Err(FetchError::Malformed(
                "error response body did not match the documented error shape".to_string(),
            ));
        }

        response
            .json::<DepthSnapshotResponse>()
            .await
            .map_err(FetchError::from_reqwest)
    }
}

impl Default for BinanceClient {
    fn default() -> Self {
        Self::new()
    }
}
