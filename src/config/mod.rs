//! Configuration Management
//!
//! Env-driven configuration for the synchronizer: read an env var, fall
//! back to a documented default, parse, fail loudly on a malformed
//! override.

use std::time::Duration;

/// Tunables for a single-symbol [`crate::orderbook::sync::Synchronizer`].
///
/// ## Environment Variables
///
/// - `SYMBOL`: trading pair to track (default: `BTCUSDT`)
/// - `BINANCE_WS_URL`: depth-stream WebSocket base (default:
///   `wss://stream.binance.com:9443/ws`)
/// - `BINANCE_REST_URL`: REST API base for snapshot fetches (default:
///   `https://api.binance.com`)
/// - `SNAPSHOT_DEPTH`: levels requested per snapshot (default: 5000)
/// - `MAX_BUFFER_SIZE`: event buffer capacity (default: 1000)
/// - `SNAPSHOT_RETRY_DELAY_MS`: backoff after an invalid snapshot (default: 1000)
/// - `TICK_INTERVAL_MS`: background worker poll period (default: 10)
/// - `ERROR_BACKOFF_SECS`: delay before resetting out of `ERROR_STATE` (default: 5)
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Trading pair symbol, stored uppercase (REST) / lowercased on demand (WS).
    pub symbol: String,
    pub ws_base_url: String,
    pub rest_base_url: String,
    pub snapshot_depth: u32,
    pub max_buffer_size: usize,
    pub snapshot_retry_delay: Duration,
    pub tick_interval: Duration,
    pub error_backoff: Duration,
}

impl SyncConfig {
    /// Loads configuration from environment variables, falling back to the
    /// documented defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns an error if an override is present but fails to parse.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let symbol = std::env::var("SYMBOL").unwrap_or_else(|_| "BTCUSDT".to_string());

        let ws_base_url = std::env::var("BINANCE_WS_URL")
            .unwrap_or_else(|_| "wss://stream.binance.com:9443/ws".to_string());

        let rest_base_url = std::env::var("BINANCE_REST_URL")
            .unwrap_or_else(|_| "https://api.binance.com".to_string());

        let snapshot_depth: u32 = std::env::var("SNAPSHOT_DEPTH")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()?;

        let max_buffer_size: usize = std::env::var("MAX_BUFFER_SIZE")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()?;

        let snapshot_retry_delay_ms: u64 = std::env::var("SNAPSHOT_RETRY_DELAY_MS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()?;

        let tick_interval_ms: u64 = std::env::var("TICK_INTERVAL_MS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;

        let error_backoff_secs: u64 = std::env::var("ERROR_BACKOFF_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()?;

        Ok(Self {
            symbol: symbol.to_uppercase(),
            ws_base_url,
            rest_base_url,
            snapshot_depth,
            max_buffer_size,
            snapshot_retry_delay: Duration::from_millis(snapshot_retry_delay_ms),
            tick_interval: Duration::from_millis(tick_interval_ms),
            error_backoff: Duration::from_secs(error_backoff_secs),
        })
    }

    /// Lowercased symbol, as Binance's WebSocket stream names require.
    pub fn ws_symbol(&self) -> String {
        self.symbol.to_lowercase()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            ws_base_url: "wss://stream.binance.com:9443/ws".to_string(),
            rest_base_url: "https://api.binance.com".to_string(),
            snapshot_depth: 5000,
            max_buffer_size: 1000,
            snapshot_retry_delay: Duration::from_millis(1000),
            tick_interval: Duration::from_millis(10),
            error_backoff: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        // SAFETY: test-only, single-threaded test environment.
        unsafe {
            std::env::remove_var("SYMBOL");
            std::env::remove_var("BINANCE_WS_URL");
            std::env::remove_var("BINANCE_REST_URL");
            std::env::remove_var("SNAPSHOT_DEPTH");
            std::env::remove_var("MAX_BUFFER_SIZE");
            std::env::remove_var("SNAPSHOT_RETRY_DELAY_MS");
            std::env::remove_var("TICK_INTERVAL_MS");
            std::env::remove_var("ERROR_BACKOFF_SECS");
        }

        let config = SyncConfig::from_env().expect("defaults must parse");

        assert_eq!(config.symbol, "BTCUSDT");
        assert_eq!(config.snapshot_depth, 5000);
        assert_eq!(config.max_buffer_size, 1000);
        assert_eq!(config.snapshot_retry_delay, Duration::from_millis(1000));
        assert_eq!(config.tick_interval, Duration::from_millis(10));
        assert_eq!(config.error_backoff, Duration::from_secs(5));
    }

    #[test]
    fn symbol_is_uppercased_for_rest_and_lowercased_for_ws() {
        // SAFETY: test-only, single-threaded test environment.
        unsafe {
            std::env::set_var("SYMBOL", "ethusdt");
        }

        let config = SyncConfig::from_env().expect("config must parse");
        assert_eq!(config.symbol, "ETHUSDT");
        assert_eq!(config.ws_symbol(), "ethusdt");

        // SAFETY: test-only, single-threaded test environment.
        unsafe {
            std::env::remove_var("SYMBOL");
        }
    }
}
