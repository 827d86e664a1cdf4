//! Binance REST API Type Definitions
//!
//! Wire-level response shapes for the single endpoint this crate calls:
//! `GET /api/v3/depth`.

use serde::{Deserialize, Serialize};

/// Response from `/api/v3/depth`.
///
/// Prices and quantities arrive as decimal strings, same as the
/// WebSocket diff stream, parsed into [`rust_decimal::Decimal`] one layer up
/// in [`crate::orderbook::snapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthSnapshotResponse {
    pub last_update_id: i64,
    pub bids: Vec<(String, String)>,
    pub asks: Vec<(String, String)>,
}

/// Error shape returned by Binance REST endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub code: i64,
    pub msg: String,
}
