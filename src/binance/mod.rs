//! Binance REST API integration.
//!
//! Scoped to the single endpoint the Order-Book Synchronizer needs: the
//! depth snapshot fetch.

pub mod client;
pub mod types;

pub use client::BinanceClient;
pub use types::{ApiErrorResponse, DepthSnapshotResponse};
