//! Order-Book Synchronizer library crate.
//!
//! The binary (`main.rs`) is a thin runner: load [`config::SyncConfig`],
//! build a [`orderbook::Synchronizer`], wire it to a
//! [`orderbook::DepthFeed`] and an [`orderbook::HttpSnapshotSource`], and
//! drive it with [`orderbook::run_background_worker`]. Everything of
//! substance lives in [`orderbook`].

pub mod binance;
pub mod config;
pub mod error;
pub mod orderbook;
