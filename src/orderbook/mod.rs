//! The Order-Book Synchronizer: five cooperating components that turn a
//! live depth-diff stream plus an asynchronously fetched snapshot into a
//! gap-free, causally consistent local book.
//!
//! | Component | Module |
//! |---|---|
//! | Book Store | [`book`] |
//! | Event Buffer | [`buffer`] |
//! | Snapshot Fetcher | [`snapshot`] |
//! | Sync State Machine | [`sync`] |
//! | Ingress Dispatcher | [`dispatch`] |
//!
//! [`feed`] is the external WebSocket collaborator that hands raw frames
//! to the dispatcher.

pub mod book;
pub mod buffer;
pub mod dispatch;
pub mod feed;
pub mod rate_limiter;
pub mod snapshot;
pub mod sync;

pub use book::{BookStore, PriceLevel};
pub use buffer::EventBuffer;
pub use dispatch::IngressDispatcher;
pub use feed::DepthFeed;
pub use snapshot::{HttpSnapshotSource, Snapshot, SnapshotSource};
pub use sync::{run_background_worker, DiffEvent, SyncState, Synchronizer};
