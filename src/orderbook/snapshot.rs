//! Snapshot Fetcher.
//!
//! A one-shot async retrieval of a REST depth snapshot. The synchronizer
//! never talks to `reqwest` directly, it drives an injectable
//! [`SnapshotSource`]. Production code gets [`HttpSnapshotSource`]; tests
//! get a fake that never touches the network.

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::binance::client::BinanceClient;
use crate::orderbook::rate_limiter::RateLimiter;

/// A full, point-in-time view of the top N levels, tagged with the
/// server's `last_update_id` at the time it was taken.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
    pub last_update_id: i64,
    pub valid: bool,
}

impl Snapshot {
    /// An invalid placeholder, used whenever the fetch itself failed.
    pub fn invalid() -> Self {
        Self {
            bids: Vec::new(),
            asks: Vec::new(),
            last_update_id: 0,
            valid: false,
        }
    }
}

/// Contract consumed by the sync state machine from an external HTTPS
/// client: given a symbol and depth limit, eventually resolves to a
/// [`Snapshot`], `valid: false` on any error, never an
/// `Err`. Resolution is once-only per call; the synchronizer polls the
/// resulting future without blocking (see
/// [`crate::orderbook::sync::Synchronizer::tick`]).
///
/// Native async-fn-in-trait (stable since Rust 1.75, matching this
/// crate's MSRV) rather than `#[async_trait]`: the synchronizer is
/// generic over one concrete `S: SnapshotSource`, never `dyn`, so the
/// extra boxing `async_trait` buys isn't needed.
pub trait SnapshotSource: Send + Sync + 'static {
    fn fetch(&self, symbol: String, limit: u32) -> impl std::future::Future<Output = Snapshot> + Send;
}

/// Production [`SnapshotSource`]: `GET /api/v3/depth` over `reqwest`,
/// via [`crate::binance::client::BinanceClient`].
pub struct HttpSnapshotSource {
    client: Arc<BinanceClient>,
    rate_limiter: RateLimiter,
}

impl HttpSnapshotSource {
    pub fn new(client: Arc<BinanceClient>) -> Self {
        Self {
            client,
            rate_limiter: RateLimiter::new(),
        }
    }
}

impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self, symbol: String, limit: u32) -> Snapshot {
        if self.rate_limiter.wait().await.is_err() {
            warn!(symbol = %symbol, "Snapshot request throttled, queue timed out");
            return Snapshot::invalid();
        }

        match self.client.get_depth(&symbol, limit).await {
            Ok(response) => match parse_levels(&response.bids).zip(parse_levels(&response.asks)) {
                Some((bids, asks)) => {
                    debug!(
                        symbol = %symbol,
                        last_update_id = response.last_update_id,
                        bid_levels = bids.len(),
                        ask_levels = asks.len(),
                        "Fetched order book snapshot"
                    );
                    Snapshot {
                        bids,
                        asks,
                        last_update_id: response.last_update_id,
                        valid: true,
                    }
                }
                None => {
                    warn!(symbol = %symbol, "Snapshot response contained an unparseable decimal");
                    Snapshot::invalid()
                }
            },
            Err(err) => {
                warn!(symbol = %symbol, error = %err, "Snapshot fetch failed");
                Snapshot::invalid()
            }
        }
    }
}

fn parse_levels(raw: &[(String, String)]) -> Option<Vec<(Decimal, Decimal)>> {
    raw.iter()
        .map(|(p, q)| Some((Decimal::from_str(p).ok()?, Decimal::from_str(q).ok()?)))
        .collect()
}
