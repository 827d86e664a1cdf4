//! End-to-end synchronizer tests, driven purely through the public
//! surface (`start`, `on_diff`, `tick`, `reset`, `top`) against a fake
//! [`SnapshotSource`], no real network I/O.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use orderbook_sync::config::SyncConfig;
use orderbook_sync::orderbook::{DiffEvent, Snapshot, SnapshotSource, SyncState, Synchronizer};
use rust_decimal_macros::dec;
use tokio::sync::Mutex;

struct ScriptedSource {
    snapshots: Mutex<Vec<Snapshot>>,
    fetch_count: AtomicUsize,
}

impl ScriptedSource {
    fn new(snapshots: Vec<Snapshot>) -> Self {
        Self {
            snapshots: Mutex::new(snapshots),
            fetch_count: AtomicUsize::new(0),
        }
    }
}

impl SnapshotSource for ScriptedSource {
    async fn fetch(&self, _symbol: String, _limit: u32) -> Snapshot {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        let mut snapshots = self.snapshots.lock().await;
        if snapshots.is_empty() {
            Snapshot::invalid()
        } else {
            snapshots.remove(0)
        }
    }
}

fn fast_config() -> SyncConfig {
    SyncConfig {
        symbol: "BTCUSDT".to_string(),
        ws_base_url: "wss://unused.invalid".to_string(),
        rest_base_url: "https://unused.invalid".to_string(),
        snapshot_depth: 5000,
        max_buffer_size: 1000,
        snapshot_retry_delay: Duration::from_millis(1),
        tick_interval: Duration::from_millis(1),
        error_backoff: Duration::from_millis(10),
    }
}

fn diff(u: i64, uu: i64, bids: Vec<(rust_decimal::Decimal, rust_decimal::Decimal)>) -> DiffEvent {
    DiffEvent {
        first_update_id: u,
        final_update_id: uu,
        bids,
        asks: Vec::new(),
        pu: None,
        received_at: std::time::Instant::now(),
    }
}

async fn drive_until<S: SnapshotSource>(sync: &Synchronizer<S>, target: SyncState) {
    for _ in 0..500 {
        if sync.state() == target {
            return;
        }
        sync.tick().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("synchronizer never reached {target:?}, stuck at {:?}", sync.state());
}

#[tokio::test]
async fn full_lifecycle_buffers_then_drains_then_applies_live_diffs() {
    let source = ScriptedSource::new(vec![Snapshot {
        bids: vec![(dec!(100), dec!(5))],
        asks: vec![(dec!(101), dec!(5))],
        last_update_id: 160,
        valid: true,
    }]);
    let sync = Synchronizer::new("BTCUSDT", fast_config(), source);

    assert_eq!(sync.state(), SyncState::Initializing);
    sync.start().await;
    assert_eq!(sync.state(), SyncState::Buffering);

    // Diffs arriving while we wait for the snapshot are buffered, not
    // applied.
    sync.on_diff(diff(157, 160, vec![(dec!(99), dec!(1))])).await;
    sync.on_diff(diff(161, 165, vec![(dec!(98), dec!(1))])).await;

    drive_until(&sync, SyncState::Synchronized).await;
    assert_eq!(sync.last_update_id(), 165);

    let (bids, asks) = sync.top(10).await;
    assert!(bids.iter().any(|l| l.price == dec!(100)));
    assert!(bids.iter().any(|l| l.price == dec!(98)));
    assert!(asks.iter().any(|l| l.price == dec!(101)));

    // Steady state: further diffs apply directly.
    sync.on_diff(diff(166, 170, vec![(dec!(100), dec!(0))])).await;
    let (bids, _) = sync.top(10).await;
    assert!(!bids.iter().any(|l| l.price == dec!(100)));
    assert_eq!(sync.last_update_id(), 170);
}

#[tokio::test]
async fn gap_then_self_healing_reset_reaches_synchronized_again() {
    let source = ScriptedSource::new(vec![
        Snapshot {
            bids: Vec::new(),
            asks: Vec::new(),
            last_update_id: 50,
            valid: true,
        },
        Snapshot {
            bids: Vec::new(),
            asks: Vec::new(),
            last_update_id: 90,
            valid: true,
        },
    ]);
    let sync = Synchronizer::new("BTCUSDT", fast_config(), source);
    sync.start().await;
    drive_until(&sync, SyncState::Synchronized).await;

    sync.on_diff(diff(55, 60, Vec::new())).await;
    assert_eq!(sync.state(), SyncState::ErrorState);
    assert!(!sync.is_synchronized());

    drive_until(&sync, SyncState::Synchronized).await;
    assert_eq!(sync.last_update_id(), 90);
}

#[tokio::test]
async fn invalid_snapshot_is_retried_until_a_valid_one_arrives() {
    let source = ScriptedSource::new(vec![
        Snapshot::invalid(),
        Snapshot::invalid(),
        Snapshot {
            bids: Vec::new(),
            asks: Vec::new(),
            last_update_id: 5,
            valid: true,
        },
    ]);
    let sync = Synchronizer::new("BTCUSDT", fast_config(), source);
    sync.start().await;

    drive_until(&sync, SyncState::Synchronized).await;
    assert_eq!(sync.last_update_id(), 5);
}
