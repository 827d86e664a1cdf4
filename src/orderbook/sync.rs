//! Sync State Machine.
//!
//! Governs the `INITIALIZING -> BUFFERING -> SNAPSHOT_RECEIVED ->
//! SYNCHRONIZED` lifecycle and `ERROR_STATE` recovery: buffer incoming
//! diffs while a snapshot is in flight, align the snapshot against the
//! first buffered update, drain the remainder, then apply live diffs
//! directly. State is held behind `tokio::sync` mutexes, with an
//! `AtomicU8` state tag for lock-free `is_synchronized()` reads.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::orderbook::book::{BookStore, PriceLevel};
use crate::orderbook::buffer::EventBuffer;
use crate::orderbook::snapshot::{Snapshot, SnapshotSource};

/// A parsed incremental depth update.
///
/// `pu` (previous-update-id) is parsed and carried for forward
/// compatibility/logging only, validating it would duplicate the
/// `U`/`u` contiguity rule this state machine already enforces.
#[derive(Debug, Clone)]
pub struct DiffEvent {
    pub first_update_id: i64,
    pub final_update_id: i64,
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
    pub pu: Option<i64>,
    pub received_at: Instant,
}

/// The five lifecycle states. Stored packed into a single `AtomicU8` so
/// readers of `is_synchronized()` never need to take the Book Store
/// mutex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SyncState {
    Initializing = 0,
    Buffering = 1,
    SnapshotReceived = 2,
    Synchronized = 3,
    ErrorState = 4,
}

impl SyncState {
    fn from_u8(tag: u8) -> Self {
        match tag {
            0 => SyncState::Initializing,
            1 => SyncState::Buffering,
            2 => SyncState::SnapshotReceived,
            3 => SyncState::Synchronized,
            4 => SyncState::ErrorState,
            other => unreachable!("invalid SyncState tag: {other}"),
        }
    }
}

/// Sentinel meaning "no diff has been buffered yet this epoch" for
/// `first_buffered_u`, real update ids are always >= 1.
const NO_FIRST_BUFFERED: i64 = 0;

/// The Order-Book Synchronizer: couples the Book Store, the Event
/// Buffer, the Snapshot Fetcher, and this state machine into one owning
/// type. There is no separate "manager" facade, nothing else in this
/// crate needs to stand in for a `Synchronizer`, so its public surface
/// is the whole story.
pub struct Synchronizer<S: SnapshotSource> {
    symbol: String,
    config: SyncConfig,
    source: Arc<S>,

    book: Mutex<BookStore>,
    /// Mirrors `book.last_update_id()`, updated under the same lock, so
    /// `is_synchronized()`-adjacent hot-path reads don't need to take it.
    last_update_id_cache: AtomicI64,

    buffer: Mutex<EventBuffer>,
    first_buffered_u: AtomicI64,

    state: AtomicU8,
    running: AtomicBool,

    pending_snapshot: Mutex<Option<JoinHandle<Snapshot>>>,
    error_since: Mutex<Option<Instant>>,

    update_callback: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl<S: SnapshotSource> Synchronizer<S> {
    pub fn new(symbol: impl Into<String>, config: SyncConfig, source: S) -> Self {
        let buffer = EventBuffer::new(config.max_buffer_size);
        Self {
            symbol: symbol.into(),
            config,
            source: Arc::new(source),
            book: Mutex::new(BookStore::new()),
            last_update_id_cache: AtomicI64::new(0),
            buffer: Mutex::new(buffer),
            first_buffered_u: AtomicI64::new(NO_FIRST_BUFFERED),
            state: AtomicU8::new(SyncState::Initializing as u8),
            running: AtomicBool::new(true),
            pending_snapshot: Mutex::new(None),
            error_since: Mutex::new(None),
            update_callback: Mutex::new(None),
        }
    }

    /// Registers the single `update_callback`: invoked once per state
    /// transition that materially changes observable book contents. Must
    /// be fast and non-reentrant. It must never call back into this
    /// synchronizer's mutating operations.
    pub async fn set_update_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.update_callback.lock().await = Some(Box::new(callback));
    }

    pub fn state(&self) -> SyncState {
        SyncState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SyncState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_synchronized(&self) -> bool {
        self.state() == SyncState::Synchronized
    }

    /// Lock-free read of the last applied `last_update_id`.
    pub fn last_update_id(&self) -> i64 {
        self.last_update_id_cache.load(Ordering::Acquire)
    }

    /// Downstream reader accessor: an owned copy-out of the top `n`
    /// levels per side.
    pub async fn top(&self, n: usize) -> (Vec<PriceLevel>, Vec<PriceLevel>) {
        self.book.lock().await.top(n)
    }

    /// `INITIALIZING -> BUFFERING`: request the first snapshot.
    pub async fn start(&self) {
        if self.state() != SyncState::Initializing {
            return;
        }
        info!(symbol = %self.symbol, "Starting synchronizer");
        self.request_snapshot().await;
        self.set_state(SyncState::Buffering);
    }

    /// Cooperative shutdown flag. Idempotent; observed by the background
    /// worker at the next tick boundary.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Spawns the snapshot fetch off the calling thread, replacing any
    /// prior in-flight fetch.
    async fn request_snapshot(&self) {
        let source = Arc::clone(&self.source);
        let symbol = self.symbol.clone();
        let limit = self.config.snapshot_depth;
        let handle = tokio::spawn(async move { source.fetch(symbol, limit).await });
        *self.pending_snapshot.lock().await = Some(handle);
    }

    /// Ingress Dispatcher's routing step, called once per parsed diff
    /// event regardless of current state.
    pub async fn on_diff(&self, event: DiffEvent) {
        match self.state() {
            SyncState::Initializing | SyncState::ErrorState => {
                // No transition defined for a diff arriving before
                // `start()` or while recovering from a protocol
                // violation; dropped rather than risk buffering against
                // a stale epoch.
                debug!(symbol = %self.symbol, state = ?self.state(), "Dropping diff: not buffering or synchronized yet");
            }
            SyncState::Buffering | SyncState::SnapshotReceived => {
                self.buffer_event(event).await;
            }
            SyncState::Synchronized => {
                self.apply_in_synchronized(event).await;
            }
        }
    }

    async fn buffer_event(&self, event: DiffEvent) {
        if self
            .first_buffered_u
            .compare_exchange(
                NO_FIRST_BUFFERED,
                event.first_update_id,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            debug!(symbol = %self.symbol, first_buffered_u = event.first_update_id, "Recorded first buffered U");
        }
        self.buffer.lock().await.push(event);
    }

    async fn apply_in_synchronized(&self, event: DiffEvent) {
        let mut book = self.book.lock().await;
        let last = book.last_update_id();

        if event.final_update_id <= last {
            debug!(symbol = %self.symbol, u = event.final_update_id, last_update_id = last, "Ignoring stale diff");
            return;
        }

        if event.first_update_id > last + 1 {
            drop(book);
            error!(
                symbol = %self.symbol,
                expected_u = last + 1,
                received_first_update_id = event.first_update_id,
                "Gap detected in SYNCHRONIZED; entering ERROR_STATE"
            );
            self.enter_error_state().await;
            return;
        }

        book.apply_deltas(&event.bids, &event.asks, event.final_update_id);
        self.last_update_id_cache.store(event.final_update_id, Ordering::Release);
        drop(book);
        self.fire_callback().await;
    }

    async fn enter_error_state(&self) {
        *self.error_since.lock().await = Some(Instant::now());
        self.set_state(SyncState::ErrorState);
    }

    async fn fire_callback(&self) {
        if let Some(callback) = self.update_callback.lock().await.as_ref() {
            callback();
        }
    }

    /// One iteration of the background worker's poll loop: advances
    /// whatever the current state calls for. Never blocks longer than a
    /// single backoff sleep that this state's transition requires.
    pub async fn tick(&self) {
        match self.state() {
            SyncState::Initializing | SyncState::Synchronized => {}
            SyncState::Buffering => self.tick_buffering().await,
            SyncState::SnapshotReceived => self.tick_snapshot_received().await,
            SyncState::ErrorState => self.tick_error_state().await,
        }
    }

    async fn tick_buffering(&self) {
        let mut pending = self.pending_snapshot.lock().await;
        let Some(handle) = pending.as_mut() else {
            drop(pending);
            self.request_snapshot().await;
            return;
        };
        if !handle.is_finished() {
            return;
        }
        let handle = pending.take().unwrap();
        drop(pending);

        let snapshot = match handle.await {
            Ok(snapshot) => snapshot,
            Err(join_err) => {
                warn!(symbol = %self.symbol, error = %join_err, "Snapshot fetch task panicked");
                Snapshot::invalid()
            }
        };

        let first_buffered = self.first_buffered_u.load(Ordering::Acquire);
        let aligned = first_buffered == NO_FIRST_BUFFERED || snapshot.last_update_id >= first_buffered;

        if snapshot.valid && aligned {
            info!(symbol = %self.symbol, last_update_id = snapshot.last_update_id, "Installing snapshot");
            let mut book = self.book.lock().await;
            book.replace_with(&snapshot);
            self.last_update_id_cache.store(book.last_update_id(), Ordering::Release);
            drop(book);
            self.set_state(SyncState::SnapshotReceived);
        } else {
            warn!(
                symbol = %self.symbol,
                valid = snapshot.valid,
                snapshot_last_update_id = snapshot.last_update_id,
                first_buffered_u = first_buffered,
                "Snapshot stale or invalid; re-requesting after backoff"
            );
            tokio::time::sleep(self.config.snapshot_retry_delay).await;
            self.request_snapshot().await;
        }
    }

    /// Buffer drain: applies every buffered event whose `u` is newer
    /// than the installed snapshot, requiring the *first* applied event
    /// to straddle the snapshot's `last_update_id`.
    async fn tick_snapshot_received(&self) {
        let mut book = self.book.lock().await;
        let mut buffer = self.buffer.lock().await;
        let mut applied_any = false;

        loop {
            let Some(event) = buffer.pop_front() else {
                break;
            };
            let l = book.last_update_id();

            if event.final_update_id <= l {
                continue;
            }

            if !applied_any && !(event.first_update_id <= l + 1 && l + 1 <= event.final_update_id) {
                drop(buffer);
                drop(book);
                error!(
                    symbol = %self.symbol,
                    book_last_update_id = l,
                    event_first_update_id = event.first_update_id,
                    event_final_update_id = event.final_update_id,
                    "Drain alignment failure; entering ERROR_STATE"
                );
                self.enter_error_state().await;
                return;
            }

            book.apply_deltas(&event.bids, &event.asks, event.final_update_id);
            self.last_update_id_cache.store(event.final_update_id, Ordering::Release);
            applied_any = true;
        }

        drop(buffer);
        drop(book);
        self.set_state(SyncState::Synchronized);
        self.fire_callback().await;
        info!(symbol = %self.symbol, last_update_id = self.last_update_id(), "Synchronized");
    }

    async fn tick_error_state(&self) {
        let since = *self.error_since.lock().await;
        let Some(since) = since else {
            *self.error_since.lock().await = Some(Instant::now());
            return;
        };
        if since.elapsed() >= self.config.error_backoff {
            self.reset().await;
        }
    }

    /// Clears Book Store, Event Buffer, and `first_buffered_u`, and
    /// re-requests a snapshot. Idempotent; acquires the Book Store mutex
    /// before the Event Buffer mutex.
    pub async fn reset(&self) {
        info!(symbol = %self.symbol, "Resetting synchronizer");
        {
            let mut book = self.book.lock().await;
            let mut buffer = self.buffer.lock().await;
            book.clear();
            buffer.clear();
        }
        self.last_update_id_cache.store(0, Ordering::Release);
        self.first_buffered_u.store(NO_FIRST_BUFFERED, Ordering::Release);
        *self.error_since.lock().await = None;
        *self.pending_snapshot.lock().await = None;
        self.set_state(SyncState::Initializing);
        self.start().await;
    }
}

/// Runs `synchronizer.tick()` on an interval until [`Synchronizer::stop`]
/// is observed. Intended to be spawned once per synchronizer from
/// `main.rs`.
pub async fn run_background_worker<S: SnapshotSource>(synchronizer: Arc<Synchronizer<S>>, tick_interval: Duration) {
    while synchronizer.is_running() {
        synchronizer.tick().await;
        tokio::time::sleep(tick_interval).await;
    }
}
