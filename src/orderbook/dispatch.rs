//! Ingress Dispatcher.
//!
//! Normalizes raw feed frames into [`DiffEvent`]s and routes them into
//! the sync state machine. Handles both a bare diff payload and the
//! combined-stream envelope (`{"stream": "...", "data": {...}}`).
//!
//! The dispatcher never performs I/O and never blocks on the state
//! machine for more than the brief async critical section `on_diff`
//! itself takes.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::orderbook::snapshot::SnapshotSource;
use crate::orderbook::sync::{DiffEvent, Synchronizer};

/// Wire shape of a single depth diff payload. Field names are Binance's
/// own; `pu` is parsed but never validated, the `U`/`u` contiguity
/// check below is sufficient.
#[derive(Debug, Deserialize)]
struct RawDiffFrame {
    #[serde(rename = "U")]
    first_update_id: i64,
    #[serde(rename = "u")]
    final_update_id: i64,
    #[serde(rename = "pu")]
    previous_update_id: Option<i64>,
    #[serde(rename = "b")]
    bids: Vec<(String, String)>,
    #[serde(rename = "a")]
    asks: Vec<(String, String)>,
}

/// Parses a raw JSON text frame into a [`DiffEvent`].
///
/// Unwraps the combined-stream envelope (`{"stream": "...", "data":
/// {...}}`) when present, otherwise treats the whole document as the
/// diff. Returns `None` on any malformed input; the caller drops the
/// message silently and performs no state change.
pub fn parse_frame(text: &str) -> Option<DiffEvent> {
    let document: Value = serde_json::from_str(text).ok()?;
    let diff_value = document.get("data").cloned().unwrap_or(document);
    let raw: RawDiffFrame = serde_json::from_value(diff_value).ok()?;

    if raw.first_update_id > raw.final_update_id {
        return None;
    }

    let bids = parse_levels(&raw.bids)?;
    let asks = parse_levels(&raw.asks)?;

    Some(DiffEvent {
        first_update_id: raw.first_update_id,
        final_update_id: raw.final_update_id,
        bids,
        asks,
        pu: raw.previous_update_id,
        received_at: Instant::now(),
    })
}

fn parse_levels(raw: &[(String, String)]) -> Option<Vec<(Decimal, Decimal)>> {
    raw.iter()
        .map(|(price, qty)| Some((Decimal::from_str(price).ok()?, Decimal::from_str(qty).ok()?)))
        .collect()
}

/// Thin routing wrapper around a [`Synchronizer`]: parses a frame, then
/// hands the result to `on_diff` for the state-dependent
/// buffer/apply/ignore decision.
pub struct IngressDispatcher<S: SnapshotSource> {
    synchronizer: Arc<Synchronizer<S>>,
}

impl<S: SnapshotSource> IngressDispatcher<S> {
    pub fn new(synchronizer: Arc<Synchronizer<S>>) -> Self {
        Self { synchronizer }
    }

    /// Handles one raw text frame from the feed. Malformed frames are
    /// dropped with a debug-level log and no state change.
    pub async fn handle_frame(&self, text: &str) {
        match parse_frame(text) {
            Some(event) => self.synchronizer.on_diff(event).await,
            None => debug!(bytes = text.len(), "Dropping malformed depth frame"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_direct_diff_payload() {
        let text = r#"{
            "e": "depthUpdate",
            "E": 123456789,
            "s": "BTCUSDT",
            "U": 157,
            "u": 160,
            "b": [["0.0024", "10"]],
            "a": [["0.0026", "100"]]
        }"#;
        let event = parse_frame(text).expect("valid frame");
        assert_eq!(event.first_update_id, 157);
        assert_eq!(event.final_update_id, 160);
        assert_eq!(event.bids.len(), 1);
        assert_eq!(event.asks.len(), 1);
    }

    #[test]
    fn unwraps_the_combined_stream_envelope() {
        let text = r#"{
            "stream": "btcusdt@depth",
            "data": { "U": 1, "u": 2, "b": [], "a": [] }
        }"#;
        let event = parse_frame(text).expect("valid frame");
        assert_eq!(event.first_update_id, 1);
        assert_eq!(event.final_update_id, 2);
    }

    #[test]
    fn rejects_first_update_id_greater_than_final() {
        let text = r#"{"U": 10, "u": 5, "b": [], "a": []}"#;
        assert!(parse_frame(text).is_none());
    }

    #[test]
    fn drops_frames_missing_required_fields() {
        assert!(parse_frame(r#"{"U": 1, "b": [], "a": []}"#).is_none());
        assert!(parse_frame(r#"not json at all"#).is_none());
    }

    #[test]
    fn drops_frames_with_unparseable_decimals() {
        let text = r#"{"U": 1, "u": 2, "b": [["not-a-number", "1"]], "a": []}"#;
        assert!(parse_frame(text).is_none());
    }

    #[test]
    fn ignores_unknown_top_level_keys() {
        let text = r#"{"U": 1, "u": 2, "b": [], "a": [], "extra": {"nested": true}}"#;
        assert!(parse_frame(text).is_some());
    }
}
