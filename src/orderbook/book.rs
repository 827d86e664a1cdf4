//! Book Store.
//!
//! Sorted bid/ask price -> quantity ladders plus a monotonic
//! `last_update_id`, narrowed to a single symbol and keyed on
//! [`rust_decimal::Decimal`] for exact price/quantity arithmetic.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::orderbook::snapshot::Snapshot;

/// A single (price, quantity) level, returned from [`BookStore::top`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Locally reconstructed order book for one symbol.
///
/// `bids` and `asks` are both stored ascending by price in a `BTreeMap`
/// (best bid is the *last* key, best ask is the *first* key), the same
/// orientation `best_bid`/`best_ask` below rely on.
#[derive(Debug, Clone, Default)]
pub struct BookStore {
    bids: BTreeMap<Decimal, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
    last_update_id: i64,
}

impl BookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_update_id(&self) -> i64 {
        self.last_update_id
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Replaces the book wholesale with a freshly fetched snapshot.
    pub fn replace_with(&mut self, snapshot: &Snapshot) {
        self.bids.clear();
        self.asks.clear();
        for &(price, qty) in &snapshot.bids {
            if !qty.is_zero() {
                self.bids.insert(price, qty);
            }
        }
        for &(price, qty) in &snapshot.asks {
            if !qty.is_zero() {
                self.asks.insert(price, qty);
            }
        }
        self.last_update_id = snapshot.last_update_id;
    }

    /// Applies a diff event's deltas and advances `last_update_id`.
    ///
    /// `q == 0` deletes the level; anything else inserts/overwrites it.
    /// Callers (the sync state machine) are responsible for only calling
    /// this with a `new_update_id` that keeps `last_update_id`
    /// non-decreasing. Violating that is a caller bug, not a recoverable
    /// condition, so it is only checked in debug builds.
    pub fn apply_deltas(
        &mut self,
        bids: &[(Decimal, Decimal)],
        asks: &[(Decimal, Decimal)],
        new_update_id: i64,
    ) {
        debug_assert!(
            new_update_id > self.last_update_id,
            "apply_deltas called with non-increasing update id: {} <= {}",
            new_update_id,
            self.last_update_id
        );

        for &(price, qty) in bids {
            Self::apply_one(&mut self.bids, price, qty);
        }
        for &(price, qty) in asks {
            Self::apply_one(&mut self.asks, price, qty);
        }
        self.last_update_id = new_update_id;
    }

    fn apply_one(side: &mut BTreeMap<Decimal, Decimal>, price: Decimal, qty: Decimal) {
        if qty.is_zero() {
            side.remove(&price);
        } else {
            side.insert(price, qty);
        }
    }

    /// Best `n` bids (highest price first) and asks (lowest price first),
    /// as an owned copy. Returns fewer than `n` per side when the side is
    /// thinner than that.
    pub fn top(&self, n: usize) -> (Vec<PriceLevel>, Vec<PriceLevel>) {
        let bids = self
            .bids
            .iter()
            .rev()
            .take(n)
            .map(|(&price, &quantity)| PriceLevel { price, quantity })
            .collect();
        let asks = self
            .asks
            .iter()
            .take(n)
            .map(|(&price, &quantity)| PriceLevel { price, quantity })
            .collect();
        (bids, asks)
    }

    /// Owned snapshot of the full book, primarily for tests.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids
            .iter()
            .next_back()
            .map(|(&price, &quantity)| PriceLevel { price, quantity })
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks
            .iter()
            .next()
            .map(|(&price, &quantity)| PriceLevel { price, quantity })
    }

    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.last_update_id = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn apply_deltas_removes_zero_quantity_levels() {
        let mut book = BookStore::new();
        book.apply_deltas(&[(dec!(100), dec!(1))], &[(dec!(101), dec!(2))], 5);
        assert_eq!(book.best_bid().unwrap().price, dec!(100));

        book.apply_deltas(&[(dec!(100), dec!(0))], &[], 6);
        assert!(book.best_bid().is_none());
        assert_eq!(book.last_update_id(), 6);
    }

    #[test]
    fn zero_qty_delta_on_absent_price_is_a_no_op() {
        let mut book = BookStore::new();
        book.apply_deltas(&[(dec!(100), dec!(0))], &[], 1);
        assert!(book.is_empty());
        assert_eq!(book.last_update_id(), 1);
    }

    #[test]
    fn top_returns_best_first_and_caps_at_n() {
        let mut book = BookStore::new();
        book.apply_deltas(
            &[(dec!(100), dec!(1)), (dec!(101), dec!(1)), (dec!(99), dec!(1))],
            &[(dec!(102), dec!(1)), (dec!(103), dec!(1))],
            1,
        );
        let (bids, asks) = book.top(2);
        assert_eq!(bids.len(), 2);
        assert_eq!(bids[0].price, dec!(101));
        assert_eq!(bids[1].price, dec!(100));
        assert_eq!(asks[0].price, dec!(102));
    }

    #[test]
    fn top_returns_fewer_than_n_when_side_is_thin() {
        let mut book = BookStore::new();
        book.apply_deltas(&[(dec!(100), dec!(1))], &[], 1);
        let (bids, asks) = book.top(5);
        assert_eq!(bids.len(), 1);
        assert!(asks.is_empty());
    }

    #[test]
    fn replace_with_snapshot_discards_prior_state() {
        let mut book = BookStore::new();
        book.apply_deltas(&[(dec!(1), dec!(1))], &[], 1);

        let snapshot = Snapshot {
            bids: vec![(dec!(50), dec!(2))],
            asks: vec![(dec!(51), dec!(3))],
            last_update_id: 42,
            valid: true,
        };
        book.replace_with(&snapshot);

        assert_eq!(book.last_update_id(), 42);
        assert_eq!(book.best_bid().unwrap().price, dec!(50));
        assert!(book.bids.contains_key(&dec!(50)));
        assert!(!book.bids.contains_key(&dec!(1)));
    }
}
