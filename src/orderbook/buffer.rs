//! Event Buffer.
//!
//! A bounded FIFO of parsed diff events, holding incoming diffs while a
//! snapshot fetch is in flight.

use std::collections::VecDeque;

use crate::orderbook::sync::DiffEvent;

/// Default maximum number of buffered diff events.
pub const MAX_BUFFER_SIZE: usize = 1000;

/// Bounded FIFO queue of diff events awaiting a snapshot.
///
/// On overflow the *oldest* entry is dropped (head-drop), not the
/// newest: a slow snapshot fetch under a producer burst should not cost
/// us the most recent, most valuable updates.
pub struct EventBuffer {
    events: VecDeque<DiffEvent>,
    capacity: usize,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Pushes an event, evicting the head if already at capacity.
    pub fn push(&mut self, event: DiffEvent) {
        if self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn pop_front(&mut self) -> Option<DiffEvent> {
        self.events.pop_front()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new(MAX_BUFFER_SIZE)
    }
}
