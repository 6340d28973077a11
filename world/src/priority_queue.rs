//! Min-priority frontier used by the route search.

use std::{cmp::Reverse, collections::BinaryHeap};

use gridbots_core::GridRef;
use ordered_float::OrderedFloat;

/// Min-heap of grid locations keyed by priority.
///
/// Entries with equal priority are returned in insertion order.
#[derive(Debug, Default)]
pub(crate) struct PriorityQueue {
    items: BinaryHeap<Reverse<PrioritisedLocation>>,
    inserted: u64,
}

impl PriorityQueue {
    /// Reports whether the queue holds no locations.
    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds a location with the provided priority.
    pub(crate) fn put(&mut self, priority: f32, location: GridRef) {
        self.items.push(Reverse(PrioritisedLocation {
            priority: OrderedFloat(priority),
            sequence: self.inserted,
            location,
        }));
        self.inserted = self.inserted.wrapping_add(1);
    }

    /// Removes and returns the location with the lowest priority value.
    pub(crate) fn get(&mut self) -> Option<GridRef> {
        self.items.pop().map(|Reverse(item)| item.location)
    }
}

// Field order drives the derived ordering: priority first, then insertion order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct PrioritisedLocation {
    priority: OrderedFloat<f32>,
    sequence: u64,
    location: GridRef,
}
