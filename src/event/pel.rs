//! Per-particle event list: a small array-backed binary min-heap of event
//! descriptors.
//!
//! Each particle enrolled in the sorter owns one of these lists, holding the
//! handful of candidate events predicted for it (its pair interactions with
//! current neighbours, wall events and its cell-boundary crossing). The list
//! is a hand-rolled heap rather than `std::collections::BinaryHeap` because
//! the sorters need order-preserving bulk time shifts and rescales over the
//! stored descriptors, which the standard heap cannot expose safely.

use super::{Event, EventKind};

/// Initial slot count; lists rarely outgrow the cell neighbourhood size.
const INLINE_CAPACITY: usize = 8;

/// A min-heap of predicted events for one particle.
///
/// The earliest event is always at the top. An empty list reports
/// [`Event::never`] as its top, so consumers never need an `Option` in the
/// hot path. Descriptors of kind `None` are refused at `push`, which keeps
/// the invariant that the top of a non-empty list is always a real
/// candidate.
///
/// # Examples
/// ```
/// # use edmd_lib::event::{Event, EventKind, EventPartner, EventList};
/// let mut pel = EventList::new();
/// pel.push(Event::new(2.0, EventKind::CellBoundary, 0, EventPartner::Object(3)));
/// pel.push(Event::new(1.0, EventKind::PairInteraction, 5, EventPartner::Particle(7)));
/// assert_eq!(pel.top().time, 1.0);
/// pel.pop();
/// assert_eq!(pel.top().time, 2.0);
/// ```
#[derive(Debug, Clone)]
pub struct EventList {
    heap: Vec<Event>,
}

impl Default for EventList {
    fn default() -> Self {
        EventList::new()
    }
}

impl EventList {
    /// Creates an empty list with the inline capacity pre-allocated.
    pub fn new() -> Self {
        EventList {
            heap: Vec::with_capacity(INLINE_CAPACITY),
        }
    }

    /// Number of pending descriptors.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// True when no descriptors are pending.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Adds a descriptor, keeping heap order. Descriptors of kind `None`
    /// are silently ignored.
    pub fn push(&mut self, event: Event) {
        if event.kind == EventKind::None {
            return;
        }
        self.heap.push(event);
        self.sift_up(self.heap.len() - 1);
    }

    /// The earliest pending descriptor, or [`Event::never`] when empty.
    #[inline]
    pub fn top(&self) -> Event {
        self.heap.first().copied().unwrap_or_else(Event::never)
    }

    /// Removes and returns the earliest descriptor.
    pub fn pop(&mut self) -> Option<Event> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let top = self.heap.pop();
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        top
    }

    /// Drops every pending descriptor.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Adds `delta` to every stored time.
    ///
    /// A uniform shift preserves the heap order, so the structure stays
    /// valid without re-sorting. The sorters use this to fold their rolling
    /// time accumulators into the stored descriptors.
    pub fn shift_times(&mut self, delta: f64) {
        for event in &mut self.heap {
            event.time += delta;
        }
    }

    /// Multiplies every stored time by `factor`.
    ///
    /// Callers only rescale by positive factors (temperature swaps), which
    /// preserves heap order.
    pub fn rescale_times(&mut self, factor: f64) {
        for event in &mut self.heap {
            event.time *= factor;
        }
    }

    /// Iterates the pending descriptors in arbitrary (heap) order.
    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.heap.iter()
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.heap[idx] < self.heap[parent] {
                self.heap.swap(idx, parent);
                idx = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * idx + 1;
            let right = left + 1;
            let mut smallest = idx;
            if left < len && self.heap[left] < self.heap[smallest] {
                smallest = left;
            }
            if right < len && self.heap[right] < self.heap[smallest] {
                smallest = right;
            }
            if smallest == idx {
                break;
            }
            self.heap.swap(idx, smallest);
            idx = smallest;
        }
    }
}
