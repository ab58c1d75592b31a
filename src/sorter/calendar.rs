//! Bounded calendar queue sorter.
//!
//! Pending events are filed into `n_lists` time buckets covering a moving
//! window of width `n_lists / scale`, plus one overflow list for everything
//! beyond the window. Only the *current* bucket is kept ordered, by a small
//! tournament tree; the rest are unordered intrusive doubly-linked lists.
//! When the current bucket drains, the cursor advances; when it wraps past
//! the last bucket, every stored time is shifted down by the window width
//! and the overflow list is refiled.
//!
//! With a bucket scale near the event density almost every operation touches
//! one short list, giving `O(1)` amortised updates. Events landing outside
//! the window ("exceptions") are counted and serviced on the next wrap;
//! they cost extra work but never break ordering.

use crate::error::SimulationError;
use crate::event::{Event, EventList};
use crate::particle::ParticleId;
use log::{info, warn};

/// One slot of the calendar: a particle's event list plus its intrusive
/// links inside whichever bucket currently holds it.
#[derive(Debug, Default, Clone)]
struct QueueEntry {
    /// Previous entry in the same bucket, if any.
    prev: Option<usize>,
    /// Next entry in the same bucket, if any.
    next: Option<usize>,
    /// The particle's pending events.
    events: EventList,
    /// Index of the bucket this entry is filed under (`n_lists` means the
    /// overflow list; the current bucket means the tree).
    bucket: usize,
}

/// Calendar-queue implementation of the global event sorter.
#[derive(Debug, Default)]
pub struct CalendarQueue {
    /// Entry `i` belongs to particle `i - 1`; entry 0 is a permanently
    /// empty sentinel the tree falls back to when it drains.
    entries: Vec<QueueEntry>,
    /// Bucket heads; the final slot is the overflow list.
    buckets: Vec<Option<usize>>,
    /// Cursor: which bucket the tree currently mirrors.
    current: usize,
    /// Buckets per unit stored time.
    scale: f64,
    /// Window width covered by the buckets, `n_lists / scale`.
    list_width: f64,
    /// Bucket count (excluding the overflow slot).
    n_lists: usize,
    /// Rolling clock accumulator: stored times = true times + `pec_time`.
    pec_time: f64,
    /// Winner array of the tree over the current bucket.
    cbt: Vec<usize>,
    /// Back-pointers into `cbt`.
    leaf: Vec<usize>,
    /// Entries currently in the tree.
    np: usize,
    /// Particle count.
    n: usize,
    /// Out-of-window events serviced so far.
    exceptions: u64,
    /// Configured bucket-count override; skips the auto-tune when set.
    forced_lists: Option<usize>,
    /// Buckets exist and entries are filed; `update` is a no-op before.
    ready: bool,
}

impl CalendarQueue {
    /// Creates an empty queue. `forced_lists` pins the bucket count instead
    /// of auto-tuning it at `init`.
    pub fn new(forced_lists: Option<usize>) -> Self {
        CalendarQueue {
            forced_lists,
            ..CalendarQueue::default()
        }
    }

    /// Discards all state and sizes the queue for `n` particles.
    pub fn resize(&mut self, n: usize) {
        self.clear();
        self.n = n;
        self.entries = vec![QueueEntry::default(); n + 1];
        self.cbt = vec![0; (2 * (n + 1)).max(2)];
        self.leaf = vec![0; n + 2];
    }

    /// Empties the queue completely.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.buckets.clear();
        self.cbt.clear();
        self.leaf.clear();
        self.n = 0;
        self.np = 0;
        self.current = 0;
        self.pec_time = 0.0;
        self.ready = false;
    }

    /// Instruments the pending event distribution to choose the bucket
    /// scale, then files every entry and orders the first bucket.
    ///
    /// The scale is the inverse mean gap between consecutive finite event
    /// times; the bucket count covers twice the latest pending event. When
    /// fewer than two finite events exist the queue cannot be instrumented
    /// and falls back to `scale = 10`, `n_lists = 1000`.
    pub fn init(&mut self) -> Result<(), SimulationError> {
        let mut tops: Vec<f64> = self
            .entries
            .iter()
            .skip(1)
            .map(|entry| entry.events.top().time)
            .collect();
        tops.sort_by(f64::total_cmp);

        let mut acc = 0.0;
        let mut gaps = 0usize;
        for pair in tops.windows(2) {
            if pair[1].is_finite() {
                acc += pair[1] - pair[0];
                gaps += 1;
            } else {
                break;
            }
        }

        let scale = gaps as f64 / acc;
        if gaps < 2 || !scale.is_finite() || scale <= 0.0 {
            // Too few finite events, or all at one instant: the queue
            // cannot be instrumented. Fall back to a window that hopes
            // event times stay under t = 100
            warn!(
                "calendar queue cannot be instrumented ({} usable gaps); \
                 falling back to scale = 10, lists = 1000",
                gaps
            );
            self.setup(10.0, 1000)
        } else {
            let latest = tops
                .iter()
                .rev()
                .find(|t| t.is_finite())
                .copied()
                .unwrap_or(0.0);
            let n_lists = self
                .forced_lists
                .unwrap_or((2.0 * latest * scale) as usize);
            self.setup(scale, n_lists)
        }
    }

    /// Advances the sorter clock in `O(1)`.
    pub fn stream(&mut self, dt: f64) {
        self.pec_time += dt;
    }

    /// Files an event (time relative to now) into particle `p`'s list.
    pub fn push(&mut self, mut event: Event, p: ParticleId) {
        debug_assert!(!event.time.is_nan(), "NaN event time pushed into sorter");
        if event.is_never() {
            return;
        }
        event.time += self.pec_time;
        self.entries[p + 1].events.push(event);
    }

    /// Refiles particle `p` after its list top changed.
    pub fn update(&mut self, p: ParticleId) {
        if !self.ready {
            return;
        }
        self.unfile(p + 1);
        self.file(p + 1);
        // Refiling can drain the current-bucket tree (the entry moved to a
        // later bucket); the cursor must advance or the queue reports empty
        if self.np == 0 {
            self.order_next_event();
        }
    }

    /// Drops all pending events for particle `p`.
    pub fn clear_pel(&mut self, p: ParticleId) {
        self.entries[p + 1].events.clear();
    }

    /// True when particle `p` has no pending events.
    pub fn pel_is_empty(&self, p: ParticleId) -> bool {
        self.entries[p + 1].events.is_empty()
    }

    /// The particle owning the earliest event.
    pub fn next_id(&self) -> ParticleId {
        self.cbt[1].saturating_sub(1)
    }

    /// The earliest event, time relative to now.
    pub fn next_event(&self) -> Event {
        let winner = self.cbt[1];
        if winner == 0 {
            return Event::never();
        }
        let mut event = self.entries[winner].events.top();
        event.time -= self.pec_time;
        event
    }

    /// Pops the winning list's top, refiles the entry and restores the
    /// first-bucket ordering.
    pub fn pop_next(&mut self) -> Event {
        let winner = self.cbt[1];
        if winner == 0 {
            return Event::never();
        }
        let mut event = self.entries[winner].events.pop().unwrap_or_else(Event::never);
        event.time -= self.pec_time;
        self.unfile(winner);
        self.file(winner);
        self.order_next_event();
        event
    }

    /// Multiplies every stored time and the accumulator by `factor`.
    ///
    /// The bucket scale compensates so that already-filed entries keep a
    /// consistent window; entries are not refiled eagerly, mismatches are
    /// absorbed as exceptions at the next wrap.
    pub fn rescale_times(&mut self, factor: f64) {
        for entry in &mut self.entries {
            entry.events.rescale_times(factor);
        }
        self.pec_time *= factor;
        self.scale /= factor;
        self.list_width = self.n_lists as f64 / self.scale;
    }

    /// Out-of-window events serviced so far.
    pub fn exception_count(&self) -> u64 {
        self.exceptions
    }

    /// Bucket count chosen at `init`.
    pub fn n_lists(&self) -> usize {
        self.n_lists
    }

    /// Bucket scale chosen at `init`.
    pub fn scale_factor(&self) -> f64 {
        self.scale
    }

    fn setup(&mut self, scale: f64, mut n_lists: usize) -> Result<(), SimulationError> {
        if !scale.is_finite() {
            return Err(SimulationError::InvalidQueueScale {
                detail: "scale is infinite (only zero-time or no collisions?)".into(),
            });
        }
        if scale <= 0.0 {
            return Err(SimulationError::InvalidQueueScale {
                detail: format!("scale is not positive: {scale}"),
            });
        }
        if n_lists == 0 {
            warn!("calendar queue sized zero lists; forcing 1000");
            n_lists = 1000;
        }

        self.scale = scale;
        self.n_lists = n_lists;
        self.list_width = n_lists as f64 / scale;
        self.buckets = vec![None; n_lists + 1];
        self.current = 0;
        self.ready = true;

        info!(
            "calendar queue: {} lists, scale {:.6}, window {:.6}",
            self.n_lists, self.scale, self.list_width
        );

        // File every entry, then order the first bucket
        for e in 1..=self.n {
            self.file(e);
        }
        self.order_next_event();
        Ok(())
    }

    /// Files entry `e` into the bucket matching its earliest stored time.
    ///
    /// Times before the current bucket are clamped onto it (this is what
    /// makes slightly-negative times safe), and times past the window land
    /// in the overflow list.
    fn file(&mut self, e: usize) {
        let stored = self.entries[e].events.top().time;
        let boxes = self.scale * stored;

        let idx = if !(boxes < i64::MAX as f64) {
            // Infinite or absurdly distant: straight to the overflow list
            self.n_lists
        } else {
            let mut i = boxes as i64;
            if i < self.current as i64 {
                i = self.current as i64;
            }
            if i > self.n_lists as i64 - 1 {
                // Account for wrap
                i -= self.n_lists as i64;
                if i >= self.current as i64 - 1 {
                    // Overflowed past the window
                    i = self.n_lists as i64;
                }
            }
            i as usize
        };

        self.entries[e].bucket = idx;

        if idx == self.current {
            self.tree_insert(e);
        } else {
            // Push onto the front of the bucket's linked list
            let old_head = self.buckets[idx];
            self.entries[e].prev = None;
            self.entries[e].next = old_head;
            self.buckets[idx] = Some(e);
            if let Some(head) = old_head {
                self.entries[head].prev = Some(e);
            }
        }
    }

    /// Removes entry `e` from wherever it is filed.
    fn unfile(&mut self, e: usize) {
        if self.entries[e].bucket == self.current {
            self.tree_delete(e);
        } else {
            let bucket = self.entries[e].bucket;
            let prev = self.entries[e].prev;
            let next = self.entries[e].next;
            match prev {
                None => self.buckets[bucket] = next,
                Some(p) => self.entries[p].next = next,
            }
            if let Some(nx) = next {
                self.entries[nx].prev = prev;
            }
        }
    }

    /// Refiles everything in the overflow list; called once per wrap, after
    /// the stored times have been shifted down by the window width.
    fn process_overflow(&mut self) {
        let mut e = self.buckets[self.n_lists].take();
        while let Some(id) = e {
            self.exceptions += 1;
            let next = self.entries[id].next;
            self.file(id);
            e = next;
        }
    }

    /// Advances the cursor until the tree holds at least one entry, wrapping
    /// (and streaming the whole queue down a window) as needed.
    fn order_next_event(&mut self) {
        while self.np == 0 {
            self.current += 1;
            if self.current == self.n_lists {
                // Wrapped all the way around: shift every stored time down
                // by the window width and service the overflow list
                self.current = 0;

                for entry in &mut self.entries {
                    entry.events.shift_times(-self.list_width);
                }
                self.pec_time -= self.list_width;

                self.process_overflow();

                // If a full wrap found no finite event anywhere, stop: the
                // sentinel stays on top and the scheduler reports exhaustion
                if self.np == 0
                    && self.buckets[..self.n_lists].iter().all(Option::is_none)
                    && !self
                        .entries
                        .iter()
                        .any(|entry| entry.events.top().time.is_finite())
                {
                    return;
                }
            }

            // Drain the new current bucket into the tree
            let mut e = self.buckets[self.current].take();
            while let Some(id) = e {
                let next = self.entries[id].next;
                self.tree_insert(id);
                e = next;
            }
        }
    }

    /// Match rule: earliest stored top wins, ties broken by entry index.
    #[inline]
    fn beats(&self, a: usize, b: usize) -> bool {
        let ta = self.entries[a].events.top();
        let tb = self.entries[b].events.top();
        (ta, a) < (tb, b)
    }

    fn tree_update(&mut self, i: usize) {
        let mut f = self.leaf[i] / 2;

        while f > 0 {
            if self.cbt[f] != i {
                break;
            }
            let l = self.cbt[2 * f];
            let r = self.cbt[2 * f + 1];
            self.cbt[f] = if self.beats(l, r) { l } else { r };
            f /= 2;
        }
        while f > 0 {
            let w = self.cbt[f];
            let l = self.cbt[2 * f];
            let r = self.cbt[2 * f + 1];
            self.cbt[f] = if self.beats(l, r) { l } else { r };
            if self.cbt[f] == w {
                return;
            }
            f /= 2;
        }
    }

    fn tree_insert(&mut self, i: usize) {
        if self.np == 0 {
            self.cbt[1] = i;
            self.leaf[i] = 1;
            self.np = 1;
            return;
        }
        let j = self.cbt[self.np];
        self.cbt[self.np * 2] = j;
        self.cbt[self.np * 2 + 1] = i;
        self.leaf[j] = self.np * 2;
        self.leaf[i] = self.np * 2 + 1;
        self.np += 1;
        self.tree_update(j);
    }

    fn tree_delete(&mut self, i: usize) {
        if self.np < 2 {
            // Tree drains: fall back to the sentinel entry
            self.cbt[1] = 0;
            self.leaf[0] = 1;
            self.np = self.np.saturating_sub(1);
            return;
        }

        let l = self.np * 2 - 1;

        if self.cbt[l - 1] == i {
            self.leaf[self.cbt[l]] = l / 2;
            self.cbt[l / 2] = self.cbt[l];
            let moved = self.cbt[l / 2];
            self.tree_update(moved);
            self.np -= 1;
            return;
        }

        self.leaf[self.cbt[l - 1]] = l / 2;
        self.cbt[l / 2] = self.cbt[l - 1];
        let moved = self.cbt[l / 2];
        self.tree_update(moved);

        if self.cbt[l] != i {
            self.cbt[self.leaf[i]] = self.cbt[l];
            self.leaf[self.cbt[l]] = self.leaf[i];
            let relocated = self.cbt[l];
            self.tree_update(relocated);
        }

        self.np -= 1;
    }
}
