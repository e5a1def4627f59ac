//! Bounded-latency chronological merge of per-module streams.

use std::collections::VecDeque;

use evform_core::{Error, Result};

use crate::analysis::EventTuple;

/// Payload carried by a merged stream item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    /// A reduced event tuple: one coordinate per plane.
    Event {
        /// Representative coordinate on plane A.
        coord_a: f64,
        /// Representative coordinate on plane B.
        coord_b: f64,
    },
    /// A zero-payload external-trigger pulse marker.
    Pulse,
}

/// One time-tagged item in the merged output stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeItem {
    /// Event or marker time in detector clock ticks.
    pub time: u64,
    /// What the item carries.
    pub payload: Payload,
}

impl MergeItem {
    /// An event item from a reduced tuple.
    #[must_use]
    pub fn event(tuple: EventTuple) -> Self {
        Self {
            time: tuple.time,
            payload: Payload::Event {
                coord_a: tuple.coord_a,
                coord_b: tuple.coord_b,
            },
        }
    }

    /// A pulse marker carrying only a timestamp.
    #[must_use]
    pub fn pulse(time: u64) -> Self {
        Self {
            time,
            payload: Payload::Pulse,
        }
    }
}

/// Merges K independently-progressing time-tagged streams into one ordered
/// stream without unbounded buffering.
///
/// Each source keeps a high-water mark of the latest time it has inserted;
/// an item may be popped once every source has moved past it by more than
/// `max_latency`. If the bound is undersized relative to inter-source clock
/// skew the output degrades to locally-sorted; that is a tunable trade-off,
/// not an error.
#[derive(Debug)]
pub struct ChronoMerger {
    max_latency: u64,
    items: VecDeque<MergeItem>,
    latest: Vec<Option<u64>>,
}

impl ChronoMerger {
    /// Creates a merger for `source_count` streams.
    ///
    /// # Errors
    /// Fails on a zero latency bound or zero sources.
    pub fn new(max_latency: u64, source_count: usize) -> Result<Self> {
        if max_latency == 0 {
            return Err(Error::ZeroLatency);
        }
        if source_count == 0 {
            return Err(Error::Config(
                "chrono merger needs at least one source".into(),
            ));
        }
        Ok(Self {
            max_latency,
            items: VecDeque::new(),
            latest: vec![None; source_count],
        })
    }

    /// Number of configured sources.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.latest.len()
    }

    /// Appends an item from a source, advancing its watermark.
    ///
    /// # Panics
    /// Panics on an out-of-range source index; routing is the caller's
    /// bookkeeping, not a data condition.
    pub fn insert(&mut self, source: usize, item: MergeItem) {
        let latest = &mut self.latest[source];
        *latest = Some(latest.map_or(item.time, |t| t.max(item.time)));
        self.items.push_back(item);
    }

    /// Stable-sorts the buffered items by time.
    pub fn sort(&mut self) {
        self.items.make_contiguous().sort_by_key(|i| i.time);
    }

    /// The time every source has provably advanced to: the minimum of the
    /// per-source watermarks, or 0 until every source has reported.
    #[must_use]
    pub fn horizon(&self) -> u64 {
        let mut horizon = u64::MAX;
        for latest in &self.latest {
            match latest {
                Some(t) => horizon = horizon.min(*t),
                None => return 0,
            }
        }
        horizon
    }

    /// Time of the frontmost buffered item.
    #[must_use]
    pub fn earliest(&self) -> Option<u64> {
        self.items.front().map(|i| i.time)
    }

    /// True when the frontmost item is safely behind every source by more
    /// than the latency bound. Call [`Self::sort`] first.
    #[must_use]
    pub fn ready(&self) -> bool {
        let Some(front) = self.items.front() else {
            return false;
        };
        let horizon = self.horizon();
        horizon > self.max_latency && horizon - self.max_latency > front.time
    }

    /// Removes and returns the frontmost item.
    pub fn pop_earliest(&mut self) -> Option<MergeItem> {
        self.items.pop_front()
    }

    /// True when no items are buffered. Watermarks are unaffected by
    /// draining; only [`Self::reset`] clears them.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of buffered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Declares that two sources share a time base (one physical module
    /// split across electronics): both watermarks jump to the later one.
    pub fn sync_up(&mut self, i: usize, j: usize) {
        let merged = match (self.latest[i], self.latest[j]) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (Some(a), None) | (None, Some(a)) => Some(a),
            (None, None) => None,
        };
        self.latest[i] = merged;
        self.latest[j] = merged;
    }

    /// Clears buffered items and watermarks, ready for a new time epoch.
    pub fn reset(&mut self) {
        self.items.clear();
        self.latest.fill(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merger() -> ChronoMerger {
        ChronoMerger::new(100, 3).unwrap()
    }

    fn item(time: u64) -> MergeItem {
        MergeItem::pulse(time)
    }

    #[test]
    fn construction_validates() {
        assert!(ChronoMerger::new(0, 3).is_err());
        assert!(ChronoMerger::new(100, 0).is_err());
        assert_eq!(merger().source_count(), 3);
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn out_of_range_source_panics() {
        let mut m = merger();
        m.insert(3, item(0));
    }

    #[test]
    fn empty_and_pop() {
        let mut m = merger();
        assert!(m.is_empty());
        m.insert(0, item(0));
        assert!(!m.is_empty());
        m.pop_earliest();
        assert!(m.is_empty());
    }

    #[test]
    fn horizon_is_min_of_watermarks() {
        let mut m = merger();
        assert_eq!(m.horizon(), 0);
        m.insert(0, item(5));
        assert_eq!(m.horizon(), 0);
        m.insert(1, item(4));
        assert_eq!(m.horizon(), 0);
        m.insert(2, item(3));
        assert_eq!(m.horizon(), 3);
        m.insert(2, item(6));
        assert_eq!(m.horizon(), 4);
        m.insert(1, item(7));
        assert_eq!(m.horizon(), 5);
        m.insert(0, item(8));
        assert_eq!(m.horizon(), 6);
    }

    #[test]
    fn sort_orders_pops() {
        let mut m = merger();
        m.insert(0, item(5));
        m.insert(1, item(4));
        m.insert(2, item(3));
        m.insert(2, item(6));
        m.insert(1, item(7));
        m.insert(0, item(8));

        // Unsorted, the front is simply the first insertion.
        assert_eq!(m.earliest(), Some(5));
        m.sort();

        let mut popped = Vec::new();
        while let Some(i) = m.pop_earliest() {
            popped.push(i.time);
        }
        assert_eq!(popped, vec![3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn ready_needs_every_source_past_the_bound() {
        let mut m = merger();
        assert!(!m.ready());
        m.insert(0, item(3));
        assert!(!m.ready());
        m.insert(1, item(4));
        assert!(!m.ready());
        m.insert(2, item(5));
        assert!(!m.ready());

        m.insert(0, item(104));
        assert!(!m.ready());
        m.insert(1, item(105));
        assert!(!m.ready());
        m.insert(2, item(106));
        assert!(m.ready());

        m.pop_earliest();
        assert!(!m.ready());

        m.insert(0, item(105));
        m.sort();
        assert!(m.ready());
        m.pop_earliest();
        assert!(!m.ready());

        m.insert(0, item(106));
        m.insert(1, item(106));
        m.sort();
        assert!(m.ready());
        m.pop_earliest();
        assert!(!m.ready());
    }

    #[test]
    fn watermarks_survive_draining() {
        let mut m = merger();
        m.insert(0, item(8));
        m.insert(1, item(7));
        m.insert(2, item(6));
        assert_eq!(m.horizon(), 6);
        while m.pop_earliest().is_some() {}
        assert!(m.is_empty());
        assert_eq!(m.horizon(), 6);
        m.reset();
        assert_eq!(m.horizon(), 0);
    }

    #[test]
    fn sync_up_joins_time_bases() {
        let mut m = merger();
        m.insert(0, item(50));
        m.insert(1, item(90));
        m.sync_up(0, 1);
        m.insert(2, item(70));
        // Source 0 is carried forward by its synced partner.
        assert_eq!(m.horizon(), 70);
    }

    #[test]
    fn sync_up_with_silent_partner() {
        let mut m = ChronoMerger::new(100, 2).unwrap();
        m.insert(0, item(40));
        assert_eq!(m.horizon(), 0);
        m.sync_up(0, 1);
        assert_eq!(m.horizon(), 40);
    }

    #[test]
    fn pops_are_nondecreasing_for_sorted_sources() {
        let mut m = ChronoMerger::new(5, 3).unwrap();
        for (source, base) in [(0u64, 0u64), (1, 2), (2, 4)] {
            for k in 0..10u64 {
                m.insert(source as usize, item(base + k * 10));
            }
        }
        m.sort();
        let mut last = 0;
        let mut count = 0;
        while m.ready() {
            let i = m.pop_earliest().unwrap();
            assert!(i.time >= last);
            last = i.time;
            count += 1;
        }
        assert!(count > 0);
        // The rest drain in order on an explicit flush.
        while let Some(i) = m.pop_earliest() {
            assert!(i.time >= last);
            last = i.time;
        }
    }
}
