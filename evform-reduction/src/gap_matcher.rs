//! Overlap/gap-based coincidence matching.

use evform_core::{Cluster, Event, MatchStats, Result};

use crate::matcher::{Matcher, MatcherBase};

/// Matches clusters whose time spans overlap or whose gap stays within a
/// configured minimum.
///
/// Pending clusters are walked in `(time_start, insertion)` order; each
/// cluster either joins the event under construction or seals it and starts
/// the next one. One-sided events fall out naturally when only a single
/// plane contributed within the gap.
#[derive(Debug)]
pub struct GapMatcher {
    base: MatcherBase,
    minimum_time_gap: u64,
}

impl GapMatcher {
    /// Creates a matcher for the given plane pair.
    ///
    /// # Errors
    /// Fails on a zero latency bound, colliding plane ids, or reserved ids.
    pub fn new(
        maximum_latency: u64,
        plane_a: u8,
        plane_b: u8,
        minimum_time_gap: u64,
    ) -> Result<Self> {
        Ok(Self {
            base: MatcherBase::new(maximum_latency, plane_a, plane_b)?,
            minimum_time_gap,
        })
    }

    fn splits(&self, event: &Event, cluster: &Cluster) -> bool {
        event.time_overlap(cluster) == 0 && event.time_gap(cluster) > self.minimum_time_gap
    }
}

impl Matcher for GapMatcher {
    fn insert(&mut self, plane: u8, clusters: Vec<Cluster>) {
        self.base.insert(plane, clusters);
    }

    fn match_events(&mut self, flush: bool) {
        self.base.sort_pending();

        let mut event = Event::new(self.base.plane_a, self.base.plane_b);
        loop {
            let ready = match self.base.unmatched.front() {
                Some((_, front)) => flush || self.base.ready_to_be_matched(front),
                None => false,
            };
            if !ready {
                break;
            }
            let Some((plane, mut cluster)) = self.base.unmatched.pop_front() else {
                break;
            };
            if !event.is_empty() && self.splits(&event, &cluster) {
                let done = std::mem::replace(
                    &mut event,
                    Event::new(self.base.plane_a, self.base.plane_b),
                );
                self.base.stash_event(done);
            }
            self.base.merge_into(&mut event, plane, &mut cluster);
        }

        if !event.is_empty() {
            if flush {
                self.base.stash_event(event);
            } else {
                self.base.requeue_event(event);
            }
        }
    }

    fn drain_events(&mut self) -> Vec<Event> {
        self.base.drain_events()
    }

    fn stats(&self) -> MatchStats {
        self.base.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evform_core::Hit;

    fn span_cluster(plane: u8, time_start: u64, time_end: u64) -> Cluster {
        let mut c = Cluster::new();
        c.insert(Hit::new(time_start, 1, 1, plane));
        c.insert(Hit::new(time_end, 2, 1, plane));
        c
    }

    #[test]
    fn overlapping_spans_match() {
        let mut m = GapMatcher::new(1000, 0, 1, 0).unwrap();
        m.insert(0, vec![span_cluster(0, 0, 10)]);
        m.insert(1, vec![span_cluster(1, 5, 12)]);
        m.match_events(true);

        let events = m.drain_events();
        assert_eq!(events.len(), 1);
        assert!(events[0].both_planes());
        assert_eq!(events[0].time_span(), 13);
        assert_eq!(m.stats().matched, 1);
    }

    #[test]
    fn gap_within_minimum_matches() {
        let mut m = GapMatcher::new(1000, 0, 1, 1).unwrap();
        m.insert(0, vec![span_cluster(0, 0, 5)]);
        m.insert(1, vec![span_cluster(1, 6, 12)]);
        m.match_events(true);

        let events = m.drain_events();
        assert_eq!(events.len(), 1);
        assert!(events[0].both_planes());
        assert_eq!(events[0].time_start(), 0);
        assert_eq!(events[0].time_end(), 12);
    }

    #[test]
    fn gap_over_minimum_splits() {
        let mut m = GapMatcher::new(1000, 0, 1, 1).unwrap();
        m.insert(0, vec![span_cluster(0, 0, 5)]);
        m.insert(1, vec![span_cluster(1, 7, 12)]);
        m.match_events(true);

        let events = m.drain_events();
        assert_eq!(events.len(), 2);
        assert!(!events[0].both_planes());
        assert!(!events[1].both_planes());
        assert_eq!(m.stats().one_sided, 2);
    }

    #[test]
    fn distant_same_plane_clusters_stay_separate() {
        let mut m = GapMatcher::new(1000, 0, 1, 10).unwrap();
        m.insert(0, vec![span_cluster(0, 0, 200), span_cluster(0, 500, 700)]);
        m.match_events(true);

        let events = m.drain_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].cluster_a.hit_count(), 2);
        assert!(events[0].cluster_b.is_empty());
        assert_eq!(events[1].cluster_a.hit_count(), 2);
    }

    #[test]
    fn latency_retains_young_clusters() {
        let mut m = GapMatcher::new(100, 0, 1, 1).unwrap();
        m.insert(0, vec![span_cluster(0, 0, 10)]);
        m.insert(1, vec![span_cluster(1, 2, 11)]);
        m.match_events(false);
        // Neither plane has advanced past the pair by the latency bound.
        assert!(m.drain_events().is_empty());

        // Both planes advance, but the trailing event is still held back:
        // nothing ready splits from it yet.
        m.insert(0, vec![span_cluster(0, 300, 310)]);
        m.insert(1, vec![span_cluster(1, 300, 312)]);
        m.match_events(false);
        assert!(m.drain_events().is_empty());

        m.insert(0, vec![span_cluster(0, 600, 610)]);
        m.insert(1, vec![span_cluster(1, 600, 612)]);
        m.match_events(false);
        let events = m.drain_events();
        assert_eq!(events.len(), 1);
        assert!(events[0].both_planes());
        assert_eq!(events[0].time_start(), 0);
        assert_eq!(events[0].time_end(), 11);

        // The rest come out on the forced flush, in time order.
        m.match_events(true);
        let events = m.drain_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].time_start(), 300);
        assert_eq!(events[1].time_start(), 600);
    }

    #[test]
    fn flush_resolves_everything() {
        let mut m = GapMatcher::new(1000, 0, 1, 0).unwrap();
        m.insert(0, vec![span_cluster(0, 0, 5)]);
        m.insert(1, vec![span_cluster(1, 100, 105)]);
        m.insert(0, vec![span_cluster(0, 101, 104)]);
        m.match_events(true);

        let events = m.drain_events();
        assert_eq!(events.len(), 2);
        let total_hits: usize = events.iter().map(Event::total_hit_count).sum();
        assert_eq!(total_hits, 6);
        assert_eq!(m.stats().events, 2);
        assert_eq!(m.stats().matched, 1);
        assert_eq!(m.stats().one_sided, 1);
    }
}
