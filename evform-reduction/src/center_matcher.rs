//! Center-time coincidence matching.

use evform_core::{Cluster, Event, MatchStats, Result};

use crate::analysis::TimeAlgorithm;
use crate::matcher::{Matcher, MatcherBase};

/// Matches clusters whose representative times fall within a configured
/// delta, walking the pending queue in start-time order with at most one
/// undecided cluster held at a time.
///
/// A same-plane successor forces the held cluster out as a one-sided event;
/// an opposite-plane successor pairs with it when the representative-time
/// delta allows. The representative time comes from the configured
/// [`TimeAlgorithm`], so the precision of the pairing follows the estimator
/// choice.
#[derive(Debug)]
pub struct CenterMatcher {
    base: MatcherBase,
    max_delta_time: u64,
    time_algorithm: TimeAlgorithm,
    pending: Option<(u8, Cluster)>,
}

impl CenterMatcher {
    /// Creates a matcher for the given plane pair.
    ///
    /// # Errors
    /// Fails on a zero latency bound, colliding plane ids, or reserved ids.
    pub fn new(maximum_latency: u64, plane_a: u8, plane_b: u8) -> Result<Self> {
        Ok(Self {
            base: MatcherBase::new(maximum_latency, plane_a, plane_b)?,
            max_delta_time: 0,
            time_algorithm: TimeAlgorithm::default(),
            pending: None,
        })
    }

    /// Sets the maximum representative-time delta for a coincidence.
    #[must_use]
    pub fn with_max_delta_time(mut self, delta: u64) -> Self {
        self.max_delta_time = delta;
        self
    }

    /// Selects the representative-time estimator.
    #[must_use]
    pub fn with_time_algorithm(mut self, algorithm: TimeAlgorithm) -> Self {
        self.time_algorithm = algorithm;
        self
    }

    fn stash_one_sided(&mut self, plane: u8, mut cluster: Cluster) {
        let mut event = Event::new(self.base.plane_a, self.base.plane_b);
        self.base.merge_into(&mut event, plane, &mut cluster);
        self.base.stash_event(event);
    }

    #[allow(clippy::cast_precision_loss)]
    fn take_in(&mut self, plane: u8, mut cluster: Cluster) {
        let Some((held_plane, mut held)) = self.pending.take() else {
            self.pending = Some((plane, cluster));
            return;
        };

        if held_plane == plane {
            self.stash_one_sided(held_plane, held);
            self.pending = Some((plane, cluster));
            return;
        }

        let delta = (self.time_algorithm.cluster_time(&cluster)
            - self.time_algorithm.cluster_time(&held))
            .abs();
        if delta <= self.max_delta_time as f64 {
            let mut event = Event::new(self.base.plane_a, self.base.plane_b);
            self.base.merge_into(&mut event, held_plane, &mut held);
            self.base.merge_into(&mut event, plane, &mut cluster);
            self.base.stash_event(event);
        } else {
            self.stash_one_sided(held_plane, held);
            self.pending = Some((plane, cluster));
        }
    }
}

impl Matcher for CenterMatcher {
    fn insert(&mut self, plane: u8, clusters: Vec<Cluster>) {
        self.base.insert(plane, clusters);
    }

    fn match_events(&mut self, flush: bool) {
        self.base.sort_pending();

        loop {
            let ready = match self.base.unmatched.front() {
                Some((_, front)) => flush || self.base.ready_to_be_matched(front),
                None => false,
            };
            if !ready {
                break;
            }
            let Some((plane, cluster)) = self.base.unmatched.pop_front() else {
                break;
            };
            self.take_in(plane, cluster);
        }

        if flush {
            if let Some((plane, cluster)) = self.pending.take() {
                self.stash_one_sided(plane, cluster);
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
