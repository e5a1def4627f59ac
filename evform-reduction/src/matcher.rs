//! Coincidence-matcher interface and shared queueing behavior.

use std::collections::VecDeque;

use evform_core::{Cluster, Error, Event, Hit, MatchStats, Result};

/// Pairs sealed clusters from two planes into events.
///
/// Implementations must resolve every pending cluster on a flushing match,
/// into either a coincidence or a one-sided event, and may retain clusters
/// younger than the latency bound otherwise. Multiplicity filtering is a
/// pipeline policy, not a matcher concern: matchers pass everything through
/// so rejection stays measurable.
pub trait Matcher: Send {
    /// Queues sealed clusters arriving on `plane`. Clusters from planes the
    /// matcher was not configured for are counted and dropped.
    fn insert(&mut self, plane: u8, clusters: Vec<Cluster>);

    /// Pairs queued clusters. With `flush` set, every pending cluster is
    /// resolved regardless of the latency bound.
    fn match_events(&mut self, flush: bool);

    /// Takes ownership of the produced events.
    fn drain_events(&mut self) -> Vec<Event>;

    /// Cumulative counter snapshot.
    fn stats(&self) -> MatchStats;
}

/// Shared state for matcher implementations: the pending-cluster queue,
/// per-plane arrival watermarks and the latency gate.
#[derive(Debug)]
pub(crate) struct MatcherBase {
    pub maximum_latency: u64,
    pub plane_a: u8,
    pub plane_b: u8,
    /// Pending clusters with the plane they arrived on, insertion order.
    pub unmatched: VecDeque<(u8, Cluster)>,
    pub latest_a: u64,
    pub latest_b: u64,
    pub matched_events: Vec<Event>,
    pub stats: MatchStats,
}

impl MatcherBase {
    /// Validates the plane pair and latency bound.
    pub fn new(maximum_latency: u64, plane_a: u8, plane_b: u8) -> Result<Self> {
        if maximum_latency == 0 {
            return Err(Error::ZeroLatency);
        }
        if plane_a == plane_b || plane_a >= Hit::PULSE_PLANE || plane_b >= Hit::PULSE_PLANE {
            return Err(Error::InvalidPlanePair {
                a: plane_a,
                b: plane_b,
            });
        }
        Ok(Self {
            maximum_latency,
            plane_a,
            plane_b,
            unmatched: VecDeque::new(),
            latest_a: 0,
            latest_b: 0,
            matched_events: Vec::new(),
            stats: MatchStats::default(),
        })
    }

    /// Queues clusters, advancing the plane's arrival watermark. Empty
    /// clusters are skipped; foreign planes are counted and dropped.
    pub fn insert(&mut self, plane: u8, clusters: Vec<Cluster>) {
        for cluster in clusters {
            if cluster.is_empty() {
                continue;
            }
            if plane == self.plane_a {
                self.latest_a = self.latest_a.max(cluster.time_start());
            } else if plane == self.plane_b {
                self.latest_b = self.latest_b.max(cluster.time_start());
            } else {
                self.stats.rejected_clusters += 1;
                continue;
            }
            self.unmatched.push_back((plane, cluster));
        }
    }

    /// A cluster may be matched once both planes have advanced past it by
    /// more than the latency bound; the slower plane gates the decision.
    pub fn ready_to_be_matched(&self, cluster: &Cluster) -> bool {
        let latest = self.latest_a.min(self.latest_b);
        latest > self.maximum_latency && cluster.time_end() < latest - self.maximum_latency
    }

    /// Stable-sorts the pending queue by cluster start time.
    pub fn sort_pending(&mut self) {
        self.unmatched
            .make_contiguous()
            .sort_by_key(|(_, c)| c.time_start());
    }

    /// Moves an event into the output, updating the counters.
    pub fn stash_event(&mut self, event: Event) {
        self.stats.events += 1;
        if event.both_planes() {
            self.stats.matched += 1;
        } else {
            self.stats.one_sided += 1;
        }
        self.matched_events.push(event);
    }

    /// Puts an unfinished event's clusters back onto the pending queue for a
    /// later matching round.
    pub fn requeue_event(&mut self, mut event: Event) {
        if !event.cluster_b.is_empty() {
            let plane = event.plane_b();
            self.unmatched
                .push_front((plane, std::mem::take(&mut event.cluster_b)));
        }
        if !event.cluster_a.is_empty() {
            let plane = event.plane_a();
            self.unmatched
                .push_front((plane, std::mem::take(&mut event.cluster_a)));
        }
    }

    /// Merges a cluster into the event slot for its declared plane.
    pub fn merge_into(&self, event: &mut Event, plane: u8, cluster: &mut Cluster) {
        if plane == self.plane_a {
            event.cluster_a.merge(cluster);
        } else {
            event.cluster_b.merge(cluster);
        }
    }

    /// Takes the produced events.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.matched_events)
    }
}
