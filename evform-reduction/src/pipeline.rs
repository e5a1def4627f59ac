//! Per-module event formation: clusterers, matcher and event filters.

use evform_core::{Event, Hit, MatchStats, PipelineStats};

use crate::analysis::{reduce_event, EventTuple, TimeAlgorithm};
use crate::center_matcher::CenterMatcher;
use crate::clusterer::GapClusterer;
use crate::config::{MatcherConfig, ModuleConfig};
use crate::error::Result;
use crate::gap_matcher::GapMatcher;
use crate::matcher::Matcher;

/// Event formation for one physical module: one gap clusterer per plane,
/// one coincidence matcher, and the post-match filters.
///
/// Hits must arrive in non-decreasing time order per module; a backwards
/// time step is treated as a timing discontinuity (clock reset or stale
/// data from a previous run) and forces a full flush before the offending
/// hit is ingested, so in-flight clusters are never mixed across epochs.
pub struct ModulePipeline {
    plane_a: u8,
    plane_b: u8,
    clusterer_a: GapClusterer,
    clusterer_b: GapClusterer,
    matcher: Box<dyn Matcher>,
    time_algorithm: TimeAlgorithm,
    multiplicity_limit_a: Option<usize>,
    multiplicity_limit_b: Option<usize>,
    previous_time: Option<u64>,
    out_queue: Vec<EventTuple>,
    stats: PipelineStats,
}

impl ModulePipeline {
    /// Builds a pipeline for the plane pair from its configuration.
    ///
    /// # Errors
    /// Propagates matcher construction failures (zero latency, bad planes).
    pub fn new(
        plane_a: u8,
        plane_b: u8,
        module: &ModuleConfig,
        matcher: MatcherConfig,
        maximum_latency: u64,
        time_algorithm: TimeAlgorithm,
    ) -> Result<Self> {
        let matcher: Box<dyn Matcher> = match matcher {
            MatcherConfig::Gap { minimum_time_gap } => Box::new(GapMatcher::new(
                maximum_latency,
                plane_a,
                plane_b,
                minimum_time_gap,
            )?),
            MatcherConfig::Center { max_delta_time } => Box::new(
                CenterMatcher::new(maximum_latency, plane_a, plane_b)?
                    .with_max_delta_time(max_delta_time)
                    .with_time_algorithm(time_algorithm),
            ),
        };
        Ok(Self {
            plane_a,
            plane_b,
            clusterer_a: GapClusterer::new(module.clusterer_a),
            clusterer_b: GapClusterer::new(module.clusterer_b),
            matcher,
            time_algorithm,
            multiplicity_limit_a: module.multiplicity_limit_a,
            multiplicity_limit_b: module.multiplicity_limit_b,
            previous_time: None,
            out_queue: Vec::new(),
            stats: PipelineStats::default(),
        })
    }

    /// The plane pair this pipeline reads.
    #[must_use]
    pub fn planes(&self) -> (u8, u8) {
        (self.plane_a, self.plane_b)
    }

    /// Routes one hit into the clusterer for its plane.
    ///
    /// Invalid-plane hits (and hits for planes this module does not own)
    /// are counted and dropped. A hit older than its predecessor forces a
    /// full flush first.
    pub fn ingest(&mut self, hit: Hit) {
        if hit.plane != self.plane_a && hit.plane != self.plane_b {
            self.stats.invalid_plane += 1;
            return;
        }

        if let Some(previous) = self.previous_time {
            if hit.time < previous {
                self.stats.time_seq_errors += 1;
                log::debug!(
                    "time sequence error on planes ({}, {}): {} < {}, flushing",
                    self.plane_a,
                    self.plane_b,
                    hit.time,
                    previous
                );
                self.process_events(true);
            }
        }
        self.previous_time = Some(hit.time);
        self.stats.hits += 1;

        if hit.plane == self.plane_a {
            self.clusterer_a.insert(hit);
        } else {
            self.clusterer_b.insert(hit);
        }
    }

    /// Drives clustering and matching, then filters and reduces the
    /// produced events onto the output queue.
    ///
    /// With `flush` set, open clusters are sealed and the matcher resolves
    /// everything pending.
    pub fn process_events(&mut self, flush: bool) {
        if flush {
            self.clusterer_a.flush();
            self.clusterer_b.flush();
        }
        self.matcher.insert(self.plane_a, self.clusterer_a.drain());
        self.matcher.insert(self.plane_b, self.clusterer_b.drain());
        self.matcher.match_events(flush);

        for event in self.matcher.drain_events() {
            if !event.both_planes() {
                self.stats.one_sided += 1;
                continue;
            }
            if !self.within_multiplicity(&event) {
                self.stats.multiplicity_rejects += 1;
                continue;
            }
            self.out_queue.push(reduce_event(&event, self.time_algorithm));
            self.stats.events_out += 1;
        }
    }

    /// Takes ownership of the reduced event tuples.
    #[must_use]
    pub fn drain(&mut self) -> Vec<EventTuple> {
        std::mem::take(&mut self.out_queue)
    }

    /// Cumulative pipeline counters.
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Cumulative matcher counters.
    #[must_use]
    pub fn match_stats(&self) -> MatchStats {
        self.matcher.stats()
    }

    /// Cumulative sealed-cluster counts per plane.
    #[must_use]
    pub fn cluster_counts(&self) -> (u64, u64) {
        (
            self.clusterer_a.stats().clusters,
            self.clusterer_b.stats().clusters,
        )
    }

    fn within_multiplicity(&self, event: &Event) -> bool {
        let ok_a = self
            .multiplicity_limit_a
            .is_none_or(|limit| event.cluster_a.hit_count() <= limit);
        let ok_b = self
            .multiplicity_limit_b
            .is_none_or(|limit| event.cluster_b.hit_count() <= limit);
        ok_a && ok_b
    }
}
