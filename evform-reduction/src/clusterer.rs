//! Gap clustering of a time-ordered hit stream.

use evform_core::{Cluster, ClusterStats, Hit};
use serde::{Deserialize, Serialize};

/// Gap thresholds for one clusterer.
///
/// Zero is a legal value for either gap: a zero time gap splits on every
/// distinct timestamp, a zero coordinate gap on every non-adjacent channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GapClustererConfig {
    /// Maximum time distance from the open cluster's latest hit.
    pub max_time_gap: u64,
    /// Maximum coordinate distance from the open cluster's span.
    pub max_coord_gap: u16,
}

impl Default for GapClustererConfig {
    fn default() -> Self {
        Self {
            max_time_gap: 200,
            max_coord_gap: 2,
        }
    }
}

impl GapClustererConfig {
    /// Creates a configuration with default thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum time gap.
    #[must_use]
    pub fn with_max_time_gap(mut self, gap: u64) -> Self {
        self.max_time_gap = gap;
        self
    }

    /// Sets the maximum coordinate gap.
    #[must_use]
    pub fn with_max_coord_gap(mut self, gap: u16) -> Self {
        self.max_coord_gap = gap;
        self
    }
}

/// Groups a time-sorted single-plane hit stream into clusters, splitting on
/// configurable time and coordinate gaps.
///
/// Hits are assumed already sorted by time; this is a documented
/// precondition, not enforced here. An out-of-order hit degrades cluster
/// quality (it joins or splits based on a saturated gap of zero) but never
/// corrupts state.
#[derive(Debug, Default)]
pub struct GapClusterer {
    config: GapClustererConfig,
    current: Cluster,
    sealed: Vec<Cluster>,
    stats: ClusterStats,
}

impl GapClusterer {
    /// Creates a clusterer with the given thresholds.
    #[must_use]
    pub fn new(config: GapClustererConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Inserts one hit, sealing the open cluster first if the hit falls
    /// outside both gap thresholds.
    pub fn insert(&mut self, hit: Hit) {
        if !self.current.is_empty() && !self.accepts(&hit) {
            self.seal();
        }
        self.current.insert(hit);
    }

    /// Inserts a batch of time-sorted hits.
    pub fn cluster(&mut self, hits: &[Hit]) {
        for &hit in hits {
            self.insert(hit);
        }
    }

    /// Seals the open cluster, if any. Calling twice without an intervening
    /// insert produces nothing the second time.
    pub fn flush(&mut self) {
        if !self.current.is_empty() {
            self.seal();
        }
    }

    /// Takes ownership of every sealed cluster, leaving the clusterer ready
    /// for the next batch.
    #[must_use]
    pub fn drain(&mut self) -> Vec<Cluster> {
        std::mem::take(&mut self.sealed)
    }

    /// Number of sealed clusters waiting to be drained.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.sealed.len()
    }

    /// Cumulative counter snapshot.
    #[must_use]
    pub fn stats(&self) -> ClusterStats {
        self.stats
    }

    /// Current thresholds.
    #[must_use]
    pub fn config(&self) -> GapClustererConfig {
        self.config
    }

    fn accepts(&self, hit: &Hit) -> bool {
        if hit.time.saturating_sub(self.current.time_end()) > self.config.max_time_gap {
            return false;
        }
        let below = self.current.coord_start().saturating_sub(hit.coordinate);
        let above = hit.coordinate.saturating_sub(self.current.coord_end());
        below.max(above) <= self.config.max_coord_gap
    }

    fn seal(&mut self) {
        self.stats.clusters += 1;
        self.sealed.push(std::mem::take(&mut self.current));
    }
}
