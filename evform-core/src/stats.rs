//! Snapshot-style counters.
//!
//! Every stage exposes a plain `Copy` snapshot of its cumulative counters so
//! observers can poll and diff without reaching into component internals.
//! All counters are monotonic for the lifetime of their component; per-item
//! problems only ever increment a counter, they never stop the stream.

/// Counters for a clustering stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterStats {
    /// Cumulative number of sealed clusters.
    pub clusters: u64,
}

impl ClusterStats {
    /// Adds another snapshot into this one.
    pub fn accumulate(&mut self, other: ClusterStats) {
        self.clusters += other.clusters;
    }
}

/// Counters for a coincidence matcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    /// Cumulative events produced (matched and one-sided).
    pub events: u64,
    /// Events with clusters on both planes.
    pub matched: u64,
    /// Events forwarded with only one plane populated.
    pub one_sided: u64,
    /// Clusters rejected at insertion for not belonging to either plane.
    pub rejected_clusters: u64,
}

impl MatchStats {
    /// Adds another snapshot into this one.
    pub fn accumulate(&mut self, other: MatchStats) {
        self.events += other.events;
        self.matched += other.matched;
        self.one_sided += other.one_sided;
        self.rejected_clusters += other.rejected_clusters;
    }
}

/// Counters for a module pipeline, split by rejection reason so data-quality
/// degradation is visible as distinct signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Hits accepted into a clusterer.
    pub hits: u64,
    /// Hits dropped for carrying the invalid-plane marker.
    pub invalid_plane: u64,
    /// Backwards time steps that forced a full flush.
    pub time_seq_errors: u64,
    /// Events rejected for exceeding a per-plane multiplicity limit.
    pub multiplicity_rejects: u64,
    /// Events dropped for lacking a coincident second plane.
    pub one_sided: u64,
    /// Event tuples forwarded downstream.
    pub events_out: u64,
}

impl PipelineStats {
    /// Adds another snapshot into this one.
    pub fn accumulate(&mut self, other: PipelineStats) {
        self.hits += other.hits;
        self.invalid_plane += other.invalid_plane;
        self.time_seq_errors += other.time_seq_errors;
        self.multiplicity_rejects += other.multiplicity_rejects;
        self.one_sided += other.one_sided;
        self.events_out += other.events_out;
    }
}

/// Counters for the ring transport shared between the input and processing
/// tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Packets handed to the transport by the producer.
    pub produced: u64,
    /// Packets dropped because no buffer was free (consumer lagging).
    pub dropped: u64,
    /// Packets taken by the consumer.
    pub consumed: u64,
}
