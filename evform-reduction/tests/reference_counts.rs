//! Regression counts for a reference readout batch.
//!
//! A deterministic 144-hit single-plane batch, clustered at the documented
//! reference thresholds, must always produce the same cluster census: 22
//! clusters, of which 20 carry at least 3 hits. The same batch mirrored
//! onto a second plane must form one coincidence per cluster group.

use evform_core::Hit;
use evform_reduction::{
    GapClusterer, GapClustererConfig, GapMatcher, Matcher, MatcherConfig, ModuleConfig,
    ModulePipeline, TimeAlgorithm,
};

const MAX_TIME_GAP: u64 = 5;
const MAX_COORD_GAP: u16 = 2;
const MIN_CLUSTER_SIZE: usize = 3;

/// Group sizes of the reference batch: 20 groups of 7 hits and 2 stragglers
/// of 2 hits, 144 readouts in total.
fn group_sizes() -> Vec<usize> {
    (0..22).map(|g| if g == 3 || g == 17 { 2 } else { 7 }).collect()
}

fn reference_batch(plane: u8, coord_base: u16) -> Vec<Hit> {
    let mut hits = Vec::new();
    for (g, size) in group_sizes().into_iter().enumerate() {
        let base = 1000 * g as u64;
        for i in 0..size {
            hits.push(Hit::new(
                base + i as u64,
                coord_base + (i % 3) as u16,
                1 + (i % 4) as u16,
                plane,
            ));
        }
    }
    hits
}

fn reference_clusterer() -> GapClusterer {
    GapClusterer::new(
        GapClustererConfig::new()
            .with_max_time_gap(MAX_TIME_GAP)
            .with_max_coord_gap(MAX_COORD_GAP),
    )
}

#[test]
fn batch_produces_reference_cluster_census() {
    let hits = reference_batch(0, 50);
    assert_eq!(hits.len(), 144);

    let mut clusterer = reference_clusterer();
    clusterer.cluster(&hits);
    clusterer.flush();

    let clusters = clusterer.drain();
    assert_eq!(clusterer.stats().clusters, 22);
    assert_eq!(clusters.len(), 22);

    let large = clusters
        .iter()
        .filter(|c| c.hit_count() >= MIN_CLUSTER_SIZE)
        .count();
    assert_eq!(large, 20);

    // Hit conservation: every readout landed in exactly one cluster.
    let total: usize = clusters.iter().map(|c| c.hit_count()).sum();
    assert_eq!(total, 144);
    assert!(clusters.iter().all(|c| c.valid()));
}

#[test]
fn one_plane_batch_yields_single_sided_events() {
    let mut clusterer = reference_clusterer();
    clusterer.cluster(&reference_batch(0, 50));
    clusterer.flush();

    let mut matcher = GapMatcher::new(5000, 0, 1, 1).unwrap();
    matcher.insert(0, clusterer.drain());
    matcher.match_events(true);

    let events = matcher.drain_events();
    assert_eq!(events.len(), 22);
    assert!(events.iter().all(|e| !e.both_planes()));
    assert_eq!(matcher.stats().one_sided, 22);
}

#[test]
fn two_plane_batch_forms_a_coincidence_per_group() {
    let mut hits = reference_batch(0, 50);
    hits.extend(reference_batch(1, 80));
    hits.sort_by_key(|h| h.time);

    let module = ModuleConfig {
        clusterer_a: GapClustererConfig::new()
            .with_max_time_gap(MAX_TIME_GAP)
            .with_max_coord_gap(MAX_COORD_GAP),
        clusterer_b: GapClustererConfig::new()
            .with_max_time_gap(MAX_TIME_GAP)
            .with_max_coord_gap(MAX_COORD_GAP),
        multiplicity_limit_a: None,
        multiplicity_limit_b: None,
    };
    let mut pipeline = ModulePipeline::new(
        0,
        1,
        &module,
        MatcherConfig::Gap {
            minimum_time_gap: 1,
        },
        5000,
        TimeAlgorithm::CenterOfMass,
    )
    .unwrap();

    for hit in hits {
        pipeline.ingest(hit);
    }
    pipeline.process_events(true);

    let tuples = pipeline.drain();
    assert_eq!(tuples.len(), 22);
    assert_eq!(pipeline.cluster_counts(), (22, 22));
    assert_eq!(pipeline.match_stats().matched, 22);
    assert_eq!(pipeline.stats().time_seq_errors, 0);

    // Output is time-ordered and the coordinates sit on their plane bands.
    assert!(tuples.windows(2).all(|w| w[0].time <= w[1].time));
    assert!(tuples.iter().all(|t| (49.0..=53.0).contains(&t.coord_a)));
    assert!(tuples.iter().all(|t| (79.0..=83.0).contains(&t.coord_b)));
}
