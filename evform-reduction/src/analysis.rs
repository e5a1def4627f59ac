//! Representative time and position estimation.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use evform_core::{Cluster, Event};
use serde::{Deserialize, Serialize};

/// How to collapse a cluster into a single representative time/position.
///
/// The two matcher strategies and the reference instrument fixtures assume
/// specific algorithms; treat the choice as configuration per instrument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeAlgorithm {
    /// Weight-averaged center of mass.
    #[default]
    CenterOfMass,
    /// Squared-weight center, which favors the strongest samples.
    CenterOfMass2,
    /// Two-point estimator from the temporal extremes of the cluster.
    Utpc,
}

impl TimeAlgorithm {
    /// Representative time of a cluster under this algorithm, as a float so
    /// sub-tick centers keep their precision during matching.
    ///
    /// Falls back to the earliest timestamp when the weighted center is
    /// undefined (zero total weight).
    #[must_use]
    pub fn cluster_time(self, cluster: &Cluster) -> f64 {
        let t = match self {
            TimeAlgorithm::CenterOfMass => cluster.time_center(),
            TimeAlgorithm::CenterOfMass2 => cluster.time_center2(),
            TimeAlgorithm::Utpc => cluster.time_end() as f64,
        };
        if t.is_nan() {
            cluster.time_start() as f64
        } else {
            t
        }
    }

    /// Representative coordinate of a cluster under this algorithm.
    ///
    /// Falls back to the coordinate of the earliest time sample when the
    /// weighted center is undefined.
    #[must_use]
    pub fn cluster_coord(self, cluster: &Cluster) -> f64 {
        let c = match self {
            TimeAlgorithm::CenterOfMass => cluster.coord_center(),
            TimeAlgorithm::CenterOfMass2 => cluster.coord_center2(),
            TimeAlgorithm::Utpc => cluster.coord_utpc(false),
        };
        if c.is_nan() {
            f64::from(cluster.coord_at_start())
        } else {
            c
        }
    }
}

/// The reduced form of a matched event handed to the geometry stage:
/// one representative time and one coordinate per plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventTuple {
    /// Representative event time in detector clock ticks.
    pub time: u64,
    /// Representative coordinate on plane A.
    pub coord_a: f64,
    /// Representative coordinate on plane B.
    pub coord_b: f64,
}

/// Reduces a two-plane event to its output tuple.
///
/// The event time is the earlier of the two clusters' representative times;
/// the per-plane coordinates use the same algorithm. Callers are expected to
/// have filtered one-sided events already.
#[must_use]
pub fn reduce_event(event: &Event, algorithm: TimeAlgorithm) -> EventTuple {
    let time_a = algorithm.cluster_time(&event.cluster_a);
    let time_b = algorithm.cluster_time(&event.cluster_b);
    EventTuple {
        time: time_a.min(time_b).round() as u64,
        coord_a: algorithm.cluster_coord(&event.cluster_a),
        coord_b: algorithm.cluster_coord(&event.cluster_b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use evform_core::Hit;

    fn cluster(hits: &[(u64, u16, u16)], plane: u8) -> Cluster {
        let mut c = Cluster::new();
        for &(t, coord, w) in hits {
            c.insert(Hit::new(t, coord, w, plane));
        }
        c
    }

    #[test]
    fn center_of_mass_time() {
        let c = cluster(&[(10, 0, 1), (20, 0, 3)], 0);
        assert_relative_eq!(TimeAlgorithm::CenterOfMass.cluster_time(&c), 17.5);
        assert_relative_eq!(TimeAlgorithm::Utpc.cluster_time(&c), 20.0);
    }

    #[test]
    fn zero_weight_falls_back_to_extremes() {
        let c = cluster(&[(10, 7, 0), (20, 9, 0)], 0);
        assert_relative_eq!(TimeAlgorithm::CenterOfMass.cluster_time(&c), 10.0);
        assert_relative_eq!(TimeAlgorithm::CenterOfMass.cluster_coord(&c), 7.0);
        assert_relative_eq!(TimeAlgorithm::Utpc.cluster_coord(&c), 9.0);
    }

    #[test]
    fn reduce_uses_earlier_plane_time() {
        let mut event = Event::new(0, 1);
        let mut a = cluster(&[(100, 4, 2), (102, 6, 2)], 0);
        let mut b = cluster(&[(110, 40, 1)], 1);
        event.merge(&mut a);
        event.merge(&mut b);

        let tuple = reduce_event(&event, TimeAlgorithm::CenterOfMass);
        assert_eq!(tuple.time, 101);
        assert_relative_eq!(tuple.coord_a, 5.0);
        assert_relative_eq!(tuple.coord_b, 40.0);
    }

    #[test]
    fn algorithm_names_parse() {
        let a: TimeAlgorithm = serde_json::from_str("\"center-of-mass\"").unwrap();
        assert_eq!(a, TimeAlgorithm::CenterOfMass);
        let b: TimeAlgorithm = serde_json::from_str("\"utpc\"").unwrap();
        assert_eq!(b, TimeAlgorithm::Utpc);
    }
}
