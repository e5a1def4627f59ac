//! JSON configuration for the reduction stage.
//!
//! One document configures every module's clusterer thresholds, the matcher
//! strategy, multiplicity limits, merge latency and source sync groups. All
//! validation happens up front; a pipeline that constructed successfully
//! never raises a configuration error mid-stream.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::TimeAlgorithm;
use crate::clusterer::GapClustererConfig;
use crate::error::{Error, Result};

/// Matcher strategy and its thresholds.
///
/// The two strategies are not interchangeable for a given instrument; the
/// thresholds are validated against that instrument's reference counts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum MatcherConfig {
    /// Overlap/gap matching: spans that overlap or sit within
    /// `minimum_time_gap` form one event.
    Gap {
        /// Largest time gap that still joins two clusters.
        minimum_time_gap: u64,
    },
    /// Center matching: representative times within `max_delta_time` pair.
    Center {
        /// Largest representative-time delta for a coincidence.
        max_delta_time: u64,
    },
}

/// Per-module configuration: one clusterer per plane plus multiplicity
/// limits applied after matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Clusterer thresholds for plane A.
    pub clusterer_a: GapClustererConfig,
    /// Clusterer thresholds for plane B.
    pub clusterer_b: GapClustererConfig,
    /// Maximum hits per plane-A cluster; `None` disables the filter.
    #[serde(default)]
    pub multiplicity_limit_a: Option<usize>,
    /// Maximum hits per plane-B cluster; `None` disables the filter.
    #[serde(default)]
    pub multiplicity_limit_b: Option<usize>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            clusterer_a: GapClustererConfig::default(),
            clusterer_b: GapClustererConfig::default(),
            multiplicity_limit_a: None,
            multiplicity_limit_b: None,
        }
    }
}

/// Top-level reduction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReductionConfig {
    /// Matcher retention bound: clusters younger than this stay queued on a
    /// non-flushing match.
    pub maximum_latency: u64,
    /// Chrono-merger watermark bound across module streams.
    pub merge_latency: u64,
    /// Representative time/position estimator.
    #[serde(default)]
    pub time_algorithm: TimeAlgorithm,
    /// Matcher strategy shared by all modules.
    pub matcher: MatcherConfig,
    /// Groups of module indices that share a time base and must not
    /// desynchronize in the merger.
    #[serde(default)]
    pub sync_groups: Vec<Vec<usize>>,
    /// One entry per physical module; module `m` reads planes `2m`/`2m+1`.
    pub modules: Vec<ModuleConfig>,
}

impl ReductionConfig {
    /// Parses a configuration from a JSON string and validates it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Checks the document for semantic errors.
    ///
    /// # Errors
    /// Zero latency bounds, an empty module list, zero multiplicity limits
    /// and out-of-range sync-group members are all rejected here, before
    /// any data flows.
    pub fn validate(&self) -> Result<()> {
        if self.maximum_latency == 0 {
            return Err(Error::Config("maximum_latency must be nonzero".into()));
        }
        if self.merge_latency == 0 {
            return Err(Error::Config("merge_latency must be nonzero".into()));
        }
        if self.modules.is_empty() {
            return Err(Error::Config("at least one module is required".into()));
        }
        for (i, module) in self.modules.iter().enumerate() {
            for limit in [module.multiplicity_limit_a, module.multiplicity_limit_b] {
                if limit == Some(0) {
                    return Err(Error::Config(format!(
                        "module {i}: a multiplicity limit of 0 rejects everything"
                    )));
                }
            }
        }
        for (g, group) in self.sync_groups.iter().enumerate() {
            if group.len() < 2 {
                return Err(Error::Config(format!(
                    "sync group {g} needs at least two members"
                )));
            }
            for &member in group {
                if member >= self.modules.len() {
                    return Err(Error::Config(format!(
                        "sync group {g} references module {member} of {}",
                        self.modules.len()
                    )));
                }
            }
        }
        Ok(())
    }
}
