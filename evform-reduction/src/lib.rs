//! evform-reduction: the event-formation engine.
//!
//! Raw plane-tagged hits flow through one [`GapClusterer`] per plane, a
//! coincidence [`Matcher`] per module, and finally the [`ChronoMerger`] that
//! restores a global time order across modules under a latency bound.
//!
//! All state here is single-owner and single-threaded; the processing task
//! in `evform-transport` is the only driver.

pub mod analysis;
pub mod center_matcher;
pub mod clusterer;
pub mod config;
pub mod error;
pub mod gap_matcher;
pub mod matcher;
pub mod merger;
pub mod pipeline;
pub mod reduction;

pub use analysis::{EventTuple, TimeAlgorithm};
pub use center_matcher::CenterMatcher;
pub use clusterer::{GapClusterer, GapClustererConfig};
pub use config::{MatcherConfig, ModuleConfig, ReductionConfig};
pub use error::{Error, Result};
pub use gap_matcher::GapMatcher;
pub use matcher::Matcher;
pub use merger::{ChronoMerger, MergeItem, Payload};
pub use pipeline::ModulePipeline;
pub use reduction::{Reduction, ReductionStats};
