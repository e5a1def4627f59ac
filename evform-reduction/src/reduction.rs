//! Multi-module orchestration: route hits, drive pipelines, merge streams.

use evform_core::{Hit, MatchStats, PipelineStats};

use crate::config::ReductionConfig;
use crate::error::Result;
use crate::merger::{ChronoMerger, MergeItem};
use crate::pipeline::ModulePipeline;

/// Aggregated counters across every module pipeline plus the merge stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReductionStats {
    /// Pipeline counters summed over all modules.
    pub pipeline: PipelineStats,
    /// Matcher counters summed over all modules.
    pub matches: MatchStats,
    /// Pulse markers routed to the merger.
    pub pulse_markers: u64,
    /// Hits that mapped to no module.
    pub invalid_plane: u64,
    /// Items emitted on the merged output stream.
    pub merged_out: u64,
}

/// The full event-formation stage for one detector: one pipeline per
/// physical module and a chronological merger over their outputs.
///
/// Module `m` owns planes `2m` and `2m + 1`; pulse markers travel on a
/// dedicated merger source so they interleave with events in time order.
pub struct Reduction {
    pipelines: Vec<ModulePipeline>,
    merger: ChronoMerger,
    sync_groups: Vec<Vec<usize>>,
    out_queue: Vec<MergeItem>,
    pulse_markers: u64,
    invalid_plane: u64,
    merged_out: u64,
}

impl Reduction {
    /// Builds the stage from a validated configuration.
    ///
    /// # Errors
    /// Fails fast on any configuration problem; nothing is constructed
    /// partially.
    pub fn from_config(config: &ReductionConfig) -> Result<Self> {
        config.validate()?;

        let mut pipelines = Vec::with_capacity(config.modules.len());
        for (m, module) in config.modules.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let plane_a = (m * 2) as u8;
            let plane_b = plane_a + 1;
            pipelines.push(ModulePipeline::new(
                plane_a,
                plane_b,
                module,
                config.matcher,
                config.maximum_latency,
                config.time_algorithm,
            )?);
        }

        let merger = ChronoMerger::new(config.merge_latency, pipelines.len() + 1)?;
        log::debug!(
            "reduction configured: {} modules, matcher {:?}, merge latency {}",
            pipelines.len(),
            config.matcher,
            config.merge_latency
        );

        Ok(Self {
            pipelines,
            merger,
            sync_groups: config.sync_groups.clone(),
            out_queue: Vec::new(),
            pulse_markers: 0,
            invalid_plane: 0,
            merged_out: 0,
        })
    }

    /// Number of module pipelines.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Merger source index reserved for pulse markers.
    #[must_use]
    pub fn pulse_source(&self) -> usize {
        self.pipelines.len()
    }

    /// Routes one hit: pulse markers to the merger, plane-tagged hits to
    /// their module, anything unmappable to the invalid counter.
    pub fn ingest(&mut self, hit: Hit) {
        if hit.is_pulse() {
            let source = self.pulse_source();
            self.merger.insert(source, MergeItem::pulse(hit.time));
            self.pulse_markers += 1;
            return;
        }
        if hit.is_invalid() {
            self.invalid_plane += 1;
            return;
        }
        let module = usize::from(hit.plane) / 2;
        if module >= self.pipelines.len() {
            self.invalid_plane += 1;
            return;
        }
        self.pipelines[module].ingest(hit);
    }

    /// Drives every pipeline, feeds the merger and drains whatever the
    /// latency rule releases. With `flush` set, everything pending anywhere
    /// is resolved and drained in time order.
    pub fn process_queues(&mut self, flush: bool) {
        for (source, pipeline) in self.pipelines.iter_mut().enumerate() {
            pipeline.process_events(flush);
            for tuple in pipeline.drain() {
                self.merger.insert(source, MergeItem::event(tuple));
            }
        }

        for group in &self.sync_groups {
            for i in 0..group.len() {
                for j in (i + 1)..group.len() {
                    self.merger.sync_up(group[i], group[j]);
                }
            }
        }

        self.merger.sort();
        while self.merger.ready() {
            if let Some(item) = self.merger.pop_earliest() {
                self.out_queue.push(item);
                self.merged_out += 1;
            }
        }
        if flush {
            while let Some(item) = self.merger.pop_earliest() {
                self.out_queue.push(item);
                self.merged_out += 1;
            }
        }
    }

    /// Takes ownership of the merged, time-ordered output items.
    #[must_use]
    pub fn drain(&mut self) -> Vec<MergeItem> {
        std::mem::take(&mut self.out_queue)
    }

    /// Aggregated counter snapshot across modules and the merge stage.
    #[must_use]
    pub fn stats(&self) -> ReductionStats {
        let mut stats = ReductionStats {
            pulse_markers: self.pulse_markers,
            invalid_plane: self.invalid_plane,
            merged_out: self.merged_out,
            ..ReductionStats::default()
        };
        for pipeline in &self.pipelines {
            stats.pipeline.accumulate(pipeline.stats());
            stats.matches.accumulate(pipeline.match_stats());
        }
        stats
    }
}
